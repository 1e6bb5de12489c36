//! Pixel-space geometry shared by the protocol and its backends.
//!
//! Canonical space:
//! - Pixels
//! - Origin top-left
//! - +X right, +Y down

mod int_rect;
mod viewport;

pub use int_rect::IntRect;
pub use viewport::Viewport;
