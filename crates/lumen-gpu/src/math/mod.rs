//! Matrix types and the viewport projection helper.

mod matrix;
mod projection;

pub use matrix::{Matrix4x4, Vec4};
pub use projection::{apply_projection, orthographic_projection};
