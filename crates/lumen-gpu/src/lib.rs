//! Lumen GPU crate.
//!
//! The GPU command-list protocol between an HTML renderer core and pluggable GPU
//! backends: id allocation, resource lifetimes, synchronization passes and command
//! lists, plus reference backends (software, wgpu) and a C ABI bridge.

pub mod logging;
pub mod coords;
pub mod math;
pub mod bitmap;
pub mod protocol;
pub mod backends;
pub mod ffi;
pub mod platform;
