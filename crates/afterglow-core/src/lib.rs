//! Afterglow Core - Foundational types for the afterglow bloom compositor
//!
//! This crate holds everything about the bloom pipeline that is not a GPU
//! resource: the settings model read by the renderer every frame, the sizing
//! policy for the intermediate buffers, and the resize/invalidate tracking
//! that decides when those buffers must be rebuilt.

mod error;
mod settings;
mod sizing;

pub use error::{AfterglowError, Result};
pub use settings::{BloomSettings, LuminanceMode, SRGB_LUMINANCE, UNIFORM_LUMINANCE};
pub use sizing::{
    blur_extent, corrected_aspect, downsample_extent, Extent, InvalidatePolicy, MAX_BASE_HEIGHT,
};
