//! Afterglow Render - wgpu bloom compositing pipeline
//!
//! Applies a screen-space bloom to a rendered frame: extract over-threshold
//! luminance, blur it with a separable Gaussian, composite it back onto the
//! source. The host hands the pipeline a source and a target texture once
//! per frame along with the current output size and settings; the pipeline
//! owns every intermediate GPU resource and rebuilds the whole set whenever
//! the output size or the settings-derived buffer dimensions change.

mod buffers;
mod context;
mod fullscreen;
mod pipeline;
mod programs;

pub use buffers::{BufferSet, IntermediateBuffer, BUFFER_FORMAT};
pub use context::{RenderContext, RenderError};
pub use fullscreen::{FullscreenQuad, QuadVertex, PASS_CLEAR_COLOR};
pub use pipeline::BloomPipeline;
pub use programs::{BloomParams, FilterProgram, PassPrograms, ProgramKind};
