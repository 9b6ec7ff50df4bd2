//! Intermediate buffer set
//!
//! Five transient render targets sized by the policy in `afterglow-core`:
//! the downsample and pre-compose buffers follow the output resolution, the
//! three blur-chain buffers follow the settings. The set is atomic — all
//! five are created together or not at all, and recreation always starts
//! from an empty set.

use crate::context::RenderError;
use afterglow_core::{blur_extent, downsample_extent, BloomSettings, Extent};

/// Fixed pixel format for every intermediate buffer and frame texture
pub const BUFFER_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// One transient render target with its allocation size
pub struct IntermediateBuffer {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub extent: Extent,
}

/// The five intermediate buffers of the bloom chain
pub struct BufferSet {
    /// Downsampled color with the bright-pass mask in alpha
    pub down_sample: IntermediateBuffer,
    /// Blur-chain staging slot; its extent is what the invalidate policy
    /// measures against the settings
    pub blur_source: IntermediateBuffer,
    /// Horizontally blurred bright-pass
    pub blur_horizontal: IntermediateBuffer,
    /// Fully blurred bright-pass
    pub blur_vertical: IntermediateBuffer,
    /// Tinted, intensity-scaled bloom with the compose weighting in alpha
    pub pre_compose: IntermediateBuffer,
    contents_discarded: bool,
}

impl BufferSet {
    /// Allocate all five buffers for the given output size and settings.
    ///
    /// Dimensions are validated up front so a failure allocates nothing;
    /// there is never a partially-populated set.
    pub fn create_all(
        device: &wgpu::Device,
        output: Extent,
        settings: &BloomSettings,
    ) -> Result<Self, RenderError> {
        let down = downsample_extent(output);
        let blur = blur_extent(settings, output);

        let limit = device.limits().max_texture_dimension_2d;
        for (label, extent) in [("downsample", down), ("blur chain", blur)] {
            if extent.is_degenerate() || extent.width > limit || extent.height > limit {
                return Err(RenderError::BufferAllocation {
                    label,
                    width: extent.width,
                    height: extent.height,
                });
            }
        }

        Ok(Self {
            down_sample: create_transient(device, "Bloom Down Sample Pass", down),
            blur_source: create_transient(device, "Pre Bloom", blur),
            blur_horizontal: create_transient(device, "Horizontal Blur", blur),
            blur_vertical: create_transient(device, "Vertical Blur", blur),
            pre_compose: create_transient(device, "Pre Compose", down),
            contents_discarded: false,
        })
    }

    /// Release every buffer in the set. Accepts an empty set so callers can
    /// always tear down unconditionally.
    pub fn destroy_all(set: Option<BufferSet>) {
        if let Some(set) = set {
            set.down_sample.texture.destroy();
            set.blur_source.texture.destroy();
            set.blur_horizontal.texture.destroy();
            set.blur_vertical.texture.destroy();
            set.pre_compose.texture.destroy();
        }
    }

    /// Extent shared by the three blur-chain buffers
    pub fn blur_chain_extent(&self) -> Extent {
        self.blur_source.extent
    }

    /// Extent shared by the downsample and pre-compose buffers
    pub fn downsample_extent(&self) -> Extent {
        self.down_sample.extent
    }

    /// Hint that no retained contents are needed until the next frame's
    /// passes clear them again
    pub fn discard_contents(&mut self) {
        self.contents_discarded = true;
    }

    /// Clears the discard hint as a frame's passes begin writing
    pub fn begin_frame(&mut self) {
        self.contents_discarded = false;
    }

    /// True between a frame's post-compose step and the next frame
    pub fn contents_discarded(&self) -> bool {
        self.contents_discarded
    }
}

fn create_transient(device: &wgpu::Device, label: &str, extent: Extent) -> IntermediateBuffer {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: extent.width,
            height: extent.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: BUFFER_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    IntermediateBuffer {
        texture,
        view,
        extent,
    }
}
