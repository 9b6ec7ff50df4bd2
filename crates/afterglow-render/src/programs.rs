//! Enum-keyed filter program table
//!
//! Each pass of the bloom chain is a fixed render pipeline plus a fixed
//! struct of bound parameters, resolved once when the pipeline is built.
//! There is no runtime lookup by name; `ProgramKind` is the complete set. A
//! shader that fails to parse, or that lacks its entry point, is a fatal
//! construction error — the pipeline never runs partially.

use crate::buffers::BUFFER_FORMAT;
use crate::context::RenderError;
use crate::fullscreen::QuadVertex;
use bytemuck::{Pod, Zeroable};

/// The five bloom filter programs plus the source-to-target copy used by the
/// bloom-disabled and allocation-failure paths
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgramKind {
    DownsampleThreshold,
    BlurHorizontal,
    BlurVertical,
    PreCompose,
    Compose,
    Blit,
}

impl ProgramKind {
    pub const ALL: [ProgramKind; 6] = [
        ProgramKind::DownsampleThreshold,
        ProgramKind::BlurHorizontal,
        ProgramKind::BlurVertical,
        ProgramKind::PreCompose,
        ProgramKind::Compose,
        ProgramKind::Blit,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ProgramKind::DownsampleThreshold => "downsample-threshold",
            ProgramKind::BlurHorizontal => "blur-horizontal",
            ProgramKind::BlurVertical => "blur-vertical",
            ProgramKind::PreCompose => "pre-compose",
            ProgramKind::Compose => "compose",
            ProgramKind::Blit => "blit",
        }
    }

    fn shader_source(self) -> &'static str {
        match self {
            ProgramKind::DownsampleThreshold
            | ProgramKind::BlurHorizontal
            | ProgramKind::BlurVertical
            | ProgramKind::PreCompose => include_str!("bloom_shader.wgsl"),
            ProgramKind::Compose => include_str!("compose_shader.wgsl"),
            ProgramKind::Blit => include_str!("blit_shader.wgsl"),
        }
    }

    fn fragment_entry(self) -> &'static str {
        match self {
            ProgramKind::DownsampleThreshold => "fs_downsample_threshold",
            ProgramKind::BlurHorizontal => "fs_blur_horizontal",
            ProgramKind::BlurVertical => "fs_blur_vertical",
            ProgramKind::PreCompose => "fs_pre_compose",
            ProgramKind::Compose => "fs_compose",
            ProgramKind::Blit => "fs_blit",
        }
    }
}

/// Uniform block shared by the bloom filter programs — must match the WGSL
/// `BloomParams` struct. Each program owns its own buffer; only the fields
/// its pass reads are meaningful there.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct BloomParams {
    /// Bright-pass transform (downsample pass)
    pub luminance_const: [f32; 4],
    /// Reciprocal size of the texture the kernel steps across
    pub texel_size: [f32; 2],
    /// Bloom gain (pre-compose pass)
    pub intensity: f32,
    pub _pad: f32,
    /// Bloom color multiplier (pre-compose pass)
    pub tint: [f32; 4],
}

/// One filter program with its parameter block
pub struct FilterProgram {
    pub pipeline: wgpu::RenderPipeline,
    pub uniform_buffer: wgpu::Buffer,
    pub uniform_bind_group: wgpu::BindGroup,
}

impl FilterProgram {
    fn new(device: &wgpu::Device, name: &str, pipeline: wgpu::RenderPipeline, uniform_bgl: &wgpu::BindGroupLayout) -> Self {
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{} Params Buffer", name)),
            size: std::mem::size_of::<BloomParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} Params BG", name)),
            layout: uniform_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        Self {
            pipeline,
            uniform_buffer,
            uniform_bind_group,
        }
    }

    /// Upload a new parameter block for this program
    pub fn write_params(&self, queue: &wgpu::Queue, params: BloomParams) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[params]));
    }
}

/// All render pipelines, layouts, and the shared sampler for the bloom chain
pub struct PassPrograms {
    pub uniform_bgl: wgpu::BindGroupLayout,
    pub texture_bgl: wgpu::BindGroupLayout,
    pub linear_sampler: wgpu::Sampler,
    pub downsample_threshold: FilterProgram,
    pub blur_horizontal: FilterProgram,
    pub blur_vertical: FilterProgram,
    pub pre_compose: FilterProgram,
    pub compose_pipeline: wgpu::RenderPipeline,
    pub blit_pipeline: wgpu::RenderPipeline,
}

impl PassPrograms {
    /// Resolve and build every program. Fails without creating anything if
    /// any shader is unparsable or missing its entry point.
    pub fn new(device: &wgpu::Device) -> Result<Self, RenderError> {
        for kind in ProgramKind::ALL {
            let source = kind.shader_source();
            let module = naga::front::wgsl::parse_str(source)
                .map_err(|e| RenderError::ProgramUnavailable(kind.name(), e.emit_to_string(source)))?;
            if !module
                .entry_points
                .iter()
                .any(|ep| ep.name == kind.fragment_entry())
            {
                return Err(RenderError::ProgramUnavailable(
                    kind.name(),
                    format!("missing entry point `{}`", kind.fragment_entry()),
                ));
            }
        }

        let bloom_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Bloom Filter Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("bloom_shader.wgsl").into()),
        });
        let compose_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Compose Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("compose_shader.wgsl").into()),
        });
        let blit_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Blit Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("blit_shader.wgsl").into()),
        });

        let linear_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Afterglow Linear Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let uniform_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Afterglow Uniform BGL"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let texture_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Afterglow Texture BGL"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let filter_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Filter Pipeline Layout"),
            bind_group_layouts: &[&uniform_bgl, &texture_bgl],
            push_constant_ranges: &[],
        });
        let merge_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Merge Pipeline Layout"),
            bind_group_layouts: &[&uniform_bgl, &texture_bgl, &texture_bgl],
            push_constant_ranges: &[],
        });
        let compose_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Compose Pipeline Layout"),
            bind_group_layouts: &[&texture_bgl, &texture_bgl],
            push_constant_ranges: &[],
        });
        let blit_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Blit Pipeline Layout"),
            bind_group_layouts: &[&texture_bgl],
            push_constant_ranges: &[],
        });

        let downsample_threshold = FilterProgram::new(
            device,
            "Downsample Threshold",
            build_pipeline(
                device,
                "Downsample Threshold Pipeline",
                &bloom_module,
                ProgramKind::DownsampleThreshold.fragment_entry(),
                &filter_layout,
            ),
            &uniform_bgl,
        );
        let blur_horizontal = FilterProgram::new(
            device,
            "Horizontal Blur",
            build_pipeline(
                device,
                "Horizontal Blur Pipeline",
                &bloom_module,
                ProgramKind::BlurHorizontal.fragment_entry(),
                &filter_layout,
            ),
            &uniform_bgl,
        );
        let blur_vertical = FilterProgram::new(
            device,
            "Vertical Blur",
            build_pipeline(
                device,
                "Vertical Blur Pipeline",
                &bloom_module,
                ProgramKind::BlurVertical.fragment_entry(),
                &filter_layout,
            ),
            &uniform_bgl,
        );
        let pre_compose = FilterProgram::new(
            device,
            "Pre Compose",
            build_pipeline(
                device,
                "Pre Compose Pipeline",
                &bloom_module,
                ProgramKind::PreCompose.fragment_entry(),
                &merge_layout,
            ),
            &uniform_bgl,
        );

        let compose_pipeline = build_pipeline(
            device,
            "Compose Pipeline",
            &compose_module,
            ProgramKind::Compose.fragment_entry(),
            &compose_layout,
        );
        let blit_pipeline = build_pipeline(
            device,
            "Blit Pipeline",
            &blit_module,
            ProgramKind::Blit.fragment_entry(),
            &blit_layout,
        );

        Ok(Self {
            uniform_bgl,
            texture_bgl,
            linear_sampler,
            downsample_threshold,
            blur_horizontal,
            blur_vertical,
            pre_compose,
            compose_pipeline,
            blit_pipeline,
        })
    }

    /// Bind a texture view with the shared linear clamp sampler
    pub fn texture_bind_group(
        &self,
        device: &wgpu::Device,
        label: &str,
        view: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.texture_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.linear_sampler),
                },
            ],
        })
    }
}

fn build_pipeline(
    device: &wgpu::Device,
    label: &str,
    module: &wgpu::ShaderModule,
    fragment_entry: &str,
    layout: &wgpu::PipelineLayout,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module,
            entry_point: Some("vs_fullscreen"),
            buffers: &[QuadVertex::desc()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module,
            entry_point: Some(fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format: BUFFER_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
