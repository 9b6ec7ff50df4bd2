//! Pipeline orchestrator
//!
//! Runs the five-pass bloom chain once per frame: downsample + bright-pass,
//! horizontal blur, vertical blur, pre-compose, compose. Before the passes it
//! asks the invalidate policy whether the intermediate buffers still match
//! the frame's output size and the current settings, and rebuilds the whole
//! set when they do not. Everything executes synchronously inside the call;
//! the host invokes it once per rendered frame.

use crate::buffers::BufferSet;
use crate::context::{RenderContext, RenderError};
use crate::fullscreen::{FullscreenQuad, PASS_CLEAR_COLOR};
use crate::programs::{BloomParams, PassPrograms};
use afterglow_core::{BloomSettings, Extent, InvalidatePolicy};
use bytemuck::Zeroable;

/// Bind groups that reference intermediate-buffer identities. Rebuilt as a
/// unit whenever the buffer set is recreated; never patched in place.
struct BufferBindings {
    /// Horizontal blur reads the downsampled bright-pass
    blur_horizontal_input: wgpu::BindGroup,
    /// Vertical blur reads the horizontally blurred buffer
    blur_vertical_input: wgpu::BindGroup,
    /// Pre-compose reads the sharp downsample...
    pre_compose_main: wgpu::BindGroup,
    /// ...and the fully blurred bright-pass
    pre_compose_bloom: wgpu::BindGroup,
    /// Compose reads the pre-composed bloom
    compose_overlay: wgpu::BindGroup,
}

impl BufferBindings {
    fn new(device: &wgpu::Device, programs: &PassPrograms, buffers: &BufferSet) -> Self {
        Self {
            blur_horizontal_input: programs.texture_bind_group(
                device,
                "Horizontal Blur Input BG",
                &buffers.down_sample.view,
            ),
            blur_vertical_input: programs.texture_bind_group(
                device,
                "Vertical Blur Input BG",
                &buffers.blur_horizontal.view,
            ),
            pre_compose_main: programs.texture_bind_group(
                device,
                "Pre Compose Main BG",
                &buffers.down_sample.view,
            ),
            pre_compose_bloom: programs.texture_bind_group(
                device,
                "Pre Compose Bloom BG",
                &buffers.blur_vertical.view,
            ),
            compose_overlay: programs.texture_bind_group(
                device,
                "Compose Overlay BG",
                &buffers.pre_compose.view,
            ),
        }
    }
}

/// The bloom compositor. Owns every GPU resource of the effect; the host
/// owns the settings and the source/target frame textures.
pub struct BloomPipeline {
    programs: PassPrograms,
    quad: FullscreenQuad,
    buffers: Option<BufferSet>,
    bindings: Option<BufferBindings>,
    policy: InvalidatePolicy,
}

impl BloomPipeline {
    /// Build the program table and the full-screen quad. Fails if any filter
    /// program cannot be loaded; no partial pipeline is ever constructed.
    pub fn new(context: &RenderContext) -> Result<Self, RenderError> {
        let programs = PassPrograms::new(&context.device)?;
        let quad = FullscreenQuad::new(&context.device);
        Ok(Self {
            programs,
            quad,
            buffers: None,
            bindings: None,
            policy: InvalidatePolicy::new(Extent::default(), &BloomSettings::default()),
        })
    }

    /// Allocate the intermediate buffers for the given output size. A second
    /// call with buffers already present is a no-op.
    pub fn activate(
        &mut self,
        context: &RenderContext,
        settings: &BloomSettings,
        output: Extent,
    ) -> Result<(), RenderError> {
        if self.buffers.is_some() {
            return Ok(());
        }
        self.recreate_buffers(context, settings, output)
    }

    /// Release every intermediate buffer. Safe to call repeatedly.
    pub fn deactivate(&mut self) {
        BufferSet::destroy_all(self.buffers.take());
        self.bindings = None;
    }

    /// True while intermediate buffers exist
    pub fn is_active(&self) -> bool {
        self.buffers.is_some()
    }

    /// The current intermediate buffers, if active
    pub fn buffers(&self) -> Option<&BufferSet> {
        self.buffers.as_ref()
    }

    /// Composite one frame. `target` is fully overwritten: with the bloomed
    /// source normally, with an unmodified copy when bloom is disabled or
    /// the buffers cannot be (re)built for this frame's inputs.
    pub fn render_frame(
        &mut self,
        context: &RenderContext,
        source: &wgpu::TextureView,
        target: &wgpu::TextureView,
        output: Extent,
        settings: &BloomSettings,
    ) {
        if !settings.bloom_enabled {
            self.blit(context, source, target);
            return;
        }

        let needs_recreate = match &self.buffers {
            Some(buffers) => self
                .policy
                .check(settings, output, buffers.blur_chain_extent()),
            None => true,
        };
        if needs_recreate {
            if let Err(err) = self.recreate_buffers(context, settings, output) {
                log::warn!("bloom buffers unavailable, passing frame through: {err}");
                self.blit(context, source, target);
                return;
            }
        }

        if !self.run_passes(context, source, target, settings) {
            self.blit(context, source, target);
        }
    }

    /// Destroy and rebuild the whole buffer set and every bound parameter
    /// that references buffer identity. All-or-nothing: on failure the old
    /// set is gone and nothing replaces it.
    fn recreate_buffers(
        &mut self,
        context: &RenderContext,
        settings: &BloomSettings,
        output: Extent,
    ) -> Result<(), RenderError> {
        BufferSet::destroy_all(self.buffers.take());
        self.bindings = None;

        let buffers = BufferSet::create_all(&context.device, output, settings)?;

        // Texel sizes follow buffer identity, so they rebind here, not per
        // frame
        let blur_params = BloomParams {
            texel_size: buffers.blur_chain_extent().texel_size(),
            ..BloomParams::zeroed()
        };
        self.programs
            .blur_horizontal
            .write_params(&context.queue, blur_params);
        self.programs
            .blur_vertical
            .write_params(&context.queue, blur_params);
        self.programs.downsample_threshold.write_params(
            &context.queue,
            BloomParams {
                luminance_const: settings.luminance_const(),
                texel_size: buffers.downsample_extent().texel_size(),
                ..BloomParams::zeroed()
            },
        );

        self.bindings = Some(BufferBindings::new(
            &context.device,
            &self.programs,
            &buffers,
        ));
        self.policy = InvalidatePolicy::new(output, settings);
        log::debug!(
            "recreated bloom buffers: downsample {}x{}, blur chain {}x{}",
            buffers.downsample_extent().width,
            buffers.downsample_extent().height,
            buffers.blur_chain_extent().width,
            buffers.blur_chain_extent().height,
        );
        self.buffers = Some(buffers);
        Ok(())
    }

    /// Run the five passes. Returns false when no buffer set exists, which
    /// the caller answers with a passthrough blit.
    fn run_passes(
        &mut self,
        context: &RenderContext,
        source: &wgpu::TextureView,
        target: &wgpu::TextureView,
        settings: &BloomSettings,
    ) -> bool {
        let (Some(buffers), Some(bindings)) = (self.buffers.as_mut(), self.bindings.as_ref())
        else {
            return false;
        };
        buffers.begin_frame();

        // Settings-derived scalars refresh every frame
        self.programs.downsample_threshold.write_params(
            &context.queue,
            BloomParams {
                luminance_const: settings.luminance_const(),
                texel_size: buffers.downsample_extent().texel_size(),
                ..BloomParams::zeroed()
            },
        );
        self.programs.pre_compose.write_params(
            &context.queue,
            BloomParams {
                intensity: settings.intensity,
                tint: settings.tint,
                ..BloomParams::zeroed()
            },
        );

        // The source view changes identity per frame, so its bind group is
        // per-frame as well
        let source_bind_group =
            self.programs
                .texture_bind_group(&context.device, "Frame Source BG", source);

        let mut encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Bloom Frame Encoder"),
            });

        run_filter_pass(
            &mut encoder,
            "Downsample Bright Pass",
            &self.programs.downsample_threshold.pipeline,
            &[
                &self.programs.downsample_threshold.uniform_bind_group,
                &source_bind_group,
            ],
            &buffers.down_sample.view,
            &self.quad,
        );
        run_filter_pass(
            &mut encoder,
            "Horizontal Blur Pass",
            &self.programs.blur_horizontal.pipeline,
            &[
                &self.programs.blur_horizontal.uniform_bind_group,
                &bindings.blur_horizontal_input,
            ],
            &buffers.blur_horizontal.view,
            &self.quad,
        );
        run_filter_pass(
            &mut encoder,
            "Vertical Blur Pass",
            &self.programs.blur_vertical.pipeline,
            &[
                &self.programs.blur_vertical.uniform_bind_group,
                &bindings.blur_vertical_input,
            ],
            &buffers.blur_vertical.view,
            &self.quad,
        );
        run_filter_pass(
            &mut encoder,
            "Pre Compose Pass",
            &self.programs.pre_compose.pipeline,
            &[
                &self.programs.pre_compose.uniform_bind_group,
                &bindings.pre_compose_main,
                &bindings.pre_compose_bloom,
            ],
            &buffers.pre_compose.view,
            &self.quad,
        );
        run_filter_pass(
            &mut encoder,
            "Compose Pass",
            &self.programs.compose_pipeline,
            &[&source_bind_group, &bindings.compose_overlay],
            target,
            &self.quad,
        );

        // Post-compose: transient contents are dead until the next frame's
        // clears; finishing the encoder drops the last target binding
        buffers.discard_contents();
        context.queue.submit(std::iter::once(encoder.finish()));
        true
    }

    /// Copy the source to the target unchanged
    fn blit(&self, context: &RenderContext, source: &wgpu::TextureView, target: &wgpu::TextureView) {
        let source_bind_group =
            self.programs
                .texture_bind_group(&context.device, "Blit Source BG", source);

        let mut encoder = context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Blit Encoder"),
            });
        run_filter_pass(
            &mut encoder,
            "Blit Pass",
            &self.programs.blit_pipeline,
            &[&source_bind_group],
            target,
            &self.quad,
        );
        context.queue.submit(std::iter::once(encoder.finish()));
    }
}

/// One full-screen filter pass: clear the destination to the sentinel color,
/// bind, draw the quad.
fn run_filter_pass(
    encoder: &mut wgpu::CommandEncoder,
    label: &str,
    pipeline: &wgpu::RenderPipeline,
    bind_groups: &[&wgpu::BindGroup],
    destination: &wgpu::TextureView,
    quad: &FullscreenQuad,
) {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: destination,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(PASS_CLEAR_COLOR),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });
    pass.set_pipeline(pipeline);
    for (slot, group) in bind_groups.iter().enumerate() {
        pass.set_bind_group(slot as u32, *group, &[]);
    }
    quad.draw(&mut pass);
}

#[cfg(test)]
mod tests {
    use super::*;
    use afterglow_core::{blur_extent, downsample_extent};

    fn gpu() -> Option<RenderContext> {
        match pollster::block_on(RenderContext::new_headless()) {
            Ok(context) => Some(context),
            Err(err) => {
                eprintln!("skipping GPU test: {err}");
                None
            }
        }
    }

    fn solid(extent: Extent, rgba: [u8; 4]) -> Vec<u8> {
        rgba.repeat((extent.width * extent.height) as usize)
    }

    fn pattern(extent: Extent) -> Vec<u8> {
        let mut pixels = Vec::with_capacity((extent.width * extent.height * 4) as usize);
        for y in 0..extent.height {
            for x in 0..extent.width {
                pixels.extend_from_slice(&[
                    ((x * 7 + y * 13) % 251) as u8,
                    ((x * 3 + y * 5) % 239) as u8,
                    ((x * 11 + y * 2) % 241) as u8,
                    255,
                ]);
            }
        }
        pixels
    }

    fn max_channel_delta(a: &[u8], b: &[u8]) -> i32 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| (*x as i32 - *y as i32).abs())
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn disabled_bloom_is_identity() {
        let Some(context) = gpu() else { return };
        let output = Extent::new(64, 64);
        let (source_texture, source_view) = context.create_frame_texture("Test Source", output);
        let (target_texture, target_view) = context.create_frame_texture("Test Target", output);
        let pixels = pattern(output);
        context.write_frame_texture(&source_texture, output, &pixels);

        let mut pipeline = BloomPipeline::new(&context).unwrap();
        let settings = BloomSettings {
            bloom_enabled: false,
            ..BloomSettings::default()
        };
        pipeline.render_frame(&context, &source_view, &target_view, output, &settings);

        let result = pollster::block_on(context.read_pixels(&target_texture, output)).unwrap();
        assert!(
            max_channel_delta(&result, &pixels) <= 1,
            "disabled bloom must copy the source unchanged"
        );
        // The short-circuit path allocates nothing
        assert!(!pipeline.is_active());
    }

    #[test]
    fn activation_is_idempotent() {
        let Some(context) = gpu() else { return };
        let settings = BloomSettings::default();

        let mut pipeline = BloomPipeline::new(&context).unwrap();
        pipeline
            .activate(&context, &settings, Extent::new(640, 480))
            .unwrap();
        let before = pipeline.buffers().unwrap().downsample_extent();

        // A second activation is a no-op even when the output size moved;
        // only the per-frame invalidate check reacts to that
        pipeline
            .activate(&context, &settings, Extent::new(1920, 1080))
            .unwrap();
        assert_eq!(pipeline.buffers().unwrap().downsample_extent(), before);

        pipeline.deactivate();
        pipeline.deactivate();
        assert!(!pipeline.is_active());
    }

    #[test]
    fn recreation_applies_new_sizing_to_all_buffers() {
        let Some(context) = gpu() else { return };
        let mut settings = BloomSettings::default();
        let output = Extent::new(1920, 1080);

        let mut pipeline = BloomPipeline::new(&context).unwrap();
        pipeline.activate(&context, &settings, output).unwrap();
        {
            let buffers = pipeline.buffers().unwrap();
            assert_eq!(buffers.downsample_extent(), downsample_extent(output));
            assert_eq!(buffers.blur_chain_extent(), Extent::new(128, 128));
        }

        // Change every sizing input at once: output size, blur height, and
        // the aspect-preservation mode
        settings.buffer_height = 64;
        settings.preserve_aspect_ratio = true;
        let resized = Extent::new(1280, 720);
        let (source_texture, source_view) = context.create_frame_texture("Test Source", resized);
        let (_target_texture, target_view) = context.create_frame_texture("Test Target", resized);
        context.write_frame_texture(&source_texture, resized, &solid(resized, [0, 0, 0, 255]));

        pipeline.render_frame(&context, &source_view, &target_view, resized, &settings);

        let expected_down = downsample_extent(resized);
        let expected_blur = blur_extent(&settings, resized);
        let buffers = pipeline.buffers().unwrap();
        assert_eq!(buffers.down_sample.extent, expected_down);
        assert_eq!(buffers.pre_compose.extent, expected_down);
        assert_eq!(buffers.blur_source.extent, expected_blur);
        assert_eq!(buffers.blur_horizontal.extent, expected_blur);
        assert_eq!(buffers.blur_vertical.extent, expected_blur);
    }

    #[test]
    fn repeated_frames_are_deterministic() {
        let Some(context) = gpu() else { return };
        let settings = BloomSettings::default();
        let output = Extent::new(320, 240);
        let (source_texture, source_view) = context.create_frame_texture("Test Source", output);
        let (target_texture, target_view) = context.create_frame_texture("Test Target", output);
        context.write_frame_texture(&source_texture, output, &pattern(output));

        let mut pipeline = BloomPipeline::new(&context).unwrap();
        pipeline.render_frame(&context, &source_view, &target_view, output, &settings);
        assert!(pipeline.buffers().unwrap().contents_discarded());
        let first = pollster::block_on(context.read_pixels(&target_texture, output)).unwrap();

        // The second frame reuses the discarded intermediates; nothing may
        // leak across frames
        pipeline.render_frame(&context, &source_view, &target_view, output, &settings);
        let second = pollster::block_on(context.read_pixels(&target_texture, output)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn below_threshold_source_passes_through() {
        let Some(context) = gpu() else { return };
        let output = Extent::new(80, 80);
        let (source_texture, source_view) = context.create_frame_texture("Test Source", output);
        let (target_texture, target_view) = context.create_frame_texture("Test Target", output);
        // 0.2 luminance everywhere, well under the 0.6 threshold
        let pixels = solid(output, [51, 51, 51, 255]);
        context.write_frame_texture(&source_texture, output, &pixels);

        let settings = BloomSettings::default();
        let mut pipeline = BloomPipeline::new(&context).unwrap();
        pipeline.render_frame(&context, &source_view, &target_view, output, &settings);

        let result = pollster::block_on(context.read_pixels(&target_texture, output)).unwrap();
        assert!(
            max_channel_delta(&result, &pixels) <= 1,
            "a source below threshold everywhere must compose to itself"
        );
    }

    #[test]
    fn bright_spot_blooms_with_tint() {
        let Some(context) = gpu() else { return };
        let output = Extent::new(100, 100);
        let (source_texture, source_view) = context.create_frame_texture("Test Source", output);
        let (target_texture, target_view) = context.create_frame_texture("Test Target", output);

        // Black field with a full-white block in the middle
        let mut pixels = solid(output, [0, 0, 0, 255]);
        for y in 46..54u32 {
            for x in 46..54u32 {
                let i = ((y * output.width + x) * 4) as usize;
                pixels[i..i + 4].copy_from_slice(&[255, 255, 255, 255]);
            }
        }
        context.write_frame_texture(&source_texture, output, &pixels);

        let settings = BloomSettings {
            tint: [1.0, 0.0, 0.0, 1.0],
            ..BloomSettings::default()
        };
        let mut pipeline = BloomPipeline::new(&context).unwrap();
        pipeline.render_frame(&context, &source_view, &target_view, output, &settings);

        let result = pollster::block_on(context.read_pixels(&target_texture, output)).unwrap();
        let sample = |x: u32, y: u32| {
            let i = ((y * output.width + x) * 4) as usize;
            (result[i], result[i + 1], result[i + 2])
        };

        // Outside the white block the source was black; any red there is
        // bloom spill, and the red tint must keep green out of it
        for (x, y) in [(56u32, 50u32), (44, 50), (50, 56)] {
            let (r, g, _b) = sample(x, y);
            assert!(r > 10, "expected red bloom spill at ({x},{y}), got r={r}");
            assert!(g <= 2, "red tint must not add green at ({x},{y}), got g={g}");
        }

        // Far corner stays black
        let (r, g, b) = sample(5, 5);
        assert!(r <= 2 && g <= 2 && b <= 2, "corner must stay dark");
    }
}
