//! Intermediate buffer sizing and the resize/invalidate policy
//!
//! The downsample and pre-compose buffers track the output resolution
//! (capped and divided down); the blur-chain buffers track the settings.
//! `InvalidatePolicy` watches both against the live output size and decides
//! when the whole buffer set must be torn down and rebuilt. Recreation is
//! always total; there is no partial update path.

use crate::settings::BloomSettings;

/// Width and height of a 2D buffer in pixels
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Reciprocal pixel dimensions, as sampled-space step sizes for kernels
    pub fn texel_size(&self) -> [f32; 2] {
        [1.0 / self.width as f32, 1.0 / self.height as f32]
    }

    /// True when either dimension is zero
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Downsample and pre-compose buffers never need more source rows than this
pub const MAX_BASE_HEIGHT: u32 = 720;

/// Divisor applied after capping. Opaque tuning constant; the visual result
/// depends on its exact value.
const DOWNSAMPLE_DIVISOR: f32 = 5.0;

/// Keeps bloom looking uniform on square and circular shapes when the blur
/// width is derived from the output aspect ratio
const SQUARE_ASPECT_CORRECTION: f32 = 0.7;

/// Size of the downsample and pre-compose buffers for a given output size
pub fn downsample_extent(output: Extent) -> Extent {
    let capped = output.height.min(MAX_BASE_HEIGHT);
    let ratio = capped as f32 / output.height as f32;
    Extent::new(
        (output.width as f32 * ratio / DOWNSAMPLE_DIVISOR).round() as u32,
        (output.height as f32 * ratio / DOWNSAMPLE_DIVISOR).round() as u32,
    )
}

/// Output aspect ratio with the square-shape correction applied
pub fn corrected_aspect(output: Extent) -> f32 {
    output.aspect() * SQUARE_ASPECT_CORRECTION
}

/// Size of the three blur-chain buffers for the given settings and output
pub fn blur_extent(settings: &BloomSettings, output: Extent) -> Extent {
    let height = settings.buffer_height;
    let width = if settings.preserve_aspect_ratio {
        (height as f32 * corrected_aspect(output)).round() as u32
    } else {
        settings.buffer_width
    };
    Extent::new(width, height)
}

/// Tracks the sizing inputs the current buffer set was built from and reports
/// when that set has gone stale.
///
/// The check runs every frame. It compares the live output size against the
/// last-known one, and the blur buffers actually allocated against what the
/// settings ask for now. Flipping the aspect-preservation mode always
/// invalidates, even when the old and new widths happen to coincide.
#[derive(Clone, Copy, Debug)]
pub struct InvalidatePolicy {
    last_output: Extent,
    preserving_aspect: bool,
}

impl InvalidatePolicy {
    /// Record the sizing state a freshly created buffer set was built from
    pub fn new(output: Extent, settings: &BloomSettings) -> Self {
        Self {
            last_output: output,
            preserving_aspect: settings.preserve_aspect_ratio,
        }
    }

    /// Returns true when the buffer set must be destroyed and recreated.
    ///
    /// `current_blur` is the extent of the blur-chain buffers that actually
    /// exist right now. After a recreate the caller passes the fresh extents,
    /// so an unchanged frame reports valid again.
    pub fn check(&mut self, settings: &BloomSettings, output: Extent, current_blur: Extent) -> bool {
        let camera_size_changed = output != self.last_output;

        let mut bloom_size_changed = current_blur.height != settings.buffer_height;
        if !settings.preserve_aspect_ratio {
            bloom_size_changed |= current_blur.width != settings.buffer_width;
        } else if !bloom_size_changed {
            let expected = (current_blur.height as f32 * corrected_aspect(output)).round() as u32;
            bloom_size_changed = current_blur.width != expected;
        }

        if settings.preserve_aspect_ratio != self.preserving_aspect {
            self.preserving_aspect = settings.preserve_aspect_ratio;
            bloom_size_changed = true;
        }

        self.last_output = output;
        camera_size_changed || bloom_size_changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downsample_extent_divides_by_five() {
        // 480 rows is under the cap, so the ratio is 1
        assert_eq!(downsample_extent(Extent::new(640, 480)), Extent::new(128, 96));
    }

    #[test]
    fn downsample_extent_caps_height_at_720() {
        // 1080 rows scale by 720/1080 = 2/3 before the divide
        assert_eq!(
            downsample_extent(Extent::new(1920, 1080)),
            Extent::new(256, 144)
        );
        // 1440 rows scale by half
        assert_eq!(
            downsample_extent(Extent::new(2560, 1440)),
            Extent::new(256, 144)
        );
        // Exactly 720 is not scaled
        assert_eq!(
            downsample_extent(Extent::new(1280, 720)),
            Extent::new(256, 144)
        );
    }

    #[test]
    fn blur_extent_uses_settings_dimensions() {
        let settings = BloomSettings::default();
        assert_eq!(
            blur_extent(&settings, Extent::new(1920, 1080)),
            Extent::new(128, 128)
        );
    }

    #[test]
    fn blur_extent_derives_width_from_aspect() {
        let settings = BloomSettings {
            preserve_aspect_ratio: true,
            buffer_width: 9999, // must be ignored
            ..BloomSettings::default()
        };
        // 128 * (1920/1080) * 0.7 = 159.28 -> 159
        assert_eq!(
            blur_extent(&settings, Extent::new(1920, 1080)),
            Extent::new(159, 128)
        );
    }

    #[test]
    fn texel_size_is_reciprocal() {
        let texel = Extent::new(256, 128).texel_size();
        assert!((texel[0] - 1.0 / 256.0).abs() < 1e-9);
        assert!((texel[1] - 1.0 / 128.0).abs() < 1e-9);
    }

    #[test]
    fn unchanged_inputs_stay_valid() {
        let settings = BloomSettings::default();
        let output = Extent::new(1920, 1080);
        let blur = blur_extent(&settings, output);
        let mut policy = InvalidatePolicy::new(output, &settings);
        assert!(!policy.check(&settings, output, blur));
        assert!(!policy.check(&settings, output, blur));
    }

    #[test]
    fn output_resize_invalidates_once() {
        let settings = BloomSettings::default();
        let blur = blur_extent(&settings, Extent::new(1920, 1080));
        let mut policy = InvalidatePolicy::new(Extent::new(1920, 1080), &settings);

        let resized = Extent::new(1280, 720);
        assert!(policy.check(&settings, resized, blur));
        // Second check with the same inputs: the new size is now recorded
        assert!(!policy.check(&settings, resized, blur));
    }

    #[test]
    fn blur_height_change_invalidates_until_rebuilt() {
        let mut settings = BloomSettings::default();
        let output = Extent::new(1920, 1080);
        let stale_blur = blur_extent(&settings, output);
        let mut policy = InvalidatePolicy::new(output, &settings);

        settings.buffer_height = 64;
        assert!(policy.check(&settings, output, stale_blur));
        // Still stale until the caller recreates the buffers
        assert!(policy.check(&settings, output, stale_blur));

        let fresh_blur = blur_extent(&settings, output);
        assert!(!policy.check(&settings, output, fresh_blur));
    }

    #[test]
    fn aspect_width_drift_invalidates() {
        let settings = BloomSettings {
            preserve_aspect_ratio: true,
            ..BloomSettings::default()
        };
        let output = Extent::new(1920, 1080);
        let blur = blur_extent(&settings, output);
        let mut policy = InvalidatePolicy::new(output, &settings);
        assert!(!policy.check(&settings, output, blur));

        // Same buffer, wider output: the derived width no longer matches
        let wider = Extent::new(2560, 1080);
        assert!(policy.check(&settings, wider, blur));
    }

    #[test]
    fn aspect_mode_flip_invalidates_even_when_widths_coincide() {
        // Pick an output whose corrected aspect is exactly 1, so the derived
        // width equals the fixed 128 and only the mode flip can invalidate
        let output = Extent::new(1000, 700);
        let mut settings = BloomSettings::default();
        let blur = blur_extent(&settings, output);
        let mut policy = InvalidatePolicy::new(output, &settings);
        assert!(!policy.check(&settings, output, blur));

        settings.preserve_aspect_ratio = true;
        assert_eq!(blur_extent(&settings, output), blur);
        assert!(policy.check(&settings, output, blur));
        // The flip was recorded; matching dimensions are valid from here on
        assert!(!policy.check(&settings, output, blur));
    }
}
