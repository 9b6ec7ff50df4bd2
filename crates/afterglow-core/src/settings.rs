//! Bloom settings model
//!
//! Plain configuration data owned by the embedding application. The pipeline
//! reads it every frame and never mutates it; editing happens on the host's
//! side. Values are assumed pre-validated (the configuration surface clamps
//! threshold below 1.0 and keeps dimensions positive).

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Rec. 709 luminance weights for sRGB primaries
pub const SRGB_LUMINANCE: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Equal-weight luminance
pub const UNIFORM_LUMINANCE: [f32; 3] = [1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0];

/// How the bright-pass luminance weights are derived
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LuminanceMode {
    /// Equal weights for all three channels
    #[default]
    Uniform,
    /// Rec. 709 weights
    Srgb,
    /// User-supplied weight vector, passed through unchanged
    Custom,
}

/// Bloom configuration read by the pipeline once per frame
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomSettings {
    pub bloom_enabled: bool,
    /// Luminance above which a pixel contributes to bloom, in [0, 1)
    pub threshold: f32,
    pub intensity: f32,
    /// RGBA multiplier applied to the blurred bright-pass
    pub tint: [f32; 4],
    /// Derive the blur buffer width from the output aspect ratio instead of
    /// using `buffer_width`
    pub preserve_aspect_ratio: bool,
    pub buffer_width: u32,
    pub buffer_height: u32,
    pub luminance_mode: LuminanceMode,
    /// Weights used when `luminance_mode` is `Custom`. Expected to sum to 1;
    /// not enforced here.
    pub luminance_vector: [f32; 3],
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            bloom_enabled: true,
            threshold: 0.6,
            intensity: 2.5,
            tint: [1.0, 1.0, 1.0, 1.0],
            preserve_aspect_ratio: false,
            buffer_width: 128,
            buffer_height: 128,
            luminance_mode: LuminanceMode::Uniform,
            luminance_vector: UNIFORM_LUMINANCE,
        }
    }
}

impl BloomSettings {
    /// The luminance weight vector selected by `luminance_mode`
    pub fn luminance_weights(&self) -> [f32; 3] {
        match self.luminance_mode {
            LuminanceMode::Uniform => UNIFORM_LUMINANCE,
            LuminanceMode::Srgb => SRGB_LUMINANCE,
            LuminanceMode::Custom => self.luminance_vector,
        }
    }

    /// The bright-pass transform for the active weights and threshold
    pub fn luminance_const(&self) -> [f32; 4] {
        luminance_const(self.threshold, self.luminance_weights())
    }

    /// Load settings from a TOML file; missing fields fall back to defaults
    pub fn load_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save settings to a TOML file
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Fold the threshold-and-rescale bright-pass into one affine transform:
/// `mask = clamp(dot(color, xyz) + w, 0, 1)` inside the downsample program.
///
/// Threshold must stay below 1.0; that contract belongs to the configuration
/// surface, so the division is left to blow up on violation rather than
/// silently corrected.
pub fn luminance_const(threshold: f32, weights: [f32; 3]) -> [f32; 4] {
    let rescale = 1.0 / (1.0 - threshold);
    [
        weights[0] * rescale,
        weights[1] * rescale,
        weights[2] * rescale,
        -threshold * rescale,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_shipped_configuration() {
        let settings = BloomSettings::default();
        assert!(settings.bloom_enabled);
        assert!((settings.threshold - 0.6).abs() < 1e-6);
        assert!((settings.intensity - 2.5).abs() < 1e-6);
        assert_eq!(settings.tint, [1.0, 1.0, 1.0, 1.0]);
        assert!(!settings.preserve_aspect_ratio);
        assert_eq!((settings.buffer_width, settings.buffer_height), (128, 128));
        assert_eq!(settings.luminance_mode, LuminanceMode::Uniform);
    }

    #[test]
    fn luminance_weights_follow_mode() {
        let mut settings = BloomSettings::default();
        assert_eq!(settings.luminance_weights(), UNIFORM_LUMINANCE);

        settings.luminance_mode = LuminanceMode::Srgb;
        assert_eq!(settings.luminance_weights(), [0.2126, 0.7152, 0.0722]);
    }

    #[test]
    fn custom_weights_pass_through_unnormalized() {
        let settings = BloomSettings {
            luminance_mode: LuminanceMode::Custom,
            luminance_vector: [0.9, 0.9, 0.9],
            ..BloomSettings::default()
        };
        // Sum-to-one is advisory only; nothing rescales the vector
        assert_eq!(settings.luminance_weights(), [0.9, 0.9, 0.9]);
    }

    #[test]
    fn luminance_const_folds_threshold() {
        let c = luminance_const(0.6, SRGB_LUMINANCE);
        let rescale = 1.0 / 0.4;
        assert!((c[0] - 0.2126 * rescale).abs() < 1e-5);
        assert!((c[1] - 0.7152 * rescale).abs() < 1e-5);
        assert!((c[2] - 0.0722 * rescale).abs() < 1e-5);
        assert!((c[3] + 0.6 * rescale).abs() < 1e-5);

        // A pixel exactly at the threshold maps to zero; full white maps to one
        let dot = |color: [f32; 3]| color[0] * c[0] + color[1] * c[1] + color[2] * c[2] + c[3];
        assert!(dot([0.6, 0.6, 0.6]).abs() < 1e-5);
        assert!((dot([1.0, 1.0, 1.0]) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn toml_round_trip() {
        let settings = BloomSettings {
            threshold: 0.75,
            tint: [1.0, 0.5, 0.25, 1.0],
            preserve_aspect_ratio: true,
            luminance_mode: LuminanceMode::Custom,
            luminance_vector: [0.5, 0.25, 0.25],
            ..BloomSettings::default()
        };
        let text = toml::to_string_pretty(&settings).unwrap();
        let parsed: BloomSettings = toml::from_str(&text).unwrap();
        assert_eq!(parsed, settings);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let parsed: BloomSettings = toml::from_str("threshold = 0.3\n").unwrap();
        assert!((parsed.threshold - 0.3).abs() < 1e-6);
        assert!((parsed.intensity - 2.5).abs() < 1e-6);
        assert_eq!(parsed.buffer_height, 128);
    }
}
