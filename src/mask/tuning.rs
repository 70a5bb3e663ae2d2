use std::path::Path;

use crate::foundation::error::{VeilcutError, VeilcutResult};

/// One small-face radius tier: faces whose area is at most `max_area_fraction` of the frame get
/// their blur radius multiplied by `radius_scale`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RadiusTier {
    /// Upper bound (inclusive) of `face_area / frame_area` for this tier.
    pub max_area_fraction: f32,
    /// Multiplier applied to the base blur radius.
    pub radius_scale: f32,
}

/// Empirical constants for region rasterization and temporal smoothing.
///
/// Defaults are the values the masking was tuned with; they are exposed so they can be adjusted
/// per project rather than treated as fixed.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BlurTuning {
    /// Ascending small-face tiers. Faces larger than every tier use the full radius.
    pub small_face_tiers: Vec<RadiusTier>,
    /// Leaky-integrator factor applied to the previous frame's alpha.
    pub temporal_decay: f32,
    /// Fraction of the ellipse radius that receives full alpha before the smoothstep falloff.
    pub ellipse_core: f32,
    /// Extra margin added around each face rectangle, as a fraction of its half-extent.
    pub region_padding: f32,
}

impl Default for BlurTuning {
    fn default() -> Self {
        Self {
            small_face_tiers: vec![
                RadiusTier {
                    max_area_fraction: 0.01,
                    radius_scale: 0.4,
                },
                RadiusTier {
                    max_area_fraction: 0.03,
                    radius_scale: 0.55,
                },
                RadiusTier {
                    max_area_fraction: 0.05,
                    radius_scale: 0.7,
                },
            ],
            temporal_decay: 0.75,
            ellipse_core: 0.65,
            region_padding: 0.15,
        }
    }
}

impl BlurTuning {
    /// Load tuning from a JSON file. Missing fields take their defaults.
    pub fn from_path(path: impl AsRef<Path>) -> VeilcutResult<Self> {
        use anyhow::Context as _;
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("read blur tuning '{}'", path.display()))?;
        let tuning: Self = serde_json::from_slice(&bytes)
            .map_err(|e| VeilcutError::serde(format!("blur tuning '{}': {e}", path.display())))?;
        tuning.validate()?;
        Ok(tuning)
    }

    /// Reject values that would make the compositor misbehave.
    pub fn validate(&self) -> VeilcutResult<()> {
        if !(0.0..=1.0).contains(&self.temporal_decay) {
            return Err(VeilcutError::validation(
                "temporal_decay must be within [0, 1]",
            ));
        }
        if !(0.0..1.0).contains(&self.ellipse_core) {
            return Err(VeilcutError::validation("ellipse_core must be within [0, 1)"));
        }
        if !self.region_padding.is_finite() || self.region_padding < 0.0 {
            return Err(VeilcutError::validation("region_padding must be >= 0"));
        }
        let mut prev = 0.0f32;
        for tier in &self.small_face_tiers {
            if !tier.max_area_fraction.is_finite() || tier.max_area_fraction < prev {
                return Err(VeilcutError::validation(
                    "small_face_tiers must be sorted by ascending max_area_fraction",
                ));
            }
            if !tier.radius_scale.is_finite() || tier.radius_scale <= 0.0 {
                return Err(VeilcutError::validation("radius_scale must be > 0"));
            }
            prev = tier.max_area_fraction;
        }
        Ok(())
    }

    /// Radius multiplier for a face covering `area_fraction` of the frame.
    pub fn radius_scale(&self, area_fraction: f32) -> f32 {
        self.small_face_tiers
            .iter()
            .find(|tier| area_fraction <= tier.max_area_fraction)
            .map(|tier| tier.radius_scale)
            .unwrap_or(1.0)
    }

    /// Lookup table mapping previous alpha to decayed alpha (floored, so it always reaches 0).
    pub(crate) fn decay_lut(&self) -> [u8; 256] {
        let mut lut = [0u8; 256];
        for (prev, out) in lut.iter_mut().enumerate() {
            *out = (prev as f32 * self.temporal_decay).floor().clamp(0.0, 255.0) as u8;
        }
        lut
    }
}

#[cfg(test)]
#[path = "../../tests/unit/mask/tuning.rs"]
mod tests;
