use crate::foundation::math::smoothstep01;
use crate::mask::tuning::BlurTuning;

/// A detected face: an axis-aligned rectangle in frame pixels plus detector confidence.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FaceRegion {
    /// Left edge in pixels.
    pub x: f32,
    /// Top edge in pixels.
    pub y: f32,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
    /// Detector confidence in `[0, 1]`.
    pub confidence: f32,
}

impl FaceRegion {
    /// Create a region; confidence is clamped to `[0, 1]`.
    pub fn new(x: f32, y: f32, width: f32, height: f32, confidence: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Rectangle area in square pixels (0 for degenerate rectangles).
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Padded ellipse inscribed in the rectangle.
    pub fn ellipse(&self, padding: f32) -> Ellipse {
        let pad = 1.0 + padding.max(0.0);
        Ellipse {
            cx: self.x + self.width * 0.5,
            cy: self.y + self.height * 0.5,
            rx: (self.width * 0.5 * pad).max(0.0),
            ry: (self.height * 0.5 * pad).max(0.0),
        }
    }

    fn scaled(&self, sx: f32, sy: f32) -> Self {
        Self {
            x: self.x * sx,
            y: self.y * sy,
            width: self.width * sx,
            height: self.height * sy,
            confidence: self.confidence,
        }
    }
}

/// Soft-edge ellipse derived from a [`FaceRegion`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ellipse {
    /// Center x in pixels.
    pub cx: f32,
    /// Center y in pixels.
    pub cy: f32,
    /// Horizontal radius in pixels.
    pub rx: f32,
    /// Vertical radius in pixels.
    pub ry: f32,
}

impl Ellipse {
    /// Normalized distance of the pixel center `(px + 0.5, py + 0.5)`: 1.0 on the boundary.
    pub fn normalized_distance(&self, px: u32, py: u32) -> f32 {
        let dx = (px as f32 + 0.5 - self.cx) / self.rx;
        let dy = (py as f32 + 0.5 - self.cy) / self.ry;
        (dx * dx + dy * dy).sqrt()
    }

    /// Alpha at `(px, py)`: full inside `core`, smoothstep falloff to 0 at the boundary.
    pub fn alpha_at(&self, px: u32, py: u32, core: f32) -> u8 {
        let d = self.normalized_distance(px, py);
        if d >= 1.0 {
            return 0;
        }
        if d <= core {
            return 255;
        }
        let t = (d - core) / (1.0 - core);
        ((1.0 - smoothstep01(t)) * 255.0).round() as u8
    }

    /// Pixel bounds of the ellipse clamped to a `width x height` frame.
    pub(crate) fn clamped_bounds(&self, width: u32, height: u32) -> Option<PixelRect> {
        if self.rx <= 0.0 || self.ry <= 0.0 || !self.rx.is_finite() || !self.ry.is_finite() {
            return None;
        }
        let clamp = |v: f32, max: u32| v.floor().clamp(0.0, max as f32) as u32;
        let rect = PixelRect {
            x0: clamp(self.cx - self.rx, width),
            y0: clamp(self.cy - self.ry, height),
            x1: clamp((self.cx + self.rx).ceil(), width),
            y1: clamp((self.cy + self.ry).ceil(), height),
        };
        (!rect.is_empty()).then_some(rect)
    }
}

/// Half-open pixel rectangle `[x0, x1) x [y0, y1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PixelRect {
    pub(crate) x0: u32,
    pub(crate) y0: u32,
    pub(crate) x1: u32,
    pub(crate) y1: u32,
}

impl PixelRect {
    pub(crate) fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }

    pub(crate) fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    pub(crate) fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }

    /// Grow by `by` pixels on every side, clamped to a `width x height` frame.
    pub(crate) fn expand_clamped(&self, by: u32, width: u32, height: u32) -> Self {
        Self {
            x0: self.x0.saturating_sub(by),
            y0: self.y0.saturating_sub(by),
            x1: self.x1.saturating_add(by).min(width),
            y1: self.y1.saturating_add(by).min(height),
        }
    }
}

/// Face regions detected on one frame.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RegionFrame {
    /// Width of the frame the regions were detected on.
    pub frame_width: u32,
    /// Height of the frame the regions were detected on.
    pub frame_height: u32,
    /// Detected faces. May be empty (a detection pass ran and found nothing).
    pub regions: Vec<FaceRegion>,
    /// Regions below this confidence are ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f32>,
}

impl RegionFrame {
    /// Regions for a `frame_width x frame_height` frame.
    pub fn new(frame_width: u32, frame_height: u32, regions: Vec<FaceRegion>) -> Self {
        Self {
            frame_width,
            frame_height,
            regions,
            min_confidence: None,
        }
    }

    /// Set the minimum confidence filter.
    pub fn with_min_confidence(mut self, min_confidence: f32) -> Self {
        self.min_confidence = Some(min_confidence);
        self
    }

    /// Regions passing the confidence filter.
    pub fn active_regions(&self) -> impl Iterator<Item = &FaceRegion> {
        let min = self.min_confidence.unwrap_or(0.0);
        self.regions.iter().filter(move |r| r.confidence >= min)
    }
}

/// Rasterize `frame`'s active regions into `alpha` and `radius` (both `width * height`).
///
/// Buffers must be zeroed by the caller. Overlaps keep the per-pixel maximum of both alpha and
/// radius. Returns `true` when any pixel received alpha.
pub(crate) fn rasterize_regions(
    frame: &RegionFrame,
    width: u32,
    height: u32,
    base_radius: u32,
    tuning: &BlurTuning,
    alpha: &mut [u8],
    radius: &mut [u16],
) -> bool {
    let (sx, sy) = if frame.frame_width > 0 && frame.frame_height > 0 {
        (
            width as f32 / frame.frame_width as f32,
            height as f32 / frame.frame_height as f32,
        )
    } else {
        (1.0, 1.0)
    };
    let frame_area = (width as f32 * height as f32).max(1.0);
    let w = width as usize;
    let mut any = false;

    for region in frame.active_regions() {
        let region = region.scaled(sx, sy);
        let scale = tuning.radius_scale(region.area() / frame_area);
        let r = ((base_radius as f32 * scale).round() as u32).clamp(1, u32::from(u16::MAX)) as u16;
        let ellipse = region.ellipse(tuning.region_padding);
        let Some(bounds) = ellipse.clamped_bounds(width, height) else {
            continue;
        };

        for y in bounds.y0..bounds.y1 {
            let row = y as usize * w;
            for x in bounds.x0..bounds.x1 {
                let a = ellipse.alpha_at(x, y, tuning.ellipse_core);
                if a == 0 {
                    continue;
                }
                let i = row + x as usize;
                alpha[i] = alpha[i].max(a);
                radius[i] = radius[i].max(r);
                any = true;
            }
        }
    }
    any
}

#[cfg(test)]
#[path = "../../tests/unit/mask/region.rs"]
mod tests;
