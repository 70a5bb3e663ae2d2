use crate::foundation::error::{VeilcutError, VeilcutResult};
use crate::foundation::math::lerp_u8;
use crate::frame::{FrameRgba, RGBA_BPP};
use crate::mask::region::{PixelRect, rasterize_regions};
use crate::mask::sat::SummedAreaTable;
use crate::mask::source::FrameMask;
use crate::mask::temporal::TemporalAlpha;
use crate::mask::tuning::BlurTuning;

/// Applies variable-radius box blur under a mask, one frame at a time.
///
/// A compositor carries temporal alpha history, so one instance serves one export pass over one
/// video. Scratch buffers (alpha, radius, summed-area table) are reused between frames.
#[derive(Debug)]
pub struct MaskCompositor {
    tuning: BlurTuning,
    decay_lut: [u8; 256],
    temporal: TemporalAlpha,
    alpha: Vec<u8>,
    radius: Vec<u16>,
    sat: SummedAreaTable,
}

impl MaskCompositor {
    /// Create a compositor with validated tuning.
    pub fn new(tuning: BlurTuning) -> VeilcutResult<Self> {
        tuning.validate()?;
        Ok(Self {
            decay_lut: tuning.decay_lut(),
            tuning,
            temporal: TemporalAlpha::new(),
            alpha: Vec::new(),
            radius: Vec::new(),
            sat: SummedAreaTable::new(),
        })
    }

    /// Tuning in use.
    pub fn tuning(&self) -> &BlurTuning {
        &self.tuning
    }

    /// Forget temporal history. Call at the start of every export pass.
    pub fn reset(&mut self) {
        self.temporal.reset();
    }

    /// Blur `frame` in place under `mask`.
    ///
    /// Returns `true` when any pixel was modified. Frames whose effective alpha is zero everywhere
    /// are left byte-for-byte unchanged, padding included.
    pub fn apply_masked_blur(
        &mut self,
        frame: &mut FrameRgba,
        mask: FrameMask<'_>,
        blur_radius: u32,
    ) -> VeilcutResult<bool> {
        frame.validate()?;
        let (w, h) = (frame.width, frame.height);
        if w == 0 || h == 0 {
            return Ok(false);
        }
        self.temporal.ensure_dims(w, h)?;
        let n = w as usize * h as usize;
        let base = blur_radius.min(u32::from(u16::MAX)) as u16;

        match mask {
            FrameMask::None => {
                self.temporal.decay(&self.decay_lut);
                return Ok(false);
            }
            FrameMask::Dense(m) if m.width != w || m.height != h => {
                tracing::debug!(
                    mask_w = m.width,
                    mask_h = m.height,
                    frame_w = w,
                    frame_h = h,
                    "dense mask size does not match frame, ignoring"
                );
                self.temporal.decay(&self.decay_lut);
                return Ok(false);
            }
            FrameMask::Dense(m) => {
                self.prepare_scratch(n)?;
                self.alpha.copy_from_slice(&m.data);
                self.radius.fill(base);
            }
            FrameMask::Regions(regions) => {
                self.prepare_scratch(n)?;
                rasterize_regions(
                    regions,
                    w,
                    h,
                    blur_radius,
                    &self.tuning,
                    &mut self.alpha,
                    &mut self.radius,
                );
            }
        }

        let any = self
            .temporal
            .integrate(&mut self.alpha, &mut self.radius, &self.decay_lut);
        if !any || blur_radius == 0 {
            return Ok(false);
        }

        let Some((bbox, max_r)) = self.active_bounds(w, h) else {
            return Ok(false);
        };
        let support = bbox.expand_clamped(u32::from(max_r), w, h);
        self.sat.build(frame, support)?;
        self.blend(frame, bbox);
        Ok(true)
    }

    fn prepare_scratch(&mut self, n: usize) -> VeilcutResult<()> {
        if self.alpha.len() < n {
            self.alpha
                .try_reserve_exact(n - self.alpha.len())
                .map_err(|e| VeilcutError::resource(format!("alpha scratch ({n} px): {e}")))?;
        }
        if self.radius.len() < n {
            self.radius
                .try_reserve_exact(n - self.radius.len())
                .map_err(|e| VeilcutError::resource(format!("radius scratch ({n} px): {e}")))?;
        }
        self.alpha.clear();
        self.alpha.resize(n, 0);
        self.radius.clear();
        self.radius.resize(n, 0);
        Ok(())
    }

    /// Bounding box of pixels with nonzero alpha and radius, plus the largest radius among them.
    fn active_bounds(&self, w: u32, h: u32) -> Option<(PixelRect, u16)> {
        let mut rect = PixelRect {
            x0: w,
            y0: h,
            x1: 0,
            y1: 0,
        };
        let mut max_r = 0u16;
        for y in 0..h {
            let row = y as usize * w as usize;
            for x in 0..w {
                let i = row + x as usize;
                if self.alpha[i] == 0 || self.radius[i] == 0 {
                    continue;
                }
                rect.x0 = rect.x0.min(x);
                rect.y0 = rect.y0.min(y);
                rect.x1 = rect.x1.max(x + 1);
                rect.y1 = rect.y1.max(y + 1);
                max_r = max_r.max(self.radius[i]);
            }
        }
        (!rect.is_empty()).then_some((rect, max_r))
    }

    fn blend(&self, frame: &mut FrameRgba, bbox: PixelRect) {
        let (w, h) = (frame.width, frame.height);
        for y in bbox.y0..bbox.y1 {
            let mask_row = y as usize * w as usize;
            let row = frame.row_mut(y);
            for x in bbox.x0..bbox.x1 {
                let i = mask_row + x as usize;
                let a = self.alpha[i];
                let r = u32::from(self.radius[i]);
                if a == 0 || r == 0 {
                    continue;
                }
                let x0 = x.saturating_sub(r);
                let x1 = (x + r + 1).min(w);
                let y0 = y.saturating_sub(r);
                let y1 = (y + r + 1).min(h);
                let count = u64::from(x1 - x0) * u64::from(y1 - y0);
                let sums = self.sat.window_sum(x0, y0, x1, y1);

                let px = &mut row[x as usize * RGBA_BPP..(x as usize + 1) * RGBA_BPP];
                for c in 0..3 {
                    let avg = ((sums[c] + count / 2) / count) as u8;
                    px[c] = lerp_u8(px[c], avg, a);
                }
                px[3] = 255;
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/mask/compositor.rs"]
mod tests;
