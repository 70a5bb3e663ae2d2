use crate::foundation::error::{VeilcutError, VeilcutResult};

/// Per-pixel leaky integrator over mask alpha.
///
/// Holds the previous frame's effective alpha (and the radius that pixel was blurred with) so a
/// detection that drops out for a frame or two keeps being blurred while it decays. The buffers
/// are always exactly `width * height` and are reallocated, never reused, on a size change.
#[derive(Debug, Default)]
pub(crate) struct TemporalAlpha {
    width: u32,
    height: u32,
    alpha: Vec<u8>,
    radius: Vec<u16>,
}

impl TemporalAlpha {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Drop all history (start of an export pass).
    pub(crate) fn reset(&mut self) {
        self.alpha.fill(0);
        self.radius.fill(0);
    }

    /// Make the state match `width x height`, discarding history when the size changed.
    pub(crate) fn ensure_dims(&mut self, width: u32, height: u32) -> VeilcutResult<()> {
        let len = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| VeilcutError::validation("temporal alpha size overflow"))?;
        if self.width == width && self.height == height && self.alpha.len() == len {
            return Ok(());
        }
        if self.width != 0 || self.height != 0 {
            tracing::debug!(
                from_w = self.width,
                from_h = self.height,
                to_w = width,
                to_h = height,
                "frame size changed, resetting temporal alpha"
            );
        }
        self.alpha = zeroed(len)?;
        self.radius = zeroed(len)?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Fold the current frame into the state.
    ///
    /// On return `cur` holds the effective alpha (`max(cur, decay*prev)` where `cur > 0`, else
    /// `decay*prev`) and `radius` the radius to blur each pixel with. Returns `true` when any
    /// effective alpha is nonzero.
    pub(crate) fn integrate(&mut self, cur: &mut [u8], radius: &mut [u16], lut: &[u8; 256]) -> bool {
        debug_assert_eq!(cur.len(), self.alpha.len());
        debug_assert_eq!(radius.len(), self.alpha.len());
        let mut any = false;
        for (((c, r), prev_a), prev_r) in cur
            .iter_mut()
            .zip(radius.iter_mut())
            .zip(self.alpha.iter_mut())
            .zip(self.radius.iter_mut())
        {
            let held = lut[usize::from(*prev_a)];
            if held > *c {
                *c = held;
                *r = *prev_r;
            }
            *prev_a = *c;
            *prev_r = if *c == 0 { 0 } else { *r };
            any |= *c != 0;
        }
        any
    }

    /// Advance one frame with no mask at all: history decays, nothing is blurred.
    pub(crate) fn decay(&mut self, lut: &[u8; 256]) {
        for (a, r) in self.alpha.iter_mut().zip(self.radius.iter_mut()) {
            *a = lut[usize::from(*a)];
            if *a == 0 {
                *r = 0;
            }
        }
    }
}

fn zeroed<T: Clone + Default>(len: usize) -> VeilcutResult<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|e| VeilcutError::resource(format!("temporal alpha ({len} px): {e}")))?;
    v.resize(len, T::default());
    Ok(v)
}

#[cfg(test)]
#[path = "../../tests/unit/mask/temporal.rs"]
mod tests;
