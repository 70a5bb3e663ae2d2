use crate::foundation::error::{VeilcutError, VeilcutResult};
use crate::frame::{FrameRgba, RGBA_BPP};
use crate::mask::region::PixelRect;

/// Summed-area table over the RGB channels of a frame sub-rectangle.
///
/// Entries are `u64`, so sums stay exact for any frame size (an 8K frame of 255s totals ~8.5e9).
#[derive(Debug, Default)]
pub(crate) struct SummedAreaTable {
    rect: Option<PixelRect>,
    cols: usize,
    sums: Vec<[u64; 3]>,
}

impl SummedAreaTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Build the table over `rect` of `frame`. Reuses the allocation across calls.
    pub(crate) fn build(&mut self, frame: &FrameRgba, rect: PixelRect) -> VeilcutResult<()> {
        let cols = rect.width() as usize + 1;
        let rows = rect.height() as usize + 1;
        let len = cols
            .checked_mul(rows)
            .ok_or_else(|| VeilcutError::validation("summed-area table size overflow"))?;
        if self.sums.capacity() < len {
            self.sums
                .try_reserve_exact(len - self.sums.len())
                .map_err(|e| VeilcutError::resource(format!("summed-area table ({len}): {e}")))?;
        }
        self.sums.clear();
        self.sums.resize(len, [0; 3]);
        self.cols = cols;
        self.rect = Some(rect);

        for (ty, y) in (rect.y0..rect.y1).enumerate() {
            let px = &frame.row(y)[rect.x0 as usize * RGBA_BPP..rect.x1 as usize * RGBA_BPP];
            let mut run = [0u64; 3];
            let above = ty * cols;
            let here = (ty + 1) * cols;
            for (tx, p) in px.chunks_exact(RGBA_BPP).enumerate() {
                for c in 0..3 {
                    run[c] += u64::from(p[c]);
                }
                let up = self.sums[above + tx + 1];
                self.sums[here + tx + 1] = [up[0] + run[0], up[1] + run[1], up[2] + run[2]];
            }
        }
        Ok(())
    }

    /// Sum of RGB over the absolute frame window `[x0, x1) x [y0, y1)`.
    ///
    /// The window must lie inside the rectangle the table was built over.
    pub(crate) fn window_sum(&self, x0: u32, y0: u32, x1: u32, y1: u32) -> [u64; 3] {
        let Some(rect) = self.rect else {
            return [0; 3];
        };
        debug_assert!(x0 >= rect.x0 && x1 <= rect.x1 && y0 >= rect.y0 && y1 <= rect.y1);
        let (lx0, lx1) = ((x0 - rect.x0) as usize, (x1 - rect.x0) as usize);
        let (ly0, ly1) = ((y0 - rect.y0) as usize, (y1 - rect.y0) as usize);
        let a = self.sums[ly0 * self.cols + lx0];
        let b = self.sums[ly0 * self.cols + lx1];
        let c = self.sums[ly1 * self.cols + lx0];
        let d = self.sums[ly1 * self.cols + lx1];
        let mut out = [0u64; 3];
        for i in 0..3 {
            out[i] = d[i] + a[i] - b[i] - c[i];
        }
        out
    }
}

#[cfg(test)]
#[path = "../../tests/unit/mask/sat.rs"]
mod tests;
