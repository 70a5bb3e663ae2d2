use crate::foundation::error::{VeilcutError, VeilcutResult};

/// Absolute 0-based frame index in source presentation order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

impl FrameIndex {
    /// The following frame.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

/// Half-open frame range `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrameRange {
    /// Inclusive range start.
    pub start: FrameIndex,
    /// Exclusive range end.
    pub end: FrameIndex,
}

impl FrameRange {
    /// Create a validated range with `start <= end`.
    pub fn new(start: FrameIndex, end: FrameIndex) -> VeilcutResult<Self> {
        if start.0 > end.0 {
            return Err(VeilcutError::validation("FrameRange start must be <= end"));
        }
        Ok(Self { start, end })
    }

    /// Number of frames contained in the range.
    pub fn len_frames(self) -> u64 {
        self.end.0.saturating_sub(self.start.0)
    }

    /// Return `true` when the range has no frames.
    pub fn is_empty(self) -> bool {
        self.start.0 == self.end.0
    }

    /// Return `true` when `f` is inside `[start, end)`.
    pub fn contains(self, f: FrameIndex) -> bool {
        self.start.0 <= f.0 && f.0 < self.end.0
    }

    /// Split into at most `parts` contiguous, non-empty sub-ranges of near-equal length.
    pub fn split(self, parts: usize) -> Vec<FrameRange> {
        let len = self.len_frames();
        if len == 0 || parts == 0 {
            return Vec::new();
        }
        let parts = (parts as u64).min(len);
        let base = len / parts;
        let extra = len % parts;
        let mut out = Vec::with_capacity(parts as usize);
        let mut start = self.start.0;
        for i in 0..parts {
            let n = base + u64::from(i < extra);
            out.push(FrameRange {
                start: FrameIndex(start),
                end: FrameIndex(start + n),
            });
            start += n;
        }
        out
    }
}

/// Frames-per-second as a rational `num/den`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    /// Numerator (frames).
    pub num: u32,
    /// Denominator (seconds), must be non-zero.
    pub den: u32,
}

impl Fps {
    /// Create a validated FPS value.
    pub fn new(num: u32, den: u32) -> VeilcutResult<Self> {
        if den == 0 {
            return Err(VeilcutError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(VeilcutError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    /// Convert to floating-point FPS.
    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }
}

/// Stream time base as a rational `num/den` seconds per tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TimeBase {
    /// Numerator.
    pub num: i32,
    /// Denominator.
    pub den: i32,
}

/// Map a frame index to the presentation timestamp of that frame, in stream ticks.
///
/// `start_pts` is the stream's first timestamp (0 when the container reports none). The product
/// is computed in 128-bit to keep long, high-resolution time bases exact.
pub fn frame_to_pts(index: FrameIndex, fps: Fps, tb: TimeBase, start_pts: i64) -> i64 {
    if tb.num <= 0 || tb.den <= 0 {
        return start_pts;
    }
    let num = i128::from(index.0) * i128::from(fps.den) * i128::from(tb.den);
    let den = i128::from(fps.num) * i128::from(tb.num);
    let ticks = (num + den / 2) / den;
    start_pts.saturating_add(ticks.clamp(0, i128::from(i64::MAX)) as i64)
}

/// Inverse of [`frame_to_pts`], rounding to the nearest frame.
pub fn pts_to_frame(pts: i64, fps: Fps, tb: TimeBase, start_pts: i64) -> FrameIndex {
    if tb.num <= 0 || tb.den <= 0 {
        return FrameIndex(0);
    }
    let rel = i128::from(pts.saturating_sub(start_pts)).max(0);
    let num = rel * i128::from(tb.num) * i128::from(fps.num);
    let den = i128::from(tb.den) * i128::from(fps.den);
    FrameIndex(((num + den / 2) / den).clamp(0, i128::from(i64::MAX)) as u64)
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
