use std::collections::BTreeMap;
use std::path::Path;

use crate::foundation::core::FrameIndex;
use crate::foundation::error::{VeilcutError, VeilcutResult};
use crate::mask::region::RegionFrame;
use crate::mask::track::RegionTrack;

/// Hand-painted per-pixel alpha, tightly packed, one byte per pixel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlphaMask {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height` alpha bytes, row-major.
    pub data: Vec<u8>,
}

impl AlphaMask {
    /// Wrap existing alpha bytes.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> VeilcutResult<Self> {
        if data.len() != width as usize * height as usize {
            return Err(VeilcutError::validation(format!(
                "alpha mask holds {} bytes, expected {}x{}",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A mask with every pixel set to `value`.
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    /// Load a mask from an image file; luminance is used as alpha.
    pub fn from_image_path(path: impl AsRef<Path>) -> VeilcutResult<Self> {
        use anyhow::Context as _;
        let path = path.as_ref();
        let img = image::open(path)
            .with_context(|| format!("open mask image '{}'", path.display()))?
            .to_luma8();
        let (width, height) = img.dimensions();
        Self::new(width, height, img.into_raw())
    }
}

/// What to blur on one frame. Exactly one variant is consulted per frame.
#[derive(Clone, Copy, Debug)]
pub enum FrameMask<'a> {
    /// Per-pixel alpha; ignored when its size differs from the frame.
    Dense(&'a AlphaMask),
    /// Face regions, rasterized into soft ellipses.
    Regions(&'a RegionFrame),
    /// Nothing to blur.
    None,
}

/// Synchronous per-frame mask lookup consulted by the export pipeline.
///
/// Implementations must be pure lookups; the pipeline never mutates the source.
pub trait MaskSource {
    /// Mask for frame `index`.
    fn mask_for(&self, index: FrameIndex) -> FrameMask<'_>;
}

/// A source with no masks anywhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoMasks;

impl MaskSource for NoMasks {
    fn mask_for(&self, _index: FrameIndex) -> FrameMask<'_> {
        FrameMask::None
    }
}

impl<T: MaskSource + ?Sized> MaskSource for &T {
    fn mask_for(&self, index: FrameIndex) -> FrameMask<'_> {
        (**self).mask_for(index)
    }
}

/// In-memory mask source combining painted masks and detected regions.
///
/// A painted mask on a frame always wins over regions recorded for the same frame.
#[derive(Clone, Debug, Default)]
pub struct MaskStore {
    dense: BTreeMap<u64, AlphaMask>,
    track: RegionTrack,
}

impl MaskStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with detected regions.
    pub fn from_track(track: RegionTrack) -> Self {
        Self {
            dense: BTreeMap::new(),
            track,
        }
    }

    /// Set the painted mask for `index`, returning the one it replaced.
    pub fn insert_dense(&mut self, index: FrameIndex, mask: AlphaMask) -> Option<AlphaMask> {
        self.dense.insert(index.0, mask)
    }

    /// Set the regions for `index`, returning the ones they replaced.
    pub fn insert_regions(&mut self, index: FrameIndex, regions: RegionFrame) -> Option<RegionFrame> {
        self.track.insert(index, regions)
    }

    /// Remove both painted mask and regions for `index`.
    pub fn clear_frame(&mut self, index: FrameIndex) {
        self.dense.remove(&index.0);
        self.track.remove(index);
    }

    /// Number of frames with a painted mask.
    pub fn dense_len(&self) -> usize {
        self.dense.len()
    }

    /// Borrow the region track.
    pub fn track(&self) -> &RegionTrack {
        &self.track
    }

    /// Load every `<frame index>.png` in `dir` as a painted mask. Returns how many were loaded.
    ///
    /// Files whose stem is not a frame index are skipped.
    pub fn load_dense_dir(&mut self, dir: impl AsRef<Path>) -> VeilcutResult<usize> {
        use anyhow::Context as _;
        let dir = dir.as_ref();
        let mut loaded = 0usize;
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("read mask directory '{}'", dir.display()))?
        {
            let path = entry
                .with_context(|| format!("read mask directory '{}'", dir.display()))?
                .path();
            let is_png = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("png"));
            let index = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<u64>().ok());
            let (true, Some(index)) = (is_png, index) else {
                tracing::debug!(path = %path.display(), "skipping non-mask file");
                continue;
            };
            self.dense
                .insert(index, AlphaMask::from_image_path(&path)?);
            loaded += 1;
        }
        Ok(loaded)
    }
}

impl MaskSource for MaskStore {
    fn mask_for(&self, index: FrameIndex) -> FrameMask<'_> {
        if let Some(mask) = self.dense.get(&index.0) {
            return FrameMask::Dense(mask);
        }
        self.track.mask_for(index)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/mask/source.rs"]
mod tests;
