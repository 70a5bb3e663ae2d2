use std::collections::BTreeMap;
use std::path::Path;

use crate::foundation::core::FrameIndex;
use crate::foundation::error::{VeilcutError, VeilcutResult};
use crate::mask::region::RegionFrame;
use crate::mask::source::{FrameMask, MaskSource};

/// Face regions per frame, as produced by a detection scan.
///
/// Serializes as `{"frames": {"<index>": RegionFrame, ...}}`.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RegionTrack {
    frames: BTreeMap<u64, RegionFrame>,
}

impl RegionTrack {
    /// Empty track.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a track from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> VeilcutResult<Self> {
        use anyhow::Context as _;
        let path = path.as_ref();
        let bytes =
            std::fs::read(path).with_context(|| format!("read region track '{}'", path.display()))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| VeilcutError::serde(format!("region track '{}': {e}", path.display())))
    }

    /// Write the track as pretty JSON.
    pub fn to_path(&self, path: impl AsRef<Path>) -> VeilcutResult<()> {
        use anyhow::Context as _;
        let path = path.as_ref();
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| VeilcutError::serde(format!("region track: {e}")))?;
        std::fs::write(path, json)
            .with_context(|| format!("write region track '{}'", path.display()))?;
        Ok(())
    }

    /// Record regions for `index`.
    pub fn insert(&mut self, index: FrameIndex, frame: RegionFrame) -> Option<RegionFrame> {
        self.frames.insert(index.0, frame)
    }

    /// Forget regions for `index`.
    pub fn remove(&mut self, index: FrameIndex) -> Option<RegionFrame> {
        self.frames.remove(&index.0)
    }

    /// Regions recorded for `index`, if a detection ran on it.
    pub fn get(&self, index: FrameIndex) -> Option<&RegionFrame> {
        self.frames.get(&index.0)
    }

    /// Number of recorded frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Return `true` when no frame was recorded.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (FrameIndex, &RegionFrame)> {
        self.frames.iter().map(|(k, v)| (FrameIndex(*k), v))
    }

    /// Move every frame of `other` into `self`; `other` wins on collisions.
    pub fn merge(&mut self, other: RegionTrack) {
        self.frames.extend(other.frames);
    }
}

impl MaskSource for RegionTrack {
    fn mask_for(&self, index: FrameIndex) -> FrameMask<'_> {
        match self.frames.get(&index.0) {
            Some(frame) => FrameMask::Regions(frame),
            None => FrameMask::None,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/mask/track.rs"]
mod tests;
