//! Masked blur compositing.
//!
//! A frame is blurred under either a painted [`AlphaMask`] or a set of [`FaceRegion`]s. Blur is
//! a per-pixel variable-radius box filter evaluated from a summed-area table built only over the
//! masked area, and mask alpha is smoothed over time so intermittent detections do not flicker.

pub(crate) mod compositor;
pub(crate) mod region;
pub(crate) mod sat;
pub(crate) mod source;
pub(crate) mod temporal;
pub(crate) mod track;
pub(crate) mod tuning;

pub use compositor::MaskCompositor;
pub use region::{Ellipse, FaceRegion, RegionFrame};
pub use source::{AlphaMask, FrameMask, MaskSource, MaskStore, NoMasks};
pub use track::RegionTrack;
pub use tuning::{BlurTuning, RadiusTier};
