//! veilcut decodes video frame-accurately, blurs masked regions and re-encodes the result.
//!
//! The pieces compose leaves-first:
//!
//! - Open a [`DecodeSession`] for exact random access or sequential reads
//! - Blur frames with a [`MaskCompositor`] driven by a [`MaskSource`] (dense masks or face
//!   regions, with temporal smoothing)
//! - Re-encode a whole file with [`export`], which negotiates codecs and audio against the
//!   output container and falls back instead of failing
//! - Optionally build a [`RegionTrack`] from a pluggable [`FaceDetector`] with [`scan_faces`]
#![deny(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Frame-accurate decoding.
pub mod decode;
/// Automatic face scans.
pub mod detect;
/// Masked re-encode pipeline.
pub mod export;
/// Working frame buffer.
pub mod frame;
/// Masks, face regions and the blur compositor.
pub mod mask;
/// Cancellation and progress reporting.
pub mod progress;

pub use crate::foundation::core::{
    FrameIndex, FrameRange, Fps, TimeBase, frame_to_pts, pts_to_frame,
};
pub use crate::foundation::error::{VeilcutError, VeilcutResult};

pub use crate::decode::{
    DecodeOpts, DecodeSession, HwAccel, HwStatus, SessionCache, VideoInfo, init_ffmpeg,
};
pub use crate::detect::{FaceDetector, ScanOpts, scan_faces};
pub use crate::export::{AudioPath, ExportOpts, ExportOutcome, ExportStatus, export};
pub use crate::frame::FrameRgba;
pub use crate::mask::{
    AlphaMask, BlurTuning, Ellipse, FaceRegion, FrameMask, MaskCompositor, MaskSource, MaskStore,
    NoMasks, RadiusTier, RegionFrame, RegionTrack,
};
pub use crate::progress::{CancelToken, NoProgress, ProgressSink};
