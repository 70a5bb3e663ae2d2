//! Re-encode a video with masked regions blurred.
//!
//! The pipeline decodes, composites and encodes one frame at a time on the calling thread.
//! Video codec and audio path are negotiated against the output container with fallbacks;
//! see [`export`].

pub(crate) mod audio;
pub(crate) mod ffi;
pub(crate) mod fifo;
pub(crate) mod pipeline;
pub(crate) mod video_encode;

pub use pipeline::{AudioPath, ExportOpts, ExportOutcome, ExportStatus, ensure_parent_dir, export};
