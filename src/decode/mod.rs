//! Frame-accurate decoding on top of libav.
//!
//! [`DecodeSession`] owns one open input and its decoder. Random access seeks backward to a
//! keyframe and decodes forward to the exact target; sequential reads seek once and then stream.

pub(crate) mod convert;
pub(crate) mod hwaccel;
pub(crate) mod session;
pub(crate) mod video;

use std::sync::OnceLock;

use crate::foundation::error::{VeilcutError, VeilcutResult};

pub use hwaccel::{HwAccel, HwStatus};
pub use session::{DecodeOpts, DecodeSession, SessionCache, VideoInfo};

/// Initialize libav once per process. Safe to call repeatedly.
pub fn init_ffmpeg() -> VeilcutResult<()> {
    static INIT: OnceLock<Result<(), ffmpeg_next::Error>> = OnceLock::new();
    let res = *INIT.get_or_init(|| {
        ffmpeg_next::init()?;
        ffmpeg_next::util::log::set_level(ffmpeg_next::util::log::Level::Error);
        Ok(())
    });
    res.map_err(|e| VeilcutError::decode(format!("ffmpeg initialization failed: {e}")))
}
