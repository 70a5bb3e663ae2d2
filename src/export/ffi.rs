//! Muxer queries the safe wrapper does not expose.
#![allow(unsafe_code)]

use ffmpeg_next as ffmpeg;
use ffmpeg::{codec, format, media};

// FF_COMPLIANCE_NORMAL
const COMPLIANCE_NORMAL: i32 = 0;

/// Return `true` only when the output container positively accepts `id`.
///
/// `avformat_query_codec` answers 1 (yes), 0 (no) or a negative "don't know"; anything but a
/// definite yes routes through the fallback chain.
pub(crate) fn container_accepts(octx: &format::context::Output, id: codec::Id) -> bool {
    if id == codec::Id::None {
        return false;
    }
    // SAFETY: `octx` owns a valid AVFormatContext whose `oformat` was set when it was allocated.
    unsafe {
        let ofmt = (*octx.as_ptr()).oformat;
        !ofmt.is_null() && ffmpeg::ffi::avformat_query_codec(ofmt, id.into(), COMPLIANCE_NORMAL) > 0
    }
}

/// The container's preferred codec for `kind`, if it declares one.
pub(crate) fn container_default_codec(
    octx: &format::context::Output,
    kind: media::Type,
) -> Option<codec::Id> {
    // SAFETY: as in `container_accepts`; the codec id fields are plain enums.
    let id = unsafe {
        let ofmt = (*octx.as_ptr()).oformat;
        if ofmt.is_null() {
            return None;
        }
        match kind {
            media::Type::Video => (*ofmt).video_codec,
            media::Type::Audio => (*ofmt).audio_codec,
            _ => return None,
        }
    };
    match codec::Id::from(id) {
        codec::Id::None => None,
        id => Some(id),
    }
}

/// Clear a copied stream's codec tag so the muxer picks one valid for its own container.
pub(crate) fn clear_codec_tag(stream: &mut format::stream::StreamMut<'_>) {
    // SAFETY: the stream belongs to an output context that is not yet writing; codecpar is valid.
    unsafe {
        (*stream.parameters().as_mut_ptr()).codec_tag = 0;
    }
}
