use ffmpeg_next as ffmpeg;
use ffmpeg::format::Pixel;
use ffmpeg::{Packet, Rational, codec, encoder, format, frame, media};

use crate::decode::convert::{FrameConverter, fill_video_from_rgba};
use crate::export::ffi;
use crate::foundation::core::Fps;
use crate::foundation::error::{VeilcutError, VeilcutResult};
use crate::frame::FrameRgba;

/// Codecs tried after the source codec and the container default, in order.
pub(crate) const VIDEO_FALLBACKS: [codec::Id; 2] = [codec::Id::H264, codec::Id::MPEG4];

/// Candidate order: requested (or source) codec, container default, then the fixed fallbacks.
/// Duplicates and `None` are removed, first occurrence wins.
pub(crate) fn video_candidates(first: codec::Id, container_default: Option<codec::Id>) -> Vec<codec::Id> {
    let mut out = Vec::with_capacity(2 + VIDEO_FALLBACKS.len());
    for id in std::iter::once(first)
        .chain(container_default)
        .chain(VIDEO_FALLBACKS)
    {
        if id != codec::Id::None && !out.contains(&id) {
            out.push(id);
        }
    }
    out
}

/// Pick the encoder input format: yuv420p when offered, else the codec's first format.
pub(crate) fn pick_pixel_format(supported: Option<Vec<Pixel>>) -> Pixel {
    match supported {
        Some(formats) if !formats.is_empty() => {
            if formats.contains(&Pixel::YUV420P) {
                Pixel::YUV420P
            } else {
                formats[0]
            }
        }
        _ => Pixel::YUV420P,
    }
}

/// An opened video encoder plus its output stream and RGBA input path.
pub(crate) struct VideoEncoder {
    encoder: encoder::video::Encoder,
    codec_id: codec::Id,
    stream_index: usize,
    time_base: Rational,
    stream_time_base: Rational,
    rgba: frame::Video,
    converter: FrameConverter,
    last_pts: Option<i64>,
    frames: u64,
}

impl VideoEncoder {
    /// Walk the candidate chain and open the first codec the container and libav both accept.
    ///
    /// Every skipped candidate adds a human-readable note to `notices`.
    pub(crate) fn negotiate(
        octx: &mut format::context::Output,
        first: codec::Id,
        width: u32,
        height: u32,
        fps: Fps,
        notices: &mut Vec<String>,
    ) -> VeilcutResult<Self> {
        let default = ffi::container_default_codec(octx, media::Type::Video);
        let candidates = video_candidates(first, default);
        let mut failures = Vec::new();

        for (i, id) in candidates.iter().copied().enumerate() {
            if !ffi::container_accepts(octx, id) {
                failures.push(format!("{} not accepted by container", id.name()));
                continue;
            }
            let Some(codec) = encoder::find(id) else {
                failures.push(format!("no {} encoder available", id.name()));
                continue;
            };
            match Self::open(octx, codec, id, width, height, fps) {
                Ok(enc) => {
                    if i > 0 {
                        let note = format!(
                            "video codec {} unavailable ({}), encoding as {}",
                            first.name(),
                            failures.join("; "),
                            id.name()
                        );
                        tracing::warn!("{note}");
                        notices.push(note);
                    }
                    return Ok(enc);
                }
                Err(e) => {
                    tracing::debug!(codec = id.name(), error = %e, "encoder open failed");
                    failures.push(format!("{} failed to open: {e}", id.name()));
                }
            }
        }

        Err(VeilcutError::encode(format!(
            "no usable video encoder: {}",
            failures.join("; ")
        )))
    }

    fn open(
        octx: &mut format::context::Output,
        codec: ffmpeg::Codec,
        id: codec::Id,
        width: u32,
        height: u32,
        fps: Fps,
    ) -> VeilcutResult<Self> {
        let global_header = octx.format().flags().contains(format::Flags::GLOBAL_HEADER);
        let supported = codec.video().ok().and_then(|v| v.formats().map(Iterator::collect));
        let pixel = pick_pixel_format(supported);
        let time_base = Rational::new(fps.den as i32, fps.num as i32);

        let mut enc = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;
        enc.set_width(width);
        enc.set_height(height);
        enc.set_format(pixel);
        enc.set_time_base(time_base);
        enc.set_frame_rate(Some(Rational::new(fps.num as i32, fps.den as i32)));
        if global_header {
            enc.set_flags(codec::Flags::GLOBAL_HEADER);
        }
        let encoder = enc.open_as(codec)?;

        let mut ost = octx.add_stream(codec)?;
        ost.set_parameters(&encoder);
        ost.set_time_base(time_base);
        let stream_index = ost.index();

        tracing::info!(codec = id.name(), ?pixel, width, height, "video encoder ready");

        Ok(Self {
            encoder,
            codec_id: id,
            stream_index,
            time_base,
            stream_time_base: time_base,
            rgba: frame::Video::empty(),
            converter: FrameConverter::with_size(pixel, width, height),
            last_pts: None,
            frames: 0,
        })
    }

    pub(crate) fn codec_id(&self) -> codec::Id {
        self.codec_id
    }

    pub(crate) fn time_base(&self) -> Rational {
        self.time_base
    }

    /// Frames submitted so far.
    pub(crate) fn frames(&self) -> u64 {
        self.frames
    }

    /// Pick up the stream time base the muxer settled on in `write_header`.
    pub(crate) fn sync_stream_time_base(&mut self, octx: &format::context::Output) {
        if let Some(stream) = octx.stream(self.stream_index) {
            self.stream_time_base = stream.time_base();
        }
    }

    /// Convert, timestamp and encode one composited frame.
    ///
    /// Frames of any size are scaled to the encoder's size. `pts` is in encoder ticks; a missing or non-increasing value becomes previous + 1.
    pub(crate) fn encode(
        &mut self,
        octx: &mut format::context::Output,
        frame: &FrameRgba,
        pts: Option<i64>,
    ) -> VeilcutResult<()> {
        fill_video_from_rgba(frame, &mut self.rgba)?;
        let pts = match (pts, self.last_pts) {
            (Some(p), Some(last)) if p <= last => last + 1,
            (Some(p), _) => p,
            (None, Some(last)) => last + 1,
            (None, None) => 0,
        };
        self.last_pts = Some(pts);

        let out = self.converter.convert(&self.rgba)?;
        out.set_pts(Some(pts));
        self.encoder
            .send_frame(out)
            .map_err(|e| VeilcutError::encode(format!("send frame {pts}: {e}")))?;
        self.frames += 1;
        self.drain(octx)
    }

    /// Signal end of stream and write every remaining packet.
    pub(crate) fn finish(&mut self, octx: &mut format::context::Output) -> VeilcutResult<()> {
        self.encoder
            .send_eof()
            .map_err(|e| VeilcutError::encode(format!("flush video encoder: {e}")))?;
        self.drain(octx)
    }

    fn drain(&mut self, octx: &mut format::context::Output) -> VeilcutResult<()> {
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.time_base, self.stream_time_base);
            packet
                .write_interleaved(octx)
                .map_err(|e| VeilcutError::encode(format!("write video packet: {e}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/export/video_encode.rs"]
mod tests;
