use ffmpeg_next as ffmpeg;
use ffmpeg::format::Pixel;
use ffmpeg::{Packet, frame};

use crate::decode::convert::FrameConverter;
use crate::decode::hwaccel::{self, HwAccel, HwDecode, HwStatus};
use crate::foundation::error::{VeilcutError, VeilcutResult};
use crate::frame::FrameRgba;

/// Result of asking the decoder for its next frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Received {
    /// A frame is waiting in the decoder's scratch slot.
    Frame { pts: Option<i64> },
    /// The decoder wants another packet.
    NeedInput,
    /// The decoder is fully drained.
    Eof,
}

/// A video decoder plus its optional hardware device and RGBA converter.
///
/// Shared by random-access sessions and the export loop.
pub(crate) struct VideoDecoder {
    // Field order matters: the decoder must drop before the hardware state it points into.
    decoder: ffmpeg::decoder::Video,
    hw: Option<HwDecode>,
    hw_status: HwStatus,
    converter: FrameConverter,
    decoded: frame::Video,
    eof_sent: bool,
}

impl VideoDecoder {
    pub(crate) fn open(params: ffmpeg::codec::Parameters, mode: HwAccel) -> VeilcutResult<Self> {
        if mode == HwAccel::Off {
            return Self::open_with(params, None, HwStatus::Disabled);
        }
        match Self::open_hw(params.clone()) {
            Ok(decoder) => Ok(decoder),
            Err(reason) => {
                tracing::debug!(%reason, "hardware decode unavailable, using software");
                Self::open_with(params, None, HwStatus::Unavailable(reason))
            }
        }
    }

    /// Attach a device and open on it. Errors carry the reason for the software fallback.
    fn open_hw(params: ffmpeg::codec::Parameters) -> Result<Self, String> {
        let mut ctx =
            ffmpeg::codec::context::Context::from_parameters(params).map_err(|e| e.to_string())?;
        let codec = ffmpeg::decoder::find(ctx.id()).ok_or("no decoder")?;
        let hw = hwaccel::attach(&mut ctx, codec)?;
        let name = hw.name();
        let status = hw.status();
        Self::finish_open(ctx, codec, Some(hw), status)
            .map_err(|e| format!("{name}: decoder open failed: {e}"))
    }

    fn open_with(
        params: ffmpeg::codec::Parameters,
        hw: Option<HwDecode>,
        hw_status: HwStatus,
    ) -> VeilcutResult<Self> {
        let ctx = ffmpeg::codec::context::Context::from_parameters(params)?;
        let codec_id = ctx.id();
        let codec = ffmpeg::decoder::find(codec_id)
            .ok_or_else(|| VeilcutError::decode(format!("no decoder for codec {codec_id:?}")))?;
        Self::finish_open(ctx, codec, hw, hw_status)
    }

    fn finish_open(
        ctx: ffmpeg::codec::context::Context,
        codec: ffmpeg::Codec,
        hw: Option<HwDecode>,
        hw_status: HwStatus,
    ) -> VeilcutResult<Self> {
        let codec_id = codec.id();
        let decoder = ctx
            .decoder()
            .open_as(codec)
            .and_then(|opened| opened.video())
            .map_err(|e| VeilcutError::decode(format!("open {codec_id:?} decoder: {e}")))?;

        Ok(Self {
            decoder,
            hw,
            hw_status,
            converter: FrameConverter::new(Pixel::RGBA),
            decoded: frame::Video::empty(),
            eof_sent: false,
        })
    }

    pub(crate) fn hw_status(&self) -> HwStatus {
        match &self.hw {
            Some(hw) => hw.status(),
            None => self.hw_status.clone(),
        }
    }

    pub(crate) fn width(&self) -> u32 {
        self.decoder.width()
    }

    pub(crate) fn height(&self) -> u32 {
        self.decoder.height()
    }

    /// Submit one packet. Errors are per-packet and leave the decoder usable.
    pub(crate) fn send_packet(&mut self, packet: &Packet) -> Result<(), ffmpeg::Error> {
        self.decoder.send_packet(packet)
    }

    /// Signal end of input so buffered frames drain. Idempotent until the next flush.
    pub(crate) fn send_eof(&mut self) {
        if self.eof_sent {
            return;
        }
        self.eof_sent = true;
        if let Err(e) = self.decoder.send_eof() {
            tracing::debug!(error = %e, "decoder rejected end of stream");
        }
    }

    /// Drop buffered frames after a seek.
    pub(crate) fn flush(&mut self) {
        self.decoder.flush();
        self.eof_sent = false;
    }

    /// Pull the next frame into the scratch slot without converting it.
    pub(crate) fn receive(&mut self) -> Received {
        match self.decoder.receive_frame(&mut self.decoded) {
            Ok(()) => Received::Frame {
                pts: self.decoded.timestamp().or(self.decoded.pts()),
            },
            Err(ffmpeg::Error::Eof) => Received::Eof,
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => {
                if self.eof_sent {
                    Received::Eof
                } else {
                    Received::NeedInput
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "decoder failed to produce a frame");
                if self.eof_sent {
                    Received::Eof
                } else {
                    Received::NeedInput
                }
            }
        }
    }

    /// Convert the last received frame to RGBA, downloading it from the device first if needed.
    pub(crate) fn convert_into(&mut self, out: &mut FrameRgba) -> VeilcutResult<()> {
        let transferred;
        let src = match &self.hw {
            Some(hw) if hw.is_hw_frame(&self.decoded) => {
                transferred = hwaccel::transfer_to_system(&self.decoded)
                    .map_err(|e| VeilcutError::decode(format!("hardware frame download: {e}")))?;
                &transferred
            }
            _ => &self.decoded,
        };
        self.converter.convert_into_rgba(src, out)
    }
}
