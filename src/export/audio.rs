use ffmpeg_next as ffmpeg;
use ffmpeg::format::Sample;
use ffmpeg::software::resampling;
use ffmpeg::util::channel_layout::{ChannelLayout, ChannelLayoutMask};
use ffmpeg::{Packet, Rational, Rescale, codec, decoder, encoder, format, frame, media};

use crate::export::ffi;
use crate::export::fifo::SampleFifo;
use crate::foundation::error::{VeilcutError, VeilcutResult};

/// Encoders tried when the container rejects the source audio codec, after its own default.
const AUDIO_FALLBACKS: [codec::Id; 4] = [
    codec::Id::AAC,
    codec::Id::OPUS,
    codec::Id::MP2,
    codec::Id::VORBIS,
];

/// Chunk size used when the encoder accepts any frame size.
const VARIABLE_FRAME_CHUNK: usize = 1024;

/// How the source audio reaches the output, decided once per export.
pub(crate) enum AudioRoute {
    /// No audio in the output.
    Dropped,
    /// Packets are remuxed with rescaled timestamps.
    Copy {
        in_index: usize,
        out_index: usize,
        in_time_base: Rational,
        out_time_base: Rational,
    },
    /// Decode, resample, buffer, encode.
    Transcode(Box<AudioTranscoder>),
}

impl AudioRoute {
    /// Choose a route and add the output stream. Failures degrade to [`AudioRoute::Dropped`]
    /// with a notice.
    pub(crate) fn negotiate(
        ictx: &format::context::Input,
        octx: &mut format::context::Output,
        notices: &mut Vec<String>,
    ) -> Self {
        let Some(ist) = ictx.streams().best(media::Type::Audio) else {
            return Self::Dropped;
        };
        let params = ist.parameters();
        let source = params.id();

        if ffi::container_accepts(octx, source) {
            match Self::copy(octx, &ist) {
                Ok(route) => {
                    tracing::info!(codec = source.name(), "audio stream copy");
                    return route;
                }
                Err(e) => tracing::debug!(error = %e, "audio stream copy setup failed"),
            }
        }

        match AudioTranscoder::new(&ist, octx) {
            Ok(t) => {
                let note = format!(
                    "audio codec {} not supported by output container, transcoding to {}",
                    source.name(),
                    t.codec_id.name()
                );
                tracing::warn!("{note}");
                notices.push(note);
                Self::Transcode(Box::new(t))
            }
            Err(e) => {
                let note = format!("audio dropped: {e}");
                tracing::warn!("{note}");
                notices.push(note);
                Self::Dropped
            }
        }
    }

    fn copy(
        octx: &mut format::context::Output,
        ist: &format::stream::Stream<'_>,
    ) -> VeilcutResult<Self> {
        let mut ost = octx.add_stream(encoder::find(codec::Id::None))?;
        ost.set_parameters(ist.parameters());
        ffi::clear_codec_tag(&mut ost);
        Ok(Self::Copy {
            in_index: ist.index(),
            out_index: ost.index(),
            in_time_base: ist.time_base(),
            out_time_base: ist.time_base(),
        })
    }

    /// Refresh output time bases after `write_header`.
    pub(crate) fn sync_stream_time_base(&mut self, octx: &format::context::Output) {
        match self {
            Self::Dropped => {}
            Self::Copy {
                out_index,
                out_time_base,
                ..
            } => {
                if let Some(s) = octx.stream(*out_index) {
                    *out_time_base = s.time_base();
                }
            }
            Self::Transcode(t) => {
                if let Some(s) = octx.stream(t.out_index) {
                    t.stream_time_base = s.time_base();
                }
            }
        }
    }

    /// Input stream this route consumes, if any.
    pub(crate) fn input_index(&self) -> Option<usize> {
        match self {
            Self::Dropped => None,
            Self::Copy { in_index, .. } => Some(*in_index),
            Self::Transcode(t) => Some(t.in_index),
        }
    }

    /// Route one demuxed audio packet. Per-packet failures are logged and skipped.
    pub(crate) fn route(&mut self, packet: &mut Packet, octx: &mut format::context::Output) {
        match self {
            Self::Dropped => {}
            Self::Copy {
                out_index,
                in_time_base,
                out_time_base,
                ..
            } => {
                packet.rescale_ts(*in_time_base, *out_time_base);
                packet.set_position(-1);
                packet.set_stream(*out_index);
                if let Err(e) = packet.write_interleaved(octx) {
                    tracing::warn!(error = %e, "dropping audio packet");
                }
            }
            Self::Transcode(t) => {
                if let Err(e) = t.push_packet(packet, octx) {
                    tracing::warn!(error = %e, "dropping audio packet");
                }
            }
        }
    }

    /// Drain decoder, resampler and FIFO tail into the encoder and flush it.
    pub(crate) fn finish(&mut self, octx: &mut format::context::Output) -> VeilcutResult<()> {
        match self {
            Self::Transcode(t) => t.finish(octx),
            _ => Ok(()),
        }
    }
}

/// Sample format, channel count and rate of one side of the resampler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct AudioFormat {
    format: Sample,
    channels: u16,
    rate: u32,
}

impl AudioFormat {
    fn of(frame: &frame::Audio) -> Self {
        Self {
            format: frame.format(),
            channels: frame.ch_layout().channels() as u16,
            rate: frame.rate(),
        }
    }
}

/// Decoder, resampler, FIFO and encoder for one transcoded audio stream.
pub(crate) struct AudioTranscoder {
    in_index: usize,
    in_time_base: Rational,
    decoder: decoder::Audio,
    encoder: encoder::audio::Encoder,
    codec_id: codec::Id,
    out_index: usize,
    time_base: Rational,
    stream_time_base: Rational,
    resampler: Option<(AudioFormat, resampling::Context)>,
    target: AudioFormat,
    fifo: SampleFifo,
    frame_size: usize,
    fixed_frame_size: bool,
    next_pts: Option<i64>,
    decoded: frame::Audio,
}

impl AudioTranscoder {
    fn new(
        ist: &format::stream::Stream<'_>,
        octx: &mut format::context::Output,
    ) -> VeilcutResult<Self> {
        let decoder = codec::context::Context::from_parameters(ist.parameters())?
            .decoder()
            .audio()
            .map_err(|e| VeilcutError::decode(format!("open audio decoder: {e}")))?;

        let default = ffi::container_default_codec(octx, media::Type::Audio);
        let mut candidates: Vec<codec::Id> = default.into_iter().collect();
        for id in AUDIO_FALLBACKS {
            if !candidates.contains(&id) {
                candidates.push(id);
            }
        }

        let mut failures = Vec::new();
        for id in candidates {
            if !ffi::container_accepts(octx, id) {
                continue;
            }
            let Some(codec) = encoder::find(id) else {
                failures.push(format!("no {} encoder", id.name()));
                continue;
            };
            match open_audio_encoder(codec, &decoder, octx) {
                Ok((encoder, target)) => {
                    let mut ost = octx.add_stream(codec)?;
                    let time_base = Rational::new(1, target.rate as i32);
                    ost.set_parameters(&encoder);
                    ost.set_time_base(time_base);
                    let out_index = ost.index();
                    let (frame_size, fixed_frame_size) = match encoder.frame_size() as usize {
                        0 => (VARIABLE_FRAME_CHUNK, false),
                        n => (n, true),
                    };
                    tracing::info!(
                        codec = id.name(),
                        rate = target.rate,
                        frame_size,
                        "audio transcoder ready"
                    );
                    return Ok(Self {
                        in_index: ist.index(),
                        in_time_base: ist.time_base(),
                        decoder,
                        encoder,
                        codec_id: id,
                        out_index,
                        time_base,
                        stream_time_base: time_base,
                        resampler: None,
                        fifo: SampleFifo::new(
                            target.format,
                            output_mask(target.channels),
                            usize::from(target.channels),
                        ),
                        target,
                        frame_size,
                        fixed_frame_size,
                        next_pts: None,
                        decoded: frame::Audio::empty(),
                    });
                }
                Err(e) => failures.push(format!("{} failed to open: {e}", id.name())),
            }
        }

        Err(VeilcutError::encode(if failures.is_empty() {
            "no audio encoder accepted by the output container".to_string()
        } else {
            failures.join("; ")
        }))
    }

    fn push_packet(
        &mut self,
        packet: &Packet,
        octx: &mut format::context::Output,
    ) -> VeilcutResult<()> {
        self.decoder.send_packet(packet)?;
        self.drain_decoder(octx)
    }

    fn drain_decoder(&mut self, octx: &mut format::context::Output) -> VeilcutResult<()> {
        while self.decoder.receive_frame(&mut self.decoded).is_ok() {
            let decoded = std::mem::replace(&mut self.decoded, frame::Audio::empty());
            if self.next_pts.is_none() {
                // Anchor the sample clock to the source so audio stays aligned with video.
                self.next_pts = Some(decoded.pts().map_or(0, |p| {
                    p.rescale(self.in_time_base, self.time_base).max(0)
                }));
            }
            self.resample(Some(&decoded))?;
            self.decoded = decoded;
            self.encode_ready(octx, false)?;
        }
        Ok(())
    }

    fn resample(&mut self, input: Option<&frame::Audio>) -> VeilcutResult<()> {
        if let Some(input) = input {
            let source = AudioFormat::of(input);
            if !matches!(&self.resampler, Some((s, _)) if *s == source) {
                tracing::debug!(?source, target = ?self.target, "building audio resampler");
                let ctx = build_resampler(input, self.target)?;
                self.resampler = Some((source, ctx));
            }
        }

        let Some((source, resampler)) = self.resampler.as_mut() else {
            return Ok(());
        };
        let delay = resampler.delay().map_or(0, |d| d.output.max(0) as usize);
        let incoming = input.map_or(0, |f| {
            f.samples() * self.target.rate as usize / source.rate.max(1) as usize
        });
        let capacity = delay + incoming + 32;
        let mut out = frame::Audio::new(
            self.target.format,
            capacity,
            output_mask(self.target.channels),
        );
        match input {
            Some(f) => {
                resampler.run(f, &mut out)?;
            }
            None => {
                resampler.flush(&mut out)?;
            }
        }
        self.fifo.push_frame(&out);
        Ok(())
    }

    /// Encode buffered samples in encoder-sized frames. With `tail`, also the final partial frame.
    fn encode_ready(&mut self, octx: &mut format::context::Output, tail: bool) -> VeilcutResult<()> {
        loop {
            let want = self.frame_size;
            if self.fifo.len() < want && !(tail && !self.fifo.is_empty()) {
                return Ok(());
            }
            let Some(mut chunk) = self.fifo.pop_frame(want) else {
                return Ok(());
            };
            if self.fixed_frame_size && chunk.samples() < want {
                tracing::debug!(samples = chunk.samples(), "encoding short final audio frame");
            }
            chunk.set_rate(self.target.rate);
            let pts = self.next_pts.unwrap_or(0);
            chunk.set_pts(Some(pts));
            self.next_pts = Some(pts + chunk.samples() as i64);
            self.encoder
                .send_frame(&chunk)
                .map_err(|e| VeilcutError::encode(format!("send audio frame: {e}")))?;
            self.drain_encoder(octx)?;
        }
    }

    fn drain_encoder(&mut self, octx: &mut format::context::Output) -> VeilcutResult<()> {
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.out_index);
            packet.rescale_ts(self.time_base, self.stream_time_base);
            packet
                .write_interleaved(octx)
                .map_err(|e| VeilcutError::encode(format!("write audio packet: {e}")))?;
        }
        Ok(())
    }

    fn finish(&mut self, octx: &mut format::context::Output) -> VeilcutResult<()> {
        if let Err(e) = self.decoder.send_eof() {
            tracing::debug!(error = %e, "audio decoder rejected end of stream");
        }
        self.drain_decoder(octx)?;
        loop {
            let before = self.fifo.len();
            self.resample(None)?;
            if self.fifo.len() == before {
                break;
            }
        }
        self.encode_ready(octx, true)?;
        self.encoder
            .send_eof()
            .map_err(|e| VeilcutError::encode(format!("flush audio encoder: {e}")))?;
        self.drain_encoder(octx)
    }
}

/// Resampler from `input`'s own layout to `target`.
///
/// The input side keeps the frame's layout and channel count, so multichannel sources are
/// downmixed rather than misread; an unlabeled layout is resolved by libswresample from its
/// channel count. Mono is always declared explicitly.
fn build_resampler(input: &frame::Audio, target: AudioFormat) -> VeilcutResult<resampling::Context> {
    let src_layout = if input.ch_layout().channels() >= 2 {
        input.ch_layout()
    } else {
        ChannelLayout::MONO
    };
    let dst_layout = if target.channels >= 2 {
        ChannelLayout::STEREO
    } else {
        ChannelLayout::MONO
    };
    Ok(resampling::Context::get2(
        input.format(),
        src_layout,
        input.rate(),
        target.format,
        dst_layout,
        target.rate,
    )?)
}

/// Encoder channel count: sources are kept mono or downmixed to stereo.
fn output_channels(source_channels: u16) -> u16 {
    if source_channels <= 1 { 1 } else { 2 }
}

fn output_mask(channels: u16) -> ChannelLayoutMask {
    if channels <= 1 {
        ChannelLayoutMask::MONO
    } else {
        ChannelLayoutMask::STEREO
    }
}

/// Pick the rate closest to `wanted` from an encoder's list, preferring exact matches.
pub(crate) fn pick_sample_rate(supported: Option<Vec<i32>>, wanted: u32) -> u32 {
    let wanted_i = i64::from(wanted);
    match supported {
        Some(rates) if !rates.is_empty() => rates
            .into_iter()
            .filter(|r| *r > 0)
            .min_by_key(|r| (i64::from(*r) - wanted_i).abs())
            .map_or(wanted, |r| r as u32),
        _ => wanted,
    }
}

fn open_audio_encoder(
    codec: ffmpeg::Codec,
    decoder: &decoder::Audio,
    octx: &format::context::Output,
) -> VeilcutResult<(encoder::audio::Encoder, AudioFormat)> {
    let caps = codec.audio()?;
    let format = caps
        .formats()
        .and_then(|mut f| f.next())
        .unwrap_or(Sample::F32(ffmpeg::format::sample::Type::Planar));
    let rate = pick_sample_rate(caps.rates().map(Iterator::collect), decoder.rate().max(1));
    let channels = output_channels(decoder.ch_layout().channels() as u16);

    let mut enc = codec::context::Context::new_with_codec(codec)
        .encoder()
        .audio()?;
    enc.set_rate(rate as i32);
    enc.set_ch_layout(if channels == 1 {
        ChannelLayout::MONO
    } else {
        ChannelLayout::STEREO
    });
    enc.set_format(format);
    enc.set_bit_rate(128_000);
    enc.set_time_base(Rational::new(1, rate as i32));
    if octx.format().flags().contains(format::Flags::GLOBAL_HEADER) {
        enc.set_flags(codec::Flags::GLOBAL_HEADER);
    }
    let opened = enc.open_as(codec)?;
    Ok((
        opened,
        AudioFormat {
            format,
            channels,
            rate,
        },
    ))
}

#[cfg(test)]
#[path = "../../tests/unit/export/audio.rs"]
mod tests;
