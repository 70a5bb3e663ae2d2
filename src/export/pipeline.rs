use std::path::{Path, PathBuf};

use anyhow::Context as _;
use ffmpeg_next as ffmpeg;
use ffmpeg::{Packet, Rescale, codec, encoder, format, media};

use crate::decode::hwaccel::HwAccel;
use crate::decode::init_ffmpeg;
use crate::decode::session::probe_video_info;
use crate::decode::video::{Received, VideoDecoder};
use crate::export::audio::AudioRoute;
use crate::export::video_encode::VideoEncoder;
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{VeilcutError, VeilcutResult};
use crate::frame::FrameRgba;
use crate::mask::{BlurTuning, MaskCompositor, MaskSource};
use crate::progress::{CancelToken, ProgressSink, Throttled};

/// Options for [`export`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportOpts {
    /// Base blur radius in pixels; region masks scale it down for small faces.
    pub blur_radius: u32,
    /// Overwrite `output` if it already exists.
    pub overwrite: bool,
    /// Encoder name to request (for example `"libx264"` or `"mpeg4"`). Falls back like the
    /// source codec does when unusable. `None` reuses the source codec.
    pub video_codec: Option<String>,
    /// Hardware decode mode for the input.
    pub hw_accel: HwAccel,
    /// Report progress every this many frames (the last frame and notices always report).
    pub progress_every_frames: u64,
    /// Compositor tuning.
    pub tuning: BlurTuning,
}

impl Default for ExportOpts {
    fn default() -> Self {
        Self {
            blur_radius: 16,
            overwrite: true,
            video_codec: None,
            hw_accel: HwAccel::Auto,
            progress_every_frames: 10,
            tuning: BlurTuning::default(),
        }
    }
}

impl ExportOpts {
    /// Load options from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> VeilcutResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read export options '{}'", path.display()))?;
        let opts: Self = serde_json::from_str(&text)
            .map_err(|e| VeilcutError::serde(format!("parse '{}': {e}", path.display())))?;
        opts.validate()?;
        Ok(opts)
    }

    /// Check option ranges.
    pub fn validate(&self) -> VeilcutResult<()> {
        if self.progress_every_frames == 0 {
            return Err(VeilcutError::validation(
                "progress_every_frames must be >= 1",
            ));
        }
        if self.video_codec.as_deref().is_some_and(|c| c.trim().is_empty()) {
            return Err(VeilcutError::validation("video_codec must not be empty"));
        }
        self.tuning.validate()
    }
}

/// How an export ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub enum ExportStatus {
    /// Every input frame was written.
    Completed,
    /// Stopped early by a [`CancelToken`]; the output is finalized and playable.
    Cancelled,
}

/// How audio reached the output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub enum AudioPath {
    /// The output has no audio.
    None,
    /// Source packets were copied.
    StreamCopy,
    /// Decoded and re-encoded for the output container.
    Transcoded,
}

/// Result of an export run.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ExportOutcome {
    /// Completion state.
    pub status: ExportStatus,
    /// Video frames sent to the encoder.
    pub frames_written: u64,
    /// Name of the video codec actually used.
    pub video_codec: String,
    /// Audio handling.
    pub audio: AudioPath,
    /// Fallbacks and degradations, in the order they happened.
    pub notices: Vec<String>,
}

/// Output context plus teardown bookkeeping.
///
/// Dropping it before [`Muxer::close`] finalizes a started file and then removes it, so a failed
/// export never leaves a half-written output behind.
struct Muxer {
    octx: format::context::Output,
    path: PathBuf,
    header_written: bool,
    closed: bool,
}

impl Muxer {
    fn create(path: &Path) -> VeilcutResult<Self> {
        let octx = format::output(&path).map_err(|e| {
            VeilcutError::encode(format!(
                "cannot create output '{}' (unknown container?): {e}",
                path.display()
            ))
        })?;
        Ok(Self {
            octx,
            path: path.to_path_buf(),
            header_written: false,
            closed: false,
        })
    }

    fn write_header(&mut self) -> VeilcutResult<()> {
        self.octx
            .write_header()
            .map_err(|e| VeilcutError::encode(format!("write container header: {e}")))?;
        self.header_written = true;
        Ok(())
    }

    fn close(mut self) -> VeilcutResult<()> {
        self.closed = true;
        self.octx
            .write_trailer()
            .map_err(|e| VeilcutError::encode(format!("write container trailer: {e}")))
    }
}

impl Drop for Muxer {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if self.header_written {
            let _ = self.octx.write_trailer();
        }
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Decode `input`, blur each frame through `masks`, and encode the result to `output`.
///
/// The output container follows `output`'s extension. Codec and audio-path fallbacks are
/// reported as notices (in the outcome and through `progress`), not errors; only a container
/// with no usable video encoder fails. Cancellation is checked before each decoded frame and
/// still produces a finalized file.
#[tracing::instrument(skip_all, fields(input = %input.as_ref().display(), output = %output.as_ref().display()))]
pub fn export(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    opts: &ExportOpts,
    masks: &dyn MaskSource,
    progress: &mut dyn ProgressSink,
    cancel: &CancelToken,
) -> VeilcutResult<ExportOutcome> {
    let input = input.as_ref();
    let output = output.as_ref();
    opts.validate()?;
    check_paths(input, output, opts.overwrite)?;
    init_ffmpeg()?;

    let mut compositor = MaskCompositor::new(opts.tuning.clone())?;

    let mut ictx = format::input(&input)
        .map_err(|e| VeilcutError::decode(format!("open '{}': {e}", input.display())))?;
    let (video_index, in_time_base, params) = {
        let stream = ictx.streams().best(media::Type::Video).ok_or_else(|| {
            VeilcutError::decode(format!("'{}' has no video stream", input.display()))
        })?;
        (stream.index(), stream.time_base(), stream.parameters())
    };
    let source_codec = params.id();
    let mut video = VideoDecoder::open(params, opts.hw_accel)?;
    let info = probe_video_info(&ictx, video_index, video.width(), video.height())?;
    tracing::info!(
        frames = info.frame_count,
        codec = %info.codec,
        hw = ?video.hw_status(),
        "export started"
    );

    let mut notices = Vec::new();
    let first = requested_codec(opts.video_codec.as_deref(), source_codec, &mut notices);

    let mut mux = Muxer::create(output)?;
    let mut encoder = VideoEncoder::negotiate(
        &mut mux.octx,
        first,
        info.width,
        info.height,
        info.fps,
        &mut notices,
    )?;
    let mut audio = AudioRoute::negotiate(&ictx, &mut mux.octx, &mut notices);
    let audio_path = match &audio {
        AudioRoute::Dropped => AudioPath::None,
        AudioRoute::Copy { .. } => AudioPath::StreamCopy,
        AudioRoute::Transcode(_) => AudioPath::Transcoded,
    };

    mux.write_header()?;
    encoder.sync_stream_time_base(&mux.octx);
    audio.sync_stream_time_base(&mux.octx);

    let mut progress = Throttled::new(progress, opts.progress_every_frames, info.frame_count);
    for note in &notices {
        progress.notice(0, note);
    }

    let audio_index = audio.input_index();
    let mut scratch = FrameRgba::default();
    let mut packet = Packet::empty();
    let mut last_index: Option<FrameIndex> = None;
    let mut input_done = false;
    let mut status = ExportStatus::Completed;

    'frames: loop {
        loop {
            match video.receive() {
                Received::Frame { pts } => {
                    if cancel.is_cancelled() {
                        status = ExportStatus::Cancelled;
                        break 'frames;
                    }
                    if let Err(e) = video.convert_into(&mut scratch) {
                        tracing::warn!(pts = ?pts, error = %e, "skipping undecodable frame");
                        continue;
                    }
                    let index = info.next_index(pts, last_index, FrameIndex(0));
                    last_index = Some(index);

                    compositor.apply_masked_blur(
                        &mut scratch,
                        masks.mask_for(index),
                        opts.blur_radius,
                    )?;
                    let enc_pts = pts.map(|p| p.rescale(in_time_base, encoder.time_base()));
                    encoder.encode(&mut mux.octx, &scratch, enc_pts)?;
                    progress.tick(encoder.frames());
                }
                Received::NeedInput => break,
                Received::Eof => break 'frames,
            }
        }

        if cancel.is_cancelled() {
            status = ExportStatus::Cancelled;
            break;
        }
        if input_done {
            // The decoder reports Eof once drained; NeedInput here means it gave up early.
            break;
        }
        match packet.read(&mut ictx) {
            Ok(()) => {
                let stream = packet.stream();
                if stream == video_index {
                    if let Err(e) = video.send_packet(&packet) {
                        tracing::warn!(error = %e, "decoder rejected packet");
                    }
                } else if Some(stream) == audio_index {
                    audio.route(&mut packet, &mut mux.octx);
                }
            }
            Err(e) => {
                if e != ffmpeg::Error::Eof {
                    tracing::warn!(error = %e, "read error, finishing with what was decoded");
                }
                video.send_eof();
                input_done = true;
            }
        }
    }

    encoder.finish(&mut mux.octx)?;
    if let Err(e) = audio.finish(&mut mux.octx) {
        let note = format!("audio tail lost: {e}");
        tracing::warn!("{note}");
        progress.notice(encoder.frames(), &note);
        notices.push(note);
    }
    mux.close()?;

    let frames_written = encoder.frames();
    progress.finish(frames_written);
    tracing::info!(frames = frames_written, ?status, "export finished");

    Ok(ExportOutcome {
        status,
        frames_written,
        video_codec: encoder.codec_id().name().to_string(),
        audio: audio_path,
        notices,
    })
}

fn requested_codec(name: Option<&str>, source: codec::Id, notices: &mut Vec<String>) -> codec::Id {
    let Some(name) = name else {
        return source;
    };
    if let Some(codec) = encoder::find_by_name(name) {
        return codec.id();
    }
    let note = format!(
        "requested encoder '{name}' not found, starting from source codec {}",
        source.name()
    );
    tracing::warn!("{note}");
    notices.push(note);
    source
}

fn check_paths(input: &Path, output: &Path, overwrite: bool) -> VeilcutResult<()> {
    if !input.exists() {
        return Err(VeilcutError::decode(format!(
            "input '{}' does not exist",
            input.display()
        )));
    }
    if output.exists() {
        let same = match (input.canonicalize(), output.canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        if same {
            return Err(VeilcutError::validation(
                "output path must differ from the input path",
            ));
        }
        if !overwrite {
            return Err(VeilcutError::validation(format!(
                "output file '{}' already exists",
                output.display()
            )));
        }
    }
    ensure_parent_dir(output)
}

/// Create the parent directory of `path` when missing.
pub fn ensure_parent_dir(path: &Path) -> VeilcutResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/export/pipeline.rs"]
mod tests;
