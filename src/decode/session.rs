use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};

use ffmpeg_next as ffmpeg;
use ffmpeg::{Packet, Rational, Rescale, format, media};

use crate::decode::hwaccel::{HwAccel, HwStatus};
use crate::decode::init_ffmpeg;
use crate::decode::video::{Received, VideoDecoder};
use crate::foundation::core::{FrameIndex, Fps, TimeBase, frame_to_pts, pts_to_frame};
use crate::foundation::error::{VeilcutError, VeilcutResult};
use crate::frame::FrameRgba;
use crate::progress::CancelToken;

/// Options for opening a [`DecodeSession`].
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DecodeOpts {
    /// Hardware decode mode.
    pub hw_accel: HwAccel,
}

/// Stream properties probed at open.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct VideoInfo {
    /// Coded width in pixels.
    pub width: u32,
    /// Coded height in pixels.
    pub height: u32,
    /// Nominal frame rate used for index/timestamp mapping.
    pub fps: Fps,
    /// Video stream time base.
    pub time_base: TimeBase,
    /// First presentation timestamp of the stream (0 when unknown).
    pub start_pts: i64,
    /// Frame count, exact when the container records it, else estimated from duration.
    /// `0` when unknown.
    pub frame_count: u64,
    /// Duration in seconds (`0.0` when unknown).
    pub duration_secs: f64,
    /// Short codec name.
    pub codec: String,
    /// Whether the container carries an audio stream.
    pub has_audio: bool,
}

impl VideoInfo {
    /// Presentation timestamp of frame `index` in stream ticks.
    pub fn pts_for(&self, index: FrameIndex) -> i64 {
        frame_to_pts(index, self.fps, self.time_base, self.start_pts)
    }

    /// Frame index nearest to `pts`.
    pub fn frame_for(&self, pts: i64) -> FrameIndex {
        pts_to_frame(pts, self.fps, self.time_base, self.start_pts)
    }

    /// Index of the next frame in an in-order read.
    ///
    /// Indices strictly increase: a frame whose timestamp rounds onto or before `last` takes
    /// `last + 1`, and a frame without a timestamp follows `last` (or is `first` when nothing was
    /// read yet). Every in-order reader uses this so detections and exports agree on numbering.
    pub fn next_index(
        &self,
        pts: Option<i64>,
        last: Option<FrameIndex>,
        first: FrameIndex,
    ) -> FrameIndex {
        let index = match pts {
            Some(p) => self.frame_for(p),
            None => last.map_or(first, FrameIndex::next),
        };
        match last {
            Some(prev) if index <= prev => prev.next(),
            _ => index,
        }
    }
}

/// Probe the video stream at `stream_index`.
pub(crate) fn probe_video_info(
    input: &format::context::Input,
    stream_index: usize,
    width: u32,
    height: u32,
) -> VeilcutResult<VideoInfo> {
    let stream = input
        .stream(stream_index)
        .ok_or_else(|| VeilcutError::decode("video stream disappeared"))?;

    let fps = [stream.avg_frame_rate(), stream.rate()]
        .into_iter()
        .find(|r| r.numerator() > 0 && r.denominator() > 0)
        .ok_or_else(|| VeilcutError::decode("video stream has no usable frame rate"))?;
    let fps = Fps::new(fps.numerator() as u32, fps.denominator() as u32)?;

    let tb = stream.time_base();
    let time_base = TimeBase {
        num: tb.numerator(),
        den: tb.denominator(),
    };
    let start_pts = match stream.start_time() {
        i64::MIN => 0,
        t => t,
    };

    let duration_secs = if stream.duration() > 0 && tb.denominator() > 0 {
        stream.duration() as f64 * f64::from(tb)
    } else if input.duration() > 0 {
        input.duration() as f64 * f64::from(ffmpeg::rescale::TIME_BASE)
    } else {
        0.0
    };
    let frame_count = if stream.frames() > 0 {
        stream.frames() as u64
    } else {
        (duration_secs * fps.as_f64()).round().max(0.0) as u64
    };

    let codec = stream.parameters().id().name().to_string();
    let has_audio = input.streams().best(media::Type::Audio).is_some();

    Ok(VideoInfo {
        width,
        height,
        fps,
        time_base,
        start_pts,
        frame_count,
        duration_secs,
        codec,
        has_audio,
    })
}

#[derive(Clone, Copy, Debug)]
enum ReadMode {
    Random,
    Sequential {
        start: FrameIndex,
        min_pts: Option<i64>,
        last: Option<FrameIndex>,
    },
}

/// An open video file with exact random access and a streaming read mode.
///
/// One persistent RGBA scratch frame is reused across calls; returned references borrow it
/// until the next call. All calls take `&mut self`, so a session never has two decodes in
/// flight.
pub struct DecodeSession {
    video: VideoDecoder,
    input: format::context::Input,
    stream_index: usize,
    stream_tb: Rational,
    info: VideoInfo,
    scratch: FrameRgba,
    mode: ReadMode,
}

impl DecodeSession {
    /// Open `path` and prepare a decoder for its best video stream.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, opts: &DecodeOpts) -> VeilcutResult<Self> {
        init_ffmpeg()?;
        let path = path.as_ref();
        let input = format::input(&path)
            .map_err(|e| VeilcutError::decode(format!("open '{}': {e}", path.display())))?;
        let stream = input.streams().best(media::Type::Video).ok_or_else(|| {
            VeilcutError::decode(format!("'{}' has no video stream", path.display()))
        })?;
        let stream_index = stream.index();
        let stream_tb = stream.time_base();
        let video = VideoDecoder::open(stream.parameters(), opts.hw_accel)?;
        let info = probe_video_info(&input, stream_index, video.width(), video.height())?;

        tracing::info!(
            width = info.width,
            height = info.height,
            fps = info.fps.as_f64(),
            frames = info.frame_count,
            codec = %info.codec,
            hw = ?video.hw_status(),
            "opened video"
        );

        Ok(Self {
            video,
            input,
            stream_index,
            stream_tb,
            info,
            scratch: FrameRgba::default(),
            mode: ReadMode::Random,
        })
    }

    /// Probed stream properties.
    pub fn info(&self) -> &VideoInfo {
        &self.info
    }

    /// Hardware decode state of this session.
    pub fn hw_status(&self) -> HwStatus {
        self.video.hw_status()
    }

    /// Decode exactly frame `index`.
    ///
    /// Seeks backward to the nearest keyframe, then decodes forward and returns the first frame
    /// whose timestamp is at or after the target. `None` past the end of the stream or on a
    /// decode failure; the session remains usable either way. Leaves sequential mode.
    pub fn frame_by_index(&mut self, index: FrameIndex) -> Option<&FrameRgba> {
        self.mode = ReadMode::Random;
        let target = self.info.pts_for(index);
        if let Err(e) = self.seek_to(target) {
            tracing::warn!(frame = index.0, error = %e, "seek failed");
            return None;
        }
        self.decode_until(Some(target), None)?;
        Some(&self.scratch)
    }

    /// Seek once to `start` and switch to sequential reads.
    pub fn start_sequential(&mut self, start: FrameIndex) -> VeilcutResult<()> {
        let target = self.info.pts_for(start);
        self.seek_to(target)?;
        self.mode = ReadMode::Sequential {
            start,
            min_pts: Some(target),
            last: None,
        };
        Ok(())
    }

    /// Decode the next frame in presentation order without seeking.
    ///
    /// Returns `None` at end of stream, when cancelled, or when sequential mode was not started.
    pub fn try_next_frame(&mut self, cancel: &CancelToken) -> Option<(FrameIndex, &FrameRgba)> {
        let ReadMode::Sequential {
            start,
            min_pts,
            last,
        } = self.mode
        else {
            tracing::warn!("try_next_frame called outside sequential mode");
            return None;
        };
        if cancel.is_cancelled() {
            return None;
        }

        let pts = self.decode_until(min_pts, Some(cancel))?;
        let index = self.info.next_index(pts, last, start);
        self.mode = ReadMode::Sequential {
            start,
            min_pts: None,
            last: Some(index),
        };
        Some((index, &self.scratch))
    }

    fn seek_to(&mut self, target_pts: i64) -> VeilcutResult<()> {
        let ts = target_pts.rescale(self.stream_tb, ffmpeg::rescale::TIME_BASE);
        self.input.seek(ts, ..ts)?;
        self.video.flush();
        Ok(())
    }

    /// Decode forward until a frame at or after `min_pts` is converted into the scratch frame.
    /// Frames without a timestamp are accepted. Returns the frame's timestamp.
    fn decode_until(
        &mut self,
        min_pts: Option<i64>,
        cancel: Option<&CancelToken>,
    ) -> Option<Option<i64>> {
        let mut packet = Packet::empty();
        loop {
            match self.video.receive() {
                Received::Frame { pts } => {
                    if let (Some(p), Some(min)) = (pts, min_pts)
                        && p < min
                    {
                        continue;
                    }
                    match self.video.convert_into(&mut self.scratch) {
                        Ok(()) => return Some(pts),
                        Err(e) => {
                            tracing::warn!(pts = ?pts, error = %e, "dropping undecodable frame");
                            continue;
                        }
                    }
                }
                Received::Eof => return None,
                Received::NeedInput => {
                    if cancel.is_some_and(CancelToken::is_cancelled) {
                        return None;
                    }
                    if !self.feed(&mut packet) {
                        self.video.send_eof();
                    }
                }
            }
        }
    }

    /// Read packets until one for the video stream is submitted. `false` at end of input.
    fn feed(&mut self, packet: &mut Packet) -> bool {
        loop {
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() != self.stream_index {
                        continue;
                    }
                    if let Err(e) = self.video.send_packet(packet) {
                        tracing::warn!(error = %e, "decoder rejected packet");
                    }
                    return true;
                }
                Err(ffmpeg::Error::Eof) => return false,
                Err(e) => {
                    tracing::warn!(error = %e, "read error, treating as end of input");
                    return false;
                }
            }
        }
    }
}

/// Decode sessions keyed by path, created on first use.
#[derive(Default)]
pub struct SessionCache {
    opts: DecodeOpts,
    sessions: HashMap<PathBuf, DecodeSession>,
}

impl SessionCache {
    /// Create an empty cache; sessions open with `opts`.
    pub fn new(opts: DecodeOpts) -> Self {
        Self {
            opts,
            sessions: HashMap::new(),
        }
    }

    /// Return the session for `path`, opening it if needed.
    pub fn get_or_open(&mut self, path: impl AsRef<Path>) -> VeilcutResult<&mut DecodeSession> {
        match self.sessions.entry(path.as_ref().to_path_buf()) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(v) => {
                let session = DecodeSession::open(v.key(), &self.opts)?;
                Ok(v.insert(session))
            }
        }
    }

    /// Close the session for `path`. Returns `true` if one was open.
    pub fn dispose(&mut self, path: impl AsRef<Path>) -> bool {
        self.sessions.remove(path.as_ref()).is_some()
    }

    /// Number of open sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Return `true` when no session is open.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/decode/session.rs"]
mod tests;
