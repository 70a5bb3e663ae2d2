//! Automatic face scan over a video, producing a [`RegionTrack`].
//!
//! Detection itself is external: callers plug in a [`FaceDetector`]. This module drives decoding
//! in sequential-read mode and, optionally, splits the frame range into segments that each get
//! their own decode session and detector on a rayon pool.

use std::path::Path;
use std::sync::mpsc;

use crate::decode::{DecodeOpts, DecodeSession, HwAccel};
use crate::foundation::core::{FrameIndex, FrameRange};
use crate::foundation::error::{VeilcutError, VeilcutResult};
use crate::frame::FrameRgba;
use crate::mask::{FaceRegion, RegionFrame, RegionTrack};
use crate::progress::{CancelToken, ProgressSink, Throttled};

/// Finds faces in one frame.
pub trait FaceDetector {
    /// Return face rectangles in `frame`'s pixel coordinates.
    fn detect(&mut self, frame: &FrameRgba) -> Vec<FaceRegion>;
}

impl<F> FaceDetector for F
where
    F: FnMut(&FrameRgba) -> Vec<FaceRegion>,
{
    fn detect(&mut self, frame: &FrameRgba) -> Vec<FaceRegion> {
        self(frame)
    }
}

/// Options for [`scan_faces`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanOpts {
    /// First frame to scan.
    pub start: FrameIndex,
    /// Exclusive end frame; `None` scans to the end of the stream.
    pub end: Option<FrameIndex>,
    /// Number of independent segments scanned in parallel. `1` scans sequentially.
    pub segments: usize,
    /// Worker threads for segmented scans (`None` lets rayon decide).
    pub threads: Option<usize>,
    /// Confidence threshold stored with every recorded frame.
    pub min_confidence: Option<f32>,
    /// Hardware decode mode.
    pub hw_accel: HwAccel,
    /// Report progress every this many frames.
    pub progress_every_frames: u64,
}

impl Default for ScanOpts {
    fn default() -> Self {
        Self {
            start: FrameIndex(0),
            end: None,
            segments: 1,
            threads: None,
            min_confidence: None,
            hw_accel: HwAccel::Auto,
            progress_every_frames: 25,
        }
    }
}

impl ScanOpts {
    /// Check option ranges.
    pub fn validate(&self) -> VeilcutResult<()> {
        if self.segments == 0 {
            return Err(VeilcutError::validation("scan segments must be >= 1"));
        }
        if let Some(n) = self.threads
            && n == 0
        {
            return Err(VeilcutError::validation(
                "scan 'threads' must be >= 1 when set",
            ));
        }
        if let Some(end) = self.end
            && end < self.start
        {
            return Err(VeilcutError::validation("scan end must be >= start"));
        }
        if self.progress_every_frames == 0 {
            return Err(VeilcutError::validation(
                "progress_every_frames must be >= 1",
            ));
        }
        Ok(())
    }

    fn decode_opts(&self) -> DecodeOpts {
        DecodeOpts {
            hw_accel: self.hw_accel,
        }
    }
}

/// Run `make_detector`'s detectors over `path` and record the detections of every scanned frame.
///
/// A scanned frame with no faces is still recorded, as an empty [`RegionFrame`], so an export
/// fades the blur out over it instead of treating it as unmasked. Frames come from sequential
/// reads, never per-frame seeks. With `opts.segments > 1` and a known
/// frame count, each segment is scanned by its own session and detector on a worker thread.
/// Cancellation stops all segments at their next frame; whatever was found so far is returned.
/// A failing segment trips `cancel` so its siblings stop too, and its error is returned.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display(), segments = opts.segments))]
pub fn scan_faces<M, D>(
    path: impl AsRef<Path>,
    make_detector: M,
    opts: &ScanOpts,
    progress: &mut dyn ProgressSink,
    cancel: &CancelToken,
) -> VeilcutResult<RegionTrack>
where
    M: Fn() -> D + Sync,
    D: FaceDetector,
{
    let path = path.as_ref();
    opts.validate()?;

    let mut session = DecodeSession::open(path, &opts.decode_opts())?;
    let known_end = match (opts.end, session.info().frame_count) {
        (Some(end), _) => Some(end),
        (None, 0) => None,
        (None, n) => Some(FrameIndex(n)),
    };
    let total = known_end.map_or(0, |end| end.0.saturating_sub(opts.start.0));

    if opts.segments > 1
        && let Some(end) = known_end
    {
        drop(session);
        let range = FrameRange::new(opts.start, end)?;
        return scan_parallel(path, &make_detector, opts, range, progress, cancel);
    }
    if opts.segments > 1 {
        tracing::debug!("frame count unknown, scanning sequentially");
    }

    let mut progress = Throttled::new(progress, opts.progress_every_frames, total);
    let mut detector = make_detector();
    let mut track = RegionTrack::new();
    let mut scanned = 0;
    scan_range(
        &mut session,
        &mut detector,
        opts,
        opts.start,
        opts.end,
        cancel,
        |index, frame| {
            scanned += 1;
            progress.tick(scanned);
            track.insert(index, frame);
        },
    )?;
    progress.finish(scanned);
    Ok(track)
}

enum SegmentMsg {
    Frame(FrameIndex, RegionFrame),
    Failed(VeilcutError),
}

fn scan_parallel<M, D>(
    path: &Path,
    make_detector: &M,
    opts: &ScanOpts,
    range: FrameRange,
    progress: &mut dyn ProgressSink,
    cancel: &CancelToken,
) -> VeilcutResult<RegionTrack>
where
    M: Fn() -> D + Sync,
    D: FaceDetector,
{
    let pool = build_thread_pool(opts.threads)?;
    let segments = range.split(opts.segments);
    tracing::info!(segments = segments.len(), frames = range.len_frames(), "segmented scan");

    let mut progress = Throttled::new(progress, opts.progress_every_frames, range.len_frames());
    let mut track = RegionTrack::new();
    let mut scanned = 0;
    let mut failure = None;

    let (tx, rx) = mpsc::channel::<SegmentMsg>();
    pool.in_place_scope(|scope| {
        for segment in &segments {
            let tx = tx.clone();
            scope.spawn(move |_| {
                let run = || -> VeilcutResult<()> {
                    let mut session = DecodeSession::open(path, &opts.decode_opts())?;
                    let mut detector = make_detector();
                    scan_range(
                        &mut session,
                        &mut detector,
                        opts,
                        segment.start,
                        Some(segment.end),
                        cancel,
                        |index, frame| {
                            let _ = tx.send(SegmentMsg::Frame(index, frame));
                        },
                    )
                };
                if let Err(e) = run() {
                    let _ = tx.send(SegmentMsg::Failed(e));
                }
            });
        }
        drop(tx);

        for msg in rx {
            match msg {
                SegmentMsg::Frame(index, frame) => {
                    scanned += 1;
                    progress.tick(scanned);
                    track.insert(index, frame);
                }
                SegmentMsg::Failed(e) => {
                    tracing::warn!(error = %e, "scan segment failed");
                    if failure.is_none() {
                        cancel.cancel();
                        failure = Some(e);
                    }
                }
            }
        }
    });

    if let Some(e) = failure {
        return Err(e);
    }
    progress.finish(scanned);
    Ok(track)
}

/// Sequentially decode `[start, end)` and hand each frame's detections to `sink`.
fn scan_range<D: FaceDetector>(
    session: &mut DecodeSession,
    detector: &mut D,
    opts: &ScanOpts,
    start: FrameIndex,
    end: Option<FrameIndex>,
    cancel: &CancelToken,
    mut sink: impl FnMut(FrameIndex, RegionFrame),
) -> VeilcutResult<()> {
    session.start_sequential(start)?;
    while let Some((index, frame)) = session.try_next_frame(cancel) {
        if end.is_some_and(|end| index >= end) {
            break;
        }
        let regions = detector.detect(frame);
        sink(index, detection_frame(frame, regions, opts.min_confidence));
    }
    Ok(())
}

/// Record one frame's detections. An empty result still yields a frame so the scan's coverage
/// survives into the track.
fn detection_frame(
    frame: &FrameRgba,
    regions: Vec<FaceRegion>,
    min_confidence: Option<f32>,
) -> RegionFrame {
    let rf = RegionFrame::new(frame.width, frame.height, regions);
    match min_confidence {
        Some(min) => rf.with_min_confidence(min),
        None => rf,
    }
}

fn build_thread_pool(threads: Option<usize>) -> VeilcutResult<rayon::ThreadPool> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| VeilcutError::resource(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../tests/unit/detect.rs"]
mod tests;
