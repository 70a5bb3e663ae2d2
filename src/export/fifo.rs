use ffmpeg_next as ffmpeg;
use ffmpeg::util::channel_layout::ChannelLayoutMask;
use ffmpeg::format::Sample;
use ffmpeg::frame;

/// Sample FIFO between the resampler and a fixed-frame-size audio encoder.
///
/// Holds one byte queue per plane (one per channel for planar formats, one total otherwise).
pub(crate) struct SampleFifo {
    format: Sample,
    layout: ChannelLayoutMask,
    planes: Vec<Vec<u8>>,
    unit: usize,
    samples: usize,
}

impl SampleFifo {
    pub(crate) fn new(format: Sample, layout: ChannelLayoutMask, channels: usize) -> Self {
        let channels = channels.max(1);
        let (plane_count, unit) = if format.is_planar() {
            (channels, format.bytes())
        } else {
            (1, format.bytes() * channels)
        };
        Self {
            format,
            layout,
            planes: vec![Vec::new(); plane_count],
            unit,
            samples: 0,
        }
    }

    /// Buffered samples per channel.
    pub(crate) fn len(&self) -> usize {
        self.samples
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.samples == 0
    }

    /// Append `samples` samples from raw planes laid out like this FIFO's format.
    ///
    /// Planes may be longer than needed (libav pads them); the tail is ignored.
    pub(crate) fn push_planes(&mut self, planes: &[&[u8]], samples: usize) {
        let bytes = samples * self.unit;
        if planes.len() < self.planes.len() || planes.iter().any(|p| p.len() < bytes) {
            tracing::warn!(
                planes = planes.len(),
                samples,
                "short audio frame, dropping it"
            );
            return;
        }
        for (dst, src) in self.planes.iter_mut().zip(planes) {
            dst.extend_from_slice(&src[..bytes]);
        }
        self.samples += samples;
    }

    /// Append every sample of a resampled frame.
    pub(crate) fn push_frame(&mut self, frame: &frame::Audio) {
        let n = frame.samples();
        if n == 0 {
            return;
        }
        let planes: Vec<&[u8]> = (0..self.planes.len()).map(|i| frame.data(i)).collect();
        self.push_planes(&planes, n);
    }

    /// Pop up to `n` samples into a freshly allocated encoder frame.
    pub(crate) fn pop_frame(&mut self, n: usize) -> Option<frame::Audio> {
        let n = n.min(self.samples);
        if n == 0 {
            return None;
        }
        let mut out = frame::Audio::new(self.format, n, self.layout);
        let bytes = n * self.unit;
        for (i, src) in self.planes.iter_mut().enumerate() {
            out.data_mut(i)[..bytes].copy_from_slice(&src[..bytes]);
            src.drain(..bytes);
        }
        self.samples -= n;
        Some(out)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/export/fifo.rs"]
mod tests;
