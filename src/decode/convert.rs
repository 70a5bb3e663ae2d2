use ffmpeg_next as ffmpeg;
use ffmpeg::format::Pixel;
use ffmpeg::frame;
use ffmpeg::software::scaling;

use crate::foundation::error::{VeilcutError, VeilcutResult};
use crate::frame::FrameRgba;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ScaleKey {
    format: Pixel,
    width: u32,
    height: u32,
}

/// Pixel format conversion with a cached scaler.
///
/// Output keeps the source size unless a fixed size was given, in which case every frame is
/// scaled to it. The scaler is rebuilt only when the source format or dimensions change, so
/// steady-state conversion does no allocation.
pub(crate) struct FrameConverter {
    dst: Pixel,
    size: Option<(u32, u32)>,
    scaler: Option<(ScaleKey, scaling::Context)>,
    out: frame::Video,
}

impl FrameConverter {
    pub(crate) fn new(dst: Pixel) -> Self {
        Self {
            dst,
            size: None,
            scaler: None,
            out: frame::Video::empty(),
        }
    }

    /// A converter whose output is always `width x height`.
    pub(crate) fn with_size(dst: Pixel, width: u32, height: u32) -> Self {
        Self {
            size: Some((width, height)),
            ..Self::new(dst)
        }
    }

    /// Convert `src` into the destination format. The returned frame is reused by the next call.
    pub(crate) fn convert(&mut self, src: &frame::Video) -> VeilcutResult<&mut frame::Video> {
        let key = ScaleKey {
            format: src.format(),
            width: src.width(),
            height: src.height(),
        };
        if key.width == 0 || key.height == 0 {
            return Err(VeilcutError::decode("cannot convert an empty frame"));
        }

        let stale = !matches!(&self.scaler, Some((k, _)) if *k == key);
        if stale {
            let (dst_w, dst_h) = self.size.unwrap_or((key.width, key.height));
            if (dst_w, dst_h) != (key.width, key.height) {
                tracing::warn!(
                    src_w = key.width,
                    src_h = key.height,
                    dst_w,
                    dst_h,
                    "frame size differs from output size, rescaling"
                );
            }
            tracing::debug!(
                src = ?key.format,
                dst = ?self.dst,
                width = key.width,
                height = key.height,
                "building pixel format converter"
            );
            let ctx = scaling::Context::get(
                key.format,
                key.width,
                key.height,
                self.dst,
                dst_w,
                dst_h,
                scaling::Flags::BILINEAR,
            )?;
            self.scaler = Some((key, ctx));
            self.out = frame::Video::empty();
        }

        let Some((_, scaler)) = self.scaler.as_mut() else {
            return Err(VeilcutError::decode("pixel format converter missing"));
        };
        scaler.run(src, &mut self.out)?;
        self.out.set_pts(src.pts());
        Ok(&mut self.out)
    }

    /// Convert a decoded frame straight into an RGBA working frame.
    pub(crate) fn convert_into_rgba(
        &mut self,
        src: &frame::Video,
        out: &mut FrameRgba,
    ) -> VeilcutResult<()> {
        debug_assert_eq!(self.dst, Pixel::RGBA);
        let converted = self.convert(src)?;
        out.copy_from_plane(
            converted.width(),
            converted.height(),
            converted.data(0),
            converted.stride(0),
        )
    }
}

/// Copy a working frame into an RGBA libav frame, (re)allocating it when the size changed.
pub(crate) fn fill_video_from_rgba(src: &FrameRgba, dst: &mut frame::Video) -> VeilcutResult<()> {
    src.validate()?;
    if dst.format() != Pixel::RGBA || dst.width() != src.width || dst.height() != src.height {
        *dst = frame::Video::new(Pixel::RGBA, src.width, src.height);
    }
    let dst_stride = dst.stride(0);
    let row = src.row_bytes();
    let plane = dst.data_mut(0);
    for y in 0..src.height {
        let off = y as usize * dst_stride;
        plane[off..off + row].copy_from_slice(src.row(y));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/decode/convert.rs"]
mod tests;
