use crate::foundation::error::{VeilcutError, VeilcutResult};

/// Bytes per pixel of the working format.
pub const RGBA_BPP: usize = 4;

/// A decoded frame as straight-alpha RGBA8 pixels.
///
/// Rows are `stride` bytes apart and `stride >= width * 4`; the tail of each row past
/// `width * 4` is alignment padding and carries no pixel data. Code that walks pixels must step
/// rows by `stride`, never by `width * 4`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameRgba {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Bytes per row.
    pub stride: usize,
    /// Row-major RGBA8 bytes, `stride * height` long.
    pub data: Vec<u8>,
}

impl FrameRgba {
    /// Allocate a zeroed, tightly packed frame.
    pub fn new(width: u32, height: u32) -> VeilcutResult<Self> {
        Self::with_stride(width, height, width as usize * RGBA_BPP)
    }

    /// Allocate a zeroed frame with an explicit row stride.
    pub fn with_stride(width: u32, height: u32, stride: usize) -> VeilcutResult<Self> {
        let mut frame = Self::default();
        frame.reshape(width, height, stride)?;
        Ok(frame)
    }

    /// Wrap existing bytes, validating stride and length.
    pub fn from_raw(width: u32, height: u32, stride: usize, data: Vec<u8>) -> VeilcutResult<Self> {
        let frame = Self {
            width,
            height,
            stride,
            data,
        };
        frame.validate()?;
        Ok(frame)
    }

    /// Check the stride and buffer length invariants.
    pub fn validate(&self) -> VeilcutResult<()> {
        let row = self.row_bytes();
        if self.stride < row {
            return Err(VeilcutError::validation(format!(
                "frame stride {} is smaller than width*4 ({row})",
                self.stride
            )));
        }
        let needed = self
            .stride
            .checked_mul(self.height as usize)
            .ok_or_else(|| VeilcutError::validation("frame buffer size overflow"))?;
        if self.data.len() < needed {
            return Err(VeilcutError::validation(format!(
                "frame buffer holds {} bytes, expected at least {needed}",
                self.data.len()
            )));
        }
        Ok(())
    }

    /// Resize in place, reusing the allocation when it is large enough.
    ///
    /// Contents are unspecified afterwards; callers overwrite every row.
    pub fn reshape(&mut self, width: u32, height: u32, stride: usize) -> VeilcutResult<()> {
        let row = width as usize * RGBA_BPP;
        if stride < row {
            return Err(VeilcutError::validation(format!(
                "frame stride {stride} is smaller than width*4 ({row})"
            )));
        }
        let len = stride
            .checked_mul(height as usize)
            .ok_or_else(|| VeilcutError::validation("frame buffer size overflow"))?;
        if self.data.len() < len {
            self.data
                .try_reserve_exact(len - self.data.len())
                .map_err(|e| VeilcutError::resource(format!("frame buffer ({len} bytes): {e}")))?;
        }
        self.data.resize(len, 0);
        self.width = width;
        self.height = height;
        self.stride = stride;
        Ok(())
    }

    /// Meaningful bytes per row (`width * 4`).
    pub fn row_bytes(&self) -> usize {
        self.width as usize * RGBA_BPP
    }

    /// Pixel bytes of row `y`, padding excluded.
    pub fn row(&self, y: u32) -> &[u8] {
        let off = y as usize * self.stride;
        &self.data[off..off + self.row_bytes()]
    }

    /// Mutable pixel bytes of row `y`, padding excluded.
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let off = y as usize * self.stride;
        let len = self.row_bytes();
        &mut self.data[off..off + len]
    }

    /// RGBA of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let off = y as usize * self.stride + x as usize * RGBA_BPP;
        [
            self.data[off],
            self.data[off + 1],
            self.data[off + 2],
            self.data[off + 3],
        ]
    }

    /// Copy pixels into a tightly packed buffer (`width * height * 4`).
    pub fn to_packed(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.row_bytes() * self.height as usize);
        for y in 0..self.height {
            out.extend_from_slice(self.row(y));
        }
        out
    }

    /// Copy pixels row by row from a foreign plane with its own stride.
    pub(crate) fn copy_from_plane(
        &mut self,
        width: u32,
        height: u32,
        src: &[u8],
        src_stride: usize,
    ) -> VeilcutResult<()> {
        let row = width as usize * RGBA_BPP;
        if src_stride < row || src.len() < src_stride * (height as usize).saturating_sub(1) + row
        {
            return Err(VeilcutError::decode(
                "converted plane is smaller than its reported geometry",
            ));
        }
        self.reshape(width, height, src_stride)?;
        for y in 0..height as usize {
            let off = y * src_stride;
            self.data[off..off + row].copy_from_slice(&src[off..off + row]);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../tests/unit/frame.rs"]
mod tests;
