//! Pixel buffers: typed, materialized sample storage.
//!
//! A [`PixelBuffer`] holds pixel-interleaved samples for a rectangular
//! region. The backing [`PixelData`] is reference counted so that
//! operations rewriting only the color model (palette swaps) can reuse the
//! data untouched; [`PixelBuffer::data_ptr_eq`] exposes that identity.

use std::sync::Arc;

use crate::datatype::DataType;
use crate::error::{Error, Result};
use crate::rect::Rect;

/// Typed sample storage.
///
/// Bilevel data is kept one sample per byte with values 0/1; the 1-bit
/// packing only matters on the wire and is left to the codecs.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    /// Bilevel samples, one byte each, values 0 or 1.
    U1(Vec<u8>),
    /// Unsigned 8-bit samples.
    U8(Vec<u8>),
    /// Unsigned 16-bit samples.
    U16(Vec<u16>),
    /// Signed 16-bit samples.
    I16(Vec<i16>),
    /// Signed 32-bit samples.
    I32(Vec<i32>),
    /// 32-bit float samples.
    F32(Vec<f32>),
    /// 64-bit float samples.
    F64(Vec<f64>),
}

impl PixelData {
    /// Allocates zeroed storage of the given type and length.
    pub fn zeroed(data_type: DataType, len: usize) -> Self {
        match data_type {
            DataType::U1 => Self::U1(vec![0; len]),
            DataType::U8 => Self::U8(vec![0; len]),
            DataType::U16 => Self::U16(vec![0; len]),
            DataType::I16 => Self::I16(vec![0; len]),
            DataType::I32 => Self::I32(vec![0; len]),
            DataType::F32 => Self::F32(vec![0.0; len]),
            DataType::F64 => Self::F64(vec![0.0; len]),
        }
    }

    /// Data type of the storage.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::U1(_) => DataType::U1,
            Self::U8(_) => DataType::U8,
            Self::U16(_) => DataType::U16,
            Self::I16(_) => DataType::I16,
            Self::I32(_) => DataType::I32,
            Self::F32(_) => DataType::F32,
            Self::F64(_) => DataType::F64,
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        match self {
            Self::U1(v) | Self::U8(v) => v.len(),
            Self::U16(v) => v.len(),
            Self::I16(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
        }
    }

    /// Returns `true` when the storage holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    fn get(&self, i: usize) -> f64 {
        match self {
            Self::U1(v) | Self::U8(v) => v[i] as f64,
            Self::U16(v) => v[i] as f64,
            Self::I16(v) => v[i] as f64,
            Self::I32(v) => v[i] as f64,
            Self::F32(v) => v[i] as f64,
            Self::F64(v) => v[i],
        }
    }

    #[inline]
    fn set(&mut self, i: usize, value: f64) {
        match self {
            Self::U1(v) => v[i] = if value >= 0.5 { 1 } else { 0 },
            Self::U8(v) => v[i] = value.round().clamp(0.0, 255.0) as u8,
            Self::U16(v) => v[i] = value.round().clamp(0.0, 65535.0) as u16,
            Self::I16(v) => {
                v[i] = value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
            }
            Self::I32(v) => {
                v[i] = value.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32
            }
            Self::F32(v) => v[i] = value as f32,
            Self::F64(v) => v[i] = value,
        }
    }
}

/// A materialized rectangular grid of pixel-interleaved samples.
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    rect: Rect,
    num_bands: u32,
    data: Arc<PixelData>,
}

impl PixelBuffer {
    /// Allocates a zero-filled buffer.
    pub fn zeroed(rect: Rect, num_bands: u32, data_type: DataType) -> Self {
        let len = rect.area() as usize * num_bands as usize;
        Self {
            rect,
            num_bands,
            data: Arc::new(PixelData::zeroed(data_type, len)),
        }
    }

    /// Wraps existing storage.
    ///
    /// # Errors
    ///
    /// [`Error::IllegalArgument`] when the storage length does not match
    /// `rect.area() * num_bands`.
    pub fn from_data(rect: Rect, num_bands: u32, data: PixelData) -> Result<Self> {
        let expected = rect.area() as usize * num_bands as usize;
        if data.len() != expected {
            return Err(Error::illegal_argument(
                "data",
                format!("{} samples, expected {}", data.len(), expected),
            ));
        }
        Ok(Self {
            rect,
            num_bands,
            data: Arc::new(data),
        })
    }

    /// Builds a buffer by evaluating `f(x, y, band)` over the rectangle.
    pub fn from_fn(
        rect: Rect,
        num_bands: u32,
        data_type: DataType,
        mut f: impl FnMut(i32, i32, u32) -> f64,
    ) -> Self {
        let mut data = PixelData::zeroed(data_type, rect.area() as usize * num_bands as usize);
        let mut i = 0;
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                for b in 0..num_bands {
                    data.set(i, f(x, y, b));
                    i += 1;
                }
            }
        }
        Self {
            rect,
            num_bands,
            data: Arc::new(data),
        }
    }

    /// Re-labels the buffer with a different rectangle of the same size,
    /// sharing the underlying storage (used by integer translation).
    pub fn with_rect(&self, rect: Rect) -> Result<Self> {
        if rect.area() != self.rect.area() {
            return Err(Error::illegal_argument("rect", rect.to_string()));
        }
        Ok(Self {
            rect,
            num_bands: self.num_bands,
            data: Arc::clone(&self.data),
        })
    }

    /// Bounds of the buffer.
    #[inline]
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Number of bands per pixel.
    #[inline]
    pub fn num_bands(&self) -> u32 {
        self.num_bands
    }

    /// Sample data type.
    #[inline]
    pub fn data_type(&self) -> DataType {
        self.data.data_type()
    }

    #[inline]
    fn index(&self, x: i32, y: i32, band: u32) -> Option<usize> {
        if !self.rect.contains(x, y) || band >= self.num_bands {
            return None;
        }
        let row = (y - self.rect.y) as usize;
        let col = (x - self.rect.x) as usize;
        Some((row * self.rect.width as usize + col) * self.num_bands as usize + band as usize)
    }

    /// Sample at `(x, y, band)` in raster coordinates, or `None` outside
    /// the buffer.
    #[inline]
    pub fn sample(&self, x: i32, y: i32, band: u32) -> Option<f64> {
        self.index(x, y, band).map(|i| self.data.get(i))
    }

    /// Writes a sample, converting to the storage type.
    ///
    /// Clones the backing storage first when it is shared.
    pub fn set_sample(&mut self, x: i32, y: i32, band: u32, value: f64) {
        if let Some(i) = self.index(x, y, band) {
            Arc::make_mut(&mut self.data).set(i, value);
        }
    }

    /// Reads a whole pixel into `out` (one value per band).
    pub fn pixel(&self, x: i32, y: i32, out: &mut [f64]) {
        for (b, slot) in out.iter_mut().enumerate().take(self.num_bands as usize) {
            *slot = self.sample(x, y, b as u32).unwrap_or(0.0);
        }
    }

    /// Returns `true` when both buffers share the same backing storage.
    #[inline]
    pub fn data_ptr_eq(&self, other: &PixelBuffer) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Borrow of the typed storage, for codecs.
    #[inline]
    pub fn data(&self) -> &PixelData {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_fn_and_sample() {
        let buf = PixelBuffer::from_fn(Rect::new(-2, -2, 4, 4), 2, DataType::U8, |x, y, b| {
            (x + y + b as i32 + 10) as f64
        });
        assert_eq!(buf.sample(-2, -2, 0), Some(6.0));
        assert_eq!(buf.sample(-2, -2, 1), Some(7.0));
        assert_eq!(buf.sample(1, 1, 0), Some(12.0));
        assert_eq!(buf.sample(2, 0, 0), None);
    }

    #[test]
    fn test_set_sample_clamps() {
        let mut buf = PixelBuffer::zeroed(Rect::from_size(2, 2), 1, DataType::U8);
        buf.set_sample(0, 0, 0, 300.0);
        buf.set_sample(1, 0, 0, -4.0);
        assert_eq!(buf.sample(0, 0, 0), Some(255.0));
        assert_eq!(buf.sample(1, 0, 0), Some(0.0));
    }

    #[test]
    fn test_shared_data_identity() {
        let buf = PixelBuffer::zeroed(Rect::from_size(3, 3), 1, DataType::U8);
        let moved = buf.with_rect(Rect::new(5, 5, 3, 3)).unwrap();
        assert!(buf.data_ptr_eq(&moved));
        assert_eq!(moved.sample(5, 5, 0), Some(0.0));

        let mut copy = buf.clone();
        copy.set_sample(0, 0, 0, 1.0);
        assert!(!buf.data_ptr_eq(&copy));
    }

    #[test]
    fn test_from_data_length_check() {
        let data = PixelData::zeroed(DataType::F32, 9);
        assert!(PixelBuffer::from_data(Rect::from_size(3, 3), 1, data).is_ok());
        let data = PixelData::zeroed(DataType::F32, 8);
        assert!(PixelBuffer::from_data(Rect::from_size(3, 3), 1, data).is_err());
    }
}
