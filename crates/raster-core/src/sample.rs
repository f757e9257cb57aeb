//! Sample model: numeric layout of a raster.

use crate::datatype::DataType;

/// Describes the numeric type and band count of a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleModel {
    /// Sample data type of every band.
    pub data_type: DataType,
    /// Number of bands per pixel.
    pub num_bands: u32,
}

impl SampleModel {
    /// Creates a sample model.
    #[inline]
    pub const fn new(data_type: DataType, num_bands: u32) -> Self {
        Self {
            data_type,
            num_bands,
        }
    }

    /// Returns `true` if every band is stored in 8 bits.
    #[inline]
    pub const fn is_bytes(&self) -> bool {
        matches!(self.data_type, DataType::U8)
    }

    /// Returns `true` for a single-band bilevel layout.
    #[inline]
    pub const fn is_binary(&self) -> bool {
        matches!(self.data_type, DataType::U1) && self.num_bands == 1
    }

    /// Returns a copy with a different data type.
    #[inline]
    pub const fn with_data_type(&self, data_type: DataType) -> Self {
        Self::new(data_type, self.num_bands)
    }

    /// Returns a copy with a different band count.
    #[inline]
    pub const fn with_bands(&self, num_bands: u32) -> Self {
        Self::new(self.data_type, num_bands)
    }
}
