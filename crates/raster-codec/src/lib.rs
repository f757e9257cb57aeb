//! # raster-codec
//!
//! Encoder interface and format writers for rasterkit.
//!
//! The worker hands a *preconditioned* image (see the encoder glue in the
//! worker crate) plus an [`ImageWriteParam`] to an [`ImageCodec`]. Codecs
//! are registered in the [`registry::CodecRegistry`]; built-in PNG, JPEG,
//! GIF and TIFF writers are feature-gated and enabled by default.
//!
//! Codecs never reach back into the pipeline: they consume the rendered
//! pixels of the raster they are given and write to the supplied sink.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod params;
pub mod registry;

#[cfg(feature = "gif")]
pub mod gif;
#[cfg(feature = "jpeg")]
pub mod jpeg;
#[cfg(feature = "png")]
pub mod png;
#[cfg(feature = "tiff")]
pub mod tiff;

use std::io::Write;

use raster_core::{DataType, Raster};
use thiserror::Error;

pub use params::{ImageWriteParam, WriteMode};

/// Result type alias for codec operations.
pub type CodecResult<T> = std::result::Result<T, CodecError>;

/// Errors raised by codec implementations.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The codec cannot encode this image layout.
    #[error("unsupported image for {codec}: {reason}")]
    Unsupported {
        /// Codec name.
        codec: &'static str,
        /// Why the image was rejected.
        reason: String,
    },

    /// The underlying encoder failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// Stream error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    /// Creates an [`CodecError::Unsupported`] error.
    pub fn unsupported(codec: &'static str, reason: impl Into<String>) -> Self {
        Self::Unsupported {
            codec,
            reason: reason.into(),
        }
    }
}

impl From<CodecError> for raster_core::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(io) => raster_core::Error::Io(io),
            other => raster_core::Error::CodecFailure(other.to_string()),
        }
    }
}

/// An image encoder plugin.
pub trait ImageCodec: Send + Sync {
    /// Format name (e.g. `"PNG"`).
    fn name(&self) -> &'static str;

    /// File suffixes handled by this codec, without dots.
    fn suffixes(&self) -> &'static [&'static str];

    /// Returns `true` when the raster's layout is encodable as-is.
    fn can_encode(&self, image: &Raster) -> bool;

    /// Encodes the image to the sink. The sink is flushed on success; the
    /// caller closes it on all exit paths.
    fn write(
        &self,
        image: &Raster,
        params: &ImageWriteParam,
        sink: &mut dyn Write,
    ) -> CodecResult<()>;
}

/// Renders the raster and collects its samples as interleaved bytes.
///
/// Shared by the built-in writers, which all consume 8-bit data (bilevel
/// images expand to 0/255).
pub fn collect_bytes(image: &Raster) -> CodecResult<(Vec<u8>, u32, u32, u32)> {
    let buf = image
        .data()
        .map_err(|e| CodecError::Encode(e.to_string()))?;
    let rect = buf.rect();
    let bands = buf.num_bands();
    match buf.data_type() {
        DataType::U8 | DataType::U1 => {}
        other => {
            return Err(CodecError::Encode(format!(
                "expected 8-bit samples after preconditioning, got {other}"
            )));
        }
    }
    // bilevel samples expand to 0/255, except as palette indices
    let binary = buf.data_type() == DataType::U1 && !image.color_model().is_indexed();
    let mut bytes = Vec::with_capacity(rect.area() as usize * bands as usize);
    for y in rect.y..rect.bottom() {
        for x in rect.x..rect.right() {
            for b in 0..bands {
                let v = buf.sample(x, y, b).unwrap_or(0.0);
                bytes.push(if binary {
                    if v >= 0.5 { 255 } else { 0 }
                } else {
                    v as u8
                });
            }
        }
    }
    Ok((bytes, rect.width, rect.height, bands))
}
