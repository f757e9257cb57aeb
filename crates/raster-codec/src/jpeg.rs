//! JPEG writer.

use std::io::Write;

use raster_core::{ColorModel, DataType, Raster};

use crate::{CodecError, CodecResult, ImageCodec, ImageWriteParam, WriteMode, collect_bytes};

/// Built-in JPEG encoder.
///
/// Accepts 8-bit gray and RGB component images; alpha must have been
/// dropped by the preconditioning.
pub struct JpegCodec;

impl ImageCodec for JpegCodec {
    fn name(&self) -> &'static str {
        "JPEG"
    }

    fn suffixes(&self) -> &'static [&'static str] {
        &["jpg", "jpeg"]
    }

    fn can_encode(&self, image: &Raster) -> bool {
        matches!(image.color_model(), ColorModel::Component(_))
            && image.data_type() == DataType::U8
            && matches!(image.num_bands(), 1 | 3)
    }

    fn write(
        &self,
        image: &Raster,
        params: &ImageWriteParam,
        sink: &mut dyn Write,
    ) -> CodecResult<()> {
        let (bytes, width, height, bands) = collect_bytes(image)?;
        if width > u16::MAX as u32 || height > u16::MAX as u32 {
            return Err(CodecError::unsupported("JPEG", "image exceeds 65535 pixels"));
        }
        let color_type = match bands {
            1 => jpeg_encoder::ColorType::Luma,
            3 => jpeg_encoder::ColorType::Rgb,
            n => return Err(CodecError::unsupported("JPEG", format!("{n} bands"))),
        };
        let quality = if params.mode == WriteMode::Explicit {
            (params.quality.clamp(0.0, 1.0) * 100.0) as u8
        } else {
            75
        };

        let mut out = Vec::new();
        let mut encoder = jpeg_encoder::Encoder::new(&mut out, quality);
        if params.progressive {
            encoder.set_progressive(true);
        }
        encoder
            .encode(&bytes, width as u16, height as u16, color_type)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        sink.write_all(&out)?;
        sink.flush()?;
        Ok(())
    }
}
