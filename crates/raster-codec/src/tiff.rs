//! TIFF writer.

use std::io::{Cursor, Write};

use raster_core::{ColorModel, DataType, Raster};

use crate::{CodecError, CodecResult, ImageCodec, ImageWriteParam, collect_bytes};

/// Built-in TIFF encoder.
///
/// Writes 8-bit gray, RGB and RGBA images. The underlying encoder is
/// strip-based; a requested tile size is honored as the strip height.
pub struct TiffCodec;

impl ImageCodec for TiffCodec {
    fn name(&self) -> &'static str {
        "TIFF"
    }

    fn suffixes(&self) -> &'static [&'static str] {
        &["tif", "tiff"]
    }

    fn can_encode(&self, image: &Raster) -> bool {
        matches!(image.color_model(), ColorModel::Component(_))
            && matches!(image.data_type(), DataType::U8 | DataType::U1)
            && matches!(image.num_bands(), 1 | 3 | 4)
    }

    fn write(
        &self,
        image: &Raster,
        params: &ImageWriteParam,
        sink: &mut dyn Write,
    ) -> CodecResult<()> {
        let (bytes, width, height, bands) = collect_bytes(image)?;

        // the encoder needs Seek, so assemble in memory first
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut encoder = tiff::encoder::TiffEncoder::new(&mut cursor)
                .map_err(|e| CodecError::Encode(e.to_string()))?;
            if let Some((tw, th)) = params.effective_tiling() {
                tracing::debug!(tw, th, "tile size requested, writing {th}-row strips");
            }
            match bands {
                1 => encoder
                    .write_image::<tiff::encoder::colortype::Gray8>(width, height, &bytes)
                    .map_err(|e| CodecError::Encode(e.to_string()))?,
                3 => encoder
                    .write_image::<tiff::encoder::colortype::RGB8>(width, height, &bytes)
                    .map_err(|e| CodecError::Encode(e.to_string()))?,
                4 => encoder
                    .write_image::<tiff::encoder::colortype::RGBA8>(width, height, &bytes)
                    .map_err(|e| CodecError::Encode(e.to_string()))?,
                n => return Err(CodecError::unsupported("TIFF", format!("{n} bands"))),
            }
        }
        sink.write_all(cursor.get_ref())?;
        sink.flush()?;
        Ok(())
    }
}
