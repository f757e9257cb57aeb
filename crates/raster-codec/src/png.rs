//! PNG writer.

use std::io::Write;

use raster_core::{ColorModel, DataType, Raster};

use crate::{CodecError, CodecResult, ImageCodec, ImageWriteParam, collect_bytes};

/// Built-in PNG encoder.
///
/// Accepts 8-bit gray, gray+alpha, RGB, RGBA and indexed images with
/// palettes of at most 256 entries (the worker's preconditioning
/// guarantees that).
pub struct PngCodec;

impl ImageCodec for PngCodec {
    fn name(&self) -> &'static str {
        "PNG"
    }

    fn suffixes(&self) -> &'static [&'static str] {
        &["png"]
    }

    fn can_encode(&self, image: &Raster) -> bool {
        if !matches!(image.data_type(), DataType::U8 | DataType::U1) {
            return false;
        }
        match image.color_model() {
            ColorModel::Indexed(icm) => icm.map_size() <= 256,
            ColorModel::Component(_) => image.num_bands() <= 4,
            ColorModel::Packed(_) => false,
        }
    }

    fn write(
        &self,
        image: &Raster,
        params: &ImageWriteParam,
        sink: &mut dyn Write,
    ) -> CodecResult<()> {
        let (bytes, width, height, bands) = collect_bytes(image)?;

        let mut encoder = png::Encoder::new(&mut *sink, width, height);
        encoder.set_depth(png::BitDepth::Eight);
        if params.progressive {
            tracing::debug!("progressive output not supported by the PNG writer, ignoring");
        }
        match image.color_model() {
            ColorModel::Indexed(icm) => {
                if bands != 1 {
                    return Err(CodecError::unsupported("PNG", "indexed image with multiple bands"));
                }
                encoder.set_color(png::ColorType::Indexed);
                let mut palette = Vec::with_capacity(icm.map_size() * 3);
                let mut trns = Vec::with_capacity(icm.map_size());
                for i in 0..icm.map_size() {
                    let entry = icm.rgba(i);
                    palette.extend_from_slice(&[entry.r, entry.g, entry.b]);
                    trns.push(entry.a);
                }
                encoder.set_palette(palette);
                if trns.iter().any(|&a| a != 255) {
                    encoder.set_trns(trns);
                }
            }
            _ => {
                encoder.set_color(match bands {
                    1 => png::ColorType::Grayscale,
                    2 => png::ColorType::GrayscaleAlpha,
                    3 => png::ColorType::Rgb,
                    4 => png::ColorType::Rgba,
                    n => {
                        return Err(CodecError::unsupported("PNG", format!("{n} bands")));
                    }
                });
            }
        }

        let mut writer = encoder
            .write_header()
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        writer
            .write_image_data(&bytes)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        writer
            .finish()
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        sink.flush()?;
        Ok(())
    }
}
