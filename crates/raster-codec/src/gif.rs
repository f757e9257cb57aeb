//! GIF writer.

use std::borrow::Cow;
use std::io::Write;

use raster_core::{ColorModel, Raster};

use crate::{CodecError, CodecResult, ImageCodec, ImageWriteParam, collect_bytes};

/// Built-in GIF encoder.
///
/// Requires an indexed image with an opaque or bitmask palette of at most
/// 256 entries; `force_index_color_model_for_gif` produces exactly that.
pub struct GifCodec;

impl ImageCodec for GifCodec {
    fn name(&self) -> &'static str {
        "GIF"
    }

    fn suffixes(&self) -> &'static [&'static str] {
        &["gif"]
    }

    fn can_encode(&self, image: &Raster) -> bool {
        match image.color_model() {
            ColorModel::Indexed(icm) => {
                icm.map_size() <= 256
                    && !matches!(icm.transparency, raster_core::Transparency::Translucent)
            }
            _ => false,
        }
    }

    fn write(
        &self,
        image: &Raster,
        _params: &ImageWriteParam,
        sink: &mut dyn Write,
    ) -> CodecResult<()> {
        let icm = match image.color_model() {
            ColorModel::Indexed(icm) => icm.clone(),
            other => {
                return Err(CodecError::unsupported(
                    "GIF",
                    format!("{} color model", other.kind_name()),
                ));
            }
        };
        let (bytes, width, height, bands) = collect_bytes(image)?;
        if bands != 1 {
            return Err(CodecError::unsupported("GIF", format!("{bands} bands")));
        }
        if width > u16::MAX as u32 || height > u16::MAX as u32 {
            return Err(CodecError::unsupported("GIF", "image exceeds 65535 pixels"));
        }

        let mut palette = Vec::with_capacity(icm.map_size() * 3);
        for i in 0..icm.map_size() {
            let entry = icm.rgba(i);
            palette.extend_from_slice(&[entry.r, entry.g, entry.b]);
        }

        let mut encoder = gif::Encoder::new(&mut *sink, width as u16, height as u16, &palette)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        let mut frame = gif::Frame {
            width: width as u16,
            height: height as u16,
            buffer: Cow::Owned(bytes),
            ..gif::Frame::default()
        };
        frame.transparent = icm.transparent_index.map(|i| i as u8);
        encoder
            .write_frame(&frame)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        drop(encoder);
        sink.flush()?;
        Ok(())
    }
}
