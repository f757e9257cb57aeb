//! Encoder glue: format preconditioning and codec dispatch.
//!
//! Each supported format gets the image into a layout its codec accepts
//! before handing over: GIF wants a bitmask-indexed palette, PNG wants
//! indexed-or-component bytes, JPEG wants alpha-free component bytes,
//! TIFF takes things as they come. The sink is flushed by the codec on
//! success and closed by drop on every exit path.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use raster_codec::ImageWriteParam;
use raster_codec::registry::CodecRegistry;
use raster_core::{ColorModel, Error, Result};

use crate::worker::Worker;

impl Worker {
    /// Writes the image to a file, inferring the codec from the file
    /// suffix and applying the format's preconditioning.
    pub fn write_path(&mut self, path: &Path) -> Result<&mut Self> {
        let suffix = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| Error::CodecFailure(format!("no file suffix on {}", path.display())))?;
        let codec_name = CodecRegistry::global()
            .for_suffix(suffix)
            .map(|codec| codec.name())
            .ok_or_else(|| Error::CodecFailure(format!("no codec for suffix '{suffix}'")))?;
        let file = File::create(path)?;
        let mut sink = BufWriter::new(file);
        // BufWriter closes the file on drop in both success and failure
        self.write_stream(&mut sink, codec_name, &ImageWriteParam::default())
    }

    /// Preconditions the image for the named format and encodes it to the
    /// sink.
    pub fn write_stream(
        &mut self,
        sink: &mut dyn Write,
        format: &str,
        params: &ImageWriteParam,
    ) -> Result<&mut Self> {
        let codec = CodecRegistry::global()
            .get(format)
            .cloned()
            .ok_or_else(|| Error::CodecFailure(format!("no codec registered as '{format}'")))?;

        self.precondition_for(format)?;
        let image = self.require_image()?;
        if !codec.can_encode(&image) {
            return Err(Error::CodecFailure(format!(
                "{format} rejected the image after preconditioning ({} bands of {})",
                image.num_bands(),
                image.data_type(),
            )));
        }
        codec
            .write(&image, params, sink)
            .map_err(raster_core::Error::from)?;
        Ok(self)
    }

    /// The format-specific preconditioning table.
    fn precondition_for(&mut self, format: &str) -> Result<()> {
        match format {
            "GIF" => {
                self.force_index_color_model_for_gif(true)?;
            }
            "PNG" => {
                let image = self.require_image()?;
                match image.color_model() {
                    ColorModel::Indexed(icm) if icm.map_size() > 256 => {
                        // 16-bit palettes flatten to byte components
                        self.rescale_to_bytes()?;
                    }
                    ColorModel::Indexed(_) | ColorModel::Component(_) => {}
                    ColorModel::Packed(_) => {
                        self.force_component_color_model()?;
                    }
                }
                if !self.is_indexed() && !self.is_bytes() && !self.is_binary() {
                    self.rescale_to_bytes()?;
                }
            }
            "JPEG" => {
                self.force_component_color_model()?;
                self.rescale_to_bytes()?;
                let image = self.require_image()?;
                if image.color_model().has_alpha() {
                    self.retain_bands(image.num_bands() - 1)?;
                }
            }
            "TIFF" => {
                // no mandatory conversion
                if self.is_indexed() {
                    self.force_component_color_model()?;
                }
            }
            other => {
                tracing::debug!(format = other, "no preconditioning rule, passing through");
            }
        }
        Ok(())
    }
}
