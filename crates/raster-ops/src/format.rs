//! Structural operations: format casts, constants, pass-throughs, borders.
//!
//! `Format` is the workhorse of the color-model conversion engine: it casts
//! samples to a destination data type (round-and-clamp) and can install a
//! replacement color model. When source and destination types match, the
//! source buffer is passed through untouched, so palette-only rewrites keep
//! the original data identity.

use std::any::Any;

use raster_core::{
    ColorModel, DataType, ImageOp, NodeProperty, PixelBuffer, Raster, Rect, Result, SampleModel,
};

/// Casts samples to a data type, optionally swapping the color model.
pub struct FormatOp {
    sources: Vec<Raster>,
    data_type: DataType,
    color_model: ColorModel,
}

impl FormatOp {
    /// Creates a format cast keeping the source color model.
    pub fn new(source: Raster, data_type: DataType) -> Self {
        let color_model = source.color_model().clone();
        Self {
            sources: vec![source],
            data_type,
            color_model,
        }
    }

    /// Creates a format cast that installs a different color model.
    pub fn with_color_model(source: Raster, data_type: DataType, color_model: ColorModel) -> Self {
        Self {
            sources: vec![source],
            data_type,
            color_model,
        }
    }

    /// Destination data type.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Packed sources expanding into components need their single integer
    /// sample split into channels.
    fn unpacks(&self) -> Option<u32> {
        match (self.sources[0].color_model(), &self.color_model) {
            (ColorModel::Packed(_), ColorModel::Component(ccm)) => Some(ccm.num_bands()),
            _ => None,
        }
    }
}

impl ImageOp for FormatOp {
    fn name(&self) -> &'static str {
        "Format"
    }

    fn sources(&self) -> &[Raster] {
        &self.sources
    }

    fn bounds(&self) -> Rect {
        self.sources[0].bounds()
    }

    fn sample_model(&self) -> SampleModel {
        let base = self.sources[0].sample_model().with_data_type(self.data_type);
        match self.unpacks() {
            Some(bands) => base.with_bands(bands),
            None => base,
        }
    }

    fn color_model(&self) -> ColorModel {
        self.color_model.clone()
    }

    fn compute(&self) -> Result<PixelBuffer> {
        let src = self.sources[0].data()?;
        if let Some(bands) = self.unpacks() {
            // split the packed ARGB integer into component channels
            return Ok(PixelBuffer::from_fn(
                src.rect(),
                bands,
                self.data_type,
                |x, y, b| {
                    let packed = src.sample(x, y, 0).unwrap_or(0.0) as i64 as u32;
                    let channel = match b {
                        0 => (packed >> 16) & 0xFF,
                        1 => (packed >> 8) & 0xFF,
                        2 => packed & 0xFF,
                        _ => (packed >> 24) & 0xFF,
                    };
                    self.data_type.clamp(channel as f64)
                },
            ));
        }
        // identity cast: share the source storage
        if src.data_type() == self.data_type {
            return Ok(src);
        }
        Ok(PixelBuffer::from_fn(
            src.rect(),
            src.num_bands(),
            self.data_type,
            |x, y, b| self.data_type.clamp(src.sample(x, y, b).unwrap_or(0.0)),
        ))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A constant-valued raster.
pub struct ConstantOp {
    rect: Rect,
    values: Vec<f64>,
    data_type: DataType,
    color_model: ColorModel,
}

impl ConstantOp {
    /// Creates a constant image over `rect` with one value per band.
    pub fn new(rect: Rect, values: Vec<f64>, data_type: DataType, color_model: ColorModel) -> Self {
        Self {
            rect,
            values,
            data_type,
            color_model,
        }
    }
}

impl ImageOp for ConstantOp {
    fn name(&self) -> &'static str {
        "Constant"
    }

    fn sources(&self) -> &[Raster] {
        &[]
    }

    fn bounds(&self) -> Rect {
        self.rect
    }

    fn sample_model(&self) -> SampleModel {
        SampleModel::new(self.data_type, self.values.len() as u32)
    }

    fn color_model(&self) -> ColorModel {
        self.color_model.clone()
    }

    fn compute(&self) -> Result<PixelBuffer> {
        Ok(PixelBuffer::from_fn(
            self.rect,
            self.values.len() as u32,
            self.data_type,
            |_, _, b| self.values[b as usize],
        ))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A pass-through node. Pixels are forwarded unchanged; the node exists to
/// carry a fresh layout, hints, or attached properties.
pub struct NullOp {
    sources: Vec<Raster>,
    name: &'static str,
    properties: Vec<(String, NodeProperty)>,
}

impl NullOp {
    /// A plain pass-through.
    pub fn new(source: Raster) -> Self {
        Self {
            sources: vec![source],
            name: "Null",
            properties: Vec::new(),
        }
    }

    /// A pass-through carrying computed statistics.
    pub fn stats(source: Raster, properties: Vec<(String, NodeProperty)>) -> Self {
        Self {
            sources: vec![source],
            name: "Stats",
            properties,
        }
    }
}

impl ImageOp for NullOp {
    fn name(&self) -> &'static str {
        self.name
    }

    fn sources(&self) -> &[Raster] {
        &self.sources
    }

    fn bounds(&self) -> Rect {
        self.sources[0].bounds()
    }

    fn sample_model(&self) -> SampleModel {
        self.sources[0].sample_model()
    }

    fn color_model(&self) -> ColorModel {
        self.sources[0].color_model().clone()
    }

    fn compute(&self) -> Result<PixelBuffer> {
        self.sources[0].data()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn output_properties(&self) -> Vec<(String, NodeProperty)> {
        self.properties.clone()
    }
}

/// Pads the source with background-filled borders.
pub struct BorderOp {
    sources: Vec<Raster>,
    bounds: Rect,
    background: Vec<f64>,
}

impl BorderOp {
    /// Creates a border op with the given paddings (pixels).
    pub fn new(source: Raster, left: u32, right: u32, top: u32, bottom: u32, background: Vec<f64>) -> Self {
        let src = source.bounds();
        let bounds = Rect::new(
            src.x - left as i32,
            src.y - top as i32,
            src.width + left + right,
            src.height + top + bottom,
        );
        Self {
            sources: vec![source],
            bounds,
            background,
        }
    }
}

impl ImageOp for BorderOp {
    fn name(&self) -> &'static str {
        "Border"
    }

    fn sources(&self) -> &[Raster] {
        &self.sources
    }

    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn sample_model(&self) -> SampleModel {
        self.sources[0].sample_model()
    }

    fn color_model(&self) -> ColorModel {
        self.sources[0].color_model().clone()
    }

    fn compute(&self) -> Result<PixelBuffer> {
        let src = self.sources[0].data()?;
        let bands = src.num_bands();
        Ok(PixelBuffer::from_fn(
            self.bounds,
            bands,
            src.data_type(),
            |x, y, b| {
                src.sample(x, y, b).unwrap_or_else(|| {
                    self.background
                        .get(b as usize)
                        .or(self.background.last())
                        .copied()
                        .unwrap_or(0.0)
                })
            },
        ))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
