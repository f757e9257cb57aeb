//! Pointwise algebraic operations under one uniform contract.
//!
//! Every operator takes one or two raster sources (or a source and a
//! constant vector), honors per-source no-data ranges and the shared ROI,
//! and writes the destination no-data value wherever a source value is
//! absent. Single-band operands broadcast across the bands of a multi-band
//! operand. Bitwise operators reject floating point operands with
//! [`Error::TypeMismatch`]; mismatched bounds raise
//! [`Error::ShapeMismatch`].

use std::any::Any;

use raster_core::{
    ColorModel, DataType, Error, ImageOp, PixelBuffer, Range, Raster, Rect, Result, SampleModel,
};

use crate::policy::PixelPolicy;

/// The algebraic operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `a + b`
    Add,
    /// `a - b`
    Subtract,
    /// `a * b`
    Multiply,
    /// `a / b` (0 divisor yields the destination no-data)
    Divide,
    /// Bitwise and.
    And,
    /// Bitwise or.
    Or,
    /// Bitwise xor.
    Xor,
    /// Bitwise not (unary).
    Not,
    /// Type-maximum minus value for integral types, negation for floats
    /// (unary).
    Invert,
    /// Absolute value (unary).
    Absolute,
}

impl Operator {
    /// Returns `true` for the operators that require integral operands.
    pub const fn is_bitwise(self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Xor | Self::Not)
    }

    /// Returns `true` for the single-source operators.
    pub const fn is_unary(self) -> bool {
        matches!(self, Self::Not | Self::Invert | Self::Absolute)
    }

    fn apply(self, a: f64, b: f64, dtype: DataType) -> Option<f64> {
        let int = |v: f64| v as i64;
        Some(match self {
            Self::Add => a + b,
            Self::Subtract => a - b,
            Self::Multiply => a * b,
            Self::Divide => {
                if b == 0.0 {
                    return None;
                }
                a / b
            }
            Self::And => (int(a) & int(b)) as f64,
            Self::Or => (int(a) | int(b)) as f64,
            Self::Xor => (int(a) ^ int(b)) as f64,
            Self::Not => {
                if matches!(dtype, DataType::U1 | DataType::U8 | DataType::U16) {
                    dtype.max_value() - a
                } else {
                    !(int(a)) as f64
                }
            }
            Self::Invert => {
                if dtype.is_floating() {
                    -a
                } else {
                    dtype.max_value() - a
                }
            }
            Self::Absolute => a.abs(),
        })
    }
}

fn check_operands(op: Operator, sources: &[Raster]) -> Result<(Rect, SampleModel)> {
    let first = &sources[0];
    let mut dtype = first.data_type();
    let mut bands = first.num_bands();
    for other in &sources[1..] {
        if other.bounds() != first.bounds() {
            return Err(Error::shape_mismatch(first.bounds(), other.bounds()));
        }
        dtype = dtype.promote(other.data_type());
        // single-band operands broadcast
        match (bands, other.num_bands()) {
            (a, b) if a == b => {}
            (1, b) => bands = b,
            (_, 1) => {}
            (a, b) => {
                return Err(Error::shape_mismatch(
                    format!("{a} bands"),
                    format!("{b} bands"),
                ));
            }
        }
    }
    if op.is_bitwise() && dtype.is_floating() {
        return Err(Error::type_mismatch(dtype, "integral operand"));
    }
    Ok((first.bounds(), SampleModel::new(dtype, bands)))
}

/// A one- or two-source pointwise operation.
pub struct AlgebraOp {
    op: Operator,
    sources: Vec<Raster>,
    nodata: Vec<Option<Range>>,
    policy: PixelPolicy,
    sample_model: SampleModel,
    bounds: Rect,
}

impl AlgebraOp {
    /// Creates an algebraic op over one or two sources with per-source
    /// no-data ranges (padded with `None`).
    pub fn new(
        op: Operator,
        sources: Vec<Raster>,
        mut nodata: Vec<Option<Range>>,
        policy: PixelPolicy,
    ) -> Result<Self> {
        if sources.is_empty() || sources.len() > 2 {
            return Err(Error::illegal_argument("sources", sources.len().to_string()));
        }
        if op.is_unary() && sources.len() != 1 {
            return Err(Error::illegal_argument("sources", "unary operator"));
        }
        let (bounds, sample_model) = check_operands(op, &sources)?;
        nodata.resize(sources.len(), None);
        Ok(Self {
            op,
            sources,
            nodata,
            policy,
            sample_model,
            bounds,
        })
    }

    fn source_value(&self, idx: usize, buf: &PixelBuffer, x: i32, y: i32, band: u32) -> Option<f64> {
        let b = if buf.num_bands() == 1 { 0 } else { band };
        let v = buf.sample(x, y, b)?;
        if self.nodata[idx].as_ref().is_some_and(|r| r.contains(v)) {
            return None;
        }
        if idx == 0 && self.policy.is_nodata(v) {
            return None;
        }
        Some(v)
    }
}

impl ImageOp for AlgebraOp {
    fn name(&self) -> &'static str {
        "Algebra"
    }

    fn sources(&self) -> &[Raster] {
        &self.sources
    }

    fn bounds(&self) -> Rect {
        self.bounds
    }

    fn sample_model(&self) -> SampleModel {
        self.sample_model
    }

    fn color_model(&self) -> ColorModel {
        self.sources[0].color_model().clone()
    }

    fn compute(&self) -> Result<PixelBuffer> {
        let rendered: Vec<PixelBuffer> = self
            .sources
            .iter()
            .map(Raster::data)
            .collect::<Result<_>>()?;
        let dtype = self.sample_model.data_type;
        let dest_nodata = self.policy.dest_nodata();
        Ok(PixelBuffer::from_fn(
            self.bounds,
            self.sample_model.num_bands,
            dtype,
            |x, y, b| {
                if !self.policy.allows(x, y) {
                    return dest_nodata;
                }
                let a = match self.source_value(0, &rendered[0], x, y, b) {
                    Some(v) => v,
                    None => return dest_nodata,
                };
                let second = if rendered.len() > 1 {
                    match self.source_value(1, &rendered[1], x, y, b) {
                        Some(v) => v,
                        None => return dest_nodata,
                    }
                } else {
                    0.0
                };
                match self.op.apply(a, second, dtype) {
                    Some(v) => dtype.clamp(v),
                    None => dest_nodata,
                }
            },
        ))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A pointwise operation against per-band constants.
pub struct AlgebraConstOp {
    op: Operator,
    sources: Vec<Raster>,
    constants: Vec<f64>,
    policy: PixelPolicy,
}

impl AlgebraConstOp {
    /// Creates a const op; a length-1 constant vector broadcasts.
    pub fn new(
        op: Operator,
        source: Raster,
        constants: Vec<f64>,
        policy: PixelPolicy,
    ) -> Result<Self> {
        if op.is_bitwise() && source.data_type().is_floating() {
            return Err(Error::type_mismatch(source.data_type(), "integral operand"));
        }
        if constants.is_empty() && !op.is_unary() {
            return Err(Error::illegal_argument("constants", "empty"));
        }
        Ok(Self {
            op,
            sources: vec![source],
            constants,
            policy,
        })
    }

    fn constant(&self, band: u32) -> f64 {
        match self.constants.as_slice() {
            [] => 0.0,
            [single] => *single,
            multi => multi.get(band as usize).copied().unwrap_or(multi[0]),
        }
    }
}

impl ImageOp for AlgebraConstOp {
    fn name(&self) -> &'static str {
        "AlgebraConst"
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
        let src = self.sources[0].data()?;
        let dtype = src.data_type();
        let dest_nodata = self.policy.dest_nodata();
        Ok(PixelBuffer::from_fn(
            src.rect(),
            src.num_bands(),
            dtype,
            |x, y, b| {
                if !self.policy.allows(x, y) {
                    return dest_nodata;
                }
                let v = src.sample(x, y, b).unwrap_or(0.0);
                if self.policy.is_nodata(v) {
                    return dest_nodata;
                }
                match self.op.apply(v, self.constant(b), dtype) {
                    Some(out) => dtype.clamp(out),
                    None => dest_nodata,
                }
            },
        ))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
