//! Algebraic, lookup and classification operations on the worker.
//!
//! All operators follow the uniform contract: the worker's ROI, no-data
//! and background travel with the op, and whenever the no-data path is
//! active the output no-data range becomes the degenerate `[bg, bg]` so
//! downstream operations see a consistent marker.

use raster_core::{DataType, Error, Range, Raster, Result};
use raster_ops::{
    AlgebraConstOp, AlgebraOp, BandCombineOp, BinarizeOp, ClassifyOp, ColorMapTransform, LookupOp,
    LookupTable, Operator, PiecewiseOp, PiecewiseTransform, PixelPolicy, RangeLookupOp,
    RangeLookupTable, RescaleOp,
};

use crate::worker::Worker;

impl Worker {
    /// Installs the `[bg, bg]` output marker when the no-data path ran.
    fn finish_algebra(&mut self) -> Result<&mut Self> {
        if self.is_nodata_needed() {
            let bg = self.policy().dest_nodata();
            let dtype = self
                .raster()
                .map_or(DataType::F64, raster_core::Raster::data_type);
            self.set_nodata(Some(Range::point(bg, dtype)));
        }
        self.invalidate_statistics();
        Ok(self)
    }

    fn binary_op(&mut self, op: Operator, other: &Raster, nodata2: Option<Range>) -> Result<&mut Self> {
        self.registry().descriptor("Algebra")?;
        let image = self.require_image()?;
        let node = AlgebraOp::new(
            op,
            vec![image, other.clone()],
            vec![self.nodata.clone(), nodata2],
            self.policy(),
        )?;
        self.emit(Box::new(node));
        self.finish_algebra()
    }

    fn const_op(&mut self, op: Operator, values: Vec<f64>) -> Result<&mut Self> {
        self.registry().descriptor("AlgebraConst")?;
        let image = self.require_image()?;
        let node = AlgebraConstOp::new(op, image, values, self.policy())?;
        self.emit(Box::new(node));
        self.finish_algebra()
    }

    /// Adds another raster pixel-wise.
    pub fn add_image(&mut self, other: &Raster) -> Result<&mut Self> {
        self.binary_op(Operator::Add, other, None)
    }

    /// Subtracts another raster pixel-wise.
    pub fn subtract(&mut self, other: &Raster) -> Result<&mut Self> {
        self.binary_op(Operator::Subtract, other, None)
    }

    /// Multiplies by another raster pixel-wise.
    pub fn multiply(&mut self, other: &Raster) -> Result<&mut Self> {
        self.binary_op(Operator::Multiply, other, None)
    }

    /// Bitwise-or with another raster.
    pub fn or(&mut self, other: &Raster) -> Result<&mut Self> {
        self.binary_op(Operator::Or, other, None)
    }

    /// Bitwise-and with another raster.
    pub fn and(&mut self, other: &Raster) -> Result<&mut Self> {
        self.binary_op(Operator::And, other, None)
    }

    /// Adds per-band constants.
    pub fn add_const(&mut self, values: Vec<f64>) -> Result<&mut Self> {
        self.const_op(Operator::Add, values)
    }

    /// Subtracts per-band constants.
    pub fn subtract_const(&mut self, values: Vec<f64>) -> Result<&mut Self> {
        self.const_op(Operator::Subtract, values)
    }

    /// Multiplies by per-band constants.
    pub fn multiply_const(&mut self, values: Vec<f64>) -> Result<&mut Self> {
        self.const_op(Operator::Multiply, values)
    }

    /// Bitwise-xor with per-band constants.
    pub fn xor_const(&mut self, values: Vec<i32>) -> Result<&mut Self> {
        self.const_op(Operator::Xor, values.into_iter().map(f64::from).collect())
    }

    /// Inverts sample values (type maximum minus value for integral
    /// types).
    pub fn invert(&mut self) -> Result<&mut Self> {
        self.registry().descriptor("Algebra")?;
        let image = self.require_image()?;
        let node = AlgebraOp::new(
            Operator::Invert,
            vec![image],
            vec![self.nodata.clone()],
            self.policy(),
        )?;
        self.emit(Box::new(node));
        self.finish_algebra()
    }

    /// Replaces the pixels selected by a bilevel mask with a constant.
    ///
    /// `mask_value` selects whether set (`true`) or unset mask pixels are
    /// replaced.
    pub fn mask(&mut self, mask: &Raster, mask_value: bool, new_value: f64) -> Result<&mut Self> {
        self.registry().descriptor("Algebra")?;
        self.registry().descriptor("Binarize")?;
        let image = self.require_image()?;
        let dtype = image.data_type();
        let hints = self.effective_hints();

        // keep = 1 where the original pixel survives
        let threshold = 0.5;
        let mask01 = Raster::from_op(
            Box::new(BinarizeOp::new(mask.clone(), threshold, PixelPolicy::none())),
            &hints,
        );
        let keep = if mask_value {
            Raster::from_op(
                Box::new(AlgebraOp::new(
                    Operator::Invert,
                    vec![mask01],
                    vec![],
                    PixelPolicy::none(),
                )?),
                &hints,
            )
        } else {
            mask01
        };

        // out = image * keep + new_value * (1 - keep), in i32 to avoid
        // clamping midway
        let wide = Raster::from_op(
            Box::new(raster_ops::FormatOp::new(image, DataType::I32)),
            &hints,
        );
        let kept = Raster::from_op(
            Box::new(AlgebraOp::new(
                Operator::Multiply,
                vec![wide, keep.clone()],
                vec![],
                PixelPolicy::none(),
            )?),
            &hints,
        );
        let inverted_keep = Raster::from_op(
            Box::new(AlgebraOp::new(
                Operator::Invert,
                vec![keep],
                vec![],
                PixelPolicy::none(),
            )?),
            &hints,
        );
        let replacement = Raster::from_op(
            Box::new(AlgebraConstOp::new(
                Operator::Multiply,
                inverted_keep,
                vec![new_value],
                PixelPolicy::none(),
            )?),
            &hints,
        );
        let combined = AlgebraOp::new(
            Operator::Add,
            vec![kept, replacement],
            vec![self.nodata.clone(), None],
            self.policy(),
        )?;
        self.emit(Box::new(combined));
        self.format(dtype)?;
        self.finish_algebra()
    }

    // =========================================================================
    // Table-driven operations
    // =========================================================================

    /// Applies a lookup table.
    pub fn lookup(&mut self, table: LookupTable) -> Result<&mut Self> {
        self.registry().descriptor("Lookup")?;
        let image = self.require_image()?;
        self.emit(Box::new(LookupOp::new(image, table, self.policy())));
        self.finish_algebra()
    }

    /// Applies a range-lookup table. Tables with gaps install the
    /// `[bg, bg]` no-data marker.
    pub fn range_lookup(&mut self, table: RangeLookupTable, dest_type: DataType) -> Result<&mut Self> {
        self.registry().descriptor("RangeLookup")?;
        let image = self.require_image()?;
        let has_gaps = table.has_gaps();
        self.emit(Box::new(RangeLookupOp::new(
            image,
            table,
            dest_type,
            self.policy(),
        )));
        if has_gaps {
            let bg = self.policy().dest_nodata();
            self.set_nodata(Some(Range::point(bg, dest_type)));
            self.invalidate_statistics();
            Ok(self)
        } else {
            self.finish_algebra()
        }
    }

    /// Applies a piecewise-linear transform to one band (or all).
    pub fn piecewise(
        &mut self,
        transform: PiecewiseTransform,
        band: Option<u32>,
    ) -> Result<&mut Self> {
        self.registry().descriptor("Piecewise")?;
        let image = self.require_image()?;
        self.emit(Box::new(PiecewiseOp::new(
            image,
            transform,
            band,
            self.policy(),
        )));
        self.finish_algebra()
    }

    /// Classifies a band through a colormap transform into an indexed
    /// image.
    pub fn classify(&mut self, domain: ColorMapTransform, band: Option<u32>) -> Result<&mut Self> {
        self.registry().descriptor("Classify")?;
        let image = self.require_image()?;
        let band = band.unwrap_or(0);
        if band >= image.num_bands() {
            return Err(Error::illegal_argument("band", band.to_string()));
        }
        self.emit(Box::new(ClassifyOp::new(image, domain, band, self.policy())));
        self.finish_algebra()
    }

    /// Applies per-band `v * scale + offset` keeping the data type.
    pub fn rescale(&mut self, scale: Vec<f64>, offset: Vec<f64>) -> Result<&mut Self> {
        self.registry().descriptor("Rescale")?;
        let image = self.require_image()?;
        let dtype = image.data_type();
        self.emit(Box::new(RescaleOp::new(
            image,
            scale,
            offset,
            dtype,
            self.policy(),
        )));
        self.finish_algebra()
    }

    /// Applies a linear band combination matrix.
    pub fn band_combine(&mut self, matrix: Vec<Vec<f64>>) -> Result<&mut Self> {
        self.registry().descriptor("BandCombine")?;
        let image = self.require_image()?;
        self.emit(Box::new(BandCombineOp::new(image, matrix, self.policy())?));
        self.finish_algebra()
    }

    /// Speckle/artifact filtering is not provided.
    ///
    /// The filter is specified but deliberately unimplemented; failing
    /// loudly beats silently leaving the image unchanged.
    pub fn artifacts_filter(&mut self, _threshold: i32, _filter_size: u32) -> Result<&mut Self> {
        Err(Error::NotImplemented("artifacts_filter".to_string()))
    }
}
