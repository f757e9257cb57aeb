//! Geometric resampling with fold optimizations.
//!
//! `affine` collapses back-to-back geometric operations into one node:
//!
//! - transforms that would not move the image by a noticeable fraction of
//!   a pixel are eliminated outright;
//! - an affine over a warp node folds into a single warp whose transform
//!   chains the affine's inverse with the warp's original mapping;
//! - an affine over an affine (or scale) node with compatible parameters
//!   concatenates the transforms and re-targets the original source;
//! - shear-free, non-negative transforms emit `Scale` nodes, with a
//!   dedicated integer-translate path; everything else emits `Affine`.
//!
//! `crop` composes with a previous crop by intersecting the rectangles
//! against the original source.

use std::sync::Arc;

use raster_core::{AffineTransform, HintKey, ImageOp, Raster, Rect, Result, Roi, property::names};
use raster_ops::{
    AffineOp, AffineTransform2D, BorderOp, ConcatenatedTransform, CropOp, Interpolation,
    MathTransform2D, PixelPolicy, ScaleOp, TranslateOp, WarpBuilder, WarpOp,
    warp::Warp,
};

use crate::worker::Worker;

/// Threshold below which a transform coefficient does not move any pixel.
const RS_EPS: f64 = 1e-2;

/// Position budget for warp-affine reduction grids.
const WARP_MAX_POSITIONS: usize = 4 * 1024 * 1024;

struct TxFlags {
    scale_x: bool,
    scale_y: bool,
    shear_x: bool,
    shear_y: bool,
    translate_x: bool,
    translate_y: bool,
}

impl TxFlags {
    fn of(tx: &AffineTransform, size: f64) -> Self {
        Self {
            scale_x: (tx.scale_x() - 1.0).abs() * size > RS_EPS,
            scale_y: (tx.scale_y() - 1.0).abs() * size > RS_EPS,
            shear_x: tx.shear_x().abs() * size > RS_EPS,
            shear_y: tx.shear_y().abs() * size > RS_EPS,
            translate_x: tx.translate_x().abs() > RS_EPS,
            translate_y: tx.translate_y().abs() > RS_EPS,
        }
    }

    fn is_identity(&self) -> bool {
        !self.scale_x
            && !self.scale_y
            && !self.shear_x
            && !self.shear_y
            && !self.translate_x
            && !self.translate_y
    }
}

impl Worker {
    // =========================================================================
    // Affine
    // =========================================================================

    /// Applies an affine transform with identity elimination, warp-affine
    /// reduction, and affine/scale merging.
    pub fn affine(
        &mut self,
        tx: AffineTransform,
        interp: Interpolation,
        bg_values: Option<Vec<f64>>,
    ) -> Result<&mut Self> {
        let image = self.require_image()?;
        let size = image.width().max(image.height()) as f64;
        if TxFlags::of(&tx, size).is_identity() {
            return Ok(self);
        }

        let bg = bg_values
            .or_else(|| self.background.clone())
            .unwrap_or_else(|| vec![0.0]);
        self.background = Some(bg.clone());

        // warp-affine reduction
        if self.config.warp_reduction {
            let warp_params = image
                .op()
                .and_then(|op| op.as_any().downcast_ref::<WarpOp>())
                .and_then(|warp_op| {
                    warp_op.math_transform().map(|mt| {
                        (
                            mt,
                            warp_op.source_bounds(),
                            warp_op.sources()[0].clone(),
                            warp_op.policy().nodata.clone(),
                        )
                    })
                });
            if let Some((original_transform, source_bb, warp_source, old_nodata)) = warp_params {
                match self.try_warp_reduction(
                    &image,
                    original_transform,
                    source_bb,
                    warp_source,
                    old_nodata,
                    tx,
                    interp,
                    &bg,
                ) {
                    Ok(true) => return Ok(self),
                    Ok(false) => {}
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            "failed to squash warp and affine into one operation, chaining instead"
                        );
                    }
                }
            }
        }

        // affine over affine / affine over scale
        let mut tx = tx;
        let mut source = image.clone();
        if let Some(prev) = image.op().and_then(|op| op.as_any().downcast_ref::<AffineOp>()) {
            self.try_affine_merge(
                &mut tx,
                &mut source,
                prev.transform(),
                prev.interpolation(),
                prev.background().to_vec(),
                prev.policy().clone(),
                interp,
                &bg,
                true,
            );
        } else if let Some(prev) = image.op().and_then(|op| op.as_any().downcast_ref::<ScaleOp>()) {
            self.try_affine_merge(
                &mut tx,
                &mut source,
                prev.equivalent_transform(),
                prev.interpolation(),
                prev.background().to_vec(),
                prev.policy().clone(),
                interp,
                &bg,
                false,
            );
        }

        // the combination may have become the identity
        let size = source.width().max(source.height()) as f64;
        let flags = TxFlags::of(&tx, size);
        if flags.is_identity() {
            self.image = Some(source);
            return Ok(self);
        }

        let int_translate_x = (tx.translate_x() - tx.translate_x().round()).abs() < RS_EPS;
        let int_translate_y = (tx.translate_y() - tx.translate_y().round()).abs() < RS_EPS;
        let had_roi = self.roi.is_some();
        let policy = self.policy();

        if !flags.shear_x && !flags.shear_y && tx.scale_x() >= 0.0 && tx.scale_y() >= 0.0 {
            self.registry().descriptor("Scale")?;
            if !flags.scale_x && !flags.scale_y && int_translate_x && int_translate_y {
                // integer translate: pin the op's own layout
                let op = ScaleOp::new(
                    source,
                    1.0,
                    1.0,
                    tx.translate_x().round(),
                    tx.translate_y().round(),
                    interp,
                    policy,
                    bg,
                );
                self.emit_with_hints(Box::new(op), self.effective_hints_without_layout());
            } else {
                let op = ScaleOp::new(
                    source,
                    tx.scale_x(),
                    tx.scale_y(),
                    tx.translate_x(),
                    tx.translate_y(),
                    interp,
                    policy,
                    bg,
                );
                self.emit(Box::new(op));
            }
        } else {
            self.registry().descriptor("Affine")?;
            let op = AffineOp::new(source, tx, interp, policy, bg);
            self.emit(Box::new(op));
        }
        if had_roi {
            self.adopt_output_roi();
        }
        self.invalidate_statistics();
        Ok(self)
    }

    /// Folds the affine into the warp node below it. Returns `Ok(true)`
    /// when the reduction was applied.
    #[allow(clippy::too_many_arguments)]
    fn try_warp_reduction(
        &mut self,
        image: &Raster,
        original_transform: Arc<dyn MathTransform2D>,
        source_bb: Rect,
        warp_source: Raster,
        old_nodata: Option<raster_core::Range>,
        tx: AffineTransform,
        interp: Interpolation,
        bg: &[f64],
    ) -> Result<bool> {
        self.registry().descriptor("Warp")?;
        let affine_mt = AffineTransform2D(tx);
        let chained: Arc<dyn MathTransform2D> = Arc::new(ConcatenatedTransform::new(
            affine_mt.inverse()?,
            original_transform.clone(),
        ));

        let tolerance = self
            .hints
            .float_hint(HintKey::ResampleTolerance, self.config.resample_tolerance);
        let builder = WarpBuilder::new(tolerance).with_max_positions(WARP_MAX_POSITIONS);

        // the bounds the eliminated affine would have produced
        let target_bb = tx.map_rect(&image.bounds());
        let source_roi = warp_source
            .property(names::ROI)
            .and_then(|p| p.as_roi().cloned());
        let mapping_bb = if source_roi.is_some() {
            source_bb.union(&target_bb)
        } else {
            target_bb
        };
        let new_warp = builder.build(chained, mapping_bb)?;

        // only switch when the new warp is at least as cheap as the old
        let old_is_cheap = image
            .op()
            .and_then(|op| op.as_any().downcast_ref::<WarpOp>())
            .is_some_and(|w| w.warp().is_cheap());
        if !new_warp.is_cheap() && old_is_cheap {
            return Ok(false);
        }

        let has_same_nodata = old_nodata == self.nodata;
        if !has_same_nodata {
            return Ok(false);
        }

        // reproject the worker ROI back through the original mapping
        let new_roi: Option<Roi> = match &self.roi {
            Some(roi) => {
                let inverse = original_transform.inverse().ok().and_then(|inv| inv.as_affine());
                match inverse {
                    Some(inv) => {
                        let reprojected = match roi.transform(&inv) {
                            Ok(r) => r,
                            Err(_) => return Ok(false),
                        };
                        match &source_roi {
                            Some(sr) => Some(reprojected.intersect(sr)),
                            None => Some(reprojected),
                        }
                    }
                    // cannot reproject the ROI, skip the reduction
                    None => return Ok(false),
                }
            }
            None => source_roi,
        };

        self.set_roi(new_roi.clone());
        let policy = PixelPolicy::new(new_roi, old_nodata, self.background.clone());
        let op = WarpOp::with_bounds(
            warp_source,
            new_warp,
            interp,
            policy,
            bg.to_vec(),
            target_bb,
        );
        self.emit_with_hints(Box::new(op), self.effective_hints_without_layout());
        tracing::debug!(?target_bb, "reduced warp/affine chain to a single warp");
        self.adopt_output_roi();
        self.invalidate_statistics();
        Ok(true)
    }

    /// Merges the incoming transform with the one of the node below when
    /// interpolation, background, ROI and no-data are compatible.
    #[allow(clippy::too_many_arguments)]
    fn try_affine_merge(
        &mut self,
        tx: &mut AffineTransform,
        source: &mut Raster,
        prev_tx: AffineTransform,
        prev_interp: Interpolation,
        prev_bg: Vec<f64>,
        prev_policy: PixelPolicy,
        interp: Interpolation,
        bg: &[f64],
        compare_bg: bool,
    ) -> bool {
        let prev_roi = prev_policy.roi;
        let prev_nodata = prev_policy.nodata;

        let mut similar_roi = true;
        let mut has_same_nodata = true;
        if let Some(r) = &prev_roi {
            similar_roi = match prev_tx.invert() {
                Ok(inverse) => self
                    .roi
                    .as_ref()
                    .and_then(|roi| roi.transform(&inverse).ok())
                    .is_some_and(|moved| moved.intersects_rect(&r.bounds())),
                Err(e) => {
                    tracing::debug!(error = %e, "previous affine is not invertible");
                    false
                }
            };
        }
        if prev_nodata.is_some() {
            has_same_nodata = !prev_bg.is_empty()
                && self
                    .nodata
                    .as_ref()
                    .is_some_and(|nd| prev_bg[0] == nd.min);
        }

        let compatible = prev_interp == interp
            && (!compare_bg || prev_bg == bg)
            && (prev_nodata.is_none() || has_same_nodata)
            && (prev_roi.is_none() || similar_roi);
        if !compatible {
            return false;
        }

        *tx = tx.concatenate(&prev_tx);
        *source = self
            .image
            .as_ref()
            .and_then(Raster::first_source)
            .expect("merged node has a source");
        if similar_roi {
            if let (Some(r), Ok(inverse)) = (&prev_roi, prev_tx.invert()) {
                if let Some(moved) = self.roi.as_ref().and_then(|roi| roi.transform(&inverse).ok()) {
                    self.roi = Some(moved.intersect(r));
                }
            }
        }
        if has_same_nodata && prev_nodata.is_some() {
            self.set_nodata(prev_nodata);
        }
        true
    }

    // =========================================================================
    // Direct emissions
    // =========================================================================

    /// Scales and translates the image.
    pub fn scale(
        &mut self,
        x_scale: f64,
        y_scale: f64,
        x_trans: f64,
        y_trans: f64,
        interp: Interpolation,
    ) -> Result<&mut Self> {
        self.registry().descriptor("Scale")?;
        let image = self.require_image()?;
        let had_roi = self.roi.is_some();
        let bg = self.background.clone().unwrap_or_default();
        let op = ScaleOp::new(
            image,
            x_scale,
            y_scale,
            x_trans,
            y_trans,
            interp,
            self.policy(),
            bg,
        );
        self.emit(Box::new(op));
        if had_roi {
            self.adopt_output_roi();
        }
        self.invalidate_statistics();
        Ok(self)
    }

    /// Translates the image. Integer offsets shift the grid without
    /// resampling.
    pub fn translate(&mut self, dx: f64, dy: f64, interp: Interpolation) -> Result<&mut Self> {
        self.registry().descriptor("Translate")?;
        let image = self.require_image()?;
        let had_roi = self.roi.is_some();
        let integer = dx.fract() == 0.0 && dy.fract() == 0.0;
        let op = TranslateOp::new(image, dx, dy, interp, self.policy());
        self.emit(Box::new(op));
        if had_roi {
            self.adopt_output_roi();
        }
        if !integer {
            self.invalidate_statistics();
        }
        Ok(self)
    }

    /// Warps the image through a destination-to-source mapping.
    pub fn warp(&mut self, warp: Warp, interp: Interpolation) -> Result<&mut Self> {
        self.registry().descriptor("Warp")?;
        let image = self.require_image()?;
        let had_roi = self.roi.is_some();
        let bg = self.background.clone().unwrap_or_default();
        let op = WarpOp::new(image, warp, interp, self.policy(), bg);
        self.emit(Box::new(op));
        if had_roi {
            self.adopt_output_roi();
        }
        self.invalidate_statistics();
        Ok(self)
    }

    /// Crops the image, folding crop-over-crop into one node.
    pub fn crop(&mut self, x: i32, y: i32, width: u32, height: u32) -> Result<&mut Self> {
        self.registry().descriptor("Crop")?;
        let image = self.require_image()?;
        let mut rect = Rect::new(x, y, width, height);
        if rect == image.bounds() {
            return Ok(self);
        }

        let mut source = image.clone();
        if let Some(prev) = image.op().and_then(|op| op.as_any().downcast_ref::<CropOp>()) {
            rect = rect
                .intersect(&prev.rect())
                .ok_or_else(|| raster_core::Error::illegal_argument("crop", rect.to_string()))?;
            source = prev.sources()[0].clone();
        }
        let rect = rect
            .intersect(&source.bounds())
            .ok_or_else(|| raster_core::Error::illegal_argument("crop", rect.to_string()))?;

        let op = CropOp::new(source, rect, self.policy());
        self.emit(Box::new(op));
        Ok(self)
    }

    /// Pads the image with background-filled borders.
    pub fn border(&mut self, left: u32, right: u32, top: u32, bottom: u32) -> Result<&mut Self> {
        self.registry().descriptor("Border")?;
        let image = self.require_image()?;
        let bg = self.background.clone().unwrap_or_else(|| vec![0.0]);
        let op = BorderOp::new(image, left, right, top, bottom, bg);
        self.emit(Box::new(op));
        self.invalidate_statistics();
        Ok(self)
    }
}
