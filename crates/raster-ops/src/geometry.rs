//! Geometric resampling operations: scale, affine, translate, crop, warp.
//!
//! All resampling ops follow the same plan: the destination grid is the
//! forward-mapped source bounds (or an explicit target), each destination
//! pixel center is mapped back into source coordinates, and the configured
//! [`Interpolation`] samples the source there, honoring ROI and no-data.
//! Pixels with no valid contribution receive the background.
//!
//! The ops expose their parameters through accessors because the worker's
//! fold passes inspect the node behind the current image (affine over
//! affine, affine over scale, crop over crop, warp-affine reduction).

use std::any::Any;
use std::sync::Arc;

use raster_core::{
    AffineTransform, ColorModel, ImageOp, NodeProperty, PixelBuffer, Raster, Rect, Result,
    Roi, SampleModel, property::names,
};

use crate::interp::{Interpolation, SourcePixels};
use crate::policy::PixelPolicy;
use crate::warp::{MathTransform2D, Warp};

/// Forward-maps the policy ROI into the op's output space, producing the
/// lower-case `"roi"` property the worker reads back after emission.
fn mapped_roi_property(
    roi: Option<&Roi>,
    forward: &AffineTransform,
) -> Vec<(String, NodeProperty)> {
    match roi.map(|r| r.transform(forward)) {
        Some(Ok(mapped)) => vec![(names::OUTPUT_ROI.to_string(), NodeProperty::Roi(mapped))],
        Some(Err(_)) => {
            tracing::debug!("source ROI could not be forward-mapped, dropping roi property");
            Vec::new()
        }
        None => Vec::new(),
    }
}

fn resample(
    source: &Raster,
    bounds: Rect,
    inverse: &AffineTransform,
    interp: Interpolation,
    policy: &PixelPolicy,
    background: &[f64],
) -> Result<PixelBuffer> {
    let src = source.data()?;
    let bg_for = |band: u32| -> f64 {
        background
            .get(band as usize)
            .or(background.last())
            .copied()
            .unwrap_or_else(|| policy.background_for(band))
    };
    let pixels = SourcePixels::new(&src, policy.roi.as_ref(), policy.nodata.as_ref());
    Ok(PixelBuffer::from_fn(
        bounds,
        src.num_bands(),
        src.data_type(),
        |x, y, b| {
            let (sx, sy) = inverse.apply(x as f64 + 0.5, y as f64 + 0.5);
            interp
                .sample(&pixels, sx, sy, b)
                .unwrap_or_else(|| bg_for(b))
        },
    ))
}

/// Scale and translate without shear.
pub struct ScaleOp {
    sources: Vec<Raster>,
    x_scale: f64,
    y_scale: f64,
    x_trans: f64,
    y_trans: f64,
    interp: Interpolation,
    policy: PixelPolicy,
    background: Vec<f64>,
    bounds: Rect,
}

impl ScaleOp {
    /// Creates a scale op.
    pub fn new(
        source: Raster,
        x_scale: f64,
        y_scale: f64,
        x_trans: f64,
        y_trans: f64,
        interp: Interpolation,
        policy: PixelPolicy,
        background: Vec<f64>,
    ) -> Self {
        let transform = AffineTransform::new(x_scale, 0.0, 0.0, y_scale, x_trans, y_trans);
        let bounds = transform.map_rect(&source.bounds());
        Self {
            sources: vec![source],
            x_scale,
            y_scale,
            x_trans,
            y_trans,
            interp,
            policy,
            background,
            bounds,
        }
    }

    /// The affine transform equivalent to this scale.
    pub fn equivalent_transform(&self) -> AffineTransform {
        AffineTransform::new(
            self.x_scale,
            0.0,
            0.0,
            self.y_scale,
            self.x_trans,
            self.y_trans,
        )
    }

    /// The interpolation in use.
    pub fn interpolation(&self) -> Interpolation {
        self.interp
    }

    /// The pixel policy in use.
    pub fn policy(&self) -> &PixelPolicy {
        &self.policy
    }

    /// The background fill values.
    pub fn background(&self) -> &[f64] {
        &self.background
    }
}

impl ImageOp for ScaleOp {
    fn name(&self) -> &'static str {
        "Scale"
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
        let inverse = self.equivalent_transform().invert()?;
        resample(
            &self.sources[0],
            self.bounds,
            &inverse,
            self.interp,
            &self.policy,
            &self.background,
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn output_properties(&self) -> Vec<(String, NodeProperty)> {
        mapped_roi_property(self.policy.roi.as_ref(), &self.equivalent_transform())
    }
}

/// General affine resampling.
pub struct AffineOp {
    sources: Vec<Raster>,
    transform: AffineTransform,
    interp: Interpolation,
    policy: PixelPolicy,
    background: Vec<f64>,
    bounds: Rect,
}

impl AffineOp {
    /// Creates an affine op.
    pub fn new(
        source: Raster,
        transform: AffineTransform,
        interp: Interpolation,
        policy: PixelPolicy,
        background: Vec<f64>,
    ) -> Self {
        let bounds = transform.map_rect(&source.bounds());
        Self {
            sources: vec![source],
            transform,
            interp,
            policy,
            background,
            bounds,
        }
    }

    /// The forward transform.
    pub fn transform(&self) -> AffineTransform {
        self.transform
    }

    /// The interpolation in use.
    pub fn interpolation(&self) -> Interpolation {
        self.interp
    }

    /// The pixel policy in use.
    pub fn policy(&self) -> &PixelPolicy {
        &self.policy
    }

    /// The background fill values.
    pub fn background(&self) -> &[f64] {
        &self.background
    }
}

impl ImageOp for AffineOp {
    fn name(&self) -> &'static str {
        "Affine"
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
        let inverse = self.transform.invert()?;
        resample(
            &self.sources[0],
            self.bounds,
            &inverse,
            self.interp,
            &self.policy,
            &self.background,
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn output_properties(&self) -> Vec<(String, NodeProperty)> {
        mapped_roi_property(self.policy.roi.as_ref(), &self.transform)
    }
}

/// Translation. Integer offsets shift the grid without touching samples;
/// fractional offsets resample through the interpolation.
pub struct TranslateOp {
    sources: Vec<Raster>,
    dx: f64,
    dy: f64,
    interp: Interpolation,
    policy: PixelPolicy,
    bounds: Rect,
}

impl TranslateOp {
    /// Creates a translate op.
    pub fn new(source: Raster, dx: f64, dy: f64, interp: Interpolation, policy: PixelPolicy) -> Self {
        let bounds = AffineTransform::translation(dx, dy).map_rect(&source.bounds());
        Self {
            sources: vec![source],
            dx,
            dy,
            interp,
            policy,
            bounds,
        }
    }

    fn is_integer(&self) -> bool {
        self.dx.fract() == 0.0 && self.dy.fract() == 0.0
    }
}

impl ImageOp for TranslateOp {
    fn name(&self) -> &'static str {
        "Translate"
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
        if self.is_integer() {
            // pure grid shift, samples untouched
            return src.with_rect(src.rect().translate(self.dx as i32, self.dy as i32));
        }
        let inverse = AffineTransform::translation(self.dx, self.dy).invert()?;
        resample(
            &self.sources[0],
            self.bounds,
            &inverse,
            self.interp,
            &self.policy,
            &[],
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn output_properties(&self) -> Vec<(String, NodeProperty)> {
        mapped_roi_property(
            self.policy.roi.as_ref(),
            &AffineTransform::translation(self.dx, self.dy),
        )
    }
}

/// Extracts a rectangular region.
pub struct CropOp {
    sources: Vec<Raster>,
    rect: Rect,
    policy: PixelPolicy,
}

impl CropOp {
    /// Creates a crop; the rectangle is intersected with the source bounds
    /// by the caller.
    pub fn new(source: Raster, rect: Rect, policy: PixelPolicy) -> Self {
        Self {
            sources: vec![source],
            rect,
            policy,
        }
    }

    /// The crop rectangle.
    pub fn rect(&self) -> Rect {
        self.rect
    }
}

impl ImageOp for CropOp {
    fn name(&self) -> &'static str {
        "Crop"
    }

    fn sources(&self) -> &[Raster] {
        &self.sources
    }

    fn bounds(&self) -> Rect {
        self.rect
    }

    fn sample_model(&self) -> SampleModel {
        self.sources[0].sample_model()
    }

    fn color_model(&self) -> ColorModel {
        self.sources[0].color_model().clone()
    }

    fn compute(&self) -> Result<PixelBuffer> {
        let src = self.sources[0].data()?;
        let dest_nodata = self.policy.dest_nodata();
        Ok(PixelBuffer::from_fn(
            self.rect,
            src.num_bands(),
            src.data_type(),
            |x, y, b| {
                if !self.policy.allows(x, y) {
                    return dest_nodata;
                }
                match src.sample(x, y, b) {
                    Some(v) if !self.policy.is_nodata(v) => v,
                    _ => dest_nodata,
                }
            },
        ))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Generic warp resampling through a destination-to-source [`Warp`].
pub struct WarpOp {
    sources: Vec<Raster>,
    warp: Warp,
    interp: Interpolation,
    policy: PixelPolicy,
    background: Vec<f64>,
    bounds: Rect,
}

impl WarpOp {
    /// Creates a warp over the source bounds.
    pub fn new(
        source: Raster,
        warp: Warp,
        interp: Interpolation,
        policy: PixelPolicy,
        background: Vec<f64>,
    ) -> Self {
        let bounds = source.bounds();
        Self::with_bounds(source, warp, interp, policy, background, bounds)
    }

    /// Creates a warp with explicit target bounds (the warp-affine fold
    /// pins the bounds the eliminated affine would have produced).
    pub fn with_bounds(
        source: Raster,
        warp: Warp,
        interp: Interpolation,
        policy: PixelPolicy,
        background: Vec<f64>,
        bounds: Rect,
    ) -> Self {
        Self {
            sources: vec![source],
            warp,
            interp,
            policy,
            background,
            bounds,
        }
    }

    /// The warp mapping.
    pub fn warp(&self) -> &Warp {
        &self.warp
    }

    /// The transform behind the warp, when known.
    pub fn math_transform(&self) -> Option<Arc<dyn MathTransform2D>> {
        self.warp.math_transform()
    }

    /// Bounds of the warp's source.
    pub fn source_bounds(&self) -> Rect {
        self.sources[0].bounds()
    }

    /// The interpolation in use.
    pub fn interpolation(&self) -> Interpolation {
        self.interp
    }

    /// The pixel policy in use.
    pub fn policy(&self) -> &PixelPolicy {
        &self.policy
    }

    /// The background fill values.
    pub fn background(&self) -> &[f64] {
        &self.background
    }
}

impl ImageOp for WarpOp {
    fn name(&self) -> &'static str {
        "Warp"
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
        let pixels = SourcePixels::new(&src, self.policy.roi.as_ref(), self.policy.nodata.as_ref());
        let bg_for = |band: u32| -> f64 {
            self.background
                .get(band as usize)
                .or(self.background.last())
                .copied()
                .unwrap_or_else(|| self.policy.background_for(band))
        };
        Ok(PixelBuffer::from_fn(
            self.bounds,
            src.num_bands(),
            src.data_type(),
            |x, y, b| {
                let (sx, sy) = self.warp.map(x as f64 + 0.5, y as f64 + 0.5);
                self.interp
                    .sample(&pixels, sx, sy, b)
                    .unwrap_or_else(|| bg_for(b))
            },
        ))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn output_properties(&self) -> Vec<(String, NodeProperty)> {
        // the warped ROI has no vector form in general: rasterize by
        // checking where destination pixels read from inside the ROI
        match &self.policy.roi {
            Some(roi) => {
                let mask = raster_core::MaskImage::from_fn(self.bounds, |x, y| {
                    let (sx, sy) = self.warp.map(x as f64 + 0.5, y as f64 + 0.5);
                    roi.contains(sx.floor() as i32, sy.floor() as i32)
                });
                vec![(
                    names::OUTPUT_ROI.to_string(),
                    NodeProperty::Roi(Roi::Raster(mask)),
                )]
            }
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_core::{DataType, RenderHints};
    use crate::warp::WarpAffine;

    fn ramp(rect: Rect) -> Raster {
        let buf = PixelBuffer::from_fn(rect, 1, DataType::F64, |x, y, _| (x + y) as f64);
        Raster::from_buffer_component(buf)
    }

    #[test]
    fn test_scale_bounds_and_values() {
        let src = ramp(Rect::from_size(4, 4));
        let op = ScaleOp::new(
            src,
            2.0,
            2.0,
            0.0,
            0.0,
            Interpolation::Nearest,
            PixelPolicy::none(),
            vec![],
        );
        let node = Raster::from_op(Box::new(op), &RenderHints::new());
        assert_eq!(node.bounds(), Rect::from_size(8, 8));
        // dest (5,5) center maps back to src (2.75, 2.75) -> nearest (2,2)
        assert_eq!(node.sample(5, 5, 0).unwrap(), 4.0);
    }

    #[test]
    fn test_translate_integer_shares_data() {
        let src = ramp(Rect::from_size(4, 4));
        let src_buf = src.data().unwrap();
        let op = TranslateOp::new(src, 10.0, -2.0, Interpolation::Nearest, PixelPolicy::none());
        let node = Raster::from_op(Box::new(op), &RenderHints::new());
        assert_eq!(node.bounds(), Rect::new(10, -2, 4, 4));
        let buf = node.data().unwrap();
        assert!(buf.data_ptr_eq(&src_buf));
        assert_eq!(buf.sample(10, -2, 0), Some(0.0));
    }

    #[test]
    fn test_crop_fills_outside_roi() {
        let src = ramp(Rect::from_size(4, 4));
        let policy = PixelPolicy::new(
            Some(Roi::from_rect(Rect::from_size(2, 4))),
            None,
            Some(vec![99.0]),
        );
        let op = CropOp::new(src, Rect::from_size(3, 3), policy);
        let out = Raster::from_op(Box::new(op), &RenderHints::new()).data().unwrap();
        assert_eq!(out.sample(1, 1, 0), Some(2.0));
        assert_eq!(out.sample(2, 1, 0), Some(99.0));
    }

    #[test]
    fn test_warp_affine_matches_affine() {
        let src = ramp(Rect::from_size(8, 8));
        // dest-to-source: divide by two
        let warp = Warp::Affine(WarpAffine {
            transform: AffineTransform::scale(0.5, 0.5),
        });
        let op = WarpOp::with_bounds(
            src,
            warp,
            Interpolation::Nearest,
            PixelPolicy::none(),
            vec![],
            Rect::from_size(16, 16),
        );
        let node = Raster::from_op(Box::new(op), &RenderHints::new());
        assert_eq!(node.sample(10, 10, 0).unwrap(), 10.0);
    }

    #[test]
    fn test_affine_emits_roi_property() {
        let src = ramp(Rect::from_size(4, 4));
        let policy = PixelPolicy::new(Some(Roi::from_rect(Rect::from_size(2, 2))), None, None);
        let op = AffineOp::new(
            src,
            AffineTransform::scale(2.0, 2.0),
            Interpolation::Nearest,
            policy,
            vec![0.0],
        );
        let node = Raster::from_op(Box::new(op), &RenderHints::new());
        let prop = node.property(names::OUTPUT_ROI).unwrap();
        let roi = prop.as_roi().unwrap();
        assert!(roi.contains(3, 3));
        assert!(!roi.contains(5, 5));
    }
}
