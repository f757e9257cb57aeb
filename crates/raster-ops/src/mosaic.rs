//! Multi-source mosaic composition.
//!
//! Sources are stacked over the union of their bounds. A source contributes
//! to a destination band when the pixel lies in its bounds and ROI, its
//! alpha weight is positive, the value is not no-data, and it passes the
//! per-band threshold. `Overlay` takes the first valid contribution in
//! source order; `Blend` averages contributions weighted by alpha. Pixels
//! with no valid contribution receive the background.

use std::any::Any;

use raster_core::{
    ColorModel, Error, ImageOp, PixelBuffer, Range, Raster, Rect, Result, Roi, SampleModel,
};

/// Mosaic compositing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MosaicMode {
    /// First valid source wins.
    #[default]
    Overlay,
    /// Alpha-weighted average of the valid sources.
    Blend,
}

/// Per-source inputs and the composed output of a mosaic.
pub struct MosaicOp {
    sources: Vec<Raster>,
    mode: MosaicMode,
    alphas: Vec<Option<Raster>>,
    rois: Vec<Option<Roi>>,
    thresholds: Option<Vec<Vec<f64>>>,
    nodata: Vec<Option<Range>>,
    background: Option<Vec<f64>>,
    bounds: Rect,
}

impl MosaicOp {
    /// Creates a mosaic. The per-source arrays must already be padded to
    /// the source count (the worker does that).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sources: Vec<Raster>,
        mode: MosaicMode,
        alphas: Vec<Option<Raster>>,
        rois: Vec<Option<Roi>>,
        thresholds: Option<Vec<Vec<f64>>>,
        nodata: Vec<Option<Range>>,
        background: Option<Vec<f64>>,
    ) -> Result<Self> {
        if sources.is_empty() {
            return Err(Error::illegal_argument("sources", "empty"));
        }
        let n = sources.len();
        if alphas.len() != n || rois.len() != n || nodata.len() != n {
            return Err(Error::illegal_argument(
                "mosaic parameters",
                "per-source arrays must match the source count",
            ));
        }
        let bounds = sources
            .iter()
            .map(Raster::bounds)
            .reduce(|a, b| a.union(&b))
            .unwrap_or_default();
        Ok(Self {
            sources,
            mode,
            alphas,
            rois,
            thresholds,
            nodata,
            background,
            bounds,
        })
    }

    fn threshold(&self, source: usize, band: u32) -> Option<f64> {
        let rows = self.thresholds.as_ref()?;
        let row = rows.get(source).or_else(|| rows.first())?;
        row.get(band as usize).or_else(|| row.first()).copied()
    }

    fn background_for(&self, band: u32) -> f64 {
        match &self.background {
            Some(bg) if !bg.is_empty() => bg.get(band as usize).copied().unwrap_or(bg[0]),
            _ => 0.0,
        }
    }
}

impl ImageOp for MosaicOp {
    fn name(&self) -> &'static str {
        "Mosaic"
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
        let rendered: Vec<PixelBuffer> = self
            .sources
            .iter()
            .map(Raster::data)
            .collect::<Result<_>>()?;
        let alpha_bufs: Vec<Option<PixelBuffer>> = self
            .alphas
            .iter()
            .map(|a| a.as_ref().map(Raster::data).transpose())
            .collect::<Result<_>>()?;
        let bands = self.sources[0].num_bands();
        let dtype = self.sources[0].data_type();
        Ok(PixelBuffer::from_fn(self.bounds, bands, dtype, |x, y, b| {
            let mut acc = 0.0;
            let mut weight_sum = 0.0;
            for (s, src) in rendered.iter().enumerate() {
                if !src.rect().contains(x, y) {
                    continue;
                }
                if self.rois[s].as_ref().is_some_and(|roi| !roi.contains(x, y)) {
                    continue;
                }
                let weight = match &alpha_bufs[s] {
                    Some(alpha) => alpha.sample(x, y, 0).unwrap_or(0.0),
                    None => 1.0,
                };
                if weight <= 0.0 {
                    continue;
                }
                let v = src.sample(x, y, b).unwrap_or(0.0);
                if self.nodata[s].as_ref().is_some_and(|r| r.contains(v)) {
                    continue;
                }
                if self.threshold(s, b).is_some_and(|t| v < t) {
                    continue;
                }
                match self.mode {
                    MosaicMode::Overlay => return v,
                    MosaicMode::Blend => {
                        acc += v * weight;
                        weight_sum += weight;
                    }
                }
            }
            if weight_sum > 0.0 {
                dtype.clamp(acc / weight_sum)
            } else {
                self.background_for(b)
            }
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_core::{DataType, RenderHints};

    fn flat(value: f64, rect: Rect) -> Raster {
        let buf = PixelBuffer::from_fn(rect, 1, DataType::U8, |_, _, _| value);
        Raster::from_buffer_component(buf)
    }

    fn pad(n: usize) -> (Vec<Option<Raster>>, Vec<Option<Roi>>, Vec<Option<Range>>) {
        (vec![None; n], vec![None; n], vec![None; n])
    }

    #[test]
    fn test_overlay_first_valid_wins() {
        let a = flat(10.0, Rect::from_size(4, 4));
        let b = flat(20.0, Rect::new(2, 0, 4, 4));
        let (alphas, rois, nodata) = pad(2);
        let op = MosaicOp::new(
            vec![a, b],
            MosaicMode::Overlay,
            alphas,
            rois,
            None,
            nodata,
            None,
        )
        .unwrap();
        let node = Raster::from_op(Box::new(op), &RenderHints::new());
        assert_eq!(node.bounds(), Rect::from_size(6, 4));
        let out = node.data().unwrap();
        assert_eq!(out.sample(3, 0, 0), Some(10.0)); // overlap: first source
        assert_eq!(out.sample(5, 0, 0), Some(20.0)); // only second covers
    }

    #[test]
    fn test_nodata_falls_through() {
        let a = flat(10.0, Rect::from_size(4, 4));
        let b = flat(20.0, Rect::from_size(4, 4));
        let (alphas, rois, _) = pad(2);
        let nodata = vec![Some(Range::point(10.0, DataType::U8)), None];
        let op = MosaicOp::new(
            vec![a, b],
            MosaicMode::Overlay,
            alphas,
            rois,
            None,
            nodata,
            None,
        )
        .unwrap();
        let out = Raster::from_op(Box::new(op), &RenderHints::new()).data().unwrap();
        assert_eq!(out.sample(0, 0, 0), Some(20.0));
    }

    #[test]
    fn test_background_when_nothing_valid() {
        let a = flat(10.0, Rect::from_size(2, 2));
        let (alphas, mut rois, nodata) = pad(1);
        rois[0] = Some(Roi::from_rect(Rect::from_size(1, 1)));
        let op = MosaicOp::new(
            vec![a],
            MosaicMode::Overlay,
            alphas,
            rois,
            None,
            nodata,
            Some(vec![77.0]),
        )
        .unwrap();
        let out = Raster::from_op(Box::new(op), &RenderHints::new()).data().unwrap();
        assert_eq!(out.sample(0, 0, 0), Some(10.0));
        assert_eq!(out.sample(1, 1, 0), Some(77.0));
    }

    #[test]
    fn test_threshold_masks_low_values() {
        let a = flat(5.0, Rect::from_size(2, 2));
        let b = flat(50.0, Rect::from_size(2, 2));
        let (alphas, rois, nodata) = pad(2);
        let op = MosaicOp::new(
            vec![a, b],
            MosaicMode::Overlay,
            alphas,
            rois,
            Some(vec![vec![10.0], vec![10.0]]),
            nodata,
            None,
        )
        .unwrap();
        let out = Raster::from_op(Box::new(op), &RenderHints::new()).data().unwrap();
        assert_eq!(out.sample(0, 0, 0), Some(50.0));
    }

    #[test]
    fn test_blend_weighted_average() {
        let a = flat(0.0, Rect::from_size(2, 2));
        let b = flat(100.0, Rect::from_size(2, 2));
        let alpha = flat(1.0, Rect::from_size(2, 2));
        let alphas = vec![Some(alpha.clone()), Some(alpha)];
        let op = MosaicOp::new(
            vec![a, b],
            MosaicMode::Blend,
            alphas,
            vec![None, None],
            None,
            vec![None, None],
            None,
        )
        .unwrap();
        let out = Raster::from_op(Box::new(op), &RenderHints::new()).data().unwrap();
        assert_eq!(out.sample(0, 0, 0), Some(50.0));
    }
}
