//! Linear rescale and binarize operations.

use std::any::Any;

use raster_core::{
    ColorModel, ComponentColorModel, ColorSpaceKind, DataType, ImageOp, PixelBuffer, Raster, Rect,
    Result, SampleModel,
};

use crate::policy::PixelPolicy;

/// Per-band linear transform `v * scale + offset`, cast to a destination
/// type with clamping. Pixels excluded by the policy receive the
/// destination no-data value.
pub struct RescaleOp {
    sources: Vec<Raster>,
    scale: Vec<f64>,
    offset: Vec<f64>,
    dest_type: DataType,
    policy: PixelPolicy,
}

impl RescaleOp {
    /// Creates a rescale; length-1 constant vectors broadcast across bands.
    pub fn new(
        source: Raster,
        scale: Vec<f64>,
        offset: Vec<f64>,
        dest_type: DataType,
        policy: PixelPolicy,
    ) -> Self {
        Self {
            sources: vec![source],
            scale,
            offset,
            dest_type,
            policy,
        }
    }

    #[inline]
    fn coeff(values: &[f64], band: u32, default: f64) -> f64 {
        match values {
            [] => default,
            [single] => *single,
            multi => multi.get(band as usize).copied().unwrap_or(default),
        }
    }
}

impl ImageOp for RescaleOp {
    fn name(&self) -> &'static str {
        "Rescale"
    }

    fn sources(&self) -> &[Raster] {
        &self.sources
    }

    fn bounds(&self) -> Rect {
        self.sources[0].bounds()
    }

    fn sample_model(&self) -> SampleModel {
        self.sources[0].sample_model().with_data_type(self.dest_type)
    }

    fn color_model(&self) -> ColorModel {
        // rescale flattens palettes into plain components
        match self.sources[0].color_model() {
            ColorModel::Component(ccm) => {
                let mut out = ccm.clone();
                out.data_type = self.dest_type;
                ColorModel::Component(out)
            }
            other => {
                let bands = self.sources[0].num_bands();
                let (space, has_alpha) = match bands {
                    1 => (ColorSpaceKind::Gray, false),
                    2 => (ColorSpaceKind::Gray, true),
                    3 => (ColorSpaceKind::Srgb, false),
                    4 => (ColorSpaceKind::Srgb, true),
                    n => (ColorSpaceKind::Bogus(n as u8), false),
                };
                let mut ccm = ComponentColorModel::new(space, self.dest_type, has_alpha);
                ccm.transparency = other.transparency();
                ColorModel::Component(ccm)
            }
        }
    }

    fn compute(&self) -> Result<PixelBuffer> {
        let src = self.sources[0].data()?;
        let dest_nodata = self.policy.dest_nodata();
        Ok(PixelBuffer::from_fn(
            src.rect(),
            src.num_bands(),
            self.dest_type,
            |x, y, b| {
                if !self.policy.allows(x, y) {
                    return dest_nodata;
                }
                let v = src.sample(x, y, b).unwrap_or(0.0);
                if self.policy.is_nodata(v) {
                    return dest_nodata;
                }
                let scaled =
                    v * Self::coeff(&self.scale, b, 1.0) + Self::coeff(&self.offset, b, 0.0);
                self.dest_type.clamp(scaled)
            },
        ))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Thresholds a single band into a bilevel image: `v >= threshold` maps to
/// 1, everything else (including excluded pixels) to 0.
pub struct BinarizeOp {
    sources: Vec<Raster>,
    threshold: f64,
    policy: PixelPolicy,
}

impl BinarizeOp {
    /// Creates a binarize over band 0.
    pub fn new(source: Raster, threshold: f64, policy: PixelPolicy) -> Self {
        Self {
            sources: vec![source],
            threshold,
            policy,
        }
    }
}

impl ImageOp for BinarizeOp {
    fn name(&self) -> &'static str {
        "Binarize"
    }

    fn sources(&self) -> &[Raster] {
        &self.sources
    }

    fn bounds(&self) -> Rect {
        self.sources[0].bounds()
    }

    fn sample_model(&self) -> SampleModel {
        SampleModel::new(DataType::U1, 1)
    }

    fn color_model(&self) -> ColorModel {
        ColorModel::Component(ComponentColorModel::new(
            ColorSpaceKind::Gray,
            DataType::U1,
            false,
        ))
    }

    fn compute(&self) -> Result<PixelBuffer> {
        let src = self.sources[0].data()?;
        Ok(PixelBuffer::from_fn(
            src.rect(),
            1,
            DataType::U1,
            |x, y, _| {
                if !self.policy.allows(x, y) {
                    return 0.0;
                }
                let v = src.sample(x, y, 0).unwrap_or(0.0);
                if self.policy.is_nodata(v) {
                    return 0.0;
                }
                (v >= self.threshold) as u8 as f64
            },
        ))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_core::{Range, RenderHints};

    fn gray(values: &[f64], width: u32) -> Raster {
        let height = values.len() as u32 / width;
        let buf = PixelBuffer::from_fn(
            Rect::from_size(width, height),
            1,
            DataType::F64,
            |x, y, _| values[(y as u32 * width + x as u32) as usize],
        );
        Raster::from_buffer_component(buf)
    }

    #[test]
    fn test_rescale_to_bytes() {
        let src = gray(&[0.0, 10000.0, 20000.0, 5000.0], 2);
        let op = RescaleOp::new(
            src,
            vec![255.0 / 20000.0],
            vec![0.0],
            DataType::U8,
            PixelPolicy::none(),
        );
        let buf = Raster::from_op(Box::new(op), &RenderHints::new()).data().unwrap();
        assert_eq!(buf.sample(0, 0, 0), Some(0.0));
        assert_eq!(buf.sample(1, 1, 0), Some(64.0));
        assert_eq!(buf.sample(0, 1, 0), Some(255.0));
    }

    #[test]
    fn test_rescale_nodata_to_background() {
        let src = gray(&[0.0, -9999.0, 50.0, 60.0], 2);
        let policy = PixelPolicy::new(
            None,
            Some(Range::point(-9999.0, DataType::F64)),
            Some(vec![7.0]),
        );
        let op = RescaleOp::new(src, vec![1.0], vec![0.0], DataType::U8, policy);
        let buf = Raster::from_op(Box::new(op), &RenderHints::new()).data().unwrap();
        assert_eq!(buf.sample(1, 0, 0), Some(7.0));
        assert_eq!(buf.sample(0, 1, 0), Some(50.0));
    }

    #[test]
    fn test_binarize() {
        let src = gray(&[1.0, 5.0, 9.0, 3.0], 2);
        let op = BinarizeOp::new(src, 4.0, PixelPolicy::none());
        let node = Raster::from_op(Box::new(op), &RenderHints::new());
        assert_eq!(node.data_type(), DataType::U1);
        let buf = node.data().unwrap();
        assert_eq!(buf.sample(0, 0, 0), Some(0.0));
        assert_eq!(buf.sample(1, 0, 0), Some(1.0));
        assert_eq!(buf.sample(0, 1, 0), Some(1.0));
    }
}
