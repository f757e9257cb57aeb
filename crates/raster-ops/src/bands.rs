//! Band selection, merge and combination operations.

use std::any::Any;

use raster_core::{
    AffineTransform, ColorModel, ComponentColorModel, ColorSpaceKind, DataType, Error, ImageOp,
    PixelBuffer, Range, Raster, Rect, Result, SampleModel,
};
use smallvec::SmallVec;

use crate::policy::PixelPolicy;

fn component_model_for(bands: u32, data_type: DataType) -> ColorModel {
    let (space, has_alpha) = match bands {
        1 => (ColorSpaceKind::Gray, false),
        2 => (ColorSpaceKind::Gray, true),
        3 => (ColorSpaceKind::Srgb, false),
        4 => (ColorSpaceKind::Srgb, true),
        n => (ColorSpaceKind::Bogus(n as u8), false),
    };
    ColorModel::Component(ComponentColorModel::new(space, data_type, has_alpha))
}

/// Selects a subset of bands.
pub struct BandSelectOp {
    sources: Vec<Raster>,
    indices: Vec<u32>,
}

impl BandSelectOp {
    /// Creates a band selection.
    ///
    /// # Errors
    ///
    /// [`Error::IllegalArgument`] for an empty list or an out-of-range
    /// index.
    pub fn new(source: Raster, indices: Vec<u32>) -> Result<Self> {
        if indices.is_empty() {
            return Err(Error::illegal_argument("bands", "empty selection"));
        }
        if let Some(bad) = indices.iter().find(|&&i| i >= source.num_bands()) {
            return Err(Error::illegal_argument("band", bad.to_string()));
        }
        Ok(Self {
            sources: vec![source],
            indices,
        })
    }

    /// The selected band indices.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }
}

impl ImageOp for BandSelectOp {
    fn name(&self) -> &'static str {
        "BandSelect"
    }

    fn sources(&self) -> &[Raster] {
        &self.sources
    }

    fn bounds(&self) -> Rect {
        self.sources[0].bounds()
    }

    fn sample_model(&self) -> SampleModel {
        self.sources[0]
            .sample_model()
            .with_bands(self.indices.len() as u32)
    }

    fn color_model(&self) -> ColorModel {
        component_model_for(self.indices.len() as u32, self.sources[0].data_type())
    }

    fn compute(&self) -> Result<PixelBuffer> {
        let src = self.sources[0].data()?;
        Ok(PixelBuffer::from_fn(
            src.rect(),
            self.indices.len() as u32,
            src.data_type(),
            |x, y, b| src.sample(x, y, self.indices[b as usize]).unwrap_or(0.0),
        ))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Concatenates the bands of several sources side by side.
///
/// The first source fixes the destination grid. Other sources may carry an
/// affine transform mapping their coordinates onto that grid; they are
/// sampled nearest-neighbor through its inverse. Per-source no-data values
/// and pixels with no source coverage receive the background.
pub struct BandMergeOp {
    sources: Vec<Raster>,
    nodata: Vec<Option<Range>>,
    transforms: Option<Vec<AffineTransform>>,
    policy: PixelPolicy,
    add_alpha: bool,
}

impl BandMergeOp {
    /// Creates a band merge.
    ///
    /// `nodata` is right-padded with `None`; when `transforms` is given it
    /// must name one transform per source. With `add_alpha` set, the last
    /// source contributes the alpha channel.
    pub fn new(
        sources: Vec<Raster>,
        mut nodata: Vec<Option<Range>>,
        transforms: Option<Vec<AffineTransform>>,
        add_alpha: bool,
        policy: PixelPolicy,
    ) -> Result<Self> {
        if sources.is_empty() {
            return Err(Error::illegal_argument("sources", "empty"));
        }
        if let Some(t) = &transforms {
            if t.len() != sources.len() {
                return Err(Error::illegal_argument(
                    "transformations",
                    format!("{} for {} sources", t.len(), sources.len()),
                ));
            }
        }
        nodata.resize(sources.len(), None);
        Ok(Self {
            sources,
            nodata,
            transforms,
            policy,
            add_alpha,
        })
    }

    fn total_bands(&self) -> u32 {
        self.sources.iter().map(Raster::num_bands).sum()
    }

    fn dest_type(&self) -> DataType {
        self.sources
            .iter()
            .skip(1)
            .fold(self.sources[0].data_type(), |acc, s| acc.promote(s.data_type()))
    }
}

impl ImageOp for BandMergeOp {
    fn name(&self) -> &'static str {
        "BandMerge"
    }

    fn sources(&self) -> &[Raster] {
        &self.sources
    }

    fn bounds(&self) -> Rect {
        self.sources[0].bounds()
    }

    fn sample_model(&self) -> SampleModel {
        SampleModel::new(self.dest_type(), self.total_bands())
    }

    fn color_model(&self) -> ColorModel {
        let bands = self.total_bands();
        if self.add_alpha && bands >= 2 {
            let space = match bands - 1 {
                1 => ColorSpaceKind::Gray,
                3 => ColorSpaceKind::Srgb,
                n => ColorSpaceKind::Bogus(n as u8),
            };
            ColorModel::Component(ComponentColorModel::new(space, self.dest_type(), true))
        } else {
            component_model_for(bands, self.dest_type())
        }
    }

    fn compute(&self) -> Result<PixelBuffer> {
        let rendered: Vec<PixelBuffer> = self
            .sources
            .iter()
            .map(Raster::data)
            .collect::<Result<_>>()?;
        let inverses: Option<Vec<AffineTransform>> = match &self.transforms {
            Some(ts) => Some(
                ts.iter()
                    .map(AffineTransform::invert)
                    .collect::<Result<_>>()?,
            ),
            None => None,
        };
        // band -> (source index, band within source)
        let mut layout: SmallVec<[(usize, u32); 8]> = SmallVec::new();
        for (s, src) in rendered.iter().enumerate() {
            for b in 0..src.num_bands() {
                layout.push((s, b));
            }
        }
        let dtype = self.dest_type();
        Ok(PixelBuffer::from_fn(
            self.bounds(),
            self.total_bands(),
            dtype,
            |x, y, band| {
                let (s, b) = layout[band as usize];
                if !self.policy.allows(x, y) {
                    return self.policy.background_for(band);
                }
                let (sx, sy) = match &inverses {
                    Some(inv) => {
                        let (fx, fy) = inv[s].apply(x as f64 + 0.5, y as f64 + 0.5);
                        (fx.floor() as i32, fy.floor() as i32)
                    }
                    None => (x, y),
                };
                match rendered[s].sample(sx, sy, b) {
                    Some(v) if !self.nodata[s].as_ref().is_some_and(|r| r.contains(v)) => v,
                    _ => self.policy.background_for(band),
                }
            },
        ))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Linear band combination: each destination band is a weighted sum of the
/// source bands plus a constant (the trailing matrix column).
pub struct BandCombineOp {
    sources: Vec<Raster>,
    matrix: Vec<Vec<f64>>,
    policy: PixelPolicy,
}

impl BandCombineOp {
    /// Creates a band combine; each matrix row must have
    /// `source bands + 1` entries.
    pub fn new(source: Raster, matrix: Vec<Vec<f64>>, policy: PixelPolicy) -> Result<Self> {
        let expected = source.num_bands() as usize + 1;
        if matrix.is_empty() || matrix.iter().any(|row| row.len() != expected) {
            return Err(Error::illegal_argument(
                "matrix",
                format!("rows must have {expected} entries"),
            ));
        }
        Ok(Self {
            sources: vec![source],
            matrix,
            policy,
        })
    }
}

impl ImageOp for BandCombineOp {
    fn name(&self) -> &'static str {
        "BandCombine"
    }

    fn sources(&self) -> &[Raster] {
        &self.sources
    }

    fn bounds(&self) -> Rect {
        self.sources[0].bounds()
    }

    fn sample_model(&self) -> SampleModel {
        self.sources[0]
            .sample_model()
            .with_bands(self.matrix.len() as u32)
    }

    fn color_model(&self) -> ColorModel {
        component_model_for(self.matrix.len() as u32, self.sources[0].data_type())
    }

    fn compute(&self) -> Result<PixelBuffer> {
        let src = self.sources[0].data()?;
        let dtype = src.data_type();
        let src_bands = src.num_bands();
        let dest_nodata = self.policy.dest_nodata();
        Ok(PixelBuffer::from_fn(
            src.rect(),
            self.matrix.len() as u32,
            dtype,
            |x, y, out_band| {
                if !self.policy.allows(x, y) {
                    return dest_nodata;
                }
                let row = &self.matrix[out_band as usize];
                let mut acc = row[src_bands as usize];
                for b in 0..src_bands {
                    let v = src.sample(x, y, b).unwrap_or(0.0);
                    if self.policy.is_nodata(v) {
                        return dest_nodata;
                    }
                    acc += v * row[b as usize];
                }
                dtype.clamp(acc)
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
    use raster_core::RenderHints;

    fn gray(value: f64, rect: Rect) -> Raster {
        let buf = PixelBuffer::from_fn(rect, 1, DataType::U8, |_, _, _| value);
        Raster::from_buffer_component(buf)
    }

    #[test]
    fn test_band_select_subset() {
        let buf = PixelBuffer::from_fn(Rect::from_size(2, 2), 4, DataType::U8, |_, _, b| {
            b as f64 * 10.0
        });
        let src = Raster::from_buffer_component(buf);
        let op = BandSelectOp::new(src, vec![3, 0]).unwrap();
        let node = Raster::from_op(Box::new(op), &RenderHints::new());
        assert_eq!(node.num_bands(), 2);
        let out = node.data().unwrap();
        assert_eq!(out.sample(0, 0, 0), Some(30.0));
        assert_eq!(out.sample(0, 0, 1), Some(0.0));
    }

    #[test]
    fn test_band_select_bad_index() {
        let src = gray(1.0, Rect::from_size(2, 2));
        assert!(BandSelectOp::new(src, vec![1]).is_err());
    }

    #[test]
    fn test_band_merge_concatenates() {
        let rect = Rect::from_size(2, 2);
        let a = gray(10.0, rect);
        let b = gray(20.0, rect);
        let op = BandMergeOp::new(vec![a, b], vec![], None, false, PixelPolicy::none()).unwrap();
        let node = Raster::from_op(Box::new(op), &RenderHints::new());
        assert_eq!(node.num_bands(), 2);
        let out = node.data().unwrap();
        assert_eq!(out.sample(1, 1, 0), Some(10.0));
        assert_eq!(out.sample(1, 1, 1), Some(20.0));
    }

    #[test]
    fn test_band_merge_nodata_fills_background() {
        let rect = Rect::from_size(2, 1);
        let a = gray(10.0, rect);
        let b = gray(20.0, rect);
        let policy = PixelPolicy::new(None, None, Some(vec![0.0, 5.0]));
        let op = BandMergeOp::new(
            vec![a, b],
            vec![None, Some(Range::point(20.0, DataType::U8))],
            None,
            false,
            policy,
        )
        .unwrap();
        let out = Raster::from_op(Box::new(op), &RenderHints::new()).data().unwrap();
        assert_eq!(out.sample(0, 0, 0), Some(10.0));
        assert_eq!(out.sample(0, 0, 1), Some(5.0));
    }

    #[test]
    fn test_band_merge_with_transform() {
        let a = gray(1.0, Rect::from_size(4, 4));
        // second source lives at a 4-pixel offset and is mapped back
        let b = gray(9.0, Rect::new(4, 0, 4, 4));
        let op = BandMergeOp::new(
            vec![a, b],
            vec![],
            Some(vec![
                AffineTransform::identity(),
                AffineTransform::translation(-4.0, 0.0),
            ]),
            false,
            PixelPolicy::none(),
        )
        .unwrap();
        let out = Raster::from_op(Box::new(op), &RenderHints::new()).data().unwrap();
        assert_eq!(out.sample(0, 0, 1), Some(9.0));
    }

    #[test]
    fn test_band_combine_intensity() {
        let buf = PixelBuffer::from_fn(Rect::from_size(1, 1), 3, DataType::U8, |_, _, b| {
            (b as f64 + 1.0) * 30.0
        });
        let src = Raster::from_buffer_component(buf);
        let third = 1.0 / 3.0;
        let op = BandCombineOp::new(
            src,
            vec![vec![third, third, third, 0.0]],
            PixelPolicy::none(),
        )
        .unwrap();
        let out = Raster::from_op(Box::new(op), &RenderHints::new()).data().unwrap();
        assert_eq!(out.sample(0, 0, 0), Some(60.0));
    }
}
