//! Table-driven operations: lookup, range-lookup, piecewise, classify.
//!
//! The lookup contract follows the classic point-op rules: the destination
//! has the table's band count when the source is single-banded, otherwise
//! the source's; a single-banded table (or source) broadcasts against the
//! multi-banded counterpart. This is also the primitive the conversion
//! engine uses to expand palettes into component bands.

use std::any::Any;

use raster_core::{
    ColorModel, ComponentColorModel, ColorSpaceKind, DataType, ImageOp, IndexedColorModel,
    PixelBuffer, Range, Raster, Rect, Result, SampleModel,
};

use crate::policy::PixelPolicy;

/// A 1-D lookup table with one row per destination band.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupTable {
    /// Index of the source value mapped to table slot 0.
    pub offset: i32,
    /// Table rows; each row maps a source index to a destination value.
    pub tables: Vec<Vec<f64>>,
    /// Destination data type.
    pub dest_type: DataType,
}

impl LookupTable {
    /// Creates a table from rows.
    pub fn new(tables: Vec<Vec<f64>>, dest_type: DataType) -> Self {
        Self {
            offset: 0,
            tables,
            dest_type,
        }
    }

    /// An identity byte table over the given band count, with one band
    /// rewritten by `f` (used for opacity).
    pub fn identity_bytes_with(bands: u32, rewritten: Option<u32>, f: impl Fn(u32) -> f64) -> Self {
        let tables = (0..bands)
            .map(|b| {
                (0..256u32)
                    .map(|i| {
                        if Some(b) == rewritten {
                            f(i)
                        } else {
                            i as f64
                        }
                    })
                    .collect()
            })
            .collect();
        Self::new(tables, DataType::U8)
    }

    /// Number of table rows.
    pub fn num_bands(&self) -> u32 {
        self.tables.len() as u32
    }

    /// Looks up a value in a row, clamping the index to the row.
    #[inline]
    pub fn lookup(&self, band: u32, value: f64) -> f64 {
        let row = if self.tables.len() == 1 {
            &self.tables[0]
        } else {
            &self.tables[band as usize]
        };
        if row.is_empty() {
            return 0.0;
        }
        let idx = (value as i64 - self.offset as i64).clamp(0, row.len() as i64 - 1) as usize;
        row[idx]
    }
}

/// Applies a [`LookupTable`] to every pixel.
pub struct LookupOp {
    sources: Vec<Raster>,
    table: LookupTable,
    policy: PixelPolicy,
    color_model: ColorModel,
}

impl LookupOp {
    /// Creates a lookup whose output color model is derived from the band
    /// count (gray below 3 bands, sRGB otherwise).
    pub fn new(source: Raster, table: LookupTable, policy: PixelPolicy) -> Self {
        let bands = if source.num_bands() == 1 {
            table.num_bands()
        } else {
            source.num_bands()
        };
        let (space, has_alpha) = match bands {
            1 => (ColorSpaceKind::Gray, false),
            2 => (ColorSpaceKind::Gray, true),
            3 => (ColorSpaceKind::Srgb, false),
            4 => (ColorSpaceKind::Srgb, true),
            n => (ColorSpaceKind::Bogus(n as u8), false),
        };
        let color_model = ColorModel::Component(ComponentColorModel::new(
            space,
            table.dest_type,
            has_alpha,
        ));
        Self {
            sources: vec![source],
            table,
            policy,
            color_model,
        }
    }

    /// Creates a lookup installing an explicit output color model (palette
    /// rewrites keep an indexed model this way).
    pub fn with_color_model(
        source: Raster,
        table: LookupTable,
        policy: PixelPolicy,
        color_model: ColorModel,
    ) -> Self {
        Self {
            sources: vec![source],
            table,
            policy,
            color_model,
        }
    }

    fn dest_bands(&self) -> u32 {
        let src_bands = self.sources[0].num_bands();
        if src_bands == 1 {
            self.table.num_bands()
        } else {
            src_bands
        }
    }
}

impl ImageOp for LookupOp {
    fn name(&self) -> &'static str {
        "Lookup"
    }

    fn sources(&self) -> &[Raster] {
        &self.sources
    }

    fn bounds(&self) -> Rect {
        self.sources[0].bounds()
    }

    fn sample_model(&self) -> SampleModel {
        SampleModel::new(self.table.dest_type, self.dest_bands())
    }

    fn color_model(&self) -> ColorModel {
        self.color_model.clone()
    }

    fn compute(&self) -> Result<PixelBuffer> {
        let src = self.sources[0].data()?;
        let src_bands = src.num_bands();
        let dest_nodata = self.policy.dest_nodata();
        Ok(PixelBuffer::from_fn(
            src.rect(),
            self.dest_bands(),
            self.table.dest_type,
            |x, y, b| {
                if !self.policy.allows(x, y) {
                    return dest_nodata;
                }
                let src_band = if src_bands == 1 { 0 } else { b };
                let v = src.sample(x, y, src_band).unwrap_or(0.0);
                if self.policy.is_nodata(v) {
                    return dest_nodata;
                }
                self.table.lookup(b, v)
            },
        ))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A table mapping value ranges to destination values.
#[derive(Debug, Clone, Default)]
pub struct RangeLookupTable {
    /// Ordered `(range, per-band values)` entries; first match wins.
    pub entries: Vec<(Range, Vec<f64>)>,
    /// Value used when no range matches; `None` marks a gap.
    pub default: Option<Vec<f64>>,
}

impl RangeLookupTable {
    /// Matches a value against the entries.
    pub fn lookup(&self, value: f64) -> Option<&Vec<f64>> {
        self.entries
            .iter()
            .find(|(range, _)| range.contains(value))
            .map(|(_, out)| out)
            .or(self.default.as_ref())
    }

    /// Returns `true` when unmatched values fall into a gap.
    pub fn has_gaps(&self) -> bool {
        self.default.is_none()
    }
}

/// Applies a [`RangeLookupTable`] per band. Gap values (no entry matched
/// and no default) become the destination no-data value.
pub struct RangeLookupOp {
    sources: Vec<Raster>,
    table: RangeLookupTable,
    dest_type: DataType,
    policy: PixelPolicy,
}

impl RangeLookupOp {
    /// Creates a range-lookup.
    pub fn new(
        source: Raster,
        table: RangeLookupTable,
        dest_type: DataType,
        policy: PixelPolicy,
    ) -> Self {
        Self {
            sources: vec![source],
            table,
            dest_type,
            policy,
        }
    }
}

impl ImageOp for RangeLookupOp {
    fn name(&self) -> &'static str {
        "RangeLookup"
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
        self.sources[0].color_model().clone()
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
                match self.table.lookup(v) {
                    Some(out) => out.get(b as usize).or(out.first()).copied().unwrap_or(0.0),
                    None => dest_nodata,
                }
            },
        ))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// One linear segment of a piecewise transform.
#[derive(Debug, Clone, PartialEq)]
pub struct PiecewiseSegment {
    /// Domain of the segment.
    pub range: Range,
    /// Slope applied within the segment.
    pub scale: f64,
    /// Offset applied within the segment.
    pub offset: f64,
}

/// A 1-D piecewise-linear transform.
#[derive(Debug, Clone, Default)]
pub struct PiecewiseTransform {
    /// Segments; first containing segment wins.
    pub segments: Vec<PiecewiseSegment>,
}

impl PiecewiseTransform {
    /// Evaluates the transform; `None` in domain gaps.
    pub fn apply(&self, value: f64) -> Option<f64> {
        self.segments
            .iter()
            .find(|s| s.range.contains(value))
            .map(|s| value * s.scale + s.offset)
    }
}

/// Applies a [`PiecewiseTransform`] to one band (or all bands).
pub struct PiecewiseOp {
    sources: Vec<Raster>,
    transform: PiecewiseTransform,
    band: Option<u32>,
    policy: PixelPolicy,
}

impl PiecewiseOp {
    /// Creates a piecewise op; `band = None` applies to every band.
    pub fn new(
        source: Raster,
        transform: PiecewiseTransform,
        band: Option<u32>,
        policy: PixelPolicy,
    ) -> Self {
        Self {
            sources: vec![source],
            transform,
            band,
            policy,
        }
    }
}

impl ImageOp for PiecewiseOp {
    fn name(&self) -> &'static str {
        "Piecewise"
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
                let v = src.sample(x, y, b).unwrap_or(0.0);
                if self.band.is_some_and(|target| target != b) {
                    return v;
                }
                if !self.policy.allows(x, y) || self.policy.is_nodata(v) {
                    return dest_nodata;
                }
                match self.transform.apply(v) {
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

/// A colormap transform: value ranges classified into palette slots.
#[derive(Debug, Clone)]
pub struct ColorMapTransform {
    /// Ordered `(range, palette index)` entries.
    pub classes: Vec<(Range, u32)>,
    /// Palette the indices refer to.
    pub palette: IndexedColorModel,
    /// Index for unmatched values; `None` marks a gap.
    pub default_index: Option<u32>,
}

/// Classifies a band into an indexed image through a
/// [`ColorMapTransform`].
pub struct ClassifyOp {
    sources: Vec<Raster>,
    domain: ColorMapTransform,
    band: u32,
    policy: PixelPolicy,
}

impl ClassifyOp {
    /// Creates a classify over the given source band.
    pub fn new(source: Raster, domain: ColorMapTransform, band: u32, policy: PixelPolicy) -> Self {
        Self {
            sources: vec![source],
            domain,
            band,
            policy,
        }
    }
}

impl ImageOp for ClassifyOp {
    fn name(&self) -> &'static str {
        "Classify"
    }

    fn sources(&self) -> &[Raster] {
        &self.sources
    }

    fn bounds(&self) -> Rect {
        self.sources[0].bounds()
    }

    fn sample_model(&self) -> SampleModel {
        SampleModel::new(self.domain.palette.data_type(), 1)
    }

    fn color_model(&self) -> ColorModel {
        ColorModel::Indexed(self.domain.palette.clone())
    }

    fn compute(&self) -> Result<PixelBuffer> {
        let src = self.sources[0].data()?;
        let dest_nodata = self.policy.dest_nodata();
        Ok(PixelBuffer::from_fn(
            src.rect(),
            1,
            self.domain.palette.data_type(),
            |x, y, _| {
                if !self.policy.allows(x, y) {
                    return dest_nodata;
                }
                let v = src.sample(x, y, self.band).unwrap_or(0.0);
                if self.policy.is_nodata(v) {
                    return dest_nodata;
                }
                self.domain
                    .classes
                    .iter()
                    .find(|(range, _)| range.contains(v))
                    .map(|(_, idx)| *idx)
                    .or(self.domain.default_index)
                    .map(|idx| idx as f64)
                    .unwrap_or(dest_nodata)
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
    use raster_core::{PaletteEntry, RenderHints, Transparency};

    fn indexed_source(indices: &[u8], width: u32, palette: IndexedColorModel) -> Raster {
        let height = indices.len() as u32 / width;
        let buf = PixelBuffer::from_fn(
            Rect::from_size(width, height),
            1,
            DataType::U8,
            |x, y, _| indices[(y as u32 * width + x as u32) as usize] as f64,
        );
        Raster::from_buffer(buf, ColorModel::Indexed(palette))
    }

    fn small_palette() -> IndexedColorModel {
        IndexedColorModel::new(
            8,
            vec![
                PaletteEntry::opaque(0, 0, 0),
                PaletteEntry::opaque(255, 0, 0),
                PaletteEntry::opaque(0, 255, 0),
                PaletteEntry::opaque(0, 0, 255),
            ],
            None,
            Transparency::Opaque,
        )
        .unwrap()
    }

    #[test]
    fn test_palette_expansion_via_lookup() {
        let palette = small_palette();
        let src = indexed_source(&[0, 1, 2, 3], 2, palette.clone());
        let tables = vec![
            palette.map.iter().map(|e| e.r as f64).collect(),
            palette.map.iter().map(|e| e.g as f64).collect(),
            palette.map.iter().map(|e| e.b as f64).collect(),
        ];
        let op = LookupOp::new(
            src,
            LookupTable::new(tables, DataType::U8),
            PixelPolicy::none(),
        );
        let node = Raster::from_op(Box::new(op), &RenderHints::new());
        assert_eq!(node.num_bands(), 3);
        let buf = node.data().unwrap();
        assert_eq!(buf.sample(1, 0, 0), Some(255.0)); // red entry
        assert_eq!(buf.sample(0, 1, 1), Some(255.0)); // green entry
        assert_eq!(buf.sample(1, 1, 2), Some(255.0)); // blue entry
    }

    #[test]
    fn test_range_lookup_gap_uses_dest_nodata() {
        let buf = PixelBuffer::from_fn(Rect::from_size(2, 1), 1, DataType::F64, |x, _, _| {
            (x * 100) as f64
        });
        let src = Raster::from_buffer_component(buf);
        let table = RangeLookupTable {
            entries: vec![(Range::closed(0.0, 50.0, DataType::F64), vec![1.0])],
            default: None,
        };
        let policy = PixelPolicy::new(None, None, Some(vec![255.0]));
        let op = RangeLookupOp::new(src, table, DataType::U8, policy);
        let out = Raster::from_op(Box::new(op), &RenderHints::new()).data().unwrap();
        assert_eq!(out.sample(0, 0, 0), Some(1.0));
        assert_eq!(out.sample(1, 0, 0), Some(255.0)); // 100 falls in the gap
    }

    #[test]
    fn test_piecewise_single_band() {
        let buf = PixelBuffer::from_fn(Rect::from_size(3, 1), 1, DataType::F64, |x, _, _| x as f64);
        let src = Raster::from_buffer_component(buf);
        let transform = PiecewiseTransform {
            segments: vec![PiecewiseSegment {
                range: Range::closed(0.0, 10.0, DataType::F64),
                scale: 2.0,
                offset: 1.0,
            }],
        };
        let op = PiecewiseOp::new(src, transform, None, PixelPolicy::none());
        let out = Raster::from_op(Box::new(op), &RenderHints::new()).data().unwrap();
        assert_eq!(out.sample(2, 0, 0), Some(5.0));
    }

    #[test]
    fn test_classify_to_palette() {
        let buf = PixelBuffer::from_fn(Rect::from_size(2, 1), 1, DataType::F64, |x, _, _| {
            x as f64 * 10.0
        });
        let src = Raster::from_buffer_component(buf);
        let domain = ColorMapTransform {
            classes: vec![
                (Range::new(0.0, true, 5.0, false, DataType::F64), 1),
                (Range::new(5.0, true, 50.0, true, DataType::F64), 2),
            ],
            palette: small_palette(),
            default_index: None,
        };
        let op = ClassifyOp::new(src, domain, 0, PixelPolicy::none());
        let node = Raster::from_op(Box::new(op), &RenderHints::new());
        assert!(node.color_model().is_indexed());
        let out = node.data().unwrap();
        assert_eq!(out.sample(0, 0, 0), Some(1.0));
        assert_eq!(out.sample(1, 0, 0), Some(2.0));
    }
}
