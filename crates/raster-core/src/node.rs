//! Raster nodes: materialized buffers and lazy operation nodes.
//!
//! A [`Raster`] is a cheaply clonable handle (`Arc`) to either a
//! materialized [`PixelBuffer`] or a lazy operation node. Operation nodes
//! form a DAG through their source lists; rendering walks the graph on
//! demand and memoizes the result unless tile caching was disabled when the
//! node was emitted.
//!
//! Node identity is `Arc` pointer identity ([`Raster::same_node`]); the
//! worker's fold optimizations and the statistics cache both rely on it.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::buffer::PixelBuffer;
use crate::color::{ColorModel, ComponentColorModel, ColorSpaceKind};
use crate::datatype::DataType;
use crate::error::Result;
use crate::hints::RenderHints;
use crate::property::NodeProperty;
use crate::rect::Rect;
use crate::sample::SampleModel;

/// A lazy raster operation.
///
/// Implementations live in the ops crate; the trait is defined here so a
/// node can own one. `as_any` supports the fold passes, which must inspect
/// the concrete op behind the current node.
pub trait ImageOp: Send + Sync {
    /// Registered operation name (e.g. `"Affine"`, `"Mosaic"`).
    fn name(&self) -> &'static str;

    /// Source rasters, in order.
    fn sources(&self) -> &[Raster];

    /// Bounds of the produced raster.
    fn bounds(&self) -> Rect;

    /// Sample model of the produced raster.
    fn sample_model(&self) -> SampleModel;

    /// Color model of the produced raster.
    fn color_model(&self) -> ColorModel;

    /// Renders the full output.
    fn compute(&self) -> Result<PixelBuffer>;

    /// Downcast support for fold inspection.
    fn as_any(&self) -> &dyn Any;

    /// Properties the op publishes on its node (e.g. the mapped `"roi"`).
    fn output_properties(&self) -> Vec<(String, NodeProperty)> {
        Vec::new()
    }
}

enum NodeKind {
    Buffer(PixelBuffer),
    Op {
        op: Box<dyn ImageOp>,
        rendered: RwLock<Option<PixelBuffer>>,
        cache_tiles: bool,
    },
}

struct RasterInner {
    bounds: Rect,
    sample_model: SampleModel,
    color_model: ColorModel,
    tile_width: u32,
    tile_height: u32,
    kind: NodeKind,
    properties: RwLock<HashMap<String, NodeProperty>>,
}

/// A raster: a materialized grid or a lazy operation node.
#[derive(Clone)]
pub struct Raster {
    inner: Arc<RasterInner>,
}

impl Raster {
    /// Wraps a materialized buffer with a color model.
    pub fn from_buffer(buffer: PixelBuffer, color_model: ColorModel) -> Self {
        let bounds = buffer.rect();
        let sample_model = SampleModel::new(buffer.data_type(), buffer.num_bands());
        Self {
            inner: Arc::new(RasterInner {
                bounds,
                sample_model,
                color_model,
                tile_width: bounds.width,
                tile_height: bounds.height,
                kind: NodeKind::Buffer(buffer),
                properties: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Wraps a buffer with a plain component model matching its layout.
    pub fn from_buffer_component(buffer: PixelBuffer) -> Self {
        let space = match buffer.num_bands() {
            1 | 2 => ColorSpaceKind::Gray,
            3 | 4 => ColorSpaceKind::Srgb,
            n => ColorSpaceKind::Bogus(n as u8),
        };
        let has_alpha = matches!(buffer.num_bands(), 2 | 4);
        let cm = ColorModel::Component(ComponentColorModel::new(
            space,
            buffer.data_type(),
            has_alpha,
        ));
        Self::from_buffer(buffer, cm)
    }

    /// Emits an operation node, applying the layout policies carried by the
    /// hints (tile geometry overrides, tile-cache disable).
    pub fn from_op(op: Box<dyn ImageOp>, hints: &RenderHints) -> Self {
        let bounds = op.bounds();
        let sample_model = op.sample_model();
        let color_model = op.color_model();
        let (mut tile_width, mut tile_height) = (bounds.width.min(512).max(1), bounds.height.min(512).max(1));
        if let Some(layout) = hints.layout() {
            if let Some(tw) = layout.tile_width {
                tile_width = tw;
            }
            if let Some(th) = layout.tile_height {
                tile_height = th;
            }
        }
        if !hints.bool_hint(crate::hints::HintKey::TilingAllowed, true) {
            tile_width = bounds.width.max(1);
            tile_height = bounds.height.max(1);
        }
        let cache_tiles = hints.tile_cache_enabled();
        let output_properties = op.output_properties();
        let raster = Self {
            inner: Arc::new(RasterInner {
                bounds,
                sample_model,
                color_model,
                tile_width,
                tile_height,
                kind: NodeKind::Op {
                    op,
                    rendered: RwLock::new(None),
                    cache_tiles,
                },
                properties: RwLock::new(HashMap::new()),
            }),
        };
        for (name, prop) in output_properties {
            raster.set_property(&name, prop);
        }
        raster
    }

    /// Bounds of the raster.
    #[inline]
    pub fn bounds(&self) -> Rect {
        self.inner.bounds
    }

    /// Minimum X coordinate.
    #[inline]
    pub fn min_x(&self) -> i32 {
        self.inner.bounds.x
    }

    /// Minimum Y coordinate.
    #[inline]
    pub fn min_y(&self) -> i32 {
        self.inner.bounds.y
    }

    /// Width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.inner.bounds.width
    }

    /// Height in pixels.
    #[inline]
    pub fn height(&self) -> u32 {
        self.inner.bounds.height
    }

    /// Sample model of the raster.
    #[inline]
    pub fn sample_model(&self) -> SampleModel {
        self.inner.sample_model
    }

    /// Color model of the raster.
    #[inline]
    pub fn color_model(&self) -> &ColorModel {
        &self.inner.color_model
    }

    /// Number of bands.
    #[inline]
    pub fn num_bands(&self) -> u32 {
        self.inner.sample_model.num_bands
    }

    /// Sample data type.
    #[inline]
    pub fn data_type(&self) -> DataType {
        self.inner.sample_model.data_type
    }

    /// Tile width of the node's layout.
    #[inline]
    pub fn tile_width(&self) -> u32 {
        self.inner.tile_width
    }

    /// Tile height of the node's layout.
    #[inline]
    pub fn tile_height(&self) -> u32 {
        self.inner.tile_height
    }

    /// The operation behind this node, if it is an op node.
    pub fn op(&self) -> Option<&dyn ImageOp> {
        match &self.inner.kind {
            NodeKind::Op { op, .. } => Some(op.as_ref()),
            NodeKind::Buffer(_) => None,
        }
    }

    /// Name of the operation behind this node, or `None` for buffers.
    pub fn op_name(&self) -> Option<&'static str> {
        self.op().map(ImageOp::name)
    }

    /// First source of the op node, used by property inheritance walks.
    pub fn first_source(&self) -> Option<Raster> {
        self.op().and_then(|op| op.sources().first().cloned())
    }

    /// Returns `true` when both handles reference the same node.
    #[inline]
    pub fn same_node(&self, other: &Raster) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether this node memoizes its rendered output.
    pub fn caches_tiles(&self) -> bool {
        match &self.inner.kind {
            NodeKind::Op { cache_tiles, .. } => *cache_tiles,
            NodeKind::Buffer(_) => true,
        }
    }

    /// Renders the raster to a materialized buffer.
    ///
    /// Buffer nodes return a shared handle; op nodes compute on first use
    /// and memoize unless caching was disabled at emission.
    pub fn data(&self) -> Result<PixelBuffer> {
        match &self.inner.kind {
            NodeKind::Buffer(buf) => Ok(buf.clone()),
            NodeKind::Op {
                op,
                rendered,
                cache_tiles,
            } => {
                if *cache_tiles {
                    if let Some(buf) = rendered.read().expect("render lock").as_ref() {
                        return Ok(buf.clone());
                    }
                    let buf = op.compute()?;
                    *rendered.write().expect("render lock") = Some(buf.clone());
                    Ok(buf)
                } else {
                    op.compute()
                }
            }
        }
    }

    /// Sample accessor; materializes op nodes on first use.
    pub fn sample(&self, x: i32, y: i32, band: u32) -> Result<f64> {
        Ok(self.data()?.sample(x, y, band).unwrap_or(0.0))
    }

    /// Sets (or replaces) a node property.
    pub fn set_property(&self, name: &str, value: NodeProperty) {
        self.inner
            .properties
            .write()
            .expect("property lock")
            .insert(name.to_string(), value);
    }

    /// Removes a node property; returns `true` if it was present.
    pub fn remove_property(&self, name: &str) -> bool {
        self.inner
            .properties
            .write()
            .expect("property lock")
            .remove(name)
            .is_some()
    }

    /// Looks up a property stored on this node (no inheritance).
    pub fn property(&self, name: &str) -> Option<NodeProperty> {
        self.inner
            .properties
            .read()
            .expect("property lock")
            .get(name)
            .cloned()
    }
}

impl std::fmt::Debug for Raster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Raster")
            .field("bounds", &self.inner.bounds)
            .field("sample_model", &self.inner.sample_model)
            .field("op", &self.op_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PixelBuffer;

    struct DoubleOp {
        sources: Vec<Raster>,
        computed: std::sync::atomic::AtomicU32,
    }

    impl ImageOp for DoubleOp {
        fn name(&self) -> &'static str {
            "Double"
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
            self.computed
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let src = self.sources[0].data()?;
            Ok(PixelBuffer::from_fn(
                src.rect(),
                src.num_bands(),
                src.data_type(),
                |x, y, b| src.sample(x, y, b).unwrap_or(0.0) * 2.0,
            ))
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn source() -> Raster {
        let buf = PixelBuffer::from_fn(Rect::from_size(4, 4), 1, DataType::U8, |x, _, _| x as f64);
        Raster::from_buffer_component(buf)
    }

    #[test]
    fn test_lazy_memoized_render() {
        let src = source();
        let op = DoubleOp {
            sources: vec![src],
            computed: Default::default(),
        };
        let node = Raster::from_op(Box::new(op), &RenderHints::new());
        assert_eq!(node.sample(3, 0, 0).unwrap(), 6.0);
        assert_eq!(node.sample(2, 1, 0).unwrap(), 4.0);
        let op = node.op().unwrap().as_any().downcast_ref::<DoubleOp>().unwrap();
        assert_eq!(op.computed.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cache_disabled_recomputes() {
        use crate::hints::{HintKey, HintValue};
        let mut hints = RenderHints::new();
        hints.set(HintKey::TileCache, HintValue::Cache(None));
        let op = DoubleOp {
            sources: vec![source()],
            computed: Default::default(),
        };
        let node = Raster::from_op(Box::new(op), &hints);
        assert!(!node.caches_tiles());
        node.data().unwrap();
        node.data().unwrap();
        let op = node.op().unwrap().as_any().downcast_ref::<DoubleOp>().unwrap();
        assert_eq!(op.computed.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[test]
    fn test_tiling_disallowed_forces_single_tile() {
        use crate::hints::{HintKey, HintValue};
        let mut hints = RenderHints::new();
        hints.set(HintKey::TilingAllowed, HintValue::Bool(false));
        let op = DoubleOp {
            sources: vec![source()],
            computed: Default::default(),
        };
        let node = Raster::from_op(Box::new(op), &hints);
        assert_eq!(node.tile_width(), node.width());
        assert_eq!(node.tile_height(), node.height());
    }

    #[test]
    fn test_node_identity_and_properties() {
        let a = source();
        let b = a.clone();
        assert!(a.same_node(&b));
        a.set_property("GC_NODATA", NodeProperty::Mean(vec![1.0]));
        assert!(b.property("GC_NODATA").is_some());
        assert!(b.remove_property("GC_NODATA"));
        assert!(a.property("GC_NODATA").is_none());
    }
}
