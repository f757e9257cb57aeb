//! Geometric fold optimizations: identity elimination, affine merging,
//! crop composition, warp-affine reduction.

use std::sync::Arc;

use raster_core::{AffineTransform, DataType, ImageOp, PixelBuffer, Raster, Rect, Result, Roi};
use raster_ops::{AffineOp, CropOp, ScaleOp, WarpOp};
use raster_worker::{Interpolation, Worker, WarpBuilder};

fn gradient(width: u32, height: u32) -> Raster {
    let buf = PixelBuffer::from_fn(
        Rect::from_size(width, height),
        1,
        DataType::F64,
        |x, y, _| (y * width as i32 + x) as f64,
    );
    Raster::from_buffer_component(buf)
}

#[test]
fn test_affine_identity_elimination() {
    let source = gradient(64, 64);
    let mut worker = Worker::from_raster(source.clone());
    let before = worker.raster().unwrap().clone();

    worker
        .affine(AffineTransform::identity(), Interpolation::Nearest, None)
        .unwrap();
    // the very same image reference survives
    assert!(worker.raster().unwrap().same_node(&before));

    // sub-epsilon wiggles are identities too
    let wiggle = AffineTransform::new(1.0 + 1e-6, 0.0, 0.0, 1.0 - 1e-6, 1e-3, -1e-3);
    worker.affine(wiggle, Interpolation::Nearest, None).unwrap();
    assert!(worker.raster().unwrap().same_node(&before));
}

#[test]
fn test_affine_affine_fold() {
    let source = gradient(32, 32);
    let mut worker = Worker::from_raster(source.clone());

    // shears force the generic Affine path on both calls
    let a = AffineTransform::new(1.0, 0.4, 0.3, 1.0, 10.0, 0.0);
    let b = AffineTransform::new(1.0, -0.2, 0.1, 1.0, 0.0, 5.0);
    worker.affine(a, Interpolation::Bilinear, Some(vec![0.0])).unwrap();
    worker.affine(b, Interpolation::Bilinear, None).unwrap();

    let node = worker.raster().unwrap();
    let op = node.op().unwrap().as_any().downcast_ref::<AffineOp>().unwrap();
    // one node, fed by the pre-affine source, carrying B o A
    assert!(op.sources()[0].same_node(&source));
    let expected = b.concatenate(&a);
    let got = op.transform();
    assert!((got.m00 - expected.m00).abs() < 1e-12);
    assert!((got.m01 - expected.m01).abs() < 1e-12);
    assert!((got.m02 - expected.m02).abs() < 1e-12);
    assert!((got.m10 - expected.m10).abs() < 1e-12);
}

#[test]
fn test_affine_fold_requires_same_interpolation() {
    let source = gradient(32, 32);
    let mut worker = Worker::from_raster(source.clone());
    let a = AffineTransform::new(1.0, 0.4, 0.3, 1.0, 10.0, 0.0);
    worker.affine(a, Interpolation::Bilinear, Some(vec![0.0])).unwrap();
    let first = worker.raster().unwrap().clone();

    let b = AffineTransform::new(1.0, -0.2, 0.1, 1.0, 0.0, 5.0);
    worker.affine(b, Interpolation::Nearest, Some(vec![0.0])).unwrap();
    let node = worker.raster().unwrap();
    let op = node.op().unwrap().as_any().downcast_ref::<AffineOp>().unwrap();
    // incompatible params chain instead of folding
    assert!(op.sources()[0].same_node(&first));
}

#[test]
fn test_affine_scale_fold() {
    let source = gradient(32, 32);
    let mut worker = Worker::from_raster(source.clone());
    worker.scale(2.0, 2.0, 0.0, 0.0, Interpolation::Nearest).unwrap();
    worker
        .affine(
            AffineTransform::scale(0.5, 0.5),
            Interpolation::Nearest,
            None,
        )
        .unwrap();
    // scale then half-scale collapses back onto the source
    assert!(worker.raster().unwrap().same_node(&source));
}

#[test]
fn test_affine_emits_scale_for_shearless_transform() {
    let mut worker = Worker::from_raster(gradient(16, 16));
    let tx = AffineTransform::scale(2.0, 3.0);
    worker.affine(tx, Interpolation::Nearest, None).unwrap();
    let node = worker.raster().unwrap();
    assert_eq!(node.op_name(), Some("Scale"));
    assert!(node.op().unwrap().as_any().downcast_ref::<ScaleOp>().is_some());
    assert_eq!(node.bounds(), Rect::from_size(32, 48));
}

#[test]
fn test_affine_integer_translate_uses_scale_path() {
    let mut worker = Worker::from_raster(gradient(16, 16));
    let tx = AffineTransform::translation(5.0, -3.0);
    worker.affine(tx, Interpolation::Nearest, None).unwrap();
    let node = worker.raster().unwrap();
    assert_eq!(node.op_name(), Some("Scale"));
    assert_eq!(node.bounds(), Rect::new(5, -3, 16, 16));
}

#[test]
fn test_crop_crop_fold() {
    let source = gradient(64, 64);
    let mut worker = Worker::from_raster(source.clone());
    worker.crop(0, 0, 50, 50).unwrap();
    worker.crop(25, 25, 50, 50).unwrap();

    let node = worker.raster().unwrap();
    let op = node.op().unwrap().as_any().downcast_ref::<CropOp>().unwrap();
    // a single crop over the original source, on the intersection
    assert!(op.sources()[0].same_node(&source));
    assert_eq!(node.bounds(), Rect::new(25, 25, 25, 25));
}

#[test]
fn test_crop_full_bounds_is_noop() {
    let mut worker = Worker::from_raster(gradient(64, 64));
    let before = worker.raster().unwrap().clone();
    worker.crop(0, 0, 64, 64).unwrap();
    assert!(worker.raster().unwrap().same_node(&before));
}

#[test]
fn test_roi_propagates_through_scale() {
    let mut worker = Worker::from_raster(gradient(16, 16));
    worker.set_roi(Some(Roi::from_rect(Rect::from_size(8, 8))));
    worker.scale(2.0, 2.0, 0.0, 0.0, Interpolation::Nearest).unwrap();
    let roi = worker.roi().unwrap();
    assert!(roi.contains(15, 15));
    assert!(!roi.contains(17, 17));
    // and the node property tracks the worker
    let prop = worker
        .raster()
        .unwrap()
        .property(raster_core::property::names::ROI)
        .unwrap();
    assert_eq!(prop.as_roi(), worker.roi());
}

/// A mildly non-linear mapping with no analytic inverse, to force a grid
/// warp.
struct Bow;

impl raster_ops::MathTransform2D for Bow {
    fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (x + 0.002 * y * y, y)
    }
    fn inverse(&self) -> Result<Arc<dyn raster_ops::MathTransform2D>> {
        Err(raster_core::Error::invalid_state("no analytic inverse"))
    }
}

#[test]
fn test_warp_affine_reduction() {
    let source = gradient(64, 64);
    let warp = WarpBuilder::new(0.333)
        .build(Arc::new(Bow), Rect::from_size(64, 64))
        .unwrap();
    assert!(matches!(warp, raster_worker::Warp::Grid(_)));

    let mut worker = Worker::from_raster(source.clone());
    worker.warp(warp, Interpolation::Nearest).unwrap();
    let warp_node = worker.raster().unwrap().clone();
    assert_eq!(warp_node.op_name(), Some("Warp"));

    // the bounds an unreduced affine would have produced
    let tx = AffineTransform::scale(0.4, 0.5).concatenate(&AffineTransform::identity());
    let tx = AffineTransform::translation(-200.0, -200.0).concatenate(&tx);
    let expected_bounds = tx.map_rect(&warp_node.bounds());

    worker.affine(tx, Interpolation::Nearest, Some(vec![0.0])).unwrap();

    let node = worker.raster().unwrap();
    // the pair was squashed into a single warp over the original source
    assert_eq!(node.op_name(), Some("Warp"));
    let op = node.op().unwrap().as_any().downcast_ref::<WarpOp>().unwrap();
    assert_eq!(op.sources().len(), 1);
    assert!(op.sources()[0].same_node(&source));
    assert_eq!(node.bounds(), expected_bounds);
}

#[test]
fn test_warp_reduction_disabled_chains() {
    let config = raster_core::CoreConfig::default().with_warp_reduction(false);
    let source = gradient(64, 64);
    let warp = WarpBuilder::new(0.333)
        .build(Arc::new(Bow), Rect::from_size(64, 64))
        .unwrap();

    let mut worker = Worker::with_config(config);
    worker.set_image(source);
    worker.warp(warp, Interpolation::Nearest).unwrap();
    let warp_node = worker.raster().unwrap().clone();

    let tx = AffineTransform::new(0.4, 0.0, 0.0, 0.5, -200.0, -200.0);
    worker.affine(tx, Interpolation::Nearest, Some(vec![0.0])).unwrap();

    // no reduction: the scale sits on top of the warp
    let node = worker.raster().unwrap();
    assert_eq!(node.op_name(), Some("Scale"));
    assert!(node.op().unwrap().sources()[0].same_node(&warp_node));
}

#[test]
fn test_translate_integer_keeps_samples() {
    let source = gradient(8, 8);
    let source_buf = source.data().unwrap();
    let mut worker = Worker::from_raster(source);
    worker.translate(10.0, 20.0, Interpolation::Nearest).unwrap();
    let node = worker.raster().unwrap();
    assert_eq!(node.bounds(), Rect::new(10, 20, 8, 8));
    assert!(node.data().unwrap().data_ptr_eq(&source_buf));
}

#[test]
fn test_border_pads() {
    let mut worker = Worker::from_raster(gradient(4, 4));
    worker.set_background(Some(vec![9.0]));
    worker.border(2, 2, 1, 1).unwrap();
    let node = worker.raster().unwrap();
    assert_eq!(node.bounds(), Rect::new(-2, -1, 8, 6));
    assert_eq!(node.data().unwrap().sample(-2, -1, 0), Some(9.0));
}
