//! Worker state machine: attribute propagation, statistics cache,
//! tile-cache counter.

use approx::assert_relative_eq;
use raster_core::{DataType, PixelBuffer, Range, Rect};
use raster_core::{NodeProperty, Raster, property::names};
use raster_worker::Worker;

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
fn test_roi_property_follows_worker() {
    let mut worker = Worker::from_raster(gradient(8, 8));
    let roi = raster_core::Roi::from_rect(Rect::from_size(4, 4));
    worker.set_roi(Some(roi.clone()));

    // the op output carries the worker's post-op ROI as the "ROI" property
    worker.multiply_const(vec![2.0]).unwrap();
    let prop = worker.raster().unwrap().property(names::ROI).unwrap();
    assert_eq!(prop.as_roi(), worker.roi());

    worker.set_roi(None);
    assert!(worker.raster().unwrap().property(names::ROI).is_none());
}

#[test]
fn test_nodata_property_follows_worker() {
    let mut worker = Worker::from_raster(gradient(8, 8));
    let nodata = Range::point(-9999.0, DataType::F64);
    worker.set_nodata(Some(nodata.clone()));
    worker.add_const(vec![1.0]).unwrap();

    // algebra with active no-data rewrites the marker to [bg, bg]
    let current = worker.nodata().unwrap().clone();
    assert!(current.is_point());
    let prop = worker.raster().unwrap().property(names::GC_NODATA).unwrap();
    assert_eq!(prop.as_nodata(), Some(&current));

    // clearing removes the property entirely
    worker.set_nodata(None);
    assert!(worker.raster().unwrap().property(names::GC_NODATA).is_none());
}

#[test]
fn test_set_image_adopts_embedded_nodata() {
    let raster = gradient(4, 4);
    raster.set_property(
        names::GC_NODATA,
        NodeProperty::NoData(Range::point(7.0, DataType::F64)),
    );
    let worker = Worker::from_raster(raster);
    assert_eq!(worker.nodata().unwrap().min, 7.0);
}

#[test]
fn test_statistics_cache_and_invalidation() {
    let mut worker = Worker::from_raster(gradient(4, 4));
    assert_eq!(worker.get_minimums().unwrap(), vec![0.0]);
    assert_eq!(worker.get_maximums().unwrap(), vec![15.0]);
    // computing stats emits a scan node above the image
    assert_eq!(worker.raster().unwrap().op_name(), Some("Stats"));

    // a cached value is reused
    assert_eq!(worker.get_maximums().unwrap(), vec![15.0]);

    // a mutating op voids the cache; the next call rescans
    worker.multiply_const(vec![2.0]).unwrap();
    assert_eq!(worker.get_maximums().unwrap(), vec![30.0]);
    assert_eq!(worker.get_minimums().unwrap(), vec![0.0]);
}

#[test]
fn test_statistics_honor_roi_and_nodata() {
    let mut worker = Worker::from_raster(gradient(4, 4));
    worker.set_roi(Some(raster_core::Roi::from_rect(Rect::from_size(4, 2))));
    worker.set_nodata(Some(Range::point(0.0, DataType::F64)));
    assert_eq!(worker.get_minimums().unwrap(), vec![1.0]);
    assert_eq!(worker.get_maximums().unwrap(), vec![7.0]);

    let mean = worker.get_mean().unwrap();
    assert_relative_eq!(mean[0], 4.0);
}

#[test]
fn test_histogram() {
    let mut worker = Worker::from_raster(gradient(4, 4));
    let histogram = worker.get_histogram(&[4], &[0.0], &[16.0]).unwrap();
    assert_eq!(histogram.bins[0], vec![4, 4, 4, 4]);
    assert_eq!(histogram.total(0), 16);
}

#[test]
fn test_tile_cache_counter_balance() {
    let mut worker = Worker::from_raster(gradient(4, 4));
    assert!(worker.hints().is_empty());
    worker.tile_cache_enabled(false).unwrap();
    worker.tile_cache_enabled(true).unwrap();
    // balanced toggling leaves the hints untouched
    assert!(worker.hints().is_empty());
    let node = worker.null_op().unwrap().raster().unwrap().clone();
    assert!(node.caches_tiles());
}

#[test]
fn test_tile_cache_underflow_is_error() {
    let mut worker = Worker::from_raster(gradient(4, 4));
    let err = worker.tile_cache_enabled(true).unwrap_err();
    assert!(err.is_state_error());
}

#[test]
fn test_tile_cache_disable_marks_nodes() {
    let mut worker = Worker::from_raster(gradient(4, 4));
    worker.tile_cache_enabled(false).unwrap();
    worker.multiply_const(vec![1.5]).unwrap();
    assert!(!worker.raster().unwrap().caches_tiles());
    worker.tile_cache_enabled(true).unwrap();
    worker.multiply_const(vec![1.5]).unwrap();
    assert!(worker.raster().unwrap().caches_tiles());
}

#[test]
fn test_format_converts_nodata() {
    let mut worker = Worker::from_raster(gradient(4, 4));
    worker.set_nodata(Some(Range::closed(-1000.0, 1000.0, DataType::F64)));
    worker.format(DataType::U8).unwrap();
    let nodata = worker.nodata().unwrap();
    assert_eq!(nodata.data_type, DataType::U8);
    assert_eq!(nodata.min, 0.0);
    assert_eq!(nodata.max, 255.0);
}

#[test]
fn test_operations_require_image() {
    let mut worker = Worker::new();
    assert!(worker.multiply_const(vec![2.0]).is_err());
    assert!(worker.rescale_to_bytes().is_err());
    assert!(worker.crop(0, 0, 1, 1).is_err());
}

#[test]
fn test_artifacts_filter_is_not_implemented() {
    let mut worker = Worker::from_raster(gradient(4, 4));
    let err = worker.artifacts_filter(10, 3).unwrap_err();
    assert!(matches!(err, raster_core::Error::NotImplemented(_)));
}

#[test]
fn test_dispose_clears_state() {
    let mut worker = Worker::from_raster(gradient(4, 4));
    worker.set_background(Some(vec![1.0]));
    worker.dispose();
    assert!(worker.raster().is_none());
    assert!(worker.background().is_none());
    assert!(worker.hints().is_empty());
}

#[test]
fn test_image_as_roi() {
    let mut worker = Worker::from_raster(gradient(4, 4));
    worker.binarize_threshold(8.0).unwrap();
    let roi = worker.image_as_roi().unwrap();
    assert!(!roi.contains(0, 0));
    assert!(roi.contains(3, 3));
}

#[test]
fn test_algebra_shape_mismatch_surfaces() {
    let mut worker = Worker::from_raster(gradient(4, 4));
    let other = gradient(5, 5);
    let err = worker.add_image(&other).unwrap_err();
    assert!(matches!(err, raster_core::Error::ShapeMismatch { .. }));
}
