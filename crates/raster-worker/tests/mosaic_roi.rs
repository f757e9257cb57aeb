//! Mosaic composition: ROI union, palette-aware backgrounds, threshold
//! synthesis.

use raster_core::{
    ColorModel, DataType, IndexedColorModel, PaletteEntry, PixelBuffer, Polygon, Range, Raster,
    Rect, Roi, Transparency, property::names,
};
use raster_worker::{MosaicMode, Worker};

fn rgb_flat(value: f64, rect: Rect) -> Raster {
    let buf = PixelBuffer::from_fn(rect, 3, DataType::U8, |_, _, _| value);
    Raster::from_buffer_component(buf)
}

fn gray_palette_bitmask() -> IndexedColorModel {
    let map: Vec<PaletteEntry> = (0..256)
        .map(|i| PaletteEntry::opaque(i as u8, i as u8, i as u8))
        .collect();
    IndexedColorModel::new(8, map, Some(0), Transparency::Bitmask).unwrap()
}

fn indexed_flat(index: u8, rect: Rect, palette: IndexedColorModel) -> Raster {
    let buf = PixelBuffer::from_fn(rect, 1, DataType::U8, |_, _, _| index as f64);
    Raster::from_buffer(buf, ColorModel::Indexed(palette))
}

#[test]
fn test_mosaic_vector_roi_union() {
    let rect = Rect::from_size(128, 128);
    let a = rgb_flat(50.0, rect);
    let b = rgb_flat(90.0, rect);
    // one geometry, one shape, on opposite diagonal quadrants
    let roi_a = Roi::geometry(Polygon::from_rect(&Rect::from_size(64, 64)));
    let roi_b = Roi::from_rect(Rect::new(64, 64, 64, 64));

    let mut worker = Worker::new();
    worker
        .mosaic(
            &[a, b],
            MosaicMode::Overlay,
            None,
            Some(&[roi_a, roi_b]),
            None,
            None,
        )
        .unwrap();

    let roi = worker.roi().expect("mosaic should install the ROI union");
    assert!(roi.contains(20, 20));
    assert!(roi.contains(120, 120));
    assert!(!roi.contains(20, 120));
    assert!(!roi.contains(120, 20));
    // two vector inputs stay vector
    assert!(roi.is_vector());

    // the node property mirrors the worker attribute
    let prop = worker.raster().unwrap().property(names::ROI).unwrap();
    assert_eq!(prop.as_roi(), worker.roi());
}

#[test]
fn test_mosaic_mixed_roi_rasterizes() {
    let rect = Rect::from_size(64, 64);
    let a = rgb_flat(50.0, rect);
    let b = rgb_flat(90.0, rect);
    let roi_a = Roi::from_rect(Rect::from_size(32, 32));
    let roi_b = Roi::Raster(raster_core::MaskImage::full(Rect::new(32, 32, 32, 32)));

    let mut worker = Worker::new();
    worker
        .mosaic(
            &[a, b],
            MosaicMode::Overlay,
            None,
            Some(&[roi_a, roi_b]),
            None,
            None,
        )
        .unwrap();

    let roi = worker.roi().unwrap();
    assert!(!roi.is_vector());
    assert!(roi.contains(10, 10));
    assert!(roi.contains(40, 40));
    assert!(!roi.contains(40, 10));
}

#[test]
fn test_mosaic_background_in_palette_stays_indexed() {
    let rect = Rect::from_size(32, 32);
    let palette = gray_palette_bitmask();
    let a = indexed_flat(100, rect, palette.clone());
    let b = indexed_flat(200, Rect::new(16, 0, 32, 32), palette);

    let mut worker = Worker::new();
    // (10, 10, 10) is exactly palette slot 10
    worker.set_background(Some(vec![10.0, 10.0, 10.0]));
    worker
        .mosaic(&[a, b], MosaicMode::Overlay, None, None, None, None)
        .unwrap();

    assert!(worker.raster().unwrap().color_model().is_indexed());
    // with a background there is no ROI to carry
    assert!(worker.roi().is_none());
    // uncovered pixels receive the palette index of the background
    let data = worker.raster().unwrap().data().unwrap();
    assert_eq!(data.sample(0, 0, 0), Some(100.0));
    assert_eq!(data.sample(40, 31, 0), Some(200.0));
}

#[test]
fn test_mosaic_background_not_in_palette_expands() {
    let rect = Rect::from_size(32, 32);
    let palette = gray_palette_bitmask();
    let a = indexed_flat(100, rect, palette.clone());
    let b = indexed_flat(200, rect, palette);

    let mut worker = Worker::new();
    // not a gray value, so no exact palette entry exists
    worker.set_background(Some(vec![254.0, 3.0, 9.0]));
    worker
        .mosaic(&[a, b], MosaicMode::Overlay, None, None, None, None)
        .unwrap();

    assert!(worker.raster().unwrap().color_model().is_component());
}

#[test]
fn test_mosaic_thresholds_synthesize_nodata() {
    let rect = Rect::from_size(4, 4);
    let low = rgb_flat(5.0, rect);
    let high = rgb_flat(50.0, rect);

    let mut worker = Worker::new();
    worker
        .mosaic(
            &[low, high],
            MosaicMode::Overlay,
            None,
            None,
            Some(vec![vec![10.0, 10.0, 10.0]]),
            None,
        )
        .unwrap();

    // values below the threshold fall through to the second source
    let data = worker.raster().unwrap().data().unwrap();
    assert_eq!(data.sample(0, 0, 0), Some(50.0));
}

#[test]
fn test_mosaic_uses_embedded_source_nodata() {
    let rect = Rect::from_size(4, 4);
    let a = rgb_flat(7.0, rect);
    a.set_property(
        names::GC_NODATA,
        raster_core::NodeProperty::NoData(Range::point(7.0, DataType::U8)),
    );
    let b = rgb_flat(80.0, rect);

    let mut worker = Worker::new();
    worker
        .mosaic(&[a, b], MosaicMode::Overlay, None, None, None, None)
        .unwrap();
    let data = worker.raster().unwrap().data().unwrap();
    assert_eq!(data.sample(0, 0, 0), Some(80.0));
}

#[test]
fn test_mosaic_with_alpha_weights() {
    let rect = Rect::from_size(2, 2);
    let a = rgb_flat(10.0, rect);
    let b = rgb_flat(200.0, rect);
    let zero_alpha = {
        let buf = PixelBuffer::from_fn(rect, 1, DataType::U8, |_, _, _| 0.0);
        Raster::from_buffer_component(buf)
    };

    let mut worker = Worker::new();
    worker
        .mosaic(
            &[a, b],
            MosaicMode::Overlay,
            Some(&[zero_alpha]),
            None,
            None,
            None,
        )
        .unwrap();

    // the first source is fully masked out by its alpha
    let data = worker.raster().unwrap().data().unwrap();
    assert_eq!(data.sample(0, 0, 0), Some(200.0));
}
