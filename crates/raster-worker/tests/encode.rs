//! Encoder glue: preconditioning rules and codec dispatch.

use raster_core::{DataType, PixelBuffer, Raster, Rect};
use raster_worker::{ImageWriteParam, Worker};

fn rgb_image(width: u32, height: u32) -> Raster {
    let buf = PixelBuffer::from_fn(
        Rect::from_size(width, height),
        3,
        DataType::U8,
        |x, y, b| ((x * 5 + y * 3 + b as i32 * 40) % 256) as f64,
    );
    Raster::from_buffer_component(buf)
}

fn rgba_image(width: u32, height: u32) -> Raster {
    let buf = PixelBuffer::from_fn(
        Rect::from_size(width, height),
        4,
        DataType::U8,
        |x, _, b| if b == 3 { 200.0 } else { (x * 9 % 256) as f64 },
    );
    Raster::from_buffer_component(buf)
}

#[test]
fn test_write_png() {
    let mut worker = Worker::from_raster(rgb_image(16, 16));
    let mut sink = Vec::new();
    worker
        .write_stream(&mut sink, "PNG", &ImageWriteParam::default())
        .unwrap();
    assert_eq!(&sink[..8], &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
}

#[test]
fn test_write_png_from_floats_rescales() {
    let buf = PixelBuffer::from_fn(Rect::from_size(8, 8), 1, DataType::F64, |x, y, _| {
        (x + y) as f64 * 1000.0
    });
    let mut worker = Worker::from_raster(Raster::from_buffer_component(buf));
    let mut sink = Vec::new();
    worker
        .write_stream(&mut sink, "PNG", &ImageWriteParam::default())
        .unwrap();
    assert!(worker.is_bytes());
    assert!(!sink.is_empty());
}

#[test]
fn test_write_jpeg_drops_alpha() {
    let mut worker = Worker::from_raster(rgba_image(16, 16));
    let mut sink = Vec::new();
    worker
        .write_stream(&mut sink, "JPEG", &ImageWriteParam::with_quality(0.9))
        .unwrap();
    // JPEG preconditioning strips the alpha band
    assert_eq!(worker.num_bands(), 3);
    assert_eq!(&sink[..3], &[0xFF, 0xD8, 0xFF]);
}

#[test]
fn test_write_gif_preconditions_to_palette() {
    let mut worker = Worker::from_raster(rgba_image(16, 16));
    let mut sink = Vec::new();
    worker
        .write_stream(&mut sink, "GIF", &ImageWriteParam::default())
        .unwrap();
    assert!(worker.is_indexed());
    assert_eq!(worker.transparent_pixel(), Some(255));
    assert_eq!(&sink[..6], b"GIF89a");
}

#[test]
fn test_write_tiff() {
    let mut worker = Worker::from_raster(rgb_image(8, 8));
    let mut sink = Vec::new();
    worker
        .write_stream(&mut sink, "TIFF", &ImageWriteParam::default())
        .unwrap();
    let le = sink.starts_with(&[0x49, 0x49, 0x2A, 0x00]);
    let be = sink.starts_with(&[0x4D, 0x4D, 0x00, 0x2A]);
    assert!(le || be);
}

#[test]
fn test_write_path_infers_codec() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.png");
    let mut worker = Worker::from_raster(rgb_image(8, 8));
    worker.write_path(&path).unwrap();
    let written = std::fs::read(&path).unwrap();
    assert_eq!(&written[..4], &[0x89, 0x50, 0x4E, 0x47]);
}

#[test]
fn test_write_unknown_format_fails() {
    let mut worker = Worker::from_raster(rgb_image(8, 8));
    let mut sink = Vec::new();
    let err = worker
        .write_stream(&mut sink, "BMP", &ImageWriteParam::default())
        .unwrap_err();
    assert!(err.is_write_error());
    assert!(sink.is_empty());
}
