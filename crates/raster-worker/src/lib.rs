//! # raster-worker
//!
//! The fluent raster pipeline builder.
//!
//! A [`Worker`] accumulates a sequence of raster operations over a single
//! in-flight image: color-model conversions, band manipulations, lookup
//! tables, algebraic operations, affine/warp resampling, mosaicking,
//! statistics and encoded output. Two cross-cutting attributes travel with
//! every operation: a region-of-interest mask restricting where operations
//! apply, and a no-data range marking values excluded from computation and
//! replaced by the configured background on output.
//!
//! The operation graph is lazy; each fluent call swaps the worker's image
//! reference for a new node. Back-to-back geometric operations fold
//! (affine over affine, warp over affine, crop over crop) so the emitted
//! graph stays shallow.
//!
//! # Example
//!
//! ```ignore
//! use raster_worker::Worker;
//! use raster_core::Range;
//!
//! let mut worker = Worker::from_raster(elevation);
//! worker.set_nodata(Some(Range::point(-9999.0, raster_core::DataType::F64)));
//! worker.set_background(Some(vec![0.0]));
//! worker
//!     .rescale_to_bytes()?
//!     .force_index_color_model_for_gif(true)?
//!     .write_path("relief.gif".as_ref())?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod algebra;
mod bands;
mod color;
mod encode;
mod geometry;
mod mosaic;
mod worker;

pub use worker::Worker;

// The collaborator types that appear in the worker's signatures.
pub use raster_codec::{ImageCodec, ImageWriteParam, WriteMode};
pub use raster_ops::{
    ColorMapTransform, Interpolation, LookupTable, MosaicMode, PiecewiseSegment,
    PiecewiseTransform, RangeLookupTable, Warp, WarpBuilder,
};
