//! # raster-ops
//!
//! Operation nodes and kernels for rasterkit pipelines.
//!
//! Every public operation is a lazy [`raster_core::ImageOp`] implementation
//! that the worker wraps into a raster node. The crate also hosts the
//! shared collaborators of the geometric ops ([`Interpolation`],
//! [`WarpBuilder`]), the operation descriptor registry, and the color
//! profile registry.
//!
//! # Modules
//!
//! - [`registry`] - operation descriptor registry (stock vs extended mode)
//! - [`policy`] - the shared ROI / no-data / background parameter triple
//! - [`format`] - casts, constants, pass-throughs, borders
//! - [`rescale`] - per-band linear rescale and binarize
//! - [`lookup`] - lookup tables, range-lookup, piecewise, classify
//! - [`algebra`] - pointwise operators under the uniform contract
//! - [`bands`] - band selection, merge and combination
//! - [`geometry`] - scale / affine / translate / crop / warp resampling
//! - [`mosaic`] - multi-source overlay and blend composition
//! - [`stats`] - extrema / mean / histogram scans
//! - [`dither`] - the fixed color cube, ordered dither, error diffusion
//! - [`colorconvert`] - color space conversion and profile registry
//! - [`interp`] - interpolation kernels
//! - [`warp`] - warps, math transforms and the warp builder

pub mod algebra;
pub mod bands;
pub mod colorconvert;
pub mod dither;
pub mod format;
pub mod geometry;
pub mod interp;
pub mod lookup;
pub mod mosaic;
pub mod policy;
pub mod registry;
pub mod rescale;
pub mod stats;
pub mod warp;

pub use algebra::{AlgebraConstOp, AlgebraOp, Operator};
pub use bands::{BandCombineOp, BandMergeOp, BandSelectOp};
pub use colorconvert::{ColorConvertOp, ProfileRegistry};
pub use dither::{ErrorDiffusionOp, OrderedDitherOp, color_cube_216, cube_index};
pub use format::{BorderOp, ConstantOp, FormatOp, NullOp};
pub use geometry::{AffineOp, CropOp, ScaleOp, TranslateOp, WarpOp};
pub use interp::{Interpolation, SourcePixels};
pub use lookup::{
    ClassifyOp, ColorMapTransform, LookupOp, LookupTable, PiecewiseOp, PiecewiseSegment,
    PiecewiseTransform, RangeLookupOp, RangeLookupTable,
};
pub use mosaic::{MosaicMode, MosaicOp};
pub use policy::PixelPolicy;
pub use registry::{OperationDescriptor, OperationRegistry};
pub use rescale::{BinarizeOp, RescaleOp};
pub use warp::{
    AffineTransform2D, ConcatenatedTransform, MathTransform2D, Warp, WarpAffine, WarpBuilder,
    WarpGrid,
};
