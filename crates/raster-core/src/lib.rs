//! # raster-core
//!
//! Core types for the rasterkit processing pipeline.
//!
//! This crate provides the foundational types used throughout the rasterkit
//! workspace:
//!
//! - [`Raster`] - a materialized grid or a lazy operation node (DAG)
//! - [`ColorModel`] - indexed, component and packed color interpretation
//! - [`Roi`] - region-of-interest masks (shape, geometry, raster)
//! - [`Range`] - no-data value ranges with data-type conversion
//! - [`AffineTransform`], [`Rect`] - geometry primitives
//! - [`RenderHints`], [`ImageLayout`] - layout and caching policy
//! - [`NodeProperty`] - typed per-node annotations (ROI, no-data, stats)
//! - [`CoreConfig`] - immutable pipeline configuration
//!
//! ## Crate Structure
//!
//! This crate is the foundation of the workspace and has no internal
//! dependencies. The other crates build on it:
//!
//! ```text
//! raster-core (this crate)
//!    ^
//!    |
//!    +-- raster-ops (operation nodes and kernels)
//!    +-- raster-codec (encoder interface and writers)
//!    +-- raster-worker (the fluent pipeline builder)
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod affine;
pub mod buffer;
pub mod color;
pub mod config;
pub mod datatype;
pub mod error;
pub mod hints;
pub mod layout;
pub mod node;
pub mod property;
pub mod range;
pub mod rect;
pub mod roi;
pub mod sample;

// Re-exports for convenience
pub use affine::AffineTransform;
pub use buffer::{PixelBuffer, PixelData};
pub use color::{
    ColorModel, ColorSpaceKind, ComponentColorModel, IndexedColorModel, PackedColorModel,
    PaletteEntry, Transparency,
};
pub use config::CoreConfig;
pub use datatype::DataType;
pub use error::{Error, Result};
pub use hints::{HintKey, HintValue, RenderHints, TileCache};
pub use layout::ImageLayout;
pub use node::{ImageOp, Raster};
pub use property::{Histogram, NodeProperty};
pub use range::Range;
pub use rect::Rect;
pub use roi::{MaskImage, Polygon, Roi};
pub use sample::SampleModel;

/// Prelude module for convenient imports.
///
/// # Usage
///
/// ```
/// use raster_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::affine::AffineTransform;
    pub use crate::buffer::{PixelBuffer, PixelData};
    pub use crate::color::{
        ColorModel, ColorSpaceKind, ComponentColorModel, IndexedColorModel, PaletteEntry,
        Transparency,
    };
    pub use crate::config::CoreConfig;
    pub use crate::datatype::DataType;
    pub use crate::error::{Error, Result};
    pub use crate::hints::{HintKey, HintValue, RenderHints};
    pub use crate::layout::ImageLayout;
    pub use crate::node::{ImageOp, Raster};
    pub use crate::property::NodeProperty;
    pub use crate::range::Range;
    pub use crate::rect::Rect;
    pub use crate::roi::Roi;
    pub use crate::sample::SampleModel;
}
