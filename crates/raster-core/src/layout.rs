//! Image layout hints.
//!
//! An [`ImageLayout`] describes the geometry a consumer wants for a
//! produced node: origin, size, tile grid, and optional sample/color model
//! overrides. A user-supplied layout (via the hint map) beats the one the
//! worker computes from the current image.

use crate::color::ColorModel;
use crate::rect::Rect;
use crate::sample::SampleModel;

/// Requested layout for an operation's output. All fields optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageLayout {
    /// Minimum X of the output.
    pub min_x: Option<i32>,
    /// Minimum Y of the output.
    pub min_y: Option<i32>,
    /// Output width.
    pub width: Option<u32>,
    /// Output height.
    pub height: Option<u32>,
    /// Tile width.
    pub tile_width: Option<u32>,
    /// Tile height.
    pub tile_height: Option<u32>,
    /// Tile grid X offset.
    pub tile_grid_x: Option<i32>,
    /// Tile grid Y offset.
    pub tile_grid_y: Option<i32>,
    /// Sample model override.
    pub sample_model: Option<SampleModel>,
    /// Color model override.
    pub color_model: Option<ColorModel>,
}

impl ImageLayout {
    /// An empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// A layout pinning the output bounds.
    pub fn with_bounds(rect: Rect) -> Self {
        Self {
            min_x: Some(rect.x),
            min_y: Some(rect.y),
            width: Some(rect.width),
            height: Some(rect.height),
            ..Self::default()
        }
    }

    /// Sets the tile geometry.
    pub fn tiled(mut self, tile_width: u32, tile_height: u32) -> Self {
        self.tile_width = Some(tile_width);
        self.tile_height = Some(tile_height);
        self
    }

    /// Sets the color model override.
    pub fn with_color_model(mut self, cm: ColorModel) -> Self {
        self.color_model = Some(cm);
        self
    }

    /// Sets the sample model override.
    pub fn with_sample_model(mut self, sm: SampleModel) -> Self {
        self.sample_model = Some(sm);
        self
    }

    /// The bounds override, when all four fields are present.
    pub fn bounds(&self) -> Option<Rect> {
        Some(Rect::new(self.min_x?, self.min_y?, self.width?, self.height?))
    }
}
