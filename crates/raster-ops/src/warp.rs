//! Warps: generic destination-to-source geometric mappings.
//!
//! A [`Warp`] tells the warp operation where each destination pixel reads
//! from. Two representations exist: an exact affine mapping
//! ([`WarpAffine`]) and a sampled grid ([`WarpGrid`]) approximating an
//! arbitrary [`MathTransform2D`] to a tolerance. [`WarpBuilder`] picks the
//! representation: affine transforms stay exact, everything else is
//! approximated by adaptive grid refinement bounded by `max_positions`.

use std::sync::Arc;

use raster_core::{AffineTransform, Error, Rect, Result};

/// An invertible 2D point mapping.
///
/// Implementations are shared via `Arc` so chained transforms can hold
/// their parts without cloning.
pub trait MathTransform2D: Send + Sync {
    /// Maps a point.
    fn apply(&self, x: f64, y: f64) -> (f64, f64);

    /// The inverse mapping.
    fn inverse(&self) -> Result<Arc<dyn MathTransform2D>>;

    /// The affine coefficients, when the mapping is affine.
    fn as_affine(&self) -> Option<AffineTransform> {
        None
    }
}

/// A [`MathTransform2D`] backed by an affine transform.
#[derive(Debug, Clone)]
pub struct AffineTransform2D(pub AffineTransform);

impl MathTransform2D for AffineTransform2D {
    fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        self.0.apply(x, y)
    }

    fn inverse(&self) -> Result<Arc<dyn MathTransform2D>> {
        Ok(Arc::new(AffineTransform2D(self.0.invert()?)))
    }

    fn as_affine(&self) -> Option<AffineTransform> {
        Some(self.0)
    }
}

/// Applies `first`, then `second`.
pub struct ConcatenatedTransform {
    /// Transform applied first.
    pub first: Arc<dyn MathTransform2D>,
    /// Transform applied to the result of `first`.
    pub second: Arc<dyn MathTransform2D>,
}

impl ConcatenatedTransform {
    /// Chains two transforms.
    pub fn new(first: Arc<dyn MathTransform2D>, second: Arc<dyn MathTransform2D>) -> Self {
        Self { first, second }
    }
}

impl MathTransform2D for ConcatenatedTransform {
    fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let (mx, my) = self.first.apply(x, y);
        self.second.apply(mx, my)
    }

    fn inverse(&self) -> Result<Arc<dyn MathTransform2D>> {
        Ok(Arc::new(ConcatenatedTransform::new(
            self.second.inverse()?,
            self.first.inverse()?,
        )))
    }

    fn as_affine(&self) -> Option<AffineTransform> {
        let first = self.first.as_affine()?;
        let second = self.second.as_affine()?;
        Some(second.concatenate(&first))
    }
}

/// An exact affine warp (destination to source).
#[derive(Debug, Clone)]
pub struct WarpAffine {
    /// Destination-to-source mapping.
    pub transform: AffineTransform,
}

/// A grid-sampled warp: source positions at lattice nodes, bilinearly
/// interpolated in between.
#[derive(Clone)]
pub struct WarpGrid {
    /// Region the grid covers.
    pub rect: Rect,
    /// Number of cells along X.
    pub x_cells: u32,
    /// Number of cells along Y.
    pub y_cells: u32,
    /// Source positions at the `(x_cells+1) * (y_cells+1)` nodes,
    /// row-major.
    pub positions: Vec<(f32, f32)>,
    /// The transform the grid approximates, when known.
    pub transform: Option<Arc<dyn MathTransform2D>>,
}

impl WarpGrid {
    fn node(&self, i: u32, j: u32) -> (f64, f64) {
        let p = self.positions[(j * (self.x_cells + 1) + i) as usize];
        (p.0 as f64, p.1 as f64)
    }

    /// Interpolated source position for a destination point.
    pub fn map(&self, x: f64, y: f64) -> (f64, f64) {
        let fx = ((x - self.rect.x as f64) / self.rect.width as f64 * self.x_cells as f64)
            .clamp(0.0, self.x_cells as f64);
        let fy = ((y - self.rect.y as f64) / self.rect.height as f64 * self.y_cells as f64)
            .clamp(0.0, self.y_cells as f64);
        let i = (fx.floor() as u32).min(self.x_cells - 1);
        let j = (fy.floor() as u32).min(self.y_cells - 1);
        let tx = fx - i as f64;
        let ty = fy - j as f64;
        let (p00x, p00y) = self.node(i, j);
        let (p10x, p10y) = self.node(i + 1, j);
        let (p01x, p01y) = self.node(i, j + 1);
        let (p11x, p11y) = self.node(i + 1, j + 1);
        let top = (p00x + (p10x - p00x) * tx, p00y + (p10y - p00y) * tx);
        let bot = (p01x + (p11x - p01x) * tx, p01y + (p11y - p01y) * tx);
        (top.0 + (bot.0 - top.0) * ty, top.1 + (bot.1 - top.1) * ty)
    }
}

/// A destination-to-source warp.
#[derive(Clone)]
pub enum Warp {
    /// Exact affine mapping.
    Affine(WarpAffine),
    /// Grid-approximated mapping.
    Grid(WarpGrid),
}

impl Warp {
    /// Source position for a destination point.
    pub fn map(&self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Self::Affine(w) => w.transform.apply(x, y),
            Self::Grid(g) => g.map(x, y),
        }
    }

    /// The underlying math transform, when known.
    pub fn math_transform(&self) -> Option<Arc<dyn MathTransform2D>> {
        match self {
            Self::Affine(w) => Some(Arc::new(AffineTransform2D(w.transform))),
            Self::Grid(g) => g.transform.clone(),
        }
    }

    /// Returns `true` for the cheap representations (affine or grid).
    ///
    /// The warp-affine fold only replaces an existing warp when the new one
    /// is at least as cheap as the old.
    pub fn is_cheap(&self) -> bool {
        matches!(self, Self::Affine(_) | Self::Grid(_))
    }
}

impl std::fmt::Debug for Warp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Affine(w) => f.debug_tuple("Affine").field(&w.transform).finish(),
            Self::Grid(g) => f
                .debug_struct("Grid")
                .field("rect", &g.rect)
                .field("cells", &(g.x_cells, g.y_cells))
                .finish(),
        }
    }
}

/// Builds a [`Warp`] approximating a math transform over a bounding box.
#[derive(Debug, Clone)]
pub struct WarpBuilder {
    tolerance: f64,
    max_positions: usize,
}

impl WarpBuilder {
    /// Creates a builder with the given approximation tolerance (pixels).
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            max_positions: 4 * 1024 * 1024,
        }
    }

    /// Caps the number of grid positions the approximation may use.
    pub fn with_max_positions(mut self, max_positions: usize) -> Self {
        self.max_positions = max_positions;
        self
    }

    /// Builds the warp for `transform` over `mapping_bbox`.
    ///
    /// Affine transforms produce an exact [`Warp::Affine`]; anything else
    /// is approximated by a grid refined until the midpoint error drops
    /// under the tolerance or the position budget is exhausted.
    pub fn build(
        &self,
        transform: Arc<dyn MathTransform2D>,
        mapping_bbox: Rect,
    ) -> Result<Warp> {
        if let Some(affine) = transform.as_affine() {
            return Ok(Warp::Affine(WarpAffine { transform: affine }));
        }
        if mapping_bbox.is_empty() {
            return Err(Error::illegal_argument(
                "mapping_bbox",
                mapping_bbox.to_string(),
            ));
        }

        let mut x_cells = 1u32;
        let mut y_cells = 1u32;
        loop {
            let grid = sample_grid(&transform, mapping_bbox, x_cells, y_cells);
            let err = approximation_error(&transform, &grid);
            if err <= self.tolerance {
                tracing::debug!(x_cells, y_cells, err, "warp grid converged");
                return Ok(Warp::Grid(grid));
            }
            let next_positions = (2 * x_cells + 1) as usize * (2 * y_cells + 1) as usize;
            if next_positions > self.max_positions {
                tracing::warn!(
                    err,
                    tolerance = self.tolerance,
                    "warp grid position budget exhausted, keeping coarser grid"
                );
                return Ok(Warp::Grid(grid));
            }
            x_cells *= 2;
            y_cells *= 2;
        }
    }
}

fn sample_grid(
    transform: &Arc<dyn MathTransform2D>,
    rect: Rect,
    x_cells: u32,
    y_cells: u32,
) -> WarpGrid {
    let mut positions = Vec::with_capacity(((x_cells + 1) * (y_cells + 1)) as usize);
    for j in 0..=y_cells {
        let y = rect.y as f64 + rect.height as f64 * j as f64 / y_cells as f64;
        for i in 0..=x_cells {
            let x = rect.x as f64 + rect.width as f64 * i as f64 / x_cells as f64;
            let (sx, sy) = transform.apply(x, y);
            positions.push((sx as f32, sy as f32));
        }
    }
    WarpGrid {
        rect,
        x_cells,
        y_cells,
        positions,
        transform: Some(Arc::clone(transform)),
    }
}

/// Maximum deviation between grid interpolation and the exact transform,
/// measured at cell centers.
fn approximation_error(transform: &Arc<dyn MathTransform2D>, grid: &WarpGrid) -> f64 {
    let mut worst: f64 = 0.0;
    for j in 0..grid.y_cells {
        let y = grid.rect.y as f64
            + grid.rect.height as f64 * (j as f64 + 0.5) / grid.y_cells as f64;
        for i in 0..grid.x_cells {
            let x = grid.rect.x as f64
                + grid.rect.width as f64 * (i as f64 + 0.5) / grid.x_cells as f64;
            let (ex, ey) = transform.apply(x, y);
            let (gx, gy) = grid.map(x, y);
            worst = worst.max((ex - gx).hypot(ey - gy));
        }
    }
    worst
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// A mildly non-linear mapping for grid tests.
    struct SqueezeTransform;

    impl MathTransform2D for SqueezeTransform {
        fn apply(&self, x: f64, y: f64) -> (f64, f64) {
            (x + 0.0005 * y * y, y)
        }
        fn inverse(&self) -> Result<Arc<dyn MathTransform2D>> {
            Err(Error::invalid_state("no analytic inverse"))
        }
    }

    #[test]
    fn test_affine_stays_exact() {
        let tx = AffineTransform::scale(2.0, 0.5);
        let warp = WarpBuilder::new(0.333)
            .build(Arc::new(AffineTransform2D(tx)), Rect::from_size(64, 64))
            .unwrap();
        assert!(matches!(warp, Warp::Affine(_)));
        let (x, y) = warp.map(10.0, 10.0);
        assert_relative_eq!(x, 20.0);
        assert_relative_eq!(y, 5.0);
    }

    #[test]
    fn test_grid_refines_to_tolerance() {
        let warp = WarpBuilder::new(0.1)
            .build(Arc::new(SqueezeTransform), Rect::from_size(256, 256))
            .unwrap();
        let Warp::Grid(grid) = &warp else {
            panic!("expected a grid warp");
        };
        assert!(grid.x_cells > 1);
        // interpolation error at an arbitrary point stays small
        let (gx, gy) = warp.map(100.0, 200.0);
        let (ex, ey) = SqueezeTransform.apply(100.0, 200.0);
        assert!((gx - ex).hypot(gy - ey) < 0.2);
    }

    #[test]
    fn test_concatenated_as_affine() {
        let a = Arc::new(AffineTransform2D(AffineTransform::scale(2.0, 2.0)));
        let b = Arc::new(AffineTransform2D(AffineTransform::translation(5.0, 0.0)));
        let chained = ConcatenatedTransform::new(a, b);
        // apply scale first, then translation
        let (x, _) = chained.apply(3.0, 0.0);
        assert_relative_eq!(x, 11.0);
        let affine = chained.as_affine().unwrap();
        assert_relative_eq!(affine.apply(3.0, 0.0).0, 11.0);
    }

    #[test]
    fn test_concatenated_inverse() {
        let a: Arc<dyn MathTransform2D> =
            Arc::new(AffineTransform2D(AffineTransform::scale(2.0, 4.0)));
        let b: Arc<dyn MathTransform2D> =
            Arc::new(AffineTransform2D(AffineTransform::translation(1.0, 2.0)));
        let chained = ConcatenatedTransform::new(a, b);
        let inv = chained.inverse().unwrap();
        let (x, y) = chained.apply(3.0, 5.0);
        let (rx, ry) = inv.apply(x, y);
        assert_relative_eq!(rx, 3.0, epsilon = 1e-9);
        assert_relative_eq!(ry, 5.0, epsilon = 1e-9);
    }
}
