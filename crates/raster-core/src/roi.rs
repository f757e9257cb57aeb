//! Region-of-interest masks.
//!
//! A [`Roi`] restricts where operations apply. Three representations are
//! supported:
//!
//! - [`Roi::Shape`] - a single polygon
//! - [`Roi::Geometry`] - a multi-polygon (closed under vector union)
//! - [`Roi::Raster`] - a bilevel mask image
//!
//! Vector forms stay vector under [`Roi::transform`] and [`Roi::add`];
//! mixing a raster operand (or intersecting) falls back to rasterization.
//! Pixel membership uses the pixel center, so a rectangle polygon matches
//! [`Rect::contains`] exactly.

use crate::affine::AffineTransform;
use crate::error::Result;
use crate::rect::Rect;

/// A simple closed polygon in raster coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    /// Vertices in order; the ring closes implicitly.
    pub points: Vec<(f64, f64)>,
}

impl Polygon {
    /// Creates a polygon from its vertices.
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    /// The four corners of a rectangle.
    pub fn from_rect(rect: &Rect) -> Self {
        let (x0, y0) = (rect.x as f64, rect.y as f64);
        let (x1, y1) = (rect.right() as f64, rect.bottom() as f64);
        Self::new(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1)])
    }

    /// Even-odd point-in-polygon test.
    pub fn contains_point(&self, px: f64, py: f64) -> bool {
        let n = self.points.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (xi, yi) = self.points[i];
            let (xj, yj) = self.points[j];
            if (yi > py) != (yj > py) && px < (xj - xi) * (py - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// Integer bounding box of the vertices.
    pub fn bounds(&self) -> Rect {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;
        for &(x, y) in &self.points {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        if !min_x.is_finite() {
            return Rect::default();
        }
        let x = min_x.floor() as i32;
        let y = min_y.floor() as i32;
        Rect::new(
            x,
            y,
            (max_x.ceil() as i32 - x).max(0) as u32,
            (max_y.ceil() as i32 - y).max(0) as u32,
        )
    }

    /// Maps every vertex through the transform.
    pub fn transform(&self, tx: &AffineTransform) -> Polygon {
        Polygon::new(self.points.iter().map(|&(x, y)| tx.apply(x, y)).collect())
    }
}

/// A bilevel mask over a rectangle, one byte per pixel (1 = inside).
#[derive(Debug, Clone, PartialEq)]
pub struct MaskImage {
    /// Region the mask covers; pixels outside are not in the ROI.
    pub rect: Rect,
    /// Row-major membership flags.
    pub bits: Vec<u8>,
}

impl MaskImage {
    /// Builds a mask by evaluating a predicate over the rectangle.
    pub fn from_fn(rect: Rect, mut f: impl FnMut(i32, i32) -> bool) -> Self {
        let mut bits = Vec::with_capacity(rect.area() as usize);
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                bits.push(f(x, y) as u8);
            }
        }
        Self { rect, bits }
    }

    /// A fully-set mask over the rectangle.
    pub fn full(rect: Rect) -> Self {
        Self {
            bits: vec![1; rect.area() as usize],
            rect,
        }
    }

    /// Membership test.
    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        if !self.rect.contains(x, y) {
            return false;
        }
        let i = (y - self.rect.y) as usize * self.rect.width as usize + (x - self.rect.x) as usize;
        self.bits[i] != 0
    }
}

/// A region-of-interest mask.
#[derive(Debug, Clone, PartialEq)]
pub enum Roi {
    /// A single polygon.
    Shape(Polygon),
    /// A multi-polygon.
    Geometry(Vec<Polygon>),
    /// A bilevel mask image.
    Raster(MaskImage),
}

impl Roi {
    /// A rectangular shape ROI.
    pub fn from_rect(rect: Rect) -> Self {
        Self::Shape(Polygon::from_rect(&rect))
    }

    /// A geometry ROI from one polygon.
    pub fn geometry(poly: Polygon) -> Self {
        Self::Geometry(vec![poly])
    }

    /// Returns `true` for the vector representations.
    pub fn is_vector(&self) -> bool {
        !matches!(self, Self::Raster(_))
    }

    /// Pixel membership test (pixel centers for the vector forms).
    pub fn contains(&self, x: i32, y: i32) -> bool {
        let (cx, cy) = (x as f64 + 0.5, y as f64 + 0.5);
        match self {
            Self::Shape(p) => p.contains_point(cx, cy),
            Self::Geometry(polys) => polys.iter().any(|p| p.contains_point(cx, cy)),
            Self::Raster(mask) => mask.contains(x, y),
        }
    }

    /// Bounding box of the region.
    pub fn bounds(&self) -> Rect {
        match self {
            Self::Shape(p) => p.bounds(),
            Self::Geometry(polys) => {
                let mut acc = Rect::default();
                for p in polys {
                    acc = acc.union(&p.bounds());
                }
                acc
            }
            Self::Raster(mask) => mask.rect,
        }
    }

    /// Returns `true` if the region's bounds overlap the rectangle.
    pub fn intersects_rect(&self, rect: &Rect) -> bool {
        self.bounds().intersects(rect)
    }

    /// Transforms the region.
    ///
    /// Vector forms map their vertices and stay vector; the raster form is
    /// resampled with nearest-neighbor over the mapped bounds.
    pub fn transform(&self, tx: &AffineTransform) -> Result<Roi> {
        match self {
            Self::Shape(p) => Ok(Self::Shape(p.transform(tx))),
            Self::Geometry(polys) => {
                Ok(Self::Geometry(polys.iter().map(|p| p.transform(tx)).collect()))
            }
            Self::Raster(mask) => {
                let target = tx.map_rect(&mask.rect);
                let inverse = tx.invert()?;
                Ok(Self::Raster(MaskImage::from_fn(target, |x, y| {
                    let (sx, sy) = inverse.apply(x as f64 + 0.5, y as f64 + 0.5);
                    mask.contains(sx.floor() as i32, sy.floor() as i32)
                })))
            }
        }
    }

    /// Intersection of two regions, rasterized over the overlap of their
    /// bounds. An empty overlap produces an empty raster ROI.
    pub fn intersect(&self, other: &Roi) -> Roi {
        let rect = match self.bounds().intersect(&other.bounds()) {
            Some(r) => r,
            None => return Self::Raster(MaskImage::from_fn(Rect::default(), |_, _| false)),
        };
        Self::Raster(MaskImage::from_fn(rect, |x, y| {
            self.contains(x, y) && other.contains(x, y)
        }))
    }

    /// Union of two regions.
    ///
    /// Vector operands merge into a multi-polygon; a raster operand forces
    /// rasterization over the union of the bounds.
    pub fn add(&self, other: &Roi) -> Roi {
        match (self, other) {
            (Self::Raster(_), _) | (_, Self::Raster(_)) => {
                let rect = self.bounds().union(&other.bounds());
                Self::Raster(MaskImage::from_fn(rect, |x, y| {
                    self.contains(x, y) || other.contains(x, y)
                }))
            }
            _ => {
                let mut polys = self.polygons();
                polys.extend(other.polygons());
                Self::Geometry(polys)
            }
        }
    }

    /// Rasterizes the region over its bounds.
    pub fn as_mask(&self) -> MaskImage {
        match self {
            Self::Raster(mask) => mask.clone(),
            _ => MaskImage::from_fn(self.bounds(), |x, y| self.contains(x, y)),
        }
    }

    fn polygons(&self) -> Vec<Polygon> {
        match self {
            Self::Shape(p) => vec![p.clone()],
            Self::Geometry(polys) => polys.clone(),
            Self::Raster(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_shape_matches_rect_contains() {
        let rect = Rect::new(10, 20, 30, 40);
        let roi = Roi::from_rect(rect);
        assert!(roi.contains(10, 20));
        assert!(roi.contains(39, 59));
        assert!(!roi.contains(40, 20));
        assert!(!roi.contains(9, 20));
        assert_eq!(roi.bounds(), rect);
    }

    #[test]
    fn test_vector_union_stays_vector() {
        let a = Roi::from_rect(Rect::new(0, 0, 10, 10));
        let b = Roi::geometry(Polygon::from_rect(&Rect::new(20, 0, 10, 10)));
        let union = a.add(&b);
        assert!(union.is_vector());
        assert!(union.contains(5, 5));
        assert!(union.contains(25, 5));
        assert!(!union.contains(15, 5));
    }

    #[test]
    fn test_raster_union_rasterizes() {
        let a = Roi::from_rect(Rect::new(0, 0, 10, 10));
        let b = Roi::Raster(MaskImage::full(Rect::new(5, 5, 10, 10)));
        let union = a.add(&b);
        assert!(!union.is_vector());
        assert!(union.contains(1, 1));
        assert!(union.contains(12, 12));
        assert!(!union.contains(12, 1));
    }

    #[test]
    fn test_intersect() {
        let a = Roi::from_rect(Rect::new(0, 0, 10, 10));
        let b = Roi::from_rect(Rect::new(5, 5, 10, 10));
        let i = a.intersect(&b);
        assert!(i.contains(7, 7));
        assert!(!i.contains(2, 2));
        assert_eq!(i.bounds(), Rect::new(5, 5, 5, 5));
    }

    #[test]
    fn test_transform_shape() {
        let roi = Roi::from_rect(Rect::new(0, 0, 10, 10));
        let moved = roi.transform(&AffineTransform::translation(100.0, 0.0)).unwrap();
        assert!(moved.is_vector());
        assert!(moved.contains(105, 5));
        assert!(!moved.contains(5, 5));
    }

    #[test]
    fn test_transform_raster() {
        let roi = Roi::Raster(MaskImage::full(Rect::new(0, 0, 4, 4)));
        let scaled = roi.transform(&AffineTransform::scale(2.0, 2.0)).unwrap();
        assert!(scaled.contains(7, 7));
        assert!(!scaled.contains(8, 8));
    }
}
