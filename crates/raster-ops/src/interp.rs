//! Interpolation kernels for geometric resampling.
//!
//! [`Interpolation`] samples a source buffer at fractional coordinates.
//! Validity (source bounds, ROI membership, no-data) is evaluated per
//! contributing pixel through [`SourcePixels`]; invalid neighbors are
//! dropped and the remaining weights renormalized, so no-data never bleeds
//! into valid output.

use raster_core::{PixelBuffer, Range, Roi};

/// A source buffer plus the validity policy applied to its pixels.
pub struct SourcePixels<'a> {
    buf: &'a PixelBuffer,
    roi: Option<&'a Roi>,
    nodata: Option<&'a Range>,
}

impl<'a> SourcePixels<'a> {
    /// Wraps a buffer with an optional ROI and no-data range.
    pub fn new(buf: &'a PixelBuffer, roi: Option<&'a Roi>, nodata: Option<&'a Range>) -> Self {
        Self { buf, roi, nodata }
    }

    /// The valid sample at integer coordinates, or `None`.
    #[inline]
    pub fn valid(&self, x: i32, y: i32, band: u32) -> Option<f64> {
        if let Some(roi) = self.roi {
            if !roi.contains(x, y) {
                return None;
            }
        }
        let v = self.buf.sample(x, y, band)?;
        if self.nodata.is_some_and(|r| r.contains(v)) {
            return None;
        }
        Some(v)
    }
}

/// Interpolation method, passed opaquely to the geometric operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Nearest neighbor (fastest, blocky).
    #[default]
    Nearest,
    /// Bilinear over the 2x2 neighborhood.
    Bilinear,
    /// Catmull-Rom bicubic over the 4x4 neighborhood.
    Bicubic,
}

impl Interpolation {
    /// Samples the source at fractional coordinates `(x, y)` (pixel-center
    /// convention: integer coordinate `i` covers `[i, i+1)` with center
    /// `i + 0.5`). Returns `None` when no valid pixel contributes.
    pub fn sample(&self, src: &SourcePixels<'_>, x: f64, y: f64, band: u32) -> Option<f64> {
        match self {
            Self::Nearest => src.valid(x.floor() as i32, y.floor() as i32, band),
            Self::Bilinear => bilinear(src, x, y, band),
            Self::Bicubic => bicubic(src, x, y, band),
        }
    }
}

fn bilinear(src: &SourcePixels<'_>, x: f64, y: f64, band: u32) -> Option<f64> {
    let gx = x - 0.5;
    let gy = y - 0.5;
    let x0 = gx.floor() as i32;
    let y0 = gy.floor() as i32;
    let fx = gx - x0 as f64;
    let fy = gy - y0 as f64;

    let weights = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1, y0, fx * (1.0 - fy)),
        (x0, y0 + 1, (1.0 - fx) * fy),
        (x0 + 1, y0 + 1, fx * fy),
    ];
    let mut acc = 0.0;
    let mut wsum = 0.0;
    for (px, py, w) in weights {
        if w <= 0.0 {
            continue;
        }
        if let Some(v) = src.valid(px, py, band) {
            acc += v * w;
            wsum += w;
        }
    }
    if wsum > 0.0 { Some(acc / wsum) } else { None }
}

/// Catmull-Rom kernel weight.
fn cubic_weight(t: f64) -> f64 {
    let t = t.abs();
    if t < 1.0 {
        1.5 * t * t * t - 2.5 * t * t + 1.0
    } else if t < 2.0 {
        -0.5 * t * t * t + 2.5 * t * t - 4.0 * t + 2.0
    } else {
        0.0
    }
}

fn bicubic(src: &SourcePixels<'_>, x: f64, y: f64, band: u32) -> Option<f64> {
    let gx = x - 0.5;
    let gy = y - 0.5;
    let x0 = gx.floor() as i32;
    let y0 = gy.floor() as i32;
    let fx = gx - x0 as f64;
    let fy = gy - y0 as f64;

    let mut acc = 0.0;
    let mut wsum = 0.0;
    for j in -1..=2 {
        for i in -1..=2 {
            let w = cubic_weight(i as f64 - fx) * cubic_weight(j as f64 - fy);
            if w == 0.0 {
                continue;
            }
            if let Some(v) = src.valid(x0 + i, y0 + j, band) {
                acc += v * w;
                wsum += w;
            }
        }
    }
    if wsum.abs() > 1e-12 { Some(acc / wsum) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use raster_core::{DataType, Rect};

    fn ramp() -> PixelBuffer {
        PixelBuffer::from_fn(Rect::from_size(4, 4), 1, DataType::F64, |x, _, _| x as f64)
    }

    #[test]
    fn test_nearest() {
        let buf = ramp();
        let src = SourcePixels::new(&buf, None, None);
        assert_eq!(Interpolation::Nearest.sample(&src, 2.9, 0.5, 0), Some(2.0));
        assert_eq!(Interpolation::Nearest.sample(&src, -0.1, 0.5, 0), None);
    }

    #[test]
    fn test_bilinear_midpoint() {
        let buf = ramp();
        let src = SourcePixels::new(&buf, None, None);
        let v = Interpolation::Bilinear.sample(&src, 2.0, 2.0, 0).unwrap();
        assert_relative_eq!(v, 1.5);
    }

    #[test]
    fn test_bilinear_skips_nodata() {
        let buf = ramp();
        let nodata = Range::point(1.0, DataType::F64);
        let src = SourcePixels::new(&buf, None, Some(&nodata));
        // midway between columns 1 (nodata) and 2: only column 2 contributes
        let v = Interpolation::Bilinear.sample(&src, 2.0, 1.5, 0).unwrap();
        assert_relative_eq!(v, 2.0);
    }

    #[test]
    fn test_bicubic_on_flat_field() {
        let buf = PixelBuffer::from_fn(Rect::from_size(8, 8), 1, DataType::F64, |_, _, _| 7.0);
        let src = SourcePixels::new(&buf, None, None);
        let v = Interpolation::Bicubic.sample(&src, 4.3, 4.7, 0).unwrap();
        assert_relative_eq!(v, 7.0, epsilon = 1e-9);
    }
}
