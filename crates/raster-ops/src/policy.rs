//! Shared per-operation pixel policy.
//!
//! Every operation that can honor a region of interest and a no-data range
//! embeds a [`PixelPolicy`]: the ROI restricting where the op applies, the
//! no-data range marking absent source values, and the background vector
//! used to fill excluded destination pixels.

use raster_core::{Range, Roi};

/// ROI / no-data / background triple threaded through operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PixelPolicy {
    /// Region of interest; pixels outside receive the background.
    pub roi: Option<Roi>,
    /// Source values treated as absent.
    pub nodata: Option<Range>,
    /// Per-band destination replacement values.
    pub background: Option<Vec<f64>>,
}

impl PixelPolicy {
    /// A policy with no restrictions.
    pub fn none() -> Self {
        Self::default()
    }

    /// Creates a policy from the worker's current attributes.
    pub fn new(roi: Option<Roi>, nodata: Option<Range>, background: Option<Vec<f64>>) -> Self {
        Self {
            roi,
            nodata,
            background,
        }
    }

    /// Returns `true` when a ROI or a no-data range is active.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.roi.is_some() || self.nodata.is_some()
    }

    /// Returns `true` when the destination pixel is inside the ROI (or no
    /// ROI is set).
    #[inline]
    pub fn allows(&self, x: i32, y: i32) -> bool {
        self.roi.as_ref().is_none_or(|roi| roi.contains(x, y))
    }

    /// Returns `true` when the value falls in the no-data range.
    #[inline]
    pub fn is_nodata(&self, value: f64) -> bool {
        self.nodata.as_ref().is_some_and(|r| r.contains(value))
    }

    /// The destination no-data value: `background[0]`, else 0.
    #[inline]
    pub fn dest_nodata(&self) -> f64 {
        self.background
            .as_ref()
            .and_then(|b| b.first().copied())
            .unwrap_or(0.0)
    }

    /// The background value for a band, falling back to the last entry
    /// (single values broadcast) and then to 0.
    #[inline]
    pub fn background_for(&self, band: u32) -> f64 {
        match &self.background {
            Some(bg) if !bg.is_empty() => bg.get(band as usize).copied().unwrap_or(bg[bg.len() - 1]),
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_core::{DataType, Rect};

    #[test]
    fn test_allows_and_nodata() {
        let policy = PixelPolicy::new(
            Some(Roi::from_rect(Rect::from_size(10, 10))),
            Some(Range::point(-9999.0, DataType::F64)),
            Some(vec![1.0, 2.0, 3.0]),
        );
        assert!(policy.is_active());
        assert!(policy.allows(5, 5));
        assert!(!policy.allows(15, 5));
        assert!(policy.is_nodata(-9999.0));
        assert!(!policy.is_nodata(0.0));
        assert_eq!(policy.dest_nodata(), 1.0);
        assert_eq!(policy.background_for(2), 3.0);
        assert_eq!(policy.background_for(7), 3.0);
    }

    #[test]
    fn test_inactive_policy() {
        let policy = PixelPolicy::none();
        assert!(!policy.is_active());
        assert!(policy.allows(-100, -100));
        assert!(!policy.is_nodata(f64::NAN));
        assert_eq!(policy.dest_nodata(), 0.0);
    }
}
