//! Typed properties attached to raster nodes.
//!
//! The pipeline annotates nodes with a small set of well-known values: the
//! active ROI, the no-data range, and cached statistics. Instead of an
//! untyped bag, [`NodeProperty`] is a closed sum; nodes carry a sparse map
//! keyed by the names in [`names`].

use crate::range::Range;
use crate::roi::Roi;

/// Well-known property names.
pub mod names {
    /// ROI set by the worker on the current node.
    pub const ROI: &str = "ROI";
    /// No-data annotation set by the worker.
    pub const GC_NODATA: &str = "GC_NODATA";
    /// Cached per-band extrema.
    pub const EXTREMA: &str = "extrema";
    /// Cached per-band mean.
    pub const MEAN: &str = "mean";
    /// Cached histogram.
    pub const HISTOGRAM: &str = "histogram";
    /// ROI *output* by a geometric operation (what the op mapped the
    /// source ROI into). The worker reads this back after emission.
    pub const OUTPUT_ROI: &str = "roi";
}

/// A per-band histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// Bin counts, one vector per band.
    pub bins: Vec<Vec<u64>>,
    /// Inclusive lower bound per band.
    pub low: Vec<f64>,
    /// Exclusive upper bound per band.
    pub high: Vec<f64>,
}

impl Histogram {
    /// Number of bins of a band.
    pub fn num_bins(&self, band: usize) -> usize {
        self.bins.get(band).map_or(0, Vec::len)
    }

    /// Total sample count of a band.
    pub fn total(&self, band: usize) -> u64 {
        self.bins.get(band).map_or(0, |b| b.iter().sum())
    }
}

/// A typed node property.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeProperty {
    /// A region of interest.
    Roi(Roi),
    /// A no-data range.
    NoData(Range),
    /// Per-band minima and maxima.
    Extrema {
        /// Minimum per band.
        min: Vec<f64>,
        /// Maximum per band.
        max: Vec<f64>,
    },
    /// Per-band mean.
    Mean(Vec<f64>),
    /// Histogram.
    Histogram(Histogram),
    /// Uninterpreted payload for extensions.
    Custom(Vec<u8>),
}

impl NodeProperty {
    /// The ROI payload, if any.
    pub fn as_roi(&self) -> Option<&Roi> {
        match self {
            Self::Roi(r) => Some(r),
            _ => None,
        }
    }

    /// The no-data payload, if any.
    pub fn as_nodata(&self) -> Option<&Range> {
        match self {
            Self::NoData(r) => Some(r),
            _ => None,
        }
    }

    /// The extrema payload, if any.
    pub fn as_extrema(&self) -> Option<(&[f64], &[f64])> {
        match self {
            Self::Extrema { min, max } => Some((min, max)),
            _ => None,
        }
    }

    /// The mean payload, if any.
    pub fn as_mean(&self) -> Option<&[f64]> {
        match self {
            Self::Mean(m) => Some(m),
            _ => None,
        }
    }

    /// The histogram payload, if any.
    pub fn as_histogram(&self) -> Option<&Histogram> {
        match self {
            Self::Histogram(h) => Some(h),
            _ => None,
        }
    }
}
