//! Statistics scans: extrema, mean, histogram.
//!
//! All scans honor the ROI and the no-data range and accept sampling
//! periods (the worker always passes 1). NaN samples are skipped like
//! no-data. The scans return plain values; attaching them to a node as a
//! property is the worker's business.

use raster_core::{Error, Histogram, Range, Raster, Result, Roi};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

struct Scan<'a> {
    roi: Option<&'a Roi>,
    nodata: Option<&'a Range>,
}

impl Scan<'_> {
    #[inline]
    fn accepts(&self, x: i32, y: i32, v: f64) -> bool {
        if v.is_nan() {
            return false;
        }
        if self.roi.is_some_and(|roi| !roi.contains(x, y)) {
            return false;
        }
        !self.nodata.is_some_and(|r| r.contains(v))
    }
}

fn check_periods(x_period: u32, y_period: u32) -> Result<()> {
    if x_period == 0 || y_period == 0 {
        return Err(Error::illegal_argument("period", "must be positive"));
    }
    Ok(())
}

/// Per-band minima and maxima.
///
/// Bands with no accepted sample report `(f64::MAX, f64::MIN)`.
pub fn extrema(
    raster: &Raster,
    roi: Option<&Roi>,
    nodata: Option<&Range>,
    x_period: u32,
    y_period: u32,
) -> Result<(Vec<f64>, Vec<f64>)> {
    check_periods(x_period, y_period)?;
    let buf = raster.data()?;
    let rect = buf.rect();
    let bands = buf.num_bands() as usize;
    let scan = Scan { roi, nodata };

    let rows: Vec<i32> = (rect.y..rect.bottom())
        .step_by(y_period as usize)
        .collect();
    let fold_row = |mut acc: (Vec<f64>, Vec<f64>), y: &i32| {
        let y = *y;
        for x in (rect.x..rect.right()).step_by(x_period as usize) {
            for b in 0..bands {
                let v = buf.sample(x, y, b as u32).unwrap_or(f64::NAN);
                if scan.accepts(x, y, v) {
                    acc.0[b] = acc.0[b].min(v);
                    acc.1[b] = acc.1[b].max(v);
                }
            }
        }
        acc
    };
    let identity = || (vec![f64::MAX; bands], vec![f64::MIN; bands]);
    let merge = |mut a: (Vec<f64>, Vec<f64>), b: (Vec<f64>, Vec<f64>)| {
        for i in 0..bands {
            a.0[i] = a.0[i].min(b.0[i]);
            a.1[i] = a.1[i].max(b.1[i]);
        }
        a
    };

    #[cfg(feature = "parallel")]
    let result = rows
        .par_iter()
        .fold(identity, fold_row)
        .reduce(identity, merge);
    #[cfg(not(feature = "parallel"))]
    let result = {
        let _ = merge;
        rows.iter().fold(identity(), fold_row)
    };
    Ok(result)
}

/// Per-band mean over the accepted samples. Bands with no accepted sample
/// report 0.
pub fn mean(
    raster: &Raster,
    roi: Option<&Roi>,
    nodata: Option<&Range>,
    x_period: u32,
    y_period: u32,
) -> Result<Vec<f64>> {
    check_periods(x_period, y_period)?;
    let buf = raster.data()?;
    let rect = buf.rect();
    let bands = buf.num_bands() as usize;
    let scan = Scan { roi, nodata };

    let mut sum = vec![0.0f64; bands];
    let mut count = vec![0u64; bands];
    for y in (rect.y..rect.bottom()).step_by(y_period as usize) {
        for x in (rect.x..rect.right()).step_by(x_period as usize) {
            for b in 0..bands {
                let v = buf.sample(x, y, b as u32).unwrap_or(f64::NAN);
                if scan.accepts(x, y, v) {
                    sum[b] += v;
                    count[b] += 1;
                }
            }
        }
    }
    Ok(sum
        .iter()
        .zip(&count)
        .map(|(&s, &n)| if n > 0 { s / n as f64 } else { 0.0 })
        .collect())
}

/// Per-band histogram with `num_bins[b]` bins over `[low[b], high[b])`.
/// Length-1 parameter slices broadcast across bands.
pub fn histogram(
    raster: &Raster,
    roi: Option<&Roi>,
    nodata: Option<&Range>,
    num_bins: &[u32],
    low: &[f64],
    high: &[f64],
) -> Result<Histogram> {
    let buf = raster.data()?;
    let rect = buf.rect();
    let bands = buf.num_bands() as usize;
    let pick = |values: &[f64], b: usize, default: f64| -> f64 {
        match values {
            [] => default,
            [single] => *single,
            multi => multi.get(b).copied().unwrap_or(default),
        }
    };
    let bins_for = |b: usize| -> u32 {
        match num_bins {
            [] => 256,
            [single] => *single,
            multi => multi.get(b).copied().unwrap_or(256),
        }
    };
    let scan = Scan { roi, nodata };

    let lows: Vec<f64> = (0..bands).map(|b| pick(low, b, 0.0)).collect();
    let highs: Vec<f64> = (0..bands).map(|b| pick(high, b, 256.0)).collect();
    for b in 0..bands {
        if highs[b] <= lows[b] || bins_for(b) == 0 {
            return Err(Error::illegal_argument(
                "histogram",
                format!("band {b}: [{}, {}) with {} bins", lows[b], highs[b], bins_for(b)),
            ));
        }
    }

    let mut bins: Vec<Vec<u64>> = (0..bands).map(|b| vec![0; bins_for(b) as usize]).collect();
    for y in rect.y..rect.bottom() {
        for x in rect.x..rect.right() {
            for b in 0..bands {
                let v = buf.sample(x, y, b as u32).unwrap_or(f64::NAN);
                if !scan.accepts(x, y, v) || v < lows[b] || v >= highs[b] {
                    continue;
                }
                let width = (highs[b] - lows[b]) / bins_for(b) as f64;
                let idx = (((v - lows[b]) / width) as usize).min(bins[b].len() - 1);
                bins[b][idx] += 1;
            }
        }
    }
    Ok(Histogram {
        bins,
        low: lows,
        high: highs,
    })
}
