//! Band selection and merge operations on the worker.

use raster_core::{AffineTransform, ColorSpaceKind, Error, Range, Raster, Result};
use raster_ops::{BandCombineOp, BandMergeOp, BandSelectOp};

use crate::worker::Worker;

impl Worker {
    /// Keeps only the first band.
    pub fn retain_first_band(&mut self) -> Result<&mut Self> {
        self.retain_band_indices(&[0])
    }

    /// Keeps only the last band.
    pub fn retain_last_band(&mut self) -> Result<&mut Self> {
        let bands = self.num_bands();
        if bands == 0 {
            return Err(Error::invalid_state("no image set on this worker"));
        }
        self.retain_band_indices(&[bands - 1])
    }

    /// Keeps the first `count` bands.
    pub fn retain_bands(&mut self, count: u32) -> Result<&mut Self> {
        if count == 0 {
            return Err(Error::illegal_argument("count", "0"));
        }
        if count >= self.num_bands() {
            return Ok(self);
        }
        let indices: Vec<u32> = (0..count).collect();
        self.retain_band_indices(&indices)
    }

    /// Keeps the named bands, in order.
    pub fn retain_band_indices(&mut self, indices: &[u32]) -> Result<&mut Self> {
        self.registry().descriptor("BandSelect")?;
        let image = self.require_image()?;
        if indices.len() as u32 == image.num_bands()
            && indices.iter().enumerate().all(|(i, &b)| i as u32 == b)
        {
            return Ok(self);
        }
        let op = BandSelectOp::new(image, indices.to_vec())?;
        self.emit(Box::new(op));
        self.invalidate_statistics();
        Ok(self)
    }

    /// Replicates the current image's bands until at least `total` bands
    /// exist, then trims to exactly `total`.
    pub fn band_merge(&mut self, total: u32) -> Result<&mut Self> {
        if total == 0 {
            return Err(Error::illegal_argument("total", "0"));
        }
        let bands = self.num_bands();
        if bands >= total {
            return self.retain_bands(total);
        }
        self.registry().descriptor("BandMerge")?;
        let image = self.require_image()?;
        let copies = total.div_ceil(bands) as usize;
        let sources = vec![image; copies];
        let op = BandMergeOp::new(sources, vec![], None, false, self.policy())?;
        self.emit(Box::new(op));
        self.invalidate_statistics();
        self.retain_bands(total)
    }

    /// Appends (or prepends) the bands of another raster.
    ///
    /// With `add_alpha` the appended raster becomes the alpha channel.
    pub fn add_band(
        &mut self,
        image: &Raster,
        before: bool,
        add_alpha: bool,
        nodata: Option<Range>,
    ) -> Result<&mut Self> {
        self.registry().descriptor("BandMerge")?;
        let current = self.require_image()?;
        let (sources, nodata_list) = if before && !add_alpha {
            (
                vec![image.clone(), current],
                vec![nodata, self.nodata.clone()],
            )
        } else {
            (
                vec![current, image.clone()],
                vec![self.nodata.clone(), nodata],
            )
        };
        let op = BandMergeOp::new(sources, nodata_list, None, add_alpha, self.policy())?;
        self.emit(Box::new(op));
        self.invalidate_statistics();
        Ok(self)
    }

    /// Appends the bands of several rasters, optionally reprojecting each
    /// source onto the current grid with a per-source affine.
    ///
    /// `transforms`, when given, names one transform per merged source
    /// with the current image first.
    pub fn add_bands(
        &mut self,
        images: &[Raster],
        add_alpha: bool,
        nodata: Option<&[Range]>,
        transforms: Option<&[AffineTransform]>,
    ) -> Result<&mut Self> {
        self.registry().descriptor("BandMerge")?;
        let current = self.require_image()?;
        let mut sources = Vec::with_capacity(images.len() + 1);
        sources.push(current);
        sources.extend(images.iter().cloned());

        let mut nodata_list: Vec<Option<Range>> = vec![self.nodata.clone()];
        if let Some(ranges) = nodata {
            nodata_list.extend(ranges.iter().cloned().map(Some));
        }
        nodata_list.resize(sources.len(), None);

        let op = BandMergeOp::new(
            sources,
            nodata_list,
            transforms.map(<[AffineTransform]>::to_vec),
            add_alpha,
            self.policy(),
        )?;
        self.emit(Box::new(op));
        self.invalidate_statistics();
        Ok(self)
    }

    /// Reduces the image to a single intensity band.
    ///
    /// Gray and IHS images keep their first band; otherwise alpha is
    /// dropped and the color bands are averaged through a band combine.
    pub fn intensity(&mut self) -> Result<&mut Self> {
        let image = self.require_image()?;
        if self.num_bands() == 1 {
            return Ok(self);
        }
        let space = image.color_model().color_space();
        if matches!(space, ColorSpaceKind::Gray | ColorSpaceKind::Ihs) {
            return self.retain_first_band();
        }
        if image.color_model().has_alpha() {
            self.retain_bands(self.num_bands() - 1)?;
        }
        self.registry().descriptor("BandCombine")?;
        let image = self.require_image()?;
        let k = image.num_bands() as usize;
        let mut row = vec![1.0 / k as f64; k];
        row.push(0.0);
        let op = BandCombineOp::new(image, vec![row], self.policy())?;
        self.emit(Box::new(op));
        self.invalidate_statistics();
        Ok(self)
    }
}
