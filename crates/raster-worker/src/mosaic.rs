//! Mosaic composition on the worker.

use raster_core::{
    ColorModel, DataType, PixelBuffer, Range, Raster, Result, Roi, property::names,
};
use raster_ops::{MosaicMode, MosaicOp};

use crate::worker::Worker;

impl Worker {
    /// Composes several sources into one raster.
    ///
    /// Indexed sources with transparency or a ROI and an RGB(A) background
    /// keep their palette when the background names an exact palette
    /// entry (the entry's index becomes the op background); otherwise all
    /// sources are expanded to component color first. With no background,
    /// the union of the source ROIs becomes the worker ROI; with one, the
    /// ROI is cleared.
    pub fn mosaic(
        &mut self,
        images: &[Raster],
        mode: MosaicMode,
        alphas: Option<&[Raster]>,
        rois: Option<&[Roi]>,
        thresholds: Option<Vec<Vec<f64>>>,
        nodata: Option<&[Range]>,
    ) -> Result<&mut Self> {
        self.registry().descriptor("Mosaic")?;

        // palette widening: keep indexed sources only when the background
        // resolves to an exact palette entry
        let mut sources: Vec<Raster> = images.to_vec();
        let mut op_background = self.background.clone();
        let palette_check = sources.first().and_then(|first| {
            let needs_check = match first.color_model() {
                ColorModel::Indexed(icm) => {
                    icm.transparency != raster_core::Transparency::Opaque
                        || first.property(names::ROI).is_some()
                }
                _ => false,
            };
            if !needs_check {
                return None;
            }
            first
                .color_model()
                .as_indexed()
                .cloned()
                .zip(self.background_color())
        });
        if let Some((icm, (r, g, b))) = palette_check {
            let index = icm.nearest_color(r, g, b).unwrap_or(0);
            let entry = icm.rgba(index);
            if (entry.r, entry.g, entry.b) == (r, g, b) {
                op_background = Some(vec![index as f64]);
            } else {
                tracing::debug!(
                    "background not in palette, expanding mosaic sources to components"
                );
                let expanded: Vec<Raster> = sources
                    .iter()
                    .map(|s| {
                        let mut fork = Worker::with_hints(self.hints.clone());
                        fork.set_image(s.clone());
                        fork.force_component_color_model()?;
                        fork.require_image()
                    })
                    .collect::<Result<_>>()?;
                sources = expanded;
            }
        }

        let src_num = sources.len();

        // pad the parallel arrays
        let mut alphas_new: Vec<Option<Raster>> = match alphas {
            Some(list) => list.iter().cloned().map(Some).collect(),
            None => Vec::new(),
        };
        alphas_new.resize(src_num, None);
        let mut rois_new: Vec<Option<Roi>> = match rois {
            Some(list) => list.iter().cloned().map(Some).collect(),
            None => Vec::new(),
        };
        rois_new.resize(src_num, None);

        // explicit no-data, else the sources' embedded annotations, else
        // ranges synthesized from the thresholds
        let mut nodata_new: Vec<Option<Range>>;
        let mut no_internal_nodata = true;
        match nodata {
            Some(list) => {
                nodata_new = list.iter().cloned().map(Some).collect();
                nodata_new.resize(src_num, None);
                no_internal_nodata = false;
            }
            None => {
                nodata_new = sources
                    .iter()
                    .map(|s| {
                        let nd = s
                            .property(names::GC_NODATA)
                            .and_then(|p| p.as_nodata().cloned());
                        no_internal_nodata &= nd.is_none();
                        nd
                    })
                    .collect();
            }
        }
        if no_internal_nodata {
            if let Some(thresholds) = &thresholds {
                nodata_new = synthesize_threshold_nodata(thresholds, src_num);
            }
        }

        let roi_provided = rois.is_some_and(|r| !r.is_empty());
        let op = MosaicOp::new(
            sources.clone(),
            mode,
            alphas_new,
            rois_new.clone(),
            thresholds,
            nodata_new,
            op_background.clone(),
        )?;
        self.emit(Box::new(op));

        // final ROI: union of the source ROIs unless a background filled
        // the gaps
        if op_background.is_none() {
            if roi_provided {
                let final_roi = self.mosaic_rois(&sources, &rois_new)?;
                self.set_roi(final_roi);
            }
        } else {
            self.set_roi(None);
        }
        self.invalidate_statistics();
        Ok(self)
    }

    /// Union of the source ROIs, defaulting to full bounds for sources
    /// without one. Vector ROIs merge as vectors; when raster ROIs are in
    /// the mix, the vector union is rasterized and composed through a
    /// second overlay mosaic.
    fn mosaic_rois(&self, sources: &[Raster], rois: &[Option<Roi>]) -> Result<Option<Roi>> {
        let mut list: Vec<Roi> = Vec::with_capacity(sources.len());
        for (i, source) in sources.iter().enumerate() {
            match rois.get(i).cloned().flatten() {
                Some(roi) => list.push(roi),
                None => list.push(Roi::from_rect(source.bounds())),
            }
        }
        if list.is_empty() {
            return Ok(None);
        }
        if list.len() == 1 {
            return Ok(Some(list.remove(0)));
        }

        let (vector_rois, raster_rois): (Vec<Roi>, Vec<Roi>) =
            list.into_iter().partition(Roi::is_vector);
        let vector_union = vector_rois
            .into_iter()
            .reduce(|acc, roi| acc.add(&roi));

        if raster_rois.is_empty() {
            return Ok(vector_union);
        }

        // rasterize everything and overlay the masks
        let mut mask_sources = Vec::with_capacity(raster_rois.len() + 1);
        if let Some(v) = &vector_union {
            mask_sources.push(mask_raster(v));
        }
        for roi in &raster_rois {
            mask_sources.push(mask_raster(roi));
        }
        let n = mask_sources.len();
        let overlay = MosaicOp::new(
            mask_sources,
            MosaicMode::Overlay,
            vec![None; n],
            vec![None; n],
            Some(vec![vec![1.0]; n]),
            vec![None; n],
            None,
        )?;
        let node = Raster::from_op(Box::new(overlay), &self.effective_hints());
        let buf = node.data()?;
        Ok(Some(Roi::Raster(raster_core::MaskImage::from_fn(
            buf.rect(),
            |x, y| buf.sample(x, y, 0).unwrap_or(0.0) != 0.0,
        ))))
    }
}

/// Converts a ROI into a bilevel raster source for the mask overlay.
fn mask_raster(roi: &Roi) -> Raster {
    let mask = roi.as_mask();
    let rect = mask.rect;
    let buf = PixelBuffer::from_fn(rect, 1, DataType::U1, |x, y, _| mask.contains(x, y) as u8 as f64);
    Raster::from_buffer_component(buf)
}

/// One synthesized no-data range per source: everything strictly below the
/// source's largest per-band threshold is no-data.
fn synthesize_threshold_nodata(thresholds: &[Vec<f64>], src_num: usize) -> Vec<Option<Range>> {
    let mut nodata: Vec<Option<Range>> = Vec::with_capacity(src_num);
    let available = src_num.min(thresholds.len());
    for row in thresholds.iter().take(available) {
        let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        nodata.push(Some(Range::new(
            f64::NEG_INFINITY,
            true,
            max,
            false,
            DataType::F64,
        )));
    }
    let fill = nodata.first().cloned().flatten();
    nodata.resize(src_num, fill);
    nodata
}
