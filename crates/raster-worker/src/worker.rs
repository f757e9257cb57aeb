//! Worker state, attribute propagation and the statistics cache.
//!
//! The [`Worker`] is a mutable builder over a single in-flight raster.
//! Every fluent operation reads the current node plus the four attributes
//! (ROI, no-data, background, hints), emits a new node, re-attaches the
//! annotations and returns `&mut self`. The worker is not thread-safe;
//! after an error it is in an undetermined state and must only be
//! disposed.

use raster_core::{
    ColorSpaceKind, CoreConfig, DataType, Error, HintKey, HintValue, Histogram, MaskImage,
    NodeProperty, Range, Raster, RenderHints, Result, Roi, Transparency, property::names,
};
use raster_ops::registry::OperationRegistry;
use raster_ops::{NullOp, FormatOp, PixelPolicy};

/// Fluent builder for raster processing chains.
///
/// # Example
///
/// ```ignore
/// use raster_worker::Worker;
///
/// let mut worker = Worker::from_raster(source);
/// worker.set_nodata(Some(Range::point(-9999.0, DataType::F64)));
/// worker.rescale_to_bytes()?.force_index_color_model_for_gif(true)?;
/// let result = worker.raster().unwrap().clone();
/// ```
#[derive(Debug)]
pub struct Worker {
    pub(crate) image: Option<Raster>,
    pub(crate) inheritance_stop: Option<Raster>,
    pub(crate) roi: Option<Roi>,
    pub(crate) nodata: Option<Range>,
    pub(crate) background: Option<Vec<f64>>,
    pub(crate) hints: RenderHints,
    pub(crate) tile_cache_disabled: u32,
    pub(crate) config: CoreConfig,
}

impl Default for Worker {
    fn default() -> Self {
        Self::new()
    }
}

impl Worker {
    // =========================================================================
    // Constructors and lifecycle
    // =========================================================================

    /// Creates an empty worker; the first operation must be `set_image`,
    /// or a source-producing one like `mosaic`.
    pub fn new() -> Self {
        Self {
            image: None,
            inheritance_stop: None,
            roi: None,
            nodata: None,
            background: None,
            hints: RenderHints::new(),
            tile_cache_disabled: 0,
            config: *CoreConfig::global(),
        }
    }

    /// Creates an empty worker carrying the given hints.
    pub fn with_hints(hints: RenderHints) -> Self {
        Self {
            hints,
            ..Self::new()
        }
    }

    /// Creates an empty worker with an explicit configuration (embedders
    /// and tests; the default is the process-wide one).
    pub fn with_config(config: CoreConfig) -> Self {
        Self {
            config,
            ..Self::new()
        }
    }

    /// Creates a worker wrapping a source raster.
    pub fn from_raster(image: Raster) -> Self {
        let mut worker = Self::new();
        worker.set_image(image);
        worker
    }

    /// Releases the operation graph and clears hints and attributes.
    pub fn dispose(&mut self) {
        self.image = None;
        self.inheritance_stop = None;
        self.roi = None;
        self.nodata = None;
        self.background = None;
        self.hints = RenderHints::new();
        self.tile_cache_disabled = 0;
    }

    // =========================================================================
    // Image, attributes and hints
    // =========================================================================

    /// Assigns the current image, resets the statistics inheritance stop
    /// and adopts the no-data annotation embedded in the raster.
    pub fn set_image(&mut self, image: Raster) -> &mut Self {
        let embedded = image
            .property(names::GC_NODATA)
            .and_then(|p| p.as_nodata().cloned());
        self.inheritance_stop = Some(image.clone());
        self.image = Some(image);
        self.set_nodata(embedded);
        self
    }

    /// The current raster, if any.
    pub fn raster(&self) -> Option<&Raster> {
        self.image.as_ref()
    }

    /// The current ROI, if any.
    pub fn roi(&self) -> Option<&Roi> {
        self.roi.as_ref()
    }

    /// The current no-data range, if any.
    pub fn nodata(&self) -> Option<&Range> {
        self.nodata.as_ref()
    }

    /// The current background vector, if any.
    pub fn background(&self) -> Option<&[f64]> {
        self.background.as_deref()
    }

    /// The destination no-data value: `background[0]`, or NaN when no
    /// background is set.
    pub fn destination_nodata(&self) -> f64 {
        self.background
            .as_ref()
            .and_then(|b| b.first().copied())
            .unwrap_or(f64::NAN)
    }

    /// Sets or clears the region of interest.
    pub fn set_roi(&mut self, roi: Option<Roi>) -> &mut Self {
        self.roi = roi;
        self.annotate_roi();
        self.invalidate_statistics();
        self
    }

    /// Sets or clears the no-data range.
    pub fn set_nodata(&mut self, nodata: Option<Range>) -> &mut Self {
        self.nodata = nodata;
        self.annotate_nodata();
        self.invalidate_statistics();
        self
    }

    /// Sets or clears the per-band background values.
    pub fn set_background(&mut self, background: Option<Vec<f64>>) -> &mut Self {
        self.background = background;
        self.invalidate_statistics();
        self
    }

    /// Sets a rendering hint.
    pub fn set_hint(&mut self, key: HintKey, value: HintValue) -> &mut Self {
        self.hints.set(key, value);
        self
    }

    /// Removes a rendering hint.
    pub fn remove_hint(&mut self, key: HintKey) -> &mut Self {
        self.hints.remove(key);
        self
    }

    /// The worker's hint map.
    pub fn hints(&self) -> &RenderHints {
        &self.hints
    }

    /// Balanced tile-cache toggle: `false` increments a disable counter,
    /// `true` decrements it.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidState`] when enabling with a zero counter.
    pub fn tile_cache_enabled(&mut self, status: bool) -> Result<&mut Self> {
        if status {
            if self.tile_cache_disabled == 0 {
                return Err(Error::invalid_state(
                    "tile cache enabled without a matching disable",
                ));
            }
            self.tile_cache_disabled -= 1;
        } else {
            self.tile_cache_disabled += 1;
        }
        Ok(self)
    }

    // =========================================================================
    // Kind-of-image accessors
    // =========================================================================

    /// Number of bands of the current image.
    pub fn num_bands(&self) -> u32 {
        self.image.as_ref().map_or(0, Raster::num_bands)
    }

    /// Returns `true` when every band is stored in 8 bits.
    pub fn is_bytes(&self) -> bool {
        self.image
            .as_ref()
            .is_some_and(|i| i.sample_model().is_bytes())
    }

    /// Returns `true` for single-band bilevel images.
    pub fn is_binary(&self) -> bool {
        self.image
            .as_ref()
            .is_some_and(|i| i.sample_model().is_binary())
    }

    /// Returns `true` when the current color model is indexed.
    pub fn is_indexed(&self) -> bool {
        self.image
            .as_ref()
            .is_some_and(|i| i.color_model().is_indexed())
    }

    /// Returns `true` when the current color space matches.
    pub fn color_space_is(&self, space: ColorSpaceKind) -> bool {
        self.image
            .as_ref()
            .is_some_and(|i| i.color_model().color_space() == space)
    }

    /// Returns `true` when the transparency class is translucent.
    pub fn is_translucent(&self) -> bool {
        self.image
            .as_ref()
            .is_some_and(|i| i.color_model().transparency() == Transparency::Translucent)
    }

    /// The transparent palette index, if the image is indexed and has one.
    pub fn transparent_pixel(&self) -> Option<u32> {
        self.image
            .as_ref()
            .and_then(|i| i.color_model().as_indexed())
            .and_then(|icm| icm.transparent_index)
    }

    /// Wraps the current (binary) image as a raster ROI.
    pub fn image_as_roi(&self) -> Result<Roi> {
        let image = self.require_image()?;
        let buf = image.data()?;
        Ok(Roi::Raster(MaskImage::from_fn(buf.rect(), |x, y| {
            buf.sample(x, y, 0).unwrap_or(0.0) != 0.0
        })))
    }

    // =========================================================================
    // Plumbing shared by the operation modules
    // =========================================================================

    pub(crate) fn require_image(&self) -> Result<Raster> {
        self.image
            .clone()
            .ok_or_else(|| Error::invalid_state("no image set on this worker"))
    }

    pub(crate) fn registry(&self) -> &'static OperationRegistry {
        OperationRegistry::global()
    }

    /// The worker's current pixel policy (ROI, no-data, background).
    pub(crate) fn policy(&self) -> PixelPolicy {
        PixelPolicy::new(self.roi.clone(), self.nodata.clone(), self.background.clone())
    }

    /// Returns `true` when destination no-data handling is required.
    pub(crate) fn is_nodata_needed(&self) -> bool {
        self.roi.is_some() || self.nodata.is_some()
    }

    /// Hints handed to an emitted node: the common hints, plus a null
    /// tile-cache hint while the disable counter is non-zero (unless the
    /// user set an explicit cache).
    pub(crate) fn effective_hints(&self) -> RenderHints {
        let mut hints = self.hints.clone();
        if self.tile_cache_disabled > 0 && !hints.contains(HintKey::TileCache) {
            hints.set(HintKey::TileCache, HintValue::Cache(None));
        }
        hints
    }

    /// As [`Self::effective_hints`], without the user image layout (used
    /// where the op must pin its own layout).
    pub(crate) fn effective_hints_without_layout(&self) -> RenderHints {
        let mut hints = self.effective_hints();
        hints.remove(HintKey::ImageLayout);
        hints
    }

    /// Emits an op node as the new current image and re-attaches the
    /// worker annotations.
    pub(crate) fn emit(&mut self, op: Box<dyn raster_core::ImageOp>) {
        self.emit_with_hints(op, self.effective_hints());
    }

    pub(crate) fn emit_with_hints(
        &mut self,
        op: Box<dyn raster_core::ImageOp>,
        hints: RenderHints,
    ) {
        let node = Raster::from_op(op, &hints);
        self.image = Some(node);
        self.annotate_roi();
        self.annotate_nodata();
    }

    fn annotate_roi(&self) {
        if let Some(image) = &self.image {
            match &self.roi {
                Some(roi) => image.set_property(names::ROI, NodeProperty::Roi(roi.clone())),
                None => {
                    image.remove_property(names::ROI);
                }
            }
        }
    }

    fn annotate_nodata(&self) {
        if let Some(image) = &self.image {
            match &self.nodata {
                Some(nd) => image.set_property(names::GC_NODATA, NodeProperty::NoData(nd.clone())),
                None => {
                    image.remove_property(names::GC_NODATA);
                }
            }
        }
    }

    /// Adopts the `"roi"` property a geometric op produced, clearing the
    /// ROI when the op did not publish one.
    pub(crate) fn adopt_output_roi(&mut self) {
        let adopted = self
            .image
            .as_ref()
            .and_then(|i| i.property(names::OUTPUT_ROI))
            .and_then(|p| p.as_roi().cloned());
        self.roi = adopted;
        self.annotate_roi();
        self.invalidate_statistics();
    }

    /// Re-emits the current image through a pass-through node so the
    /// current hints (layout, caching) apply.
    pub fn null_op(&mut self) -> Result<&mut Self> {
        self.registry().descriptor("Null")?;
        let image = self.require_image()?;
        self.emit(Box::new(NullOp::new(image)));
        Ok(self)
    }

    /// Re-tiles the image according to the layout in the hints.
    pub fn tile(&mut self) -> Result<&mut Self> {
        self.null_op()
    }

    /// Casts the image to a data type through a Format node, converting
    /// the no-data annotation along.
    ///
    /// Casting an indexed image to a different type expands the palette
    /// into components first, unless the `ReplaceIndexColorModel` hint is
    /// set to `false`.
    pub fn format(&mut self, data_type: DataType) -> Result<&mut Self> {
        self.registry().descriptor("Format")?;
        let image = self.require_image()?;
        if image.data_type() == data_type {
            return Ok(self);
        }
        if self.is_indexed() && self.hints.bool_hint(HintKey::ReplaceIndexColorModel, true) {
            self.force_component_color_model()?;
        }
        let image = self.require_image()?;
        self.emit(Box::new(FormatOp::new(image, data_type)));
        let converted = self.nodata.as_ref().map(|r| r.convert(data_type));
        self.set_nodata(converted);
        self.invalidate_statistics();
        Ok(self)
    }

    // =========================================================================
    // Statistics cache
    // =========================================================================

    /// Voids cached statistics: values stored at or below the current
    /// node stop being visible to [`Self::computed_property`].
    pub(crate) fn invalidate_statistics(&mut self) -> &mut Self {
        self.inheritance_stop = self.image.clone();
        self
    }

    /// Walks the first-source chain looking for a property computed above
    /// the inheritance stop point. Values at or below the stop are
    /// undefined (a fresh scan is required).
    pub(crate) fn computed_property(&self, name: &str) -> Option<NodeProperty> {
        let mut cursor = self.image.clone()?;
        loop {
            if self
                .inheritance_stop
                .as_ref()
                .is_some_and(|stop| stop.same_node(&cursor))
            {
                return None;
            }
            if let Some(prop) = cursor.property(name) {
                return Some(prop);
            }
            cursor = cursor.first_source()?;
        }
    }

    fn attach_stats(&mut self, name: &str, prop: NodeProperty) -> Result<()> {
        self.registry().descriptor("Stats")?;
        let image = self.require_image()?;
        let node = NullOp::stats(image, vec![(name.to_string(), prop)]);
        self.emit(Box::new(node));
        Ok(())
    }

    fn extremas(&mut self) -> Result<(Vec<f64>, Vec<f64>)> {
        if let Some(NodeProperty::Extrema { min, max }) = self.computed_property(names::EXTREMA) {
            return Ok((min, max));
        }
        let image = self.require_image()?;
        let (min, max) =
            raster_ops::stats::extrema(&image, self.roi.as_ref(), self.nodata.as_ref(), 1, 1)?;
        self.attach_stats(
            names::EXTREMA,
            NodeProperty::Extrema {
                min: min.clone(),
                max: max.clone(),
            },
        )?;
        Ok((min, max))
    }

    /// Per-band minima, honoring ROI and no-data.
    pub fn get_minimums(&mut self) -> Result<Vec<f64>> {
        Ok(self.extremas()?.0)
    }

    /// Per-band maxima, honoring ROI and no-data.
    pub fn get_maximums(&mut self) -> Result<Vec<f64>> {
        Ok(self.extremas()?.1)
    }

    /// Per-band extrema as `(minimums, maximums)`.
    pub fn get_extrema(&mut self) -> Result<(Vec<f64>, Vec<f64>)> {
        self.extremas()
    }

    /// Per-band mean, honoring ROI and no-data.
    pub fn get_mean(&mut self) -> Result<Vec<f64>> {
        if let Some(NodeProperty::Mean(mean)) = self.computed_property(names::MEAN) {
            return Ok(mean);
        }
        let image = self.require_image()?;
        let mean = raster_ops::stats::mean(&image, self.roi.as_ref(), self.nodata.as_ref(), 1, 1)?;
        self.attach_stats(names::MEAN, NodeProperty::Mean(mean.clone()))?;
        Ok(mean)
    }

    /// Per-band histogram, honoring ROI and no-data. Length-1 parameter
    /// slices broadcast across bands.
    pub fn get_histogram(
        &mut self,
        num_bins: &[u32],
        low: &[f64],
        high: &[f64],
    ) -> Result<Histogram> {
        if let Some(NodeProperty::Histogram(h)) = self.computed_property(names::HISTOGRAM) {
            return Ok(h);
        }
        let image = self.require_image()?;
        let histogram = raster_ops::stats::histogram(
            &image,
            self.roi.as_ref(),
            self.nodata.as_ref(),
            num_bins,
            low,
            high,
        )?;
        self.attach_stats(names::HISTOGRAM, NodeProperty::Histogram(histogram.clone()))?;
        Ok(histogram)
    }

    /// The background as an RGB(A) color, when it holds 3 or 4 components
    /// in the byte range.
    pub(crate) fn background_color(&self) -> Option<(u8, u8, u8)> {
        let bg = self.background.as_ref()?;
        if !(3..=4).contains(&bg.len()) {
            return None;
        }
        if bg.iter().any(|&c| !(0.0..=255.0).contains(&c)) {
            return None;
        }
        Some((bg[0] as u8, bg[1] as u8, bg[2] as u8))
    }
}
