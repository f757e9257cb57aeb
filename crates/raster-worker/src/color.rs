//! Color-model conversion engine.
//!
//! Transitions among paletted, component, packed, grayscale, YCbCr and IHS
//! representations, plus transparency acquisition and removal. Every
//! conversion preserves the bitmask-vs-translucent distinction and
//! converts the no-data annotation when the data type changes.

use raster_core::{
    ColorModel, ColorSpaceKind, ComponentColorModel, DataType, Error, IndexedColorModel,
    PaletteEntry, Raster, Result, Transparency,
};
use raster_ops::{
    AlgebraConstOp, AlgebraOp, BandMergeOp, BandSelectOp, BinarizeOp, ColorConvertOp, ConstantOp,
    ErrorDiffusionOp, FormatOp, LookupOp, LookupTable, Operator, OrderedDitherOp, PixelPolicy,
    ProfileRegistry, RescaleOp, color_cube_216,
};

use crate::worker::Worker;

impl Worker {
    // =========================================================================
    // Rescale to bytes
    // =========================================================================

    /// Rescales the image to 8 bits per band.
    ///
    /// No-op when already bytes. When the per-band extrema (honoring ROI
    /// and no-data) fit `[0, 255]`, a plain Format cast is emitted;
    /// otherwise each band is linearly mapped with
    /// `scale = 255 / (max - min)`. The no-data range is converted to u8.
    pub fn rescale_to_bytes(&mut self) -> Result<&mut Self> {
        if self.is_bytes() {
            return Ok(self);
        }
        // supports 16-bit palettes by expanding them first
        self.force_component_color_model_args(true, true)?;
        if self.is_bytes() {
            return Ok(self);
        }

        let (min, max) = self.get_extrema()?;
        let mut scale = vec![1.0; min.len()];
        let mut offset = vec![0.0; min.len()];
        let mut compute_rescale = false;
        for i in 0..min.len() {
            let delta = max[i] - min[i];
            if delta.abs() > 1e-6 && (max[i] - 255.0 > 1e-6 || min[i] < -1e-6) {
                compute_rescale = true;
                scale[i] = 255.0 / delta;
                offset[i] = -scale[i] * min[i];
            }
        }

        let image = self.require_image()?;
        if compute_rescale {
            self.registry().descriptor("Rescale")?;
            let op = RescaleOp::new(image, scale, offset, DataType::U8, self.policy());
            self.emit(Box::new(op));
        } else {
            // in-range values: rely on the clamping cast
            self.registry().descriptor("Format")?;
            self.emit(Box::new(FormatOp::new(image, DataType::U8)));
        }
        let converted = self.nodata.as_ref().map(|r| r.convert(DataType::U8));
        self.set_nodata(converted);
        self.invalidate_statistics();
        debug_assert!(self.is_bytes());
        Ok(self)
    }

    // =========================================================================
    // Component color model
    // =========================================================================

    /// Forces a component color model with the default flags.
    pub fn force_component_color_model(&mut self) -> Result<&mut Self> {
        self.force_component_color_model_args(false, true)
    }

    /// Forces a component color model.
    ///
    /// Indexed images take the fast path: the palette is materialized into
    /// a lookup table of 1, 2, 3 or 4 destination bands depending on gray
    /// detection and alpha. Packed images are expanded through a Format
    /// node. `check_transparent` skips fully transparent entries during
    /// gray detection; `optimize_gray` enables the 1/2-band output.
    pub fn force_component_color_model_args(
        &mut self,
        check_transparent: bool,
        optimize_gray: bool,
    ) -> Result<&mut Self> {
        let image = self.require_image()?;
        match image.color_model().clone() {
            ColorModel::Component(_) => Ok(self),
            ColorModel::Indexed(icm) => {
                let data_type = image.data_type();
                if !matches!(data_type, DataType::U8 | DataType::U16) {
                    return Err(Error::illegal_argument("datatype", data_type.to_string()));
                }
                let gray = icm.is_gray_palette(check_transparent) && optimize_gray;
                let alpha = icm.has_alpha();
                let dest_bands = if gray {
                    if alpha { 2 } else { 1 }
                } else if alpha {
                    4
                } else {
                    3
                };

                let map_size = icm.map_size();
                let mut tables: Vec<Vec<f64>> = vec![Vec::with_capacity(map_size); dest_bands];
                for i in 0..map_size {
                    let entry = icm.rgba(i);
                    tables[0].push(entry.r as f64);
                    if dest_bands >= 2 {
                        // gray palettes carry alpha in band 1
                        let band1 = if gray { entry.a } else { entry.g };
                        tables[1].push(band1 as f64);
                    }
                    if dest_bands >= 3 {
                        tables[2].push(entry.b as f64);
                    }
                    if dest_bands == 4 {
                        tables[3].push(entry.a as f64);
                    }
                }

                let space = if dest_bands >= 3 {
                    ColorSpaceKind::Srgb
                } else {
                    ColorSpaceKind::Gray
                };
                let mut ccm = ComponentColorModel::new(space, data_type, alpha);
                ccm.transparency = if alpha {
                    Transparency::Translucent
                } else {
                    Transparency::Opaque
                };

                self.registry().descriptor("Lookup")?;
                let op = LookupOp::with_color_model(
                    image,
                    LookupTable::new(tables, data_type),
                    self.policy(),
                    ColorModel::Component(ccm),
                );
                self.emit(Box::new(op));
                self.invalidate_statistics();
                Ok(self)
            }
            ColorModel::Packed(packed) => {
                self.registry().descriptor("Format")?;
                let ccm = ComponentColorModel::new(
                    ColorSpaceKind::Srgb,
                    DataType::U8,
                    packed.has_alpha,
                );
                let op = FormatOp::with_color_model(
                    image,
                    DataType::U8,
                    ColorModel::Component(ccm),
                );
                self.emit(Box::new(op));
                let converted = self.nodata.as_ref().map(|r| r.convert(DataType::U8));
                self.set_nodata(converted);
                self.invalidate_statistics();
                Ok(self)
            }
        }
    }

    // =========================================================================
    // Color spaces
    // =========================================================================

    /// Installs an sRGB component color model.
    pub fn force_color_space_rgb(&mut self) -> Result<&mut Self> {
        self.force_color_space(ColorSpaceKind::Srgb)
    }

    /// Installs a grayscale component color model.
    pub fn force_color_space_gray(&mut self) -> Result<&mut Self> {
        self.force_color_space(ColorSpaceKind::Gray)
    }

    /// Installs a YCbCr component color model.
    ///
    /// # Errors
    ///
    /// [`Error::ProfileUnavailable`] when no YCbCr profile is registered.
    pub fn force_color_space_ycbcr(&mut self) -> Result<&mut Self> {
        self.force_color_space(ColorSpaceKind::YCbCr)
    }

    /// Installs an IHS component color model.
    pub fn force_color_space_ihs(&mut self) -> Result<&mut Self> {
        self.force_color_space(ColorSpaceKind::Ihs)
    }

    fn force_color_space(&mut self, space: ColorSpaceKind) -> Result<&mut Self> {
        ProfileRegistry::global().require(space)?;
        if self.color_space_is(space) && !self.is_indexed() {
            return Ok(self);
        }
        self.force_component_color_model()?;
        if self.color_space_is(space) {
            return Ok(self);
        }
        self.registry().descriptor("ColorConvert")?;
        let image = self.require_image()?;
        let has_alpha = image.color_model().has_alpha();
        let target = ComponentColorModel::new(space, image.data_type(), has_alpha);
        let op = ColorConvertOp::new(image, target)?;
        self.emit(Box::new(op));
        self.invalidate_statistics();
        Ok(self)
    }

    // =========================================================================
    // Indexed color models
    // =========================================================================

    /// Reduces the image to an indexed color model by dithering against
    /// the fixed 216-color cube. No-op when already indexed. Alpha is
    /// dropped when the band count is even.
    pub fn force_index_color_model(&mut self, error_diffusion: bool) -> Result<&mut Self> {
        if self.is_indexed() {
            return Ok(self);
        }
        self.force_component_color_model()?;
        self.rescale_to_bytes()?;
        let bands = self.num_bands();
        if bands % 2 == 0 {
            // drop the alpha band, transparency is resolved separately
            self.retain_bands(bands - 1)?;
        }
        if self.num_bands() == 1 {
            // replicate gray into RGB through a broadcast lookup
            self.registry().descriptor("Lookup")?;
            let image = self.require_image()?;
            let identity: Vec<f64> = (0..256).map(f64::from).collect();
            let op = LookupOp::new(
                image,
                LookupTable::new(vec![identity.clone(), identity.clone(), identity], DataType::U8),
                self.policy(),
            );
            self.emit(Box::new(op));
        }

        let image = self.require_image()?;
        let palette = color_cube_216();
        if error_diffusion {
            self.registry().descriptor("ErrorDiffusion")?;
            self.emit(Box::new(ErrorDiffusionOp::new(image, palette, self.policy())?));
        } else {
            self.registry().descriptor("OrderedDither")?;
            self.emit(Box::new(OrderedDitherOp::new(image, palette, self.policy())?));
        }
        self.invalidate_statistics();
        Ok(self)
    }

    /// Forces an indexed model whose transparency is opaque or bitmask,
    /// using the default transparent slot 255.
    pub fn force_bitmask_index_color_model(&mut self) -> Result<&mut Self> {
        self.force_bitmask_index_color_model_with(255, true)
    }

    /// Forces an indexed model whose transparency is opaque or bitmask.
    ///
    /// Translucent palettes are folded: every alpha-0 entry maps onto the
    /// suggested transparent index. Component sources with alpha split the
    /// alpha band off, index the color bands, and reattach the
    /// transparency mask.
    pub fn force_bitmask_index_color_model_with(
        &mut self,
        suggested_transparent: u32,
        error_diffusion: bool,
    ) -> Result<&mut Self> {
        let image = self.require_image()?;
        match image.color_model().clone() {
            ColorModel::Indexed(icm) => match icm.transparency {
                Transparency::Opaque | Transparency::Bitmask => Ok(self),
                Transparency::Translucent => {
                    self.fold_translucent_palette(&icm, suggested_transparent)
                }
            },
            ColorModel::Component(ccm) if ccm.has_alpha => {
                self.registry().descriptor("BandSelect")?;
                let bands = image.num_bands();
                let alpha_op = BandSelectOp::new(image.clone(), vec![bands - 1])?;
                let alpha =
                    Raster::from_op(Box::new(alpha_op), &self.effective_hints());
                self.retain_bands(bands - 1)?;
                self.force_index_color_model(error_diffusion)?;
                self.add_transparency_to_index(&alpha, false, suggested_transparent, error_diffusion)
            }
            ColorModel::Component(_) => self.force_index_color_model(error_diffusion),
            ColorModel::Packed(_) => {
                self.force_component_color_model()?;
                self.force_bitmask_index_color_model_with(suggested_transparent, error_diffusion)
            }
        }
    }

    /// Folds the alpha-0 entries of a translucent palette onto a single
    /// transparent index through a sample lookup.
    fn fold_translucent_palette(
        &mut self,
        icm: &IndexedColorModel,
        suggested_transparent: u32,
    ) -> Result<&mut Self> {
        let map_size = icm.map_size().max(suggested_transparent as usize + 1);
        if map_size > (1usize << icm.bits) {
            return Err(Error::illegal_argument(
                "suggested_transparent",
                suggested_transparent.to_string(),
            ));
        }
        let mut row = Vec::with_capacity(icm.map_size());
        let mut map = Vec::with_capacity(map_size);
        for i in 0..icm.map_size() {
            let entry = icm.rgba(i);
            row.push(if entry.a == 0 {
                suggested_transparent as f64
            } else {
                i as f64
            });
            map.push(PaletteEntry::opaque(entry.r, entry.g, entry.b));
        }
        map.resize(map_size, PaletteEntry::opaque(0, 0, 0));

        let folded = IndexedColorModel::new(
            icm.bits,
            map,
            Some(suggested_transparent),
            Transparency::Bitmask,
        )?;
        self.registry().descriptor("Lookup")?;
        let image = self.require_image()?;
        let op = LookupOp::with_color_model(
            image,
            LookupTable::new(vec![row], icm.data_type()),
            self.policy(),
            ColorModel::Indexed(folded),
        );
        self.emit(Box::new(op));
        self.invalidate_statistics();
        Ok(self)
    }

    /// GIF preconditioning: translucent images become bitmask-indexed at
    /// slot 255, everything else is plain-indexed against the 216 cube.
    pub fn force_index_color_model_for_gif(&mut self, error_diffusion: bool) -> Result<&mut Self> {
        if self.is_translucent() {
            self.force_bitmask_index_color_model_with(255, error_diffusion)
        } else {
            self.force_index_color_model(error_diffusion)
        }
    }

    // =========================================================================
    // Transparency acquisition
    // =========================================================================

    /// Rewrites the palette of the (indexed) current image so that pixels
    /// where `alpha_mask` is zero map to `transparent_index`, growing the
    /// palette when the slot lies past its end.
    ///
    /// With `translucent` set the palette keeps per-entry alpha; otherwise
    /// the single transparent index is installed with bitmask
    /// transparency.
    pub fn add_transparency_to_index(
        &mut self,
        alpha_mask: &Raster,
        translucent: bool,
        transparent_index: u32,
        _error_diffusion: bool,
    ) -> Result<&mut Self> {
        let image = self.require_image()?;
        let icm = image
            .color_model()
            .as_indexed()
            .cloned()
            .ok_or_else(|| Error::invalid_state("add_transparency_to_index needs an indexed image"))?;

        let map_size = icm.map_size().max(transparent_index as usize + 1);
        if map_size > 65536 || map_size > (1usize << icm.bits) {
            return Err(Error::illegal_argument(
                "transparent_index",
                transparent_index.to_string(),
            ));
        }
        let mut map: Vec<PaletteEntry> = (0..map_size)
            .map(|i| {
                if i < icm.map_size() {
                    icm.rgba(i)
                } else {
                    PaletteEntry::opaque(0, 0, 0)
                }
            })
            .collect();
        let new_cm = if translucent {
            map[transparent_index as usize].a = 0;
            IndexedColorModel::new(icm.bits, map, Some(transparent_index), Transparency::Translucent)?
        } else {
            for entry in &mut map {
                entry.a = 255;
            }
            IndexedColorModel::new(icm.bits, map, Some(transparent_index), Transparency::Bitmask)?
        };

        // index' = (index - t) * mask01 + t, computed in i32 to avoid
        // clamping, then cast back under the widened palette
        self.registry().descriptor("Binarize")?;
        self.registry().descriptor("Algebra")?;
        let hints = self.effective_hints();
        let mask01 = Raster::from_op(
            Box::new(BinarizeOp::new(alpha_mask.clone(), 0.5, PixelPolicy::none())),
            &hints,
        );
        let wide = Raster::from_op(
            Box::new(FormatOp::new(image, DataType::I32)),
            &hints,
        );
        let t = transparent_index as f64;
        let shifted = Raster::from_op(
            Box::new(AlgebraConstOp::new(
                Operator::Subtract,
                wide,
                vec![t],
                PixelPolicy::none(),
            )?),
            &hints,
        );
        let masked = Raster::from_op(
            Box::new(AlgebraOp::new(
                Operator::Multiply,
                vec![shifted, mask01],
                vec![],
                PixelPolicy::none(),
            )?),
            &hints,
        );
        let restored = Raster::from_op(
            Box::new(AlgebraConstOp::new(
                Operator::Add,
                masked,
                vec![t],
                PixelPolicy::none(),
            )?),
            &hints,
        );
        let op = FormatOp::with_color_model(restored, icm.data_type(), ColorModel::Indexed(new_cm));
        self.emit(Box::new(op));
        self.invalidate_statistics();
        Ok(self)
    }

    /// Replaces every occurrence of the given opaque color by a fully
    /// transparent representation.
    ///
    /// Indexed images rewrite their palette only (the pixel data is
    /// untouched); 8-bit component images derive an alpha band.
    pub fn make_color_transparent(&mut self, color: (u8, u8, u8)) -> Result<&mut Self> {
        let image = self.require_image()?;
        match image.color_model().clone() {
            ColorModel::Indexed(icm) => self.mask_index_color_model(&icm, color),
            ColorModel::Component(ccm) => {
                if ccm.data_type != DataType::U8 {
                    return Err(Error::UnsupportedDataType(ccm.data_type.to_string()));
                }
                self.mask_component_byte(color)
            }
            other => Err(Error::UnsupportedColorModel(other.kind_name().to_string())),
        }
    }

    fn mask_index_color_model(
        &mut self,
        icm: &IndexedColorModel,
        color: (u8, u8, u8),
    ) -> Result<&mut Self> {
        let (r, g, b) = color;
        // already transparent at exactly this color
        if icm.transparency == Transparency::Bitmask {
            if let Some(idx) = icm.transparent_index {
                let entry = icm.map[idx as usize];
                if (entry.r, entry.g, entry.b) == color {
                    return Ok(self);
                }
            }
        }

        let matches: Vec<usize> = icm
            .map
            .iter()
            .enumerate()
            .filter(|(_, e)| e.r == r && e.g == g && e.b == b)
            .map(|(i, _)| i)
            .collect();
        let new_cm = match matches.len() {
            0 => return Ok(self),
            1 => IndexedColorModel::new(
                icm.bits,
                icm.map.clone(),
                Some(matches[0] as u32),
                Transparency::Bitmask,
            )?,
            _ => {
                let mut map = icm.map.clone();
                for &i in &matches {
                    map[i].a = 0;
                }
                IndexedColorModel::new(icm.bits, map, None, Transparency::Translucent)?
            }
        };

        // palette-only rewrite: identity format keeps the data buffer
        self.registry().descriptor("Format")?;
        let image = self.require_image()?;
        let data_type = image.data_type();
        let op = FormatOp::with_color_model(image, data_type, ColorModel::Indexed(new_cm));
        self.emit(Box::new(op));
        let converted = self.nodata.as_ref().map(|rng| rng.convert(data_type));
        self.set_nodata(converted);
        self.invalidate_statistics();
        Ok(self)
    }

    /// Derives an alpha band that is 0 exactly where the pixel equals the
    /// color: per-band match masks (0 on match, 255 otherwise) summed with
    /// clamping, then merged as the alpha channel.
    fn mask_component_byte(&mut self, color: (u8, u8, u8)) -> Result<&mut Self> {
        self.registry().descriptor("Lookup")?;
        self.registry().descriptor("BandMerge")?;
        let image = self.require_image()?;
        let color_bands = if image.color_model().has_alpha() {
            // incoming transparency is replaced by the mask
            let keep = image.num_bands() - 1;
            self.retain_bands(keep)?;
            self.require_image()?
        } else {
            image
        };
        let bands = color_bands.num_bands().min(3);
        let key = [color.0, color.1, color.2];
        let tables: Vec<Vec<f64>> = (0..bands)
            .map(|b| {
                (0..256u32)
                    .map(|i| if i == key[b as usize] as u32 { 0.0 } else { 255.0 })
                    .collect()
            })
            .collect();
        let hints = self.effective_hints();
        let match_masks = Raster::from_op(
            Box::new(LookupOp::new(
                color_bands.clone(),
                LookupTable::new(tables, DataType::U8),
                PixelPolicy::none(),
            )),
            &hints,
        );
        // u8 clamp turns any non-zero sum into opaque coverage
        let mut sum_row = vec![vec![0.0; bands as usize + 1]];
        for b in 0..bands {
            sum_row[0][b as usize] = 1.0;
        }
        let alpha = Raster::from_op(
            Box::new(raster_ops::BandCombineOp::new(
                match_masks,
                sum_row,
                PixelPolicy::none(),
            )?),
            &hints,
        );
        let op = BandMergeOp::new(
            vec![color_bands, alpha],
            vec![self.nodata.clone(), None],
            None,
            true,
            self.policy(),
        )?;
        self.emit(Box::new(op));
        self.invalidate_statistics();
        Ok(self)
    }

    // =========================================================================
    // Opacity
    // =========================================================================

    /// Multiplies the image's alpha by `opacity`.
    ///
    /// Indexed images rewrite palette alphas only (pixel data untouched);
    /// component images without alpha gain a constant alpha band;
    /// component images with alpha pass through an alpha-scaling lookup.
    pub fn apply_opacity(&mut self, opacity: f32) -> Result<&mut Self> {
        if !(0.0..=1.0).contains(&opacity) {
            return Err(Error::illegal_argument("opacity", opacity.to_string()));
        }
        let image = self.require_image()?;
        let on_colormap = self
            .hints()
            .bool_hint(raster_core::HintKey::TransformOnColormap, true);
        match image.color_model().clone() {
            ColorModel::Indexed(icm) if on_colormap => {
                let transparent = icm.transparent_index;
                let map: Vec<PaletteEntry> = icm
                    .map
                    .iter()
                    .enumerate()
                    .map(|(i, e)| {
                        let mut entry = *e;
                        entry.a = if transparent == Some(i as u32) {
                            0
                        } else {
                            (e.a as f32 * opacity).round() as u8
                        };
                        entry
                    })
                    .collect();
                let new_cm =
                    IndexedColorModel::new(icm.bits, map, transparent, Transparency::Translucent)?;
                self.registry().descriptor("Format")?;
                let data_type = image.data_type();
                let op =
                    FormatOp::with_color_model(image, data_type, ColorModel::Indexed(new_cm));
                self.emit(Box::new(op));
                self.invalidate_statistics();
                Ok(self)
            }
            _ => {
                self.force_component_color_model()?;
                self.rescale_to_bytes()?;
                let image = self.require_image()?;
                if !image.color_model().has_alpha() {
                    self.registry().descriptor("BandMerge")?;
                    let alpha_value = (255.0 * opacity as f64).round();
                    let alpha = Raster::from_op(
                        Box::new(ConstantOp::new(
                            image.bounds(),
                            vec![alpha_value],
                            DataType::U8,
                            ColorModel::Component(ComponentColorModel::new(
                                ColorSpaceKind::Gray,
                                DataType::U8,
                                false,
                            )),
                        )),
                        &self.effective_hints(),
                    );
                    let op = BandMergeOp::new(
                        vec![image, alpha],
                        vec![self.nodata.clone(), None],
                        None,
                        true,
                        self.policy(),
                    )?;
                    self.emit(Box::new(op));
                } else {
                    self.registry().descriptor("Lookup")?;
                    let bands = image.num_bands();
                    let table = LookupTable::identity_bytes_with(bands, Some(bands - 1), |i| {
                        (i as f32 * opacity).round() as f64
                    });
                    let cm = image.color_model().clone();
                    let op = LookupOp::with_color_model(image, table, self.policy(), cm);
                    self.emit(Box::new(op));
                }
                self.invalidate_statistics();
                Ok(self)
            }
        }
    }

    // =========================================================================
    // Binarize
    // =========================================================================

    /// Binarizes at the midpoint of the band-0 extrema.
    pub fn binarize(&mut self) -> Result<&mut Self> {
        let (min, max) = self.get_extrema()?;
        let threshold = (min[0] + max[0]) / 2.0;
        self.binarize_threshold(threshold)
    }

    /// Binarizes band 0 at the given threshold. No-op when already
    /// bilevel.
    pub fn binarize_threshold(&mut self, threshold: f64) -> Result<&mut Self> {
        if self.is_binary() {
            return Ok(self);
        }
        self.registry().descriptor("Binarize")?;
        let image = self.require_image()?;
        self.emit(Box::new(BinarizeOp::new(image, threshold, self.policy())));
        self.invalidate_statistics();
        Ok(self)
    }

    /// Maps a bilevel image onto two byte values: 0 to `value0`, 1 to
    /// `value1`.
    pub fn binarize_values(&mut self, value0: u8, value1: u8) -> Result<&mut Self> {
        self.binarize()?;
        self.registry().descriptor("Lookup")?;
        let image = self.require_image()?;
        let table = LookupTable::new(vec![vec![value0 as f64, value1 as f64]], DataType::U8);
        self.emit(Box::new(LookupOp::new(image, table, self.policy())));
        self.invalidate_statistics();
        Ok(self)
    }
}
