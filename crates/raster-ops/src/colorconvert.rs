//! Color space conversion and the color profile registry.
//!
//! [`ColorConvertOp`] rewrites component images between sRGB, grayscale,
//! YCbCr and IHS through an RGB intermediate, working on values normalized
//! to the source data type's range. Conversions that need profile data
//! (YCbCr, IHS) must find it in the process-wide [`ProfileRegistry`];
//! lookup failure yields [`Error::ProfileUnavailable`] at the emitting
//! call.

use std::any::Any;
use std::collections::HashSet;
use std::sync::OnceLock;

use raster_core::{
    ColorModel, ColorSpaceKind, ComponentColorModel, Error, ImageOp, PixelBuffer, Raster, Rect,
    Result, SampleModel, color::luminance,
};

/// Process-wide registry of available color profiles.
///
/// Built-in profiles for YCbCr and IHS are registered at startup; sRGB and
/// grayscale need none.
pub struct ProfileRegistry {
    available: HashSet<&'static str>,
}

impl ProfileRegistry {
    fn with_builtins() -> Self {
        let mut available = HashSet::new();
        available.insert(ColorSpaceKind::YCbCr.name());
        available.insert(ColorSpaceKind::Ihs.name());
        Self { available }
    }

    /// The global registry.
    pub fn global() -> &'static ProfileRegistry {
        static INSTANCE: OnceLock<ProfileRegistry> = OnceLock::new();
        INSTANCE.get_or_init(ProfileRegistry::with_builtins)
    }

    /// Best-effort probe for a profile; `None` when unavailable.
    pub fn try_probe(&self, space: ColorSpaceKind) -> Option<ColorSpaceKind> {
        match space {
            ColorSpaceKind::Srgb | ColorSpaceKind::Gray => Some(space),
            _ if self.available.contains(space.name()) => Some(space),
            _ => None,
        }
    }

    /// Probe that fails with [`Error::ProfileUnavailable`].
    pub fn require(&self, space: ColorSpaceKind) -> Result<ColorSpaceKind> {
        self.try_probe(space)
            .ok_or_else(|| Error::ProfileUnavailable(space.name().to_string()))
    }
}

/// BT.601 RGB (normalized) to YCbCr (normalized, chroma centered at 0.5).
fn rgb_to_ycbcr(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    (
        0.299 * r + 0.587 * g + 0.114 * b,
        0.5 - 0.168736 * r - 0.331264 * g + 0.5 * b,
        0.5 + 0.5 * r - 0.418688 * g - 0.081312 * b,
    )
}

fn ycbcr_to_rgb(y: f64, cb: f64, cr: f64) -> (f64, f64, f64) {
    let cb = cb - 0.5;
    let cr = cr - 0.5;
    (
        y + 1.402 * cr,
        y - 0.344136 * cb - 0.714136 * cr,
        y + 1.772 * cb,
    )
}

/// RGB to intensity / hue / saturation, all normalized.
fn rgb_to_ihs(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let i = (max + min) / 2.0;
    let delta = max - min;
    if delta < 1e-12 {
        return (i, 0.0, 0.0);
    }
    let s = if i <= 0.5 {
        delta / (max + min)
    } else {
        delta / (2.0 - max - min)
    };
    let h = if max == r {
        ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    } / 6.0;
    (i, h, s)
}

fn ihs_to_rgb(i: f64, h: f64, s: f64) -> (f64, f64, f64) {
    if s < 1e-12 {
        return (i, i, i);
    }
    let q = if i < 0.5 { i * (1.0 + s) } else { i + s - i * s };
    let p = 2.0 * i - q;
    let hue = |mut t: f64| -> f64 {
        t = t.rem_euclid(1.0);
        if t < 1.0 / 6.0 {
            p + (q - p) * 6.0 * t
        } else if t < 0.5 {
            q
        } else if t < 2.0 / 3.0 {
            p + (q - p) * (2.0 / 3.0 - t) * 6.0
        } else {
            p
        }
    };
    (hue(h + 1.0 / 3.0), hue(h), hue(h - 1.0 / 3.0))
}

/// Converts a component image into another color space.
pub struct ColorConvertOp {
    sources: Vec<Raster>,
    target: ComponentColorModel,
}

impl ColorConvertOp {
    /// Creates a conversion to `target`.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedColorModel`] when the source is not a component
    /// image (palettes are expanded by the caller first).
    pub fn new(source: Raster, target: ComponentColorModel) -> Result<Self> {
        if !source.color_model().is_component() {
            return Err(Error::UnsupportedColorModel(
                source.color_model().kind_name().to_string(),
            ));
        }
        Ok(Self {
            sources: vec![source],
            target,
        })
    }
}

impl ImageOp for ColorConvertOp {
    fn name(&self) -> &'static str {
        "ColorConvert"
    }

    fn sources(&self) -> &[Raster] {
        &self.sources
    }

    fn bounds(&self) -> Rect {
        self.sources[0].bounds()
    }

    fn sample_model(&self) -> SampleModel {
        SampleModel::new(self.target.data_type, self.target.num_bands())
    }

    fn color_model(&self) -> ColorModel {
        ColorModel::Component(self.target.clone())
    }

    fn compute(&self) -> Result<PixelBuffer> {
        let src = self.sources[0].data()?;
        let src_space = self.sources[0].color_model().color_space();
        let src_alpha = self.sources[0].color_model().has_alpha();
        let src_color_bands = src.num_bands() - src_alpha as u32;
        let src_max = if src.data_type().is_floating() {
            1.0
        } else {
            src.data_type().max_value()
        };
        let dst_max = if self.target.data_type.is_floating() {
            1.0
        } else {
            self.target.data_type.max_value()
        };
        let dst_color_bands = self.target.color_space.num_components();
        let dst_type = self.target.data_type;
        let dst_space = self.target.color_space;

        Ok(PixelBuffer::from_fn(
            src.rect(),
            self.target.num_bands(),
            dst_type,
            |x, y, band| {
                // alpha passes through unconverted
                if self.target.has_alpha && band == dst_color_bands {
                    let a = if src_alpha {
                        src.sample(x, y, src_color_bands).unwrap_or(0.0) / src_max
                    } else {
                        1.0
                    };
                    return dst_type.clamp(a * dst_max);
                }
                let fetch = |b: u32| src.sample(x, y, b.min(src_color_bands - 1)).unwrap_or(0.0) / src_max;
                let (r, g, b) = match src_space {
                    ColorSpaceKind::Gray => {
                        let v = fetch(0);
                        (v, v, v)
                    }
                    ColorSpaceKind::YCbCr => ycbcr_to_rgb(fetch(0), fetch(1), fetch(2)),
                    ColorSpaceKind::Ihs => ihs_to_rgb(fetch(0), fetch(1), fetch(2)),
                    _ => (fetch(0), fetch(1), fetch(2)),
                };
                let out = match dst_space {
                    ColorSpaceKind::Gray => [luminance(r, g, b), 0.0, 0.0],
                    ColorSpaceKind::YCbCr => {
                        let (a, bb, c) = rgb_to_ycbcr(r, g, b);
                        [a, bb, c]
                    }
                    ColorSpaceKind::Ihs => {
                        let (a, bb, c) = rgb_to_ihs(r, g, b);
                        [a, bb, c]
                    }
                    _ => [r, g, b],
                };
                dst_type.clamp(out[(band as usize).min(2)] * dst_max)
            },
        ))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use raster_core::{DataType, RenderHints};

    fn rgb_pixel(r: u8, g: u8, b: u8) -> Raster {
        let buf = PixelBuffer::from_fn(Rect::from_size(1, 1), 3, DataType::U8, |_, _, band| {
            [r, g, b][band as usize] as f64
        });
        Raster::from_buffer_component(buf)
    }

    #[test]
    fn test_profile_registry() {
        let registry = ProfileRegistry::global();
        assert!(registry.require(ColorSpaceKind::YCbCr).is_ok());
        assert!(registry.require(ColorSpaceKind::Srgb).is_ok());
        let err = registry.require(ColorSpaceKind::Bogus(5));
        assert!(matches!(err, Err(Error::ProfileUnavailable(_))));
    }

    #[test]
    fn test_rgb_gray_roundtrip_on_neutral() {
        let src = rgb_pixel(128, 128, 128);
        let op = ColorConvertOp::new(
            src,
            ComponentColorModel::new(ColorSpaceKind::Gray, DataType::U8, false),
        )
        .unwrap();
        let node = Raster::from_op(Box::new(op), &RenderHints::new());
        assert_eq!(node.num_bands(), 1);
        assert_relative_eq!(node.sample(0, 0, 0).unwrap(), 128.0, epsilon = 1.0);
    }

    #[test]
    fn test_ycbcr_roundtrip() {
        let (y, cb, cr) = rgb_to_ycbcr(0.8, 0.2, 0.4);
        let (r, g, b) = ycbcr_to_rgb(y, cb, cr);
        assert_relative_eq!(r, 0.8, epsilon = 1e-6);
        assert_relative_eq!(g, 0.2, epsilon = 1e-6);
        assert_relative_eq!(b, 0.4, epsilon = 1e-6);
    }

    #[test]
    fn test_ihs_roundtrip() {
        let (i, h, s) = rgb_to_ihs(0.9, 0.3, 0.1);
        let (r, g, b) = ihs_to_rgb(i, h, s);
        assert_relative_eq!(r, 0.9, epsilon = 1e-6);
        assert_relative_eq!(g, 0.3, epsilon = 1e-6);
        assert_relative_eq!(b, 0.1, epsilon = 1e-6);
    }

    #[test]
    fn test_convert_rejects_indexed() {
        use raster_core::{IndexedColorModel, PaletteEntry, Transparency};
        let palette = IndexedColorModel::new(
            8,
            vec![PaletteEntry::opaque(0, 0, 0)],
            None,
            Transparency::Opaque,
        )
        .unwrap();
        let buf = PixelBuffer::zeroed(Rect::from_size(1, 1), 1, DataType::U8);
        let src = Raster::from_buffer(buf, ColorModel::Indexed(palette));
        let err = ColorConvertOp::new(
            src,
            ComponentColorModel::new(ColorSpaceKind::Srgb, DataType::U8, false),
        );
        assert!(matches!(err, Err(Error::UnsupportedColorModel(_))));
    }
}
