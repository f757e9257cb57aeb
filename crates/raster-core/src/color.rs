//! Color models: how sample tuples map to displayable color.
//!
//! Three families are supported:
//!
//! - [`IndexedColorModel`] - samples are indices into a palette
//! - [`ComponentColorModel`] - N direct bands in a color space
//! - [`PackedColorModel`] - a single integer sample packing RGB(A)
//!
//! The worker's conversion engine moves images between these families while
//! preserving transparency semantics ([`Transparency::Bitmask`] vs
//! [`Transparency::Translucent`]).

use crate::datatype::DataType;
use crate::error::{Error, Result};

/// Rec.709 luma weight for red.
pub const REC709_LUMA_R: f64 = 0.2126;
/// Rec.709 luma weight for green.
pub const REC709_LUMA_G: f64 = 0.7152;
/// Rec.709 luma weight for blue.
pub const REC709_LUMA_B: f64 = 0.0722;

/// Transparency class of a color model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Transparency {
    /// Every pixel is fully opaque.
    #[default]
    Opaque,
    /// Pixels are either fully opaque or fully transparent.
    Bitmask,
    /// Pixels may carry any alpha value.
    Translucent,
}

/// Color space interpretation for component models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorSpaceKind {
    /// Standard RGB.
    Srgb,
    /// Single-channel grayscale.
    Gray,
    /// Luma / blue-difference / red-difference.
    YCbCr,
    /// Intensity / hue / saturation.
    Ihs,
    /// An uninterpreted N-component space.
    Bogus(u8),
}

impl ColorSpaceKind {
    /// Number of color components (alpha excluded).
    #[inline]
    pub const fn num_components(self) -> u32 {
        match self {
            Self::Gray => 1,
            Self::Srgb | Self::YCbCr | Self::Ihs => 3,
            Self::Bogus(n) => n as u32,
        }
    }

    /// Short name used in error messages.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Srgb => "sRGB",
            Self::Gray => "Gray",
            Self::YCbCr => "YCbCr",
            Self::Ihs => "IHS",
            Self::Bogus(_) => "BogusN",
        }
    }
}

/// One palette slot: red, green, blue, alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteEntry {
    /// Red component.
    pub r: u8,
    /// Green component.
    pub g: u8,
    /// Blue component.
    pub b: u8,
    /// Alpha component (255 = opaque).
    pub a: u8,
}

impl PaletteEntry {
    /// An opaque entry.
    #[inline]
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Packed 0xRRGGBB value, alpha dropped.
    #[inline]
    pub const fn rgb(&self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }
}

/// A paletted (indexed) color model.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedColorModel {
    /// Bits per sample, one of 1, 2, 4, 8, 16.
    pub bits: u8,
    /// The color map; at most `2^bits` entries.
    pub map: Vec<PaletteEntry>,
    /// Index rendered fully transparent under bitmask transparency.
    pub transparent_index: Option<u32>,
    /// Transparency class.
    pub transparency: Transparency,
}

impl IndexedColorModel {
    /// Creates an indexed model, validating the palette size invariant
    /// `map.len() <= 2^bits <= 65536`.
    pub fn new(
        bits: u8,
        map: Vec<PaletteEntry>,
        transparent_index: Option<u32>,
        transparency: Transparency,
    ) -> Result<Self> {
        if !matches!(bits, 1 | 2 | 4 | 8 | 16) {
            return Err(Error::illegal_argument("bits", bits.to_string()));
        }
        let capacity = 1usize << bits;
        if map.len() > capacity || map.len() > 65536 {
            return Err(Error::illegal_argument(
                "palette",
                format!("{} entries for {} bits", map.len(), bits),
            ));
        }
        if let Some(idx) = transparent_index {
            if idx as usize >= map.len() {
                return Err(Error::illegal_argument("transparent_index", idx.to_string()));
            }
        }
        Ok(Self {
            bits,
            map,
            transparent_index,
            transparency,
        })
    }

    /// An opaque model from plain RGB entries.
    pub fn from_rgb(bits: u8, map: Vec<PaletteEntry>) -> Result<Self> {
        Self::new(bits, map, None, Transparency::Opaque)
    }

    /// Number of palette entries.
    #[inline]
    pub fn map_size(&self) -> usize {
        self.map.len()
    }

    /// Sample data type matching the palette depth.
    #[inline]
    pub fn data_type(&self) -> DataType {
        match self.bits {
            1 => DataType::U1,
            16 => DataType::U16,
            _ => DataType::U8,
        }
    }

    /// RGBA of a palette slot, honoring the transparent index.
    pub fn rgba(&self, index: usize) -> PaletteEntry {
        let mut entry = self.map.get(index).copied().unwrap_or(PaletteEntry::opaque(0, 0, 0));
        if self.transparent_index == Some(index as u32) {
            entry.a = 0;
        }
        entry
    }

    /// Returns `true` if any entry is not fully opaque.
    pub fn has_alpha(&self) -> bool {
        self.transparent_index.is_some() || self.map.iter().any(|e| e.a != 255)
    }

    /// Returns `true` if the palette is a pure gray ramp.
    ///
    /// With `check_transparent` set, fully transparent entries are ignored
    /// during the check (they carry no visible color).
    pub fn is_gray_palette(&self, check_transparent: bool) -> bool {
        self.map.iter().enumerate().all(|(i, e)| {
            if check_transparent && self.rgba(i).a == 0 {
                return true;
            }
            e.r == e.g && e.g == e.b
        })
    }

    /// Index of the first entry with exactly this opaque color.
    pub fn find_color(&self, r: u8, g: u8, b: u8) -> Option<usize> {
        self.map
            .iter()
            .position(|e| e.r == r && e.g == g && e.b == b)
    }

    /// Index of the entry closest to the color in RGB distance.
    pub fn nearest_color(&self, r: u8, g: u8, b: u8) -> Option<usize> {
        let dist = |e: &PaletteEntry| -> i64 {
            let dr = e.r as i64 - r as i64;
            let dg = e.g as i64 - g as i64;
            let db = e.b as i64 - b as i64;
            dr * dr + dg * dg + db * db
        };
        self.map
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| dist(e))
            .map(|(i, _)| i)
    }
}

/// A direct N-band color model.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentColorModel {
    /// Color space interpretation.
    pub color_space: ColorSpaceKind,
    /// Sample data type of each band.
    pub data_type: DataType,
    /// Whether the last band carries alpha.
    pub has_alpha: bool,
    /// Whether color bands are premultiplied by alpha.
    pub alpha_premultiplied: bool,
    /// Transparency class.
    pub transparency: Transparency,
}

impl ComponentColorModel {
    /// Creates a component model; alpha implies translucent transparency.
    pub fn new(color_space: ColorSpaceKind, data_type: DataType, has_alpha: bool) -> Self {
        Self {
            color_space,
            data_type,
            has_alpha,
            alpha_premultiplied: false,
            transparency: if has_alpha {
                Transparency::Translucent
            } else {
                Transparency::Opaque
            },
        }
    }

    /// Total band count including alpha.
    #[inline]
    pub fn num_bands(&self) -> u32 {
        self.color_space.num_components() + self.has_alpha as u32
    }
}

/// A packed color model: one integer sample carrying 8-bit RGB(A).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedColorModel {
    /// Whether the packed value carries an alpha byte.
    pub has_alpha: bool,
}

/// The color model of a raster.
#[derive(Debug, Clone, PartialEq)]
pub enum ColorModel {
    /// Paletted.
    Indexed(IndexedColorModel),
    /// Direct component bands.
    Component(ComponentColorModel),
    /// Packed integer RGB(A).
    Packed(PackedColorModel),
}

impl ColorModel {
    /// Returns `true` for [`ColorModel::Indexed`].
    #[inline]
    pub fn is_indexed(&self) -> bool {
        matches!(self, Self::Indexed(_))
    }

    /// Returns `true` for [`ColorModel::Component`].
    #[inline]
    pub fn is_component(&self) -> bool {
        matches!(self, Self::Component(_))
    }

    /// The indexed model, if this is one.
    pub fn as_indexed(&self) -> Option<&IndexedColorModel> {
        match self {
            Self::Indexed(icm) => Some(icm),
            _ => None,
        }
    }

    /// The component model, if this is one.
    pub fn as_component(&self) -> Option<&ComponentColorModel> {
        match self {
            Self::Component(ccm) => Some(ccm),
            _ => None,
        }
    }

    /// Transparency class of the model.
    pub fn transparency(&self) -> Transparency {
        match self {
            Self::Indexed(icm) => icm.transparency,
            Self::Component(ccm) => ccm.transparency,
            Self::Packed(p) => {
                if p.has_alpha {
                    Transparency::Translucent
                } else {
                    Transparency::Opaque
                }
            }
        }
    }

    /// Whether the model carries alpha information.
    pub fn has_alpha(&self) -> bool {
        match self {
            Self::Indexed(icm) => icm.has_alpha(),
            Self::Component(ccm) => ccm.has_alpha,
            Self::Packed(p) => p.has_alpha,
        }
    }

    /// Color space of the model; palettes and packed models read as sRGB.
    pub fn color_space(&self) -> ColorSpaceKind {
        match self {
            Self::Component(ccm) => ccm.color_space,
            _ => ColorSpaceKind::Srgb,
        }
    }

    /// Short descriptive name for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Indexed(_) => "indexed",
            Self::Component(_) => "component",
            Self::Packed(_) => "packed",
        }
    }
}

/// Rec.709 luma of an RGB triple.
#[inline]
pub fn luminance(r: f64, g: f64, b: f64) -> f64 {
    REC709_LUMA_R * r + REC709_LUMA_G * g + REC709_LUMA_B * b
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_ramp(n: usize) -> Vec<PaletteEntry> {
        (0..n)
            .map(|i| {
                let v = (i * 255 / (n - 1)) as u8;
                PaletteEntry::opaque(v, v, v)
            })
            .collect()
    }

    #[test]
    fn test_palette_size_invariant() {
        assert!(IndexedColorModel::from_rgb(4, gray_ramp(16)).is_ok());
        assert!(IndexedColorModel::from_rgb(4, gray_ramp(17)).is_err());
        assert!(IndexedColorModel::from_rgb(3, gray_ramp(8)).is_err());
    }

    #[test]
    fn test_gray_palette_detection() {
        let icm = IndexedColorModel::from_rgb(8, gray_ramp(256)).unwrap();
        assert!(icm.is_gray_palette(false));

        let mut map = gray_ramp(256);
        map[3] = PaletteEntry { r: 10, g: 20, b: 30, a: 0 };
        let icm = IndexedColorModel::new(8, map, None, Transparency::Translucent).unwrap();
        assert!(!icm.is_gray_palette(false));
        assert!(icm.is_gray_palette(true));
    }

    #[test]
    fn test_transparent_index_rgba() {
        let icm =
            IndexedColorModel::new(8, gray_ramp(4), Some(2), Transparency::Bitmask).unwrap();
        assert_eq!(icm.rgba(2).a, 0);
        assert_eq!(icm.rgba(1).a, 255);
        assert!(icm.has_alpha());
    }

    #[test]
    fn test_nearest_color() {
        let icm = IndexedColorModel::from_rgb(8, gray_ramp(256)).unwrap();
        assert_eq!(icm.nearest_color(100, 100, 100), Some(100));
        assert_eq!(icm.nearest_color(255, 255, 255), Some(255));
    }

    #[test]
    fn test_component_bands() {
        let ccm = ComponentColorModel::new(ColorSpaceKind::Srgb, DataType::U8, true);
        assert_eq!(ccm.num_bands(), 4);
        assert_eq!(ccm.transparency, Transparency::Translucent);
        let gray = ComponentColorModel::new(ColorSpaceKind::Gray, DataType::F32, false);
        assert_eq!(gray.num_bands(), 1);
    }
}
