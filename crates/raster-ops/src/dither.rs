//! Color quantization: the fixed color cube, ordered dither and
//! Floyd-Steinberg error diffusion.
//!
//! Both dither ops consume a 3-band 8-bit RGB source and produce a
//! single-band indexed image over a target palette. The default palette is
//! the fixed 4x9x6 color cube (216 colors): 4 red levels, 9 green levels,
//! 6 blue levels, laid out red-major so an RGB triple maps to its cell in
//! constant time.

use std::any::Any;

use raster_core::{
    ColorModel, DataType, Error, ImageOp, IndexedColorModel, PaletteEntry, PixelBuffer, Raster,
    Rect, Result, SampleModel, Transparency,
};

use crate::policy::PixelPolicy;

/// Red, green and blue level counts of the fixed cube.
pub const CUBE_LEVELS: (u32, u32, u32) = (4, 9, 6);

/// Builds the fixed 216-color cube palette.
pub fn color_cube_216() -> IndexedColorModel {
    let (rl, gl, bl) = CUBE_LEVELS;
    let mut map = Vec::with_capacity((rl * gl * bl) as usize);
    for r in 0..rl {
        for g in 0..gl {
            for b in 0..bl {
                map.push(PaletteEntry::opaque(
                    (r * 255 / (rl - 1)) as u8,
                    (g * 255 / (gl - 1)) as u8,
                    (b * 255 / (bl - 1)) as u8,
                ));
            }
        }
    }
    IndexedColorModel::new(8, map, None, Transparency::Opaque)
        .expect("216 entries fit 8 bits")
}

/// Index of the cube cell nearest to an RGB triple.
#[inline]
pub fn cube_index(r: f64, g: f64, b: f64) -> u32 {
    let (rl, gl, bl) = CUBE_LEVELS;
    let level = |v: f64, levels: u32| -> u32 {
        let l = (v.clamp(0.0, 255.0) / 255.0 * (levels - 1) as f64).round() as u32;
        l.min(levels - 1)
    };
    level(r, rl) * gl * bl + level(g, gl) * bl + level(b, bl)
}

fn nearest_index(palette: &IndexedColorModel, is_cube: bool, r: f64, g: f64, b: f64) -> u32 {
    if is_cube {
        cube_index(r, g, b)
    } else {
        palette
            .nearest_color(
                r.clamp(0.0, 255.0) as u8,
                g.clamp(0.0, 255.0) as u8,
                b.clamp(0.0, 255.0) as u8,
            )
            .unwrap_or(0) as u32
    }
}

fn check_rgb_source(source: &Raster) -> Result<()> {
    if source.num_bands() < 3 || source.data_type() != DataType::U8 {
        return Err(Error::UnsupportedColorModel(format!(
            "dither needs 8-bit RGB input, got {} bands of {}",
            source.num_bands(),
            source.data_type(),
        )));
    }
    Ok(())
}

fn is_cube(palette: &IndexedColorModel) -> bool {
    *palette == color_cube_216()
}

/// Floyd-Steinberg error diffusion to a palette.
pub struct ErrorDiffusionOp {
    sources: Vec<Raster>,
    palette: IndexedColorModel,
    policy: PixelPolicy,
}

impl ErrorDiffusionOp {
    /// Creates an error diffusion op over an 8-bit RGB source.
    pub fn new(source: Raster, palette: IndexedColorModel, policy: PixelPolicy) -> Result<Self> {
        check_rgb_source(&source)?;
        Ok(Self {
            sources: vec![source],
            palette,
            policy,
        })
    }
}

impl ImageOp for ErrorDiffusionOp {
    fn name(&self) -> &'static str {
        "ErrorDiffusion"
    }

    fn sources(&self) -> &[Raster] {
        &self.sources
    }

    fn bounds(&self) -> Rect {
        self.sources[0].bounds()
    }

    fn sample_model(&self) -> SampleModel {
        SampleModel::new(DataType::U8, 1)
    }

    fn color_model(&self) -> ColorModel {
        ColorModel::Indexed(self.palette.clone())
    }

    fn compute(&self) -> Result<PixelBuffer> {
        let src = self.sources[0].data()?;
        let rect = src.rect();
        let w = rect.width as usize;
        let h = rect.height as usize;
        let cube = is_cube(&self.palette);
        let dest_nodata = self.policy.dest_nodata();

        // working copy of the RGB planes, error diffuses into it
        let mut work = vec![0.0f64; w * h * 3];
        for y in 0..h {
            for x in 0..w {
                for c in 0..3 {
                    work[(y * w + x) * 3 + c] = src
                        .sample(rect.x + x as i32, rect.y + y as i32, c as u32)
                        .unwrap_or(0.0);
                }
            }
        }

        let mut out = PixelBuffer::zeroed(rect, 1, DataType::U8);
        for y in 0..h {
            for x in 0..w {
                let gx = rect.x + x as i32;
                let gy = rect.y + y as i32;
                if !self.policy.allows(gx, gy) {
                    out.set_sample(gx, gy, 0, dest_nodata);
                    continue;
                }
                let base = (y * w + x) * 3;
                let (r, g, b) = (work[base], work[base + 1], work[base + 2]);
                let idx = nearest_index(&self.palette, cube, r, g, b);
                out.set_sample(gx, gy, 0, idx as f64);

                let chosen = self.palette.rgba(idx as usize);
                let err = [
                    r - chosen.r as f64,
                    g - chosen.g as f64,
                    b - chosen.b as f64,
                ];
                // 7/16 right, 3/16 below-left, 5/16 below, 1/16 below-right
                let mut spread = |dx: isize, dy: isize, weight: f64| {
                    let nx = x as isize + dx;
                    let ny = y as isize + dy;
                    if nx < 0 || nx >= w as isize || ny < 0 || ny >= h as isize {
                        return;
                    }
                    let nbase = (ny as usize * w + nx as usize) * 3;
                    for c in 0..3 {
                        work[nbase + c] += err[c] * weight;
                    }
                };
                spread(1, 0, 7.0 / 16.0);
                spread(-1, 1, 3.0 / 16.0);
                spread(0, 1, 5.0 / 16.0);
                spread(1, 1, 1.0 / 16.0);
            }
        }
        Ok(out)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Ordered (Bayer 4x4) dither to a palette.
pub struct OrderedDitherOp {
    sources: Vec<Raster>,
    palette: IndexedColorModel,
    policy: PixelPolicy,
}

impl OrderedDitherOp {
    /// Creates an ordered dither op over an 8-bit RGB source.
    pub fn new(source: Raster, palette: IndexedColorModel, policy: PixelPolicy) -> Result<Self> {
        check_rgb_source(&source)?;
        Ok(Self {
            sources: vec![source],
            palette,
            policy,
        })
    }
}

const BAYER_4X4: [[f64; 4]; 4] = [
    [0.0, 8.0, 2.0, 10.0],
    [12.0, 4.0, 14.0, 6.0],
    [3.0, 11.0, 1.0, 9.0],
    [15.0, 7.0, 13.0, 5.0],
];

impl ImageOp for OrderedDitherOp {
    fn name(&self) -> &'static str {
        "OrderedDither"
    }

    fn sources(&self) -> &[Raster] {
        &self.sources
    }

    fn bounds(&self) -> Rect {
        self.sources[0].bounds()
    }

    fn sample_model(&self) -> SampleModel {
        SampleModel::new(DataType::U8, 1)
    }

    fn color_model(&self) -> ColorModel {
        ColorModel::Indexed(self.palette.clone())
    }

    fn compute(&self) -> Result<PixelBuffer> {
        let src = self.sources[0].data()?;
        let rect = src.rect();
        let cube = is_cube(&self.palette);
        let dest_nodata = self.policy.dest_nodata();
        Ok(PixelBuffer::from_fn(rect, 1, DataType::U8, |x, y, _| {
            if !self.policy.allows(x, y) {
                return dest_nodata;
            }
            let bias = (BAYER_4X4[y.rem_euclid(4) as usize][x.rem_euclid(4) as usize] - 7.5) / 16.0;
            let channel = |c: u32, levels: u32| -> f64 {
                let v = src.sample(x, y, c).unwrap_or(0.0);
                let step = 255.0 / (levels - 1) as f64;
                v + bias * step
            };
            let (rl, gl, bl) = CUBE_LEVELS;
            nearest_index(
                &self.palette,
                cube,
                channel(0, rl),
                channel(1, gl),
                channel(2, bl),
            ) as f64
        }))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_core::RenderHints;

    fn rgb(colors: &[(u8, u8, u8)], width: u32) -> Raster {
        let height = colors.len() as u32 / width;
        let buf = PixelBuffer::from_fn(
            Rect::from_size(width, height),
            3,
            DataType::U8,
            |x, y, b| {
                let (r, g, bl) = colors[(y as u32 * width + x as u32) as usize];
                [r, g, bl][b as usize] as f64
            },
        );
        Raster::from_buffer_component(buf)
    }

    #[test]
    fn test_cube_has_216_entries() {
        let cube = color_cube_216();
        assert_eq!(cube.map_size(), 216);
        // corner cells map to themselves
        assert_eq!(cube.rgba(cube_index(0.0, 0.0, 0.0) as usize).rgb(), 0x000000);
        assert_eq!(
            cube.rgba(cube_index(255.0, 255.0, 255.0) as usize).rgb(),
            0xFFFFFF
        );
    }

    #[test]
    fn test_error_diffusion_exact_colors() {
        let cube = color_cube_216();
        let src = rgb(&[(255, 0, 0), (0, 255, 0), (0, 0, 255), (255, 255, 255)], 2);
        let op = ErrorDiffusionOp::new(src, cube.clone(), PixelPolicy::none()).unwrap();
        let node = Raster::from_op(Box::new(op), &RenderHints::new());
        assert!(node.color_model().is_indexed());
        let out = node.data().unwrap();
        let idx = out.sample(0, 0, 0).unwrap() as usize;
        assert_eq!(cube.rgba(idx).rgb(), 0xFF0000);
        let idx = out.sample(1, 1, 0).unwrap() as usize;
        assert_eq!(cube.rgba(idx).rgb(), 0xFFFFFF);
    }

    #[test]
    fn test_ordered_dither_flat_field() {
        let cube = color_cube_216();
        let src = rgb(&[(0, 0, 0); 16], 4);
        let op = OrderedDitherOp::new(src, cube.clone(), PixelPolicy::none()).unwrap();
        let out = Raster::from_op(Box::new(op), &RenderHints::new()).data().unwrap();
        for y in 0..4 {
            for x in 0..4 {
                let idx = out.sample(x, y, 0).unwrap() as usize;
                assert_eq!(cube.rgba(idx).rgb(), 0x000000);
            }
        }
    }

    #[test]
    fn test_dither_rejects_gray_input() {
        let buf = PixelBuffer::zeroed(Rect::from_size(2, 2), 1, DataType::U8);
        let src = Raster::from_buffer_component(buf);
        assert!(ErrorDiffusionOp::new(src, color_cube_216(), PixelPolicy::none()).is_err());
    }
}
