use std::f64::consts::TAU;

use image::{DynamicImage, ImageBuffer, Pixel};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use super::params::ParamSet;
use super::raster::{map_raster, reflect101, to_u8};

const NOISE_TERMS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Wave,
    Noise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interpolation {
    Nearest,
    Bilinear,
    Bicubic,
}

impl Interpolation {
    fn parse(s: &str) -> Self {
        match s {
            "nearest" => Interpolation::Nearest,
            "bilinear" => Interpolation::Bilinear,
            _ => Interpolation::Bicubic,
        }
    }
}

/// Phases and frequencies of the three sine terms per axis.
struct NoiseField {
    phases_x: [f64; NOISE_TERMS],
    phases_y: [f64; NOISE_TERMS],
    freqs_x: [f64; NOISE_TERMS],
    freqs_y: [f64; NOISE_TERMS],
}

impl NoiseField {
    fn seeded(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut draw = |lo: f64, hi: f64| -> [f64; NOISE_TERMS] {
            std::array::from_fn(|_| rng.random_range(lo..hi))
        };
        let phases_x = draw(0.0, TAU);
        let phases_y = draw(0.0, TAU);
        let freqs_x = draw(0.5, 2.0);
        let freqs_y = draw(0.5, 2.0);
        Self {
            phases_x,
            phases_y,
            freqs_x,
            freqs_y,
        }
    }
}

/// How a destination pixel finds its source coordinate.
enum Mapping {
    Wave {
        amount: f64,
        scale: f64,
        cos_a: f64,
        sin_a: f64,
    },
    Noise {
        amount: f64,
        scale: f64,
        field: NoiseField,
    },
}

impl Mapping {
    fn source(&self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Mapping::Wave {
                amount,
                scale,
                cos_a,
                sin_a,
            } => {
                let rx = x * cos_a - y * sin_a;
                let ry = x * sin_a + y * cos_a;
                let off_x = amount * (ry / scale).sin();
                let off_y = amount * (rx / scale).cos();
                (
                    x + off_x * cos_a - off_y * sin_a,
                    y + off_x * sin_a + off_y * cos_a,
                )
            }
            Mapping::Noise {
                amount,
                scale,
                field,
            } => {
                let mut off_x = 0.0;
                let mut off_y = 0.0;
                for i in 0..NOISE_TERMS {
                    off_x += amount * (x * field.freqs_x[i] / scale + field.phases_x[i]).sin()
                        / NOISE_TERMS as f64;
                    off_y += amount * (y * field.freqs_y[i] / scale + field.phases_y[i]).sin()
                        / NOISE_TERMS as f64;
                }
                (x + off_x, y + off_y)
            }
        }
    }
}

pub fn default_params() -> ParamSet {
    ParamSet::new()
        .with("type", "wave")
        .with("amount", 10.0)
        .with("scale", 50.0)
        .with("angle", 0.0)
        .with("seed", 42)
        .with("interpolation", "bicubic")
}

/// Displaces the image through a wave or pseudo-noise field by inverse
/// mapping every destination pixel to a source coordinate.
pub fn apply(img: &DynamicImage, params: &ParamSet) -> DynamicImage {
    let field = match params.choice("type", "wave") {
        "noise" => Field::Noise,
        _ => Field::Wave,
    };
    let amount = params.float("amount", 10.0).clamp(0.0, 500.0);
    let scale = params.float("scale", 50.0).max(1.0);
    let angle = params.float("angle", 0.0).rem_euclid(360.0).to_radians();
    let seed = params.seed("seed", 42);
    let interpolation = Interpolation::parse(params.choice("interpolation", "bicubic"));

    let mapping = match field {
        Field::Wave => Mapping::Wave {
            amount,
            scale,
            cos_a: angle.cos(),
            sin_a: angle.sin(),
        },
        Field::Noise => Mapping::Noise {
            amount,
            scale,
            field: NoiseField::seeded(seed),
        },
    };

    map_raster!(img, |buf| remap(buf, &mapping, interpolation))
}

pub fn randomize(params: &ParamSet, seed: u64) -> ParamSet {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = params.clone();
    out.set("type", *["wave", "noise"].choose(&mut rng).unwrap_or(&"wave"));
    out.set("amount", rng.random_range(5.0..30.0));
    out.set("scale", rng.random_range(20.0..100.0));
    out.set("angle", rng.random_range(0.0..360.0));
    out.set("seed", rng.random_range(0..=i32::MAX as i64));
    let interpolation = ["bilinear", "bicubic"].choose(&mut rng).unwrap_or(&"bicubic");
    out.set("interpolation", *interpolation);
    out
}

fn remap<P>(
    img: &ImageBuffer<P, Vec<u8>>,
    mapping: &Mapping,
    interpolation: Interpolation,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + Send + Sync,
{
    let (w, h) = (img.width() as usize, img.height() as usize);
    let channels = P::CHANNEL_COUNT as usize;
    let stride = w * channels;
    let mut out = ImageBuffer::<P, Vec<u8>>::new(img.width(), img.height());
    if stride == 0 {
        return out;
    }
    let src = img.as_raw();
    let max_x = (w - 1) as f64;
    let max_y = (h - 1) as f64;

    out.par_chunks_mut(stride).enumerate().for_each(|(y, row)| {
        for x in 0..w {
            let (sx, sy) = mapping.source(x as f64, y as f64);
            let sx = sx.clamp(0.0, max_x) as f32;
            let sy = sy.clamp(0.0, max_y) as f32;
            let px = &mut row[x * channels..(x + 1) * channels];
            sample(src, w, h, channels, sx, sy, interpolation, px);
        }
    });
    out
}

/// Samples `(sx, sy)` from a row-major raster into `px`. Taps that fall
/// outside the canvas are mirrored with [`reflect101`].
#[allow(clippy::too_many_arguments)]
pub(crate) fn sample(
    src: &[u8],
    w: usize,
    h: usize,
    channels: usize,
    sx: f32,
    sy: f32,
    interpolation: Interpolation,
    px: &mut [u8],
) {
    let at = |x: i64, y: i64, c: usize| -> f32 {
        src[(reflect101(y, h) * w + reflect101(x, w)) * channels + c] as f32
    };
    match interpolation {
        Interpolation::Nearest => {
            let (x, y) = (sx.round() as i64, sy.round() as i64);
            for (c, v) in px.iter_mut().enumerate() {
                *v = at(x, y, c) as u8;
            }
        }
        Interpolation::Bilinear => {
            let (x0, y0) = (sx.floor(), sy.floor());
            let (fx, fy) = (sx - x0, sy - y0);
            let (x0, y0) = (x0 as i64, y0 as i64);
            for (c, v) in px.iter_mut().enumerate() {
                let top = at(x0, y0, c) * (1.0 - fx) + at(x0 + 1, y0, c) * fx;
                let bottom = at(x0, y0 + 1, c) * (1.0 - fx) + at(x0 + 1, y0 + 1, c) * fx;
                *v = to_u8(top * (1.0 - fy) + bottom * fy);
            }
        }
        Interpolation::Bicubic => {
            let (x0, y0) = (sx.floor(), sy.floor());
            let wx = cubic_weights(sx - x0);
            let wy = cubic_weights(sy - y0);
            let (x0, y0) = (x0 as i64, y0 as i64);
            for (c, v) in px.iter_mut().enumerate() {
                let mut acc = 0.0;
                for (j, wyj) in wy.iter().enumerate() {
                    let yy = y0 - 1 + j as i64;
                    let mut row = 0.0;
                    for (i, wxi) in wx.iter().enumerate() {
                        row += at(x0 - 1 + i as i64, yy, c) * wxi;
                    }
                    acc += row * wyj;
                }
                *v = to_u8(acc);
            }
        }
    }
}

/// Keys cubic convolution weights (a = -0.75) for taps at -1, 0, 1, 2.
fn cubic_weights(t: f32) -> [f32; 4] {
    const A: f32 = -0.75;
    let near = |d: f32| ((A + 2.0) * d - (A + 3.0)) * d * d + 1.0;
    let far = |d: f32| ((A * d - 5.0 * A) * d + 8.0 * A) * d - 4.0 * A;
    [far(t + 1.0), near(t), near(1.0 - t), far(2.0 - t)]
}

#[cfg(test)]
mod tests {
    use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb};

    use super::{Interpolation, apply, cubic_weights, default_params, randomize, sample};

    fn checker(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(w, h, |x, y| {
            let v = if (x / 4 + y / 4) % 2 == 0 { 30 } else { 220 };
            Rgb([v, (x * 5) as u8, (y * 5) as u8])
        }))
    }

    #[test]
    fn zero_amount_is_identity_for_every_interpolation() {
        let img = checker(24, 18);
        for interp in ["nearest", "bilinear", "bicubic"] {
            for kind in ["wave", "noise"] {
                let params = default_params()
                    .with("amount", 0.0)
                    .with("type", kind)
                    .with("interpolation", interp);
                assert_eq!(apply(&img, &params), img, "{kind}/{interp}");
            }
        }
    }

    #[test]
    fn noise_field_is_seed_deterministic() {
        let img = checker(32, 32);
        let params = default_params().with("type", "noise").with("seed", 5);
        assert_eq!(apply(&img, &params), apply(&img, &params));
        let other = default_params().with("type", "noise").with("seed", 6);
        assert_ne!(apply(&img, &params), apply(&img, &other));
    }

    #[test]
    fn wave_displaces_pixels_and_keeps_dimensions() {
        let img = checker(40, 30);
        let out = apply(&img, &default_params().with("amount", 6.0).with("scale", 5.0));
        assert_eq!((out.width(), out.height()), (40, 30));
        assert_ne!(out, img);
    }

    #[test]
    fn degenerate_scale_and_amount_are_clamped() {
        let img = checker(10, 10);
        let params = default_params().with("scale", 0.0).with("amount", 1e9);
        let out = apply(&img, &params);
        assert_eq!((out.width(), out.height()), (10, 10));
    }

    #[test]
    fn single_pixel_image_survives_every_mode() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(1, 1, Luma([77])));
        for interp in ["nearest", "bilinear", "bicubic"] {
            let out = apply(&img, &default_params().with("interpolation", interp));
            assert_eq!(out, img);
        }
    }

    #[test]
    fn cubic_weights_sum_to_one() {
        for t in [0.0, 0.25, 0.5, 0.9] {
            let sum: f32 = cubic_weights(t).iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
        }
        assert_eq!(cubic_weights(0.0), [0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn bilinear_midpoint_averages_neighbours() {
        let src = [0u8, 100];
        let mut px = [0u8];
        sample(&src, 2, 1, 1, 0.5, 0.0, Interpolation::Bilinear, &mut px);
        assert_eq!(px, [50]);
    }

    #[test]
    fn randomize_only_picks_smooth_interpolations() {
        for seed in 0..20 {
            let p = randomize(&default_params(), seed);
            assert_ne!(p.choice("interpolation", ""), "nearest");
            let amount = p.float("amount", 0.0);
            assert!((5.0..30.0).contains(&amount));
        }
    }
}
