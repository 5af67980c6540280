use image::{DynamicImage, ImageBuffer, Pixel};
use imageproc::filter::gaussian_blur_f32;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

use super::params::ParamSet;
use super::raster::{map_raster, reflect101, to_u8};

const GRAIN_SCALE: f32 = 50.0;
const UNSHARP_SIGMA: f32 = 1.0;

pub fn grain_defaults() -> ParamSet {
    ParamSet::new()
        .with("amount", 0.3)
        .with("size", 2)
        .with("monochrome", false)
        .with("seed", 42)
}

/// Adds seeded Gaussian noise, optionally softened into larger grain.
pub fn grain(img: &DynamicImage, params: &ParamSet) -> DynamicImage {
    let amount = params.float("amount", 0.3).clamp(0.0, 1.0) as f32;
    let size = params.int("size", 2).clamp(1, 5) as usize;
    let monochrome = params.flag("monochrome", false);
    let seed = params.seed("seed", 42);

    if amount <= 0.0 {
        return img.clone();
    }
    map_raster!(img, |buf| add_grain(buf, amount, size, monochrome, seed))
}

pub fn randomize_grain(params: &ParamSet, seed: u64) -> ParamSet {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = params.clone();
    out.set("amount", rng.random_range(0.1..0.5));
    out.set("size", rng.random_range(1..=4_i64));
    out.set("monochrome", rng.random::<f64>() < 0.3);
    out.set("seed", rng.random_range(0..=i32::MAX as i64));
    out
}

fn add_grain<P>(
    img: &ImageBuffer<P, Vec<u8>>,
    amount: f32,
    size: usize,
    monochrome: bool,
    seed: u64,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let (w, h) = (img.width() as usize, img.height() as usize);
    let channels = P::CHANNEL_COUNT as usize;
    let planes = if monochrome { 1 } else { channels };
    let sigma = amount * GRAIN_SCALE;

    let mut rng = StdRng::seed_from_u64(seed);
    let mut noise: Vec<Vec<f32>> = (0..planes)
        .map(|_| (0..w * h).map(|_| standard_normal(&mut rng) * sigma).collect())
        .collect();
    if size > 1 {
        let kernel = gaussian_kernel(2 * size + 1);
        for plane in &mut noise {
            *plane = blur_plane(plane, w, h, &kernel);
        }
    }

    let mut out = img.clone();
    let raw: &mut [u8] = &mut out;
    for (i, v) in raw.iter_mut().enumerate() {
        let plane = if planes == 1 { 0 } else { i % channels };
        *v = to_u8(*v as f32 + noise[plane][i / channels]);
    }
    out
}

/// Box-Muller draw from N(0, 1).
fn standard_normal(rng: &mut StdRng) -> f32 {
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random();
    ((-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()) as f32
}

/// Normalized 1-D Gaussian of odd length `len`; sigma follows the usual
/// "derive from kernel size" rule.
fn gaussian_kernel(len: usize) -> Vec<f32> {
    let sigma = 0.3 * ((len as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let radius = (len / 2) as f32;
    let weights: Vec<f32> = (0..len)
        .map(|i| {
            let d = i as f32 - radius;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let total: f32 = weights.iter().sum();
    weights.into_iter().map(|v| v / total).collect()
}

/// Separable convolution of a single float plane, mirrored borders.
fn blur_plane(plane: &[f32], w: usize, h: usize, kernel: &[f32]) -> Vec<f32> {
    let radius = (kernel.len() / 2) as i64;
    let mut tmp = vec![0.0f32; plane.len()];
    for y in 0..h {
        for x in 0..w {
            tmp[y * w + x] = kernel
                .iter()
                .enumerate()
                .map(|(k, wt)| plane[y * w + reflect101(x as i64 + k as i64 - radius, w)] * wt)
                .sum();
        }
    }
    let mut out = vec![0.0f32; plane.len()];
    for y in 0..h {
        for x in 0..w {
            out[y * w + x] = kernel
                .iter()
                .enumerate()
                .map(|(k, wt)| tmp[reflect101(y as i64 + k as i64 - radius, h) * w + x] * wt)
                .sum();
        }
    }
    out
}

pub fn sharpen_blur_defaults() -> ParamSet {
    ParamSet::new()
        .with("mode", "blur")
        .with("blur_sigma", 2.0)
        .with("sharpen_amount", 1.0)
}

/// Gaussian blur, or an unsharp-mask sharpening pass.
pub fn sharpen_blur(img: &DynamicImage, params: &ParamSet) -> DynamicImage {
    match params.choice("mode", "blur") {
        "sharpen" => {
            let amount = params.float("sharpen_amount", 1.0).clamp(0.0, 2.0) as f32;
            if amount < 0.001 {
                return img.clone();
            }
            map_raster!(img, |buf| {
                let blurred = gaussian_blur_f32(buf, UNSHARP_SIGMA);
                let mut out = buf.clone();
                let raw: &mut [u8] = &mut out;
                for (o, b) in raw.iter_mut().zip(blurred.as_raw()) {
                    let s = *o as f32;
                    *o = to_u8(s + amount * (s - *b as f32));
                }
                out
            })
        }
        "blur" => {
            let sigma = params.float("blur_sigma", 2.0).clamp(0.0, 10.0) as f32;
            if sigma < 0.01 {
                return img.clone();
            }
            map_raster!(img, |buf| gaussian_blur_f32(buf, sigma))
        }
        _ => img.clone(),
    }
}

pub fn randomize_sharpen_blur(params: &ParamSet, seed: u64) -> ParamSet {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = params.clone();
    out.set("mode", *["blur", "sharpen"].choose(&mut rng).unwrap_or(&"blur"));
    out.set("blur_sigma", rng.random_range(1.0..5.0));
    out.set("sharpen_amount", rng.random_range(0.5..1.5));
    out
}
