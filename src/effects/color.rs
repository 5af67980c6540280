use image::{DynamicImage, ImageBuffer, Pixel, RgbImage};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

use super::params::ParamSet;
use super::raster::{map_raster, to_u8};

// 4x4 ordered-dither thresholds, already divided by 16.
const BAYER_4X4: [[f32; 4]; 4] = [
    [0.0 / 16.0, 8.0 / 16.0, 2.0 / 16.0, 10.0 / 16.0],
    [12.0 / 16.0, 4.0 / 16.0, 14.0 / 16.0, 6.0 / 16.0],
    [3.0 / 16.0, 11.0 / 16.0, 1.0 / 16.0, 9.0 / 16.0],
    [15.0 / 16.0, 7.0 / 16.0, 13.0 / 16.0, 5.0 / 16.0],
];

// ---------------------------------------------------------------------------
// HSV adjust
// ---------------------------------------------------------------------------

pub fn hsv_defaults() -> ParamSet {
    ParamSet::new()
        .with("hue_shift", 0)
        .with("saturation", 1.0)
        .with("value", 1.0)
}

/// Hue rotation and saturation/value gain on an 8-bit HSV representation
/// (hue in half-degrees, `0..180`).
pub fn hsv_adjust(img: &DynamicImage, params: &ParamSet) -> DynamicImage {
    let hue_shift = params.float("hue_shift", 0.0).clamp(-180.0, 180.0) as f32;
    let saturation = params.float("saturation", 1.0).clamp(0.0, 2.0) as f32;
    let value = params.float("value", 1.0).clamp(0.0, 2.0) as f32;

    match img {
        DynamicImage::ImageLuma8(gray) => {
            let mut out = gray.clone();
            for px in out.pixels_mut() {
                px[0] = (px[0] as f32 * value).clamp(0.0, 255.0) as u8;
            }
            DynamicImage::ImageLuma8(out)
        }
        other => {
            let mut rgb = other.to_rgb8();
            for px in rgb.pixels_mut() {
                let (h, s, v) = rgb_to_hsv8(px[0], px[1], px[2]);
                // Truncation mirrors the 8-bit storage of the adjusted channels.
                let h = (h + hue_shift).rem_euclid(180.0).floor();
                let s = (s * saturation).clamp(0.0, 255.0).floor();
                let v = (v * value).clamp(0.0, 255.0).floor();
                px.0 = hsv8_to_rgb(h, s, v);
            }
            DynamicImage::ImageRgb8(rgb)
        }
    }
}

pub fn randomize_hsv(params: &ParamSet, seed: u64) -> ParamSet {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = params.clone();
    out.set("hue_shift", rng.random_range(-60..=60_i64));
    out.set("saturation", rng.random_range(0.5..1.5));
    out.set("value", rng.random_range(0.7..1.3));
    out
}

/// RGB to 8-bit HSV: hue in `0..=180` (half-degrees), saturation and value in
/// `0..=255`, each rounded.
fn rgb_to_hsv8(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let max = rf.max(gf.max(bf));
    let min = rf.min(gf.min(bf));
    let diff = max - min;

    let s = if max > 0.0 { diff / max * 255.0 } else { 0.0 };
    let h = if diff <= 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / diff
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / diff
    } else {
        240.0 + 60.0 * (rf - gf) / diff
    };
    let h = if h < 0.0 { h + 360.0 } else { h };
    ((h * 0.5).round(), s.round(), max)
}

fn hsv8_to_rgb(h: f32, s: f32, v: f32) -> [u8; 3] {
    let s = s / 255.0;
    let v = v / 255.0;
    let h6 = ((h * 2.0) % 360.0) / 60.0;
    let sector = h6.floor();
    let f = h6 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    let (r, g, b) = match sector as u8 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };
    [to_u8(r * 255.0), to_u8(g * 255.0), to_u8(b * 255.0)]
}

// ---------------------------------------------------------------------------
// RGB curves
// ---------------------------------------------------------------------------

pub fn curves_defaults() -> ParamSet {
    ParamSet::new()
        .with("contrast", 0)
        .with("gamma", 1.0)
        .with("exposure", 0.0)
}

/// Contrast, gamma and exposure applied to every channel through a lookup
/// table.
pub fn rgb_curves(img: &DynamicImage, params: &ParamSet) -> DynamicImage {
    let contrast = params.float("contrast", 0.0).clamp(-100.0, 100.0) as f32;
    let gamma = params.float("gamma", 1.0).clamp(0.2, 3.0) as f32;
    let exposure = params.float("exposure", 0.0).clamp(-2.0, 2.0) as f32;
    let lut = curves_lut(contrast, gamma, exposure);

    map_raster!(img, |buf| {
        let mut out = buf.clone();
        for v in out.iter_mut() {
            *v = lut[*v as usize];
        }
        out
    })
}

pub fn randomize_curves(params: &ParamSet, seed: u64) -> ParamSet {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = params.clone();
    out.set("contrast", rng.random_range(-30..=30_i64));
    out.set("gamma", rng.random_range(0.8..1.2));
    out.set("exposure", rng.random_range(-0.5..0.5));
    out
}

fn curves_lut(contrast: f32, gamma: f32, exposure: f32) -> [u8; 256] {
    let factor = (259.0 * (contrast + 255.0)) / (255.0 * (259.0 - contrast));
    let gain = 2.0_f32.powf(exposure);
    std::array::from_fn(|i| {
        let mut v = i as f32 / 255.0;
        if contrast != 0.0 {
            v = (factor * (v - 0.5) + 0.5).clamp(0.0, 1.0);
        }
        if gamma != 1.0 {
            v = v.powf(1.0 / gamma);
        }
        if exposure != 0.0 {
            v *= gain;
        }
        to_u8(v * 255.0)
    })
}

// ---------------------------------------------------------------------------
// Channel shuffle
// ---------------------------------------------------------------------------

pub fn channel_shuffle_defaults() -> ParamSet {
    ParamSet::new().with("mode", "rgb").with("mix_amount", 0.3)
}

/// Permutes the RGB channels, or blends each channel with the next one
/// (`mix`). Single-channel images pass through.
pub fn channel_shuffle(img: &DynamicImage, params: &ParamSet) -> DynamicImage {
    let mix = params.float("mix_amount", 0.3).clamp(0.0, 1.0) as f32;
    let order: Option<[usize; 3]> = match params.choice("mode", "rgb") {
        "rbg" => Some([0, 2, 1]),
        "grb" => Some([1, 0, 2]),
        "gbr" => Some([1, 2, 0]),
        "brg" => Some([2, 0, 1]),
        "bgr" => Some([2, 1, 0]),
        "mix" => None,
        _ => Some([0, 1, 2]),
    };

    let rgb: RgbImage = match img {
        DynamicImage::ImageLuma8(_) => return img.clone(),
        DynamicImage::ImageRgb8(buf) => buf.clone(),
        other => other.to_rgb8(),
    };
    let mut out = rgb;
    for px in out.pixels_mut() {
        let c = px.0;
        px.0 = match order {
            Some(o) => [c[o[0]], c[o[1]], c[o[2]]],
            None => {
                let blend = |a: u8, b: u8| (a as f32 * (1.0 - mix) + b as f32 * mix) as u8;
                [blend(c[0], c[1]), blend(c[1], c[2]), blend(c[2], c[0])]
            }
        };
    }
    DynamicImage::ImageRgb8(out)
}

pub fn randomize_channel_shuffle(params: &ParamSet, seed: u64) -> ParamSet {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = params.clone();
    let mode = ["rgb", "rbg", "grb", "gbr", "brg", "bgr", "mix"]
        .choose(&mut rng)
        .unwrap_or(&"rgb");
    out.set("mode", *mode);
    out.set("mix_amount", rng.random_range(0.2..0.5));
    out
}

// ---------------------------------------------------------------------------
// Posterize
// ---------------------------------------------------------------------------

pub fn posterize_defaults() -> ParamSet {
    ParamSet::new().with("levels", 8).with("dither", false)
}

/// Quantizes every channel to `levels` evenly spaced values from 0 to 255,
/// optionally with 4x4 ordered dithering.
pub fn posterize(img: &DynamicImage, params: &ParamSet) -> DynamicImage {
    let levels = params.int("levels", 8).clamp(2, 256);
    let dither = params.flag("dither", false);

    map_raster!(img, |buf| quantize(buf, (levels - 1) as f32, dither))
}

pub fn randomize_posterize(params: &ParamSet, seed: u64) -> ParamSet {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = params.clone();
    out.set("levels", *[4, 8, 16, 32, 64].choose(&mut rng).unwrap_or(&8));
    out.set("dither", rng.random::<f64>() < 0.5);
    out
}

/// `steps` is `levels - 1`; level `k` maps to `round(k * 255 / steps)`.
fn quantize<P>(img: &ImageBuffer<P, Vec<u8>>, steps: f32, dither: bool) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let channels = P::CHANNEL_COUNT as usize;
    let width = img.width().max(1) as usize;
    let mut out = img.clone();
    let raw: &mut [u8] = &mut out;
    for (i, v) in raw.iter_mut().enumerate() {
        let scaled = *v as f32 * steps / 255.0;
        let mut level = scaled.floor();
        if dither {
            let pixel = i / channels;
            let (x, y) = (pixel % width, pixel / width);
            if scaled - level > BAYER_4X4[y % 4][x % 4] {
                level += 1.0;
            }
        }
        *v = to_u8(level * 255.0 / steps);
    }
    out
}
