use image::{DynamicImage, ImageBuffer, Pixel};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

use super::params::ParamSet;
use super::raster::map_raster;

const COLUMN_SEED_OFFSET: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Rows,
    Columns,
    Both,
}

impl Direction {
    fn parse(s: &str) -> Self {
        match s {
            "columns" => Direction::Columns,
            "both" => Direction::Both,
            _ => Direction::Rows,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WrapMode {
    Wrap,
    // Accepted for presets; currently rolls exactly like `Wrap`.
    Reflect,
    Clamp,
}

impl WrapMode {
    fn parse(s: &str) -> Self {
        match s {
            "reflect" => WrapMode::Reflect,
            "clamp" => WrapMode::Clamp,
            _ => WrapMode::Wrap,
        }
    }
}

pub fn default_params() -> ParamSet {
    ParamSet::new()
        .with("direction", "rows")
        .with("max_shift", 20)
        .with("smoothness", 0.5)
        .with("seed", 42)
        .with("wrap_mode", "wrap")
}

/// Shifts rows and/or columns by a smoothed random walk of offsets.
pub fn apply(img: &DynamicImage, params: &ParamSet) -> DynamicImage {
    let direction = Direction::parse(params.choice("direction", "rows"));
    let max_shift = params.int("max_shift", 20).max(0);
    let smoothness = params.float("smoothness", 0.5).clamp(0.0, 1.0);
    let seed = params.seed("seed", 42);
    let wrap_mode = WrapMode::parse(params.choice("wrap_mode", "wrap"));

    if max_shift == 0 {
        return img.clone();
    }

    map_raster!(img, |buf| {
        let mut out = buf.clone();
        if matches!(direction, Direction::Rows | Direction::Both) {
            let shifts = smoothed_shifts(buf.height() as usize, max_shift, smoothness, seed);
            out = shift_rows(&out, &shifts, wrap_mode);
        }
        if matches!(direction, Direction::Columns | Direction::Both) {
            let shifts = smoothed_shifts(
                buf.width() as usize,
                max_shift,
                smoothness,
                seed.wrapping_add(COLUMN_SEED_OFFSET),
            );
            out = shift_columns(&out, &shifts, wrap_mode);
        }
        out
    })
}

pub fn randomize(params: &ParamSet, seed: u64) -> ParamSet {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = params.clone();
    let direction = ["rows", "columns", "both"].choose(&mut rng).copied();
    out.set("direction", direction.unwrap_or("rows"));
    out.set("max_shift", rng.random_range(5..=50_i64));
    out.set("smoothness", rng.random_range(0.2..0.8));
    out.set("seed", rng.random_range(0..=i32::MAX as i64));
    let wrap_mode = ["wrap", "reflect", "clamp"].choose(&mut rng).copied();
    out.set("wrap_mode", wrap_mode.unwrap_or("wrap"));
    out
}

/// One offset per line: `shift[i] = round(shift[i-1]*s + r*(1-s))` with
/// `r` uniform in `[-max_shift, max_shift]` and `shift[0] = r`.
pub(crate) fn smoothed_shifts(
    count: usize,
    max_shift: i64,
    smoothness: f64,
    seed: u64,
) -> Vec<i64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut shifts: Vec<i64> = Vec::with_capacity(count);
    for _ in 0..count {
        let fresh = rng.random_range(-max_shift..=max_shift);
        let shift = match shifts.last() {
            None => fresh,
            Some(&prev) => {
                (prev as f64 * smoothness + fresh as f64 * (1.0 - smoothness)).round() as i64
            }
        };
        shifts.push(shift);
    }
    shifts
}

/// Circularly rolls `line` (a sequence of `channels`-wide samples) by `shift`
/// into `out`, then applies the edge policy.
fn roll_line(line: &[u8], out: &mut [u8], channels: usize, shift: i64, mode: WrapMode) {
    let n = line.len() / channels;
    if n == 0 {
        return;
    }
    let offset = shift.rem_euclid(n as i64) as usize;
    for i in 0..n {
        let dst = (i + offset) % n;
        out[dst * channels..(dst + 1) * channels]
            .copy_from_slice(&line[i * channels..(i + 1) * channels]);
    }
    match mode {
        WrapMode::Wrap | WrapMode::Reflect => {}
        WrapMode::Clamp => {
            let k = (shift.unsigned_abs() as usize).min(n) * channels;
            if shift > 0 {
                out[..k].copy_from_slice(&line[..k]);
            } else if shift < 0 {
                let start = line.len() - k;
                out[start..].copy_from_slice(&line[start..]);
            }
        }
    }
}

fn shift_rows<P>(
    img: &ImageBuffer<P, Vec<u8>>,
    shifts: &[i64],
    mode: WrapMode,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let channels = P::CHANNEL_COUNT as usize;
    let stride = img.width() as usize * channels;
    let mut out = img.clone();
    if stride == 0 {
        return out;
    }
    for ((src, dst), &shift) in img
        .as_raw()
        .chunks_exact(stride)
        .zip(out.chunks_exact_mut(stride))
        .zip(shifts)
    {
        if shift != 0 {
            roll_line(src, dst, channels, shift, mode);
        }
    }
    out
}

fn shift_columns<P>(
    img: &ImageBuffer<P, Vec<u8>>,
    shifts: &[i64],
    mode: WrapMode,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let channels = P::CHANNEL_COUNT as usize;
    let (w, h) = (img.width() as usize, img.height() as usize);
    let stride = w * channels;
    let raw = img.as_raw();
    let mut out = img.clone();
    let dst_raw: &mut [u8] = &mut out;
    let mut column = vec![0u8; h * channels];
    let mut rolled = vec![0u8; h * channels];
    for (x, &shift) in shifts.iter().enumerate().take(w) {
        if shift == 0 {
            continue;
        }
        for y in 0..h {
            let src = y * stride + x * channels;
            column[y * channels..(y + 1) * channels].copy_from_slice(&raw[src..src + channels]);
        }
        roll_line(&column, &mut rolled, channels, shift, mode);
        for y in 0..h {
            let dst = y * stride + x * channels;
            dst_raw[dst..dst + channels]
                .copy_from_slice(&rolled[y * channels..(y + 1) * channels]);
        }
    }
    out
}
