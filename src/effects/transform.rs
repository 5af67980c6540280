use image::DynamicImage;
use image::imageops::FilterType;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

use super::params::ParamSet;

const MIN_SCALE_PERCENT: f64 = 1.0;
const MAX_SCALE_PERCENT: f64 = 1000.0;

pub fn rotate_flip_defaults() -> ParamSet {
    ParamSet::new()
        .with("rotation", 0)
        .with("flip_horizontal", false)
        .with("flip_vertical", false)
}

/// Quarter-turn rotation (counter-clockwise) followed by optional flips.
/// Rotation snaps down to a multiple of 90 degrees.
pub fn rotate_flip(img: &DynamicImage, params: &ParamSet) -> DynamicImage {
    let quarter_turns = params.int("rotation", 0).div_euclid(90).rem_euclid(4);
    let mut out = match quarter_turns {
        1 => img.rotate270(),
        2 => img.rotate180(),
        3 => img.rotate90(),
        _ => img.clone(),
    };
    if params.flag("flip_horizontal", false) {
        out = out.fliph();
    }
    if params.flag("flip_vertical", false) {
        out = out.flipv();
    }
    out
}

pub fn randomize_rotate_flip(params: &ParamSet, seed: u64) -> ParamSet {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = params.clone();
    out.set("rotation", *[0, 90, 180, 270].choose(&mut rng).unwrap_or(&0));
    out.set("flip_horizontal", rng.random::<f64>() < 0.3);
    out.set("flip_vertical", rng.random::<f64>() < 0.3);
    out
}

pub fn crop_defaults() -> ParamSet {
    ParamSet::new()
        .with("x", 0)
        .with("y", 0)
        .with("width", 100)
        .with("height", 100)
        .with("mode", "percent")
}

/// Crops a rectangle given in percent of the image size or in pixels.
/// The rectangle is clamped so the result always has at least one pixel.
pub fn crop(img: &DynamicImage, params: &ParamSet) -> DynamicImage {
    let (w, h) = (img.width() as i64, img.height() as i64);
    if w == 0 || h == 0 {
        return img.clone();
    }
    let (x, y, cw, ch) = match params.choice("mode", "percent") {
        "absolute" => (
            params.int("x", 0),
            params.int("y", 0),
            params.int("width", w),
            params.int("height", h),
        ),
        _ => {
            let pct = |key: &str, of: i64, default: f64| -> i64 {
                (of as f64 * params.float(key, default) / 100.0) as i64
            };
            (
                pct("x", w, 0.0),
                pct("y", h, 0.0),
                pct("width", w, 100.0),
                pct("height", h, 100.0),
            )
        }
    };

    let x = x.clamp(0, w - 1);
    let y = y.clamp(0, h - 1);
    let cw = cw.clamp(1, w - x);
    let ch = ch.clamp(1, h - y);
    if (x, y, cw, ch) == (0, 0, w, h) {
        return img.clone();
    }
    img.crop_imm(x as u32, y as u32, cw as u32, ch as u32)
}

pub fn randomize_crop(params: &ParamSet, seed: u64) -> ParamSet {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = params.clone();
    out.set("x", rng.random_range(0..=20_i64));
    out.set("y", rng.random_range(0..=20_i64));
    out.set("width", rng.random_range(80..=100_i64));
    out.set("height", rng.random_range(80..=100_i64));
    out
}

pub fn scale_defaults() -> ParamSet {
    ParamSet::new()
        .with("scale_x", 100)
        .with("scale_y", 100)
        .with("interpolation", "lanczos")
}

/// Resizes by independent horizontal and vertical percentages.
pub fn scale(img: &DynamicImage, params: &ParamSet) -> DynamicImage {
    let sx = params
        .float("scale_x", 100.0)
        .clamp(MIN_SCALE_PERCENT, MAX_SCALE_PERCENT);
    let sy = params
        .float("scale_y", 100.0)
        .clamp(MIN_SCALE_PERCENT, MAX_SCALE_PERCENT);
    let filter = match params.choice("interpolation", "lanczos") {
        "nearest" => FilterType::Nearest,
        "bilinear" => FilterType::Triangle,
        "bicubic" => FilterType::CatmullRom,
        _ => FilterType::Lanczos3,
    };

    let new_w = ((img.width() as f64 * sx / 100.0) as u32).max(1);
    let new_h = ((img.height() as f64 * sy / 100.0) as u32).max(1);
    if (new_w, new_h) == (img.width(), img.height()) {
        return img.clone();
    }
    img.resize_exact(new_w, new_h, filter)
}

pub fn randomize_scale(params: &ParamSet, seed: u64) -> ParamSet {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = params.clone();
    let uniform = rng.random_range(80.0..120.0);
    out.set("scale_x", uniform);
    out.set("scale_y", uniform);
    let interpolation = ["bilinear", "bicubic", "lanczos"]
        .choose(&mut rng)
        .unwrap_or(&"lanczos");
    out.set("interpolation", *interpolation);
    out
}

#[cfg(test)]
mod tests {
    use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb};

    use super::{crop, crop_defaults, rotate_flip, rotate_flip_defaults, scale, scale_defaults};

    fn labelled(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(ImageBuffer::from_fn(w, h, |x, y| Rgb([x as u8, y as u8, 0])))
    }

    #[test]
    fn full_percent_crop_is_identity() {
        let img = labelled(100, 100);
        assert_eq!(crop(&img, &crop_defaults()), img);
    }

    #[test]
    fn percent_crop_truncates_offsets() {
        let img = labelled(10, 20);
        let params = crop_defaults()
            .with("x", 25)
            .with("y", 50)
            .with("width", 50)
            .with("height", 50);
        let out = crop(&img, &params).to_rgb8();
        assert_eq!(out.dimensions(), (5, 10));
        assert_eq!(out.get_pixel(0, 0).0, [2, 10, 0]);
    }

    #[test]
    fn absolute_crop_clamps_to_canvas() {
        let img = labelled(8, 6);
        let params = crop_defaults()
            .with("mode", "absolute")
            .with("x", 100)
            .with("y", -4)
            .with("width", 50)
            .with("height", 0);
        let out = crop(&img, &params).to_rgb8();
        assert_eq!(out.dimensions(), (1, 1));
        assert_eq!(out.get_pixel(0, 0).0, [7, 0, 0]);
    }

    #[test]
    fn unit_scale_keeps_dimensions() {
        let img = labelled(33, 17);
        let out = scale(&img, &scale_defaults());
        assert_eq!((out.width(), out.height()), (33, 17));
        assert_eq!(out, img);
    }

    #[test]
    fn scale_changes_each_axis_independently_and_never_hits_zero() {
        let img = labelled(40, 20);
        let out = scale(
            &img,
            &scale_defaults().with("scale_x", 50.0).with("scale_y", 200.0),
        );
        assert_eq!((out.width(), out.height()), (20, 40));

        let tiny = scale(&img, &scale_defaults().with("scale_x", 0).with("scale_y", -5));
        assert_eq!((tiny.width(), tiny.height()), (1, 1));
    }

    #[test]
    fn rotation_is_counter_clockwise() {
        let img = labelled(3, 2);
        let out = rotate_flip(&img, &rotate_flip_defaults().with("rotation", 90)).to_rgb8();
        assert_eq!(out.dimensions(), (2, 3));
        // Top-right corner moves to top-left.
        assert_eq!(out.get_pixel(0, 0).0, [2, 0, 0]);
    }

    #[test]
    fn rotation_snaps_and_wraps() {
        let img = labelled(4, 3);
        let full = rotate_flip(&img, &rotate_flip_defaults().with("rotation", 360));
        assert_eq!(full, img);
        let almost = rotate_flip(&img, &rotate_flip_defaults().with("rotation", 179));
        let quarter = rotate_flip(&img, &rotate_flip_defaults().with("rotation", 90));
        assert_eq!(almost, quarter);
    }

    #[test]
    fn double_flip_equals_half_turn_on_gray() {
        let img =
            DynamicImage::ImageLuma8(GrayImage::from_fn(5, 4, |x, y| Luma([(x * 4 + y) as u8])));
        let flipped = rotate_flip(
            &img,
            &rotate_flip_defaults()
                .with("flip_horizontal", true)
                .with("flip_vertical", true),
        );
        let turned = rotate_flip(&img, &rotate_flip_defaults().with("rotation", 180));
        assert_eq!(flipped, turned);
        assert!(matches!(flipped, DynamicImage::ImageLuma8(_)));
    }
}
