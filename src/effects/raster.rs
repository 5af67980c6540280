use image::DynamicImage;

/// Brings any decoded image into one of the two layouts the effects work on:
/// 8-bit RGB or 8-bit gray. Alpha is dropped.
pub fn normalize(img: DynamicImage) -> DynamicImage {
    match img {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_) => img,
        other if other.color().has_color() => DynamicImage::ImageRgb8(other.to_rgb8()),
        other => DynamicImage::ImageLuma8(other.to_luma8()),
    }
}

/// Runs a channel-generic expression against the concrete buffer inside a
/// `DynamicImage` and rewraps the result in the same variant.
///
/// Layouts other than RGB8/Luma8 are converted to RGB8 first.
macro_rules! map_raster {
    ($img:expr, |$buf:ident| $body:expr) => {
        match $img {
            ::image::DynamicImage::ImageLuma8($buf) => ::image::DynamicImage::ImageLuma8($body),
            ::image::DynamicImage::ImageRgb8($buf) => ::image::DynamicImage::ImageRgb8($body),
            other => {
                let converted = other.to_rgb8();
                let $buf = &converted;
                ::image::DynamicImage::ImageRgb8($body)
            }
        }
    };
}

pub(crate) use map_raster;

/// Border index mapping that mirrors around the edge samples without
/// repeating them (`dcb|abcd|cba`).
pub fn reflect101(i: i64, n: usize) -> usize {
    if n <= 1 {
        return 0;
    }
    let n = n as i64;
    let period = 2 * n - 2;
    let i = i.rem_euclid(period);
    (if i >= n { period - i } else { i }) as usize
}

/// Rounds and clamps a float sample into the 8-bit range.
pub fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use image::{DynamicImage, ImageBuffer, Luma, LumaA, Rgba};

    use super::{normalize, reflect101, to_u8};

    #[test]
    fn reflect101_mirrors_without_repeating_edges() {
        let got: Vec<usize> = (-3..8).map(|i| reflect101(i, 5)).collect();
        assert_eq!(got, vec![3, 2, 1, 0, 1, 2, 3, 4, 3, 2, 1]);
        assert_eq!(reflect101(-4, 1), 0);
        assert_eq!(reflect101(2, 2), 0);
    }

    #[test]
    fn normalize_drops_alpha_and_keeps_gray() {
        let rgba = DynamicImage::ImageRgba8(ImageBuffer::from_pixel(2, 2, Rgba([1, 2, 3, 4])));
        let out = normalize(rgba);
        assert!(matches!(out, DynamicImage::ImageRgb8(_)));
        assert_eq!(out.to_rgb8().get_pixel(1, 1).0, [1, 2, 3]);

        let gray = DynamicImage::ImageLumaA8(ImageBuffer::from_pixel(2, 1, LumaA([9, 200])));
        assert!(matches!(normalize(gray), DynamicImage::ImageLuma8(_)));

        let luma = DynamicImage::ImageLuma8(ImageBuffer::from_pixel(1, 1, Luma([7])));
        assert!(matches!(normalize(luma), DynamicImage::ImageLuma8(_)));
    }

    #[test]
    fn to_u8_rounds_and_saturates() {
        assert_eq!(to_u8(-4.0), 0);
        assert_eq!(to_u8(127.5), 128);
        assert_eq!(to_u8(300.0), 255);
    }
}
