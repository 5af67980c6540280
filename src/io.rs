use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::Context;
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;

use crate::effects::normalize;

pub const DEFAULT_PREVIEW_MAX: u32 = 1024;
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

static RAW_EXTS: &[&str] = &["raf", "dng", "nef", "cr2", "arw"];
static JPEG_EXTS: &[&str] = &["jpg", "jpeg"];
static SUPPORTED_IMAGE_EXTS: &[&str] = &[
    "jpg", "jpeg", "png", "tiff", "tif", "webp", "bmp", "raf", "dng", "nef", "cr2", "arw",
];

fn has_extension(path: &Path, exts: &[&str]) -> bool {
    let Some(ext) = path.extension().map(|e| e.to_string_lossy()) else {
        return false;
    };
    exts.iter().any(|known| ext.eq_ignore_ascii_case(known))
}

pub fn is_raw_image(path: &Path) -> bool {
    has_extension(path, RAW_EXTS)
}

pub fn is_jpeg(path: &Path) -> bool {
    has_extension(path, JPEG_EXTS)
}

/// Returns `true` if the path has an extension `open_image` understands.
pub fn is_supported_image(path: &Path) -> bool {
    has_extension(path, SUPPORTED_IMAGE_EXTS)
}

/// Opens an image as 8-bit RGB or gray, developing RAW files when the
/// regular decoders cannot read them.
pub fn open_image(path: &Path) -> anyhow::Result<DynamicImage> {
    let img = open_with_fallback(path, |p| Ok(image::open(p)?), develop_raw)
        .with_context(|| format!("opening {}", path.display()))?;
    Ok(normalize(img))
}

fn open_with_fallback<FStd, FRaw>(
    path: &Path,
    open_std: FStd,
    open_raw: FRaw,
) -> anyhow::Result<DynamicImage>
where
    FStd: Fn(&Path) -> anyhow::Result<DynamicImage>,
    FRaw: Fn(&Path) -> anyhow::Result<DynamicImage>,
{
    match open_std(path) {
        Ok(img) => Ok(img),
        Err(_) if is_raw_image(path) => open_raw(path),
        Err(err) => Err(err),
    }
}

fn develop_raw(path: &Path) -> anyhow::Result<DynamicImage> {
    let raw = rawler::decode_file(path)?;
    let develop = rawler::imgop::develop::RawDevelop::default();
    let intermediate = develop.develop_intermediate(&raw)?;
    intermediate
        .to_dynamic_image()
        .ok_or_else(|| anyhow::anyhow!("raw develop produced invalid image"))
}

/// Writes `img`, creating parent directories. JPEG output uses
/// `jpeg_quality`; other formats follow the extension.
pub fn save_image(img: &DynamicImage, path: &Path, jpeg_quality: u8) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create_dir_all {}", parent.display()))?;
    }
    if is_jpeg(path) {
        let file = fs::File::create(path)
            .with_context(|| format!("create output failed {}", path.display()))?;
        let encoder = JpegEncoder::new_with_quality(BufWriter::new(file), jpeg_quality.clamp(1, 100));
        img.write_with_encoder(encoder)
            .with_context(|| format!("jpeg encode failed {}", path.display()))?;
    } else {
        img.save(path)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(())
}

/// Output location for a processed `input`: same stem inside `out_dir`,
/// JPEG stays JPEG and everything else becomes PNG.
pub fn output_path(input: &Path, out_dir: &Path) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("image");
    let ext = if is_jpeg(input) { "jpg" } else { "png" };
    out_dir.join(format!("{stem}.{ext}"))
}

/// Downscales so the longest edge is at most `max`, keeping aspect ratio.
pub fn ensure_preview_size(img: DynamicImage, max: u32) -> DynamicImage {
    let max = max.max(1);
    if img.width() > max || img.height() > max {
        img.resize(max, max, FilterType::Lanczos3)
    } else {
        img
    }
}
