//! The built-in effect catalog.
//!
//! Every effect is a pure function of an image and a [`ParamSet`]; the set of
//! effects is closed and enumerated by [`EffectKind`].

mod block_shuffle;
mod color;
mod detail;
mod params;
mod raster;
mod shift;
mod transform;
mod warp;

use image::DynamicImage;

pub use params::{ParamSet, ParamValue};
pub use raster::normalize;

/// Coarse grouping used when presenting the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectGroup {
    Geometry,
    Color,
    Detail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    ShiftRowsColumns,
    Warp,
    BlockShuffle,
    RotateFlip,
    Crop,
    Scale,
    HsvAdjust,
    RgbCurves,
    ChannelShuffle,
    Posterize,
    Grain,
    SharpenBlur,
}

impl EffectKind {
    /// Registration order of the built-in catalog.
    pub const ALL: [EffectKind; 12] = [
        EffectKind::ShiftRowsColumns,
        EffectKind::Warp,
        EffectKind::BlockShuffle,
        EffectKind::RotateFlip,
        EffectKind::Crop,
        EffectKind::Scale,
        EffectKind::HsvAdjust,
        EffectKind::RgbCurves,
        EffectKind::ChannelShuffle,
        EffectKind::Posterize,
        EffectKind::Grain,
        EffectKind::SharpenBlur,
    ];

    /// Stable identifier stored in presets.
    pub fn identifier(self) -> &'static str {
        match self {
            EffectKind::ShiftRowsColumns => "ShiftRowsColumns",
            EffectKind::Warp => "Warp",
            EffectKind::BlockShuffle => "BlockShuffle",
            EffectKind::RotateFlip => "RotateFlip",
            EffectKind::Crop => "Crop",
            EffectKind::Scale => "Scale",
            EffectKind::HsvAdjust => "HSVAdjust",
            EffectKind::RgbCurves => "RGBCurves",
            EffectKind::ChannelShuffle => "ChannelShuffle",
            EffectKind::Posterize => "Posterize",
            EffectKind::Grain => "Grain",
            EffectKind::SharpenBlur => "SharpenBlur",
        }
    }

    pub fn from_identifier(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.identifier() == id)
    }

    pub fn name(self) -> &'static str {
        match self {
            EffectKind::ShiftRowsColumns => "Shift Rows/Columns",
            EffectKind::Warp => "Warp",
            EffectKind::BlockShuffle => "Block Shuffle",
            EffectKind::RotateFlip => "Rotate/Flip",
            EffectKind::Crop => "Crop",
            EffectKind::Scale => "Scale",
            EffectKind::HsvAdjust => "HSV Adjust",
            EffectKind::RgbCurves => "RGB Curves",
            EffectKind::ChannelShuffle => "Channel Shuffle",
            EffectKind::Posterize => "Posterize",
            EffectKind::Grain => "Grain",
            EffectKind::SharpenBlur => "Sharpen/Blur",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            EffectKind::ShiftRowsColumns => {
                "Shifts rows or columns by a smoothly varying random offset."
            }
            EffectKind::Warp => "Displaces pixels through a wave or noise field.",
            EffectKind::BlockShuffle => {
                "Swaps a share of the image tiles while keeping it recognizable."
            }
            EffectKind::RotateFlip => "Rotates by quarter turns and mirrors the image.",
            EffectKind::Crop => "Cuts out a rectangle of the image.",
            EffectKind::Scale => "Resizes the image per axis.",
            EffectKind::HsvAdjust => "Adjusts hue, saturation and brightness.",
            EffectKind::RgbCurves => "Adjusts contrast, gamma and exposure.",
            EffectKind::ChannelShuffle => "Permutes or blends the RGB channels.",
            EffectKind::Posterize => "Reduces the number of tonal levels.",
            EffectKind::Grain => "Adds film-like noise.",
            EffectKind::SharpenBlur => "Sharpens or blurs the image.",
        }
    }

    pub fn group(self) -> EffectGroup {
        match self {
            EffectKind::ShiftRowsColumns
            | EffectKind::Warp
            | EffectKind::BlockShuffle
            | EffectKind::RotateFlip
            | EffectKind::Crop
            | EffectKind::Scale => EffectGroup::Geometry,
            EffectKind::HsvAdjust
            | EffectKind::RgbCurves
            | EffectKind::ChannelShuffle
            | EffectKind::Posterize => EffectGroup::Color,
            EffectKind::Grain | EffectKind::SharpenBlur => EffectGroup::Detail,
        }
    }

    pub fn default_params(self) -> ParamSet {
        match self {
            EffectKind::ShiftRowsColumns => shift::default_params(),
            EffectKind::Warp => warp::default_params(),
            EffectKind::BlockShuffle => block_shuffle::default_params(),
            EffectKind::RotateFlip => transform::rotate_flip_defaults(),
            EffectKind::Crop => transform::crop_defaults(),
            EffectKind::Scale => transform::scale_defaults(),
            EffectKind::HsvAdjust => color::hsv_defaults(),
            EffectKind::RgbCurves => color::curves_defaults(),
            EffectKind::ChannelShuffle => color::channel_shuffle_defaults(),
            EffectKind::Posterize => color::posterize_defaults(),
            EffectKind::Grain => detail::grain_defaults(),
            EffectKind::SharpenBlur => detail::sharpen_blur_defaults(),
        }
    }

    /// Runs the effect. The input is never modified; out-of-range parameters
    /// are clamped rather than rejected.
    pub fn apply(self, img: &DynamicImage, params: &ParamSet) -> anyhow::Result<DynamicImage> {
        let out = match self {
            EffectKind::ShiftRowsColumns => shift::apply(img, params),
            EffectKind::Warp => warp::apply(img, params),
            EffectKind::BlockShuffle => block_shuffle::apply(img, params),
            EffectKind::RotateFlip => transform::rotate_flip(img, params),
            EffectKind::Crop => transform::crop(img, params),
            EffectKind::Scale => transform::scale(img, params),
            EffectKind::HsvAdjust => color::hsv_adjust(img, params),
            EffectKind::RgbCurves => color::rgb_curves(img, params),
            EffectKind::ChannelShuffle => color::channel_shuffle(img, params),
            EffectKind::Posterize => color::posterize(img, params),
            EffectKind::Grain => detail::grain(img, params),
            EffectKind::SharpenBlur => detail::sharpen_blur(img, params),
        };
        let normalized = matches!(img, DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_));
        anyhow::ensure!(
            !normalized || out.color() == img.color(),
            "{} changed the pixel layout",
            self.identifier()
        );
        Ok(out)
    }

    /// Deterministically perturbs `params`; keys the randomizer does not own
    /// are carried over.
    pub fn randomize(self, params: &ParamSet, seed: u64) -> ParamSet {
        match self {
            EffectKind::ShiftRowsColumns => shift::randomize(params, seed),
            EffectKind::Warp => warp::randomize(params, seed),
            EffectKind::BlockShuffle => block_shuffle::randomize(params, seed),
            EffectKind::RotateFlip => transform::randomize_rotate_flip(params, seed),
            EffectKind::Crop => transform::randomize_crop(params, seed),
            EffectKind::Scale => transform::randomize_scale(params, seed),
            EffectKind::HsvAdjust => color::randomize_hsv(params, seed),
            EffectKind::RgbCurves => color::randomize_curves(params, seed),
            EffectKind::ChannelShuffle => color::randomize_channel_shuffle(params, seed),
            EffectKind::Posterize => color::randomize_posterize(params, seed),
            EffectKind::Grain => detail::randomize_grain(params, seed),
            EffectKind::SharpenBlur => detail::randomize_sharpen_blur(params, seed),
        }
    }

    /// The parameter a single "intensity" control would drive, if any.
    pub fn intensity_param(self) -> Option<&'static str> {
        match self {
            EffectKind::ShiftRowsColumns => Some("max_shift"),
            EffectKind::Warp => Some("amount"),
            EffectKind::BlockShuffle => Some("shuffle_strength"),
            EffectKind::HsvAdjust => Some("saturation"),
            EffectKind::RgbCurves => Some("contrast"),
            EffectKind::Posterize => Some("levels"),
            EffectKind::Grain => Some("amount"),
            EffectKind::SharpenBlur => Some("blur_sigma"),
            EffectKind::RotateFlip
            | EffectKind::Crop
            | EffectKind::Scale
            | EffectKind::ChannelShuffle => None,
        }
    }
}

/// Set of effects available for lookup by identifier.
#[derive(Debug, Clone)]
pub struct Catalog {
    kinds: Vec<EffectKind>,
}

impl Catalog {
    pub fn builtin() -> Self {
        Self::from_kinds(EffectKind::ALL)
    }

    /// A restricted catalog. Duplicates are dropped, first occurrence wins.
    pub fn from_kinds(kinds: impl IntoIterator<Item = EffectKind>) -> Self {
        let mut out = Vec::new();
        for kind in kinds {
            if !out.contains(&kind) {
                out.push(kind);
            }
        }
        Self { kinds: out }
    }

    pub fn get(&self, identifier: &str) -> Option<EffectKind> {
        self.kinds
            .iter()
            .copied()
            .find(|k| k.identifier() == identifier)
    }

    pub fn iter(&self) -> impl Iterator<Item = EffectKind> + '_ {
        self.kinds.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn group(&self, group: EffectGroup) -> Vec<EffectKind> {
        self.iter().filter(|k| k.group() == group).collect()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}
