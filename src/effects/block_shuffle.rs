use image::{DynamicImage, ImageBuffer, Pixel, imageops};
use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom, index};
use rand::{Rng, SeedableRng};

use super::params::ParamSet;
use super::raster::map_raster;

const MAX_BLOCK_SIZE: i64 = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TileTransform {
    None,
    Rotate,
    Flip,
    Jitter,
}

impl TileTransform {
    fn parse(s: &str) -> Self {
        match s {
            "rotate" => TileTransform::Rotate,
            "flip" => TileTransform::Flip,
            "jitter" => TileTransform::Jitter,
            _ => TileTransform::None,
        }
    }
}

/// Tile grid over an image; edge tiles are clipped, never padded.
#[derive(Debug, Clone, Copy)]
struct Grid {
    block: u32,
    width: u32,
    height: u32,
    cols: usize,
    rows: usize,
}

impl Grid {
    fn new(width: u32, height: u32, block: u32) -> Self {
        Self {
            block,
            width,
            height,
            cols: width.div_ceil(block) as usize,
            rows: height.div_ceil(block) as usize,
        }
    }

    fn len(&self) -> usize {
        self.cols * self.rows
    }

    /// `(x, y, w, h)` of tile `idx` in row-major tile order.
    fn rect(&self, idx: usize) -> (u32, u32, u32, u32) {
        let x = (idx % self.cols) as u32 * self.block;
        let y = (idx / self.cols) as u32 * self.block;
        (
            x,
            y,
            self.block.min(self.width - x),
            self.block.min(self.height - y),
        )
    }
}

pub fn default_params() -> ParamSet {
    ParamSet::new()
        .with("block_size", 32)
        .with("shuffle_strength", 0.3)
        .with("block_transform", "none")
        .with("seed", 42)
}

/// Cyclically relocates a seeded subset of tiles, optionally transforming
/// every tile on the way.
pub fn apply(img: &DynamicImage, params: &ParamSet) -> DynamicImage {
    let block = params.int("block_size", 32).clamp(1, MAX_BLOCK_SIZE) as u32;
    let strength = params.float("shuffle_strength", 0.3).clamp(0.0, 1.0);
    let transform = TileTransform::parse(params.choice("block_transform", "none"));
    let seed = params.seed("seed", 42);

    map_raster!(img, |buf| shuffle_blocks(buf, block, strength, transform, seed))
}

pub fn randomize(params: &ParamSet, seed: u64) -> ParamSet {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = params.clone();
    out.set("block_size", *[8, 16, 32, 64, 128].choose(&mut rng).unwrap_or(&32));
    out.set("shuffle_strength", rng.random_range(0.1..0.5));
    let transform = ["none", "rotate", "flip", "jitter"].choose(&mut rng).unwrap_or(&"none");
    out.set("block_transform", *transform);
    out.set("seed", rng.random_range(0..=i32::MAX as i64));
    out
}

/// For every destination tile, the tile whose content it receives.
///
/// A seeded subset of `round(total * strength)` tiles forms one cycle in
/// shuffle order; all other tiles map to themselves.
fn cyclic_sources(total: usize, strength: f64, seed: u64) -> Vec<usize> {
    let mut rng = StdRng::seed_from_u64(seed);
    let count = ((total as f64 * strength).round() as usize).min(total);
    let mut selected = index::sample(&mut rng, total, count).into_vec();
    selected.shuffle(&mut rng);

    let mut sources: Vec<usize> = (0..total).collect();
    for (i, &dst) in selected.iter().enumerate() {
        sources[dst] = selected[(i + 1) % selected.len()];
    }
    sources
}

fn shuffle_blocks<P>(
    img: &ImageBuffer<P, Vec<u8>>,
    block: u32,
    strength: f64,
    transform: TileTransform,
    seed: u64,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let mut out = img.clone();
    if img.width() == 0 || img.height() == 0 {
        return out;
    }
    let grid = Grid::new(img.width(), img.height(), block);
    let sources = cyclic_sources(grid.len(), strength, seed);

    let tiles: Vec<ImageBuffer<P, Vec<u8>>> = (0..grid.len())
        .map(|idx| {
            let (x, y, w, h) = grid.rect(idx);
            let tile = imageops::crop_imm(img, x, y, w, h).to_image();
            let tile_seed = seed.wrapping_add(idx as u64);
            transform_tile(tile, transform, tile_seed)
        })
        .collect();

    for (dst, &src) in sources.iter().enumerate() {
        let (x, y, w, h) = grid.rect(dst);
        let (_, _, sw, sh) = grid.rect(src);
        let tile = &tiles[src];
        if (sw, sh) != (w, h) || tile.dimensions() != (w, h) {
            continue;
        }
        imageops::replace(&mut out, tile, x as i64, y as i64);
    }
    out
}

/// `seed` is the tile's own seed (`base + row * cols + col`), so the
/// transform of a tile does not depend on where it ends up.
fn transform_tile<P>(
    tile: ImageBuffer<P, Vec<u8>>,
    transform: TileTransform,
    seed: u64,
) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let mut rng = StdRng::seed_from_u64(seed);
    match transform {
        TileTransform::None => tile,
        // Quarter turns counter-clockwise.
        TileTransform::Rotate => match rng.random_range(1..=3) {
            1 => imageops::rotate270(&tile),
            2 => imageops::rotate180(&tile),
            _ => imageops::rotate90(&tile),
        },
        TileTransform::Flip => {
            if rng.random::<f64>() < 0.5 {
                imageops::flip_vertical(&tile)
            } else {
                imageops::flip_horizontal(&tile)
            }
        }
        TileTransform::Jitter => {
            let dy = rng.random_range(-2..=2_i64);
            let dx = rng.random_range(-2..=2_i64);
            roll(&tile, dx, dy)
        }
    }
}

/// Circular shift: the pixel at `(x, y)` moves to `(x + dx, y + dy)` modulo
/// the tile size.
fn roll<P>(tile: &ImageBuffer<P, Vec<u8>>, dx: i64, dy: i64) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    if dx == 0 && dy == 0 {
        return tile.clone();
    }
    let (w, h) = (tile.width() as i64, tile.height() as i64);
    ImageBuffer::from_fn(tile.width(), tile.height(), |x, y| {
        let sx = (x as i64 - dx).rem_euclid(w) as u32;
        let sy = (y as i64 - dy).rem_euclid(h) as u32;
        *tile.get_pixel(sx, sy)
    })
}
