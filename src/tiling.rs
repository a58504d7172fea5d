//! Split a raster into tiles for the join.
//!
//! The engine accepts any tile partition, but the reads are
//! cheapest when tiles follow the block layout of the
//! underlying raster. A GDAL band is stored in rectangular
//! blocks, and reading part of a block costs as much as
//! reading the whole of it.
//!
//! [`TileConfig`] produces row bands whose boundaries fall
//! on block boundaries. Each band is optionally split into
//! columns of a fixed width. The tiles partition the
//! configured range of rows: every pixel of the range is in
//! exactly one tile.
use crate::geometry::Region;

/// Builder to configure tiling. Supports configuring the
/// following parameters.
///
/// - `width`, `height` - the dimensions of the raster.
///
/// - `block_size` - the block height of the bands. For
/// multiple bands (eg. data and mask), this is the least
/// common multiple of the individual block heights (see
/// [`add_block_size`]).
///
/// - `tile_height` - the minimum number of rows in each
/// tile. Always an integer multiple of `block_size`.
///
/// - `tile_width` - the number of columns in each tile.
/// Defaults to the full raster width.
///
/// - `start`,`end` - the semi-open range of rows to tile.
///
/// [`add_block_size`]: TileConfig::add_block_size
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TileConfig {
    width: usize,
    height: usize,

    block_size: usize,
    tile_height: usize,
    tile_width: usize,

    start: usize,
    end: usize,
}

mod builder;
mod iters;

#[cfg(feature = "use-rayon")]
mod par_iters;

#[inline]
fn mod_ceil(num: usize, m: usize) -> usize {
    let rem = num % m;
    if rem == 0 {
        num
    } else {
        num + (m - rem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::PixelIndex;

    fn rows(cfg: &TileConfig) -> Vec<(isize, usize)> {
        cfg.iter().map(|t| (t.offset().1, t.height())).collect()
    }

    fn assert_partition(cfg: &TileConfig) {
        let mut seen = vec![0u8; cfg.width() * cfg.height()];
        for tile in cfg {
            for PixelIndex { x, y } in tile.indices() {
                seen[y as usize * cfg.width() + x as usize] += 1;
            }
        }
        for (pos, count) in seen.into_iter().enumerate() {
            let row = pos / cfg.width();
            let expected = (cfg.start()..cfg.end()).contains(&row) as u8;
            assert_eq!(count, expected, "pixel {}", pos);
        }
    }

    #[test]
    fn full_width_bands() {
        let cfg = TileConfig::with_dims(32, 20).with_min_tile_height(6);
        assert_eq!(rows(&cfg), vec![(0, 6), (6, 6), (12, 6), (18, 2)]);
        assert_partition(&cfg);
    }

    #[test]
    fn bands_follow_blocks() {
        let cfg = TileConfig::with_dims(10, 50)
            .add_block_size(4)
            .add_block_size(6)
            .with_min_tile_height(5)
            .with_start(7)
            .with_end(45);
        assert_eq!(cfg.block_size(), 12);
        assert_eq!(cfg.tile_height(), 12);
        // First band stretches to the next block boundary.
        assert_eq!(rows(&cfg), vec![(7, 17), (24, 12), (36, 9)]);
        assert_partition(&cfg);
    }

    #[test]
    fn grid_tiles() {
        let cfg = TileConfig::with_dims(7, 5)
            .with_tile_width(3)
            .with_min_tile_height(2);
        assert_eq!(cfg.len(), 9);
        let last = cfg.iter().last().unwrap();
        assert_eq!(last, Region::new((6, 4), (1, 1)));
        assert_partition(&cfg);
    }

    #[test]
    fn tile_size_from_pixel_count() {
        let cfg = TileConfig::with_dims(100, 100).with_min_tile_size(250);
        assert_eq!(cfg.tile_height(), 3);
        assert_partition(&cfg);
    }

    #[test]
    fn empty_range() {
        let cfg = TileConfig::with_dims(10, 10).with_start(5).with_end(5);
        assert_eq!(cfg.iter().count(), 0);
        assert_eq!(TileConfig::with_dims(0, 10).iter().count(), 0);
    }
}
