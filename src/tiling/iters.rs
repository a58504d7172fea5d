use super::{mod_ceil, TileConfig};
use crate::geometry::Region;
use std::{iter::*, ops::Range};

impl<'a> IntoIterator for &'a TileConfig {
    type Item = Region;
    type IntoIter = Map<Range<usize>, Box<dyn Fn(usize) -> Region + 'a>>;

    fn into_iter(self) -> Self::IntoIter {
        let (count, func) = self.iter_mapper();
        (0..count).map(Box::new(func))
    }
}

impl TileConfig {
    /// Number of bands, number of columns, and the end of
    /// the first band.
    fn calc_layout(&self) -> [usize; 3] {
        if self.start >= self.end || self.width == 0 {
            return [0, 0, 0];
        }

        // The first band ends at a block boundary so that
        // all the following bands are block aligned.
        let first_end = mod_ceil(self.start + self.tile_height, self.block_size).min(self.end);
        debug_assert!(first_end > self.start);

        let bands = mod_ceil(self.end - first_end, self.tile_height) / self.tile_height + 1;
        let columns = mod_ceil(self.width, self.tile_width) / self.tile_width;
        [bands, columns, first_end]
    }

    pub(super) fn iter_mapper(&self) -> (usize, impl Fn(usize) -> Region + Send + Sync + '_) {
        debug_assert!(
            self.block_size > 0
                && self.tile_width > 0
                && self.end <= self.height
                && self.tile_height % self.block_size == 0,
            "TileConfig preconditions failed"
        );

        let [bands, columns, first_end] = self.calc_layout();

        (bands * columns, move |i| {
            let (band, column) = (i / columns, i % columns);
            let (row_start, row_end) = if band == 0 {
                (self.start, first_end)
            } else {
                let row_start = first_end + (band - 1) * self.tile_height;
                (row_start, (row_start + self.tile_height).min(self.end))
            };
            let col_start = column * self.tile_width;
            let col_end = (col_start + self.tile_width).min(self.width);
            Region::new(
                (col_start as isize, row_start as isize),
                (col_end - col_start, row_end - row_start),
            )
        })
    }

    /// Number of tiles.
    pub fn len(&self) -> usize {
        let [bands, columns, _] = self.calc_layout();
        bands * columns
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Create an [ `ExactSizeIterator` ] over the tiles, in
    /// raster order.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = Region> + '_ {
        let (count, func) = self.iter_mapper();
        (0..count).map(func)
    }

    /// Collect the tiles.
    pub fn tiles(&self) -> Vec<Region> {
        self.iter().collect()
    }
}
