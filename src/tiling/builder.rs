#[cfg(feature = "gdal")]
use anyhow::Context;
#[cfg(feature = "gdal")]
use gdal::Dataset;

use super::{mod_ceil, TileConfig};
use crate::geometry::RasterGeometry;

/// Constructors
impl TileConfig {
    /// Construct a `TileConfig` with a given raster size.
    /// Tiles default to single full-width rows.
    pub fn with_dims(width: usize, height: usize) -> Self {
        TileConfig {
            width,
            height,

            block_size: 1,
            tile_height: 1,
            tile_width: width.max(1),

            start: 0,
            end: height,
        }
    }

    /// Construct a `TileConfig` covering a raster geometry.
    pub fn for_geometry(geometry: &RasterGeometry) -> Self {
        let (width, height) = geometry.dims();
        TileConfig::with_dims(width, height)
    }

    /// Construct a `TileConfig` from a raster [`Dataset`],
    /// reading the size from it. An optional list of bands
    /// may be specified to configure the `block_size`.
    #[cfg(feature = "gdal")]
    pub fn for_dataset<I: IntoIterator<Item = isize>>(
        ds: &Dataset,
        bands: Option<I>,
    ) -> crate::Result<Self> {
        let size = ds.raster_size();
        let mut cfg = TileConfig::with_dims(size.0, size.1);

        if let Some(bands) = bands {
            for band_idx in bands {
                let band = ds
                    .rasterband(band_idx)
                    .with_context(|| format!("unable to open rasterband {}", band_idx))?;
                cfg = cfg.add_block_size(band.block_size().1);
            }
        }

        Ok(cfg)
    }
}

/// Builder methods to configure the parameters
impl TileConfig {
    /// Accumulate the given `block_size` to the
    /// configuration by calculating the least common
    /// multiple with the current value. Zero is read as 1.
    pub fn add_block_size(mut self, block_size: usize) -> Self {
        self.block_size = lcm(self.block_size, block_size.max(1));
        self.adjust_tile_height();
        self
    }

    /// Set the minimum `tile_height`. The actual value is
    /// the least multiple of `block_size` larger or equal to
    /// the given value.
    pub fn with_min_tile_height(mut self, min_tile_height: usize) -> Self {
        self.tile_height = min_tile_height.max(1);
        self.adjust_tile_height();
        self
    }

    /// Set the minimum `tile_height` by specifying the
    /// minimum number of pixels in each tile.
    pub fn with_min_tile_size(self, min_tile_size: usize) -> Self {
        let min_height = (min_tile_size + self.tile_width - 1) / self.tile_width;
        self.with_min_tile_height(min_height)
    }

    /// Split each band into columns `tile_width` wide. The
    /// last column may be narrower.
    pub fn with_tile_width(mut self, tile_width: usize) -> Self {
        self.tile_width = tile_width.clamp(1, self.width.max(1));
        self
    }

    /// Set the first row of the tiled range.
    pub fn with_start(mut self, start: usize) -> Self {
        self.start = start.min(self.height);
        self
    }

    /// Set the end (not included) row of the tiled range.
    pub fn with_end(mut self, end: usize) -> Self {
        self.end = end.min(self.height);
        self
    }

    #[inline]
    fn adjust_tile_height(&mut self) {
        self.tile_height = mod_ceil(self.tile_height, self.block_size);
    }
}

/// Getter methods to read the parameters of the config
impl TileConfig {
    pub fn width(&self) -> usize {
        self.width
    }
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }
    pub fn tile_height(&self) -> usize {
        self.tile_height
    }
    pub fn tile_width(&self) -> usize {
        self.tile_width
    }

    pub fn start(&self) -> usize {
        self.start
    }
    pub fn end(&self) -> usize {
        self.end
    }
}

#[inline]
fn lcm(a: usize, b: usize) -> usize {
    a / gcd(a, b) * b
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 {
        return a;
    }
    gcd(b, a % b)
}
