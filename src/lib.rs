//! Per-class and per-polygon pixel statistics of a raster
//! under a polygon layer.
//!
//! Given a raster, an optional validity mask, and a layer of
//! classified polygons, the engine counts, for every class
//! and every polygon, the accepted pixels whose center lies
//! in the polygon. It also draws, for every polygon, one of
//! its pixels uniformly at random.
//!
//! The raster is processed in tiles (see [`tiling`]), each
//! tile by one of a fixed set of workers. Every worker owns
//! its partial statistics; the partials are merged once at
//! the end. The result doesn't depend on the tiling, nor on
//! how tiles are assigned to workers.
//!
//! ```
//! use footprint::prelude::*;
//! use geo::polygon;
//!
//! # fn main() -> footprint::Result<()> {
//! let geometry = RasterGeometry::axis_aligned((0., 0.), (1., 1.), (16, 16))?;
//! let raster = GeometryOnly(geometry);
//! let layer: VectorLayer = vec![Feature::new(
//!     1,
//!     polygon![(x: 0., y: 0.), (x: 4., y: 0.), (x: 4., y: 4.), (x: 0., y: 4.)],
//! )
//! .with_field("class", 7)]
//! .into_iter()
//! .collect();
//!
//! let mut engine = Footprint::configure(&raster, None, &layer, "class")?;
//! let tiles = TileConfig::for_geometry(raster.geometry()).with_min_tile_height(4).tiles();
//! let stats = engine.run(&tiles, 2)?;
//! assert_eq!(stats.class_counts()[&7], 16);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::{Error, FeatureError, Result};

pub mod geometry;
pub mod raster;
pub mod traversal;

pub mod layer;

pub mod footprint;
pub mod join;
pub mod stats;

pub mod tiling;

#[cfg(feature = "gdal")]
pub mod reader;

pub mod prelude;
