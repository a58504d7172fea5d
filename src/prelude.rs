pub use crate::{Error, FeatureError, Result};

pub use crate::footprint::*;
pub use crate::geometry::*;
pub use crate::join::*;
pub use crate::layer::*;
pub use crate::raster::*;
#[cfg(feature = "gdal")]
pub use crate::reader::*;
pub use crate::stats::*;
pub use crate::tiling::*;
pub use crate::traversal::*;
