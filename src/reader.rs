//! Read engine inputs from GDAL datasets.
//!
//! Rasters are read tile by tile along the band's block
//! layout (see [`TileConfig`]). Vector layers are loaded into
//! a [`VectorLayer`]; geometries that are neither polygons
//! nor multi-polygons are kept without geometry, so the
//! engine reports them as skipped features.

use crate::geometry::{RasterDims, RasterGeometry, RasterOffset, Region};
use crate::layer::{Feature, FieldValue, VectorLayer};
use crate::raster::{GridRaster, MaskValue};
use crate::tiling::TileConfig;
use crate::Result;
use anyhow::{format_err, Context};
use gdal::{
    raster::{GdalType, RasterBand},
    vector::{FieldValue as OgrValue, LayerAccess},
    Dataset,
};
use geo::{Geometry, MultiPolygon};
use ndarray::{s, Array2};
use tracing::{debug, warn};

/// Minimum number of pixels read at once.
const READ_TILE_SIZE: usize = 0x10000;

/// Abstracts reading tiles from a raster.
pub trait TileReader {
    /// Emulate [`RasterBand::read_into_slice`].
    fn read_into_slice<T>(&self, out: &mut [T], off: RasterOffset, size: RasterDims) -> Result<()>
    where
        T: GdalType + Copy;

    /// Helper to read into an ndarray of shape `(height,
    /// width)`.
    fn read_as_array<T>(&self, off: RasterOffset, size: RasterDims) -> Result<Array2<T>>
    where
        T: GdalType + Copy + Default,
    {
        let mut buf = vec![T::default(); size.0 * size.1];
        self.read_into_slice(&mut buf[..], off, size)?;
        Ok(Array2::from_shape_vec((size.1, size.0), buf).map_err(anyhow::Error::from)?)
    }

    /// Helper to read the pixels of a tile.
    fn read_tile<T>(&self, tile: &Region) -> Result<Array2<T>>
    where
        T: GdalType + Copy + Default,
    {
        self.read_as_array(tile.offset(), tile.size())
    }
}

impl<'a> TileReader for RasterBand<'a> {
    fn read_into_slice<T>(&self, out: &mut [T], off: RasterOffset, size: RasterDims) -> Result<()>
    where
        T: GdalType + Copy,
    {
        Ok(self
            .read_into_slice(off, size, size, out, None)
            .with_context(|| {
                format_err!(
                    "reading window @ ({},{}) of dimension ({}x{})",
                    off.0,
                    off.1,
                    size.0,
                    size.1
                )
            })?)
    }
}

/// Geometry of a raster dataset.
pub fn read_geometry(ds: &Dataset) -> Result<RasterGeometry> {
    let transform = ds
        .geo_transform()
        .context("reading geo-transform of raster")?;
    RasterGeometry::from_gdal(&transform, ds.raster_size())
}

/// Read band `band_idx` (1-based) of a dataset into memory.
pub fn read_grid<T>(ds: &Dataset, band_idx: isize) -> Result<GridRaster<T>>
where
    T: GdalType + Copy + Default,
{
    let geometry = read_geometry(ds)?;
    let band = ds
        .rasterband(band_idx)
        .with_context(|| format!("unable to open rasterband {}", band_idx))?;

    let (width, height) = geometry.dims();
    let mut data = Array2::default((height, width));
    let cfg = TileConfig::for_dataset(ds, Some([band_idx]))?.with_min_tile_size(READ_TILE_SIZE);
    for tile in &cfg {
        let values: Array2<T> = band.read_tile(&tile)?;
        let (x, y) = (tile.offset().0 as usize, tile.offset().1 as usize);
        data.slice_mut(s![y..y + tile.height(), x..x + tile.width()])
            .assign(&values);
    }
    debug!(band = band_idx, width, height, tiles = cfg.len(), "raster read");

    GridRaster::new(geometry, data)
}

/// Read a band as a mask of accepted pixels. Tiles are read
/// as `f64` and reduced with [`MaskValue::is_accepted`], so
/// the mask takes one byte per pixel whatever the band type.
pub fn read_mask(ds: &Dataset, band_idx: isize) -> Result<GridRaster<bool>> {
    let geometry = read_geometry(ds)?;
    let band = ds
        .rasterband(band_idx)
        .with_context(|| format!("unable to open rasterband {}", band_idx))?;

    let (width, height) = geometry.dims();
    let mut data = Array2::from_elem((height, width), false);
    let cfg = TileConfig::for_dataset(ds, Some([band_idx]))?.with_min_tile_size(READ_TILE_SIZE);
    for tile in &cfg {
        let values: Array2<f64> = band.read_tile(&tile)?;
        let (x, y) = (tile.offset().0 as usize, tile.offset().1 as usize);
        data.slice_mut(s![y..y + tile.height(), x..x + tile.width()])
            .zip_mut_with(&values, |accepted, value| {
                *accepted = MaskValue::is_accepted(*value)
            });
    }
    debug!(band = band_idx, width, height, tiles = cfg.len(), "mask read");

    GridRaster::new(geometry, data)
}

/// Read a vector layer, by name or the first one.
pub fn read_vector_layer(ds: &Dataset, name: Option<&str>) -> Result<VectorLayer> {
    let mut layer = match name {
        Some(name) => ds
            .layer_by_name(name)
            .with_context(|| format!("unable to open layer {}", name))?,
        None => ds.layer(0).context("unable to open first layer")?,
    };

    let mut out = VectorLayer::new();
    for (pos, feature) in layer.features().enumerate() {
        let id = feature.fid().unwrap_or(pos as u64);
        let geometry = match feature.geometry().map(|g| g.to_geo()) {
            Some(Ok(Geometry::Polygon(p))) => Some(MultiPolygon::new(vec![p])),
            Some(Ok(Geometry::MultiPolygon(mp))) => Some(mp),
            Some(Ok(_)) => {
                debug!(feature = id, "not a polygon geometry");
                None
            }
            Some(Err(e)) => {
                warn!(feature = id, error = %e, "unable to convert geometry");
                None
            }
            None => None,
        };

        let mut record = Feature::with_geometry(id, geometry);
        for (name, value) in feature.fields() {
            record.set_field(&name, convert_field(value));
        }
        out.push(record);
    }
    debug!(features = out.len(), "vector layer read");

    Ok(out)
}

fn convert_field(value: Option<OgrValue>) -> FieldValue {
    match value {
        Some(OgrValue::IntegerValue(v)) => FieldValue::Integer(v as i64),
        Some(OgrValue::Integer64Value(v)) => FieldValue::Integer(v),
        Some(OgrValue::RealValue(v)) => FieldValue::Real(v),
        Some(OgrValue::StringValue(v)) => FieldValue::Text(v),
        _ => FieldValue::Null,
    }
}
