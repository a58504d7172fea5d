//! Randomly addressable rasters.
//!
//! The engine never owns pixel data. It reads through the
//! [`Raster`] trait, and through [`Mask`] for the optional
//! mask band. [`GridRaster`] is an in-memory implementation
//! backed by an [`Array2`].
use ndarray::Array2;

use crate::geometry::{PixelIndex, RasterDims, RasterGeometry, Region};
use crate::{Error, Result};

/// A raster with a geometry and random access to its pixel
/// values.
pub trait Raster: Sync {
    type Pixel: Copy;

    fn geometry(&self) -> &RasterGeometry;

    /// Value at `idx`, or `None` outside the raster.
    fn pixel(&self, idx: PixelIndex) -> Option<Self::Pixel>;
}

/// Acceptance policy of mask values: a pixel is accepted
/// iff its mask value is nonzero. `NaN` is rejected.
pub trait MaskValue: Copy {
    fn is_accepted(self) -> bool;
}

macro_rules! impl_mask_value {
    ($($t:ty),*) => {
        $(impl MaskValue for $t {
            #[inline]
            fn is_accepted(self) -> bool {
                self != 0
            }
        })*
    };
}
impl_mask_value!(u8, u16, u32, u64, i8, i16, i32, i64);

impl MaskValue for f32 {
    #[inline]
    fn is_accepted(self) -> bool {
        !self.is_nan() && self != 0.
    }
}

impl MaskValue for f64 {
    #[inline]
    fn is_accepted(self) -> bool {
        !self.is_nan() && self != 0.
    }
}

impl MaskValue for bool {
    #[inline]
    fn is_accepted(self) -> bool {
        self
    }
}

/// Object-safe view of a mask raster.
pub trait Mask: Sync {
    fn mask_geometry(&self) -> &RasterGeometry;

    /// Whether `idx` is accepted. Indices outside the mask
    /// are rejected.
    fn is_accepted(&self, idx: PixelIndex) -> bool;
}

impl<R> Mask for R
where
    R: Raster,
    R::Pixel: MaskValue,
{
    fn mask_geometry(&self) -> &RasterGeometry {
        self.geometry()
    }

    #[inline]
    fn is_accepted(&self, idx: PixelIndex) -> bool {
        self.pixel(idx).map_or(false, MaskValue::is_accepted)
    }
}

/// A raster held in memory. The array is indexed by
/// `(row, column)`, so its shape is `(height, width)`.
#[derive(Debug, Clone)]
pub struct GridRaster<T> {
    geometry: RasterGeometry,
    data: Array2<T>,
}

impl<T: Copy> GridRaster<T> {
    pub fn new(geometry: RasterGeometry, data: Array2<T>) -> Result<Self> {
        let (width, height) = geometry.dims();
        if data.dim() != (height, width) {
            return Err(Error::Configuration(format!(
                "array of shape {:?} doesn't match raster dimensions {}x{}",
                data.dim(),
                width,
                height
            )));
        }
        Ok(GridRaster { geometry, data })
    }

    /// A raster filled with `value`.
    pub fn filled(geometry: RasterGeometry, value: T) -> Self {
        let (width, height) = geometry.dims();
        GridRaster {
            data: Array2::from_elem((height, width), value),
            geometry,
        }
    }

    /// Build from a function of the pixel index.
    pub fn from_fn<F: FnMut(PixelIndex) -> T>(geometry: RasterGeometry, mut f: F) -> Self {
        let (width, height) = geometry.dims();
        let data = Array2::from_shape_fn((height, width), |(row, col)| {
            f(PixelIndex::new(col as isize, row as isize))
        });
        GridRaster { geometry, data }
    }

    #[inline]
    pub fn dims(&self) -> RasterDims {
        self.geometry.dims()
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    /// Overwrite every pixel of `region` (cropped to the
    /// raster) with `value`.
    pub fn fill_region(&mut self, region: &Region, value: T) {
        let mut region = *region;
        if !region.crop(&self.geometry.full_region()) {
            return;
        }
        for idx in region.indices() {
            self.data[(idx.y as usize, idx.x as usize)] = value;
        }
    }

    pub fn into_inner(self) -> (RasterGeometry, Array2<T>) {
        (self.geometry, self.data)
    }
}

impl<T: Copy + Sync> Raster for GridRaster<T> {
    type Pixel = T;

    fn geometry(&self) -> &RasterGeometry {
        &self.geometry
    }

    #[inline]
    fn pixel(&self, idx: PixelIndex) -> Option<T> {
        if idx.x < 0 || idx.y < 0 {
            return None;
        }
        self.data.get((idx.y as usize, idx.x as usize)).copied()
    }
}

/// A raster that carries only a geometry. Useful when the
/// statistics don't depend on pixel values, so the data
/// band need not be read.
#[derive(Debug, Clone)]
pub struct GeometryOnly(pub RasterGeometry);

impl Raster for GeometryOnly {
    type Pixel = ();

    fn geometry(&self) -> &RasterGeometry {
        &self.0
    }

    #[inline]
    fn pixel(&self, idx: PixelIndex) -> Option<()> {
        if self.0.full_region().contains(idx) {
            Some(())
        } else {
            None
        }
    }
}
