//! Raster index rectangles and the index <-> physical point
//! transform.
//!
//! Pixel indices are `(x, y)` = `(column, row)` pairs. A
//! [`PixelTransform`] maps (fractional) pixel coordinates to
//! physical coordinates; the center of pixel `(x, y)` is the
//! image of `(x + 0.5, y + 0.5)`, as in GDAL.
use geo::{Coord, Rect};
use nalgebra::{Matrix3, Point2};
use serde_derive::Serialize;

use crate::layer::PolygonFeature;
use crate::{Error, Result};

/// Affine transform from pixel to physical coordinates,
/// as a homogeneous 3x3 matrix.
pub type PixelTransform = Matrix3<f64>;

/// Dimensions `(width, height)` of a raster or window.
pub type RasterDims = (usize, usize);

/// Offset `(x, y)` of a window in a raster.
pub type RasterOffset = (isize, isize);

/// A window: offset and dimensions.
pub type RasterWindow = (RasterOffset, RasterDims);

/// Convert a GDAL geo-transform into a [`PixelTransform`].
pub fn transform_from_gdal(t: &[f64]) -> PixelTransform {
    Matrix3::new(t[1], t[2], t[0], t[4], t[5], t[3], 0., 0., 1.)
}

/// Index of a pixel in raster coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct PixelIndex {
    pub x: isize,
    pub y: isize,
}

impl PixelIndex {
    #[inline]
    pub fn new(x: isize, y: isize) -> Self {
        PixelIndex { x, y }
    }
}

impl From<(isize, isize)> for PixelIndex {
    fn from((x, y): (isize, isize)) -> Self {
        PixelIndex { x, y }
    }
}

/// An axis-aligned rectangle of pixel indices. Iteration
/// order over a region is raster order: row by row, left to
/// right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Region {
    x: isize,
    y: isize,
    width: usize,
    height: usize,
}

impl Region {
    pub fn new(offset: RasterOffset, size: RasterDims) -> Self {
        Region {
            x: offset.0,
            y: offset.1,
            width: size.0,
            height: size.1,
        }
    }

    /// The region spanning two corner indices, both
    /// included. The corners may be given in any order.
    pub fn from_corners(a: PixelIndex, b: PixelIndex) -> Self {
        let (x0, x1) = (a.x.min(b.x), a.x.max(b.x));
        let (y0, y1) = (a.y.min(b.y), a.y.max(b.y));
        Region {
            x: x0,
            y: y0,
            width: x1.abs_diff(x0).saturating_add(1),
            height: y1.abs_diff(y0).saturating_add(1),
        }
    }

    #[inline]
    pub fn offset(&self) -> RasterOffset {
        (self.x, self.y)
    }

    #[inline]
    pub fn size(&self) -> RasterDims {
        (self.width, self.height)
    }

    #[inline]
    pub fn window(&self) -> RasterWindow {
        (self.offset(), self.size())
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// First index of the region.
    #[inline]
    pub fn index(&self) -> PixelIndex {
        PixelIndex::new(self.x, self.y)
    }

    /// Last index of the region (inclusive), or `None` if
    /// the region is empty.
    pub fn upper_index(&self) -> Option<PixelIndex> {
        if self.is_empty() {
            return None;
        }
        Some(PixelIndex::new(
            self.x + self.width as isize - 1,
            self.y + self.height as isize - 1,
        ))
    }

    /// Number of pixels in the region.
    #[inline]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn contains(&self, idx: PixelIndex) -> bool {
        idx.x >= self.x
            && idx.y >= self.y
            && idx.x < self.x + self.width as isize
            && idx.y < self.y + self.height as isize
    }

    /// Intersect `self` with `other` in place. Returns
    /// `false`, leaving `self` unchanged, if the
    /// intersection is empty.
    pub fn crop(&mut self, other: &Region) -> bool {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.width as isize).min(other.x + other.width as isize);
        let y1 = (self.y + self.height as isize).min(other.y + other.height as isize);
        if x1 <= x0 || y1 <= y0 {
            return false;
        }
        *self = Region {
            x: x0,
            y: y0,
            width: (x1 - x0) as usize,
            height: (y1 - y0) as usize,
        };
        true
    }

    /// Index at position `pos` in raster order. `pos` must
    /// be less than `len()`.
    #[inline]
    pub fn index_at(&self, pos: usize) -> PixelIndex {
        debug_assert!(pos < self.len());
        PixelIndex::new(
            self.x + (pos % self.width) as isize,
            self.y + (pos / self.width) as isize,
        )
    }

    /// Position of `idx` in raster order, if it lies in the
    /// region.
    pub fn position_of(&self, idx: PixelIndex) -> Option<usize> {
        if !self.contains(idx) {
            return None;
        }
        let col = (idx.x - self.x) as usize;
        let row = (idx.y - self.y) as usize;
        Some(row * self.width + col)
    }

    /// Iterate over the indices of the region in raster
    /// order.
    pub fn indices(&self) -> impl ExactSizeIterator<Item = PixelIndex> + '_ {
        (0..self.len()).map(move |pos| self.index_at(pos))
    }
}

/// Geometry of a raster: its dimensions and its pixel to
/// physical transform.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterGeometry {
    transform: PixelTransform,
    inverse: PixelTransform,
    dims: RasterDims,
}

/// Relative tolerance used to compare two geometries.
const GEOMETRY_EPSILON: f64 = 1e-9;

impl RasterGeometry {
    pub fn new(transform: PixelTransform, dims: RasterDims) -> Result<Self> {
        let inverse = transform
            .try_inverse()
            .ok_or_else(|| Error::Configuration("couldn't invert pixel transform".into()))?;
        Ok(RasterGeometry {
            transform,
            inverse,
            dims,
        })
    }

    /// Construct from a GDAL geo-transform.
    pub fn from_gdal(geo_transform: &[f64], dims: RasterDims) -> Result<Self> {
        if geo_transform.len() < 6 {
            return Err(Error::Configuration(format!(
                "geo-transform must have 6 coefficients, got {}",
                geo_transform.len()
            )));
        }
        RasterGeometry::new(transform_from_gdal(geo_transform), dims)
    }

    /// Axis-aligned geometry with the top-left corner of the
    /// first pixel at `origin`. Use a negative `pixel_size.1`
    /// for the usual north-up layout.
    pub fn axis_aligned(origin: (f64, f64), pixel_size: (f64, f64), dims: RasterDims) -> Result<Self> {
        RasterGeometry::from_gdal(
            &[origin.0, pixel_size.0, 0., origin.1, 0., pixel_size.1],
            dims,
        )
    }

    #[inline]
    pub fn dims(&self) -> RasterDims {
        self.dims
    }

    #[inline]
    pub fn transform(&self) -> &PixelTransform {
        &self.transform
    }

    /// The region covering the whole raster.
    #[inline]
    pub fn full_region(&self) -> Region {
        Region::new((0, 0), self.dims)
    }

    /// Physical coordinates of the center of pixel `idx`.
    pub fn index_to_point(&self, idx: PixelIndex) -> Coord<f64> {
        let pt = self
            .transform
            .transform_point(&Point2::new(idx.x as f64 + 0.5, idx.y as f64 + 0.5));
        Coord { x: pt.x, y: pt.y }
    }

    /// Index of the pixel containing the physical point
    /// `pt`. Not restricted to the raster extent.
    pub fn point_to_index(&self, pt: Coord<f64>) -> PixelIndex {
        let px = self.inverse.transform_point(&Point2::new(pt.x, pt.y));
        PixelIndex::new(px.x.floor() as isize, px.y.floor() as isize)
    }

    /// Region of pixels spanned by a physical envelope. All
    /// four corners are converted, as the transform may flip
    /// or rotate the axes. The region is clipped to one pixel
    /// beyond the raster extent.
    pub fn envelope_to_region(&self, envelope: &Rect<f64>) -> Region {
        let (min, max) = (envelope.min(), envelope.max());
        let corners = [
            (min.x, min.y),
            (max.x, min.y),
            (min.x, max.y),
            (max.x, max.y),
        ]
        .map(|(x, y)| self.inverse.transform_point(&Point2::new(x, y)));

        let (width, height) = (self.dims.0 as f64, self.dims.1 as f64);
        let lower = |f: fn(&Point2<f64>) -> f64, len: f64| {
            let v = corners.iter().map(f).fold(f64::INFINITY, f64::min);
            v.max(-1.).min(len).floor() as isize
        };
        let upper = |f: fn(&Point2<f64>) -> f64, len: f64| {
            let v = corners.iter().map(f).fold(f64::NEG_INFINITY, f64::max);
            v.max(-1.).min(len).floor() as isize
        };
        Region::from_corners(
            PixelIndex::new(lower(|p| p.x, width), lower(|p| p.y, height)),
            PixelIndex::new(upper(|p| p.x, width), upper(|p| p.y, height)),
        )
    }

    /// Physical envelope covered by the pixels of `region`,
    /// or `None` for an empty region.
    pub fn region_to_envelope(&self, region: &Region) -> Option<Rect<f64>> {
        if region.is_empty() {
            return None;
        }
        let (x, y) = region.offset();
        let (w, h) = region.size();
        let corner = |cx: f64, cy: f64| {
            let pt = self.transform.transform_point(&Point2::new(cx, cy));
            Coord { x: pt.x, y: pt.y }
        };
        let a = corner(x as f64, y as f64);
        let b = corner((x + w as isize) as f64, (y + h as isize) as f64);
        let c = corner(x as f64, (y + h as isize) as f64);
        let d = corner((x + w as isize) as f64, y as f64);

        let min = Coord {
            x: a.x.min(b.x).min(c.x).min(d.x),
            y: a.y.min(b.y).min(c.y).min(d.y),
        };
        let max = Coord {
            x: a.x.max(b.x).max(c.x).max(d.x),
            y: a.y.max(b.y).max(c.y).max(d.y),
        };
        Some(Rect::new(min, max))
    }

    /// Whether `other` has the same dimensions and (up to
    /// rounding) the same transform.
    pub fn same_as(&self, other: &RasterGeometry) -> bool {
        if self.dims != other.dims {
            return false;
        }
        let scale = self.transform.amax().max(other.transform.amax()).max(1.);
        (self.transform - other.transform).amax() <= GEOMETRY_EPSILON * scale
    }
}

/// Region of pixels spanned by the bounding envelope of a
/// feature, or `None` if the feature has no envelope.
pub fn feature_bounding_region<F: PolygonFeature + ?Sized>(
    geometry: &RasterGeometry,
    feature: &F,
) -> Option<Region> {
    feature
        .envelope()
        .map(|envelope| geometry.envelope_to_region(&envelope))
}
