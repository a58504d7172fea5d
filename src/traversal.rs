//! Raster-order traversal of a region, optionally skipping
//! the pixels rejected by a mask.
//!
//! A [`MaskedCursor`] pairs two independent [`RegionCursor`]s
//! over the same region, one on the data raster and one on
//! the mask, and moves them in lock-step. Positions whose
//! mask value is rejected are never exposed: the cursor is
//! always either on an accepted pixel or at the end.
//!
//! ```text
//! region  . x x . x      (x = accepted)
//! begin     ^
//! end                ^   (one past the last position)
//! ```
use crate::geometry::{PixelIndex, Region};
use crate::raster::{Mask, Raster};

/// A cursor walking a region in raster order. The end
/// position is one past the last pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionCursor {
    region: Region,
    pos: usize,
}

impl RegionCursor {
    pub fn new(region: Region) -> Self {
        RegionCursor { region, pos: 0 }
    }

    #[inline]
    pub fn region(&self) -> &Region {
        &self.region
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn go_to_begin(&mut self) {
        self.pos = 0;
    }

    #[inline]
    pub fn go_to_end(&mut self) {
        self.pos = self.region.len();
    }

    #[inline]
    pub fn is_at_begin(&self) -> bool {
        self.pos == 0
    }

    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.region.len()
    }

    /// Current index. Must not be called at the end.
    #[inline]
    pub fn index(&self) -> PixelIndex {
        self.region.index_at(self.pos)
    }

    /// Step forward; a no-op at the end.
    #[inline]
    pub fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    /// Step backward; a no-op at the beginning.
    #[inline]
    pub fn retreat(&mut self) {
        if self.pos > 0 {
            self.pos -= 1;
        }
    }
}

/// Traversal of the accepted pixels of a region. See the
/// [module documentation](self).
pub struct MaskedCursor<'a, R: Raster + ?Sized> {
    raster: &'a R,
    data: RegionCursor,
    mask: Option<(&'a dyn Mask, RegionCursor)>,
}

impl<'a, R: Raster + ?Sized> MaskedCursor<'a, R> {
    /// Construct a cursor over `region`, positioned at the
    /// first accepted pixel. Without a mask, every pixel is
    /// accepted.
    pub fn new(mask: Option<&'a dyn Mask>, raster: &'a R, region: Region) -> Self {
        let mut cursor = MaskedCursor {
            raster,
            data: RegionCursor::new(region),
            mask: mask.map(|m| (m, RegionCursor::new(region))),
        };
        cursor.go_to_begin();
        cursor
    }

    #[inline]
    pub fn region(&self) -> &Region {
        self.data.region()
    }

    /// Position at the first accepted pixel, or at the end
    /// if there is none.
    pub fn go_to_begin(&mut self) {
        self.data.go_to_begin();
        if let Some((_, cursor)) = &mut self.mask {
            cursor.go_to_begin();
        }
        while !self.is_at_end() && !self.is_accepted() {
            self.step_forward();
        }
    }

    pub fn go_to_end(&mut self) {
        self.data.go_to_end();
        if let Some((_, cursor)) = &mut self.mask {
            cursor.go_to_end();
        }
    }

    /// True when either the data or the mask cursor is
    /// exhausted.
    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.data.is_at_end() || self.mask.map_or(false, |(_, cursor)| cursor.is_at_end())
    }

    /// True when no accepted pixel precedes the current
    /// position. The raw first position may be rejected, so
    /// this scans backward (at most the region size).
    pub fn is_at_begin(&self) -> bool {
        if self.data.is_at_begin() {
            return true;
        }
        self.previous_accepted().is_none()
    }

    /// Move to the next accepted pixel, or to the end.
    pub fn advance(&mut self) {
        if self.is_at_end() {
            return;
        }
        loop {
            self.step_forward();
            if self.is_at_end() || self.is_accepted() {
                break;
            }
        }
    }

    /// Move to the previous accepted pixel. A no-op if there
    /// is none, so the cursor never lands on a rejected
    /// pixel.
    pub fn retreat(&mut self) {
        if let Some((data, mask)) = self.previous_accepted() {
            self.data = data;
            if let (Some((_, cursor)), Some(prev)) = (&mut self.mask, mask) {
                *cursor = prev;
            }
        }
    }

    /// Current index. Must not be called at the end.
    #[inline]
    pub fn index(&self) -> PixelIndex {
        self.data.index()
    }

    /// Data value at the current index.
    #[inline]
    pub fn value(&self) -> Option<R::Pixel> {
        self.raster.pixel(self.index())
    }

    /// Consume the cursor into an iterator over the indices
    /// from the current position to the end.
    pub fn into_indices(self) -> MaskedIndices<'a, R> {
        MaskedIndices { cursor: self }
    }

    #[inline]
    fn is_accepted(&self) -> bool {
        match &self.mask {
            Some((mask, cursor)) => mask.is_accepted(cursor.index()),
            None => true,
        }
    }

    #[inline]
    fn step_forward(&mut self) {
        self.data.advance();
        if let Some((_, cursor)) = &mut self.mask {
            cursor.advance();
        }
    }

    fn previous_accepted(&self) -> Option<(RegionCursor, Option<RegionCursor>)> {
        let mut data = self.data;
        let mut mask = self.mask;
        while !data.is_at_begin() {
            data.retreat();
            match &mut mask {
                Some((m, cursor)) => {
                    cursor.retreat();
                    if m.is_accepted(cursor.index()) {
                        return Some((data, Some(*cursor)));
                    }
                }
                None => return Some((data, None)),
            }
        }
        None
    }
}

/// Iterator over the accepted indices of a
/// [`MaskedCursor`].
pub struct MaskedIndices<'a, R: Raster + ?Sized> {
    cursor: MaskedCursor<'a, R>,
}

impl<'a, R: Raster + ?Sized> Iterator for MaskedIndices<'a, R> {
    type Item = PixelIndex;

    fn next(&mut self) -> Option<PixelIndex> {
        if self.cursor.is_at_end() {
            return None;
        }
        let idx = self.cursor.index();
        self.cursor.advance();
        Some(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::RasterGeometry;
    use crate::raster::GridRaster;

    fn grid<T: Copy>(dims: (usize, usize), value: T) -> GridRaster<T> {
        let g = RasterGeometry::axis_aligned((0., 0.), (1., 1.), dims).unwrap();
        GridRaster::filled(g, value)
    }

    /// Mask over a 5x3 raster; accepted where `pattern` is 1.
    fn patterned_mask(pattern: &[u8]) -> GridRaster<u8> {
        let g = RasterGeometry::axis_aligned((0., 0.), (1., 1.), (5, 3)).unwrap();
        GridRaster::from_fn(g, |idx| pattern[(idx.y * 5 + idx.x) as usize])
    }

    #[test]
    fn region_cursor_bounds() {
        let mut c = RegionCursor::new(Region::new((0, 0), (2, 1)));
        assert!(c.is_at_begin() && !c.is_at_end());
        c.advance();
        c.advance();
        assert!(c.is_at_end());
        c.advance();
        assert_eq!(c.position(), 2);
        c.retreat();
        assert_eq!(c.index(), PixelIndex::new(1, 0));
    }

    #[test]
    fn no_mask_is_raster_order() {
        let data = grid((3, 2), 0f32);
        let region = Region::new((1, 0), (2, 2));
        let visited: Vec<_> = MaskedCursor::new(None, &data, region).into_indices().collect();
        assert_eq!(
            visited,
            vec![
                PixelIndex::new(1, 0),
                PixelIndex::new(2, 0),
                PixelIndex::new(1, 1),
                PixelIndex::new(2, 1),
            ]
        );
    }

    #[test]
    fn skips_rejected_pixels() {
        #[rustfmt::skip]
        let mask = patterned_mask(&[
            0, 0, 1, 0, 1,
            0, 0, 0, 0, 0,
            1, 0, 0, 0, 0,
        ]);
        let data = grid((5, 3), 1u16);
        let region = Region::new((0, 0), (5, 3));
        let cursor = MaskedCursor::new(Some(&mask), &data, region);
        assert_eq!(cursor.index(), PixelIndex::new(2, 0));
        assert!(cursor.is_at_begin());
        assert_eq!(cursor.value(), Some(1));

        let visited: Vec<_> = cursor.into_indices().collect();
        assert_eq!(
            visited,
            vec![PixelIndex::new(2, 0), PixelIndex::new(4, 0), PixelIndex::new(0, 2)]
        );
    }

    #[test]
    fn forward_backward_round_trip() {
        #[rustfmt::skip]
        let mask = patterned_mask(&[
            0, 1, 1, 0, 0,
            0, 0, 1, 0, 1,
            1, 0, 0, 1, 0,
        ]);
        let data = grid((5, 3), 0u8);
        let region = Region::new((0, 0), (5, 3));
        let accepted = 6;

        let mut cursor = MaskedCursor::new(Some(&mask), &data, region);
        let first = cursor.index();
        for _ in 0..accepted {
            assert!(!cursor.is_at_end());
            cursor.advance();
        }
        assert!(cursor.is_at_end());

        for _ in 0..accepted {
            cursor.retreat();
        }
        assert_eq!(cursor.index(), first);
        assert!(cursor.is_at_begin());

        // Nothing accepted before the first pixel.
        cursor.retreat();
        assert_eq!(cursor.index(), first);
    }

    #[test]
    fn is_at_begin_after_advance() {
        #[rustfmt::skip]
        let mask = patterned_mask(&[
            0, 1, 1, 0, 0,
            0, 0, 0, 0, 0,
            0, 0, 0, 0, 0,
        ]);
        let data = grid((5, 3), 0u8);
        let mut cursor = MaskedCursor::new(Some(&mask), &data, Region::new((0, 0), (5, 3)));
        assert!(cursor.is_at_begin());
        cursor.advance();
        assert!(!cursor.is_at_begin());
        cursor.advance();
        assert!(cursor.is_at_end());
        assert!(!cursor.is_at_begin());
    }

    #[test]
    fn fully_masked_single_pixel() {
        let mask = grid((1, 1), 0u8);
        let data = grid((1, 1), 7f64);
        let mut cursor = MaskedCursor::new(Some(&mask), &data, Region::new((0, 0), (1, 1)));
        assert!(cursor.is_at_end());
        assert!(cursor.is_at_begin());
        cursor.go_to_end();
        cursor.retreat();
        assert!(cursor.is_at_end());
    }

    #[test]
    fn empty_region() {
        let data = grid((4, 4), 0u8);
        let mask = grid((4, 4), 1u8);
        let cursor = MaskedCursor::new(Some(&mask), &data, Region::new((1, 1), (0, 3)));
        assert!(cursor.is_at_end());
        assert!(cursor.is_at_begin());
        assert_eq!(cursor.into_indices().count(), 0);
    }

    #[test]
    fn go_to_end_then_back_without_mask() {
        let data = grid((3, 3), 0u8);
        let mut cursor = MaskedCursor::new(None, &data, Region::new((0, 1), (3, 2)));
        cursor.go_to_end();
        assert!(cursor.is_at_end());
        cursor.retreat();
        assert_eq!(cursor.index(), PixelIndex::new(2, 2));
        cursor.go_to_begin();
        assert_eq!(cursor.index(), PixelIndex::new(0, 1));
    }
}
