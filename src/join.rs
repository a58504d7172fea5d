//! Spatial join of one tile against the polygon layer.
use tracing::{debug, warn};

use crate::error::FeatureError;
use crate::geometry::{feature_bounding_region, Region};
use crate::layer::{footprint_contains, validate_geometry, PolygonFeature, PolygonLayer};
use crate::raster::{Mask, Raster};
use crate::stats::PartialStatistics;
use crate::traversal::MaskedCursor;

/// Read-only inputs of the join. Shared by all workers;
/// each worker accumulates into its own
/// [`PartialStatistics`].
pub struct TileJoin<'a, R: Raster + ?Sized, L: PolygonLayer + ?Sized> {
    raster: &'a R,
    mask: Option<&'a dyn Mask>,
    layer: &'a L,
    class_field: String,
}

impl<'a, R: Raster + ?Sized, L: PolygonLayer + ?Sized> TileJoin<'a, R, L> {
    pub(crate) fn new(
        raster: &'a R,
        mask: Option<&'a dyn Mask>,
        layer: &'a L,
        class_field: String,
    ) -> Self {
        TileJoin {
            raster,
            mask,
            layer,
            class_field,
        }
    }

    pub fn raster(&self) -> &'a R {
        self.raster
    }

    pub fn layer(&self) -> &'a L {
        self.layer
    }

    pub fn class_field(&self) -> &str {
        &self.class_field
    }

    /// Accumulate the pixels of `tile` into `stats`. The
    /// tile is first restricted to the raster extent.
    ///
    /// Features are filtered by envelope, then for each
    /// feature only the pixels of its bounding region inside
    /// the tile are tested. A feature that can't be joined
    /// is skipped and recorded in `stats`.
    pub fn process_tile(&self, tile: &Region, stats: &mut PartialStatistics) {
        let geometry = self.raster.geometry();
        let mut tile = *tile;
        stats.counters_mut().tiles += 1;
        if !tile.crop(&geometry.full_region()) {
            debug!(?tile, "tile outside raster");
            return;
        }
        let bounds = match geometry.region_to_envelope(&tile) {
            Some(bounds) => bounds,
            None => return,
        };

        let before = *stats.counters();
        for feature in self.layer.features_within(&bounds) {
            stats.counters_mut().features_considered += 1;
            if let Err(error) = self.accumulate_feature(feature, &tile, stats) {
                if stats.skip(error.clone()) {
                    warn!(feature = error.feature(), %error, "skipping feature");
                }
            }
        }
        let after = stats.counters();
        debug!(
            ?tile,
            features = after.features_considered - before.features_considered,
            tests = after.containment_tests - before.containment_tests,
            "tile processed"
        );
    }

    fn accumulate_feature(
        &self,
        feature: &L::Feature,
        tile: &Region,
        stats: &mut PartialStatistics,
    ) -> std::result::Result<(), FeatureError> {
        let id = feature.id();
        let polygons = validate_geometry(id, feature.geometry())?;
        let class = feature.class_code(&self.class_field)?;

        let geometry = self.raster.geometry();
        let mut region =
            feature_bounding_region(geometry, feature).ok_or_else(|| FeatureError::Geometry {
                feature: id,
                reason: "no envelope".into(),
            })?;
        if !region.crop(tile) {
            return Ok(());
        }

        let mut tests = 0;
        let mut accepted = 0;
        let cursor = MaskedCursor::new(self.mask, self.raster, region);
        for idx in cursor.into_indices() {
            accepted += 1;
            if footprint_contains(polygons, geometry.index_to_point(idx), &mut tests) {
                stats.record(id, class, idx);
            }
        }

        let counters = stats.counters_mut();
        counters.containment_tests += tests;
        counters.pixels_rejected += region.len() as u64 - accepted;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{PixelIndex, RasterGeometry};
    use crate::layer::{Feature, VectorLayer};
    use crate::raster::GridRaster;
    use geo::polygon;

    fn raster(dims: (usize, usize)) -> GridRaster<u8> {
        let g = RasterGeometry::axis_aligned((0., 0.), (1., 1.), dims).unwrap();
        GridRaster::filled(g, 0)
    }

    /// Axis-aligned box covering pixel centers of columns
    /// `x0..x1` and rows `y0..y1` of a unit raster.
    fn pixel_box(id: u64, class: i64, x0: f64, y0: f64, x1: f64, y1: f64) -> Feature {
        Feature::new(
            id,
            polygon![(x: x0 + 0.25, y: y0 + 0.25), (x: x1 - 0.25, y: y0 + 0.25),
                     (x: x1 - 0.25, y: y1 - 0.25), (x: x0 + 0.25, y: y1 - 0.25)],
        )
        .with_field("class", class)
    }

    #[test]
    fn counts_pixels_in_feature() {
        let data = raster((6, 6));
        let layer: VectorLayer = vec![pixel_box(1, 3, 1., 1., 3., 6.)].into_iter().collect();
        let join = TileJoin::new(&data, None, &layer, "class".into());

        let mut stats = PartialStatistics::with_seed(0);
        join.process_tile(&Region::new((0, 0), (6, 6)), &mut stats);
        assert_eq!(stats.global_count(), 10);
        assert_eq!(stats.class_counts()[&3], 10);
        assert_eq!(stats.polygon_count(1), 10);
        let sample = stats.sample(1).unwrap();
        assert!(Region::new((1, 1), (2, 5)).contains(sample.candidate()));
    }

    #[test]
    fn mask_rejects_pixels() {
        let data = raster((4, 4));
        let mut mask = GridRaster::filled(data.geometry().clone(), 1u8);
        mask.fill_region(&Region::new((0, 0), (4, 1)), 0);
        let layer: VectorLayer = vec![pixel_box(1, 2, 0., 0., 4., 4.)].into_iter().collect();
        let join = TileJoin::new(&data, Some(&mask), &layer, "class".into());

        let mut stats = PartialStatistics::with_seed(0);
        join.process_tile(&Region::new((0, 0), (4, 4)), &mut stats);
        assert_eq!(stats.global_count(), 12);
        assert_eq!(stats.counters().pixels_rejected, 4);
        assert!(stats.sample(1).unwrap().candidate().y >= 1);
    }

    #[test]
    fn malformed_features_are_skipped() {
        let data = raster((4, 4));
        let layer: VectorLayer = vec![
            pixel_box(1, 1, 0., 0., 2., 2.),
            Feature::new(2, polygon![(x: 0.5, y: 0.5), (x: 3.5, y: 0.5), (x: 3.5, y: 3.5)]),
            Feature::with_geometry(3, None).with_field("class", 1),
        ]
        .into_iter()
        .collect();
        let join = TileJoin::new(&data, None, &layer, "class".into());

        let mut stats = PartialStatistics::with_seed(0);
        join.process_tile(&Region::new((0, 0), (2, 4)), &mut stats);
        join.process_tile(&Region::new((2, 0), (2, 4)), &mut stats);
        assert_eq!(stats.global_count(), 4);

        let skipped: Vec<_> = stats.skipped().collect();
        assert_eq!(skipped.len(), 2);
        assert!(skipped[0].is_attribute() && skipped[0].feature() == 2);
        assert!(skipped[1].is_geometry() && skipped[1].feature() == 3);
    }

    #[test]
    fn disjoint_feature_costs_nothing() {
        let data = raster((10, 10));
        let layer: VectorLayer = vec![
            pixel_box(1, 1, 0., 0., 3., 3.),
            pixel_box(2, 2, 6., 6., 9., 9.),
        ]
        .into_iter()
        .collect();
        let join = TileJoin::new(&data, None, &layer, "class".into());

        let mut stats = PartialStatistics::with_seed(0);
        join.process_tile(&Region::new((0, 0), (5, 5)), &mut stats);
        assert_eq!(stats.polygon_count(1), 9);
        assert_eq!(stats.polygon_count(2), 0);
        assert_eq!(stats.counters().features_considered, 1);
        assert_eq!(stats.counters().containment_tests, 9);
    }

    #[test]
    fn tile_outside_raster() {
        let data = raster((3, 3));
        let layer: VectorLayer = vec![pixel_box(1, 1, 0., 0., 3., 3.)].into_iter().collect();
        let join = TileJoin::new(&data, None, &layer, "class".into());

        let mut stats = PartialStatistics::with_seed(0);
        join.process_tile(&Region::new((3, 0), (3, 3)), &mut stats);
        assert_eq!(stats.global_count(), 0);
        assert_eq!(stats.counters().tiles, 1);
        assert_eq!(stats.sample(1), None);
        assert!(!Region::new((0, 0), (3, 3)).contains(PixelIndex::new(3, 0)));
    }
}
