//! The footprint statistics engine.
//!
//! A run follows the scatter-gather pattern of the rest of
//! the crate:
//!
//! 1. [`FootprintBuilder::build`] binds and validates the
//!    inputs.
//! 1. [`Footprint::reset`] allocates one
//!    [`PartialStatistics`] per worker.
//! 1. [`Footprint::process_tile`] (or the parallel
//!    [`Footprint::process_tiles`]) joins tiles into the
//!    worker statistics.
//! 1. [`Footprint::synthetize`] merges the workers exactly
//!    once, giving the [`FootprintStatistics`].
//!
//! Schedulers that manage their own threads can borrow the
//! shared join and the worker statistics separately with
//! [`Footprint::workers`].
use std::mem;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

use crate::geometry::Region;
use crate::join::TileJoin;
use crate::layer::PolygonLayer;
use crate::raster::{Mask, Raster};
use crate::stats::{FootprintStatistics, PartialStatistics};
use crate::{Error, Result};

/// Builder to configure a [`Footprint`]. The raster, the
/// layer and the class field are required; the mask and the
/// seed are optional.
pub struct FootprintBuilder<'a, R: Raster + ?Sized, L: PolygonLayer + ?Sized> {
    raster: Option<&'a R>,
    mask: Option<&'a dyn Mask>,
    layer: Option<&'a L>,
    class_field: Option<String>,
    seed: Option<u64>,
}

impl<'a, R: Raster + ?Sized, L: PolygonLayer + ?Sized> Default for FootprintBuilder<'a, R, L> {
    fn default() -> Self {
        FootprintBuilder {
            raster: None,
            mask: None,
            layer: None,
            class_field: None,
            seed: None,
        }
    }
}

impl<'a, R: Raster + ?Sized, L: PolygonLayer + ?Sized> FootprintBuilder<'a, R, L> {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_raster(mut self, raster: &'a R) -> Self {
        self.raster = Some(raster);
        self
    }

    /// Restrict the statistics to pixels accepted by
    /// `mask`. The mask must have the raster's geometry.
    pub fn with_mask(mut self, mask: &'a dyn Mask) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn with_layer(mut self, layer: &'a L) -> Self {
        self.layer = Some(layer);
        self
    }

    /// Name of the integer field holding the class code.
    pub fn with_class_field<S: Into<String>>(mut self, name: S) -> Self {
        self.class_field = Some(name.into());
        self
    }

    /// Seed the per-polygon sampling. Without a seed, a
    /// random one is drawn.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<Footprint<'a, R, L>> {
        let raster = self
            .raster
            .ok_or_else(|| Error::Configuration("input raster is not set".into()))?;
        let layer = self
            .layer
            .ok_or_else(|| Error::Configuration("polygon layer is not set".into()))?;
        let class_field = match self.class_field {
            Some(name) if !name.is_empty() => name,
            _ => return Err(Error::Configuration("class field is not set".into())),
        };
        if let Some(mask) = self.mask {
            let (expected, found) = (raster.geometry(), mask.mask_geometry());
            if !expected.same_as(found) {
                return Err(Error::Configuration(format!(
                    "mask geometry ({}x{}) differs from raster geometry ({}x{})",
                    found.dims().0,
                    found.dims().1,
                    expected.dims().0,
                    expected.dims().1,
                )));
            }
        }

        Ok(Footprint {
            join: TileJoin::new(raster, self.mask, layer, class_field),
            seed: self.seed.unwrap_or_else(rand::random),
            phase: Phase::Configured,
        })
    }
}

enum Phase {
    Configured,
    Accumulating(Vec<PartialStatistics>),
    Synthetized(FootprintStatistics),
}

/// A configured engine. See the [module
/// documentation](self) for the life-cycle.
pub struct Footprint<'a, R: Raster + ?Sized, L: PolygonLayer + ?Sized> {
    join: TileJoin<'a, R, L>,
    seed: u64,
    phase: Phase,
}

impl<'a, R: Raster + ?Sized, L: PolygonLayer + ?Sized> Footprint<'a, R, L> {
    /// Bind the inputs; shorthand for [`FootprintBuilder`].
    pub fn configure(
        raster: &'a R,
        mask: Option<&'a dyn Mask>,
        layer: &'a L,
        class_field: &str,
    ) -> Result<Self> {
        let builder = FootprintBuilder::new()
            .with_raster(raster)
            .with_layer(layer)
            .with_class_field(class_field);
        match mask {
            Some(mask) => builder.with_mask(mask).build(),
            None => builder.build(),
        }
    }

    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn join(&self) -> &TileJoin<'a, R, L> {
        &self.join
    }

    /// Start a run with `workers` empty partial statistics,
    /// discarding any previous state. Worker `w` samples
    /// with a generator seeded by `seed + w`.
    pub fn reset(&mut self, workers: usize) -> Result<()> {
        if workers == 0 {
            return Err(Error::Configuration("at least one worker is required".into()));
        }
        let partials = (0..workers as u64)
            .map(|w| PartialStatistics::new(StdRng::seed_from_u64(self.seed.wrapping_add(w))))
            .collect();
        self.phase = Phase::Accumulating(partials);
        Ok(())
    }

    /// Number of workers of the current run.
    pub fn worker_count(&self) -> usize {
        match &self.phase {
            Phase::Accumulating(partials) => partials.len(),
            _ => 0,
        }
    }

    /// Join `tile` into the statistics of `worker`.
    pub fn process_tile(&mut self, tile: &Region, worker: usize) -> Result<()> {
        let (join, partials) = self.workers()?;
        let count = partials.len();
        let stats = partials
            .get_mut(worker)
            .ok_or(Error::WorkerIndex { index: worker, count })?;
        join.process_tile(tile, stats);
        Ok(())
    }

    /// Borrow the shared join and the worker statistics, for
    /// schedulers running workers concurrently.
    pub fn workers(&mut self) -> Result<(&TileJoin<'a, R, L>, &mut [PartialStatistics])> {
        match &mut self.phase {
            Phase::Accumulating(partials) => Ok((&self.join, &mut partials[..])),
            Phase::Configured => Err(Error::NotReady("reset must be called before processing tiles".into())),
            Phase::Synthetized(_) => Err(Error::AlreadySynthetized),
        }
    }

    /// Join every tile, distributing them round-robin over
    /// the workers. Workers run in parallel with the
    /// "use-rayon" feature.
    pub fn process_tiles(&mut self, tiles: &[Region]) -> Result<()> {
        let (join, partials) = self.workers()?;
        let count = partials.len();
        let work = |(w, stats): (usize, &mut PartialStatistics)| {
            for tile in tiles.iter().skip(w).step_by(count) {
                join.process_tile(tile, stats);
            }
        };

        #[cfg(feature = "use-rayon")]
        {
            use rayon::prelude::*;
            partials.par_iter_mut().enumerate().for_each(work);
        }
        #[cfg(not(feature = "use-rayon"))]
        partials.iter_mut().enumerate().for_each(work);

        Ok(())
    }

    /// Merge the worker statistics. Fails if no tile was
    /// processed, or if the run was already merged.
    pub fn synthetize(&mut self) -> Result<&FootprintStatistics> {
        let partials = match mem::replace(&mut self.phase, Phase::Configured) {
            Phase::Accumulating(partials) if !partials.iter().all(PartialStatistics::is_pristine) => {
                partials
            }
            phase => {
                let error = match &phase {
                    Phase::Synthetized(_) => Error::AlreadySynthetized,
                    Phase::Configured => {
                        Error::NotReady("reset must be called before synthetize".into())
                    }
                    Phase::Accumulating(_) => Error::NotReady("no tile was processed".into()),
                };
                self.phase = phase;
                return Err(error);
            }
        };
        let workers = partials.len() as u64;
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(workers));
        let stats = FootprintStatistics::synthetize(partials, &mut rng);
        debug!(
            workers,
            pixels = stats.global_count(),
            polygons = stats.polygon_counts().len(),
            skipped = stats.skipped_features().len(),
            "statistics synthetized"
        );

        self.phase = Phase::Synthetized(stats);
        self.result()
            .ok_or_else(|| Error::NotReady("statistics are not available".into()))
    }

    /// The merged statistics, once synthetized.
    pub fn result(&self) -> Option<&FootprintStatistics> {
        match &self.phase {
            Phase::Synthetized(stats) => Some(stats),
            _ => None,
        }
    }

    pub fn into_result(self) -> Option<FootprintStatistics> {
        match self.phase {
            Phase::Synthetized(stats) => Some(stats),
            _ => None,
        }
    }

    /// Reset, process all tiles and synthetize.
    pub fn run(&mut self, tiles: &[Region], workers: usize) -> Result<&FootprintStatistics> {
        self.reset(workers)?;
        self.process_tiles(tiles)?;
        self.synthetize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::RasterGeometry;
    use crate::layer::{Feature, VectorLayer};
    use crate::raster::GridRaster;
    use geo::polygon;

    fn setup() -> (GridRaster<f32>, VectorLayer) {
        let g = RasterGeometry::axis_aligned((0., 0.), (1., 1.), (8, 8)).unwrap();
        let layer = vec![Feature::new(
            5,
            polygon![(x: 0.1, y: 0.1), (x: 3.9, y: 0.1), (x: 3.9, y: 3.9), (x: 0.1, y: 3.9)],
        )
        .with_field("code", 1)]
        .into_iter()
        .collect();
        (GridRaster::filled(g, 0.), layer)
    }

    #[test]
    fn configure_requires_inputs() {
        let (raster, layer) = setup();
        let missing_raster = FootprintBuilder::<GridRaster<f32>, VectorLayer>::new()
            .with_layer(&layer)
            .with_class_field("code")
            .build();
        assert!(matches!(missing_raster, Err(Error::Configuration(_))));

        let missing_layer = FootprintBuilder::<GridRaster<f32>, VectorLayer>::new()
            .with_raster(&raster)
            .with_class_field("code")
            .build();
        assert!(matches!(missing_layer, Err(Error::Configuration(_))));

        let empty_field = Footprint::configure(&raster, None, &layer, "");
        assert!(matches!(empty_field, Err(Error::Configuration(_))));
    }

    #[test]
    fn configure_checks_mask_geometry() {
        let (raster, layer) = setup();
        let other = RasterGeometry::axis_aligned((0., 0.), (1., 1.), (8, 9)).unwrap();
        let mask = GridRaster::filled(other, 1u8);
        let res = Footprint::configure(&raster, Some(&mask), &layer, "code");
        assert!(matches!(res, Err(Error::Configuration(_))));

        let mask = GridRaster::filled(raster.geometry().clone(), 1u8);
        assert!(Footprint::configure(&raster, Some(&mask), &layer, "code").is_ok());
    }

    #[test]
    fn life_cycle() {
        let (raster, layer) = setup();
        let mut fp = Footprint::configure(&raster, None, &layer, "code").unwrap();
        let whole = raster.geometry().full_region();

        assert!(matches!(fp.process_tile(&whole, 0), Err(Error::NotReady(_))));
        assert!(matches!(fp.synthetize(), Err(Error::NotReady(_))));
        assert!(matches!(fp.reset(0), Err(Error::Configuration(_))));

        fp.reset(2).unwrap();
        assert!(matches!(fp.synthetize(), Err(Error::NotReady(_))));
        assert!(matches!(
            fp.process_tile(&whole, 2),
            Err(Error::WorkerIndex { index: 2, count: 2 })
        ));

        fp.process_tile(&whole, 1).unwrap();
        assert_eq!(fp.synthetize().unwrap().global_count(), 16);
        assert!(matches!(fp.synthetize(), Err(Error::AlreadySynthetized)));
        assert!(matches!(fp.process_tile(&whole, 0), Err(Error::AlreadySynthetized)));
        assert_eq!(fp.result().unwrap().polygon_counts()[&5], 16);

        // A new run starts from scratch.
        fp.reset(1).unwrap();
        assert!(fp.result().is_none());
        fp.process_tile(&whole, 0).unwrap();
        assert_eq!(fp.synthetize().unwrap().global_count(), 16);
    }

    #[test]
    fn same_seed_same_sample() {
        let (raster, layer) = setup();
        let tiles = [Region::new((0, 0), (8, 3)), Region::new((0, 3), (8, 5))];
        let sample = |seed| {
            let mut fp = FootprintBuilder::new()
                .with_raster(&raster)
                .with_layer(&layer)
                .with_class_field("code")
                .with_seed(seed)
                .build()
                .unwrap();
            fp.run(&tiles, 2).unwrap().polygon_samples()[&5]
        };
        assert_eq!(sample(42), sample(42));
    }
}
