//! Per-worker and merged footprint statistics.
//!
//! Counters are merged by keyed summation. The per-polygon
//! sample is a reservoir of size one: a worker keeps a
//! candidate pixel and the number `n` of pixels seen, and
//! replaces the candidate by the `n`-th pixel with
//! probability `1/n`. Two reservoirs `(c_a, n_a)` and
//! `(c_b, n_b)` merge into `c_a` with probability
//! `n_a / (n_a + n_b)`, else `c_b`, with count `n_a + n_b`.
//! Both rules keep the candidate uniform over every pixel
//! seen, whatever the tiling or merge order.
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::ops::AddAssign;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_derive::Serialize;

use crate::error::FeatureError;
use crate::geometry::PixelIndex;
use crate::layer::{ClassCode, FeatureId};

/// Single-element reservoir over the pixels of one polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PolygonSample {
    candidate: PixelIndex,
    seen: u64,
}

impl PolygonSample {
    /// Reservoir after seeing its first pixel.
    pub fn new(first: PixelIndex) -> Self {
        PolygonSample {
            candidate: first,
            seen: 1,
        }
    }

    #[inline]
    pub fn candidate(&self) -> PixelIndex {
        self.candidate
    }

    /// Number of pixels seen.
    #[inline]
    pub fn seen(&self) -> u64 {
        self.seen
    }

    /// Offer the next pixel of the stream.
    pub fn observe<G: Rng + ?Sized>(&mut self, idx: PixelIndex, rng: &mut G) {
        self.seen += 1;
        if rng.gen_range(0..self.seen) == 0 {
            self.candidate = idx;
        }
    }

    /// Merge two reservoirs over disjoint streams.
    pub fn merge<G: Rng + ?Sized>(self, other: PolygonSample, rng: &mut G) -> PolygonSample {
        let seen = self.seen + other.seen;
        let candidate = if rng.gen_range(0..seen) < self.seen {
            self.candidate
        } else {
            other.candidate
        };
        PolygonSample { candidate, seen }
    }
}

/// Instrumentation counters of the spatial join.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JoinCounters {
    /// Tiles processed.
    pub tiles: u64,
    /// Features that survived the coarse envelope filter.
    pub features_considered: u64,
    /// Ring containment tests performed.
    pub containment_tests: u64,
    /// Mask-rejected pixels in candidate regions.
    pub pixels_rejected: u64,
}

impl AddAssign<&JoinCounters> for JoinCounters {
    fn add_assign(&mut self, other: &JoinCounters) {
        self.tiles += other.tiles;
        self.features_considered += other.features_considered;
        self.containment_tests += other.containment_tests;
        self.pixels_rejected += other.pixels_rejected;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PolygonTally {
    class: ClassCode,
    sample: PolygonSample,
}

/// Statistics accumulated by one worker over its tiles.
#[derive(Debug, Clone)]
pub struct PartialStatistics {
    global_count: u64,
    class_counts: BTreeMap<ClassCode, u64>,
    polygons: BTreeMap<FeatureId, PolygonTally>,
    skipped: BTreeMap<FeatureId, FeatureError>,
    counters: JoinCounters,
    rng: StdRng,
}

impl PartialStatistics {
    pub fn new(rng: StdRng) -> Self {
        PartialStatistics {
            global_count: 0,
            class_counts: BTreeMap::new(),
            polygons: BTreeMap::new(),
            skipped: BTreeMap::new(),
            counters: Default::default(),
            rng,
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        PartialStatistics::new(StdRng::seed_from_u64(seed))
    }

    /// Count pixel `idx` for `feature` of class `class`.
    pub fn record(&mut self, feature: FeatureId, class: ClassCode, idx: PixelIndex) {
        self.global_count += 1;
        *self.class_counts.entry(class).or_insert(0) += 1;
        match self.polygons.entry(feature) {
            Entry::Vacant(e) => {
                e.insert(PolygonTally {
                    class,
                    sample: PolygonSample::new(idx),
                });
            }
            Entry::Occupied(mut e) => {
                e.get_mut().sample.observe(idx, &mut self.rng);
            }
        }
    }

    /// Remember that a feature was skipped. A feature
    /// skipped in several tiles is kept once; returns
    /// whether this is the first time.
    pub fn skip(&mut self, error: FeatureError) -> bool {
        match self.skipped.entry(error.feature()) {
            Entry::Vacant(e) => {
                e.insert(error);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    #[inline]
    pub fn counters(&self) -> &JoinCounters {
        &self.counters
    }

    #[inline]
    pub fn counters_mut(&mut self) -> &mut JoinCounters {
        &mut self.counters
    }

    #[inline]
    pub fn global_count(&self) -> u64 {
        self.global_count
    }

    pub fn class_counts(&self) -> &BTreeMap<ClassCode, u64> {
        &self.class_counts
    }

    /// Pixels counted for `feature`.
    pub fn polygon_count(&self, feature: FeatureId) -> u64 {
        self.polygons.get(&feature).map_or(0, |t| t.sample.seen())
    }

    /// Current reservoir of `feature`.
    pub fn sample(&self, feature: FeatureId) -> Option<&PolygonSample> {
        self.polygons.get(&feature).map(|t| &t.sample)
    }

    pub fn skipped(&self) -> impl Iterator<Item = &FeatureError> {
        self.skipped.values()
    }

    /// Whether no tile has been accumulated.
    pub fn is_pristine(&self) -> bool {
        self.counters.tiles == 0
    }

    /// Fold `other` into `self`. Reservoirs of a polygon
    /// seen by both are merged with `rng`.
    pub fn merge<G: Rng + ?Sized>(&mut self, other: PartialStatistics, rng: &mut G) {
        self.global_count += other.global_count;
        for (class, count) in other.class_counts {
            *self.class_counts.entry(class).or_insert(0) += count;
        }
        for (feature, tally) in other.polygons {
            match self.polygons.entry(feature) {
                Entry::Vacant(e) => {
                    e.insert(tally);
                }
                Entry::Occupied(mut e) => {
                    let current = e.get_mut();
                    current.sample = current.sample.merge(tally.sample, rng);
                }
            }
        }
        for (feature, error) in other.skipped {
            self.skipped.entry(feature).or_insert(error);
        }
        self.counters += &other.counters;
    }
}

/// The merged, run-wide statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FootprintStatistics {
    global_count: u64,
    class_counts: BTreeMap<ClassCode, u64>,
    polygon_counts: BTreeMap<FeatureId, u64>,
    polygon_classes: BTreeMap<FeatureId, ClassCode>,
    polygon_samples: BTreeMap<FeatureId, PixelIndex>,
    skipped_features: Vec<FeatureError>,
    counters: JoinCounters,
}

impl FootprintStatistics {
    /// Merge all partial statistics, in order.
    pub fn synthetize<I, G>(partials: I, rng: &mut G) -> Self
    where
        I: IntoIterator<Item = PartialStatistics>,
        G: Rng + ?Sized,
    {
        let mut iter = partials.into_iter();
        let mut acc = match iter.next() {
            Some(first) => first,
            None => return Default::default(),
        };
        for partial in iter {
            acc.merge(partial, rng);
        }
        acc.into()
    }

    #[inline]
    pub fn global_count(&self) -> u64 {
        self.global_count
    }

    pub fn class_counts(&self) -> &BTreeMap<ClassCode, u64> {
        &self.class_counts
    }

    pub fn polygon_counts(&self) -> &BTreeMap<FeatureId, u64> {
        &self.polygon_counts
    }

    /// Class code of every polygon with counted pixels.
    pub fn polygon_classes(&self) -> &BTreeMap<FeatureId, ClassCode> {
        &self.polygon_classes
    }

    /// One pixel per polygon, uniform over its pixels.
    pub fn polygon_samples(&self) -> &BTreeMap<FeatureId, PixelIndex> {
        &self.polygon_samples
    }

    pub fn skipped_features(&self) -> &[FeatureError] {
        &self.skipped_features
    }

    pub fn counters(&self) -> &JoinCounters {
        &self.counters
    }
}

impl From<PartialStatistics> for FootprintStatistics {
    fn from(partial: PartialStatistics) -> Self {
        let mut stats = FootprintStatistics {
            global_count: partial.global_count,
            class_counts: partial.class_counts,
            skipped_features: partial.skipped.into_values().collect(),
            counters: partial.counters,
            ..Default::default()
        };
        for (feature, tally) in partial.polygons {
            stats.polygon_counts.insert(feature, tally.sample.seen());
            stats.polygon_classes.insert(feature, tally.class);
            stats.polygon_samples.insert(feature, tally.sample.candidate());
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(i: isize) -> PixelIndex {
        PixelIndex::new(i, 0)
    }

    /// Reservoir over `range` built by streaming.
    fn streamed(range: std::ops::Range<isize>, rng: &mut StdRng) -> PolygonSample {
        let mut sample = PolygonSample::new(pixel(range.start));
        for i in (range.start + 1)..range.end {
            sample.observe(pixel(i), rng);
        }
        sample
    }

    fn assert_uniform(freq: &[usize], trials: usize) {
        let p = 1. / freq.len() as f64;
        let sigma = (trials as f64 * p * (1. - p)).sqrt();
        for (i, &f) in freq.iter().enumerate() {
            let dev = (f as f64 - trials as f64 * p).abs();
            assert!(dev < 5. * sigma, "pixel {} chosen {} of {} times", i, f, trials);
        }
    }

    #[test]
    fn streaming_reservoir_is_uniform() {
        let mut rng = StdRng::seed_from_u64(11);
        let trials = 12000;
        let mut freq = vec![0; 6];
        for _ in 0..trials {
            freq[streamed(0..6, &mut rng).candidate().x as usize] += 1;
        }
        assert_uniform(&freq, trials);
    }

    #[test]
    fn merged_reservoir_is_uniform_in_any_order() {
        let mut rng = StdRng::seed_from_u64(5);
        let trials = 12000;
        let mut left = vec![0; 7];
        let mut right = vec![0; 7];
        for _ in 0..trials {
            let a = streamed(0..1, &mut rng);
            let b = streamed(1..4, &mut rng);
            let c = streamed(4..7, &mut rng);

            let l = a.merge(b, &mut rng).merge(c, &mut rng);
            let r = c.merge(b.merge(a, &mut rng), &mut rng);
            assert_eq!(l.seen(), 7);
            assert_eq!(r.seen(), 7);
            left[l.candidate().x as usize] += 1;
            right[r.candidate().x as usize] += 1;
        }
        assert_uniform(&left, trials);
        assert_uniform(&right, trials);
    }

    #[test]
    fn partial_merge_sums_counters() {
        let mut a = PartialStatistics::with_seed(1);
        a.record(1, 3, pixel(0));
        a.record(1, 3, pixel(1));
        a.record(2, 4, pixel(2));
        a.counters_mut().tiles += 1;

        let mut b = PartialStatistics::with_seed(2);
        b.record(1, 3, pixel(5));
        b.record(9, 4, pixel(6));
        b.skip(FeatureError::Geometry {
            feature: 7,
            reason: "empty geometry".into(),
        });
        b.counters_mut().tiles += 2;

        let mut rng = StdRng::seed_from_u64(0);
        let stats = FootprintStatistics::synthetize(vec![a, b], &mut rng);
        assert_eq!(stats.global_count(), 5);
        assert_eq!(stats.class_counts()[&3], 3);
        assert_eq!(stats.class_counts()[&4], 2);
        assert_eq!(stats.polygon_counts()[&1], 3);
        assert_eq!(stats.polygon_counts()[&9], 1);
        assert_eq!(stats.polygon_classes()[&9], 4);
        assert_eq!(stats.polygon_samples()[&2], pixel(2));
        assert_eq!(stats.skipped_features().len(), 1);
        assert_eq!(stats.counters().tiles, 3);
    }

    #[test]
    fn skipped_feature_kept_once() {
        let mut p = PartialStatistics::with_seed(0);
        for _ in 0..3 {
            p.skip(FeatureError::Attribute {
                feature: 4,
                field: "class".into(),
                reason: "is missing".into(),
            });
        }
        assert_eq!(p.skipped().count(), 1);
    }

    #[test]
    fn synthetize_nothing_is_empty() {
        let mut rng = StdRng::seed_from_u64(0);
        let stats = FootprintStatistics::synthetize(Vec::new(), &mut rng);
        assert_eq!(stats, FootprintStatistics::default());
    }
}
