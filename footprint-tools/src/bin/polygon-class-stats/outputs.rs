use footprint::stats::FootprintStatistics;
use serde_derive::Serialize;
use std::path::Path;

#[derive(Serialize)]
pub struct StatsOutput<'a> {
    pub input: &'a Path,
    pub vector: &'a Path,
    pub class_field: &'a str,
    pub seed: u64,
    pub tiles: usize,
    pub statistics: &'a FootprintStatistics,
}
