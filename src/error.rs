//! Error taxonomy of the footprint engine.
//!
//! Only [`Error`] aborts a run. Problems with a single
//! feature are [`FeatureError`]s: the feature is skipped
//! and the error is kept in the statistics so the caller
//! can inspect it.
use serde_derive::Serialize;
use thiserror::Error;

use crate::layer::FeatureId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or incompatible inputs, detected before any
    /// tile is processed.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("not ready: {0}")]
    NotReady(String),

    #[error("statistics were already synthetized; call reset before a new run")]
    AlreadySynthetized,

    #[error("worker index {index} out of range ({count} workers)")]
    WorkerIndex { index: usize, count: usize },

    #[error(transparent)]
    Feature(#[from] FeatureError),

    /// Failure reported by a collaborator (raster or
    /// vector reader).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A recoverable, per-feature problem.
#[derive(Debug, Error, Clone, PartialEq, Serialize)]
pub enum FeatureError {
    #[error("feature {feature}: degenerate geometry ({reason})")]
    Geometry { feature: FeatureId, reason: String },

    #[error("feature {feature}: class field '{field}' {reason}")]
    Attribute {
        feature: FeatureId,
        field: String,
        reason: String,
    },
}

impl FeatureError {
    pub fn feature(&self) -> FeatureId {
        match self {
            FeatureError::Geometry { feature, .. } => *feature,
            FeatureError::Attribute { feature, .. } => *feature,
        }
    }

    pub fn is_geometry(&self) -> bool {
        matches!(self, FeatureError::Geometry { .. })
    }

    pub fn is_attribute(&self) -> bool {
        matches!(self, FeatureError::Attribute { .. })
    }
}
