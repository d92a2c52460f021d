//! Vector index descriptors and handles.

use serde::{Deserialize, Serialize};

use crate::error::IndexError;

/// Similarity metric an index is built with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
    #[serde(alias = "dot")]
    DotProduct,
    Euclidean,
}

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(Metric::Cosine),
            "dotproduct" | "dot" => Ok(Metric::DotProduct),
            "euclidean" => Ok(Metric::Euclidean),
            _ => Err(format!("unknown metric: {}", s)),
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::Cosine => write!(f, "cosine"),
            Metric::DotProduct => write!(f, "dotproduct"),
            Metric::Euclidean => write!(f, "euclidean"),
        }
    }
}

/// Name, dimension and metric of the index a pipeline run targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    pub name: String,
    pub dimension: u32,
    pub metric: Metric,
}

impl IndexDescriptor {
    pub fn new(name: impl Into<String>, dimension: u32, metric: Metric) -> Result<Self, IndexError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(IndexError::InvalidDescriptor(
                "index name must not be empty".to_string(),
            ));
        }
        if dimension == 0 {
            return Err(IndexError::InvalidDescriptor(
                "dimension must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            name,
            dimension,
            metric,
        })
    }
}

/// Provider-reported state of an existing index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStatus {
    pub dimension: u32,
    pub metric: Metric,
    pub ready: bool,
}

/// Resolved index reference passed to upsert and query calls.
///
/// Cheap to clone and safe to share between tasks once obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHandle {
    descriptor: IndexDescriptor,
}

impl IndexHandle {
    pub fn new(descriptor: IndexDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn dimension(&self) -> usize {
        self.descriptor.dimension as usize
    }

    pub fn metric(&self) -> Metric {
        self.descriptor.metric
    }

    pub fn descriptor(&self) -> &IndexDescriptor {
        &self.descriptor
    }
}
