use serde::{Deserialize, Serialize};

use crate::services::{Metric, MetricsSummary, VectorIndex};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub started_at: String,
    pub requests_served: u64,
    pub index: IndexSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSummary {
    pub chunks: usize,
    pub dimension: usize,
    pub metric: Metric,
}

impl From<&VectorIndex> for IndexSummary {
    fn from(index: &VectorIndex) -> Self {
        Self {
            chunks: index.len(),
            dimension: index.dimension(),
            metric: index.metric(),
        }
    }
}
