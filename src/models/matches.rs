use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One candidate face match returned by the upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    /// Similarity in `[0, 1]`.
    pub score: f64,
    pub source_image_url: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// State of an upstream search after one or more status requests.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Pending { progress: Option<u8> },
    /// Matches ordered by descending score, ties in upstream order.
    Complete { matches: Vec<MatchRecord> },
    Failed { reason: String },
}

/// Stable sort by descending score; equal scores keep their upstream order.
pub fn sort_by_score(matches: &mut [MatchRecord]) {
    matches.sort_by(|a, b| b.score.total_cmp(&a.score));
}
