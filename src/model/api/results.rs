use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::api::id::ApiId;

/// A candidate's standing in the results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    #[serde(rename = "_id")]
    pub id: ApiId,
    pub name: String,
    pub party: String,
    pub symbol: String,
    pub color: String,
    pub votes: u64,
    /// Share of all votes cast, to one decimal place.
    pub percentage: f64,
}

/// A snapshot of the election results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionResults {
    pub candidates: Vec<CandidateResult>,
    pub total_votes: u64,
    pub total_voters: u64,
    pub participation_rate: f64,
    /// `None` until at least one vote has been cast.
    pub winner: Option<CandidateResult>,
    pub is_election_active: bool,
    /// When this snapshot was computed.
    pub last_updated: DateTime<Utc>,
}
