use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{candidate::AdminCandidate, id::ApiId},
    common::election::ElectionState,
    db::Voter,
};

/// Dashboard figures for admins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_voters: u64,
    pub total_candidates: u64,
    pub total_votes: u64,
    pub election_status: ElectionState,
    pub participation_rate: f64,
}

/// Response to a candidate being added or edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateResponse {
    pub success: bool,
    pub message: String,
    pub candidate: AdminCandidate,
}

/// A voter as listed to admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterDescription {
    #[serde(rename = "_id")]
    pub id: ApiId,
    pub name: String,
    pub email: String,
    pub has_voted: bool,
    pub registered_at: DateTime<Utc>,
}

impl From<Voter> for VoterDescription {
    fn from(voter: Voter) -> Self {
        Self {
            id: voter.id.into(),
            name: voter.voter.name,
            email: voter.voter.email,
            has_voted: voter.voter.has_voted,
            registered_at: voter.voter.registered_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterList {
    pub voters: Vec<VoterDescription>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleResponse {
    pub success: bool,
    pub message: String,
    pub status: ElectionState,
}

/// Election details set by an admin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ElectionSpec {
    pub title: String,
    pub description: String,
    /// Scheduled deadline; the election closes itself when it passes.
    pub end_date: Option<DateTime<Utc>>,
}

/// A bare success/failure acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
    pub message: String,
}

impl Ack {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}
