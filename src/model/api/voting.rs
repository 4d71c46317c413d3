use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{candidate::CandidateDescription, id::ApiId},
    db::Election,
};

/// Public election details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionStatus {
    pub is_active: bool,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub title: String,
    pub description: String,
}

impl ElectionStatus {
    pub fn new(election: Election, now: DateTime<Utc>) -> Self {
        Self {
            is_active: election.accepts_votes(now),
            start_date: election.start_date,
            end_date: election.end_date,
            title: election.title,
            description: election.description,
        }
    }
}

/// Turnout figures, plus whether the requesting voter (if any) has voted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingStats {
    pub total_voters: u64,
    pub voted_count: u64,
    pub remaining_time: String,
    pub user_has_voted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateList {
    pub candidates: Vec<CandidateDescription>,
}

/// What the signed-in voter may currently do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserVotingStatus {
    pub can_vote: bool,
    pub has_voted: bool,
    pub time_remaining: String,
    pub is_election_active: bool,
}

/// A ballot: the candidate ID is kept as a raw string so that a malformed ID
/// is reported in the same precondition order as an unknown one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub candidate_id: String,
}

/// Confirmation of a successful vote. Reveals nothing about the tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub success: bool,
    pub message: String,
    /// A random reference for the voter's records; it is not stored anywhere.
    pub receipt_id: ApiId,
    pub cast_at: DateTime<Utc>,
}
