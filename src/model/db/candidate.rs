use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{api::candidate::CandidateSpec, mongodb::Id};

/// Core candidate data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCore {
    pub name: String,
    pub party: String,
    pub symbol: String,
    pub description: String,
    pub color: String,
    /// Votes received. Only ever incremented by a vote or zeroed by a reset.
    pub votes: u64,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub registered_at: DateTime<Utc>,
}

impl CandidateCore {
    /// Create a candidate with no votes from a validated spec.
    pub fn new(spec: CandidateSpec, registered_at: DateTime<Utc>) -> Self {
        Self {
            name: spec.name,
            party: spec.party,
            symbol: spec.symbol,
            description: spec.description,
            color: spec.color,
            votes: 0,
            registered_at,
        }
    }

    /// Replace the display fields, keeping the vote count.
    pub fn apply_spec(&mut self, spec: CandidateSpec) {
        self.name = spec.name;
        self.party = spec.party;
        self.symbol = spec.symbol;
        self.description = spec.description;
        self.color = spec.color;
    }
}

/// A candidate from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Candidate {
    /// Create a brand new candidate with a fresh ID.
    pub fn new(spec: CandidateSpec, registered_at: DateTime<Utc>) -> Self {
        Self {
            id: Id::new(),
            candidate: CandidateCore::new(spec, registered_at),
        }
    }
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}
