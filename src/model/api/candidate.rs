use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{api::id::ApiId, db::Candidate};

/// Candidate fields submitted by an admin. Missing fields deserialize as empty
/// so that [`CandidateSpec::validated`] can report all of them at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateSpec {
    pub name: String,
    pub party: String,
    pub symbol: String,
    pub description: String,
    pub color: String,
}

impl CandidateSpec {
    /// Trim every field, failing with the names of any that are blank.
    pub fn validated(self) -> Result<Self> {
        let spec = Self {
            name: self.name.trim().to_string(),
            party: self.party.trim().to_string(),
            symbol: self.symbol.trim().to_string(),
            description: self.description.trim().to_string(),
            color: self.color.trim().to_string(),
        };

        let missing = [
            ("name", &spec.name),
            ("party", &spec.party),
            ("symbol", &spec.symbol),
            ("description", &spec.description),
            ("color", &spec.color),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(field, _)| field)
        .collect::<Vec<_>>();

        if missing.is_empty() {
            Ok(spec)
        } else {
            Err(Error::validation(missing))
        }
    }
}

/// A candidate as shown on the ballot. Deliberately carries no vote count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescription {
    #[serde(rename = "_id")]
    pub id: ApiId,
    pub name: String,
    pub party: String,
    pub symbol: String,
    pub description: String,
    pub color: String,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            name: candidate.candidate.name,
            party: candidate.candidate.party,
            symbol: candidate.candidate.symbol,
            description: candidate.candidate.description,
            color: candidate.candidate.color,
        }
    }
}

/// A candidate as shown to admins, including its vote count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCandidate {
    #[serde(flatten)]
    pub description: CandidateDescription,
    pub votes: u64,
}

impl From<Candidate> for AdminCandidate {
    fn from(candidate: Candidate) -> Self {
        let votes = candidate.votes;
        Self {
            description: candidate.into(),
            votes,
        }
    }
}
