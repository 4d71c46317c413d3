//! Persistence for the election.
//!
//! Every method that mutates more than one record is atomic: no reader of the
//! store can observe a voter marked as voted without the matching candidate
//! increment, or a half-applied reset.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{
    api::candidate::CandidateSpec,
    db::{Candidate, Election, Voter},
    mongodb::Id,
};

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[rocket::async_trait]
pub trait ElectionStore: Send + Sync {
    /// The singleton election record.
    async fn election(&self) -> Result<Election>;

    /// Overwrite the election record.
    async fn save_election(&self, election: &Election) -> Result<()>;

    /// All candidates, in registration order.
    async fn candidates(&self) -> Result<Vec<Candidate>>;

    async fn insert_candidate(&self, candidate: &Candidate) -> Result<()>;

    /// Replace a candidate's display fields. Fails with `NotFound` if absent.
    async fn update_candidate(&self, id: Id, spec: CandidateSpec) -> Result<Candidate>;

    /// Remove a candidate. Fails with `NotFound` if absent, or `CandidateHasVotes`
    /// if removing it would lose votes.
    async fn delete_candidate(&self, id: Id) -> Result<()>;

    /// All voters, in registration order.
    async fn voters(&self) -> Result<Vec<Voter>>;

    async fn voter(&self, id: Id) -> Result<Option<Voter>>;

    /// Look up a voter by their normalised email.
    async fn voter_by_email(&self, email: &str) -> Result<Option<Voter>>;

    /// Fails with `DuplicateEmail` if the email is already registered.
    async fn insert_voter(&self, voter: &Voter) -> Result<()>;

    /// Number of registered voters.
    async fn voter_count(&self) -> Result<u64>;

    /// Atomically mark the voter as voted and add one vote to the candidate.
    ///
    /// Checks, in order: the election accepts votes at `now` (`ElectionNotActive`), the
    /// candidate exists (`NotFound`), the voter exists (`NotFound`), and the voter has not
    /// voted (`AlreadyVoted`). Nothing is changed unless every check passes.
    async fn record_vote(&self, voter: Id, candidate: Id, now: DateTime<Utc>) -> Result<()>;

    /// Atomically zero every candidate's votes, clear every voter's flag, and return the
    /// election to its initial state.
    async fn reset(&self) -> Result<()>;
}
