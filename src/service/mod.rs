//! The election service: every operation the API exposes, serialised against
//! each other where the election's invariants require it.
//!
//! Votes run concurrently under a shared barrier guard. Anything that changes
//! which votes are acceptable, or how they are counted, takes the exclusive guard
//! and so waits for in-flight votes to finish first.

use std::sync::Arc;

use chrono::Utc;
use rocket::tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::model::{
    api::{
        admin::{AdminStats, ElectionSpec},
        auth::{normalise_email, VoterRegistration},
        candidate::CandidateSpec,
        results::ElectionResults,
        voting::{ElectionStatus, Receipt, UserVotingStatus, VotingStats},
    },
    common::election::ElectionState,
    db::{Candidate, Election, Voter},
    mongodb::Id,
};
use crate::store::ElectionStore;

mod closer;
pub mod results;

use closer::ElectionCloser;

/// Shared handle to the election. Cheap to clone.
#[derive(Clone)]
pub struct ElectionService {
    inner: Arc<Inner>,
}

struct Inner {
    store: Box<dyn ElectionStore>,
    barrier: RwLock<()>,
    closer: ElectionCloser,
}

impl ElectionService {
    pub fn new(store: impl ElectionStore + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: Box::new(store),
                barrier: RwLock::new(()),
                closer: ElectionCloser::default(),
            }),
        }
    }

    fn store(&self) -> &dyn ElectionStore {
        self.inner.store.as_ref()
    }

    /// Pick up where a previous run left off: an election that was running with a
    /// deadline gets its closer back.
    pub async fn resume(&self) -> Result<()> {
        let election = self.store().election().await?;
        if let Some(deadline) = election.pending_deadline() {
            info!("Resuming election closer for deadline {deadline}");
            self.inner.closer.schedule(self.clone(), deadline);
        }
        Ok(())
    }

    pub async fn election(&self) -> Result<Election> {
        self.store().election().await
    }

    pub async fn status(&self) -> Result<ElectionStatus> {
        Ok(ElectionStatus::new(self.election().await?, Utc::now()))
    }

    /// Turnout figures. `voter` is the signed-in voter, if any.
    pub async fn voting_stats(&self, voter: Option<Id>) -> Result<VotingStats> {
        let election = self.election().await?;
        let voted_count = self
            .candidates()
            .await?
            .iter()
            .map(|candidate| candidate.votes)
            .sum();
        let user_has_voted = match voter {
            Some(id) => self.voter(id).await?.map_or(false, |voter| voter.has_voted),
            None => false,
        };

        Ok(VotingStats {
            total_voters: self.store().voter_count().await?,
            voted_count,
            remaining_time: election.time_remaining(Utc::now()),
            user_has_voted,
        })
    }

    pub async fn user_status(&self, voter_id: Id) -> Result<UserVotingStatus> {
        let voter = self
            .voter(voter_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("Voter {voter_id}")))?;
        let election = self.election().await?;
        let now = Utc::now();
        let is_election_active = election.accepts_votes(now);

        Ok(UserVotingStatus {
            can_vote: is_election_active && !voter.has_voted,
            has_voted: voter.has_voted,
            time_remaining: election.time_remaining(now),
            is_election_active,
        })
    }

    pub async fn candidates(&self) -> Result<Vec<Candidate>> {
        self.store().candidates().await
    }

    pub async fn voters(&self) -> Result<Vec<Voter>> {
        self.store().voters().await
    }

    pub async fn voter(&self, id: Id) -> Result<Option<Voter>> {
        self.store().voter(id).await
    }

    pub async fn voter_by_email(&self, email: &str) -> Result<Option<Voter>> {
        self.store().voter_by_email(&normalise_email(email)).await
    }

    pub async fn register_voter(&self, registration: VoterRegistration) -> Result<Voter> {
        let voter = Voter::new(registration.validated()?, Utc::now());
        self.store().insert_voter(&voter).await?;
        info!("Registered voter {}", voter.id);
        Ok(voter)
    }

    /// Cast `voter`'s vote for the candidate with the (unparsed) ID `candidate_id`.
    pub async fn submit_vote(&self, voter: Id, candidate_id: &str) -> Result<Receipt> {
        let _guard = self.inner.barrier.read().await;
        let now = Utc::now();

        // A malformed ID cannot name a candidate, but an inactive election still takes
        // precedence over an unknown candidate.
        let candidate = match candidate_id.parse::<Id>() {
            Ok(id) => id,
            Err(_) => {
                if !self.election().await?.accepts_votes(now) {
                    return Err(Error::ElectionNotActive);
                }
                return Err(Error::not_found(format!("Candidate {candidate_id}")));
            }
        };

        self.store().record_vote(voter, candidate, now).await?;

        let receipt_id = Id::new();
        info!("Vote recorded with receipt {receipt_id}");
        Ok(Receipt {
            success: true,
            message: "Vote cast successfully".to_string(),
            receipt_id: receipt_id.into(),
            cast_at: now,
        })
    }

    pub async fn results(&self) -> Result<ElectionResults> {
        let now = Utc::now();
        let is_active = self.election().await?.accepts_votes(now);
        let total_voters = self.store().voter_count().await?;
        let candidates = self.candidates().await?;
        Ok(results::compute(candidates, total_voters, is_active, now))
    }

    pub async fn admin_stats(&self) -> Result<AdminStats> {
        let election = self.election().await?;
        let candidates = self.candidates().await?;
        let total_voters = self.store().voter_count().await?;
        let total_votes = candidates.iter().map(|candidate| candidate.votes).sum();

        Ok(AdminStats {
            total_voters,
            total_candidates: candidates.len() as u64,
            total_votes,
            election_status: election.state,
            participation_rate: results::percentage(total_votes, total_voters),
        })
    }

    pub async fn add_candidate(&self, spec: CandidateSpec) -> Result<Candidate> {
        let spec = spec.validated()?;
        let _guard = self.inner.barrier.write().await;
        self.election().await?.ensure_editable("add candidates")?;

        let candidate = Candidate::new(spec, Utc::now());
        self.store().insert_candidate(&candidate).await?;
        info!("Added candidate {} ({})", candidate.id, candidate.name);
        Ok(candidate)
    }

    pub async fn update_candidate(&self, id: Id, spec: CandidateSpec) -> Result<Candidate> {
        let spec = spec.validated()?;
        let _guard = self.inner.barrier.write().await;
        self.election().await?.ensure_editable("edit candidates")?;

        let candidate = self.store().update_candidate(id, spec).await?;
        info!("Updated candidate {id}");
        Ok(candidate)
    }

    pub async fn delete_candidate(&self, id: Id) -> Result<()> {
        let _guard = self.inner.barrier.write().await;
        self.election().await?.ensure_editable("delete candidates")?;

        self.store().delete_candidate(id).await?;
        info!("Deleted candidate {id}");
        Ok(())
    }

    /// Start or stop the election, returning its new state.
    pub async fn toggle(&self) -> Result<ElectionState> {
        let _guard = self.inner.barrier.write().await;
        let mut election = self.election().await?;
        let state = election.toggle(Utc::now());
        self.store().save_election(&election).await?;

        match election.pending_deadline() {
            Some(deadline) => self.inner.closer.schedule(self.clone(), deadline),
            None => self.inner.closer.cancel(),
        }
        info!("Election is now {state}");
        Ok(state)
    }

    /// Zero all votes and return the election to its initial state.
    pub async fn reset(&self) -> Result<()> {
        let _guard = self.inner.barrier.write().await;
        self.store().reset().await?;
        self.inner.closer.cancel();
        warn!("Election has been reset");
        Ok(())
    }

    /// Change the election's title, description and deadline.
    pub async fn update_election(&self, spec: ElectionSpec) -> Result<Election> {
        let _guard = self.inner.barrier.write().await;
        let mut election = self.election().await?;
        election.ensure_editable("edit the election")?;
        election.apply_spec(spec, Utc::now())?;
        self.store().save_election(&election).await?;
        info!("Updated election details");
        Ok(election)
    }

    /// Close the election if its deadline has passed. Returns true iff it was closed.
    pub(crate) async fn close_if_due(&self) -> Result<bool> {
        let _guard = self.inner.barrier.write().await;
        let mut election = self.election().await?;
        if !election.close_if_due(Utc::now()) {
            return Ok(false);
        }
        self.store().save_election(&election).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{DateTime, Duration};
    use rocket::tokio;

    use crate::store::MemoryStore;

    use super::*;

    /// A memory store whose election writes fail while `failures` is non-zero.
    struct FlakyStore {
        inner: MemoryStore,
        failures: Arc<AtomicUsize>,
    }

    #[rocket::async_trait]
    impl ElectionStore for FlakyStore {
        async fn election(&self) -> Result<Election> {
            self.inner.election().await
        }

        async fn save_election(&self, election: &Election) -> Result<()> {
            let failing = self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(Error::Internal("database unavailable".to_string()));
            }
            self.inner.save_election(election).await
        }

        async fn candidates(&self) -> Result<Vec<Candidate>> {
            self.inner.candidates().await
        }

        async fn insert_candidate(&self, candidate: &Candidate) -> Result<()> {
            self.inner.insert_candidate(candidate).await
        }

        async fn update_candidate(&self, id: Id, spec: CandidateSpec) -> Result<Candidate> {
            self.inner.update_candidate(id, spec).await
        }

        async fn delete_candidate(&self, id: Id) -> Result<()> {
            self.inner.delete_candidate(id).await
        }

        async fn voters(&self) -> Result<Vec<Voter>> {
            self.inner.voters().await
        }

        async fn voter(&self, id: Id) -> Result<Option<Voter>> {
            self.inner.voter(id).await
        }

        async fn voter_by_email(&self, email: &str) -> Result<Option<Voter>> {
            self.inner.voter_by_email(email).await
        }

        async fn insert_voter(&self, voter: &Voter) -> Result<()> {
            self.inner.insert_voter(voter).await
        }

        async fn voter_count(&self) -> Result<u64> {
            self.inner.voter_count().await
        }

        async fn record_vote(&self, voter: Id, candidate: Id, now: DateTime<Utc>) -> Result<()> {
            self.inner.record_vote(voter, candidate, now).await
        }

        async fn reset(&self) -> Result<()> {
            self.inner.reset().await
        }
    }

    fn service() -> ElectionService {
        ElectionService::new(MemoryStore::new())
    }

    async fn with_candidates(service: &ElectionService) -> Vec<Id> {
        let mut ids = Vec::new();
        for spec in [
            CandidateSpec::example1(),
            CandidateSpec::example2(),
            CandidateSpec::example3(),
        ] {
            ids.push(service.add_candidate(spec).await.unwrap().id);
        }
        ids
    }

    async fn assert_tally_matches_voters(service: &ElectionService) {
        let votes: u64 = service
            .candidates()
            .await
            .unwrap()
            .iter()
            .map(|c| c.votes)
            .sum();
        let voted = service
            .voters()
            .await
            .unwrap()
            .iter()
            .filter(|v| v.has_voted)
            .count() as u64;
        assert_eq!(votes, voted);
    }

    #[rocket::async_test]
    async fn malformed_candidate_id() {
        let service = service();
        let voter = service
            .register_voter(VoterRegistration::example1())
            .await
            .unwrap();

        assert!(matches!(
            service.submit_vote(voter.id, "not-an-id").await,
            Err(Error::ElectionNotActive)
        ));

        service.toggle().await.unwrap();
        assert!(matches!(
            service.submit_vote(voter.id, "not-an-id").await,
            Err(Error::NotFound(_))
        ));
        assert!(!service.voter(voter.id).await.unwrap().unwrap().has_voted);
    }

    #[rocket::async_test]
    async fn vote_and_receipt() {
        let service = service();
        let candidates = with_candidates(&service).await;
        let voter = service
            .register_voter(VoterRegistration::example1())
            .await
            .unwrap();
        service.toggle().await.unwrap();

        let receipt = service
            .submit_vote(voter.id, &candidates[1].to_string())
            .await
            .unwrap();
        assert!(receipt.success);
        assert_ne!(*receipt.receipt_id, voter.id);

        let status = service.user_status(voter.id).await.unwrap();
        assert!(status.has_voted);
        assert!(!status.can_vote);
        assert!(status.is_election_active);

        let stats = service.voting_stats(Some(voter.id)).await.unwrap();
        assert_eq!(stats.voted_count, 1);
        assert_eq!(stats.total_voters, 1);
        assert!(stats.user_has_voted);
        assert_eq!(stats.remaining_time, "No deadline");

        let results = service.results().await.unwrap();
        assert_eq!(*results.winner.unwrap().id, candidates[1]);
        assert_eq!(results.participation_rate, 100.0);
    }

    #[rocket::async_test]
    async fn candidates_frozen_while_active() {
        let service = service();
        let candidates = with_candidates(&service).await;
        service.toggle().await.unwrap();
        let voter = service
            .register_voter(VoterRegistration::example1())
            .await
            .unwrap();
        service
            .submit_vote(voter.id, &candidates[0].to_string())
            .await
            .unwrap();

        assert!(matches!(
            service.add_candidate(CandidateSpec::example1()).await,
            Err(Error::ElectionActive(_))
        ));
        assert!(matches!(
            service
                .update_candidate(candidates[0], CandidateSpec::example2())
                .await,
            Err(Error::ElectionActive(_))
        ));
        assert!(matches!(
            service.delete_candidate(candidates[0]).await,
            Err(Error::ElectionActive(_))
        ));
        assert!(matches!(
            service.update_election(ElectionSpec::default()).await,
            Err(Error::ElectionActive(_))
        ));

        // Validation comes before the state check.
        assert!(matches!(
            service.add_candidate(CandidateSpec::default()).await,
            Err(Error::Validation(ref fields)) if fields.len() == 5
        ));

        assert_eq!(service.toggle().await.unwrap(), ElectionState::Closed);
        let updated = service
            .update_candidate(candidates[0], CandidateSpec::example2())
            .await
            .unwrap();
        assert_eq!(updated.name, CandidateSpec::example2().name);
        assert_eq!(updated.votes, 1);
        assert!(matches!(
            service.delete_candidate(candidates[0]).await,
            Err(Error::CandidateHasVotes(_))
        ));
    }

    #[rocket::async_test]
    async fn reset_interleaved_with_votes() {
        let service = service();
        let candidates = with_candidates(&service).await;
        let mut voters = Vec::new();
        for n in 0..40 {
            let voter = service
                .register_voter(VoterRegistration::numbered(n))
                .await
                .unwrap();
            voters.push(voter.id);
        }
        service.toggle().await.unwrap();

        let mut handles = Vec::new();
        for (i, voter) in voters.into_iter().enumerate() {
            let voting = service.clone();
            let candidate = candidates[i % candidates.len()].to_string();
            handles.push(tokio::spawn(async move {
                let _ = voting.submit_vote(voter, &candidate).await;
            }));
            if i == 20 {
                let resetting = service.clone();
                handles.push(tokio::spawn(async move {
                    resetting.reset().await.unwrap();
                }));
            }
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_tally_matches_voters(&service).await;
    }

    #[rocket::async_test]
    async fn admin_stats_after_votes() {
        let service = service();
        let candidates = with_candidates(&service).await;
        for n in 0..4 {
            service
                .register_voter(VoterRegistration::numbered(n))
                .await
                .unwrap();
        }
        service.toggle().await.unwrap();
        let voter = service.voters().await.unwrap()[0].id;
        service
            .submit_vote(voter, &candidates[0].to_string())
            .await
            .unwrap();

        let stats = service.admin_stats().await.unwrap();
        assert_eq!(stats.total_voters, 4);
        assert_eq!(stats.total_candidates, 3);
        assert_eq!(stats.total_votes, 1);
        assert_eq!(stats.election_status, ElectionState::Active);
        assert_eq!(stats.participation_rate, 25.0);

        service.reset().await.unwrap();
        let stats = service.admin_stats().await.unwrap();
        assert_eq!(stats.total_votes, 0);
        assert_eq!(stats.election_status, ElectionState::Inactive);
    }

    #[rocket::async_test]
    async fn closes_at_deadline() {
        let service = service();
        let deadline = Utc::now() + Duration::milliseconds(300);
        service
            .update_election(ElectionSpec {
                title: "Snap Election".into(),
                description: String::new(),
                end_date: Some(deadline),
            })
            .await
            .unwrap();
        service.toggle().await.unwrap();
        assert!(service.status().await.unwrap().is_active);

        tokio::time::sleep(std::time::Duration::from_millis(800)).await;
        let election = service.election().await.unwrap();
        assert_eq!(election.state, ElectionState::Closed);
        assert_eq!(election.end_date, Some(deadline));
    }

    #[rocket::async_test]
    async fn closer_retries_failed_close() {
        let failures = Arc::new(AtomicUsize::new(0));
        let service = ElectionService::new(FlakyStore {
            inner: MemoryStore::new(),
            failures: failures.clone(),
        });
        service
            .update_election(ElectionSpec {
                title: "Snap Election".into(),
                description: String::new(),
                end_date: Some(Utc::now() + Duration::milliseconds(200)),
            })
            .await
            .unwrap();
        service.toggle().await.unwrap();

        // The first close at the deadline fails; the retry a second later succeeds.
        failures.store(1, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(600)).await;
        assert_eq!(failures.load(Ordering::SeqCst), 0);
        assert_eq!(
            service.election().await.unwrap().state,
            ElectionState::Active
        );

        tokio::time::sleep(std::time::Duration::from_millis(1200)).await;
        assert_eq!(
            service.election().await.unwrap().state,
            ElectionState::Closed
        );
    }

    #[rocket::async_test]
    async fn stopping_cancels_closer() {
        let service = service();
        service
            .update_election(ElectionSpec {
                title: "Snap Election".into(),
                description: String::new(),
                end_date: Some(Utc::now() + Duration::milliseconds(300)),
            })
            .await
            .unwrap();
        service.toggle().await.unwrap();
        service.toggle().await.unwrap();
        service.toggle().await.unwrap();

        // The old deadline was discarded on restart, so nothing closes the election.
        tokio::time::sleep(std::time::Duration::from_millis(800)).await;
        assert_eq!(
            service.election().await.unwrap().state,
            ElectionState::Active
        );
    }

    #[rocket::async_test]
    async fn resume_closes_overdue_election() {
        let store = MemoryStore::new();
        let mut election = Election::default();
        election.toggle(Utc::now() - Duration::hours(2));
        election.end_date = Some(Utc::now() - Duration::hours(1));
        store.save_election(&election).await.unwrap();

        let service = ElectionService::new(store);
        assert!(!service.status().await.unwrap().is_active);
        service.resume().await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        assert_eq!(
            service.election().await.unwrap().state,
            ElectionState::Closed
        );
    }

    #[rocket::async_test]
    async fn voter_emails_are_normalised() {
        let service = service();
        service
            .register_voter(VoterRegistration {
                name: "Alice".into(),
                email: "  Alice@Example.COM ".into(),
            })
            .await
            .unwrap();
        assert!(service
            .voter_by_email("alice@example.com")
            .await
            .unwrap()
            .is_some());
        assert!(matches!(
            service
                .register_voter(VoterRegistration {
                    name: "Other Alice".into(),
                    email: "ALICE@example.com".into(),
                })
                .await,
            Err(Error::DuplicateEmail(_))
        ));
    }
}
