use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::model::{
    api::candidate::CandidateSpec,
    db::{Candidate, Election, Voter},
    mongodb::Id,
};

use super::ElectionStore;

#[derive(Default)]
struct State {
    election: Election,
    // IDs increase with creation time, so map order is registration order.
    candidates: BTreeMap<Id, Candidate>,
    voters: BTreeMap<Id, Voter>,
    emails: HashMap<String, Id>,
}

/// An in-process store. A single lock over the whole election serialises every
/// write, which trivially makes each operation atomic.
///
/// Used in development when no database is reachable, and in tests.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[rocket::async_trait]
impl ElectionStore for MemoryStore {
    async fn election(&self) -> Result<Election> {
        Ok(self.state.lock().election.clone())
    }

    async fn save_election(&self, election: &Election) -> Result<()> {
        self.state.lock().election = election.clone();
        Ok(())
    }

    async fn candidates(&self) -> Result<Vec<Candidate>> {
        Ok(self.state.lock().candidates.values().cloned().collect())
    }

    async fn insert_candidate(&self, candidate: &Candidate) -> Result<()> {
        self.state
            .lock()
            .candidates
            .insert(candidate.id, candidate.clone());
        Ok(())
    }

    async fn update_candidate(&self, id: Id, spec: CandidateSpec) -> Result<Candidate> {
        let mut state = self.state.lock();
        let candidate = state
            .candidates
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("Candidate {id}")))?;
        candidate.apply_spec(spec);
        Ok(candidate.clone())
    }

    async fn delete_candidate(&self, id: Id) -> Result<()> {
        let mut state = self.state.lock();
        match state.candidates.get(&id) {
            None => Err(Error::not_found(format!("Candidate {id}"))),
            Some(candidate) if candidate.votes > 0 => Err(Error::CandidateHasVotes(id)),
            Some(_) => {
                state.candidates.remove(&id);
                Ok(())
            }
        }
    }

    async fn voters(&self) -> Result<Vec<Voter>> {
        Ok(self.state.lock().voters.values().cloned().collect())
    }

    async fn voter(&self, id: Id) -> Result<Option<Voter>> {
        Ok(self.state.lock().voters.get(&id).cloned())
    }

    async fn voter_by_email(&self, email: &str) -> Result<Option<Voter>> {
        let state = self.state.lock();
        Ok(state
            .emails
            .get(email)
            .and_then(|id| state.voters.get(id))
            .cloned())
    }

    async fn insert_voter(&self, voter: &Voter) -> Result<()> {
        let mut state = self.state.lock();
        if state.emails.contains_key(&voter.email) {
            return Err(Error::DuplicateEmail(voter.email.clone()));
        }
        state.emails.insert(voter.email.clone(), voter.id);
        state.voters.insert(voter.id, voter.clone());
        Ok(())
    }

    async fn voter_count(&self) -> Result<u64> {
        Ok(self.state.lock().voters.len() as u64)
    }

    async fn record_vote(&self, voter_id: Id, candidate_id: Id, now: DateTime<Utc>) -> Result<()> {
        let mut state = self.state.lock();
        let State {
            election,
            candidates,
            voters,
            ..
        } = &mut *state;

        if !election.accepts_votes(now) {
            return Err(Error::ElectionNotActive);
        }
        let candidate = candidates
            .get_mut(&candidate_id)
            .ok_or_else(|| Error::not_found(format!("Candidate {candidate_id}")))?;
        let voter = voters
            .get_mut(&voter_id)
            .ok_or_else(|| Error::not_found(format!("Voter {voter_id}")))?;
        if voter.has_voted {
            return Err(Error::AlreadyVoted);
        }

        voter.has_voted = true;
        candidate.votes += 1;
        Ok(())
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.election.reset();
        for candidate in state.candidates.values_mut() {
            candidate.votes = 0;
        }
        for voter in state.voters.values_mut() {
            voter.has_voted = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rocket::tokio;

    use crate::model::api::auth::VoterRegistration;

    use super::*;

    async fn active_store() -> MemoryStore {
        let store = MemoryStore::new();
        let mut election = Election::default();
        election.toggle(Utc::now());
        store.save_election(&election).await.unwrap();
        store
    }

    async fn add_candidate(store: &MemoryStore, spec: CandidateSpec) -> Id {
        let candidate = Candidate::new(spec, Utc::now());
        store.insert_candidate(&candidate).await.unwrap();
        candidate.id
    }

    async fn add_voter(store: &MemoryStore, registration: VoterRegistration) -> Id {
        let voter = Voter::new(registration, Utc::now());
        store.insert_voter(&voter).await.unwrap();
        voter.id
    }

    async fn assert_tally_matches_voters(store: &MemoryStore) {
        let votes: u64 = store
            .candidates()
            .await
            .unwrap()
            .iter()
            .map(|c| c.votes)
            .sum();
        let voted = store
            .voters()
            .await
            .unwrap()
            .iter()
            .filter(|v| v.has_voted)
            .count() as u64;
        assert_eq!(votes, voted);
    }

    #[rocket::async_test]
    async fn vote_preconditions_in_order() {
        let store = MemoryStore::new();
        let candidate = add_candidate(&store, CandidateSpec::example1()).await;
        let voter = add_voter(&store, VoterRegistration::example1()).await;
        let now = Utc::now();

        // Inactive election wins over unknown candidate and voter.
        let result = store.record_vote(Id::new(), Id::new(), now).await;
        assert!(matches!(result, Err(Error::ElectionNotActive)));

        let mut election = store.election().await.unwrap();
        election.toggle(now);
        store.save_election(&election).await.unwrap();

        // Unknown candidate wins over unknown voter.
        let result = store.record_vote(Id::new(), Id::new(), now).await;
        assert!(matches!(result, Err(Error::NotFound(ref what)) if what.starts_with("Candidate")));

        let result = store.record_vote(Id::new(), candidate, now).await;
        assert!(matches!(result, Err(Error::NotFound(ref what)) if what.starts_with("Voter")));

        store.record_vote(voter, candidate, now).await.unwrap();
        let result = store.record_vote(voter, candidate, now).await;
        assert!(matches!(result, Err(Error::AlreadyVoted)));

        assert_tally_matches_voters(&store).await;
    }

    #[rocket::async_test]
    async fn failed_votes_change_nothing() {
        let store = MemoryStore::new();
        let candidate = add_candidate(&store, CandidateSpec::example1()).await;
        let voter = add_voter(&store, VoterRegistration::example1()).await;

        let result = store.record_vote(voter, candidate, Utc::now()).await;
        assert!(matches!(result, Err(Error::ElectionNotActive)));

        assert_eq!(store.candidates().await.unwrap()[0].votes, 0);
        assert!(!store.voter(voter).await.unwrap().unwrap().has_voted);
    }

    #[rocket::async_test]
    async fn concurrent_votes_by_one_voter() {
        let store = Arc::new(active_store().await);
        let first = add_candidate(&store, CandidateSpec::example1()).await;
        let second = add_candidate(&store, CandidateSpec::example2()).await;
        let voter = add_voter(&store, VoterRegistration::example1()).await;

        let handles = (0..32)
            .map(|i| {
                let store = store.clone();
                let candidate = if i % 2 == 0 { first } else { second };
                tokio::spawn(async move { store.record_vote(voter, candidate, Utc::now()).await })
            })
            .collect::<Vec<_>>();

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => successes += 1,
                Err(Error::AlreadyVoted) => {}
                Err(e) => panic!("unexpected error {e}"),
            }
        }
        assert_eq!(successes, 1);
        assert_tally_matches_voters(&store).await;
    }

    #[rocket::async_test]
    async fn reset_clears_everything() {
        let store = active_store().await;
        let candidate = add_candidate(&store, CandidateSpec::example1()).await;
        for n in 0..5 {
            let voter = add_voter(&store, VoterRegistration::numbered(n)).await;
            store.record_vote(voter, candidate, Utc::now()).await.unwrap();
        }
        assert_eq!(store.candidates().await.unwrap()[0].votes, 5);

        store.reset().await.unwrap();
        assert_eq!(store.candidates().await.unwrap()[0].votes, 0);
        assert!(store.voters().await.unwrap().iter().all(|v| !v.has_voted));
        assert_eq!(store.election().await.unwrap().state, Default::default());
    }

    #[rocket::async_test]
    async fn delete_candidate_with_votes() {
        let store = active_store().await;
        let voted = add_candidate(&store, CandidateSpec::example1()).await;
        let unvoted = add_candidate(&store, CandidateSpec::example2()).await;
        let voter = add_voter(&store, VoterRegistration::example1()).await;
        store.record_vote(voter, voted, Utc::now()).await.unwrap();

        assert!(matches!(
            store.delete_candidate(voted).await,
            Err(Error::CandidateHasVotes(id)) if id == voted
        ));
        store.delete_candidate(unvoted).await.unwrap();
        assert!(matches!(
            store.delete_candidate(unvoted).await,
            Err(Error::NotFound(_))
        ));
        assert_eq!(store.candidates().await.unwrap().len(), 1);
    }

    #[rocket::async_test]
    async fn duplicate_email() {
        let store = MemoryStore::new();
        add_voter(&store, VoterRegistration::example1()).await;
        let duplicate = Voter::new(VoterRegistration::example1(), Utc::now());
        assert!(matches!(
            store.insert_voter(&duplicate).await,
            Err(Error::DuplicateEmail(_))
        ));
        assert_eq!(store.voter_count().await.unwrap(), 1);
        assert!(store
            .voter_by_email(&VoterRegistration::example1().email)
            .await
            .unwrap()
            .is_some());
    }

    #[rocket::async_test]
    async fn candidates_in_registration_order() {
        let store = MemoryStore::new();
        let first = add_candidate(&store, CandidateSpec::example2()).await;
        let second = add_candidate(&store, CandidateSpec::example1()).await;
        let ids = store
            .candidates()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![first, second]);
    }
}
