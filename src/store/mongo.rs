use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use mongodb::{
    bson::doc,
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Client, ClientSession, Database,
};
use rand::Rng;
use rocket::{futures::TryStreamExt, tokio};

use crate::error::{Error, Result};
use crate::model::{
    api::candidate::CandidateSpec,
    db::{Candidate, Election, Voter},
    mongodb::{
        election_filter, ensure_election_exists, ensure_indexes_exist, is_duplicate_key_error,
        is_transient_transaction_error, is_unknown_commit_result, Coll, Id,
    },
};

use super::ElectionStore;

/// How long a vote keeps retrying after write conflicts before giving up.
const VOTE_RETRY_BUDGET: Duration = Duration::from_secs(10);

/// Ceiling of the first retry's random delay. Doubles with each attempt up to
/// [`VOTE_BACKOFF_MAX`].
const VOTE_BACKOFF_BASE: Duration = Duration::from_millis(5);
const VOTE_BACKOFF_MAX: Duration = Duration::from_millis(500);

/// Random delay before retry number `attempt` (from 1). Every vote for a candidate
/// increments the same document, so popular candidates conflict often and the
/// jitter spreads the retries out.
fn vote_backoff(attempt: u32) -> Duration {
    let ceiling = VOTE_BACKOFF_BASE
        .saturating_mul(1 << attempt.min(16))
        .min(VOTE_BACKOFF_MAX);
    let millis = rand::thread_rng().gen_range(0..=ceiling.as_millis() as u64);
    Duration::from_millis(millis)
}

/// Commit the session's transaction, committing again while the outcome is unknown.
async fn commit_with_retry(session: &mut ClientSession, give_up: Instant) -> Result<()> {
    loop {
        match session.commit_transaction().await {
            Err(err) if is_unknown_commit_result(&err) && Instant::now() < give_up => {
                debug!("Vote commit result unknown, committing again");
            }
            result => return Ok(result?),
        }
    }
}

/// A MongoDB-backed store. Multi-document operations run in transactions, so
/// the server must be a replica set.
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    /// Connect to the database, ensuring the indexes and election record exist.
    pub async fn connect(uri: &str, database: &str) -> std::result::Result<Self, DbError> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(database);
        ensure_indexes_exist(&db).await?;
        ensure_election_exists(&db).await?;
        Ok(Self { client, db })
    }

    fn elections(&self) -> Coll<Election> {
        Coll::from_db(&self.db)
    }

    fn candidate_coll(&self) -> Coll<Candidate> {
        Coll::from_db(&self.db)
    }

    fn voter_coll(&self) -> Coll<Voter> {
        Coll::from_db(&self.db)
    }

    /// One attempt at the vote transaction.
    async fn try_record_vote(
        &self,
        voter_id: Id,
        candidate_id: Id,
        now: DateTime<Utc>,
        give_up: Instant,
    ) -> Result<()> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        match self
            .record_vote_in(&mut session, voter_id, candidate_id, now)
            .await
        {
            Ok(()) => commit_with_retry(&mut session, give_up).await,
            Err(err) => {
                if let Err(abort_err) = session.abort_transaction().await {
                    warn!("Failed to abort vote transaction: {abort_err}");
                }
                Err(err)
            }
        }
    }

    async fn record_vote_in(
        &self,
        session: &mut ClientSession,
        voter_id: Id,
        candidate_id: Id,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let election = self
            .elections()
            .find_one_with_session(election_filter(), None, session)
            .await?
            .ok_or_else(|| Error::Internal("Election record is missing".to_string()))?;
        if !election.accepts_votes(now) {
            return Err(Error::ElectionNotActive);
        }

        let candidates = self.candidate_coll();
        candidates
            .find_one_with_session(candidate_id.as_doc(), None, session)
            .await?
            .ok_or_else(|| Error::not_found(format!("Candidate {candidate_id}")))?;

        // Check-and-set: only a voter who has not voted matches.
        let voters = self.voter_coll();
        let filter = doc! {
            "_id": *voter_id,
            "has_voted": false,
        };
        let update = doc! {
            "$set": { "has_voted": true }
        };
        let result = voters
            .update_one_with_session(filter, update, None, session)
            .await?;
        if result.matched_count == 0 {
            let exists = voters
                .find_one_with_session(voter_id.as_doc(), None, session)
                .await?
                .is_some();
            return Err(if exists {
                Error::AlreadyVoted
            } else {
                Error::not_found(format!("Voter {voter_id}"))
            });
        }

        let update = doc! {
            "$inc": { "votes": 1_i64 }
        };
        candidates
            .update_one_with_session(candidate_id.as_doc(), update, None, session)
            .await?;
        Ok(())
    }
}

#[rocket::async_trait]
impl ElectionStore for MongoStore {
    async fn election(&self) -> Result<Election> {
        self.elections()
            .find_one(election_filter(), None)
            .await?
            .ok_or_else(|| Error::Internal("Election record is missing".to_string()))
    }

    async fn save_election(&self, election: &Election) -> Result<()> {
        self.elections()
            .replace_one(election_filter(), election, None)
            .await?;
        Ok(())
    }

    async fn candidates(&self) -> Result<Vec<Candidate>> {
        let options = FindOptions::builder().sort(doc! {"_id": 1}).build();
        let candidates = self
            .candidate_coll()
            .find(None, options)
            .await?
            .try_collect()
            .await?;
        Ok(candidates)
    }

    async fn insert_candidate(&self, candidate: &Candidate) -> Result<()> {
        self.candidate_coll().insert_one(candidate, None).await?;
        Ok(())
    }

    async fn update_candidate(&self, id: Id, spec: CandidateSpec) -> Result<Candidate> {
        let update = doc! {
            "$set": {
                "name": spec.name,
                "party": spec.party,
                "symbol": spec.symbol,
                "description": spec.description,
                "color": spec.color,
            }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        self.candidate_coll()
            .find_one_and_update(id.as_doc(), update, options)
            .await?
            .ok_or_else(|| Error::not_found(format!("Candidate {id}")))
    }

    async fn delete_candidate(&self, id: Id) -> Result<()> {
        let candidates = self.candidate_coll();
        let filter = doc! {
            "_id": *id,
            "votes": 0_i64,
        };
        let result = candidates.delete_one(filter, None).await?;
        if result.deleted_count == 1 {
            return Ok(());
        }

        // Work out why nothing was deleted.
        match candidates.find_one(id.as_doc(), None).await? {
            Some(_) => Err(Error::CandidateHasVotes(id)),
            None => Err(Error::not_found(format!("Candidate {id}"))),
        }
    }

    async fn voters(&self) -> Result<Vec<Voter>> {
        let options = FindOptions::builder().sort(doc! {"_id": 1}).build();
        let voters = self
            .voter_coll()
            .find(None, options)
            .await?
            .try_collect()
            .await?;
        Ok(voters)
    }

    async fn voter(&self, id: Id) -> Result<Option<Voter>> {
        Ok(self.voter_coll().find_one(id.as_doc(), None).await?)
    }

    async fn voter_by_email(&self, email: &str) -> Result<Option<Voter>> {
        let filter = doc! { "email": email };
        Ok(self.voter_coll().find_one(filter, None).await?)
    }

    async fn insert_voter(&self, voter: &Voter) -> Result<()> {
        match self.voter_coll().insert_one(voter, None).await {
            Ok(_) => Ok(()),
            Err(err) if is_duplicate_key_error(&err) => {
                Err(Error::DuplicateEmail(voter.email.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn voter_count(&self) -> Result<u64> {
        Ok(self.voter_coll().count_documents(None, None).await?)
    }

    async fn record_vote(&self, voter_id: Id, candidate_id: Id, now: DateTime<Utc>) -> Result<()> {
        let give_up = Instant::now() + VOTE_RETRY_BUDGET;
        let mut attempt = 0;
        loop {
            match self
                .try_record_vote(voter_id, candidate_id, now, give_up)
                .await
            {
                // A concurrent vote touched the same voter or candidate. Running again will
                // either succeed or see that the other vote by this voter won.
                Err(Error::Db(err))
                    if is_transient_transaction_error(&err) && Instant::now() < give_up =>
                {
                    attempt += 1;
                    let delay = vote_backoff(attempt);
                    debug!(
                        "Vote transaction conflicted, retry {attempt} in {}ms",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    async fn reset(&self) -> Result<()> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let mut election = self
            .elections()
            .find_one_with_session(election_filter(), None, &mut session)
            .await?
            .ok_or_else(|| Error::Internal("Election record is missing".to_string()))?;
        election.reset();
        self.elections()
            .replace_one_with_session(election_filter(), &election, None, &mut session)
            .await?;

        self.candidate_coll()
            .update_many_with_session(
                doc! {},
                doc! { "$set": { "votes": 0_i64 } },
                None,
                &mut session,
            )
            .await?;
        self.voter_coll()
            .update_many_with_session(
                doc! {},
                doc! { "$set": { "has_voted": false } },
                None,
                &mut session,
            )
            .await?;

        // Dropping the session without committing aborts the transaction, so an early
        // return above leaves everything untouched.
        session.commit_transaction().await?;
        Ok(())
    }
}
