use std::ops::Deref;

use mongodb::{
    bson::{self, doc, Document},
    error::Error as DbError,
    options::{IndexOptions, UpdateOptions},
    Collection, Database, IndexModel,
};

use crate::model::db::{Candidate, Election, Voter};

use super::errors::is_duplicate_key_error;

/// The fixed `_id` of the singleton election record.
const ELECTION_ID: &str = "election";

/// Filter matching the singleton election record.
pub fn election_filter() -> Document {
    doc! { "_id": ELECTION_ID }
}

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl MongoCollection for Candidate {
    const NAME: &'static str = "candidates";
}

impl MongoCollection for Voter {
    const NAME: &'static str = "voters";
}

impl MongoCollection for Election {
    const NAME: &'static str = "election";
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Emails identify voters at sign-in, so they must be unique.
    let voter_index = IndexModel::builder()
        .keys(doc! {"email": 1})
        .options(unique)
        .build();
    Coll::<Voter>::from_db(db)
        .create_index(voter_index, None)
        .await?;

    Ok(())
}

/// Ensure the singleton election record exists, creating a fresh inactive one if not.
///
/// This operation is idempotent.
pub async fn ensure_election_exists(db: &Database) -> Result<(), DbError> {
    let fresh = bson::to_document(&Election::default())?;
    let options = UpdateOptions::builder().upsert(true).build();
    let result = Coll::<Election>::from_db(db)
        .update_one(election_filter(), doc! { "$setOnInsert": fresh }, options)
        .await;

    match result {
        Ok(result) if result.upserted_id.is_some() => {
            info!("No election record found, created one");
        }
        Ok(_) => {}
        // Another instance upserted it first.
        Err(err) if is_duplicate_key_error(&err) => {}
        Err(err) => return Err(err),
    }
    Ok(())
}
