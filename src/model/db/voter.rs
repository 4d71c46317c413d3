use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{api::auth::VoterRegistration, mongodb::Id};

/// Core voter data, as stored in the database.
///
/// Nothing here records *who* a voter chose; only that they have voted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    pub name: String,
    /// Normalised (trimmed, lowercase) email address.
    pub email: String,
    pub has_voted: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub registered_at: DateTime<Utc>,
}

/// A voter from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Voter {
    /// Create a voter who has not yet voted from a validated registration.
    pub fn new(registration: VoterRegistration, registered_at: DateTime<Utc>) -> Self {
        Self {
            id: Id::new(),
            voter: VoterCore {
                name: registration.name,
                email: registration.email,
                has_voted: false,
                registered_at,
            },
        }
    }
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}
