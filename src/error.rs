use argon2::Error as Argon2Error;
use jsonwebtoken::errors::Error as JwtError;
use mongodb::error::Error as DbError;
use rocket::{
    http::Status,
    response::{self, Responder},
    serde::json::{json, Json},
    Request, Response,
};
use thiserror::Error;

use crate::logging::RequestId;
use crate::model::mongodb::Id;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Missing or invalid fields: {}", .0.join(", "))]
    Validation(Vec<String>),
    #[error("{0} not found")]
    NotFound(String),
    #[error("You have already voted in this election")]
    AlreadyVoted,
    #[error("The election is not currently accepting votes")]
    ElectionNotActive,
    #[error("Cannot {0} while the election is active")]
    ElectionActive(&'static str),
    #[error("A voter with email {0} is already registered")]
    DuplicateEmail(String),
    #[error("Candidate {0} has received votes; reset the election before deleting it")]
    CandidateHasVotes(Id),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
    #[error("{0}")]
    Internal(String),
}

impl Error {
    /// A validation failure for the given field names.
    pub fn validation<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Validation(fields.into_iter().map(Into::into).collect())
    }

    /// A missing resource, described by e.g. `"Candidate 63f1..."`.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::Validation(_) => Status::BadRequest,
            Self::NotFound(_) => Status::NotFound,
            Self::AlreadyVoted
            | Self::DuplicateEmail(_)
            | Self::CandidateHasVotes(_)
            | Self::ElectionActive(_) => Status::Conflict,
            Self::ElectionNotActive => Status::Forbidden,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::Db(_) | Self::Jwt(_) | Self::Argon2(_) | Self::Internal(_) => {
                Status::InternalServerError
            }
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();

        // Never leak internal detail to the caller.
        let message = if status == Status::InternalServerError {
            let id = req.local_cache(RequestId::next);
            error!("req{id} failed: {self}");
            "Internal server error".to_string()
        } else {
            let id = req.local_cache(RequestId::next);
            debug!("req{id} rejected: {self}");
            self.to_string()
        };

        let mut body = json!({
            "success": false,
            "message": message,
        });
        if let Self::Validation(fields) = &self {
            body["fields"] = json!(fields);
        }

        Response::build_from(Json(body).respond_to(req)?)
            .status(status)
            .ok()
    }
}
