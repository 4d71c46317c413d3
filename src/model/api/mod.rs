//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Datetimes are serialised as RFC 3339 strings.
//! - Field names are camelCase, as the VoteEase client expects.

pub mod admin;
pub mod auth;
pub mod candidate;
pub mod id;
pub mod results;
pub mod voting;
