//! Derived election results. Nothing here is stored; every snapshot is
//! computed afresh from the candidate tallies.

use chrono::{DateTime, Utc};

use crate::model::{
    api::results::{CandidateResult, ElectionResults},
    db::Candidate,
};

/// Compute a results snapshot.
///
/// The winner is the candidate with the most votes, with ties going to the
/// earliest-registered candidate. There is no winner until a vote is cast.
pub fn compute(
    mut candidates: Vec<Candidate>,
    total_voters: u64,
    is_election_active: bool,
    now: DateTime<Utc>,
) -> ElectionResults {
    candidates.sort_by_key(|candidate| candidate.id);
    let total_votes: u64 = candidates.iter().map(|candidate| candidate.votes).sum();

    let candidates = candidates
        .into_iter()
        .map(|candidate| CandidateResult {
            id: candidate.id.into(),
            percentage: percentage(candidate.votes, total_votes),
            votes: candidate.candidate.votes,
            name: candidate.candidate.name,
            party: candidate.candidate.party,
            symbol: candidate.candidate.symbol,
            color: candidate.candidate.color,
        })
        .collect::<Vec<_>>();

    // Only a strictly greater count displaces the leader, so the earliest wins ties.
    let winner = candidates
        .iter()
        .filter(|candidate| candidate.votes > 0)
        .fold(None, |leader: Option<&CandidateResult>, candidate| match leader {
            Some(leader) if leader.votes >= candidate.votes => Some(leader),
            _ => Some(candidate),
        })
        .cloned();

    ElectionResults {
        candidates,
        total_votes,
        total_voters,
        participation_rate: percentage(total_votes, total_voters),
        winner,
        is_election_active,
        last_updated: now,
    }
}

/// `part` as a percentage of `whole`, to one decimal place. Zero when `whole` is zero.
pub fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    let exact = part as f64 * 100.0 / whole as f64;
    (exact * 10.0).round() / 10.0
}
