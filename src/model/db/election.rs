use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::admin::ElectionSpec, common::election::ElectionState, mongodb::optional_datetime,
};

pub const DEFAULT_TITLE: &str = "General Election";
pub const DEFAULT_DESCRIPTION: &str = "Vote for your preferred candidate";

pub const NOT_ACTIVE: &str = "Election not active";
pub const NO_DEADLINE: &str = "No deadline";

/// The singleton election record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    pub state: ElectionState,
    pub title: String,
    pub description: String,
    /// When the election was last started.
    #[serde(default, with = "optional_datetime")]
    pub start_date: Option<DateTime<Utc>>,
    /// The scheduled deadline while active, or when the election was stopped once closed.
    #[serde(default, with = "optional_datetime")]
    pub end_date: Option<DateTime<Utc>>,
}

impl Default for Election {
    fn default() -> Self {
        Self {
            state: ElectionState::Inactive,
            title: DEFAULT_TITLE.to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
            start_date: None,
            end_date: None,
        }
    }
}

impl Election {
    pub fn is_active(&self) -> bool {
        self.state == ElectionState::Active
    }

    /// Is a vote cast at `now` acceptable?
    pub fn accepts_votes(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.end_date.map_or(true, |end| now < end)
    }

    /// Fail with [`Error::ElectionActive`] if the election is running.
    /// `action` completes the sentence "Cannot ... while the election is active".
    pub fn ensure_editable(&self, action: &'static str) -> Result<()> {
        if self.is_active() {
            Err(Error::ElectionActive(action))
        } else {
            Ok(())
        }
    }

    /// Start or stop the election, returning the new state.
    pub fn toggle(&mut self, now: DateTime<Utc>) -> ElectionState {
        self.state = self.state.toggled();
        match self.state {
            ElectionState::Active => {
                self.start_date = Some(now);
                // A deadline that has already passed would close the election immediately.
                if self.end_date.map_or(false, |end| end <= now) {
                    self.end_date = None;
                }
            }
            _ => self.end_date = Some(now),
        }
        self.state
    }

    /// Return to the initial state. Title and description survive.
    pub fn reset(&mut self) {
        self.state = ElectionState::Inactive;
        self.start_date = None;
        self.end_date = None;
    }

    /// Close the election if its deadline has passed. Returns true iff it was closed.
    pub fn close_if_due(&mut self, now: DateTime<Utc>) -> bool {
        match self.end_date {
            Some(end) if self.is_active() && end <= now => {
                self.state = ElectionState::Closed;
                true
            }
            _ => false,
        }
    }

    /// The deadline the election should be closed at, if it is running with one.
    pub fn pending_deadline(&self) -> Option<DateTime<Utc>> {
        self.end_date.filter(|_| self.is_active())
    }

    /// Replace the election details with those from an admin.
    pub fn apply_spec(&mut self, spec: ElectionSpec, now: DateTime<Utc>) -> Result<()> {
        let mut invalid = Vec::new();
        let title = spec.title.trim();
        if title.is_empty() {
            invalid.push("title");
        }
        if spec.end_date.map_or(false, |end| end <= now) {
            invalid.push("endDate");
        }
        if !invalid.is_empty() {
            return Err(Error::validation(invalid));
        }

        self.title = title.to_string();
        self.description = spec.description.trim().to_string();
        self.end_date = spec.end_date;
        Ok(())
    }

    /// Human-readable time left to vote, e.g. `"2 days, 14 hours"`.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> String {
        if !self.accepts_votes(now) {
            return NOT_ACTIVE.to_string();
        }
        match self.end_date {
            Some(end) => format_remaining(end - now),
            None => NO_DEADLINE.to_string(),
        }
    }
}

fn format_remaining(remaining: Duration) -> String {
    let minutes = remaining.num_minutes().max(0);
    let days = minutes / (60 * 24);
    let hours = minutes / 60 % 24;
    if days > 0 {
        format!("{}, {}", plural(days, "day"), plural(hours, "hour"))
    } else {
        format!("{}, {}", plural(hours, "hour"), plural(minutes % 60, "minute"))
    }
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {unit}")
    } else {
        format!("{count} {unit}s")
    }
}
