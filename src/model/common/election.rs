use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// States in the election lifecycle.
///
/// `Inactive` is the state after bootstrap and after every reset. Toggling moves an active
/// election to `Closed`, and any other election to `Active`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionState {
    /// Not yet started; candidates may be edited.
    Inactive,
    /// Accepting votes; candidates are frozen.
    Active,
    /// Stopped; votes are retained and candidates may be edited again.
    Closed,
}

impl ElectionState {
    /// The state a toggle moves this state into.
    pub fn toggled(self) -> Self {
        match self {
            Self::Active => Self::Closed,
            Self::Inactive | Self::Closed => Self::Active,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Closed => "closed",
        }
    }
}

impl Default for ElectionState {
    fn default() -> Self {
        Self::Inactive
    }
}

impl Display for ElectionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
