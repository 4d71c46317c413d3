use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::api::admin::VoterDescription;

/// A new voter signing up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoterRegistration {
    pub name: String,
    pub email: String,
}

impl VoterRegistration {
    /// Trim the name and normalise the email, failing with the names of any invalid fields.
    pub fn validated(self) -> Result<Self> {
        let name = self.name.trim().to_string();
        let email = normalise_email(&self.email);

        let mut invalid = Vec::new();
        if name.is_empty() {
            invalid.push("name");
        }
        if !is_plausible_email(&email) {
            invalid.push("email");
        }
        if !invalid.is_empty() {
            return Err(Error::validation(invalid));
        }

        Ok(Self { name, email })
    }
}

/// A returning voter signing in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterLogin {
    pub email: String,
}

/// Raw admin credentials, received from a user. These are never stored.
#[derive(Clone, Deserialize, Serialize)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationResponse {
    pub success: bool,
    pub message: String,
    pub voter: VoterDescription,
}

/// Emails are compared case-insensitively and without surrounding whitespace.
pub fn normalise_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}
