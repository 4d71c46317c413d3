mod request;
mod token;
mod user;

pub use request::{
    normalise_email, AdminCredentials, RegistrationResponse, VoterLogin, VoterRegistration,
};
pub use token::{AuthToken, AUTH_TOKEN_COOKIE};
pub use user::{Admin, Rights, User};

#[cfg(test)]
pub use request::examples;
