use argon2::Error as Argon2Error;
use chrono::Duration;
use rand::Rng;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::service::ElectionService;
use crate::store::{MemoryStore, MongoStore};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    auth_ttl: u32,
    admin_username: String,
    // secrets
    jwt_secret: String,
    #[serde(default)]
    admin_password_hash: Option<String>,
    /// Development convenience: hashed at ignite and then discarded.
    #[serde(default)]
    admin_password: Option<String>,
}

impl Config {
    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to encrypt JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Check a username and password against the configured admin account.
    pub fn verify_admin(&self, username: &str, password: &str) -> Result<bool, Argon2Error> {
        if username != self.admin_username {
            return Ok(false);
        }
        match &self.admin_password_hash {
            Some(hash) => argon2::verify_encoded(hash, password.as_bytes()),
            None => Ok(false),
        }
    }

    /// Replace a plaintext admin password with its hash. Fails if there is neither.
    fn secure_admin_password(&mut self) -> Result<(), String> {
        if let Some(password) = self.admin_password.take() {
            if self.admin_password_hash.is_some() {
                warn!("Both `admin_password` and `admin_password_hash` are set, ignoring the former");
            } else {
                warn!("Using plaintext `admin_password`; set `admin_password_hash` instead");
                let hash = hash_password(&password).map_err(|e| e.to_string())?;
                self.admin_password_hash = Some(hash);
            }
        }
        match self.admin_password_hash {
            Some(_) => Ok(()),
            None => Err("`admin_password_hash` is not set".to_string()),
        }
    }
}

/// Argon2-encode a password with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, Argon2Error> {
    // 16 bytes is recommended for password hashing:
    //  https://en.wikipedia.org/wiki/Argon2
    let mut salt = [0_u8; 16];
    rand::thread_rng().fill(&mut salt);
    argon2::hash_encoded(password.as_bytes(), &salt, &argon2::Config::default())
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let mut config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if let Err(e) = config.secure_admin_password() {
            error!("Invalid admin account config: {e}");
            return Err(rocket);
        }

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

fn default_db_name() -> String {
    "voteease".to_string()
}

/// Configuration for the election store.
#[derive(Deserialize)]
struct StoreConfig {
    // secrets
    #[serde(default)]
    db_uri: Option<String>,
    // non-secrets
    #[serde(default = "default_db_name")]
    db_name: String,
    /// Refuse to run without the database.
    #[serde(default)]
    production: bool,
}

/// A fairing that loads the store config, connects to MongoDB, and places an
/// [`ElectionService`] over it into managed state.
///
/// Outside production a missing or unreachable database is not fatal: the
/// service falls back to an in-memory store, which is lost on shutdown.
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Election store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<StoreConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let connection = match &config.db_uri {
            Some(uri) => {
                info!("Loaded database config, connecting...");
                MongoStore::connect(uri, &config.db_name)
                    .await
                    .map_err(|e| e.to_string())
            }
            None => Err("`db_uri` is not set".to_string()),
        };

        let service = match connection {
            Ok(store) => {
                info!("...database connection online!");
                ElectionService::new(store)
            }
            Err(e) if config.production => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
            Err(e) => {
                warn!("Failed to connect to database: {e}");
                warn!("Falling back to an in-memory store; nothing will persist");
                ElectionService::new(MemoryStore::new())
            }
        };

        if let Err(e) = service.resume().await {
            error!("Failed to resume election: {e}");
            return Err(rocket);
        }

        // Manage the state.
        rocket = rocket.manage(service);
        Ok(rocket)
    }
}
