#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;

pub use config::Config;

use config::{ConfigFairing, StoreFairing};
use logging::LoggerFairing;

/// Assemble the server: routes, catchers, config, and the election store.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/api", api::routes())
        .register("/", api::catchers())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(StoreFairing)
}

/// A server over a fresh in-memory election, for tests.
#[cfg(test)]
pub(crate) fn rocket_for_tests() -> Rocket<Build> {
    use crate::model::api::auth::examples::{ADMIN_PASSWORD, ADMIN_USERNAME};
    use crate::service::ElectionService;
    use crate::store::MemoryStore;

    let figment = rocket::Config::figment()
        .merge(("auth_ttl", 3600))
        .merge(("jwt_secret", "test-secret"))
        .merge(("admin_username", ADMIN_USERNAME))
        .merge(("admin_password", ADMIN_PASSWORD))
        .merge(("log_level", "off"));

    rocket::custom(figment)
        .mount("/api", api::routes())
        .register("/", api::catchers())
        .attach(ConfigFairing)
        .manage(ElectionService::new(MemoryStore::new()))
}
