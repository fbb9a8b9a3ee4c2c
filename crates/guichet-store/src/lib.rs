//! # guichet-store
//!
//! Durable per-community state for Guichet, backed by SQLite.
//!
//! A community's counter, tickets, panels, categories, blacklist and
//! settings live together in one JSON document. [`GuildStore`] serializes
//! every mutation of a document behind a per-community async lock, so
//! compound updates ("increment the counter and use the value",
//! "check the claimant, then set it") never interleave.

pub mod database;
pub mod guilds;
pub mod migrations;
pub mod models;
pub mod settings;
pub mod store;
pub mod users;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
pub use settings::GuildSettings;
pub use store::GuildStore;
