//! # examhub common library
//!
//! Shared code for the exam administration service:
//! - Error taxonomy shared by the store and the HTTP layer
//! - Bootstrap configuration loading and root folder resolution
//! - SQLite document store and per-entity queries
//! - Entity models (schools, rosters, accounts, exams, attempts)

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
