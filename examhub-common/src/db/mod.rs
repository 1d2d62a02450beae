//! Entity store: SQLite document tables, models and queries

pub mod accounts;
pub mod answers;
pub mod init;
pub mod models;
pub mod refs;
pub mod reports;
pub mod schools;
pub mod store;
pub mod submissions;

pub use init::*;
pub use models::*;
pub use store::Document;
