//! Reference resolution and synchronization
//!
//! Roster membership, exam ownership and the staff broadcast are stored on
//! both sides of each relationship. Every operation here updates both sides
//! with sequential single-document writes.

pub mod enrollment;
pub mod exams;
pub mod hierarchy;
pub mod questions;
pub mod resolver;

pub use resolver::{Roster, SemesterLocation};
