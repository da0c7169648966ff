//! Domain layer types and invariants.

pub mod api_keys;
pub mod entities;
pub mod error;
pub mod jobs;
pub mod mission;
pub mod subjects;
pub mod types;
