//! Application services: enqueueing, generation, processing cycles and lookups.

pub mod api_keys;
pub mod documents;
pub mod error;
pub mod jobs;
pub mod mail;
pub mod render;
pub mod repos;
pub mod verification;
