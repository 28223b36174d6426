//! On-disk persistence of finished captures.

pub mod metadata;
pub mod recording_store;
