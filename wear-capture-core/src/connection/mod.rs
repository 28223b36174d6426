//! Device discovery and the connection lifecycle.

pub mod manager;
pub mod wearable;
