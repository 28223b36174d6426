//! Plain data types shared across the crate.

pub mod button;
pub mod codec;
pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod recording;
pub mod state;
