//! Shared types for `rt`: API payloads, live detection, persisted playback
//! state, configuration and platform paths.

pub mod config;
pub mod live;
pub mod platform;
pub mod protocol;
pub mod state;
