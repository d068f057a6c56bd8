//! Knob GW - web knobs to local MIDI over WebSocket
//!
//! Three roles share this crate:
//! - knob emitters ([`knob`], [`connection`]) send CC frames to the hub,
//! - the hub ([`server`]) fans frames out and keeps the exposed device
//!   registry,
//! - the bridge ([`bridge`]) turns frames into Control Change messages on a
//!   local MIDI port.

pub mod bridge;
pub mod cli;
pub mod config;
pub mod connection;
pub mod devices;
pub mod knob;
pub mod midi;
pub mod server;
pub mod wire;

pub use config::AppConfig;
pub use wire::CcFrame;
