//! LiveKit platform client for Switchboard.
//!
//! Wraps everything the API server and the call worker need from the
//! real-time platform: room lifecycle and join tokens via the typed
//! `livekit-api` clients, plus agent dispatch, SIP outbound trunks, SIP
//! participants, and room recordings via the platform's Twirp JSON
//! endpoints.
//!
//! Media, SIP signaling, and speech models all run on the platform side;
//! this crate only issues control-plane calls.

pub mod config;
pub mod error;
pub mod service;
pub mod twirp;

pub use config::LiveKitConfig;
pub use error::VoiceError;
pub use service::{generate_room_name, OutboundTrunkSpec, VoiceService};
