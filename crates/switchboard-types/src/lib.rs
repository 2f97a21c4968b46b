//! Shared types and constants for the Switchboard platform.
//!
//! This crate provides the vocabulary used across all Switchboard crates:
//! TTS provider codes, tool definitions, transcript speaker roles, and the
//! validation helpers that gate them at the API boundary.
//!
//! No crate in the workspace depends on anything *except* `switchboard-types`
//! for cross-cutting type definitions. This keeps the dependency graph clean
//! and prevents circular dependencies.

use serde::{Deserialize, Serialize};

/// Text-to-speech providers an assistant can be configured with.
///
/// The provider determines which voice-selection field is required on the
/// assistant: `cartesia` selects by `voice_id`, `sarvam` selects by
/// `speaker`. Exactly one of the two may be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtsProvider {
    /// Cartesia hosted TTS, voice chosen by `voice_id`.
    Cartesia,
    /// Sarvam hosted TTS, voice chosen by `speaker` name.
    Sarvam,
}

impl TtsProvider {
    /// Returns the wire label for this provider.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cartesia => "cartesia",
            Self::Sarvam => "sarvam",
        }
    }

    /// Attempts to parse a wire label into a provider.
    ///
    /// Returns `None` for unknown labels.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cartesia" => Some(Self::Cartesia),
            "sarvam" => Some(Self::Sarvam),
            _ => None,
        }
    }
}

/// Who produced a transcript line within a call session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    /// The speech agent.
    Assistant,
    /// The human on the call.
    User,
}

impl Speaker {
    /// Returns the stored label for this speaker.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assistant => "assistant",
            Self::User => "user",
        }
    }

    /// Attempts to parse a stored label into a speaker.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "assistant" => Some(Self::Assistant),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

/// A single line of conversation captured during a call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Who said it.
    pub speaker: Speaker,
    /// What was said.
    pub text: String,
    /// RFC 3339 timestamp of when the turn completed.
    pub timestamp: String,
}

mod tool;
pub use tool::{is_valid_tool_name, ParamType, ToolExecutionType, ToolParameter};
