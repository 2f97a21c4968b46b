//! Request/response models for the platform's Twirp JSON services.
//!
//! LiveKit exposes its SIP, agent-dispatch, and egress services as Twirp
//! endpoints (`POST /twirp/<service>/<method>` with protobuf-JSON bodies).
//! Only the fields Switchboard sends or reads are modeled; responses use
//! `#[serde(default)]` so new server-side fields never break decoding.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSipOutboundTrunkRequest {
    pub trunk: SipOutboundTrunkInfo,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SipOutboundTrunkInfo {
    pub name: String,
    /// SIP server address of the provider (hostname, no scheme).
    pub address: String,
    /// Numbers calls may originate from.
    pub numbers: Vec<String>,
    pub auth_username: String,
    pub auth_password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SipOutboundTrunkResponse {
    #[serde(default)]
    pub sip_trunk_id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSipParticipantRequest {
    pub sip_trunk_id: String,
    /// Destination number to dial.
    pub sip_call_to: String,
    pub room_name: String,
    pub participant_identity: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub participant_metadata: String,
    pub krisp_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SipParticipantResponse {
    #[serde(default)]
    pub participant_id: String,
    #[serde(default)]
    pub participant_identity: String,
    #[serde(default)]
    pub room_name: String,
    #[serde(default)]
    pub sip_call_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgentDispatchRequest {
    pub agent_name: String,
    pub room: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub metadata: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDispatchResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub agent_name: String,
    #[serde(default)]
    pub room: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCompositeEgressRequest {
    pub room_name: String,
    pub audio_only: bool,
    pub file_outputs: Vec<EncodedFileOutput>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedFileOutput {
    /// Container format; audio-only recordings use "OGG".
    pub file_type: String,
    pub filepath: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EgressInfoResponse {
    #[serde(default)]
    pub egress_id: String,
    #[serde(default)]
    pub status: String,
}
