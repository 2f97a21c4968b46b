use std::time::Duration;

use livekit_api::access_token::{AccessToken, SIPGrants, VideoGrants};
use livekit_api::services::room::{CreateRoomOptions, RoomClient};
use livekit_protocol::Room;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::LiveKitConfig;
use crate::error::VoiceError;
use crate::twirp::{
    AgentDispatchResponse, CreateAgentDispatchRequest, CreateSipOutboundTrunkRequest,
    CreateSipParticipantRequest, EgressInfoResponse, EncodedFileOutput,
    RoomCompositeEgressRequest, SipOutboundTrunkInfo, SipOutboundTrunkResponse,
    SipParticipantResponse,
};

const SIP_CREATE_TRUNK: &str = "livekit.SIP/CreateSIPOutboundTrunk";
const SIP_CREATE_PARTICIPANT: &str = "livekit.SIP/CreateSIPParticipant";
const DISPATCH_CREATE: &str = "livekit.AgentDispatchService/CreateDispatch";
const EGRESS_START_ROOM_COMPOSITE: &str = "livekit.Egress/StartRoomCompositeEgress";

/// Provider-side settings for a new outbound SIP trunk.
#[derive(Debug, Clone)]
pub struct OutboundTrunkSpec {
    pub name: String,
    pub address: String,
    pub numbers: Vec<String>,
    pub auth_username: String,
    pub auth_password: String,
}

/// Builds a unique room name for a call: the assistant's public ID followed
/// by an 8-character random hex suffix.
pub fn generate_room_name(assistant_id: &str) -> String {
    format!("{assistant_id}_{:08x}", rand::random::<u32>())
}

#[derive(Debug)]
pub struct VoiceService {
    config: LiveKitConfig,
    room_client: RoomClient,
    http: reqwest::Client,
}

impl VoiceService {
    pub fn new(config: LiveKitConfig) -> Self {
        let room_client =
            RoomClient::with_api_key(&config.url, &config.api_key, &config.api_secret);
        Self {
            config,
            room_client,
            http: reqwest::Client::new(),
        }
    }

    pub fn get_url(&self) -> &str {
        &self.config.url
    }

    /// Creates a room for a call session and returns it.
    pub async fn create_call_room(&self, assistant_id: &str) -> Result<Room, VoiceError> {
        let name = generate_room_name(assistant_id);
        self.create_room(&name).await
    }

    pub async fn create_room(&self, name: &str) -> Result<Room, VoiceError> {
        let options = CreateRoomOptions::default();

        let room = self
            .room_client
            .create_room(name, options)
            .await
            .map_err(|e| VoiceError::RoomService(e.to_string()))?;
        tracing::info!(room = room.name, "created room");
        Ok(room)
    }

    /// Deletes a room, disconnecting any participants still in it.
    pub async fn delete_room(&self, name: &str) -> Result<(), VoiceError> {
        self.room_client
            .delete_room(name)
            .await
            .map_err(|e| VoiceError::RoomService(e.to_string()))?;
        tracing::info!(room = name, "deleted room");
        Ok(())
    }

    /// Mints a join token for a participant in the given room.
    pub fn generate_join_token(
        &self,
        room_name: &str,
        participant_identity: &str,
        participant_name: &str,
    ) -> Result<String, VoiceError> {
        let token = AccessToken::with_api_key(&self.config.api_key, &self.config.api_secret)
            .with_identity(participant_identity)
            .with_name(participant_name)
            .with_grants(VideoGrants {
                room_join: true,
                room: room_name.to_string(),
                can_publish: true,
                can_subscribe: true,
                can_publish_data: true,
                ..Default::default()
            })
            .with_ttl(Duration::from_secs(self.config.token_ttl_seconds));

        token.to_jwt().map_err(VoiceError::LiveKit)
    }

    /// Dispatches the configured agent into a room. Returns the dispatch ID.
    pub async fn create_agent_dispatch(
        &self,
        room_name: &str,
        metadata: String,
    ) -> Result<String, VoiceError> {
        let request = CreateAgentDispatchRequest {
            agent_name: self.config.agent_name.clone(),
            room: room_name.to_string(),
            metadata,
        };
        let response: AgentDispatchResponse = self.twirp_post(DISPATCH_CREATE, &request).await?;
        tracing::info!(
            room = room_name,
            dispatch_id = response.id,
            agent = self.config.agent_name,
            "dispatched agent"
        );
        Ok(response.id)
    }

    /// Creates an outbound SIP trunk on the platform. Returns the
    /// platform-assigned trunk ID.
    pub async fn create_sip_outbound_trunk(
        &self,
        spec: &OutboundTrunkSpec,
    ) -> Result<String, VoiceError> {
        let request = CreateSipOutboundTrunkRequest {
            trunk: SipOutboundTrunkInfo {
                name: spec.name.clone(),
                address: spec.address.clone(),
                numbers: spec.numbers.clone(),
                auth_username: spec.auth_username.clone(),
                auth_password: spec.auth_password.clone(),
            },
        };
        let response: SipOutboundTrunkResponse =
            self.twirp_post(SIP_CREATE_TRUNK, &request).await?;
        tracing::info!(
            trunk_id = response.sip_trunk_id,
            name = spec.name,
            "created outbound trunk"
        );
        Ok(response.sip_trunk_id)
    }

    /// Bridges a phone number into a room through a trunk.
    ///
    /// The SIP participant gets a random `sip_`-prefixed identity so repeat
    /// dials into the same room never collide.
    pub async fn create_sip_participant(
        &self,
        trunk_id: &str,
        to_number: &str,
        room_name: &str,
        metadata: String,
    ) -> Result<SipParticipantResponse, VoiceError> {
        let request = CreateSipParticipantRequest {
            sip_trunk_id: trunk_id.to_string(),
            sip_call_to: to_number.to_string(),
            room_name: room_name.to_string(),
            participant_identity: format!("sip_{:08x}", rand::random::<u32>()),
            participant_metadata: metadata,
            krisp_enabled: true,
        };
        let response: SipParticipantResponse =
            self.twirp_post(SIP_CREATE_PARTICIPANT, &request).await?;
        tracing::info!(
            room = room_name,
            participant = response.participant_identity,
            sip_call_id = response.sip_call_id,
            "created SIP participant"
        );
        Ok(response)
    }

    /// Starts an audio-only OGG recording of a room. Returns the egress ID.
    pub async fn start_room_recording(&self, room_name: &str) -> Result<String, VoiceError> {
        let filepath = format!(
            "{}/{room_name}.ogg",
            self.config.recordings_dir.trim_end_matches('/')
        );
        let request = RoomCompositeEgressRequest {
            room_name: room_name.to_string(),
            audio_only: true,
            file_outputs: vec![EncodedFileOutput {
                file_type: "OGG".to_string(),
                filepath,
            }],
        };
        let response: EgressInfoResponse = self
            .twirp_post(EGRESS_START_ROOM_COMPOSITE, &request)
            .await?;
        tracing::info!(
            room = room_name,
            egress_id = response.egress_id,
            "started room recording"
        );
        Ok(response.egress_id)
    }

    /// Token for server-to-server Twirp calls: room admin plus SIP grants.
    fn server_api_token(&self) -> Result<String, VoiceError> {
        AccessToken::with_api_key(&self.config.api_key, &self.config.api_secret)
            .with_identity("switchboard-server")
            .with_grants(VideoGrants {
                room_create: true,
                room_admin: true,
                room_record: true,
                ..Default::default()
            })
            .with_sip_grants(SIPGrants {
                admin: true,
                call: true,
            })
            .with_ttl(Duration::from_secs(60))
            .to_jwt()
            .map_err(VoiceError::LiveKit)
    }

    async fn twirp_post<Req, Resp>(&self, method: &str, request: &Req) -> Result<Resp, VoiceError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/twirp/{method}", self.config.http_url());
        let token = self.server_api_token()?;

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(|e| VoiceError::Platform(format!("{method} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::Platform(format!(
                "{method} returned {status}: {body}"
            )));
        }

        response
            .json::<Resp>()
            .await
            .map_err(|e| VoiceError::Platform(format!("{method} response decode failed: {e}")))
    }
}
