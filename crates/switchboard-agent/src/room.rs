//! Room session transport.
//!
//! [`RoomSession`] is the boundary between the realtime speech pipeline and
//! the orchestration loop in [`crate::session`]. The loop consumes an ordered
//! stream of [`SessionEvent`]s and publishes [`AgentAction`]s; everything
//! media-related (audio tracks, speech-to-text, turn detection) lives on the
//! other side of these channels. In a production deployment the event sender
//! is fed by a `livekit::Room` bridge and the action stream drives the
//! speech agent; tests script the same channels directly.

use serde_json::Value;
use switchboard_types::Speaker;
use tokio::sync::{broadcast, mpsc};
use tracing::info;

use switchboard_voice::VoiceError;

/// Capacity of the inbound session event queue.
const EVENT_QUEUE_CAPACITY: usize = 256;

/// Capacity of the outbound action broadcast channel.
const ACTION_BROADCAST_CAPACITY: usize = 256;

/// Something that happened in the room, in arrival order.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A remote participant joined the room.
    ParticipantJoined { identity: String },
    /// A finalized conversation turn (user speech transcription or agent
    /// utterance).
    ConversationItem { speaker: Speaker, text: String },
    /// The model asked for a tool call.
    ToolInvocation { tool_name: String, arguments: Value },
    /// A remote participant left the room.
    ParticipantDisconnected { identity: String },
}

/// An instruction published to the speech pipeline.
#[derive(Debug, Clone)]
pub enum AgentAction {
    /// Start the speech agent with rendered instructions and tool schemas.
    Start {
        instructions: String,
        tool_schemas: Vec<Value>,
    },
    /// Prompt the agent to produce a spoken reply.
    Reply { instructions: String },
    /// Deliver a tool invocation result back to the model.
    ToolResult { tool_name: String, result: Value },
}

/// A live connection to one call's room.
#[derive(Debug)]
pub struct RoomSession {
    pub room_url: String,
    pub token: String,
    pub room_name: String,
    connected: bool,
    events_tx: mpsc::Sender<SessionEvent>,
    events_rx: mpsc::Receiver<SessionEvent>,
    actions_tx: broadcast::Sender<AgentAction>,
}

impl RoomSession {
    /// Connects to a room and sets up the event and action channels.
    pub async fn connect(url: &str, token: &str, room_name: &str) -> Result<Self, VoiceError> {
        info!(
            room_name,
            url,
            token_len = token.len(),
            "worker connecting to room"
        );

        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let (actions_tx, _) = broadcast::channel(ACTION_BROADCAST_CAPACITY);

        Ok(Self {
            room_url: url.to_string(),
            token: token.to_string(),
            room_name: room_name.to_string(),
            connected: true,
            events_tx,
            events_rx,
            actions_tx,
        })
    }

    /// A handle for the media bridge (or a test) to push events in.
    pub fn event_sender(&self) -> mpsc::Sender<SessionEvent> {
        self.events_tx.clone()
    }

    /// The next room event, or `None` once all senders are gone.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    /// Starts the speech agent.
    pub fn start(&self, instructions: &str, tool_schemas: Vec<Value>) {
        let _ = self.actions_tx.send(AgentAction::Start {
            instructions: instructions.to_string(),
            tool_schemas,
        });
    }

    /// Asks the agent to speak, e.g. the opening greeting.
    pub fn generate_reply(&self, instructions: &str) {
        let _ = self.actions_tx.send(AgentAction::Reply {
            instructions: instructions.to_string(),
        });
    }

    /// Returns a tool invocation result to the model.
    pub fn send_tool_result(&self, tool_name: &str, result: Value) {
        let _ = self.actions_tx.send(AgentAction::ToolResult {
            tool_name: tool_name.to_string(),
            result,
        });
    }

    /// Subscribes to the actions published by the orchestration loop.
    pub fn subscribe_actions(&self) -> broadcast::Receiver<AgentAction> {
        self.actions_tx.subscribe()
    }

    pub async fn disconnect(&mut self) {
        if self.connected {
            info!(room_name = %self.room_name, "worker disconnecting from room");
            self.connected = false;
        }
    }
}
