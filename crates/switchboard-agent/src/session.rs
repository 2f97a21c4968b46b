//! Call session orchestration.
//!
//! [`run_call_session`] drives one call from dispatch to teardown: it
//! resolves the assistant, starts the speech agent with rendered
//! instructions and tool schemas, persists every conversation turn,
//! executes tool invocations, and finalizes the call record when the
//! caller hangs up. Database work runs on blocking threads so the event
//! loop never stalls on SQLite.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use switchboard_db::DbPool;
use switchboard_store::{
    self as store, AppendTranscriptParams, Assistant, CallRecord, StartCallParams, StoreError,
};
use switchboard_types::TranscriptEntry;
use switchboard_voice::VoiceService;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::AgentError;
use crate::room::{RoomSession, SessionEvent};
use crate::template;
use crate::tools::{self, SessionTool, DEFAULT_WEBHOOK_TIMEOUT_SECS};

/// Greeting instruction used when an assistant has none configured.
pub const DEFAULT_GREETING: &str = "Greet the user professionally.";

/// Shared handles a session needs beyond the room itself.
#[derive(Clone)]
pub struct SessionDeps {
    pub pool: DbPool,
    pub voice: Arc<VoiceService>,
    pub http: reqwest::Client,
    /// How long to wait for the remote participant before hanging up.
    pub participant_timeout: Duration,
}

/// Runs one call session to completion.
///
/// `metadata` is the raw dispatch metadata, if any. It may carry the
/// assistant ID plus arbitrary per-call template variables; unparseable
/// metadata is ignored rather than failing the call.
///
/// # Errors
///
/// Returns an error only for failures before the call is live (assistant
/// resolution, tool configuration, initial bookkeeping). Once the session
/// is running, persistence and webhook problems are logged and the session
/// keeps going so the caller is never hung up on by a side effect.
pub async fn run_call_session(
    deps: &SessionDeps,
    session: &mut RoomSession,
    metadata: Option<&str>,
) -> Result<(), AgentError> {
    let room_name = session.room_name.clone();
    let metadata = parse_metadata(metadata);
    let assistant_id = resolve_assistant_id(&room_name, &metadata);

    let assistant = load_assistant(&deps.pool, &assistant_id)
        .await
        .map_err(|e| match e {
            AgentError::Store(StoreError::NotFound(_)) => {
                AgentError::AssistantResolution(room_name.clone())
            }
            other => other,
        })?;
    info!(
        room_name,
        assistant_id = %assistant.assistant_id,
        assistant_name = %assistant.name,
        "starting call session"
    );

    let instructions = template::render(&assistant.prompt, &metadata);
    let greeting = greeting_instruction(&assistant, &metadata);

    let session_tools = load_session_tools(&deps.pool, &assistant.assistant_id).await?;
    let tool_schemas: Vec<Value> = session_tools.iter().map(|t| t.schema.clone()).collect();

    let to_number = metadata
        .get("to_number")
        .and_then(Value::as_str)
        .map(str::to_string);
    {
        let pool = deps.pool.clone();
        let params = StartCallParams {
            room_name: room_name.clone(),
            assistant_id: assistant.assistant_id.clone(),
            assistant_name: assistant.name.clone(),
            to_number: to_number.clone(),
            started_at: store::now_rfc3339(),
        };
        run_blocking(move || {
            let conn = pool.get()?;
            Ok(store::start_call_record(&conn, &params)?)
        })
        .await?;
    }

    // Recording is best effort: a call without audio capture still runs.
    match deps.voice.start_room_recording(&room_name).await {
        Ok(egress_id) => {
            let pool = deps.pool.clone();
            let room = room_name.clone();
            let id = egress_id.clone();
            let result = run_blocking(move || {
                let conn = pool.get()?;
                Ok(store::set_recording_id(&conn, &room, &id)?)
            })
            .await;
            if let Err(e) = result {
                error!(room_name, error = %e, "failed to store recording id");
            } else {
                info!(room_name, egress_id, "room recording started");
            }
        }
        Err(e) => warn!(room_name, error = %e, "could not start room recording"),
    }

    session.start(&instructions, tool_schemas);

    match wait_for_participant(session, deps.participant_timeout).await {
        Some(identity) => {
            info!(room_name, identity, "participant joined");
            session.generate_reply(&greeting);
            run_event_loop(deps, session, &assistant, &session_tools, &to_number).await;
        }
        None => warn!(
            room_name,
            timeout_secs = deps.participant_timeout.as_secs(),
            "no participant joined, ending session"
        ),
    }

    finalize_session(deps, &room_name, &assistant).await;
    session.disconnect().await;
    Ok(())
}

fn parse_metadata(raw: Option<&str>) -> Value {
    match raw {
        None => Value::Null,
        Some(raw) => match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "dispatch metadata is not valid JSON, ignoring");
                Value::Null
            }
        },
    }
}

/// Metadata names the assistant explicitly when the dispatcher knows it;
/// otherwise the room name prefix (everything before the first `_`) is the
/// assistant's public ID.
fn resolve_assistant_id(room_name: &str, metadata: &Value) -> String {
    if let Some(id) = metadata.get("assistant_id").and_then(Value::as_str) {
        return id.to_string();
    }
    match room_name.split_once('_') {
        Some((prefix, _)) if !prefix.is_empty() => prefix.to_string(),
        _ => room_name.to_string(),
    }
}

fn greeting_instruction(assistant: &Assistant, metadata: &Value) -> String {
    let rendered = assistant
        .start_instruction
        .as_deref()
        .map(|raw| template::render(raw, metadata))
        .unwrap_or_default();
    if rendered.trim().is_empty() {
        DEFAULT_GREETING.to_string()
    } else {
        rendered
    }
}

async fn load_assistant(pool: &DbPool, assistant_id: &str) -> Result<Assistant, AgentError> {
    let pool = pool.clone();
    let id = assistant_id.to_string();
    run_blocking(move || {
        let conn = pool.get()?;
        Ok(store::get_assistant_any_owner(&conn, &id)?)
    })
    .await
}

async fn load_session_tools(
    pool: &DbPool,
    assistant_id: &str,
) -> Result<Vec<SessionTool>, AgentError> {
    let pool = pool.clone();
    let id = assistant_id.to_string();
    let stored = run_blocking(move || {
        let conn = pool.get()?;
        Ok(store::load_tools_for_assistant(&conn, &id)?)
    })
    .await?;
    tools::build_session_tools(&stored)
}

/// Waits for the first remote participant. Returns `None` on timeout, on
/// disconnect before anyone joined, or if the event channel closed.
async fn wait_for_participant(session: &mut RoomSession, timeout: Duration) -> Option<String> {
    let wait = async {
        while let Some(event) = session.next_event().await {
            match event {
                SessionEvent::ParticipantJoined { identity } => return Some(identity),
                SessionEvent::ParticipantDisconnected { .. } => return None,
                other => debug!(?other, "event before participant joined, ignoring"),
            }
        }
        None
    };
    tokio::time::timeout(timeout, wait).await.unwrap_or(None)
}

async fn run_event_loop(
    deps: &SessionDeps,
    session: &mut RoomSession,
    assistant: &Assistant,
    session_tools: &[SessionTool],
    to_number: &Option<String>,
) {
    // A single writer task drains the transcript queue in arrival order,
    // so `ORDER BY id` reads back as conversational order.
    let (transcript_tx, mut transcript_rx) = mpsc::unbounded_channel::<AppendTranscriptParams>();
    let writer_pool = deps.pool.clone();
    let writer = tokio::spawn(async move {
        while let Some(params) = transcript_rx.recv().await {
            let pool = writer_pool.clone();
            let room_name = params.room_name.clone();
            let appended = tokio::task::spawn_blocking(move || -> Result<(), AgentError> {
                let conn = pool.get()?;
                Ok(store::append_transcript(&conn, &params)?)
            })
            .await;
            match appended {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    error!(room_name, error = %e, "failed to persist transcript line");
                }
                Err(e) => error!(room_name, error = %e, "transcript task panicked"),
            }
        }
    });

    while let Some(event) = session.next_event().await {
        match event {
            SessionEvent::ConversationItem { speaker, text } => {
                if text.trim().is_empty() {
                    continue;
                }
                let params = AppendTranscriptParams {
                    room_name: session.room_name.clone(),
                    assistant_id: assistant.assistant_id.clone(),
                    assistant_name: assistant.name.clone(),
                    to_number: to_number.clone(),
                    speaker,
                    text,
                    timestamp: store::now_rfc3339(),
                };
                let _ = transcript_tx.send(params);
            }
            SessionEvent::ToolInvocation {
                tool_name,
                arguments,
            } => {
                let result = match session_tools.iter().find(|t| t.name == tool_name) {
                    Some(tool) => {
                        info!(room_name = %session.room_name, tool_name, "executing tool");
                        tool.execute(&deps.http, &arguments).await
                    }
                    None => {
                        warn!(room_name = %session.room_name, tool_name, "unknown tool requested");
                        json!({"error": format!("Unknown tool: {tool_name}")})
                    }
                };
                session.send_tool_result(&tool_name, result);
            }
            SessionEvent::ParticipantDisconnected { identity } => {
                info!(room_name = %session.room_name, identity, "participant disconnected");
                break;
            }
            SessionEvent::ParticipantJoined { identity } => {
                debug!(room_name = %session.room_name, identity, "additional participant joined");
            }
        }
    }

    // Every queued transcript line lands before the call is finalized.
    drop(transcript_tx);
    if let Err(e) = writer.await {
        error!(room_name = %session.room_name, error = %e, "transcript writer panicked");
    }
}

/// Stamps the call record and fires the assistant's end-of-call webhook.
/// Failures here are logged, never surfaced: the call already happened.
async fn finalize_session(deps: &SessionDeps, room_name: &str, assistant: &Assistant) {
    let finalized = {
        let pool = deps.pool.clone();
        let room = room_name.to_string();
        run_blocking(move || {
            let conn = pool.get()?;
            let record = store::finalize_call(&conn, &room, &store::now_rfc3339())?;
            let transcript = store::list_transcripts(&conn, &room)?;
            Ok((record, transcript))
        })
        .await
    };

    let (record, transcript) = match finalized {
        Ok(parts) => parts,
        Err(e) => {
            error!(room_name, error = %e, "failed to finalize call record");
            return;
        }
    };
    info!(
        room_name,
        duration_minutes = record.duration_minutes,
        turns = transcript.len(),
        "call finalized"
    );

    let Some(url) = assistant.end_call_url.as_deref().filter(|u| !u.is_empty()) else {
        return;
    };
    let payload = end_call_payload(&record, &transcript);
    let result = deps
        .http
        .post(url)
        .timeout(Duration::from_secs(DEFAULT_WEBHOOK_TIMEOUT_SECS))
        .json(&payload)
        .send()
        .await;
    match result {
        Ok(response) if response.status().is_success() => {
            info!(room_name, url, "end-of-call webhook delivered");
        }
        Ok(response) => warn!(
            room_name,
            url,
            status = response.status().as_u16(),
            "end-of-call webhook rejected"
        ),
        Err(e) => warn!(room_name, url, error = %e, "end-of-call webhook failed"),
    }
}

fn end_call_payload(record: &CallRecord, transcript: &[TranscriptEntry]) -> Value {
    json!({
        "success": true,
        "message": "Call details fetched successfully",
        "data": {
            "room_name": record.room_name,
            "assistant_id": record.assistant_id,
            "assistant_name": record.assistant_name,
            "to_number": record.to_number,
            "recording_id": record.recording_id,
            "started_at": record.started_at,
            "ended_at": record.ended_at,
            "duration_minutes": record.duration_minutes,
            "transcript": transcript,
        },
    })
}

async fn run_blocking<T, F>(f: F) -> Result<T, AgentError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AgentError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AgentError::TaskJoin(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::AgentAction;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::Mutex;
    use switchboard_db::{create_pool, run_migrations, DbRuntimeSettings};
    use switchboard_store::{CreateAssistantParams, CreateToolParams};
    use switchboard_types::{Speaker, ToolExecutionType, TtsProvider};
    use switchboard_voice::LiveKitConfig;

    // An address nothing listens on, so recording attempts fail fast.
    const DEAD_LIVEKIT_URL: &str = "http://127.0.0.1:9";

    fn test_pool() -> (tempfile::TempDir, DbPool) {
        let dir = tempfile::tempdir().expect("create tempdir");
        let path = dir.path().join("switchboard-test.db");
        let pool = create_pool(path.to_str().expect("utf8 path"), DbRuntimeSettings::default())
            .expect("create pool");
        let conn = pool.get().expect("get connection");
        run_migrations(&conn).expect("run migrations");
        (dir, pool)
    }

    fn test_deps(pool: DbPool, timeout: Duration) -> SessionDeps {
        let config = LiveKitConfig::new(DEAD_LIVEKIT_URL, "devkey", "devsecret");
        SessionDeps {
            pool,
            voice: Arc::new(VoiceService::new(config)),
            http: reqwest::Client::new(),
            participant_timeout: timeout,
        }
    }

    fn seed_assistant(pool: &DbPool, end_call_url: Option<String>) -> Assistant {
        let conn = pool.get().expect("get connection");
        store::create_assistant(
            &conn,
            &CreateAssistantParams {
                assistant_id: "a0000000-1111-2222-3333-444444444444".to_string(),
                name: "Support Line".to_string(),
                description: None,
                tts_provider: TtsProvider::Cartesia,
                voice_id: Some("voice-1".to_string()),
                speaker: None,
                prompt: "You help {{name}} with orders.".to_string(),
                start_instruction: Some("Say hi to {{name}}.".to_string()),
                end_call_url,
                created_by_email: "ops@example.com".to_string(),
            },
        )
        .expect("create assistant")
    }

    async fn spawn_capture_server() -> (String, Arc<Mutex<Option<Value>>>) {
        let captured: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let sink = captured.clone();
        let app = Router::new().route(
            "/end-call",
            post(move |Json(body): Json<Value>| {
                let sink = sink.clone();
                async move {
                    *sink.lock().expect("lock capture") = Some(body);
                    Json(json!({"ok": true}))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });
        (format!("http://{addr}/end-call"), captured)
    }

    #[test]
    fn assistant_id_prefers_metadata_over_room_prefix() {
        let metadata = json!({"assistant_id": "from-metadata"});
        assert_eq!(
            resolve_assistant_id("prefix_1a2b3c4d", &metadata),
            "from-metadata"
        );
        assert_eq!(
            resolve_assistant_id("prefix_1a2b3c4d", &Value::Null),
            "prefix"
        );
        assert_eq!(resolve_assistant_id("no-suffix", &Value::Null), "no-suffix");
    }

    #[test]
    fn greeting_falls_back_to_default() {
        let (_dir, pool) = test_pool();
        let mut assistant = seed_assistant(&pool, None);
        let metadata = json!({"name": "Sam"});
        assert_eq!(greeting_instruction(&assistant, &metadata), "Say hi to Sam.");

        assistant.start_instruction = None;
        assert_eq!(greeting_instruction(&assistant, &metadata), DEFAULT_GREETING);

        // A template that renders to whitespace is as good as missing.
        assistant.start_instruction = Some("{{missing}}".to_string());
        assert_eq!(greeting_instruction(&assistant, &metadata), DEFAULT_GREETING);
    }

    #[tokio::test]
    async fn full_session_persists_transcript_and_fires_webhook() {
        let (_dir, pool) = test_pool();
        let (hook_url, captured) = spawn_capture_server().await;
        let assistant = seed_assistant(&pool, Some(hook_url));
        let deps = test_deps(pool.clone(), Duration::from_secs(5));

        // Room name carries a junk prefix so resolution must come from
        // the dispatch metadata.
        let mut session = RoomSession::connect(DEAD_LIVEKIT_URL, "token", "zzz_00000000")
            .await
            .expect("connect");
        let mut actions = session.subscribe_actions();
        let sender = session.event_sender();

        for event in [
            SessionEvent::ParticipantJoined {
                identity: "sip_abc123".to_string(),
            },
            SessionEvent::ConversationItem {
                speaker: Speaker::Assistant,
                text: "Hi Sam, how can I help?".to_string(),
            },
            SessionEvent::ConversationItem {
                speaker: Speaker::User,
                text: "   ".to_string(),
            },
            SessionEvent::ConversationItem {
                speaker: Speaker::User,
                text: "What are your hours?".to_string(),
            },
            SessionEvent::ParticipantDisconnected {
                identity: "sip_abc123".to_string(),
            },
        ] {
            sender.send(event).await.expect("send event");
        }

        let metadata = format!(
            r#"{{"assistant_id": "{}", "name": "Sam", "to_number": "+15550100"}}"#,
            assistant.assistant_id
        );
        run_call_session(&deps, &mut session, Some(&metadata))
            .await
            .expect("session runs");

        match actions.recv().await {
            Ok(AgentAction::Start { instructions, .. }) => {
                assert_eq!(instructions, "You help Sam with orders.");
            }
            other => panic!("expected start action, got {other:?}"),
        }
        match actions.recv().await {
            Ok(AgentAction::Reply { instructions }) => {
                assert_eq!(instructions, "Say hi to Sam.");
            }
            other => panic!("expected greeting reply, got {other:?}"),
        }

        let conn = pool.get().expect("get connection");
        let record = store::get_call_record(&conn, "zzz_00000000")
            .expect("query record")
            .expect("record exists");
        assert_eq!(record.assistant_id, assistant.assistant_id);
        assert_eq!(record.to_number.as_deref(), Some("+15550100"));
        assert!(record.ended_at.is_some());
        assert!(record.duration_minutes.is_some());

        let transcript = store::list_transcripts(&conn, "zzz_00000000").expect("list transcript");
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].speaker, Speaker::Assistant);
        assert_eq!(transcript[1].text, "What are your hours?");

        let payload = captured
            .lock()
            .expect("lock capture")
            .clone()
            .expect("webhook delivered");
        assert_eq!(payload["success"], json!(true));
        assert_eq!(payload["message"], "Call details fetched successfully");
        assert_eq!(payload["data"]["room_name"], "zzz_00000000");
        assert_eq!(payload["data"]["to_number"], "+15550100");
        assert_eq!(
            payload["data"]["transcript"]
                .as_array()
                .expect("transcript array")
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn tool_invocations_produce_results_and_unknown_tools_apologize() {
        let (_dir, pool) = test_pool();
        let assistant = seed_assistant(&pool, None);
        {
            let conn = pool.get().expect("get connection");
            store::create_tool(
                &conn,
                &CreateToolParams {
                    tool_id: "t0000000-1111-2222-3333-444444444444".to_string(),
                    tool_name: "store_hours".to_string(),
                    tool_description: "Opening hours".to_string(),
                    parameters: vec![],
                    execution_type: ToolExecutionType::StaticReturn,
                    execution_config: json!({"value": {"hours": "9am-5pm"}}),
                    created_by_email: "ops@example.com".to_string(),
                },
            )
            .expect("create tool");
            store::attach_tools(
                &conn,
                &assistant.assistant_id,
                "ops@example.com",
                &["t0000000-1111-2222-3333-444444444444".to_string()],
            )
            .expect("attach tool");
        }
        let deps = test_deps(pool, Duration::from_secs(5));

        let room_name = format!("{}_deadbeef", assistant.assistant_id);
        let mut session = RoomSession::connect(DEAD_LIVEKIT_URL, "token", &room_name)
            .await
            .expect("connect");
        let mut actions = session.subscribe_actions();
        let sender = session.event_sender();

        for event in [
            SessionEvent::ParticipantJoined {
                identity: "sip_abc123".to_string(),
            },
            SessionEvent::ToolInvocation {
                tool_name: "store_hours".to_string(),
                arguments: json!({}),
            },
            SessionEvent::ToolInvocation {
                tool_name: "transfer_call".to_string(),
                arguments: json!({}),
            },
            SessionEvent::ParticipantDisconnected {
                identity: "sip_abc123".to_string(),
            },
        ] {
            sender.send(event).await.expect("send event");
        }

        // No metadata: the assistant comes from the room name prefix.
        run_call_session(&deps, &mut session, None)
            .await
            .expect("session runs");

        let mut tool_results = Vec::new();
        while let Ok(action) = actions.try_recv() {
            if let AgentAction::ToolResult { tool_name, result } = action {
                tool_results.push((tool_name, result));
            }
        }
        assert_eq!(
            tool_results,
            vec![
                ("store_hours".to_string(), json!({"hours": "9am-5pm"})),
                (
                    "transfer_call".to_string(),
                    json!({"error": "Unknown tool: transfer_call"})
                ),
            ]
        );
    }

    #[tokio::test]
    async fn participant_timeout_still_finalizes_the_record() {
        let (_dir, pool) = test_pool();
        let assistant = seed_assistant(&pool, None);
        let deps = test_deps(pool.clone(), Duration::from_millis(50));

        let room_name = format!("{}_cafef00d", assistant.assistant_id);
        let mut session = RoomSession::connect(DEAD_LIVEKIT_URL, "token", &room_name)
            .await
            .expect("connect");
        // Keep the sender alive so the wait ends by timeout, not closure.
        let _sender = session.event_sender();

        run_call_session(&deps, &mut session, None)
            .await
            .expect("session runs");

        let conn = pool.get().expect("get connection");
        let record = store::get_call_record(&conn, &room_name)
            .expect("query record")
            .expect("record exists");
        assert!(record.ended_at.is_some());
        assert!(store::list_transcripts(&conn, &room_name)
            .expect("list transcript")
            .is_empty());
    }

    #[tokio::test]
    async fn unknown_assistant_aborts_the_session() {
        let (_dir, pool) = test_pool();
        let deps = test_deps(pool, Duration::from_millis(50));

        let mut session = RoomSession::connect(DEAD_LIVEKIT_URL, "token", "nobody_00000000")
            .await
            .expect("connect");

        let err = run_call_session(&deps, &mut session, None)
            .await
            .expect_err("no assistant to serve");
        assert!(matches!(err, AgentError::AssistantResolution(_)));
    }
}
