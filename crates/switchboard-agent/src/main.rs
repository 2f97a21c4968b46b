//! Switchboard call worker binary.
//!
//! Usage: `switchboard-agent <room-name> [dispatch-metadata-json]`
//!
//! Joins the given room and drives the call session to completion. The
//! agent dispatcher passes the room name and metadata when it launches a
//! worker; operators can do the same by hand to re-attach to a room.
//! Configuration comes from the shared `config.toml` (overridable via
//! `SWITCHBOARD_CONFIG_PATH`) and environment variables.

use std::sync::Arc;
use std::time::Duration;
use switchboard_agent::{load_config, run_call_session, RoomSession, SessionDeps};
use switchboard_voice::VoiceService;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Ok(path) = std::env::var("SWITCHBOARD_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let mut args = std::env::args().skip(1);
    let Some(room_name) = args.next().filter(|value| !value.trim().is_empty()) else {
        eprintln!("usage: switchboard-agent <room-name> [dispatch-metadata-json]");
        std::process::exit(2);
    };
    let metadata = args.next();

    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = load_config(selected_config_path)
        .expect("failed to load configuration — the worker cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        room_name,
        "resolved startup configuration path"
    );

    // Initialize database
    let pool = switchboard_db::create_pool(
        &config.database.path,
        switchboard_db::DbRuntimeSettings {
            busy_timeout_ms: config.database.busy_timeout_ms,
            pool_max_size: config.database.pool_max_size,
        },
    )
    .expect("failed to create database pool — check database.path in config");

    {
        let conn = pool
            .get()
            .expect("failed to get database connection for migrations");
        let applied =
            switchboard_db::run_migrations(&conn).expect("failed to run database migrations");
        if applied > 0 {
            tracing::info!(count = applied, "applied database migrations");
        }
    }

    let voice = VoiceService::new(config.livekit.clone());
    let token = voice
        .generate_join_token(&room_name, &format!("agent-{room_name}"), "Switchboard Agent")
        .expect("failed to mint room join token — check livekit credentials in config");

    let mut session = RoomSession::connect(voice.get_url(), &token, &room_name)
        .await
        .expect("failed to connect to room");

    let deps = SessionDeps {
        pool,
        voice: Arc::new(voice),
        http: reqwest::Client::new(),
        participant_timeout: Duration::from_secs(config.worker.participant_timeout_secs),
    };

    if let Err(e) = run_call_session(&deps, &mut session, metadata.as_deref()).await {
        tracing::error!(room_name, error = %e, "call session failed");
        std::process::exit(1);
    }

    tracing::info!(room_name, "call session complete");
}
