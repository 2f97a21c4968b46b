use thiserror::Error;

/// Errors surfaced while driving a call session.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("store error: {0}")]
    Store(#[from] switchboard_store::StoreError),

    #[error("database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("voice platform error: {0}")]
    Voice(#[from] switchboard_voice::VoiceError),

    #[error("could not resolve an assistant for room '{0}'")]
    AssistantResolution(String),

    #[error("invalid tool configuration: {0}")]
    ToolConfig(String),

    #[error("blocking task failed: {0}")]
    TaskJoin(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
