use serde::{Deserialize, Serialize};
use std::fmt;

fn default_token_ttl_seconds() -> u64 {
    3600
}

fn default_agent_name() -> String {
    "switchboard-agent".to_string()
}

fn default_recordings_dir() -> String {
    "recordings".to_string()
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LiveKitConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing)]
    pub api_secret: String,
    /// Agent name used when dispatching the call worker into a room.
    #[serde(default = "default_agent_name")]
    pub agent_name: String,
    /// Directory (on the egress host) where call recordings are written.
    #[serde(default = "default_recordings_dir")]
    pub recordings_dir: String,
    /// JWT TTL in seconds for platform tokens. Default: 3600 (1 hour).
    #[serde(default = "default_token_ttl_seconds")]
    pub token_ttl_seconds: u64,
}

impl Default for LiveKitConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            api_secret: String::new(),
            agent_name: default_agent_name(),
            recordings_dir: default_recordings_dir(),
            token_ttl_seconds: default_token_ttl_seconds(),
        }
    }
}

impl fmt::Debug for LiveKitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveKitConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("agent_name", &self.agent_name)
            .field("recordings_dir", &self.recordings_dir)
            .field("token_ttl_seconds", &self.token_ttl_seconds)
            .finish()
    }
}

impl LiveKitConfig {
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            ..Default::default()
        }
    }

    /// The HTTP base URL for Twirp calls.
    ///
    /// LiveKit deployments are usually configured with a `ws(s)://` URL; the
    /// Twirp services live on the same host over `http(s)://`.
    pub fn http_url(&self) -> String {
        let url = self.url.trim_end_matches('/');
        if let Some(rest) = url.strip_prefix("wss://") {
            format!("https://{rest}")
        } else if let Some(rest) = url.strip_prefix("ws://") {
            format!("http://{rest}")
        } else {
            url.to_string()
        }
    }
}
