//! Configuration system.
//!
//! Loads server configuration from JSON strings/files (file IO left to the
//! binary). Gameplay tuning constants live next to the systems that use
//! them; this struct carries the operational knobs.

use serde::{Deserialize, Serialize};

/// Root server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// UDP listen address, e.g. `127.0.0.1:41000`.
    pub listen_addr: String,
    /// Fixed simulation tick rate.
    pub tick_hz: u32,
    /// Directory holding level descriptor files.
    #[serde(default = "default_levels_dir")]
    pub levels_dir: String,
    /// Players required before a room's match starts.
    #[serde(default = "default_room_size")]
    pub room_size: u32,
    /// Seconds of client silence before an idle disconnect. `0` disables
    /// the sweep.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    /// Whether rooms wrap around the level list instead of ending the match
    /// after the last level.
    #[serde(default)]
    pub endless: bool,
}

fn default_levels_dir() -> String {
    "levels".to_string()
}

fn default_room_size() -> u32 {
    2
}

fn default_idle_timeout() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:41000".to_string(),
            tick_hz: 60,
            levels_dir: default_levels_dir(),
            room_size: default_room_size(),
            idle_timeout_secs: default_idle_timeout(),
            endless: false,
        }
    }
}

impl ServerConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Duration of one tick.
    pub fn tick_budget(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f32(1.0 / self.tick_hz.max(1) as f32)
    }
}
