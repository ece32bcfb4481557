use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Harness and agent configuration, persisted as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding the three script resources.
    pub script_dir: PathBuf,
    pub prelude: String,
    pub structs: String,
    pub bot: String,
    pub log_dir: Option<PathBuf>,
    /// Zero-based slot index handed to the agent.
    pub index: i32,
    /// JSON array or JSON-lines file of recorded snapshots.
    pub snapshots: Option<PathBuf>,
    /// Number of generated snapshots when no recording is given.
    pub synthetic_ticks: usize,
    pub seed: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            script_dir: PathBuf::from("scripts"),
            prelude: "classes.lua".into(),
            structs: "structs.lua".into(),
            bot: "bot.lua".into(),
            log_dir: None,
            index: 0,
            snapshots: None,
            synthetic_ticks: 120,
            seed: 0,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn save(&self, path: &Path) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            let _ = std::fs::write(path, json);
        }
    }
}
