//! Hub configuration

use std::path::{Path, PathBuf};

use recordlog_storage::RecordFileConfig;
use serde::{Deserialize, Serialize};

/// Settings consumed by a [`LogHub`](crate::LogHub)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubSettings {
    /// Root folder for session directories
    pub folder_path: PathBuf,
    /// Mirror the all channel to a text file
    pub is_writing_to_file_enabled: bool,
    /// Mirror each kind channel to its own text file
    pub is_writing_each_channel_enabled: bool,
    /// chrono strftime pattern for text mirror lines
    pub date_time_format: String,
    /// Window size of the all channel
    pub all_max_size: usize,
    /// Window size of every kind channel
    pub channel_max_size: usize,
    /// Indexes probed on each side when locating a record by id
    pub probe_budget: u32,
    /// Sync the record file after every append
    pub sync_on_write: bool,
    /// Write attempts before an append failure is reported
    pub max_append_attempts: u32,
    /// Delete record files from earlier sessions at startup
    pub retention_enabled: bool,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            folder_path: PathBuf::from("./logs"),
            is_writing_to_file_enabled: true,
            is_writing_each_channel_enabled: false,
            date_time_format: "%H:%M:%S%.3f".to_string(),
            all_max_size: 2500,
            channel_max_size: 20000,
            probe_budget: 500,
            sync_on_write: false,
            max_append_attempts: 10,
            retention_enabled: true,
        }
    }
}

impl HubSettings {
    /// Settings for tests: everything under `folder`, all mirrors on,
    /// no retention sweep
    pub fn testing(folder: impl AsRef<Path>) -> Self {
        Self {
            folder_path: folder.as_ref().to_path_buf(),
            is_writing_each_channel_enabled: true,
            retention_enabled: false,
            ..Default::default()
        }
    }

    /// Parse settings from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Config for the all channel's record file
    pub fn record_file_config(&self) -> RecordFileConfig {
        RecordFileConfig {
            sync_on_write: self.sync_on_write,
            max_append_attempts: self.max_append_attempts,
        }
    }
}
