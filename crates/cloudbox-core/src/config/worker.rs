//! Background worker configuration.

use serde::{Deserialize, Serialize};

/// Scheduled maintenance configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the scheduler is started with the server.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Six-field cron expression for the pending-upload reaper.
    #[serde(default = "default_reaper_cron")]
    pub reaper_cron: String,
    /// Age after which a pending upload is considered abandoned.
    #[serde(default = "default_pending_ttl")]
    pub pending_upload_ttl_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            reaper_cron: default_reaper_cron(),
            pending_upload_ttl_seconds: default_pending_ttl(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_reaper_cron() -> String {
    "0 */15 * * * *".to_string()
}

fn default_pending_ttl() -> u64 {
    3600
}
