use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::{Result, UpdaterError};

pub const CONFIG_FILE: &str = "updater.config.json";

const MANIFEST_TIMEOUT_SECS: u64 = 10;
const FILE_TIMEOUT_SECS: u64 = 120;
const BASELINE_SPEED_BPS: u64 = 128 * 1024;
const GRACE_SECS: u64 = 45;
const STALL_TIMEOUT_SECS: u64 = 20;
const HARD_CAP_SECS: u64 = 3600;
const SMALL_HASH_MAX_BYTES: u64 = 10 * 1024 * 1024;
const POLL_INTERVAL_MS: u64 = 100;
const STORAGE_SAFETY_FLOOR_BYTES: u64 = 20 * 1024 * 1024;

fn default_user_agent() -> String {
    format!("otoshi-updater/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct UpdaterConfig {
    pub manifest_url: Option<String>,
    pub user_agent: String,
    pub manifest_timeout_secs: u64,
    pub file_timeout_secs: u64,
    pub baseline_speed_bps: u64,
    pub grace_secs: u64,
    pub stall_timeout_secs: f64,
    pub hard_cap_secs: u64,
    pub small_hash_max_bytes: u64,
    pub poll_interval_ms: u64,
    pub storage_safety_floor_bytes: u64,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            manifest_url: None,
            user_agent: default_user_agent(),
            manifest_timeout_secs: MANIFEST_TIMEOUT_SECS,
            file_timeout_secs: FILE_TIMEOUT_SECS,
            baseline_speed_bps: BASELINE_SPEED_BPS,
            grace_secs: GRACE_SECS,
            stall_timeout_secs: STALL_TIMEOUT_SECS as f64,
            hard_cap_secs: HARD_CAP_SECS,
            small_hash_max_bytes: SMALL_HASH_MAX_BYTES,
            poll_interval_ms: POLL_INTERVAL_MS,
            storage_safety_floor_bytes: STORAGE_SAFETY_FLOOR_BYTES,
        }
    }
}

impl UpdaterConfig {
    /// Defaults, then `updater.config.json` under `root` (if present), then env overrides.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        let mut config = if path.is_file() {
            let data = std::fs::read_to_string(&path)?;
            let parsed: UpdaterConfig = serde_json::from_str(data.trim_start_matches('\u{feff}'))
                .map_err(|err| {
                    UpdaterError::Config(format!("{}: {}", path.display(), err))
                })?;
            tracing::debug!("[config] loaded {}", path.display());
            parsed
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        if let Some(value) = env_string("OTOSHI_UPDATER_MANIFEST_URL") {
            self.manifest_url = Some(value);
        }
        if let Some(value) = env_string("OTOSHI_UPDATER_USER_AGENT") {
            self.user_agent = value;
        }
        if let Some(value) = env_u64("OTOSHI_UPDATER_MANIFEST_TIMEOUT") {
            self.manifest_timeout_secs = value.clamp(1, 300);
        }
        if let Some(value) = env_u64("OTOSHI_UPDATER_FILE_TIMEOUT") {
            self.file_timeout_secs = value.max(1);
        }
        if let Some(value) = env_u64("OTOSHI_UPDATER_BASELINE_BPS") {
            self.baseline_speed_bps = value.max(1);
        }
        if let Some(value) = env_u64("OTOSHI_UPDATER_GRACE") {
            self.grace_secs = value;
        }
        if let Some(value) = env_f64("OTOSHI_UPDATER_STALL_TIMEOUT") {
            self.stall_timeout_secs = value;
        }
        if let Some(value) = env_u64("OTOSHI_UPDATER_HARD_CAP") {
            self.hard_cap_secs = value.max(1);
        }
        if let Some(value) = env_u64("OTOSHI_UPDATER_SMALL_HASH_MAX") {
            self.small_hash_max_bytes = value;
        }
        if let Some(value) = env_u64("OTOSHI_UPDATER_POLL_MS") {
            self.poll_interval_ms = value.clamp(1, 5_000);
        }
        if let Some(value) = env_u64("OTOSHI_UPDATER_SAFETY_FLOOR") {
            self.storage_safety_floor_bytes = value;
        }
    }

    pub fn manifest_url(&self) -> Result<&str> {
        self.manifest_url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| UpdaterError::Config("manifest url is not configured".to_string()))
    }

    pub fn manifest_timeout(&self) -> Duration {
        Duration::from_secs(self.manifest_timeout_secs)
    }

    /// Falls back to the default limit when the configured value is negative,
    /// non-finite or too large for a `Duration`.
    pub fn stall_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.stall_timeout_secs)
            .unwrap_or_else(|_| Duration::from_secs(STALL_TIMEOUT_SECS))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Per-file transfer budget: `size / baseline + grace`, clamped to `[floor, hard cap]`.
    /// Unknown sizes get the flat floor.
    pub fn file_timeout_budget(&self, expected_size: u64) -> Duration {
        if expected_size == 0 {
            return Duration::from_secs(self.file_timeout_secs);
        }
        let floor = self.file_timeout_secs as f64;
        let cap = (self.hard_cap_secs as f64).max(floor);
        let budget =
            expected_size as f64 / self.baseline_speed_bps.max(1) as f64 + self.grace_secs as f64;
        Duration::try_from_secs_f64(budget.clamp(floor, cap).ceil())
            .unwrap_or_else(|_| Duration::from_secs(self.hard_cap_secs.max(self.file_timeout_secs)))
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
}

fn env_f64(key: &str) -> Option<f64> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite() && *value >= 0.0)
}
