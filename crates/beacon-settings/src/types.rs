//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`: field names
//! are camelCase on disk and missing fields take their default value, so a
//! settings file only needs to mention what it changes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
///
/// Example file:
///
/// ```json
/// {
///   "liveness": { "backendMode": "remote" },
///   "dispatcher": { "autoAccept": { "ws-1": [["git", "status"]] } }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BeaconSettings {
    /// Settings schema version.
    pub version: String,
    /// Event dispatcher settings.
    pub dispatcher: DispatcherSettings,
    /// Connection liveness settings.
    pub liveness: LivenessSettings,
    /// Query cache settings.
    pub cache: CacheSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for BeaconSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            dispatcher: DispatcherSettings::default(),
            liveness: LivenessSettings::default(),
            cache: CacheSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl BeaconSettings {
    /// Reject values that deserialize fine but cannot be used.
    pub fn validate(&self) -> Result<()> {
        if self.cache.max_entries == 0 {
            return Err(SettingsError::InvalidValue(
                "cache.maxEntries must be at least 1".into(),
            ));
        }
        if self.cache.ttl_ms == Some(0) {
            return Err(SettingsError::InvalidValue(
                "cache.ttlMs must be positive; omit it to disable expiry".into(),
            ));
        }
        Ok(())
    }
}

/// Event dispatcher settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DispatcherSettings {
    /// Window over which streaming text deltas are merged, in milliseconds.
    pub delta_flush_interval_ms: u64,
    /// Minimum gap between two user-visible protocol-drift warnings.
    pub unsupported_warning_cooldown_ms: u64,
    /// Methods accepted and ignored in addition to the built-in
    /// compatibility passthrough list.
    pub passthrough_methods: Vec<String>,
    /// Per-workspace command-token prefixes approved without prompting.
    pub auto_accept: BTreeMap<String, Vec<Vec<String>>>,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            delta_flush_interval_ms: 16,
            unsupported_warning_cooldown_ms: 30_000,
            passthrough_methods: Vec::new(),
            auto_accept: BTreeMap::new(),
        }
    }
}

/// Where the app server runs relative to this client.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// Same machine; every update is pushed, there is nothing to subscribe to.
    #[default]
    Local,
    /// Remote daemon; threads must be subscribed explicitly.
    Remote,
}

impl BackendMode {
    /// Parse `"local"` / `"remote"`, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "local" => Some(Self::Local),
            "remote" => Some(Self::Remote),
            _ => None,
        }
    }
}

/// Connection liveness settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LivenessSettings {
    /// Backend mode deciding whether subscriptions are needed at all.
    pub backend_mode: BackendMode,
}

/// Query cache settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheSettings {
    /// Maximum number of entries before least-recently-used eviction.
    pub max_entries: usize,
    /// Entry lifetime in milliseconds; `None` keeps entries until evicted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_ms: Option<u64>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_entries: 200,
            ttl_ms: None,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
