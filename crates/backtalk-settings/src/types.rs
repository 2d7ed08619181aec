//! Settings type definitions.

use serde::{Deserialize, Serialize};

fn default_server_url() -> String {
    "ws://127.0.0.1:9999/ws".to_owned()
}
fn default_language() -> String {
    "CN".to_owned()
}
fn default_heartbeat_interval_ms() -> u64 {
    30_000
}
fn default_max_reconnect_attempts() -> u32 {
    5
}
fn default_reconnect_base_delay_ms() -> u64 {
    1000
}

/// Top-level Backtalk settings.
///
/// Loaded from compiled defaults, deep-merged with the user file, then
/// overridden by `BACKTALK_*` environment variables (see
/// [`crate::loader`]).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BacktalkSettings {
    /// Connection parameters.
    #[serde(default)]
    pub connection: ConnectionSettings,
    /// Language code stamped into submitted feedback.
    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for BacktalkSettings {
    fn default() -> Self {
        Self {
            connection: ConnectionSettings::default(),
            language: default_language(),
        }
    }
}

/// Connection parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// WebSocket endpoint of the feedback server.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Heartbeat interval in milliseconds.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Reconnect attempts before giving up.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Base delay for exponential reconnect backoff, in milliseconds.
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
        }
    }
}

/// The persisted user preference record.
///
/// The wire shape (`autoAppend` / `timestamp`) is a compatibility contract
/// with the original web client's stored record — do not rename.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPrefs {
    /// Whether the server should append its canned follow-up prompt.
    pub auto_append: bool,
    /// When the preference was last written (RFC 3339).
    #[serde(default)]
    pub timestamp: String,
}

impl Default for UserPrefs {
    fn default() -> Self {
        Self {
            auto_append: true,
            timestamp: String::new(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_server_url_points_at_original_port() {
        let settings = BacktalkSettings::default();
        assert_eq!(settings.connection.server_url, "ws://127.0.0.1:9999/ws");
    }

    #[test]
    fn default_language() {
        let settings = BacktalkSettings::default();
        assert_eq!(settings.language, "CN");
    }

    #[test]
    fn default_heartbeat_interval() {
        let settings = ConnectionSettings::default();
        assert_eq!(settings.heartbeat_interval_ms, 30_000);
    }

    #[test]
    fn default_reconnect_policy() {
        let settings = ConnectionSettings::default();
        assert_eq!(settings.max_reconnect_attempts, 5);
        assert_eq!(settings.reconnect_base_delay_ms, 1000);
    }

    #[test]
    fn empty_json_yields_defaults() {
        let settings: BacktalkSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, BacktalkSettings::default());
    }

    #[test]
    fn partial_json_fills_missing_fields() {
        let raw = r#"{"connection":{"server_url":"ws://example:1/ws"}}"#;
        let settings: BacktalkSettings = serde_json::from_str(raw).unwrap();
        assert_eq!(settings.connection.server_url, "ws://example:1/ws");
        assert_eq!(settings.connection.heartbeat_interval_ms, 30_000);
        assert_eq!(settings.language, "CN");
    }

    #[test]
    fn serde_roundtrip() {
        let settings = BacktalkSettings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let back: BacktalkSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn prefs_default_auto_append_on() {
        let prefs = UserPrefs::default();
        assert!(prefs.auto_append);
        assert!(prefs.timestamp.is_empty());
    }

    #[test]
    fn prefs_wire_shape_is_camel_case() {
        let prefs = UserPrefs {
            auto_append: false,
            timestamp: "2025-01-01T00:00:00Z".into(),
        };
        let value = serde_json::to_value(&prefs).unwrap();
        assert_eq!(value["autoAppend"], false);
        assert_eq!(value["timestamp"], "2025-01-01T00:00:00Z");
        assert!(value.get("auto_append").is_none());
    }

    #[test]
    fn prefs_parse_legacy_record() {
        let raw = r#"{"autoAppend":false,"timestamp":"2024-06-01T10:00:00.000Z"}"#;
        let prefs: UserPrefs = serde_json::from_str(raw).unwrap();
        assert!(!prefs.auto_append);
    }
}
