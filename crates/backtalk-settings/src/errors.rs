//! Settings error types.

use thiserror::Error;

/// Errors that can occur when loading or writing settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Failed to read or write a settings file on disk.
    #[error("failed to access settings file: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to parse JSON in a settings file.
    #[error("failed to parse settings JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
