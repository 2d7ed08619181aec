//! # backtalk-settings
//!
//! Configuration management with layered sources for the Backtalk client.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`BacktalkSettings::default()`]
//! 2. **User file** — `~/.backtalk/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `BACKTALK_*` overrides (highest priority)
//!
//! Separately, the crate owns the persisted user preference record
//! (`~/.backtalk/prefs.json`, shape `{"autoAppend": bool, "timestamp": …}`),
//! which the view layer reads at draft-show time and writes on preference
//! change.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    deep_merge, load_prefs, load_prefs_from_path, load_settings, load_settings_from_path,
    prefs_path, save_prefs_to_path, settings_path,
};
pub use types::{BacktalkSettings, ConnectionSettings, UserPrefs};

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
