//! # backtalk-cli
//!
//! Backtalk terminal client binary — wires settings, the connection
//! manager, and the feedback coordinator around a terminal view.

#![deny(unsafe_code)]

mod terminal;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::AsyncBufReadExt;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use backtalk_client::{
    ClientConfig, ConnectionManager, ConnectionState, FeedbackCoordinator, FeedbackView,
    NoticeLevel,
};
use backtalk_settings::BacktalkSettings;

use terminal::TerminalView;

/// Backtalk terminal client.
#[derive(Parser, Debug)]
#[command(name = "backtalk", about = "Terminal client for a Backtalk feedback server")]
struct Cli {
    /// WebSocket endpoint (overrides settings).
    #[arg(long)]
    url: Option<String>,

    /// Language code stamped into submitted feedback (overrides settings).
    #[arg(long)]
    language: Option<String>,

    /// Path of the preference record (defaults to `~/.backtalk/prefs.json`).
    #[arg(long)]
    prefs_path: Option<PathBuf>,
}

fn client_config(settings: &BacktalkSettings, args: &Cli) -> ClientConfig {
    ClientConfig {
        server_url: args
            .url
            .clone()
            .unwrap_or_else(|| settings.connection.server_url.clone()),
        heartbeat_interval_ms: settings.connection.heartbeat_interval_ms,
        max_reconnect_attempts: settings.connection.max_reconnect_attempts,
        reconnect_base_delay_ms: settings.connection.reconnect_base_delay_ms,
        language: args
            .language
            .clone()
            .unwrap_or_else(|| settings.language.clone()),
        ..ClientConfig::default()
    }
}

fn handle_line(line: &str, coordinator: &FeedbackCoordinator, view: &Arc<TerminalView>) {
    let line = line.trim();
    match line {
        "" => {}
        "/cancel" => coordinator.cancel(),
        "/append on" => match view.set_auto_append(true) {
            Ok(()) => view.notify(NoticeLevel::Success, "auto-append enabled"),
            Err(e) => view.notify(NoticeLevel::Error, &format!("{e:#}")),
        },
        "/append off" => match view.set_auto_append(false) {
            Ok(()) => view.notify(NoticeLevel::Success, "auto-append disabled"),
            Err(e) => view.notify(NoticeLevel::Error, &format!("{e:#}")),
        },
        _ if line.starts_with("/attach ") => {
            let path = PathBuf::from(line.trim_start_matches("/attach ").trim());
            match view.attach_image(&path) {
                Ok(name) => view.notify(
                    NoticeLevel::Success,
                    &format!("attached {name} ({} total)", view.image_count()),
                ),
                Err(e) => view.notify(NoticeLevel::Error, &format!("{e:#}")),
            }
        }
        _ if line.starts_with('/') => {
            view.notify(NoticeLevel::Warning, &format!("unknown command: {line}"));
        }
        text => {
            view.set_text(text);
            coordinator.submit();
        }
    }
}

/// Surface connection transitions to the user, like the status strip of the
/// original web client.
async fn watch_connection(manager: ConnectionManager, view: Arc<TerminalView>) {
    let mut status = manager.subscribe();
    while status.changed().await.is_ok() {
        let state = *status.borrow();
        match state {
            ConnectionState::Connected => view.notify(NoticeLevel::Success, "connection restored"),
            ConnectionState::Reconnecting => {
                view.notify(NoticeLevel::Warning, "connection lost, reconnecting…");
            }
            ConnectionState::Failed => view.notify(
                NoticeLevel::Error,
                "connection failed; type /reconnect to try again",
            ),
            ConnectionState::Disconnected | ConnectionState::Connecting => {
                debug!(%state, "connection state changed");
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = backtalk_settings::load_settings().context("failed to load settings")?;
    let config = client_config(&settings, &args);
    let prefs_path = args
        .prefs_path
        .clone()
        .unwrap_or_else(backtalk_settings::prefs_path);

    // One explicit application context: manager, view, coordinator.
    let manager = ConnectionManager::new(config.clone());
    let view = Arc::new(TerminalView::new(prefs_path));
    let coordinator = FeedbackCoordinator::new(Arc::new(manager.clone()), view.clone(), &config);
    manager.set_handler(Arc::new(coordinator.clone()));

    drop(tokio::spawn(watch_connection(manager.clone(), view.clone())));

    info!(url = %config.server_url, "connecting to feedback server");
    manager.connect().await;
    view.show_idle();

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for ctrl-c")?;
                break;
            }
            line = lines.next_line() => {
                match line.context("failed to read stdin")? {
                    Some(line) if line.trim() == "/reconnect" => manager.connect().await,
                    Some(line) => handle_line(&line, &coordinator, &view),
                    None => break,
                }
            }
        }
    }

    info!("shutting down");
    manager.disconnect();
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
