//! Terminal implementation of the view collaborator.
//!
//! Renders request metadata and outcomes to stdout and holds the draft the
//! user is building (text typed on stdin, images attached from files, the
//! persisted auto-append preference).

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use parking_lot::Mutex;

use backtalk_client::{DraftPayload, FeedbackView, NoticeLevel, OutcomeKind, PendingRequest};
use backtalk_core::{now_rfc3339, ImageAttachment};
use backtalk_settings::{load_prefs_from_path, save_prefs_to_path};

/// Map a file extension to the MIME types the server accepts.
fn mime_for_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}

#[derive(Default)]
struct DraftState {
    text: String,
    images: Vec<ImageAttachment>,
}

/// Stdout-backed view; one instance per process.
pub struct TerminalView {
    prefs_path: PathBuf,
    draft: Mutex<DraftState>,
}

impl TerminalView {
    /// Create a view persisting preferences at `prefs_path`.
    pub fn new(prefs_path: PathBuf) -> Self {
        Self {
            prefs_path,
            draft: Mutex::new(DraftState::default()),
        }
    }

    /// Replace the draft text.
    pub fn set_text(&self, text: &str) {
        self.draft.lock().text = text.to_owned();
    }

    /// Attach an image file to the draft as a base64 data URL.
    #[allow(clippy::cast_possible_truncation)]
    pub fn attach_image(&self, path: &Path) -> Result<String> {
        let Some(mime) = mime_for_extension(path) else {
            bail!("unsupported image type: {}", path.display());
        };
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read image: {}", path.display()))?;
        let name = path
            .file_name()
            .map_or_else(|| "image".to_owned(), |n| n.to_string_lossy().into_owned());

        let attachment = ImageAttachment {
            name: name.clone(),
            size: bytes.len() as u64,
            mime_type: mime.to_owned(),
            data: format!("data:{mime};base64,{}", STANDARD.encode(&bytes)),
            upload_time: now_rfc3339(),
        };
        self.draft.lock().images.push(attachment);
        Ok(name)
    }

    /// Number of images currently attached.
    pub fn image_count(&self) -> usize {
        self.draft.lock().images.len()
    }

    /// Persist the auto-append preference.
    pub fn set_auto_append(&self, enabled: bool) -> Result<()> {
        save_prefs_to_path(&self.prefs_path, enabled)
            .context("failed to save preference record")?;
        Ok(())
    }

    /// Current auto-append preference.
    pub fn auto_append(&self) -> bool {
        load_prefs_from_path(&self.prefs_path).auto_append
    }
}

impl FeedbackView for TerminalView {
    fn show_pending(&self, request: &PendingRequest) {
        println!();
        println!("── feedback requested ──────────────────────────");
        println!("  request:  {}", request.id);
        println!("  timeout:  {}s", request.timeout_secs);
        if !request.issued_at.is_empty() {
            println!("  issued:   {}", request.issued_at);
        }
        println!("  type your feedback and press enter to submit");
        println!("  commands: /attach <path>  /append on|off  /cancel");
    }

    fn show_outcome(&self, kind: OutcomeKind, title: &str, message: &str) {
        let icon = match kind {
            OutcomeKind::Success => "ok",
            OutcomeKind::Error => "!!",
        };
        println!("[{icon}] {title}: {message}");
    }

    fn show_idle(&self) {
        println!("waiting for the next feedback request…");
    }

    fn notify(&self, level: NoticeLevel, text: &str) {
        let label = match level {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "ok",
            NoticeLevel::Warning => "warn",
            NoticeLevel::Error => "error",
        };
        println!("[{label}] {text}");
    }

    fn draft(&self) -> DraftPayload {
        let draft = self.draft.lock();
        DraftPayload {
            text: draft.text.clone(),
            images: draft.images.clone(),
            // The preference record is read at draft-show time, not cached.
            auto_append: self.auto_append(),
        }
    }

    fn clear_draft(&self) {
        let mut draft = self.draft.lock();
        draft.text.clear();
        draft.images.clear();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
