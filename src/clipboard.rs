//! Copying text to the system clipboard.
//!
//! The adapter prefers the platform clipboard (`arboard`) and falls back to
//! piping the text into a platform copy tool found on `PATH`. On X11 and
//! Wayland the clipboard contents live in the process that set them, so a
//! process about to exit puts the copy tool first: the tool keeps serving the
//! selection after we are gone.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

pub const COPY_FAILED_MESSAGE: &str = "Failed to copy to clipboard";

#[derive(Debug, Error)]
pub enum ClipboardError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
    #[error("clipboard write failed: {0}")]
    Write(String),
    /// Both the platform clipboard and the fallback failed.
    #[error("Failed to copy to clipboard")]
    CopyFailed,
}

/// One way of putting text on the clipboard.
#[async_trait]
pub trait ClipboardBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn write_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// Platform clipboard via `arboard`.
///
/// The handle is kept alive for the life of the process; on X11 and Wayland
/// the clipboard contents are owned by it and vanish when it is dropped.
pub struct SystemClipboard {
    inner: Mutex<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Result<Self, ClipboardError> {
        let clipboard =
            arboard::Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
        Ok(Self {
            inner: Mutex::new(clipboard),
        })
    }

    pub fn read_text(&self) -> Result<String, ClipboardError> {
        let mut clipboard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        clipboard
            .get_text()
            .map_err(|e| ClipboardError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl ClipboardBackend for SystemClipboard {
    fn name(&self) -> &'static str {
        "system"
    }

    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut clipboard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        clipboard
            .set_text(text.to_string())
            .map_err(|e| ClipboardError::Write(e.to_string()))
    }
}

/// Copy tools tried in order, with the arguments that make them read stdin.
const COPY_TOOLS: &[(&str, &[&str])] = &[
    ("pbcopy", &[]),
    ("wl-copy", &[]),
    ("xclip", &["-selection", "clipboard"]),
    ("xsel", &["--clipboard", "--input"]),
    ("clip", &[]),
];

/// Fallback that pipes text into an external copy tool.
#[derive(Debug, Clone)]
pub struct CommandClipboard {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandClipboard {
    pub fn new(program: impl Into<PathBuf>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Finds the first copy tool available on `PATH`.
    pub fn detect() -> Option<Self> {
        COPY_TOOLS.iter().find_map(|(tool, args)| {
            which::which(tool).ok().map(|path| {
                debug!("Using {} as clipboard fallback", path.display());
                Self::new(path, args)
            })
        })
    }
}

#[async_trait]
impl ClipboardBackend for CommandClipboard {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn write_text(&self, text: &str) -> Result<(), ClipboardError> {
        // kill_on_drop reaps the tool on every early return below.
        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ClipboardError::Unavailable(e.to_string()))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ClipboardError::Write("stdin not captured".to_string()))?;
        stdin
            .write_all(text.as_bytes())
            .await
            .map_err(|e| ClipboardError::Write(e.to_string()))?;
        drop(stdin);

        let status = child
            .wait()
            .await
            .map_err(|e| ClipboardError::Write(e.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(ClipboardError::Write(format!(
                "{} exited with {}",
                self.program.display(),
                status
            )))
        }
    }
}

/// Whether clipboard contents disappear when the process that set them exits.
const CONTENTS_DIE_WITH_OWNER: bool = cfg!(all(
    unix,
    not(any(target_os = "macos", target_os = "ios", target_os = "android"))
));

/// Platform clipboard first, copy tool second.
pub struct ClipboardAdapter {
    primary: Option<Box<dyn ClipboardBackend>>,
    fallback: Option<Box<dyn ClipboardBackend>>,
}

impl ClipboardAdapter {
    pub fn new(
        primary: Option<Box<dyn ClipboardBackend>>,
        fallback: Option<Box<dyn ClipboardBackend>>,
    ) -> Self {
        Self { primary, fallback }
    }

    /// Adapter wired to whatever this machine offers, for a long-lived process.
    pub fn system() -> Self {
        let (platform, tool) = Self::detect_backends();
        Self::new(platform, tool)
    }

    /// Adapter for a process that exits right after copying.
    pub fn for_exiting_process() -> Self {
        let (platform, tool) = Self::detect_backends();
        Self::ordered(platform, tool, CONTENTS_DIE_WITH_OWNER)
    }

    /// Puts the copy tool first when the platform clipboard would lose its
    /// contents with this process.
    fn ordered(
        platform: Option<Box<dyn ClipboardBackend>>,
        tool: Option<Box<dyn ClipboardBackend>>,
        contents_die_with_owner: bool,
    ) -> Self {
        if contents_die_with_owner && tool.is_some() {
            debug!("Preferring the copy tool so the clipboard outlives this process");
            Self::new(tool, platform)
        } else {
            Self::new(platform, tool)
        }
    }

    fn detect_backends() -> (
        Option<Box<dyn ClipboardBackend>>,
        Option<Box<dyn ClipboardBackend>>,
    ) {
        let platform = match SystemClipboard::new() {
            Ok(clipboard) => Some(Box::new(clipboard) as Box<dyn ClipboardBackend>),
            Err(e) => {
                warn!("Platform clipboard unavailable: {}", e);
                None
            }
        };
        let tool = CommandClipboard::detect().map(|c| Box::new(c) as Box<dyn ClipboardBackend>);
        (platform, tool)
    }

    /// Whether the preferred backend exists. Does not attempt a copy.
    pub fn is_supported(&self) -> bool {
        self.primary.is_some()
    }

    pub async fn copy(&self, text: &str) -> Result<(), ClipboardError> {
        if let Some(primary) = &self.primary {
            match primary.write_text(text).await {
                Ok(()) => {
                    info!("Copied {} characters via {}", text.chars().count(), primary.name());
                    return Ok(());
                }
                Err(e) => warn!("Clipboard {} failed, trying fallback method: {}", primary.name(), e),
            }
        }

        if let Some(fallback) = &self.fallback {
            match fallback.write_text(text).await {
                Ok(()) => {
                    info!("Copied {} characters via {}", text.chars().count(), fallback.name());
                    return Ok(());
                }
                Err(e) => warn!("Clipboard fallback {} failed: {}", fallback.name(), e),
            }
        }

        Err(ClipboardError::CopyFailed)
    }
}
