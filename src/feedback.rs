//! "Copied!" feedback that reverts on its own.

use crate::clipboard::ClipboardAdapter;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

pub const COPIED_WINDOW: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipboardFeedbackState {
    pub copied: bool,
    /// Persists until the next copy attempt.
    pub error: Option<String>,
}

#[derive(Default)]
struct Shared {
    state: ClipboardFeedbackState,
    /// Bumped on every attempt; a revert timer only acts on its own epoch.
    epoch: u64,
}

/// Wraps a [`ClipboardAdapter`] for one UI surface.
///
/// At most one revert timer is armed at a time: each attempt cancels the
/// previous timer before doing anything else, and dropping the surface
/// cancels the pending one.
pub struct CopyFeedback {
    clipboard: Arc<ClipboardAdapter>,
    shared: Arc<Mutex<Shared>>,
    revert: Option<JoinHandle<()>>,
    window: Duration,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|e| e.into_inner())
}

impl CopyFeedback {
    pub fn new(clipboard: Arc<ClipboardAdapter>) -> Self {
        Self::with_window(clipboard, COPIED_WINDOW)
    }

    pub fn with_window(clipboard: Arc<ClipboardAdapter>, window: Duration) -> Self {
        Self {
            clipboard,
            shared: Arc::new(Mutex::new(Shared::default())),
            revert: None,
            window,
        }
    }

    pub fn state(&self) -> ClipboardFeedbackState {
        lock(&self.shared).state.clone()
    }

    pub fn is_copied(&self) -> bool {
        lock(&self.shared).state.copied
    }

    pub fn error(&self) -> Option<String> {
        lock(&self.shared).state.error.clone()
    }

    pub async fn copy_to_clipboard(&mut self, text: &str) {
        self.cancel_revert();

        let epoch = {
            let mut shared = lock(&self.shared);
            shared.epoch += 1;
            shared.state = ClipboardFeedbackState::default();
            shared.epoch
        };

        match self.clipboard.copy(text).await {
            Ok(()) => {
                lock(&self.shared).state.copied = true;

                let shared = Arc::clone(&self.shared);
                let window = self.window;
                self.revert = Some(tokio::spawn(async move {
                    tokio::time::sleep(window).await;
                    let mut shared = lock(&shared);
                    if shared.epoch == epoch {
                        shared.state.copied = false;
                    }
                }));
            }
            Err(e) => {
                let mut shared = lock(&self.shared);
                shared.state.copied = false;
                shared.state.error = Some(e.to_string());
            }
        }
    }

    fn cancel_revert(&mut self) {
        if let Some(handle) = self.revert.take() {
            debug!("Cancelling pending copy feedback timer");
            handle.abort();
        }
    }
}

impl Drop for CopyFeedback {
    fn drop(&mut self) {
        self.cancel_revert();
    }
}
