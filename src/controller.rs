//! Observable generation state and the generate/regenerate operations.

use crate::error::{ErrorKind, GenerationError};
use crate::llm_generator::Generator;
use crate::request::GenerationRequest;
use crate::validation::{ValidationErrors, Validator};
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// Snapshot rendered by the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationState {
    pub phase: Phase,
    pub response: String,
    pub error: Option<GenerationError>,
}

impl GenerationState {
    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    /// The message shown to the user, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }
}

/// Sole owner and mutator of a [`GenerationState`].
///
/// `generate_response` borrows the controller mutably, so only one call can
/// be in flight per instance.
pub struct GenerationController<G: Generator> {
    generator: G,
    validator: Validator,
    request: Option<GenerationRequest>,
    state: watch::Sender<GenerationState>,
}

impl<G: Generator> GenerationController<G> {
    pub fn new(generator: G, validator: Validator) -> Self {
        let (state, _) = watch::channel(GenerationState::default());
        Self {
            generator,
            validator,
            request: None,
            state,
        }
    }

    /// Receives every state change, including the transient `Loading` phase.
    pub fn subscribe(&self) -> watch::Receiver<GenerationState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> GenerationState {
        self.state.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    pub fn response(&self) -> String {
        self.state.borrow().response.clone()
    }

    pub fn error(&self) -> Option<GenerationError> {
        self.state.borrow().error.clone()
    }

    pub fn request(&self) -> Option<&GenerationRequest> {
        self.request.as_ref()
    }

    /// Validates `request` and, when valid, generates a reply for it.
    ///
    /// Invalid input never reaches the generator and leaves state untouched.
    pub async fn submit(&mut self, request: GenerationRequest) -> Result<(), ValidationErrors> {
        let errors = self.validator.validate(&request);
        if !errors.is_valid() {
            debug!("Submission blocked by {} field error(s)", errors.len());
            return Err(errors);
        }
        self.request = Some(request);
        self.generate_response().await;
        Ok(())
    }

    /// Generates for the last submitted request. This is also the regenerate
    /// path: inputs are not validated again.
    pub async fn generate_response(&mut self) {
        let Some(request) = self.request.clone() else {
            warn!("generate_response called before any request was submitted");
            self.state.send_modify(|s| {
                s.phase = Phase::Error;
                s.error = Some(GenerationError::new(
                    ErrorKind::Validation,
                    "Please fill in the form before generating a response",
                ));
            });
            return;
        };

        self.state.send_modify(|s| {
            s.phase = Phase::Loading;
            s.error = None;
        });

        match self.generator.generate(&request).await {
            Ok(response) => {
                info!("Generated a {} character reply", response.chars().count());
                self.state.send_modify(|s| {
                    s.phase = Phase::Success;
                    s.response = response;
                    s.error = None;
                });
            }
            Err(err) => {
                warn!("Generation failed ({}): {}", err.kind, err.message);
                self.state.send_modify(|s| {
                    s.phase = Phase::Error;
                    s.error = Some(err);
                });
            }
        }
    }

    /// Drops the current error without touching the response.
    pub fn clear_error(&mut self) {
        self.state.send_if_modified(|s| {
            if s.error.is_none() {
                return false;
            }
            s.error = None;
            if s.phase == Phase::Error {
                s.phase = if s.response.is_empty() { Phase::Idle } else { Phase::Success };
            }
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::Notify;

    /// Generator returning scripted results and counting calls.
    struct ScriptedGenerator {
        results: Mutex<VecDeque<Result<String, GenerationError>>>,
        calls: Arc<AtomicUsize>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedGenerator {
        fn new(results: Vec<Result<String, GenerationError>>) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let generator = Self {
                results: Mutex::new(results.into()),
                calls: calls.clone(),
                gate: None,
            };
            (generator, calls)
        }
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        async fn generate(&self, _request: &GenerationRequest) -> Result<String, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(GenerationError::new(ErrorKind::Unknown, "exhausted")))
        }
    }

    fn request() -> GenerationRequest {
        GenerationRequest::new("John", "Jane", "Hello?", Default::default())
    }

    #[tokio::test]
    async fn test_starts_idle() {
        let (generator, _) = ScriptedGenerator::new(vec![]);
        let controller = GenerationController::new(generator, Validator::default());
        let state = controller.state();
        assert_eq!(state.phase, Phase::Idle);
        assert!(state.response.is_empty());
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_submit_success() {
        let (generator, _) = ScriptedGenerator::new(vec![Ok("Reply".to_string())]);
        let mut controller = GenerationController::new(generator, Validator::default());

        controller.submit(request()).await.unwrap();

        assert_eq!(controller.state().phase, Phase::Success);
        assert_eq!(controller.response(), "Reply");
        assert!(controller.error().is_none());
        assert!(!controller.is_loading());
    }

    #[tokio::test]
    async fn test_invalid_submit_skips_generator() {
        let (generator, calls) = ScriptedGenerator::new(vec![Ok("never".to_string())]);
        let mut controller = GenerationController::new(generator, Validator::default());

        let errors = controller
            .submit(GenerationRequest::new(" ", "Jane", "", Default::default()))
            .await
            .unwrap_err();

        assert_eq!(errors.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(controller.state(), GenerationState::default());
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_response() {
        let (generator, _) = ScriptedGenerator::new(vec![
            Ok("First".to_string()),
            Err(GenerationError::from_status(503, None)),
        ]);
        let mut controller = GenerationController::new(generator, Validator::default());

        controller.submit(request()).await.unwrap();
        controller.generate_response().await;

        let state = controller.state();
        assert_eq!(state.phase, Phase::Error);
        assert_eq!(state.response, "First");
        assert_eq!(state.error.as_ref().unwrap().kind, ErrorKind::Server);
    }

    #[tokio::test]
    async fn test_retry_after_failure_clears_error() {
        let (generator, calls) = ScriptedGenerator::new(vec![
            Err(GenerationError::timeout()),
            Ok("Second try".to_string()),
        ]);
        let mut controller = GenerationController::new(generator, Validator::default());

        controller.submit(request()).await.unwrap();
        assert_eq!(controller.error().unwrap().kind, ErrorKind::Timeout);

        controller.generate_response().await;
        assert!(controller.error().is_none());
        assert_eq!(controller.response(), "Second try");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_regenerate_does_not_revalidate() {
        let (generator, calls) = ScriptedGenerator::new(vec![Ok("a".to_string()), Ok("b".to_string())]);
        let mut controller = GenerationController::new(generator, Validator::default());

        controller.submit(request()).await.unwrap();
        controller.generate_response().await;

        assert_eq!(controller.response(), "b");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(controller.request().unwrap().user_name, "John");
    }

    #[tokio::test]
    async fn test_generate_without_request_is_validation_error() {
        let (generator, calls) = ScriptedGenerator::new(vec![]);
        let mut controller = GenerationController::new(generator, Validator::default());

        controller.generate_response().await;

        assert_eq!(controller.error().unwrap().kind, ErrorKind::Validation);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_loading_is_observable_while_in_flight() {
        let (mut generator, _) = ScriptedGenerator::new(vec![Ok("Done".to_string())]);
        let gate = Arc::new(Notify::new());
        generator.gate = Some(gate.clone());

        let mut controller = GenerationController::new(generator, Validator::default());
        let mut rx = controller.subscribe();

        let task = tokio::spawn(async move {
            controller.submit(request()).await.unwrap();
            controller
        });

        rx.wait_for(|s| s.is_loading()).await.unwrap();
        assert!(rx.borrow().error.is_none());

        gate.notify_one();
        let controller = task.await.unwrap();
        assert_eq!(controller.state().phase, Phase::Success);
        assert_eq!(rx.borrow().response, "Done");
    }

    #[tokio::test]
    async fn test_clear_error() {
        let (generator, _) = ScriptedGenerator::new(vec![
            Ok("Kept".to_string()),
            Err(GenerationError::network()),
        ]);
        let mut controller = GenerationController::new(generator, Validator::default());
        let rx = controller.subscribe();

        // No-op while there is no error.
        controller.clear_error();
        assert!(!rx.has_changed().unwrap());

        controller.submit(request()).await.unwrap();
        controller.generate_response().await;
        assert!(controller.error().is_some());

        controller.clear_error();
        let state = controller.state();
        assert!(state.error.is_none());
        assert_eq!(state.response, "Kept");
        assert_eq!(state.phase, Phase::Success);
    }
}
