//! Email Responder - AI-drafted replies to received emails.
//!
//! This library provides the core behind an email-reply form: it checks the
//! form fields, renders a prompt, asks the Claude API for a reply and keeps
//! the observable state a presentation layer renders. It supports:
//!
//! - **Direct generation** against the Anthropic messages API with an ordered
//!   list of model candidates
//! - **Relay generation** through a same-origin server that keeps the API key
//!   off the client
//! - **Failure classification** into a closed set of error kinds
//! - **Clipboard copy** with a platform primitive and a command-line fallback,
//!   plus self-reverting "copied" feedback
//!
//! # Architecture
//!
//! - [`config`] - Configuration management (API key, timeout, models)
//! - [`error`] - Error kinds and canonical messages
//! - [`request`] - Form inputs and tone
//! - [`validation`] - Required-field checks
//! - [`prompt`] - Prompt rendering
//! - [`http_client`] - HTTP client abstraction
//! - [`llm_generator`] - Direct, relay and mock generators
//! - [`controller`] - Generation state machine
//! - [`clipboard`] - Clipboard adapter
//! - [`feedback`] - Auto-reverting copy feedback
//! - [`server`] - The relay's HTTP routes
//!
//! # Example
//!
//! ```ignore
//! use email_responder::config::Config;
//! use email_responder::controller::GenerationController;
//! use email_responder::llm_generator::AnthropicClient;
//! use email_responder::request::{GenerationRequest, Tone};
//! use email_responder::validation::Validator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Config::load()?.validate()?;
//!     let validator = Validator::new(settings.max_email_length);
//!     let mut controller = GenerationController::new(AnthropicClient::new(settings), validator);
//!
//!     let request = GenerationRequest::new("John Doe", "Jane Smith", "Can we meet Tuesday?", Tone::Professional);
//!     if let Err(errors) = controller.submit(request).await {
//!         for (field, message) in errors.iter() {
//!             eprintln!("{}: {}", field.as_str(), message);
//!         }
//!     }
//!
//!     // Not happy with the draft? Regenerate with the same inputs.
//!     controller.generate_response().await;
//!     println!("{}", controller.response());
//!     Ok(())
//! }
//! ```

pub mod clipboard;
pub mod config;
pub mod controller;
pub mod error;
pub mod feedback;
pub mod http_client;
pub mod llm_generator;
pub mod prompt;
pub mod request;
pub mod server;
pub mod validation;
