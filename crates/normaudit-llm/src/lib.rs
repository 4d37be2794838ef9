//! Normaudit LLM Provider Layer
//!
//! Pluggable implementations of the extraction oracle.
//!
//! # Architecture
//!
//! This crate provides implementations of the `LlmProvider` trait from
//! `normaudit-domain`. Every provider takes a system prompt (the output
//! contract) and a user prompt (the chunk or fragment batch) and returns the raw
//! completion text. Parsing and validation happen in the callers, which treat
//! the output as untrusted.
//!
//! # Providers
//!
//! - `MockProvider`: Deterministic, scriptable stub for tests
//! - `OllamaProvider`: Local Ollama chat API
//!
//! # Examples
//!
//! ```
//! use normaudit_llm::MockProvider;
//! use normaudit_domain::traits::LlmProvider;
//!
//! let provider = MockProvider::new("{\"fragments\": []}");
//! let result = provider.generate("system", "chunk text").unwrap();
//! assert_eq!(result, "{\"fragments\": []}");
//! ```

#![warn(missing_docs)]

pub mod ollama;

use normaudit_domain::traits::LlmProvider as LlmProviderTrait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

pub use ollama::OllamaProvider;

/// Errors that can occur during LLM operations
#[derive(Error, Debug)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Invalid response from LLM
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Provider misconfigured (missing key, bad endpoint)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

/// A scripted reply of the mock provider
#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Error(String),
}

#[derive(Debug, Default)]
struct MockState {
    queue: VecDeque<Reply>,
    keyed: Vec<(String, Reply)>,
    exact: HashMap<String, Reply>,
    prompts: Vec<String>,
}

/// Mock LLM provider for deterministic testing
///
/// Replies are resolved in this order:
/// 1. an exact match on the user prompt (`add_response`)
/// 2. the first registered substring found in the user prompt (`respond_when_contains`)
/// 3. the next queued reply (`push_response`, `push_error`)
/// 4. the default reply
///
/// Every user prompt received is recorded and can be inspected with `prompts()`.
///
/// # Examples
///
/// ```
/// use normaudit_llm::MockProvider;
/// use normaudit_domain::traits::LlmProvider;
///
/// let provider = MockProvider::new("[]");
/// provider.push_response("first");
/// provider.push_error("second fails");
/// assert_eq!(provider.generate("sys", "a").unwrap(), "first");
/// assert!(provider.generate("sys", "b").is_err());
/// assert_eq!(provider.generate("sys", "c").unwrap(), "[]");
/// assert_eq!(provider.call_count(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct MockProvider {
    default_response: String,
    state: Arc<Mutex<MockState>>,
    call_count: Arc<Mutex<usize>>,
}

impl MockProvider {
    /// Create a new MockProvider with a fixed response for all prompts
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            state: Arc::new(Mutex::new(MockState::default())),
            call_count: Arc::new(Mutex::new(0)),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A poisoned mock only happens after a test already panicked
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a specific response for an exact user prompt
    pub fn add_response(&self, prompt: impl Into<String>, response: impl Into<String>) {
        self.state()
            .exact
            .insert(prompt.into(), Reply::Text(response.into()));
    }

    /// Respond with `response` whenever the user prompt contains `needle`
    pub fn respond_when_contains(&self, needle: impl Into<String>, response: impl Into<String>) {
        self.state()
            .keyed
            .push((needle.into(), Reply::Text(response.into())));
    }

    /// Fail whenever the user prompt contains `needle`
    pub fn fail_when_contains(&self, needle: impl Into<String>) {
        self.state()
            .keyed
            .push((needle.into(), Reply::Error("Mock error".to_string())));
    }

    /// Queue a response for the next unmatched call
    pub fn push_response(&self, response: impl Into<String>) {
        self.state().queue.push_back(Reply::Text(response.into()));
    }

    /// Queue an error for the next unmatched call
    pub fn push_error(&self, message: impl Into<String>) {
        self.state().queue.push_back(Reply::Error(message.into()));
    }

    /// Get the number of times generate was called
    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Reset the call count
    pub fn reset_call_count(&self) {
        *self.call_count.lock().unwrap_or_else(|e| e.into_inner()) = 0;
    }

    /// User prompts received so far, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.state().prompts.clone()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("Default mock response")
    }
}

impl LlmProviderTrait for MockProvider {
    type Error = LlmError;

    fn generate(&self, _system: &str, prompt: &str) -> Result<String, Self::Error> {
        *self.call_count.lock().unwrap_or_else(|e| e.into_inner()) += 1;

        let mut state = self.state();
        state.prompts.push(prompt.to_string());

        let reply = if let Some(reply) = state.exact.get(prompt) {
            Some(reply.clone())
        } else if let Some((_, reply)) = state.keyed.iter().find(|(needle, _)| prompt.contains(needle.as_str())) {
            Some(reply.clone())
        } else {
            state.queue.pop_front()
        };

        match reply {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Error(message)) => Err(LlmError::Other(message)),
            None => Ok(self.default_response.clone()),
        }
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}
