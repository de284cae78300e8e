//! Mock backend for testing and dry runs.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::domain::errors::BackendError;
use crate::domain::models::Prompt;
use crate::domain::ports::{BackendClient, Completion, FinishReason};

/// What the mock answers with.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Completion(Completion),
    Failure(BackendError),
}

impl Default for MockResponse {
    fn default() -> Self {
        Self::text(r#"{"reasoning": "mock", "output": {"status": "done"}}"#)
    }
}

impl MockResponse {
    /// Completion finished normally with `text`.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Completion(Completion::stop(text))
    }

    /// Completion holding `{"reasoning", "output"}` as JSON.
    pub fn output(reasoning: &str, output: serde_json::Value) -> Self {
        Self::text(serde_json::json!({ "reasoning": reasoning, "output": output }).to_string())
    }

    /// Completion with `finish_reason = error`.
    pub fn finish_error(text: impl Into<String>) -> Self {
        Self::Completion(Completion::error(text))
    }

    /// Completion cut off at the token limit.
    pub fn truncated(text: impl Into<String>) -> Self {
        Self::Completion(Completion {
            text: text.into(),
            finish_reason: FinishReason::Length,
        })
    }

    /// The call itself fails.
    pub fn failure(error: BackendError) -> Self {
        Self::Failure(error)
    }
}

type Responder = dyn Fn(&Prompt) -> MockResponse + Send + Sync;

/// Scripted backend.
///
/// Answers from the script queue first, then the responder, then the
/// default response. Every prompt is recorded.
pub struct MockBackend {
    default_response: MockResponse,
    script: Mutex<VecDeque<MockResponse>>,
    responder: Option<Arc<Responder>>,
    delay: Duration,
    calls: AtomicUsize,
    prompts: Mutex<Vec<Prompt>>,
}

impl MockBackend {
    /// Backend answering every prompt with a fixed `done` result.
    pub fn new() -> Self {
        Self::with_default(MockResponse::default())
    }

    /// Backend answering unmatched prompts with `response`.
    pub fn with_default(response: MockResponse) -> Self {
        Self {
            default_response: response,
            script: Mutex::new(VecDeque::new()),
            responder: None,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Compute each answer from the prompt.
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&Prompt) -> MockResponse + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new(responder));
        self
    }

    /// Sleep this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue a response for the next unanswered call.
    pub fn push(&self, response: MockResponse) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(response);
    }

    /// Number of `complete` calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn next_response(&self, prompt: &Prompt) -> MockResponse {
        let scripted = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        if let Some(response) = scripted {
            return response;
        }
        match &self.responder {
            Some(responder) => responder(prompt),
            None => self.default_response.clone(),
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendClient for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn complete(&self, prompt: &Prompt, _deadline: Duration) -> Result<Completion, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.clone());

        let response = self.next_response(prompt);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match response {
            MockResponse::Completion(completion) => Ok(completion),
            MockResponse::Failure(error) => Err(error),
        }
    }
}
