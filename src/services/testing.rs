//! Test doubles for the capability traits.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::embedding::EmbeddingClient;
use super::synthesis::LanguageModel;
use crate::error::{EmbeddingError, SynthesisError};

/// Deterministic embedder: each text maps to a vector derived from its bytes.
pub struct FakeEmbedder {
    dimension: usize,
    calls: AtomicUsize,
    inputs: Mutex<Vec<String>>,
    fail_on: Option<String>,
}

impl FakeEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            calls: AtomicUsize::new(0),
            inputs: Mutex::new(Vec::new()),
            fail_on: None,
        }
    }

    /// Fail any call whose inputs contain `needle`.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_on = Some(needle.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn inputs(&self) -> Vec<String> {
        self.inputs.lock().unwrap().clone()
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut values = vec![0.0; self.dimension];
        for (i, byte) in text.bytes().enumerate() {
            values[i % self.dimension] += f32::from(byte) / 255.0;
        }
        values[0] += 1.0;
        values
    }
}

#[async_trait]
impl EmbeddingClient for FakeEmbedder {
    async fn embed_many(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inputs.lock().unwrap().extend(texts.iter().cloned());

        let fails = self
            .fail_on
            .as_deref()
            .is_some_and(|needle| texts.iter().any(|t| t.contains(needle)));
        if fails {
            return Err(EmbeddingError::ServerError("status 500: boom".to_string()));
        }

        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }
}

/// Language model that records its inputs and replies with a fixed answer.
pub struct FakeLanguageModel {
    reply: String,
    calls: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl FakeLanguageModel {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    /// Every call fails as if the context were too large.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("")
        }
    }

    /// Every `(context, question)` pair received, in order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for FakeLanguageModel {
    async fn answer(&self, context: &str, question: &str) -> Result<String, SynthesisError> {
        self.calls
            .lock()
            .unwrap()
            .push((context.to_string(), question.to_string()));
        if self.fail {
            return Err(SynthesisError::ContextTooLarge("too big".to_string()));
        }
        Ok(self.reply.clone())
    }
}
