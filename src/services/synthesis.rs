//! Answer synthesis with a chat language model.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::events::{EventSink, PipelineEvent};
use crate::error::SynthesisError;
use crate::models::LanguageModelConfig;
use crate::utils::{RetryConfig, char_len, with_retry};

/// Answers a question from the supplied context only.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn answer(&self, context: &str, question: &str) -> Result<String, SynthesisError>;
}

/// Single-prompt "stuff" QA template: all context, then the question.
pub fn stuff_prompt(context: &str, question: &str) -> String {
    format!(
        "Use the following pieces of context to answer the question at the end. \
         If you don't know the answer, just say that you don't know, \
         don't try to make up an answer.\n\n{}\n\nQuestion: {}\nHelpful Answer:",
        context, question
    )
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Client for an OpenAI-compatible chat completions API.
#[derive(Debug, Clone)]
pub struct OpenAiChatModel {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    retry: RetryConfig,
}

impl OpenAiChatModel {
    /// The API key falls back to `OPENAI_API_KEY` when not configured.
    pub fn new(config: &LanguageModelConfig) -> Result<Self, SynthesisError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or(SynthesisError::MissingApiKey)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SynthesisError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            temperature: config.temperature,
            retry: RetryConfig::default(),
        })
    }

    #[must_use]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn complete(&self, prompt: &str) -> Result<String, SynthesisError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SynthesisError::Timeout
                } else if e.is_connect() {
                    SynthesisError::ConnectionError(e.to_string())
                } else {
                    SynthesisError::RequestError(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status == StatusCode::BAD_REQUEST && is_context_length_error(&body) {
                return Err(SynthesisError::ContextTooLarge(body));
            }
            return Err(SynthesisError::ServerError(format!(
                "status {}: {}",
                status, body
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| SynthesisError::InvalidResponse(e.to_string()))?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| SynthesisError::InvalidResponse("response has no choices".to_string()))
    }
}

fn is_context_length_error(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("context_length_exceeded") || lower.contains("maximum context length")
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    async fn answer(&self, context: &str, question: &str) -> Result<String, SynthesisError> {
        let prompt = stuff_prompt(context, question);
        with_retry(&self.retry, "chat completion", || self.complete(&prompt))
            .await
            .into_result()
    }
}

/// Passes context and question to the language model and reports the result.
pub struct SynthesisEngine {
    model: Arc<dyn LanguageModel>,
    events: Arc<dyn EventSink>,
}

impl SynthesisEngine {
    pub fn new(model: Arc<dyn LanguageModel>, events: Arc<dyn EventSink>) -> Self {
        Self { model, events }
    }

    /// The model's text, unmodified.
    pub async fn synthesize(&self, context: &str, question: &str) -> Result<String, SynthesisError> {
        let answer = self.model.answer(context, question).await?;
        self.events.emit(PipelineEvent::AnswerSynthesized {
            context_chars: char_len(context),
            answer_chars: char_len(&answer),
        });
        Ok(answer)
    }
}
