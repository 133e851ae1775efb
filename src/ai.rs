//! Generative-AI chat functionality.
//!
//! This module talks to the Gemini `generateContent` REST endpoint for text
//! replies and provides the wire types shared with speech synthesis.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AppConfig;

/// Default Gemini REST API root.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Environment variable holding the API key.
pub const API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Speaker of a conversation turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One turn of the conversation history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part {
                text: Some(text.into()),
                inline_data: None,
            }],
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InlineData {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationConfig {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

impl GenerateContentResponse {
    /// Parts of the first candidate, or nothing.
    pub fn first_parts(&self) -> &[Part] {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| content.parts.as_slice())
            .unwrap_or(&[])
    }

    /// Concatenated text of the first candidate.
    pub fn text(&self) -> Option<String> {
        let text: String = self
            .first_parts()
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect();
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

/// Thin HTTP client for the Gemini REST API.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    /// Creates a client for `base_url` authenticated with `api_key`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>, base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Creates a client from `GEMINI_API_KEY` and the configured endpoint.
    ///
    /// # Errors
    /// Returns an error when the key is missing or empty.
    pub fn from_env(config: &AppConfig) -> Result<Self> {
        let api_key = env::var(API_KEY_VAR)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .with_context(|| format!("{} is not set", API_KEY_VAR))?;
        Self::new(api_key, &config.api_base_url, config.request_timeout())
    }

    /// URL of the `generateContent` method for `model`.
    pub fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }

    pub(crate) async fn generate(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let url = self.endpoint(model);
        debug!(%url, "sending generateContent request");
        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", model))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|parsed| parsed.error.message)
                .unwrap_or(body);
            anyhow::bail!("{} returned {}: {}", model, status, message.trim());
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", model))
    }
}

/// Conversation with the chat model, keeping history across turns.
pub struct ChatSession {
    client: GeminiClient,
    model: String,
    system_instruction: String,
    pub(crate) history: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(client: GeminiClient, config: &AppConfig) -> Self {
        Self {
            client,
            model: config.chat_model.clone(),
            system_instruction: config.system_instruction.clone(),
            history: Vec::new(),
        }
    }

    /// Gets a reply to `user_text` and records the exchange.
    ///
    /// # Errors
    /// Returns an error if the request fails or the reply has no text. The
    /// history is left untouched on failure.
    pub async fn send(&mut self, user_text: &str) -> Result<String> {
        let request = self.build_request(user_text);
        let response = self.client.generate(&self.model, &request).await?;
        let reply = response
            .text()
            .with_context(|| format!("{} returned no text", self.model))?;
        self.history.push(ChatMessage::user(user_text));
        self.history.push(ChatMessage::model(reply.clone()));
        Ok(reply)
    }

    /// Exchanges recorded so far, oldest first.
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Forgets the conversation so the next turn starts fresh.
    pub fn clear(&mut self) {
        self.history.clear();
    }

    fn build_request(&self, user_text: &str) -> GenerateContentRequest {
        let mut contents: Vec<Content> = self
            .history
            .iter()
            .map(|message| {
                let role = match message.role {
                    Role::User => "user",
                    Role::Model => "model",
                };
                Content::text(Some(role), message.text.clone())
            })
            .collect();
        contents.push(Content::text(Some("user"), user_text));
        let system_instruction = (!self.system_instruction.trim().is_empty())
            .then(|| Content::text(None, self.system_instruction.clone()));
        GenerateContentRequest {
            contents,
            system_instruction,
            generation_config: None,
        }
    }
}
