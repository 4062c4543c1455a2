use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::http::status_error;
use crate::provider::{LlmProvider, Message, Role, split_system};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini REST backend.
///
/// Generation walks `models` in order and returns the first successful answer,
/// so a list like `["gemini-2.0-flash", "gemini-1.5-flash"]` acts as a
/// preference list.
#[derive(Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    models: Vec<String>,
    embedding_model: Option<String>,
}

impl fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("models", &self.models)
            .field("embedding_model", &self.embedding_model)
            .finish()
    }
}

impl GeminiProvider {
    #[must_use]
    pub fn new(
        api_key: String,
        mut base_url: String,
        models: Vec<String>,
        embedding_model: Option<String>,
    ) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: crate::http::default_client(),
            api_key,
            base_url,
            models,
            embedding_model,
        }
    }

    async fn generate_with(&self, model: &str, body: &GenerateRequest<'_>) -> Result<String, LlmError> {
        let response = self
            .client
            .post(format!("{}/{}:generateContent", self.base_url, model_path(model)))
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(status_error("gemini", status, &text));
        }

        let resp: GenerateResponse = serde_json::from_str(&text)?;
        resp.candidates
            .into_iter()
            .flat_map(|c| c.content.parts)
            .find_map(|p| p.text)
            .ok_or(LlmError::EmptyResponse { provider: "gemini" })
    }
}

/// Model names may be given with or without the `models/` prefix.
fn model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_owned()
    } else {
        format!("models/{model}")
    }
}

impl LlmProvider for GeminiProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        if self.models.is_empty() {
            return Err(LlmError::Other("gemini generation models not configured".into()));
        }

        let (system, turns) = split_system(messages);
        let contents: Vec<Content<'_>> = turns
            .iter()
            .map(|m| Content {
                role: if m.role == Role::Assistant {
                    "model"
                } else {
                    "user"
                },
                parts: vec![Part { text: &m.content }],
            })
            .collect();
        let body = GenerateRequest {
            system_instruction: system.as_deref().map(|text| SystemInstruction {
                parts: vec![Part { text }],
            }),
            contents,
        };

        let mut last_err = None;
        for model in &self.models {
            match self.generate_with(model, &body).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    tracing::warn!(provider = "gemini", model, "generation failed: {e}");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or(LlmError::EmptyResponse { provider: "gemini" }))
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let model = self
            .embedding_model
            .as_deref()
            .ok_or(LlmError::EmbedUnsupported { provider: "gemini" })?;

        let model = model_path(model);
        let body = EmbedRequest {
            model: &model,
            content: EmbedContent {
                parts: vec![Part { text }],
            },
            task_type: "RETRIEVAL_DOCUMENT",
        };

        let response = self
            .client
            .post(format!("{}/{model}:embedContent", self.base_url))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(status_error("gemini", status, &text));
        }

        let resp: EmbedResponse = serde_json::from_str(&text)?;
        if resp.embedding.values.is_empty() {
            return Err(LlmError::EmptyResponse { provider: "gemini" });
        }
        Ok(resp.embedding.values)
    }

    fn supports_embeddings(&self) -> bool {
        self.embedding_model.is_some()
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction<'a>>,
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct SystemInstruction<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: &'a str,
    content: EmbedContent<'a>,
    task_type: &'a str,
}

#[derive(Serialize)]
struct EmbedContent<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}
