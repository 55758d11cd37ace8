//! API-based embedder using OpenAI-compatible endpoints.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use embedcache_types::{ConfigError, EmbeddingSettings};

use super::{Embedder, EmbedderError};

/// Configuration for the API-based embedder.
#[derive(Debug, Clone)]
pub struct ApiEmbedderConfig {
    /// API base URL (e.g., "https://api.openai.com/v1")
    pub base_url: String,

    /// Model to use (e.g., "text-embedding-3-large")
    pub model: String,

    /// API key
    pub api_key: SecretString,

    /// Request timeout
    pub timeout: Duration,
}

impl ApiEmbedderConfig {
    /// Create config for the OpenAI API.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
            api_key: SecretString::from(api_key.into()),
            timeout: Duration::from_secs(60),
        }
    }

    /// Build from settings; fails when no credential is configured.
    pub fn from_settings(settings: &EmbeddingSettings) -> Result<Self, ConfigError> {
        let api_key = settings.api_key()?;
        Ok(Self {
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: SecretString::from(api_key.to_string()),
            timeout: settings.timeout(),
        })
    }

    /// Point the client at a different endpoint (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

/// API-based embedder implementation.
pub struct ApiEmbedder {
    client: Client,
    config: ApiEmbedderConfig,
}

impl ApiEmbedder {
    /// Create a new API embedder.
    pub fn new(config: ApiEmbedderConfig) -> Result<Self, EmbedderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EmbedderError::ConfigError(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// Make a single `/embeddings` request.
    async fn make_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: texts,
        };

        let url = format!("{}/embeddings", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.config.api_key.expose_secret()),
            )
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbedderError::Timeout
                } else {
                    EmbedderError::ApiError(e.to_string())
                }
            })?;

        if response.status() == 429 {
            return Err(EmbedderError::RateLimitExceeded);
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedderError::ApiError(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbedderError::ParseError(e.to_string()))?;

        order_by_index(body.data)
    }
}

/// Reorder response items by their `index` field when the service sends one.
fn order_by_index(mut items: Vec<EmbeddingItem>) -> Result<Vec<Vec<f32>>, EmbedderError> {
    if items.iter().all(|item| item.index.is_some()) {
        items.sort_by_key(|item| item.index);
        let in_range = items
            .iter()
            .enumerate()
            .all(|(pos, item)| item.index == Some(pos));
        if !in_range {
            return Err(EmbedderError::ParseError(
                "response indices are not contiguous".to_string(),
            ));
        }
    }
    Ok(items.into_iter().map(|item| item.embedding).collect())
}

#[async_trait]
impl Embedder for ApiEmbedder {
    fn model_id(&self) -> &str {
        &self.config.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.config.model, count = texts.len(), "Requesting embeddings");
        self.make_request(texts).await
    }
}
