use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt, TryStreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::ai::core::provider_base::{build_http_client, endpoint_url, HttpClientConfig};
use crate::ai::core::providers::{ChatMessage, ChatProvider, EmbeddingProvider};
use crate::ai::rag::{EmbeddingVector, RAGError, RAGResult};
use crate::config::{EmbeddingConfig, OllamaConfig};

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f64>,
}

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<OllamaChatMessage>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatMessage {
    #[serde(default)]
    content: String,
}

/// Turn a non-success response into a provider error carrying the body
async fn error_for_status(
    response: reqwest::Response,
    context: &'static str,
) -> RAGResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = if body.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, body)
    };
    tracing::error!("{}: {}", context, message);
    Err(RAGError::Provider { context, message })
}

/// Embedding provider backed by Ollama's `/api/embeddings` endpoint.
///
/// Each text is one request. Up to `concurrency` requests are in flight; results keep
/// the input order and the first failure cancels everything still outstanding.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: Client,
    base_url: String,
    model: String,
    /// 0 disables the dimension check
    dimension: usize,
    concurrency: usize,
}

impl OllamaEmbedder {
    pub fn new(
        base_url: &str,
        model: &str,
        dimension: usize,
        concurrency: usize,
        timeout: Duration,
    ) -> RAGResult<Self> {
        let client = build_http_client(&HttpClientConfig::with_timeout(timeout))
            .map_err(RAGError::http("build ollama embeddings client"))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimension,
            concurrency: concurrency.max(1),
        })
    }

    pub fn from_config(ollama: &OllamaConfig, embedding: &EmbeddingConfig) -> RAGResult<Self> {
        Self::new(
            &ollama.host,
            &embedding.model,
            embedding.dimension,
            embedding.concurrency,
            embedding.timeout,
        )
    }

    async fn embed_one(&self, text: &str) -> RAGResult<EmbeddingVector> {
        const CONTEXT: &str = "call ollama embeddings API";

        let response = self
            .client
            .post(endpoint_url(&self.base_url, "api/embeddings"))
            .json(&OllamaEmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(RAGError::http(CONTEXT))?;

        let payload: OllamaEmbeddingResponse = error_for_status(response, CONTEXT)
            .await?
            .json()
            .await
            .map_err(RAGError::http("decode ollama embeddings response"))?;

        let vector: EmbeddingVector = payload.embedding.into_iter().map(|v| v as f32).collect();

        if self.dimension > 0 && vector.len() != self.dimension {
            return Err(RAGError::Provider {
                context: "validate ollama embedding",
                message: format!(
                    "dimension mismatch: expected {}, got {}",
                    self.dimension,
                    vector.len()
                ),
            });
        }

        Ok(vector)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, texts: &[String]) -> RAGResult<Vec<EmbeddingVector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(
            "Embedding {} texts with {} (concurrency {})",
            texts.len(),
            self.model,
            self.concurrency
        );

        // Boxed before streaming so the returned future stays Send
        let pending: Vec<BoxFuture<'_, RAGResult<EmbeddingVector>>> =
            texts.iter().map(|text| self.embed_one(text).boxed()).collect();

        stream::iter(pending)
            .buffered(self.concurrency)
            .try_collect()
            .await
    }

    fn dimension(&self) -> Option<usize> {
        (self.dimension > 0).then_some(self.dimension)
    }

    fn provider_name(&self) -> &'static str {
        "ollama"
    }
}

/// Chat client backed by Ollama's `/api/chat` endpoint
#[derive(Debug, Clone)]
pub struct OllamaChatClient {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaChatClient {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> RAGResult<Self> {
        let client = build_http_client(&HttpClientConfig::with_timeout(timeout))
            .map_err(RAGError::http("build ollama chat client"))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    pub fn from_config(ollama: &OllamaConfig) -> RAGResult<Self> {
        Self::new(&ollama.host, &ollama.model, ollama.timeout)
    }
}

#[async_trait]
impl ChatProvider for OllamaChatClient {
    async fn generate(&self, messages: &[ChatMessage]) -> RAGResult<String> {
        const CONTEXT: &str = "call ollama chat API";

        if self.base_url.is_empty() {
            return Err(RAGError::Provider {
                context: CONTEXT,
                message: "ollama host must be configured".to_string(),
            });
        }
        if self.model.is_empty() {
            return Err(RAGError::Provider {
                context: CONTEXT,
                message: "ollama model must be configured".to_string(),
            });
        }

        let response = self
            .client
            .post(endpoint_url(&self.base_url, "api/chat"))
            .json(&OllamaChatRequest {
                model: &self.model,
                messages,
                stream: false,
            })
            .send()
            .await
            .map_err(RAGError::http(CONTEXT))?;

        let parsed: OllamaChatResponse = error_for_status(response, CONTEXT)
            .await?
            .json()
            .await
            .map_err(RAGError::http("decode ollama chat response"))?;

        if let Some(error) = parsed.error.filter(|e| !e.is_empty()) {
            tracing::error!("Ollama reported an error: {}", error);
            return Err(RAGError::Provider {
                context: CONTEXT,
                message: error,
            });
        }

        Ok(parsed.message.map(|m| m.content).unwrap_or_default())
    }

    fn provider_name(&self) -> &'static str {
        "ollama"
    }
}
