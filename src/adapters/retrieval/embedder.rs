//! OpenAI-compatible `/embeddings` client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::adapters::ai::OpenAIConfig;
use crate::ports::{Embedder, RetrievalError};

/// Embeds text through an OpenAI-compatible endpoint.
pub struct OpenAIEmbedder {
    config: OpenAIConfig,
    client: Client,
}

impl OpenAIEmbedder {
    /// `config.model` names the embedding model.
    pub fn new(config: OpenAIConfig) -> Result<Self, RetrievalError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RetrievalError::Embedding(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    fn embeddings_url(&self) -> String {
        format!("{}/embeddings", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let mut builder = self.client.post(self.embeddings_url()).json(&EmbeddingRequest {
            model: &self.config.model,
            input: text,
        });
        if let Some(key) = self.config.api_key() {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RetrievalError::Embedding(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Embedding(format!("status {status}: {body}")));
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RetrievalError::Embedding(format!("failed to parse response: {e}")))?;

        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| RetrievalError::Embedding("empty embedding".into()))
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use serde_json::{json, Value};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/v1")
    }

    #[tokio::test]
    async fn returns_first_embedding() {
        let router = Router::new().route(
            "/v1/embeddings",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["model"], "text-embedding-3-small");
                Json(json!({"data": [{"embedding": [0.25, 0.5], "index": 0}]}))
            }),
        );
        let embedder = OpenAIEmbedder::new(
            OpenAIConfig::new(serve(router).await).with_model("text-embedding-3-small"),
        )
        .unwrap();

        assert_eq!(embedder.embed("refund policy").await.unwrap(), vec![0.25, 0.5]);
    }

    #[tokio::test]
    async fn missing_endpoint_is_an_embedding_error() {
        let embedder = OpenAIEmbedder::new(OpenAIConfig::new(serve(Router::new()).await)).unwrap();
        assert!(matches!(embedder.embed("x").await, Err(RetrievalError::Embedding(_))));
    }
}
