//! HTTP embedding provider (behind the `remote` feature).
//!
//! Speaks the common `{"model": ..., "input": [...]}` embeddings JSON
//! shape. The engine treats the model as a pure function; transport and
//! model failures both surface as [`crate::Error::Embedding`].

use async_trait::async_trait;
use serde::Deserialize;

use super::provider::EmbeddingModel;
use crate::error::{Error, Result};

/// Remote embedding model over HTTP JSON.
pub struct RemoteEmbeddingModel {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    dimension: usize,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

impl RemoteEmbeddingModel {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        dimension: usize,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
            model: model.into(),
            dimension,
        }
    }
}

#[async_trait]
impl EmbeddingModel for RemoteEmbeddingModel {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("transport: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::Embedding(format!(
                "model endpoint returned {}",
                response.status()
            )));
        }
        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("malformed response: {e}")))?;
        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| Error::Embedding("empty embeddings response".into()))?;
        if embedding.len() != self.dimension {
            return Err(Error::Embedding(format!(
                "dimension mismatch: expected {}, got {}",
                self.dimension,
                embedding.len()
            )));
        }
        Ok(embedding)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
