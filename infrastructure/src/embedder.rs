use super::ollama_client::OllamaClient;
use domain::ports::Embedder;
use shared::types::Result;
use tracing::debug;

const BATCH_SIZE: usize = 32;

/// Embeddings served by an Ollama model (`all-minilm` by default).
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
    batch_size: usize,
}

impl OllamaEmbedder {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            batch_size: BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Embedder for OllamaEmbedder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(self.batch_size) {
            debug!(model = %self.model, batch = chunk.len(), "requesting embeddings");
            let batch = self.client.embed(&self.model, chunk).await?;
            if batch.len() != chunk.len() {
                return Err(anyhow::anyhow!(
                    "Ollama returned {} embeddings for {} inputs",
                    batch.len(),
                    chunk.len()
                ));
            }
            embeddings.extend(batch);
        }
        Ok(embeddings)
    }
}
