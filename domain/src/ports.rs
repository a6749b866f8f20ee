use crate::chat::ChatMessage;
use crate::models::{Metric, Retrieved};
use crate::sampling::SamplingParams;
use shared::types::Result;
use std::future::Future;
use std::sync::Arc;

/// Output order matches input order.
pub trait Embedder {
    fn encode(&self, texts: &[String]) -> impl Future<Output = Result<Vec<Vec<f32>>>> + Send;
}

/// Caller mistakes surface as [`crate::errors::StoreError`] inside the `anyhow::Error`.
pub trait VectorStore {
    fn create_collection(&self, name: &str, metric: Metric) -> Result<()>;

    /// All or nothing.
    fn add(&self, collection: &str, ids: &[String], vectors: &[Vec<f32>], texts: &[String]) -> Result<()>;

    fn query(&self, collection: &str, vector: &[f32], k: usize) -> Result<Vec<Retrieved>>;

    fn delete_collection(&self, name: &str) -> Result<()>;

    fn count(&self, collection: &str) -> Result<usize>;

    fn list_collections(&self) -> Result<Vec<String>>;
}

pub trait ChatTokenizer {
    fn apply_chat_template(&self, messages: &[ChatMessage], add_generation_prompt: bool) -> Result<String>;

    /// Encode without adding special tokens; markers already in `text` are kept.
    fn encode(&self, text: &str) -> Result<Vec<u32>>;

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String>;
}

impl<T: ChatTokenizer + ?Sized> ChatTokenizer for Arc<T> {
    fn apply_chat_template(&self, messages: &[ChatMessage], add_generation_prompt: bool) -> Result<String> {
        (**self).apply_chat_template(messages, add_generation_prompt)
    }

    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        (**self).encode(text)
    }

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String> {
        (**self).decode(ids, skip_special_tokens)
    }
}

/// Autoregressive model. The returned sequence starts with `input_ids`.
pub trait Generator {
    fn generate(
        &self,
        input_ids: &[u32],
        params: &SamplingParams,
    ) -> impl Future<Output = Result<Vec<u32>>> + Send;
}
