use super::ollama_client::OllamaClient;
use domain::ports::{ChatTokenizer, Generator};
use domain::sampling::SamplingParams;
use shared::types::Result;
use std::sync::Arc;
use tracing::debug;

/// Generation through Ollama's raw completion endpoint.
///
/// Ollama speaks text, so the prompt ids are decoded with special tokens kept
/// and the completion is re-encoded with the same tokenizer the pipeline uses.
pub struct OllamaGenerator<T> {
    client: OllamaClient,
    model: String,
    tokenizer: Arc<T>,
}

impl<T: ChatTokenizer> OllamaGenerator<T> {
    pub fn new(client: OllamaClient, model: impl Into<String>, tokenizer: Arc<T>) -> Self {
        Self {
            client,
            model: model.into(),
            tokenizer,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl<T: ChatTokenizer + Send + Sync> Generator for OllamaGenerator<T> {
    async fn generate(&self, input_ids: &[u32], params: &SamplingParams) -> Result<Vec<u32>> {
        let prompt = prompt_text(self.tokenizer.as_ref(), input_ids)?;
        debug!(model = %self.model, prompt_tokens = input_ids.len(), "requesting completion");

        let completion = self
            .client
            .generate_raw(&self.model, &prompt, params)
            .await?;

        append_completion(
            self.tokenizer.as_ref(),
            input_ids,
            &completion,
            params.max_new_tokens as usize,
        )
    }
}

/// Raw text of the prompt, ChatML markers included.
fn prompt_text<T: ChatTokenizer + ?Sized>(tokenizer: &T, input_ids: &[u32]) -> Result<String> {
    tokenizer.decode(input_ids, false)
}

fn append_completion<T: ChatTokenizer + ?Sized>(
    tokenizer: &T,
    input_ids: &[u32],
    completion: &str,
    max_new_tokens: usize,
) -> Result<Vec<u32>> {
    let mut new_ids = tokenizer.encode(completion)?;
    // Re-tokenizing can shift boundaries by a token or two.
    new_ids.truncate(max_new_tokens);

    let mut output = Vec::with_capacity(input_ids.len() + new_ids.len());
    output.extend_from_slice(input_ids);
    output.extend(new_ids);
    Ok(output)
}
