use anyhow::Context;
use domain::sampling::SamplingParams;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::types::Result;
use std::sync::Arc;

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    raw: bool,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize, Debug, PartialEq)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
    top_p: f32,
    top_k: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

impl From<&SamplingParams> for GenerateOptions {
    fn from(params: &SamplingParams) -> Self {
        Self {
            num_predict: params.max_new_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
            top_k: params.top_k,
            seed: params.seed,
        }
    }
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

#[derive(Clone)]
pub struct OllamaClient {
    client: Arc<Client>,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Arc::new(Client::new()),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// One `/api/embed` round trip for the whole batch.
    pub async fn embed(&self, model: &str, input: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url);
        let request = EmbedRequest { model, input };
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed contacting Ollama at {url}"))?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(anyhow::anyhow!("Ollama embed error ({status}): {text}"));
        }
        let parsed: EmbedResponse =
            serde_json::from_str(&text).context("Malformed Ollama embed response")?;
        Ok(parsed.embeddings)
    }

    /// Complete `prompt` verbatim (`raw`), bypassing the server-side chat template.
    pub async fn generate_raw(
        &self,
        model: &str,
        prompt: &str,
        params: &SamplingParams,
    ) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model,
            prompt,
            raw: true,
            stream: false,
            options: GenerateOptions::from(params),
        };
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed contacting Ollama at {url}"))?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(anyhow::anyhow!("Ollama generate error ({status}): {text}"));
        }
        collect_completion(&text)
    }
}

/// Ollama may answer with NDJSON even when streaming is off; concatenate every chunk.
fn collect_completion(body: &str) -> Result<String> {
    let mut full_content = String::new();
    for line in body.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let Ok(chunk) = serde_json::from_str::<GenerateResponse>(line) else {
            continue;
        };
        if let Some(error) = chunk.error {
            anyhow::bail!("Ollama generate error: {error}");
        }
        full_content.push_str(&chunk.response);
        if chunk.done {
            return Ok(full_content);
        }
    }
    Err(anyhow::anyhow!(
        "Ollama generate response never completed: {}",
        body.chars().take(200).collect::<String>()
    ))
}
