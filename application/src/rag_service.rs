use anyhow::Context;
use domain::chat::ChatMessage;
use domain::models::{Metric, RagAnswer, Retrieved, SourceDocument};
use domain::ports::{ChatTokenizer, Embedder, Generator, VectorStore};
use domain::sampling::SamplingParams;
use shared::telemetry::Telemetry;
use shared::types::Result;
use tracing::{debug, info, warn};

use crate::prompt::{build_context, build_prompt};

/// Per-run knobs of the pipeline.
#[derive(Debug, Clone)]
pub struct RagSettings {
    pub collection: String,
    pub metric: Metric,
    pub top_k: usize,
    pub sampling: SamplingParams,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            collection: "xyz".to_string(),
            metric: Metric::Cosine,
            top_k: 2,
            sampling: SamplingParams::default(),
        }
    }
}

/// Ingest, retrieve, prompt, generate. Each capability is injected; nothing is global.
pub struct RagService<E, S, T, G> {
    embedder: E,
    store: S,
    tokenizer: T,
    generator: G,
    settings: RagSettings,
}

impl<E, S, T, G> RagService<E, S, T, G>
where
    E: Embedder,
    S: VectorStore,
    T: ChatTokenizer,
    G: Generator,
{
    pub fn new(embedder: E, store: S, tokenizer: T, generator: G, settings: RagSettings) -> Self {
        Self {
            embedder,
            store,
            tokenizer,
            generator,
            settings,
        }
    }

    pub fn settings(&self) -> &RagSettings {
        &self.settings
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn create_collection(&self) -> Result<()> {
        self.store
            .create_collection(&self.settings.collection, self.settings.metric)
            .with_context(|| format!("Failed to create collection '{}'", self.settings.collection))
    }

    pub fn delete_collection(&self) -> Result<()> {
        self.store
            .delete_collection(&self.settings.collection)
            .with_context(|| format!("Failed to delete collection '{}'", self.settings.collection))
    }

    /// Embed every document with one `encode` call and store them with one `add`.
    pub async fn ingest(&self, documents: &[SourceDocument]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let telemetry = Telemetry::new();
        let ids: Vec<String> = documents.iter().map(|d| d.id.clone()).collect();
        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();

        let vectors = self
            .embedder
            .encode(&texts)
            .await
            .context("Failed to embed documents")?;
        if vectors.len() != texts.len() {
            anyhow::bail!(
                "embedder returned {} vectors for {} documents",
                vectors.len(),
                texts.len()
            );
        }

        self.store
            .add(&self.settings.collection, &ids, &vectors, &texts)
            .context("Failed to store documents")?;
        info!(
            collection = %self.settings.collection,
            documents = documents.len(),
            dimension = vectors.first().map(Vec::len).unwrap_or(0),
            elapsed_ms = telemetry.elapsed_ms() as u64,
            "ingested documents"
        );
        Ok(())
    }

    /// The `k` stored documents closest to `question`, most similar first.
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<Retrieved>> {
        let query = [question.to_string()];
        let mut vectors = self
            .embedder
            .encode(&query)
            .await
            .context("Failed to embed question")?;
        if vectors.len() != 1 {
            anyhow::bail!(
                "embedder returned {} vectors for the question, expected 1",
                vectors.len()
            );
        }
        let query_vector = vectors.swap_remove(0);

        let hits = self
            .store
            .query(&self.settings.collection, &query_vector, k)
            .context("Failed to query collection")?;
        if hits.len() < k {
            debug!(requested = k, returned = hits.len(), "collection smaller than k");
        }
        info!(retrieved = hits.len(), "retrieved context");
        Ok(hits)
    }

    /// Answer `prompt` as a single user turn and return only the new text.
    pub async fn generate(&self, prompt: &str) -> Result<String> {
        let telemetry = Telemetry::new();
        let messages = [ChatMessage::user(prompt)];
        let templated = self.tokenizer.apply_chat_template(&messages, true)?;
        let input_ids = self
            .tokenizer
            .encode(&templated)
            .context("Failed to tokenize prompt")?;
        debug!(prompt_tokens = input_ids.len(), sampling = ?self.settings.sampling, "generating");

        let output = self
            .generator
            .generate(&input_ids, &self.settings.sampling)
            .await
            .context("Generation failed")?;
        let Some(new_ids) = output.get(input_ids.len()..) else {
            anyhow::bail!(
                "generator returned {} tokens, fewer than the {} prompt tokens",
                output.len(),
                input_ids.len()
            );
        };

        let answer = self
            .tokenizer
            .decode(new_ids, true)
            .context("Failed to decode answer")?;
        info!(
            new_tokens = new_ids.len(),
            elapsed_ms = telemetry.elapsed_ms() as u64,
            "generated answer"
        );
        Ok(answer.trim().to_string())
    }

    /// Retrieve `top_k` documents, assemble the prompt and generate.
    pub async fn answer(&self, question: &str) -> Result<RagAnswer> {
        let retrieved = self.retrieve(question, self.settings.top_k).await?;
        let texts: Vec<&str> = retrieved.iter().map(|r| r.text.as_str()).collect();
        let context = build_context(texts.as_slice());
        let prompt = build_prompt(&context, question);
        let answer = self.generate(&prompt).await?;
        Ok(RagAnswer {
            question: question.to_string(),
            context,
            retrieved,
            answer,
        })
    }

    /// One full pass: create the collection, ingest, answer, drop the collection.
    ///
    /// The collection is dropped even when a middle step fails; that step's
    /// error is the one returned.
    pub async fn run(&self, corpus: &[SourceDocument], question: &str) -> Result<RagAnswer> {
        let telemetry = Telemetry::new();
        self.create_collection()?;

        let outcome = match self.ingest(corpus).await {
            Ok(()) => self.answer(question).await,
            Err(err) => Err(err),
        };
        let cleanup = self.delete_collection();

        let answer = match (outcome, cleanup) {
            (Ok(answer), Ok(())) => answer,
            (Ok(_), Err(cleanup_err)) => return Err(cleanup_err),
            (Err(err), cleanup) => {
                if let Err(cleanup_err) = cleanup {
                    warn!(error = %cleanup_err, "failed to drop collection after error");
                }
                return Err(err);
            }
        };
        info!(elapsed_ms = telemetry.elapsed_ms() as u64, "pipeline finished");
        Ok(answer)
    }
}
