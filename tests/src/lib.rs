//! Deterministic stand-ins for the model-backed adapters.

use domain::chat::ChatMessage;
use domain::ports::{ChatTokenizer, Embedder, Generator};
use domain::sampling::SamplingParams;
use infrastructure::tokenizer::{render_chatml, IM_END, IM_START};
use shared::types::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const QUESTION: &str = "What does Harsh like?";
pub const ICE_CREAM: &str = "Harsh likes ice cream.";
pub const MINT_CHIP: &str = "Harsh likes mint chocolate chip ice cream.";
pub const SYSTEM_DESIGN: &str = "Harsh likes system design.";
pub const UNRELATED: &str = "The sky is blue.";

/// Embeds by exact lookup; unknown text is an error.
pub struct LookupEmbedder {
    table: HashMap<String, Vec<f32>>,
    calls: AtomicUsize,
}

impl LookupEmbedder {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<f32>)>,
        S: Into<String>,
    {
        Self {
            table: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Vectors that put the ice-cream sentences closest to [`QUESTION`].
    pub fn harsh() -> Self {
        Self::new([
            (ICE_CREAM, vec![1.0, 0.1, 0.0]),
            (MINT_CHIP, vec![0.9, 0.2, 0.1]),
            (SYSTEM_DESIGN, vec![0.1, 0.0, 1.0]),
            (UNRELATED, vec![0.0, 1.0, 0.0]),
            (QUESTION, vec![0.8, 0.1, 0.3]),
        ])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for LookupEmbedder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        texts
            .iter()
            .map(|text| {
                self.table
                    .get(text)
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("no vector for '{text}'"))
            })
            .collect()
    }
}

/// Answers every request with one vector more than it was asked for.
pub struct SurplusEmbedder;

impl Embedder for SurplusEmbedder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(vec![vec![1.0, 0.0]; texts.len() + 1])
    }
}

/// Whitespace tokenizer that grows its vocabulary on demand.
#[derive(Default)]
pub struct WordTokenizer {
    vocab: Mutex<Vocab>,
}

#[derive(Default)]
struct Vocab {
    words: Vec<String>,
    ids: HashMap<String, u32>,
}

impl WordTokenizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn id_of(&self, word: &str) -> u32 {
        let mut vocab = self.vocab.lock().unwrap();
        if let Some(id) = vocab.ids.get(word) {
            return *id;
        }
        let id = vocab.words.len() as u32;
        vocab.words.push(word.to_string());
        vocab.ids.insert(word.to_string(), id);
        id
    }

    fn is_special(word: &str) -> bool {
        word == IM_START || word == IM_END
    }
}

impl ChatTokenizer for WordTokenizer {
    fn apply_chat_template(&self, messages: &[ChatMessage], add_generation_prompt: bool) -> Result<String> {
        Ok(render_chatml(messages, add_generation_prompt))
    }

    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let spaced = text
            .replace(IM_START, &format!(" {IM_START} "))
            .replace(IM_END, &format!(" {IM_END} "));
        Ok(spaced.split_whitespace().map(|w| self.id_of(w)).collect())
    }

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String> {
        let vocab = self.vocab.lock().unwrap();
        let mut words = Vec::with_capacity(ids.len());
        for id in ids {
            let word = vocab
                .words
                .get(*id as usize)
                .ok_or_else(|| anyhow::anyhow!("unknown token id {id}"))?;
            if skip_special_tokens && Self::is_special(word) {
                continue;
            }
            words.push(word.as_str());
        }
        Ok(words.join(" "))
    }
}

/// Echoes the prompt and appends a fixed reply followed by `<|im_end|>`.
pub struct EchoGenerator {
    reply: String,
    tokenizer: Arc<WordTokenizer>,
    seen: Mutex<Vec<SamplingParams>>,
    inputs: Mutex<Vec<Vec<u32>>>,
}

impl EchoGenerator {
    pub fn new(reply: impl Into<String>, tokenizer: Arc<WordTokenizer>) -> Self {
        Self {
            reply: reply.into(),
            tokenizer,
            seen: Mutex::new(Vec::new()),
            inputs: Mutex::new(Vec::new()),
        }
    }

    /// Sampling parameters of every call, in order.
    pub fn seen(&self) -> Vec<SamplingParams> {
        self.seen.lock().unwrap().clone()
    }

    /// Prompt ids of every call, in order.
    pub fn inputs(&self) -> Vec<Vec<u32>> {
        self.inputs.lock().unwrap().clone()
    }
}

impl Generator for EchoGenerator {
    async fn generate(&self, input_ids: &[u32], params: &SamplingParams) -> Result<Vec<u32>> {
        self.seen.lock().unwrap().push(params.clone());
        self.inputs.lock().unwrap().push(input_ids.to_vec());
        let mut output = input_ids.to_vec();
        output.extend(self.tokenizer.encode(&self.reply)?);
        output.extend(self.tokenizer.encode(IM_END)?);
        Ok(output)
    }
}

/// Returns fewer tokens than it was given.
pub struct TruncatingGenerator;

impl Generator for TruncatingGenerator {
    async fn generate(&self, input_ids: &[u32], _params: &SamplingParams) -> Result<Vec<u32>> {
        Ok(input_ids[..input_ids.len() / 2].to_vec())
    }
}
