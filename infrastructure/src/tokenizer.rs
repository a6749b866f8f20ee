use anyhow::anyhow;
use domain::chat::ChatMessage;
use domain::ports::ChatTokenizer;
use shared::types::Result;
use std::path::Path;
use std::str::FromStr;
use tokenizers::Tokenizer;
use tracing::info;

pub const IM_START: &str = "<|im_start|>";
pub const IM_END: &str = "<|im_end|>";

/// Render messages in the ChatML layout used by Qwen chat models.
pub fn render_chatml(messages: &[ChatMessage], add_generation_prompt: bool) -> String {
    let mut prompt = String::new();
    for message in messages {
        prompt.push_str(IM_START);
        prompt.push_str(message.role.as_str());
        prompt.push('\n');
        prompt.push_str(&message.content);
        prompt.push_str(IM_END);
        prompt.push('\n');
    }
    if add_generation_prompt {
        prompt.push_str(IM_START);
        prompt.push_str("assistant\n");
    }
    prompt
}

/// HuggingFace `tokenizer.json` plus the ChatML template.
pub struct HfChatTokenizer {
    tokenizer: Tokenizer,
}

impl HfChatTokenizer {
    /// `source` is either a path to `tokenizer.json` or a hub repo id such as `Qwen/Qwen3-0.6B`.
    pub fn load(source: &str) -> Result<Self> {
        if Path::new(source).exists() {
            Self::from_file(source)
        } else {
            Self::from_pretrained(source)
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let tokenizer = Tokenizer::from_file(path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {e}", path.display()))?;
        info!(path = %path.display(), "loaded tokenizer");
        Ok(Self { tokenizer })
    }

    pub fn from_pretrained(repo: &str) -> Result<Self> {
        let tokenizer = Tokenizer::from_pretrained(repo, None)
            .map_err(|e| anyhow!("Failed to fetch tokenizer '{repo}': {e}"))?;
        info!(repo, "loaded tokenizer from hub");
        Ok(Self { tokenizer })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let tokenizer =
            Tokenizer::from_str(json).map_err(|e| anyhow!("Invalid tokenizer json: {e}"))?;
        Ok(Self { tokenizer })
    }

    pub fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }
}

impl ChatTokenizer for HfChatTokenizer {
    fn apply_chat_template(&self, messages: &[ChatMessage], add_generation_prompt: bool) -> Result<String> {
        Ok(render_chatml(messages, add_generation_prompt))
    }

    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| anyhow!("Failed to encode text: {e}"))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32], skip_special_tokens: bool) -> Result<String> {
        self.tokenizer
            .decode(ids, skip_special_tokens)
            .map_err(|e| anyhow!("Failed to decode tokens: {e}"))
    }
}
