use serde::{Deserialize, Serialize};
use shared::types::Result;

/// Decoding parameters handed to the generator.
///
/// Sampling is stochastic; runs are only reproducible when `seed` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingParams {
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub seed: Option<u64>,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 512,
            temperature: 0.7,
            top_p: 0.8,
            top_k: 20,
            seed: None,
        }
    }
}

impl SamplingParams {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_new_tokens == 0 {
            anyhow::bail!("max_new_tokens must be at least 1");
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            anyhow::bail!("temperature must be a non-negative number, got {}", self.temperature);
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            anyhow::bail!("top_p must be in (0, 1], got {}", self.top_p);
        }
        if self.top_k == 0 {
            anyhow::bail!("top_k must be at least 1");
        }
        Ok(())
    }
}
