use anyhow::Context;
use domain::models::SourceDocument;
use serde::Deserialize;
use shared::types::Result;
use std::collections::HashSet;
use std::path::Path;

pub const DEFAULT_QUESTION: &str = "What does Harsh like? Explain in detail.";

/// The three-sentence demo corpus, ids `doc1`..`doc3`.
pub fn builtin_corpus() -> Vec<SourceDocument> {
    [
        "Harsh likes ice cream.",
        "Harsh likes mint chocolate chip ice cream.",
        "Harsh likes system design.",
    ]
    .into_iter()
    .enumerate()
    .map(|(idx, text)| SourceDocument::new(format!("doc{}", idx + 1), text))
    .collect()
}

#[derive(Deserialize)]
struct CorpusFile {
    documents: Vec<CorpusEntry>,
}

#[derive(Deserialize)]
struct CorpusEntry {
    id: Option<String>,
    text: String,
}

/// Read a JSON corpus: `{"documents": [{"id": "...", "text": "..."}]}`.
///
/// Missing ids become `doc{n}` (1-based position).
pub fn load_corpus(path: impl AsRef<Path>) -> Result<Vec<SourceDocument>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read corpus file {}", path.display()))?;
    parse_corpus(&raw).with_context(|| format!("Invalid corpus file {}", path.display()))
}

pub fn parse_corpus(raw: &str) -> Result<Vec<SourceDocument>> {
    let file: CorpusFile = serde_json::from_str(raw)?;
    let documents: Vec<SourceDocument> = file
        .documents
        .into_iter()
        .enumerate()
        .map(|(idx, entry)| SourceDocument {
            id: entry.id.unwrap_or_else(|| format!("doc{}", idx + 1)),
            text: entry.text,
        })
        .collect();

    let mut seen = HashSet::new();
    for doc in &documents {
        if !seen.insert(doc.id.as_str()) {
            anyhow::bail!("duplicate document id '{}'", doc.id);
        }
    }
    Ok(documents)
}
