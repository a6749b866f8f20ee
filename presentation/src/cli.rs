use application::rag_service::{RagService, RagSettings};
use clap::{ArgAction, Parser};
use colored::Colorize;
use domain::models::{Metric, RagAnswer};
use infrastructure::config::Config;
use infrastructure::corpus::{builtin_corpus, load_corpus};
use infrastructure::embedder::OllamaEmbedder;
use infrastructure::generator::OllamaGenerator;
use infrastructure::ollama_client::OllamaClient;
use infrastructure::tokenizer::HfChatTokenizer;
use infrastructure::vector_store::SqliteVectorStore;
use shared::input::ask_question;
use shared::types::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

type OllamaRagService = RagService<
    OllamaEmbedder,
    SqliteVectorStore,
    Arc<HfChatTokenizer>,
    OllamaGenerator<HfChatTokenizer>,
>;

/// Answer a question from a small document corpus with a local Ollama server.
#[derive(Parser, Debug, Default)]
#[command(name = "mini_rag")]
#[command(about = "Minimal retrieval-augmented generation over a small corpus", long_about = None)]
pub struct Cli {
    /// Number of documents to retrieve as context
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// JSON corpus file: {"documents": [{"id": "...", "text": "..."}]}
    #[arg(long)]
    pub corpus: Option<PathBuf>,

    /// Name of the temporary collection
    #[arg(long)]
    pub collection: Option<String>,

    /// SQLite file backing the vector store (in memory when omitted)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Similarity metric: cosine, l2 or ip
    #[arg(long)]
    pub metric: Option<Metric>,

    /// Fix the sampling seed for reproducible answers
    #[arg(long)]
    pub seed: Option<u64>,

    #[arg(long)]
    pub max_new_tokens: Option<u32>,

    #[arg(long)]
    pub temperature: Option<f32>,

    #[arg(long)]
    pub top_p: Option<f32>,

    /// Top-k cutoff while sampling tokens
    #[arg(long = "sampling-top-k")]
    pub sampling_top_k: Option<u32>,

    /// Ollama embedding model
    #[arg(long)]
    pub embed_model: Option<String>,

    /// Ollama generation model
    #[arg(long)]
    pub model: Option<String>,

    /// tokenizer.json path or HuggingFace repo id
    #[arg(long)]
    pub tokenizer: Option<String>,

    #[arg(long)]
    pub ollama_url: Option<String>,

    /// Ask for the question on the terminal
    #[arg(short, long, action = ArgAction::SetTrue)]
    pub interactive: bool,

    /// Disable colored output
    #[arg(long, action = ArgAction::SetTrue)]
    pub no_color: bool,

    /// The question (defaults to the configured one)
    #[arg(value_parser, trailing_var_arg = true)]
    pub question: Vec<String>,
}

impl Cli {
    /// Layer the flags that were given on top of `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(top_k) = self.top_k {
            config.top_k = top_k;
        }
        if let Some(corpus) = &self.corpus {
            config.corpus_path = Some(corpus.clone());
        }
        if let Some(collection) = &self.collection {
            config.collection = collection.clone();
        }
        if let Some(db) = &self.db {
            config.db_path = Some(db.clone());
        }
        if let Some(metric) = self.metric {
            config.metric = metric;
        }
        if let Some(seed) = self.seed {
            config.sampling.seed = Some(seed);
        }
        if let Some(max_new_tokens) = self.max_new_tokens {
            config.sampling.max_new_tokens = max_new_tokens;
        }
        if let Some(temperature) = self.temperature {
            config.sampling.temperature = temperature;
        }
        if let Some(top_p) = self.top_p {
            config.sampling.top_p = top_p;
        }
        if let Some(top_k) = self.sampling_top_k {
            config.sampling.top_k = top_k;
        }
        if let Some(model) = &self.embed_model {
            config.embed_model = model.clone();
        }
        if let Some(model) = &self.model {
            config.generation_model = model.clone();
        }
        if let Some(tokenizer) = &self.tokenizer {
            config.tokenizer = tokenizer.clone();
        }
        if let Some(url) = &self.ollama_url {
            config.ollama_base_url = url.clone();
        }
    }

    fn inline_question(&self) -> Option<String> {
        let joined = self.question.join(" ");
        let trimmed = joined.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

pub fn settings_from(config: &Config) -> RagSettings {
    RagSettings {
        collection: config.collection.clone(),
        metric: config.metric,
        top_k: config.top_k,
        sampling: config.sampling.clone(),
    }
}

pub struct CliApp {
    config: Config,
}

impl CliApp {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn run(&mut self, cli: Cli) -> Result<()> {
        if cli.no_color {
            colored::control::set_override(false);
        }
        cli.apply(&mut self.config);
        self.config.validate()?;

        let question = self.resolve_question(&cli)?;
        let corpus = match &self.config.corpus_path {
            Some(path) => load_corpus(path)?,
            None => builtin_corpus(),
        };

        println!("\n{}", "Question:".green().bold());
        println!("{}", question);

        let service = self.build_service()?;
        info!(
            documents = corpus.len(),
            top_k = self.config.top_k,
            model = %self.config.generation_model,
            "running pipeline"
        );
        let answer = service.run(&corpus, &question).await?;
        print_answer(&answer);
        Ok(())
    }

    fn resolve_question(&self, cli: &Cli) -> Result<String> {
        if let Some(question) = cli.inline_question() {
            return Ok(question);
        }
        if cli.interactive {
            return ask_question(&self.config.question);
        }
        Ok(self.config.question.clone())
    }

    fn build_service(&self) -> Result<OllamaRagService> {
        let client = OllamaClient::new(self.config.ollama_base_url.clone());
        let tokenizer = Arc::new(HfChatTokenizer::load(&self.config.tokenizer)?);
        let store = match &self.config.db_path {
            Some(path) => SqliteVectorStore::new(path)?,
            None => SqliteVectorStore::in_memory()?,
        };
        let embedder = OllamaEmbedder::new(client.clone(), self.config.embed_model.clone());
        let generator = OllamaGenerator::new(
            client,
            self.config.generation_model.clone(),
            Arc::clone(&tokenizer),
        );
        Ok(RagService::new(
            embedder,
            store,
            tokenizer,
            generator,
            settings_from(&self.config),
        ))
    }
}

fn print_answer(answer: &RagAnswer) {
    println!("\n{}", "Retrieved Context:".green().bold());
    println!("{}", answer.context);
    println!("\n{}", "RAG Answer:".green().bold());
    println!("{}", answer.answer);
}
