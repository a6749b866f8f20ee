pub mod config;
pub mod corpus;
pub mod embedder;
pub mod generator;
pub mod ollama_client;
pub mod search;
pub mod tokenizer;
pub mod vector_store;
