use application::rag_service::{RagService, RagSettings};
use domain::errors::StoreError;
use domain::models::{Metric, SourceDocument};
use domain::ports::{ChatTokenizer, VectorStore};
use domain::sampling::SamplingParams;
use infrastructure::corpus::builtin_corpus;
use infrastructure::vector_store::SqliteVectorStore;
use std::sync::Arc;
use tests::*;

const REPLY: &str = "Harsh enjoys ice cream, especially mint chocolate chip.";

type TestService =
    RagService<LookupEmbedder, SqliteVectorStore, Arc<WordTokenizer>, EchoGenerator>;

fn service_with(settings: RagSettings) -> (TestService, Arc<WordTokenizer>) {
    let tokenizer = Arc::new(WordTokenizer::new());
    let generator = EchoGenerator::new(REPLY, Arc::clone(&tokenizer));
    let service = RagService::new(
        LookupEmbedder::harsh(),
        SqliteVectorStore::in_memory().unwrap(),
        Arc::clone(&tokenizer),
        generator,
        settings,
    );
    (service, tokenizer)
}

fn service() -> TestService {
    service_with(RagSettings::default()).0
}

fn with_unrelated() -> Vec<SourceDocument> {
    let mut corpus = builtin_corpus();
    corpus.push(SourceDocument::new("doc4", UNRELATED));
    corpus
}

#[tokio::test]
async fn end_to_end_context_has_only_the_ice_cream_sentences() {
    let service = service();
    let answer = service.run(&builtin_corpus(), QUESTION).await.unwrap();

    let lines: Vec<&str> = answer.context.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines.contains(&ICE_CREAM));
    assert!(lines.contains(&MINT_CHIP));
    assert!(!answer.context.contains(SYSTEM_DESIGN));
    assert_eq!(answer.question, QUESTION);
    assert_eq!(answer.retrieved.len(), 2);
}

#[tokio::test]
async fn run_drops_the_collection_afterwards() {
    let service = service();
    service.run(&builtin_corpus(), QUESTION).await.unwrap();
    assert!(service.store().list_collections().unwrap().is_empty());
}

#[tokio::test]
async fn harsh_documents_rank_before_unrelated_ones() {
    let service = service();
    service.create_collection().unwrap();
    service.ingest(&with_unrelated()).await.unwrap();

    for k in 1..=3 {
        let hits = service.retrieve(QUESTION, k).await.unwrap();
        assert_eq!(hits.len(), k);
        assert!(hits.iter().all(|h| h.text.contains("Harsh")), "k={k}: {hits:?}");
    }
    let all = service.retrieve(QUESTION, 4).await.unwrap();
    assert_eq!(all.last().unwrap().text, UNRELATED);
    assert!(all.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[tokio::test]
async fn k_at_or_above_corpus_size_returns_every_document() {
    let service = service();
    service.create_collection().unwrap();
    service.ingest(&builtin_corpus()).await.unwrap();

    for k in [3, 4, 10] {
        let hits = service.retrieve(QUESTION, k).await.unwrap();
        let mut texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        texts.sort_unstable();
        let mut expected = vec![ICE_CREAM, MINT_CHIP, SYSTEM_DESIGN];
        expected.sort_unstable();
        assert_eq!(texts, expected);
    }
}

#[tokio::test]
async fn ingest_embeds_the_corpus_in_one_call() {
    let service = service();
    service.create_collection().unwrap();
    service.ingest(&builtin_corpus()).await.unwrap();
    assert_eq!(service.embedder().calls(), 1);
    assert_eq!(service.store().count("xyz").unwrap(), 3);
}

#[tokio::test]
async fn duplicate_ids_fail_and_leave_the_collection_unchanged() {
    let service = service();
    service.create_collection().unwrap();
    service.ingest(&builtin_corpus()).await.unwrap();

    let again = vec![SourceDocument::new("doc1", UNRELATED)];
    let err = service.ingest(&again).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<StoreError>(),
        Some(StoreError::DuplicateId { id, .. }) if id == "doc1"
    ));
    assert_eq!(service.store().count("xyz").unwrap(), 3);
    let hits = service.retrieve(QUESTION, 3).await.unwrap();
    assert!(hits.iter().all(|h| h.text != UNRELATED));
}

#[tokio::test]
async fn failed_run_still_drops_the_collection() {
    let service = service();
    let corpus = vec![
        SourceDocument::new("doc1", ICE_CREAM),
        SourceDocument::new("doc1", MINT_CHIP),
    ];
    let err = service.run(&corpus, QUESTION).await.unwrap_err();
    assert!(err.downcast_ref::<StoreError>().is_some());
    assert!(service.store().list_collections().unwrap().is_empty());
}

#[tokio::test]
async fn embedding_failures_propagate() {
    let service = service();
    let corpus = vec![SourceDocument::new("doc1", "never embedded")];
    let err = service.run(&corpus, QUESTION).await.unwrap_err();
    assert!(format!("{err:#}").contains("Failed to embed documents"));
}

#[tokio::test]
async fn answer_excludes_the_prompt() {
    let service = service();
    let answer = service.run(&builtin_corpus(), QUESTION).await.unwrap();

    assert_eq!(answer.answer, REPLY);
    assert!(!answer.answer.contains("Answer this question"));
    assert!(!answer.answer.contains("Context:"));
    assert!(!answer.answer.contains("<|im_end|>"));
}

#[tokio::test]
async fn generate_uses_the_configured_sampling() {
    let settings = RagSettings {
        sampling: SamplingParams::default().with_seed(1234),
        ..RagSettings::default()
    };
    let tokenizer = Arc::new(WordTokenizer::new());
    let generator = EchoGenerator::new(REPLY, Arc::clone(&tokenizer));
    let service = RagService::new(
        LookupEmbedder::harsh(),
        SqliteVectorStore::in_memory().unwrap(),
        Arc::clone(&tokenizer),
        generator,
        settings,
    );

    service.generate("first").await.unwrap();
    service.generate("second").await.unwrap();

    let seen = service.generator().seen();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|p| p.seed == Some(1234)));
    assert_eq!(seen[0], seen[1]);
    assert_eq!(seen[0].max_new_tokens, 512);
    assert_eq!(seen[0].top_k, 20);
}

#[tokio::test]
async fn generator_returning_too_few_tokens_is_an_error() {
    let tokenizer = Arc::new(WordTokenizer::new());
    let service = RagService::new(
        LookupEmbedder::harsh(),
        SqliteVectorStore::in_memory().unwrap(),
        tokenizer,
        TruncatingGenerator,
        RagSettings::default(),
    );
    let err = service.generate("What does Harsh like?").await.unwrap_err();
    assert!(err.to_string().contains("fewer than"));
}

#[tokio::test]
async fn metric_setting_reaches_the_store() {
    let (service, _) = service_with(RagSettings {
        collection: "l2-notes".into(),
        metric: Metric::L2,
        ..RagSettings::default()
    });
    service.create_collection().unwrap();
    service.ingest(&builtin_corpus()).await.unwrap();
    let hits = service.retrieve(QUESTION, 1).await.unwrap();
    assert_eq!(hits.len(), 1);
    // With L2 the distance is squared euclidean, not 1 - cos.
    assert!(hits[0].distance > 0.0);
    service.delete_collection().unwrap();
}

#[tokio::test]
async fn empty_corpus_answers_from_empty_context() {
    let service = service();
    let answer = service.run(&[], QUESTION).await.unwrap();
    assert!(answer.context.is_empty());
    assert!(answer.retrieved.is_empty());
    assert_eq!(answer.answer, REPLY);
}

#[tokio::test]
async fn prompt_is_sent_as_a_single_chatml_user_turn() {
    let (service, tokenizer) = service_with(RagSettings::default());
    service.run(&builtin_corpus(), QUESTION).await.unwrap();

    let inputs = service.generator().inputs();
    assert_eq!(inputs.len(), 1);
    let rendered = tokenizer.decode(&inputs[0], false).unwrap();
    assert!(rendered.starts_with("<|im_start|> user Answer this question"));
    assert!(rendered.ends_with("<|im_end|> <|im_start|> assistant"));
    assert_eq!(rendered.matches("<|im_start|>").count(), 2);
    assert!(rendered.contains("Question: What does Harsh like?"));
}

#[tokio::test]
async fn question_embedding_must_be_a_single_vector() {
    let store = SqliteVectorStore::in_memory().unwrap();
    store.create_collection("xyz", Metric::Cosine).unwrap();
    store
        .add("xyz", &["doc1".to_string()], &[vec![1.0, 0.0]], &[ICE_CREAM.to_string()])
        .unwrap();
    let tokenizer = Arc::new(WordTokenizer::new());
    let service = RagService::new(
        SurplusEmbedder,
        store,
        Arc::clone(&tokenizer),
        EchoGenerator::new(REPLY, tokenizer),
        RagSettings::default(),
    );

    let err = service.retrieve(QUESTION, 2).await.unwrap_err();
    assert!(err.to_string().contains("expected 1"));
}
