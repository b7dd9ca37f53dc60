//! Integration tests for corporate_rag
//!
//! These tests drive the router end to end over the in-memory stores.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use corporate_rag::{
    config::RetrievalConfig,
    error::{Error, Result},
    ingest::{Chunk, ExtractionResult, ValidatedExtraction},
    router::{dedup, EvidenceItem, EvidenceSource, Provenance, Question, Router, Strategy},
    stores::{
        ChunkHit, EntityPattern, EntityRecord, EntityStore, MemoryGraph, MemoryIndex,
        SemanticStore, UpsertStats,
    },
    LanguageModel,
};

// ============================================================================
// Test doubles
// ============================================================================

/// Replies with the evidence lines of the prompt, or a fixed sentence when
/// the prompt carries none.
struct EvidenceEcho {
    calls: AtomicUsize,
}

impl EvidenceEcho {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl LanguageModel for EvidenceEcho {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let evidence: Vec<&str> = prompt.lines().filter(|l| l.starts_with('[')).collect();
        if evidence.is_empty() {
            Ok("From general knowledge: it depends.".to_string())
        } else {
            Ok(evidence.join("\n"))
        }
    }

    fn name(&self) -> &str {
        "evidence-echo"
    }
}

struct FailingModel;

#[async_trait]
impl LanguageModel for FailingModel {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        Err(Error::LlmError("Gemini error 503".to_string()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

struct HangingModel;

#[async_trait]
impl LanguageModel for HangingModel {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok("too late".to_string())
    }

    fn name(&self) -> &str {
        "hanging"
    }
}

/// Semantic store that never answers in time.
struct StalledIndex;

#[async_trait]
impl SemanticStore for StalledIndex {
    async fn search(&self, _query: &str, _top_k: usize, _min_score: f32) -> Result<Vec<ChunkHit>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Vec::new())
    }

    async fn index_chunks(&self, chunks: &[Chunk]) -> Result<usize> {
        Ok(chunks.len())
    }

    async fn clear(&self) -> Result<()> {
        Ok(())
    }
}

/// Semantic store whose connection is gone.
struct DownIndex;

#[async_trait]
impl SemanticStore for DownIndex {
    async fn search(&self, _query: &str, _top_k: usize, _min_score: f32) -> Result<Vec<ChunkHit>> {
        Err(Error::VectorError("connection refused".to_string()))
    }

    async fn index_chunks(&self, _chunks: &[Chunk]) -> Result<usize> {
        Err(Error::VectorError("connection refused".to_string()))
    }

    async fn clear(&self) -> Result<()> {
        Ok(())
    }
}

/// Entity store that never answers in time.
struct StalledGraph;

#[async_trait]
impl EntityStore for StalledGraph {
    async fn query_entities(
        &self,
        _pattern: &EntityPattern,
        _limit: usize,
    ) -> Result<Vec<EntityRecord>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Vec::new())
    }

    async fn upsert_entities(&self, _extraction: &ValidatedExtraction) -> Result<UpsertStats> {
        Ok(UpsertStats::default())
    }

    async fn init_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        Ok(())
    }
}

/// Entity store whose connection is gone.
struct DownGraph;

#[async_trait]
impl EntityStore for DownGraph {
    async fn query_entities(
        &self,
        _pattern: &EntityPattern,
        _limit: usize,
    ) -> Result<Vec<EntityRecord>> {
        Err(Error::GraphError("connection refused".to_string()))
    }

    async fn upsert_entities(&self, _extraction: &ValidatedExtraction) -> Result<UpsertStats> {
        Err(Error::GraphError("connection refused".to_string()))
    }

    async fn init_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

const BRIEF_EXTRACTION: &str = r#"{
  "projects": [{"name": "internship", "description": "AI for Social Impact dashboard"}],
  "deadlines": [{"date": "July 20th, 2025", "context": "submit by Saturday, July 20th", "project": "internship"}],
  "companies": [{"name": "Apple Inc.", "ticker": "AAPL", "industry": "Technology"}],
  "people": [{"name": "Tim Cook", "title": "CEO"}],
  "relationships": [
    {"source_entity_name": "internship", "source_entity_type": "Project",
     "relationship_type": "HAS_DEADLINE",
     "target_entity_name": "July 20th, 2025", "target_entity_type": "Deadline",
     "context": "submit by Saturday, July 20th"},
    {"source_entity_name": "Apple Inc.", "source_entity_type": "Company",
     "relationship_type": "HAS_CEO",
     "target_entity_name": "Tim Cook", "target_entity_type": "Person",
     "context": "Tim Cook is the CEO of Apple."}
  ]
}"#;

const LANGUAGE_CHUNK: &str =
    "Which language should be used to build the system? The system should be built in Python.";

async fn populated_graph() -> Arc<MemoryGraph> {
    let graph = Arc::new(MemoryGraph::new());
    let extraction: ExtractionResult = serde_json::from_str(BRIEF_EXTRACTION).unwrap();
    let report = extraction.validate();
    assert!(report.skipped.is_empty());
    graph.upsert_entities(&report.extraction).await.unwrap();
    graph
}

async fn populated_index() -> Arc<MemoryIndex> {
    let index = Arc::new(MemoryIndex::with_local(4096));
    let chunks = vec![
        Chunk::new(LANGUAGE_CHUNK.to_string(), 0, "brief.pdf", "data/raw_pdfs/brief.pdf"),
        Chunk::new(LANGUAGE_CHUNK.to_string(), 0, "brief_copy.pdf", "data/raw_pdfs/brief_copy.pdf"),
        Chunk::new(
            "Quarterly revenue grew strongly across European markets.".to_string(),
            0,
            "report.pdf",
            "data/raw_pdfs/report.pdf",
        ),
    ];
    index.index_chunks(&chunks).await.unwrap();
    index
}

fn router(
    graph: Arc<dyn EntityStore>,
    index: Arc<dyn SemanticStore>,
    llm: Arc<dyn LanguageModel>,
    timeout: Duration,
) -> Router {
    Router::new(graph, index, llm, RetrievalConfig::default(), timeout)
}

// ============================================================================
// Routing scenarios
// ============================================================================

#[tokio::test]
async fn test_deadline_question_is_answered_from_graph() {
    let router = router(
        populated_graph().await,
        populated_index().await,
        EvidenceEcho::new(),
        Duration::from_secs(5),
    );

    let answer = router
        .answer(&Question::new(
            "What is the submission deadline for the internship project?",
        ))
        .await
        .unwrap();

    assert_eq!(answer.strategy(), Strategy::Graph);
    assert!(answer.text().contains("July 20th, 2025"));
    assert!(answer.evidence().iter().any(|e| {
        e.source == EvidenceSource::Graph
            && e.content.starts_with("Deadline")
            && matches!(e.provenance, Some(Provenance::GraphNode { .. }))
    }));
}

#[tokio::test]
async fn test_language_question_is_answered_from_one_chunk() {
    let router = router(
        populated_graph().await,
        populated_index().await,
        EvidenceEcho::new(),
        Duration::from_secs(5),
    );

    let answer = router
        .answer(&Question::new("Which language should be used to build the system?"))
        .await
        .unwrap();

    assert_eq!(answer.strategy(), Strategy::Vector);
    assert_eq!(answer.evidence().len(), 1);
    assert!(answer.evidence()[0].content.contains("Python"));
    assert!(answer.text().contains("Python"));
}

#[tokio::test]
async fn test_matching_entity_never_falls_back() {
    let router = router(
        populated_graph().await,
        populated_index().await,
        EvidenceEcho::new(),
        Duration::from_secs(5),
    );

    for question in [
        "Who is the CEO of Apple?",
        "Tell me about the internship",
        "How should the internship dashboard be presented?",
    ] {
        let answer = router.answer(&Question::new(question)).await.unwrap();
        assert!(
            matches!(answer.strategy(), Strategy::Graph | Strategy::GraphAndVector),
            "{question} -> {}",
            answer.strategy()
        );
    }
}

#[tokio::test]
async fn test_no_evidence_falls_back_to_llm() {
    let llm = EvidenceEcho::new();
    let router = router(
        populated_graph().await,
        populated_index().await,
        llm.clone(),
        Duration::from_secs(5),
    );

    let answer = router
        .answer(&Question::new("What is the capital of Mongolia?"))
        .await
        .unwrap();

    assert_eq!(answer.strategy(), Strategy::LlmFallback);
    assert!(answer.evidence().is_empty());
    assert!(answer.is_fallback());
    assert_eq!(answer.text(), "From general knowledge: it depends.");
    assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_keyword_inside_longer_word_does_not_skip_semantic_search() {
    let index = populated_index().await;
    index
        .index_chunks(&[Chunk::new(
            "The team day off is Friday, August 1st.".to_string(),
            0,
            "calendar.pdf",
            "data/raw_pdfs/calendar.pdf",
        )])
        .await
        .unwrap();
    let router = router(
        populated_graph().await,
        index,
        EvidenceEcho::new(),
        Duration::from_secs(5),
    );

    let answer = router
        .answer(&Question::new("When is the team day off?"))
        .await
        .unwrap();

    assert_eq!(answer.strategy(), Strategy::Vector);
    assert!(answer
        .evidence()
        .iter()
        .all(|e| e.source == EvidenceSource::Vector));
    assert!(answer.evidence()[0].content.contains("Friday, August 1st"));
}

#[tokio::test]
async fn test_empty_question_is_rejected_without_llm_call() {
    let llm = EvidenceEcho::new();
    let router = router(
        populated_graph().await,
        populated_index().await,
        llm.clone(),
        Duration::from_secs(5),
    );

    let err = router.answer(&Question::new(" \n\t ")).await.unwrap_err();

    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Failure handling
// ============================================================================

#[tokio::test]
async fn test_semantic_store_timeout_still_answers() {
    let router = router(
        populated_graph().await,
        Arc::new(StalledIndex),
        EvidenceEcho::new(),
        Duration::from_millis(200),
    );

    let answer = router
        .answer(&Question::new("How should the internship dashboard be presented?"))
        .await
        .unwrap();

    assert_eq!(answer.strategy(), Strategy::Graph);
}

#[tokio::test]
async fn test_semantic_store_timeout_without_graph_falls_back() {
    let router = router(
        Arc::new(MemoryGraph::new()),
        Arc::new(StalledIndex),
        EvidenceEcho::new(),
        Duration::from_millis(200),
    );

    let answer = router
        .answer(&Question::new("Which language should be used?"))
        .await
        .unwrap();

    assert_eq!(answer.strategy(), Strategy::LlmFallback);
}

#[tokio::test]
async fn test_semantic_store_error_is_recovered() {
    let router = router(
        populated_graph().await,
        Arc::new(DownIndex),
        EvidenceEcho::new(),
        Duration::from_secs(5),
    );

    let answer = router.answer(&Question::new("internship")).await.unwrap();

    assert_eq!(answer.strategy(), Strategy::Graph);
}

#[tokio::test]
async fn test_entity_store_error_falls_through_to_vector() {
    let router = router(
        Arc::new(DownGraph),
        populated_index().await,
        EvidenceEcho::new(),
        Duration::from_secs(5),
    );

    let answer = router
        .answer(&Question::new("Which language should be used to build the system?"))
        .await
        .unwrap();

    assert_eq!(answer.strategy(), Strategy::Vector);
    assert!(answer.text().contains("Python"));
}

#[tokio::test]
async fn test_entity_store_timeout_on_factual_question_falls_through_to_vector() {
    let router = router(
        Arc::new(StalledGraph),
        populated_index().await,
        EvidenceEcho::new(),
        Duration::from_millis(200),
    );

    let answer = router
        .answer(&Question::new("What language is the system built in?"))
        .await
        .unwrap();

    assert_eq!(answer.strategy(), Strategy::Vector);
    assert!(answer.evidence()[0].content.contains("Python"));
}

#[tokio::test]
async fn test_entity_store_failure_without_chunks_falls_back() {
    for graph in [Arc::new(DownGraph) as Arc<dyn EntityStore>, Arc::new(StalledGraph)] {
        let router = router(
            graph,
            populated_index().await,
            EvidenceEcho::new(),
            Duration::from_millis(200),
        );

        let answer = router
            .answer(&Question::new("Who is the CEO of Apple?"))
            .await
            .unwrap();

        assert_eq!(answer.strategy(), Strategy::LlmFallback);
        assert!(answer.evidence().is_empty());
    }
}

#[tokio::test]
async fn test_llm_failure_is_a_synthesis_error() {
    let router = router(
        populated_graph().await,
        populated_index().await,
        Arc::new(FailingModel),
        Duration::from_secs(5),
    );

    let err = router
        .answer(&Question::new("When is the internship deadline?"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Synthesis(_)));
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn test_llm_timeout_is_a_synthesis_error() {
    let router = router(
        Arc::new(MemoryGraph::new()),
        Arc::new(MemoryIndex::with_local(64)),
        Arc::new(HangingModel),
        Duration::from_millis(200),
    );

    let err = router
        .answer(&Question::new("What is RAG?"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Synthesis(_)));
    assert!(err.to_string().contains("timed out"));
}

// ============================================================================
// Deduplication
// ============================================================================

fn chunk_item(content: &str, score: f32) -> EvidenceItem {
    EvidenceItem {
        source: EvidenceSource::Vector,
        content: content.to_string(),
        score: Some(score),
        provenance: None,
    }
}

#[test]
fn test_identical_chunks_keep_the_best_score() {
    let items = vec![
        chunk_item("The system must be built in Python.", 0.9),
        chunk_item("The system must be built in Python.", 0.95),
    ];

    let kept = dedup(items, 0.9);

    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].score, Some(0.95));
}

#[test]
fn test_dedup_is_idempotent() {
    let items = vec![
        chunk_item("Submit the internship project by July 20th", 0.5),
        chunk_item("submit the internship project by july 20th", 0.7),
        chunk_item("Use Python and FastAPI", 0.6),
        chunk_item("Tim Cook is the CEO of Apple", 0.4),
    ];

    let once = dedup(items.clone(), 0.9);
    let twice = dedup(once.clone(), 0.9);

    assert_eq!(once.len(), 3);
    assert!(once.len() <= items.len());
    assert_eq!(once, twice);
}

// ============================================================================
// Error type
// ============================================================================

#[test]
fn test_result_type_alias() {
    fn returns_result() -> Result<i32> {
        Ok(42)
    }
    assert_eq!(returns_result().unwrap(), 42);
}
