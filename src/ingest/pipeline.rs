//! Ingestion pipeline: PDFs into both stores.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use super::chunker::{Chunk, Chunker};
use super::extractor::EntityExtractor;
use super::pdf::{self, PdfDocument};
use super::schema::ValidatedExtraction;
use crate::config::Config;
use crate::integrations::LanguageModel;
use crate::stores::{EntityStore, SemanticStore};
use crate::Result;

/// Counters for one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestionStats {
    /// PDF files found, including skipped ones
    pub pdfs: usize,
    /// PDF files that failed extraction or held no text
    pub pdfs_skipped: usize,
    pub chunks: usize,
    pub chars: usize,
    pub indexed_chunks: usize,
    pub companies: usize,
    pub persons: usize,
    pub financial_figures: usize,
    pub projects: usize,
    pub deadlines: usize,
    pub assignments: usize,
    /// Validated relationships handed to the entity store
    pub relationships: usize,
    /// Relationships the entity store could connect
    pub linked_relationships: usize,
    pub schema_skips: usize,
    /// Reason for every schema skip, for review
    pub skip_reasons: Vec<String>,
}

impl IngestionStats {
    fn add_extraction(&mut self, extraction: &ValidatedExtraction) {
        self.companies += extraction.companies.len();
        self.persons += extraction.persons.len();
        self.financial_figures += extraction.financial_figures.len();
        self.projects += extraction.projects.len();
        self.deadlines += extraction.deadlines.len();
        self.assignments += extraction.assignments.len();
        self.relationships += extraction.relationships.len();
    }

    pub fn entities(&self) -> usize {
        self.companies
            + self.persons
            + self.financial_figures
            + self.projects
            + self.deadlines
            + self.assignments
    }

    fn log(&self) {
        info!(
            pdfs = self.pdfs,
            pdfs_skipped = self.pdfs_skipped,
            chunks = self.chunks,
            chars = self.chars,
            indexed = self.indexed_chunks,
            "Document stats"
        );
        info!(
            companies = self.companies,
            persons = self.persons,
            financial_figures = self.financial_figures,
            projects = self.projects,
            deadlines = self.deadlines,
            assignments = self.assignments,
            relationships = self.relationships,
            linked = self.linked_relationships,
            schema_skips = self.schema_skips,
            "Extraction stats"
        );
    }
}

pub struct IngestionPipeline {
    entity: Arc<dyn EntityStore>,
    semantic: Arc<dyn SemanticStore>,
    extractor: EntityExtractor,
    chunker: Chunker,
}

impl IngestionPipeline {
    pub fn new(
        entity: Arc<dyn EntityStore>,
        semantic: Arc<dyn SemanticStore>,
        llm: Arc<dyn LanguageModel>,
        chunker: Chunker,
    ) -> Self {
        Self {
            entity,
            semantic,
            extractor: EntityExtractor::new(llm),
            chunker,
        }
    }

    pub fn from_config(
        config: &Config,
        entity: Arc<dyn EntityStore>,
        semantic: Arc<dyn SemanticStore>,
        llm: Arc<dyn LanguageModel>,
    ) -> Self {
        let chunker = Chunker::new(config.ingestion.chunk_size, config.ingestion.chunk_overlap);
        Self::new(entity, semantic, llm, chunker).with_timeout(config.request_timeout)
    }

    /// Upper bound for each extraction call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.extractor = self.extractor.with_timeout(timeout);
        self
    }

    /// Ingest every PDF in `dir`.
    pub async fn ingest_directory(&self, dir: &Path, fresh: bool) -> Result<IngestionStats> {
        if fresh {
            self.reset().await?;
        }
        let batch = pdf::load_pdfs(dir).await?;
        self.ingest(&batch.documents, batch.skipped.len()).await
    }

    /// Clear both stores.
    pub async fn reset(&self) -> Result<()> {
        info!("Clearing entity and semantic stores");
        self.entity.clear().await?;
        self.semantic.clear().await?;
        Ok(())
    }

    /// Chunk, index and extract already loaded documents.
    pub async fn ingest_documents(&self, documents: &[PdfDocument]) -> Result<IngestionStats> {
        self.ingest(documents, 0).await
    }

    async fn ingest(&self, documents: &[PdfDocument], skipped: usize) -> Result<IngestionStats> {
        let mut stats = IngestionStats {
            pdfs: documents.len() + skipped,
            pdfs_skipped: skipped,
            ..Default::default()
        };

        self.entity.init_schema().await?;

        let chunks: Vec<Chunk> = documents
            .iter()
            .flat_map(|doc| {
                self.chunker
                    .chunk(&doc.text, &doc.name, &doc.path.display().to_string())
            })
            .collect();
        stats.chunks = chunks.len();
        stats.chars = chunks.iter().map(|c| c.text.chars().count()).sum();

        if chunks.is_empty() {
            info!("No text to ingest");
            stats.log();
            return Ok(stats);
        }

        stats.indexed_chunks = self.semantic.index_chunks(&chunks).await?;
        info!("Indexed {} chunks", stats.indexed_chunks);

        for (i, chunk) in chunks.iter().enumerate() {
            debug!(
                document = %chunk.document,
                "Extracting from chunk {}/{}",
                i + 1,
                chunks.len()
            );

            let mut extracted = self.extractor.extract(&chunk.text).await;
            if extracted.is_empty() {
                continue;
            }
            extracted.link_financial_figures();

            let report = extracted.validate();
            stats.schema_skips += report.skipped.len();
            stats
                .skip_reasons
                .extend(report.skipped.iter().map(|err| err.to_string()));

            if report.extraction.is_empty() {
                continue;
            }
            stats.add_extraction(&report.extraction);
            let upserted = self.entity.upsert_entities(&report.extraction).await?;
            stats.linked_relationships += upserted.relationships;
        }

        stats.log();
        Ok(stats)
    }
}
