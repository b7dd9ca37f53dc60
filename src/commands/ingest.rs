//! `ingest` command: PDFs into the entity and semantic stores.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use super::Services;
use crate::config::Config;
use crate::ingest::{IngestionPipeline, IngestionStats};

/// Human-readable summary printed after ingestion.
pub fn summary(stats: &IngestionStats) -> String {
    let mut lines = vec![
        format!(
            "Ingested {} of {} PDF(s): {} chunks, {} characters, {} indexed",
            stats.pdfs.saturating_sub(stats.pdfs_skipped),
            stats.pdfs,
            stats.chunks,
            stats.chars,
            stats.indexed_chunks
        ),
        format!(
            "Entities: {} companies, {} persons, {} financial figures, {} projects, {} deadlines, {} assignments",
            stats.companies,
            stats.persons,
            stats.financial_figures,
            stats.projects,
            stats.deadlines,
            stats.assignments
        ),
        format!(
            "Relationships: {} extracted, {} linked, {} skipped",
            stats.relationships, stats.linked_relationships, stats.schema_skips
        ),
    ];
    lines.extend(stats.skip_reasons.iter().map(|r| format!("  skipped: {r}")));
    lines.join("\n")
}

/// Run the ingestion pipeline over `dir` (or the configured directory).
pub async fn run(
    config: &Config,
    services: &Services,
    dir: Option<PathBuf>,
    fresh: bool,
) -> Result<IngestionStats> {
    let dir = dir.unwrap_or_else(|| PathBuf::from(&config.ingestion.pdf_directory));
    info!(dir = %dir.display(), fresh, "Starting ingestion");

    let pipeline = IngestionPipeline::from_config(
        config,
        services.entity.clone(),
        services.semantic.clone(),
        services.llm.clone(),
    );
    let stats = pipeline
        .ingest_directory(&dir, fresh)
        .await
        .with_context(|| format!("ingestion of {} failed", dir.display()))?;

    println!("{}", summary(&stats));
    Ok(stats)
}
