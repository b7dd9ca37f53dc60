//! Document ingestion
//!
//! PDF text is split into chunks for the semantic store; the same chunks go
//! through LLM extraction, schema validation and upsert into the entity store.

pub mod chunker;
pub mod extractor;
pub mod pdf;
pub mod pipeline;
pub mod schema;

pub use chunker::{Chunk, Chunker};
pub use extractor::EntityExtractor;
pub use pdf::{PdfBatch, PdfDocument};
pub use pipeline::{IngestionPipeline, IngestionStats};
pub use schema::{ExtractionReport, ExtractionResult, ValidatedExtraction};
