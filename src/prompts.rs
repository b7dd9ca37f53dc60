//! Prompt templates loaded from files.
//!
//! Templates live in the `prompts/` directory at the project root. A missing
//! file falls back to the built-in template, so the binary works without it.

use std::path::PathBuf;

use tracing::debug;

use crate::{Error, Result};

const SYNTHESIS_TEMPLATE: &str = "You are a corporate intelligence analyst.
Answer the question using only the numbered evidence below. Prefer structured
facts from the knowledge graph over document excerpts when they disagree.
If the evidence does not contain the answer, say that the information is not
available in the documents.

Question: {question}

Evidence:
{evidence}

Answer:";

const FALLBACK_TEMPLATE: &str = "You are a helpful corporate intelligence assistant.
No internal documents matched this question. Answer briefly from general
knowledge and state clearly when you are unsure.

Question: {question}

Answer:";

const EXTRACTION_TEMPLATE: &str = r#"You are an expert at extracting structured information from business text.
Extract key entities:
  - persons: {"name", "title"}
  - companies: {"name", "ticker", "industry"}
  - financial_figures: {"metric", "value", "unit", "year"}
  - projects: {"name", "description"}
  - deadlines: {"date", "context", "project"}
  - assignments: {"assignee", "task", "project"}
  - relationships: {"source_entity_name", "source_entity_type", "relationship_type",
    "target_entity_name", "target_entity_type", "context"}

Allowed relationship types: HAS_CEO (Company -> Person), REPORTS_REVENUE,
REPORTS_NET_INCOME and HAS_FINANCIAL_FIGURE (Company -> FinancialFigure, target
name is the figure value, context is the year), IS_COMPETITOR_OF
(Company -> Company), HAS_DEADLINE (Project -> Deadline, target name is the
date), ASSIGNED_TO (Assignment -> Person, source name is the task).

Use 'N/A' if details like ticker or industry are unavailable.
If a deadline is given like "submit by July 20th", extract the date and quote
that line as context.
Respond with a single JSON object with exactly these list keys and nothing else.

Text:
{text}"#;

/// Available prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    /// Answer from retrieved evidence.
    Synthesis,
    /// Answer without evidence.
    Fallback,
    /// Entity and relationship extraction (JSON).
    Extraction,
}

impl Prompt {
    /// Prompt file name (Markdown).
    pub fn filename(&self) -> &'static str {
        match self {
            Prompt::Synthesis => "synthesis.md",
            Prompt::Fallback => "fallback.md",
            Prompt::Extraction => "extraction.md",
        }
    }

    pub fn builtin(&self) -> &'static str {
        match self {
            Prompt::Synthesis => SYNTHESIS_TEMPLATE,
            Prompt::Fallback => FALLBACK_TEMPLATE,
            Prompt::Extraction => EXTRACTION_TEMPLATE,
        }
    }

    /// Load the prompt from its file.
    pub fn load(&self) -> Result<String> {
        load_prompt(self.filename())
    }

    /// File contents, or the built-in template when the file is missing or empty.
    pub fn load_or_default(&self) -> String {
        match self.load() {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => self.builtin().to_string(),
            Err(err) => {
                debug!("Using built-in {:?} prompt ({err})", self);
                self.builtin().to_string()
            }
        }
    }
}

/// Replace `{name}` placeholders in a template.
///
/// Single pass over the template: substituted values are never scanned again,
/// so a value that itself contains `{name}` stays as written.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let name = &after[..close];
            vars.iter()
                .find(|(var, _)| *var == name)
                .map(|(_, value)| (*value, close))
        });
        match value {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Load a prompt by file name.
pub fn load_prompt(filename: &str) -> Result<String> {
    let path = prompts_dir().join(filename);
    std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Failed to load prompt {}: {}", filename, e)))
}

/// Path to the prompts directory.
pub fn prompts_dir() -> PathBuf {
    let candidates = [
        PathBuf::from("prompts"),
        PathBuf::from("../prompts"),
        PathBuf::from("../../prompts"),
    ];

    for path in candidates {
        if path.exists() {
            return path;
        }
    }

    PathBuf::from("prompts")
}
