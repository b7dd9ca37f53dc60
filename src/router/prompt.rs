//! Prompt assembly for synthesis and fallback

use crate::prompts::{self, Prompt};

use super::evidence::{EvidenceItem, Question};

/// Numbered evidence block, one item per line.
pub fn format_evidence(evidence: &[EvidenceItem]) -> String {
    evidence
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let origin = item
                .provenance
                .as_ref()
                .map(|p| format!(" ({p})"))
                .unwrap_or_default();
            format!(
                "[{}] ({}){} {}",
                i + 1,
                item.source.as_str(),
                origin,
                item.content.replace('\n', " ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn synthesis_prompt(question: &Question, evidence: &[EvidenceItem]) -> String {
    let template = Prompt::Synthesis.load_or_default();
    prompts::render(
        &template,
        &[
            ("question", question.text().trim()),
            ("evidence", &format_evidence(evidence)),
        ],
    )
}

pub fn fallback_prompt(question: &Question) -> String {
    let template = Prompt::Fallback.load_or_default();
    prompts::render(&template, &[("question", question.text().trim())])
}
