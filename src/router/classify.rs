//! Question classification
//!
//! Decides whether a question asks for a structured fact (graph lookup) or an
//! open-ended explanation (semantic search), and builds the entity pattern
//! used for the graph lookup either way.

use std::collections::BTreeSet;

use crate::stores::models::{tokenize, EntityPattern, EntityType};

/// Broad category of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Names a fact held in the graph: who, when, how much.
    Factual,
    /// Asks for explanation or guidance found in document text.
    Semantic,
    /// No clear signal; both stores are consulted.
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Factual => "factual",
            Intent::Semantic => "semantic",
            Intent::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub intent: Intent,
    /// Margin between the two signals, in `[0, 1]`
    pub confidence: f32,
    pub pattern: EntityPattern,
}

/// Pure question classifier. Must not block or perform I/O.
pub trait IntentClassifier: Send + Sync {
    fn classify(&self, question: &str) -> Classification;
}

/// Words that point at an entity label, with the labels to search.
const ENTITY_TRIGGERS: &[(&str, &[EntityType])] = &[
    ("company", &[EntityType::Company]),
    ("companies", &[EntityType::Company]),
    ("competitor", &[EntityType::Company]),
    ("competitors", &[EntityType::Company]),
    ("ticker", &[EntityType::Company]),
    ("industry", &[EntityType::Company]),
    ("ceo", &[EntityType::Company, EntityType::Person]),
    ("cfo", &[EntityType::Company, EntityType::Person]),
    ("cto", &[EntityType::Company, EntityType::Person]),
    ("founder", &[EntityType::Company, EntityType::Person]),
    ("president", &[EntityType::Company, EntityType::Person]),
    ("director", &[EntityType::Person]),
    ("manager", &[EntityType::Person]),
    ("person", &[EntityType::Person]),
    ("revenue", &[EntityType::FinancialFigure, EntityType::Company]),
    ("income", &[EntityType::FinancialFigure, EntityType::Company]),
    ("profit", &[EntityType::FinancialFigure, EntityType::Company]),
    ("earnings", &[EntityType::FinancialFigure, EntityType::Company]),
    ("sales", &[EntityType::FinancialFigure, EntityType::Company]),
    ("financial", &[EntityType::FinancialFigure]),
    ("project", &[EntityType::Project, EntityType::Deadline]),
    ("projects", &[EntityType::Project, EntityType::Deadline]),
    ("deadline", &[EntityType::Deadline, EntityType::Project]),
    ("deadlines", &[EntityType::Deadline, EntityType::Project]),
    ("due", &[EntityType::Deadline]),
    ("assignment", &[EntityType::Assignment]),
    ("assignments", &[EntityType::Assignment]),
    ("assigned", &[EntityType::Assignment, EntityType::Person]),
    ("assignee", &[EntityType::Assignment, EntityType::Person]),
    ("task", &[EntityType::Assignment]),
    ("tasks", &[EntityType::Assignment]),
    ("responsible", &[EntityType::Assignment, EntityType::Person]),
];

/// Interrogatives and cues asking for a single fact.
const FACTUAL_CUES: &[&str] = &[
    "who", "whom", "whose", "when", "what", "which", "where", "much", "many", "list", "name",
];

/// Cues asking for explanation or guidance.
const SEMANTIC_CUES: &[&str] = &[
    "how",
    "why",
    "explain",
    "describe",
    "should",
    "summarize",
    "summarise",
    "summary",
    "overview",
    "approach",
    "recommend",
    "compare",
    "process",
    "requirements",
    "guidelines",
    "best",
];

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "do", "does", "did",
    "of", "for", "to", "in", "on", "at", "by", "with", "from", "about", "into", "and", "or",
    "it", "its", "this", "that", "these", "those", "there", "their", "we", "our", "you", "your",
    "i", "me", "my", "us", "they", "them", "he", "she", "his", "her", "as", "can", "could",
    "would", "will", "shall", "may", "might", "must", "has", "have", "had", "please", "tell",
    "all", "any", "some", "used", "use",
];

fn triggers(token: &str) -> Option<&'static [EntityType]> {
    ENTITY_TRIGGERS
        .iter()
        .find(|(word, _)| *word == token)
        .map(|(_, types)| *types)
}

/// Rule-based classifier over fixed word lists.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    min_confidence: f32,
}

impl KeywordClassifier {
    pub fn new(min_confidence: f32) -> Self {
        Self {
            min_confidence: min_confidence.clamp(0.0, 1.0),
        }
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MIN_CONFIDENCE)
    }
}

impl IntentClassifier for KeywordClassifier {
    fn classify(&self, question: &str) -> Classification {
        let tokens = tokenize(question);

        let mut entity_types: Vec<EntityType> = Vec::new();
        let mut keywords: BTreeSet<String> = BTreeSet::new();
        let mut ordered_keywords: Vec<String> = Vec::new();
        let mut factual = 0usize;
        let mut semantic = 0usize;

        for token in &tokens {
            let token = token.as_str();
            if let Some(types) = triggers(token) {
                factual += 1;
                for ty in types {
                    if !entity_types.contains(ty) {
                        entity_types.push(*ty);
                    }
                }
                continue;
            }
            if FACTUAL_CUES.contains(&token) {
                factual += 1;
                continue;
            }
            if SEMANTIC_CUES.contains(&token) {
                semantic += 1;
                continue;
            }
            if STOPWORDS.contains(&token) || token.chars().count() < 2 {
                continue;
            }
            if keywords.insert(token.to_string()) {
                ordered_keywords.push(token.to_string());
            }
        }

        let total = factual + semantic;
        let confidence = if total == 0 {
            0.0
        } else {
            factual.abs_diff(semantic) as f32 / total as f32
        };

        let intent = if total == 0 || confidence < self.min_confidence {
            Intent::Unknown
        } else if factual > semantic {
            Intent::Factual
        } else {
            Intent::Semantic
        };

        Classification {
            intent,
            confidence,
            pattern: EntityPattern::new(entity_types, ordered_keywords),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(question: &str) -> Classification {
        KeywordClassifier::default().classify(question)
    }

    #[test]
    fn deadline_question_is_factual() {
        let c = classify("What is the submission deadline for the internship project?");

        assert_eq!(c.intent, Intent::Factual);
        assert_eq!(c.confidence, 1.0);
        assert!(c.pattern.accepts(EntityType::Deadline));
        assert!(c.pattern.accepts(EntityType::Project));
        assert!(!c.pattern.accepts(EntityType::Company));
        assert_eq!(c.pattern.keywords, vec!["submission", "internship"]);
    }

    #[test]
    fn open_ended_question_is_semantic() {
        let c = classify("How should we explain the onboarding approach?");

        assert_eq!(c.intent, Intent::Semantic);
        assert!(c.pattern.entity_types.is_empty());
        assert_eq!(c.pattern.keywords, vec!["onboarding"]);
    }

    #[test]
    fn balanced_signals_are_unknown() {
        let c = classify("Which language should be used to build the system?");

        assert_eq!(c.intent, Intent::Unknown);
        assert_eq!(c.confidence, 0.0);
        assert_eq!(c.pattern.keywords, vec!["language", "build", "system"]);
    }

    #[test]
    fn no_signal_is_unknown() {
        let c = classify("internship");
        assert_eq!(c.intent, Intent::Unknown);
        assert_eq!(c.pattern.keywords, vec!["internship"]);
    }

    #[test]
    fn ceo_question_searches_companies_and_people() {
        let c = classify("Who is the CEO of Apple?");

        assert_eq!(c.intent, Intent::Factual);
        assert!(c.pattern.accepts(EntityType::Company));
        assert!(c.pattern.accepts(EntityType::Person));
        assert_eq!(c.pattern.keywords, vec!["apple"]);
    }

    #[test]
    fn low_margin_falls_back_to_unknown() {
        let strict = KeywordClassifier::new(0.9);
        // two factual cues against one semantic cue
        let c = strict.classify("Who should decide what?");
        assert_eq!(c.intent, Intent::Unknown);
        assert!(c.confidence > 0.0 && c.confidence < 0.9);
    }

    #[test]
    fn keywords_are_deduplicated_in_order() {
        let c = classify("Apple revenue, Apple profit, 2023");
        assert_eq!(c.pattern.keywords, vec!["apple", "2023"]);
    }

    #[test]
    fn intent_labels() {
        assert_eq!(Intent::Factual.as_str(), "factual");
        assert_eq!(Intent::Semantic.as_str(), "semantic");
        assert_eq!(Intent::Unknown.as_str(), "unknown");
    }
}
