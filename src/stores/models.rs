//! Data models shared by the entity and semantic stores

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Node labels the graph schema accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityType {
    Company,
    Person,
    FinancialFigure,
    Project,
    Deadline,
    Assignment,
}

impl EntityType {
    pub const ALL: [EntityType; 6] = [
        EntityType::Company,
        EntityType::Person,
        EntityType::FinancialFigure,
        EntityType::Project,
        EntityType::Deadline,
        EntityType::Assignment,
    ];

    /// Graph label, also the name the extractor emits.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Company => "Company",
            EntityType::Person => "Person",
            EntityType::FinancialFigure => "FinancialFigure",
            EntityType::Project => "Project",
            EntityType::Deadline => "Deadline",
            EntityType::Assignment => "Assignment",
        }
    }

    /// Parse a label, tolerating case and separators (`financial_figure`).
    pub fn parse(value: &str) -> Option<Self> {
        let key: String = value
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "company" => Some(EntityType::Company),
            "person" => Some(EntityType::Person),
            "financialfigure" => Some(EntityType::FinancialFigure),
            "project" => Some(EntityType::Project),
            "deadline" => Some(EntityType::Deadline),
            "assignment" => Some(EntityType::Assignment),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edge types the graph schema accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationshipType {
    HasCeo,
    ReportsRevenue,
    ReportsNetIncome,
    HasFinancialFigure,
    IsCompetitorOf,
    HasDeadline,
    AssignedTo,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::HasCeo => "HAS_CEO",
            RelationshipType::ReportsRevenue => "REPORTS_REVENUE",
            RelationshipType::ReportsNetIncome => "REPORTS_NET_INCOME",
            RelationshipType::HasFinancialFigure => "HAS_FINANCIAL_FIGURE",
            RelationshipType::IsCompetitorOf => "IS_COMPETITOR_OF",
            RelationshipType::HasDeadline => "HAS_DEADLINE",
            RelationshipType::AssignedTo => "ASSIGNED_TO",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().replace([' ', '-'], "_").as_str() {
            "HAS_CEO" => Some(RelationshipType::HasCeo),
            "REPORTS_REVENUE" => Some(RelationshipType::ReportsRevenue),
            "REPORTS_NET_INCOME" => Some(RelationshipType::ReportsNetIncome),
            "HAS_FINANCIAL_FIGURE" => Some(RelationshipType::HasFinancialFigure),
            "IS_COMPETITOR_OF" => Some(RelationshipType::IsCompetitorOf),
            "HAS_DEADLINE" => Some(RelationshipType::HasDeadline),
            "ASSIGNED_TO" => Some(RelationshipType::AssignedTo),
            _ => None,
        }
    }

    /// The only (source, target) pair this edge may connect.
    pub fn endpoints(&self) -> (EntityType, EntityType) {
        match self {
            RelationshipType::HasCeo => (EntityType::Company, EntityType::Person),
            RelationshipType::ReportsRevenue
            | RelationshipType::ReportsNetIncome
            | RelationshipType::HasFinancialFigure => {
                (EntityType::Company, EntityType::FinancialFigure)
            }
            RelationshipType::IsCompetitorOf => (EntityType::Company, EntityType::Company),
            RelationshipType::HasDeadline => (EntityType::Project, EntityType::Deadline),
            RelationshipType::AssignedTo => (EntityType::Assignment, EntityType::Person),
        }
    }

    /// Edges that attach a financial figure to its company.
    pub fn links_financial_figure(&self) -> bool {
        matches!(
            self,
            RelationshipType::ReportsRevenue
                | RelationshipType::ReportsNetIncome
                | RelationshipType::HasFinancialFigure
        )
    }
}

/// Structured lookup sent to the entity store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityPattern {
    /// Labels to restrict to; empty means any label
    pub entity_types: Vec<EntityType>,
    /// Lowercased terms matched against node property values
    pub keywords: Vec<String>,
}

impl EntityPattern {
    pub fn new(entity_types: Vec<EntityType>, keywords: Vec<String>) -> Self {
        Self {
            entity_types,
            keywords: keywords.into_iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// A pattern without keywords would match the whole graph; stores skip it.
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn accepts(&self, entity_type: EntityType) -> bool {
        self.entity_types.is_empty() || self.entity_types.contains(&entity_type)
    }

    /// Share of keywords found in any of the values, in `[0, 1]`.
    ///
    /// Keywords match whole words only: "day" does not match "Saturday".
    pub fn match_ratio<'a>(&self, values: impl Iterator<Item = &'a str>) -> f32 {
        if self.keywords.is_empty() {
            return 0.0;
        }
        let haystack: Vec<Vec<String>> = values.map(tokenize).collect();
        let matched = self
            .keywords
            .iter()
            .map(|k| tokenize(k))
            .filter(|needle| !needle.is_empty())
            .filter(|needle| haystack.iter().any(|words| contains_run(words, needle)))
            .count();
        matched as f32 / self.keywords.len() as f32
    }
}

/// Lowercased alphanumeric words of `text`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// True when `needle` occurs as consecutive words of `words`.
fn contains_run(words: &[String], needle: &[String]) -> bool {
    needle.len() <= words.len() && words.windows(needle.len()).any(|w| w == needle)
}

/// Neighbour of a matched node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedEntity {
    pub relationship: String,
    pub entity_type: String,
    pub name: String,
}

/// A matched node with its direct neighbourhood.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Store-assigned node id (provenance)
    pub node_id: String,
    pub entity_type: EntityType,
    pub attributes: BTreeMap<String, String>,
    pub related: Vec<RelatedEntity>,
    /// Share of query keywords this node matched
    pub relevance: f32,
}

impl EntityRecord {
    /// One-line textual form used as evidence content.
    pub fn render(&self) -> String {
        let attrs = self
            .attributes
            .iter()
            .filter(|(_, v)| !v.trim().is_empty())
            .map(|(k, v)| format!("{k}: {v}"))
            .collect::<Vec<_>>()
            .join(", ");

        let mut line = format!("{} {{{}}}", self.entity_type, attrs);
        if !self.related.is_empty() {
            let related = self
                .related
                .iter()
                .map(|r| format!("{} {} {}", r.relationship, r.entity_type, r.name))
                .collect::<Vec<_>>()
                .join("; ");
            line.push_str(&format!(" | related: {related}"));
        }
        line
    }
}

/// Similarity hit returned by the semantic store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkHit {
    pub content: String,
    /// Similarity normalized to `[0, 1]`
    pub score: f32,
    pub chunk_id: Uuid,
    /// Document (file name) the chunk came from
    pub document: String,
}

/// Counters returned from an entity upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertStats {
    pub nodes: usize,
    pub relationships: usize,
}
