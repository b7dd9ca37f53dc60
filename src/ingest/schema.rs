//! Extraction schema: what the language model returns and what the graph accepts
//!
//! Raw extraction output is deserialized leniently, then validated into a
//! [`ValidatedExtraction`]. Records that do not fit the graph schema are dropped
//! and reported as [`Error::SchemaSkip`].

use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::stores::models::{EntityType, RelationshipType};
use crate::Error;

const NOT_AVAILABLE: &str = "N/A";

fn not_available() -> String {
    NOT_AVAILABLE.to_string()
}

/// Accept `383.29`, `2023` or `"383.29"` alike.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Company {
    #[serde(default)]
    pub name: String,
    #[serde(default = "not_available")]
    pub ticker: String,
    #[serde(default = "not_available")]
    pub industry: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialFigure {
    #[serde(default)]
    pub metric: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub value: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub year: String,
    #[serde(default = "not_available")]
    pub company_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(default, alias = "title")]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Deadline {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub project: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(default)]
    pub assignee: String,
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub project: String,
}

/// Relationship exactly as the model emitted it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub source_entity_name: String,
    #[serde(default)]
    pub source_entity_type: String,
    #[serde(default)]
    pub relationship_type: String,
    #[serde(default)]
    pub target_entity_name: String,
    #[serde(default)]
    pub target_entity_type: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub context: String,
}

/// Unvalidated extraction output. Missing lists default to empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default, alias = "people")]
    pub persons: Vec<Person>,
    #[serde(default)]
    pub companies: Vec<Company>,
    #[serde(default)]
    pub financial_figures: Vec<FinancialFigure>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub deadlines: Vec<Deadline>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

impl ExtractionResult {
    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
            && self.companies.is_empty()
            && self.financial_figures.is_empty()
            && self.projects.is_empty()
            && self.deadlines.is_empty()
            && self.assignments.is_empty()
            && self.relationships.is_empty()
    }

    /// Attach financial figures to the company that reports them.
    ///
    /// A figure is linked when its value equals the relationship target name
    /// and its year equals the relationship context.
    pub fn link_financial_figures(&mut self) {
        for rel in &self.relationships {
            let links = RelationshipType::parse(&rel.relationship_type)
                .map(|ty| ty.links_financial_figure())
                .unwrap_or(false);
            if !links {
                continue;
            }
            if let Some(figure) = self.financial_figures.iter_mut().find(|ff| {
                ff.value.trim() == rel.target_entity_name.trim()
                    && ff.year.trim() == rel.context.trim()
            }) {
                figure.company_name = rel.source_entity_name.clone();
            }
        }
    }

    /// Split the raw output into schema-conforming records and skips.
    pub fn validate(self) -> ExtractionReport {
        let mut skipped = Vec::new();
        let mut skip = |reason: String| {
            warn!(reason = %reason, "Skipping extracted record");
            skipped.push(Error::SchemaSkip(reason));
        };

        let companies = keep_named(self.companies, EntityType::Company, |c| &c.name, &mut skip);
        let persons = keep_named(self.persons, EntityType::Person, |p| &p.name, &mut skip);
        let financial_figures = keep_named(
            self.financial_figures,
            EntityType::FinancialFigure,
            |f| &f.metric,
            &mut skip,
        );
        let projects = keep_named(self.projects, EntityType::Project, |p| &p.name, &mut skip);
        let deadlines = keep_named(self.deadlines, EntityType::Deadline, |d| &d.date, &mut skip);
        let assignments = keep_named(
            self.assignments,
            EntityType::Assignment,
            |a| &a.task,
            &mut skip,
        );

        let mut relationships = Vec::new();
        for rel in self.relationships {
            match validate_relationship(&rel) {
                Ok(valid) => relationships.push(valid),
                Err(reason) => skip(reason),
            }
        }

        ExtractionReport {
            extraction: ValidatedExtraction {
                companies,
                persons,
                financial_figures,
                projects,
                deadlines,
                assignments,
                relationships,
            },
            skipped,
        }
    }
}

fn keep_named<T>(
    items: Vec<T>,
    entity_type: EntityType,
    key: impl Fn(&T) -> &String,
    skip: &mut impl FnMut(String),
) -> Vec<T> {
    items
        .into_iter()
        .filter(|item| {
            let present = !key(item).trim().is_empty();
            if !present {
                skip(format!("{entity_type} without identifying value"));
            }
            present
        })
        .collect()
}

fn validate_relationship(rel: &Relationship) -> Result<ValidatedRelationship, String> {
    let describe = || {
        format!(
            "{} ({} -> {})",
            rel.relationship_type, rel.source_entity_type, rel.target_entity_type
        )
    };

    let relationship = RelationshipType::parse(&rel.relationship_type)
        .ok_or_else(|| format!("unsupported relationship {}", describe()))?;
    let source_type = EntityType::parse(&rel.source_entity_type);
    let target_type = EntityType::parse(&rel.target_entity_type);

    let (expected_source, expected_target) = relationship.endpoints();
    if source_type != Some(expected_source) || target_type != Some(expected_target) {
        return Err(format!(
            "endpoint mismatch for {}, expected {} -> {}",
            describe(),
            expected_source,
            expected_target
        ));
    }

    let source = rel.source_entity_name.trim();
    let target = rel.target_entity_name.trim();
    if source.is_empty() || target.is_empty() {
        return Err(format!("missing endpoint name for {}", describe()));
    }

    Ok(ValidatedRelationship {
        relationship,
        source: source.to_string(),
        target: target.to_string(),
        context: rel.context.trim().to_string(),
    })
}

/// Typed edge between two named entities.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRelationship {
    pub relationship: RelationshipType,
    /// Key of the source node (company name, project name, assignment task)
    pub source: String,
    /// Key of the target node; for financial edges this is the figure value
    pub target: String,
    /// Free text; for financial edges this is the figure year
    pub context: String,
}

/// Records that satisfy the graph schema. The only input the entity store accepts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedExtraction {
    pub companies: Vec<Company>,
    pub persons: Vec<Person>,
    pub financial_figures: Vec<FinancialFigure>,
    pub projects: Vec<Project>,
    pub deadlines: Vec<Deadline>,
    pub assignments: Vec<Assignment>,
    pub relationships: Vec<ValidatedRelationship>,
}

impl ValidatedExtraction {
    pub fn entity_count(&self) -> usize {
        self.companies.len()
            + self.persons.len()
            + self.financial_figures.len()
            + self.projects.len()
            + self.deadlines.len()
            + self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entity_count() == 0 && self.relationships.is_empty()
    }
}

/// Result of validating one extraction.
#[derive(Debug, Default)]
pub struct ExtractionReport {
    pub extraction: ValidatedExtraction,
    /// Every entry is an [`Error::SchemaSkip`]
    pub skipped: Vec<Error>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(kind: &str, source_type: &str, target_type: &str) -> Relationship {
        Relationship {
            source_entity_name: "Apple Inc.".into(),
            source_entity_type: source_type.into(),
            relationship_type: kind.into(),
            target_entity_name: "Tim Cook".into(),
            target_entity_type: target_type.into(),
            context: String::new(),
        }
    }

    #[test]
    fn deserializes_leniently() {
        let json = r#"{
            "companies": [{"name": "Apple Inc."}],
            "financial_figures": [{"metric": "Revenue", "value": 383.29, "unit": "billion USD", "year": 2023}]
        }"#;
        let result: ExtractionResult = serde_json::from_str(json).unwrap();

        assert_eq!(result.companies[0].ticker, "N/A");
        assert_eq!(result.companies[0].industry, "N/A");
        assert_eq!(result.financial_figures[0].value, "383.29");
        assert_eq!(result.financial_figures[0].year, "2023");
        assert_eq!(result.financial_figures[0].company_name, "N/A");
        assert!(result.persons.is_empty());
        assert!(result.deadlines.is_empty());
    }

    #[test]
    fn accepts_people_alias_and_project_title() {
        let json = r#"{"people": [{"name": "Tim Cook", "title": "CEO"}], "projects": [{"title": "HayDay"}]}"#;
        let result: ExtractionResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.persons[0].name, "Tim Cook");
        assert_eq!(result.projects[0].name, "HayDay");
    }

    #[test]
    fn links_financial_figure_to_reporting_company() {
        let mut result = ExtractionResult {
            financial_figures: vec![
                FinancialFigure {
                    metric: "Revenue".into(),
                    value: "383.29".into(),
                    unit: "billion USD".into(),
                    year: "2023".into(),
                    company_name: "N/A".into(),
                },
                FinancialFigure {
                    metric: "Revenue".into(),
                    value: "383.29".into(),
                    unit: "billion USD".into(),
                    year: "2022".into(),
                    company_name: "N/A".into(),
                },
            ],
            relationships: vec![Relationship {
                source_entity_name: "Apple Inc.".into(),
                source_entity_type: "Company".into(),
                relationship_type: "REPORTS_REVENUE".into(),
                target_entity_name: "383.29".into(),
                target_entity_type: "FinancialFigure".into(),
                context: "2023".into(),
            }],
            ..Default::default()
        };

        result.link_financial_figures();

        assert_eq!(result.financial_figures[0].company_name, "Apple Inc.");
        assert_eq!(result.financial_figures[1].company_name, "N/A");
    }

    #[test]
    fn non_financial_relationships_do_not_link() {
        let mut result = ExtractionResult {
            financial_figures: vec![FinancialFigure {
                metric: "Revenue".into(),
                value: "Tim Cook".into(),
                year: String::new(),
                company_name: "N/A".into(),
                ..Default::default()
            }],
            relationships: vec![rel("HAS_CEO", "Company", "Person")],
            ..Default::default()
        };
        result.link_financial_figures();
        assert_eq!(result.financial_figures[0].company_name, "N/A");
    }

    #[test]
    fn validate_keeps_accepted_relationships() {
        let result = ExtractionResult {
            relationships: vec![rel("HAS_CEO", "Company", "Person")],
            ..Default::default()
        };
        let report = result.validate();

        assert!(report.skipped.is_empty());
        assert_eq!(report.extraction.relationships.len(), 1);
        let edge = &report.extraction.relationships[0];
        assert_eq!(edge.relationship, RelationshipType::HasCeo);
        assert_eq!(edge.source, "Apple Inc.");
        assert_eq!(edge.target, "Tim Cook");
    }

    #[test]
    fn validate_skips_unknown_relationship_type() {
        let result = ExtractionResult {
            relationships: vec![rel("OWNS", "Person", "Project")],
            ..Default::default()
        };
        let report = result.validate();

        assert!(report.extraction.relationships.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert!(matches!(report.skipped[0], Error::SchemaSkip(_)));
        assert!(report.skipped[0].to_string().contains("OWNS"));
    }

    #[test]
    fn validate_skips_mismatched_endpoints() {
        let result = ExtractionResult {
            relationships: vec![rel("HAS_CEO", "Person", "Company")],
            ..Default::default()
        };
        let report = result.validate();

        assert!(report.extraction.relationships.is_empty());
        assert!(report.skipped[0].to_string().contains("endpoint mismatch"));
    }

    #[test]
    fn validate_drops_entities_without_key() {
        let result = ExtractionResult {
            companies: vec![
                Company {
                    name: "  ".into(),
                    ..Default::default()
                },
                Company {
                    name: "Google".into(),
                    ticker: "GOOGL".into(),
                    industry: "Technology".into(),
                },
            ],
            deadlines: vec![Deadline {
                date: "July 20th, 2025".into(),
                context: "submit by July 20th".into(),
                project: "internship".into(),
            }],
            ..Default::default()
        };
        let report = result.validate();

        assert_eq!(report.extraction.companies.len(), 1);
        assert_eq!(report.extraction.deadlines.len(), 1);
        assert_eq!(report.extraction.entity_count(), 2);
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn empty_result_is_empty() {
        assert!(ExtractionResult::default().is_empty());
        assert!(ExtractionResult::default().validate().extraction.is_empty());
    }
}
