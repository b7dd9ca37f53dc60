//! Entity store backed by Neo4j

use std::collections::BTreeMap;

use async_trait::async_trait;
use neo4rs::{query, ConfigBuilder, Graph, Node, Query};
use tracing::{debug, info};

use super::models::{
    tokenize, EntityPattern, EntityRecord, EntityType, RelatedEntity, RelationshipType,
    UpsertStats,
};
use super::EntityStore;
use crate::config::GraphConfig;
use crate::ingest::schema::{ValidatedExtraction, ValidatedRelationship};
use crate::{Error, Result};

const CONSTRAINTS: [&str; 5] = [
    "CREATE CONSTRAINT company_name_unique IF NOT EXISTS FOR (c:Company) REQUIRE c.name IS UNIQUE",
    "CREATE CONSTRAINT person_name_unique IF NOT EXISTS FOR (p:Person) REQUIRE p.name IS UNIQUE",
    "CREATE CONSTRAINT financial_figure_unique IF NOT EXISTS FOR (f:FinancialFigure) REQUIRE (f.metric, f.year, f.company_name) IS UNIQUE",
    "CREATE CONSTRAINT project_name_unique IF NOT EXISTS FOR (p:Project) REQUIRE p.name IS UNIQUE",
    "CREATE CONSTRAINT deadline_date_unique IF NOT EXISTS FOR (d:Deadline) REQUIRE d.date IS UNIQUE",
];

/// Keyword lookup: labels filter, whole-word regex match over every lowercased
/// property, plus the direct neighbourhood of each match.
const ENTITY_LOOKUP: &str = "
MATCH (n)
WHERE any(label IN labels(n) WHERE label IN $labels)
WITH n, [k IN keys(n) | toLower(toString(n[k]))] AS vals
WITH n, size([p IN $patterns WHERE any(v IN vals WHERE v =~ p)]) AS matched
WHERE matched > 0
OPTIONAL MATCH (n)-[r]-(m)
WITH n, matched, collect(CASE WHEN m IS NULL THEN NULL
    ELSE [type(r), head(labels(m)), coalesce(m.name, m.date, m.task, toString(m.value), '')] END) AS related
RETURN elementId(n) AS node_id, head(labels(n)) AS label, n AS node, matched, related
ORDER BY matched DESC
LIMIT $limit";

/// Graph store backed by Neo4j
pub struct GraphStore {
    graph: Graph,
}

impl GraphStore {
    /// Connect to the configured Neo4j server and database
    pub async fn connect(config: &GraphConfig) -> Result<Self> {
        let neo4j_config = ConfigBuilder::default()
            .uri(config.uri.as_str())
            .user(config.user.as_str())
            .password(config.password.as_str())
            .db(config.database.as_str())
            .build()?;
        let graph = Graph::connect(neo4j_config).await?;

        graph.run(query("RETURN 1")).await?;
        info!(uri = %config.uri, database = %config.database, "Connected to Neo4j");

        Ok(Self { graph })
    }

    async fn link(&self, rel: &ValidatedRelationship) -> Result<bool> {
        let mut result = self.graph.execute(relationship_query(rel)).await?;
        let linked = match result.next().await? {
            Some(row) => row.get::<i64>("linked").unwrap_or(0) > 0,
            None => false,
        };
        if !linked {
            debug!(
                "Relationship {} {} -> {} has no matching endpoints",
                rel.relationship.as_str(),
                rel.source,
                rel.target
            );
        }
        Ok(linked)
    }
}

/// MERGE statement for one validated edge.
///
/// The relationship type is interpolated; it always comes from [`RelationshipType`].
fn relationship_query(rel: &ValidatedRelationship) -> Query {
    let (source_type, target_type) = rel.relationship.endpoints();
    let source_match = match source_type {
        EntityType::Assignment => "MATCH (a:Assignment {task: $source})",
        EntityType::Project => "MATCH (a:Project {name: $source})",
        _ => "MATCH (a:Company {name: $source})",
    };
    let target_match = match (rel.relationship, target_type) {
        (r, _) if r.links_financial_figure() => {
            "MATCH (b:FinancialFigure {value: $target, year: $context})"
        }
        (_, EntityType::Deadline) => "MATCH (b:Deadline {date: $target})",
        (_, EntityType::Company) => "MATCH (b:Company {name: $target})",
        _ => "MATCH (b:Person {name: $target})",
    };

    let cypher = format!(
        "{source_match}
         {target_match}
         MERGE (a)-[:{}]->(b)
         RETURN count(*) AS linked",
        rel.relationship.as_str()
    );

    query(&cypher)
        .param("source", rel.source.clone())
        .param("target", rel.target.clone())
        .param("context", rel.context.clone())
}

fn labels_for(pattern: &EntityPattern) -> Vec<String> {
    let types: Vec<EntityType> = if pattern.entity_types.is_empty() {
        EntityType::ALL.to_vec()
    } else {
        pattern.entity_types.clone()
    };
    types.iter().map(|t| t.as_str().to_string()).collect()
}

/// Java regex matching `keyword` as whole words anywhere in a lowercased value.
///
/// Tokens are alphanumeric, so they need no escaping.
fn keyword_regex(keyword: &str) -> Option<String> {
    let words = tokenize(keyword);
    if words.is_empty() {
        return None;
    }
    Some(format!(
        "(?s).*(?<![\\p{{L}}\\p{{N}}]){}(?![\\p{{L}}\\p{{N}}]).*",
        words.join("[^\\p{L}\\p{N}]+")
    ))
}

fn node_attributes(node: &Node) -> BTreeMap<String, String> {
    node.keys()
        .into_iter()
        .filter_map(|key| {
            let value = node.get::<String>(key).ok()?;
            Some((key.to_string(), value))
        })
        .collect()
}

fn related_entities(rows: Vec<Vec<String>>) -> Vec<RelatedEntity> {
    rows.into_iter()
        .filter_map(|row| {
            let mut parts = row.into_iter();
            Some(RelatedEntity {
                relationship: parts.next()?,
                entity_type: parts.next()?,
                name: parts.next().unwrap_or_default(),
            })
        })
        .collect()
}

#[async_trait]
impl EntityStore for GraphStore {
    async fn query_entities(
        &self,
        pattern: &EntityPattern,
        limit: usize,
    ) -> Result<Vec<EntityRecord>> {
        if pattern.is_empty() {
            return Ok(Vec::new());
        }

        let q = query(ENTITY_LOOKUP)
            .param("labels", labels_for(pattern))
            .param(
                "patterns",
                pattern
                    .keywords
                    .iter()
                    .filter_map(|k| keyword_regex(k))
                    .collect::<Vec<_>>(),
            )
            .param("limit", limit as i64);

        let mut result = self.graph.execute(q).await?;
        let mut records = Vec::new();

        while let Some(row) = result.next().await? {
            let Some(entity_type) = row
                .get::<String>("label")
                .ok()
                .and_then(|label| EntityType::parse(&label))
            else {
                continue;
            };
            let node = row
                .get::<Node>("node")
                .map_err(|e| Error::GraphError(e.to_string()))?;
            let matched = row.get::<i64>("matched").unwrap_or(0);

            records.push(EntityRecord {
                node_id: row.get::<String>("node_id").unwrap_or_default(),
                entity_type,
                attributes: node_attributes(&node),
                related: related_entities(row.get::<Vec<Vec<String>>>("related").unwrap_or_default()),
                relevance: matched as f32 / pattern.keywords.len() as f32,
            });
        }

        debug!("Neo4j matched {} records", records.len());
        Ok(records)
    }

    async fn upsert_entities(&self, extraction: &ValidatedExtraction) -> Result<UpsertStats> {
        for c in &extraction.companies {
            let q = query(
                "MERGE (c:Company {name: $name})
                 SET c.ticker = $ticker, c.industry = $industry",
            )
            .param("name", c.name.trim())
            .param("ticker", c.ticker.clone())
            .param("industry", c.industry.clone());
            self.graph.run(q).await?;
        }

        for p in &extraction.persons {
            let q = query(
                "MERGE (p:Person {name: $name})
                 SET p.title = $title",
            )
            .param("name", p.name.trim())
            .param("title", p.title.clone());
            self.graph.run(q).await?;
        }

        for f in &extraction.financial_figures {
            let q = query(
                "MERGE (f:FinancialFigure {metric: $metric, year: $year, company_name: $company_name})
                 SET f.value = $value, f.unit = $unit",
            )
            .param("metric", f.metric.trim())
            .param("year", f.year.trim())
            .param("company_name", f.company_name.trim())
            .param("value", f.value.trim())
            .param("unit", f.unit.clone());
            self.graph.run(q).await?;
        }

        for p in &extraction.projects {
            let q = query(
                "MERGE (p:Project {name: $name})
                 SET p.description = $description",
            )
            .param("name", p.name.trim())
            .param("description", p.description.clone());
            self.graph.run(q).await?;
        }

        for d in &extraction.deadlines {
            let q = query(
                "MERGE (d:Deadline {date: $date})
                 SET d.context = $context, d.project = $project",
            )
            .param("date", d.date.trim())
            .param("context", d.context.clone())
            .param("project", d.project.clone());
            self.graph.run(q).await?;
        }

        for a in &extraction.assignments {
            let q = query(
                "MERGE (a:Assignment {task: $task})
                 SET a.assignee = $assignee, a.project = $project",
            )
            .param("task", a.task.trim())
            .param("assignee", a.assignee.clone())
            .param("project", a.project.clone());
            self.graph.run(q).await?;
        }

        let mut relationships = 0;
        for rel in &extraction.relationships {
            if self.link(rel).await? {
                relationships += 1;
            }
        }

        let stats = UpsertStats {
            nodes: extraction.entity_count(),
            relationships,
        };
        debug!(
            "Upserted {} nodes and {} relationships to Neo4j",
            stats.nodes, stats.relationships
        );
        Ok(stats)
    }

    async fn init_schema(&self) -> Result<()> {
        info!("Initializing Neo4j schema...");
        for constraint in CONSTRAINTS {
            self.graph.run(query(constraint)).await?;
        }
        info!("Schema constraints created");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.graph.run(query("MATCH (n) DETACH DELETE n")).await?;
        info!("Cleared all data from Neo4j");
        Ok(())
    }
}
