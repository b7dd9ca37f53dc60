//! In-process entity store with the same merge semantics as the Neo4j store

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::models::{
    EntityPattern, EntityRecord, EntityType, RelatedEntity, RelationshipType, UpsertStats,
};
use super::EntityStore;
use crate::ingest::schema::{ValidatedExtraction, ValidatedRelationship};
use crate::Result;

/// Graph node representing an entity.
#[derive(Debug, Clone)]
struct Node {
    id: String,
    entity_type: EntityType,
    attributes: BTreeMap<String, String>,
}

impl Node {
    /// Value shown for this node when listed as a neighbour.
    fn display_name(&self) -> String {
        let field = match self.entity_type {
            EntityType::Deadline => "date",
            EntityType::Assignment => "task",
            EntityType::FinancialFigure => "value",
            _ => "name",
        };
        self.attributes.get(field).cloned().unwrap_or_default()
    }
}

/// Graph edge between two node ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Edge {
    from: String,
    to: String,
    relation: RelationshipType,
}

#[derive(Debug, Default)]
struct GraphState {
    /// Merge key -> node
    nodes: HashMap<(EntityType, String), Node>,
    /// Insertion order for stable results
    order: Vec<(EntityType, String)>,
    edges: Vec<Edge>,
    next_id: u64,
}

impl GraphState {
    fn merge(&mut self, entity_type: EntityType, key: String, attributes: BTreeMap<String, String>) {
        let map_key = (entity_type, key);
        if let Some(node) = self.nodes.get_mut(&map_key) {
            node.attributes.extend(attributes);
            return;
        }
        self.next_id += 1;
        let node = Node {
            id: format!("{}:{}", entity_type.as_str().to_lowercase(), self.next_id),
            entity_type,
            attributes,
        };
        self.order.push(map_key.clone());
        self.nodes.insert(map_key, node);
    }

    fn id_of(&self, entity_type: EntityType, key: &str) -> Option<String> {
        self.nodes
            .get(&(entity_type, key.to_string()))
            .map(|n| n.id.clone())
    }

    /// Resolve both endpoints; edges to missing nodes are dropped.
    fn connect(&mut self, rel: &ValidatedRelationship) -> bool {
        let (source_type, target_type) = rel.relationship.endpoints();
        let Some(from) = self.id_of(source_type, &rel.source) else {
            return false;
        };

        let to = if rel.relationship.links_financial_figure() {
            self.order
                .iter()
                .filter(|(ty, _)| *ty == EntityType::FinancialFigure)
                .filter_map(|key| self.nodes.get(key))
                .find(|node| {
                    node.attributes.get("value").map(String::as_str) == Some(rel.target.as_str())
                        && node.attributes.get("year").map(String::as_str)
                            == Some(rel.context.as_str())
                })
                .map(|node| node.id.clone())
        } else {
            self.id_of(target_type, &rel.target)
        };
        let Some(to) = to else {
            return false;
        };

        let edge = Edge {
            from,
            to,
            relation: rel.relationship,
        };
        if !self.edges.contains(&edge) {
            self.edges.push(edge);
        }
        true
    }

    fn neighbours(&self, node_id: &str) -> Vec<RelatedEntity> {
        let by_id: HashMap<&str, &Node> = self
            .nodes
            .values()
            .map(|node| (node.id.as_str(), node))
            .collect();

        self.edges
            .iter()
            .filter_map(|edge| {
                let other = if edge.from == node_id {
                    &edge.to
                } else if edge.to == node_id {
                    &edge.from
                } else {
                    return None;
                };
                let other = by_id.get(other.as_str())?;
                Some(RelatedEntity {
                    relationship: edge.relation.as_str().to_string(),
                    entity_type: other.entity_type.as_str().to_string(),
                    name: other.display_name(),
                })
            })
            .collect()
    }
}

fn attrs<const N: usize>(pairs: [(&str, &String); N]) -> BTreeMap<String, String> {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.trim().to_string()))
        .collect()
}

/// Lightweight knowledge graph (in-memory).
#[derive(Debug, Default)]
pub struct MemoryGraph {
    state: RwLock<GraphState>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn node_count(&self) -> usize {
        self.state.read().await.nodes.len()
    }

    pub async fn edge_count(&self) -> usize {
        self.state.read().await.edges.len()
    }
}

#[async_trait]
impl EntityStore for MemoryGraph {
    async fn query_entities(
        &self,
        pattern: &EntityPattern,
        limit: usize,
    ) -> Result<Vec<EntityRecord>> {
        if pattern.is_empty() {
            return Ok(Vec::new());
        }

        let state = self.state.read().await;
        let mut records: Vec<EntityRecord> = state
            .order
            .iter()
            .filter_map(|key| state.nodes.get(key))
            .filter(|node| pattern.accepts(node.entity_type))
            .filter_map(|node| {
                let relevance = pattern.match_ratio(node.attributes.values().map(String::as_str));
                (relevance > 0.0).then(|| EntityRecord {
                    node_id: node.id.clone(),
                    entity_type: node.entity_type,
                    attributes: node.attributes.clone(),
                    related: state.neighbours(&node.id),
                    relevance,
                })
            })
            .collect();

        // Stable sort keeps insertion order among equal relevance.
        records.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        records.truncate(limit);
        debug!("Memory graph matched {} records", records.len());
        Ok(records)
    }

    async fn upsert_entities(&self, extraction: &ValidatedExtraction) -> Result<UpsertStats> {
        let mut state = self.state.write().await;

        for c in &extraction.companies {
            state.merge(
                EntityType::Company,
                c.name.trim().to_string(),
                attrs([("name", &c.name), ("ticker", &c.ticker), ("industry", &c.industry)]),
            );
        }
        for p in &extraction.persons {
            state.merge(
                EntityType::Person,
                p.name.trim().to_string(),
                attrs([("name", &p.name), ("title", &p.title)]),
            );
        }
        for f in &extraction.financial_figures {
            let key = format!("{}|{}|{}", f.metric.trim(), f.year.trim(), f.company_name.trim());
            state.merge(
                EntityType::FinancialFigure,
                key,
                attrs([
                    ("metric", &f.metric),
                    ("value", &f.value),
                    ("unit", &f.unit),
                    ("year", &f.year),
                    ("company_name", &f.company_name),
                ]),
            );
        }
        for p in &extraction.projects {
            state.merge(
                EntityType::Project,
                p.name.trim().to_string(),
                attrs([("name", &p.name), ("description", &p.description)]),
            );
        }
        for d in &extraction.deadlines {
            state.merge(
                EntityType::Deadline,
                d.date.trim().to_string(),
                attrs([("date", &d.date), ("context", &d.context), ("project", &d.project)]),
            );
        }
        for a in &extraction.assignments {
            state.merge(
                EntityType::Assignment,
                a.task.trim().to_string(),
                attrs([("task", &a.task), ("assignee", &a.assignee), ("project", &a.project)]),
            );
        }

        let mut relationships = 0;
        for rel in &extraction.relationships {
            if state.connect(rel) {
                relationships += 1;
            } else {
                debug!(
                    "Relationship {} {} -> {} has no matching endpoints",
                    rel.relationship.as_str(),
                    rel.source,
                    rel.target
                );
            }
        }

        Ok(UpsertStats {
            nodes: extraction.entity_count(),
            relationships,
        })
    }

    async fn init_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.state.write().await = GraphState::default();
        Ok(())
    }
}
