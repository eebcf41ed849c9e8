use std::collections::{HashMap, HashSet};
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Sub, SubAssign};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::heat::HeatMetric;
use crate::theme::Rgb;

pub type NodeId = String;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    #[default]
    RelatedTo,
    DependsOn,
    Blocks,
    Implements,
    Extends,
    References,
    #[serde(other)]
    Other,
}

impl RelationshipType {
    pub const ALL: [Self; 6] = [
        Self::RelatedTo,
        Self::DependsOn,
        Self::Blocks,
        Self::Implements,
        Self::Extends,
        Self::References,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RelatedTo => "related_to",
            Self::DependsOn => "depends_on",
            Self::Blocks => "blocks",
            Self::Implements => "implements",
            Self::Extends => "extends",
            Self::References => "references",
            Self::Other => "other",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::RelatedTo => "Related To",
            Self::DependsOn => "Depends On",
            Self::Blocks => "Blocks",
            Self::Implements => "Implements",
            Self::Extends => "Extends",
            Self::References => "References",
            Self::Other => "Other",
        }
    }

    pub fn color(self) -> Rgb {
        match self {
            Self::RelatedTo => Rgb::new(0x99, 0x99, 0x99),
            Self::DependsOn => Rgb::new(0xe7, 0x4c, 0x3c),
            Self::Blocks => Rgb::new(0xe6, 0x7e, 0x22),
            Self::Implements => Rgb::new(0x34, 0x98, 0xdb),
            Self::Extends => Rgb::new(0x9b, 0x59, 0xb6),
            Self::References => Rgb::new(0x1a, 0xbc, 0x9c),
            Self::Other => Rgb::new(0xcc, 0xcc, 0xcc),
        }
    }
}

/// Closed set of node categories. Unknown strings map to `Other`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeType {
    Inbox,
    Concept,
    Task,
    Decision,
    System,
    Artifact,
    Other,
}

impl NodeType {
    pub const ALL: [Self; 6] = [
        Self::Inbox,
        Self::Concept,
        Self::System,
        Self::Decision,
        Self::Task,
        Self::Artifact,
    ];

    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "inbox" => Self::Inbox,
            "concept" => Self::Concept,
            "task" | "taskcontract" | "task_contract" => Self::Task,
            "decision" => Self::Decision,
            "system" => Self::System,
            "artifact" => Self::Artifact,
            _ => Self::Other,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Inbox => "Inbox",
            Self::Concept => "Concept",
            Self::Task => "Task",
            Self::Decision => "Decision",
            Self::System => "System",
            Self::Artifact => "Artifact",
            Self::Other => "Other",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length_sq(self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    pub fn length(self) -> f64 {
        self.length_sq().sqrt()
    }

    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn distance(self, other: Self) -> f64 {
        (self - other).length()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Position {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Position {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<f64> for Position {
    type Output = Self;

    fn mul(self, factor: f64) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }
}

impl Div<f64> for Position {
    type Output = Self;

    fn div(self, divisor: f64) -> Self {
        Self::new(self.x / divisor, self.y / divisor)
    }
}

impl AddAssign for Position {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl SubAssign for Position {
    fn sub_assign(&mut self, other: Self) {
        *self = *self - other;
    }
}

impl MulAssign<f64> for Position {
    fn mul_assign(&mut self, factor: f64) {
        *self = *self * factor;
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub to: NodeId,
    #[serde(rename = "type", default)]
    pub relationship: RelationshipType,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeMetrics {
    #[serde(default)]
    pub recency: Option<f64>,
    #[serde(default)]
    pub density: Option<f64>,
    #[serde(default)]
    pub task: Option<f64>,
}

impl NodeMetrics {
    pub fn value(&self, metric: HeatMetric) -> Option<f64> {
        match metric {
            HeatMetric::Recency => self.recency,
            HeatMetric::Density => self.density,
            HeatMetric::Task => self.task,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<String>,
    #[serde(default)]
    pub metrics: NodeMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_md: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
}

pub const UNTAGGED: &str = "untagged";

impl Node {
    pub fn kind(&self) -> NodeType {
        NodeType::parse(&self.node_type)
    }

    /// First tag, or `untagged` when the node carries none.
    pub fn primary_tag(&self) -> &str {
        self.tags
            .first()
            .map(String::as_str)
            .filter(|tag| !tag.is_empty())
            .unwrap_or(UNTAGGED)
    }

    pub fn created_ms(&self) -> Option<i64> {
        self.created_at.as_deref().and_then(parse_timestamp_ms)
    }

    pub fn updated_ms(&self) -> Option<i64> {
        self.updated_at.as_deref().and_then(parse_timestamp_ms)
    }

    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.id
        } else {
            &self.title
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    #[serde(rename = "type", default)]
    pub relationship: RelationshipType,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl GraphData {
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|node| node.id == id)
    }

    pub fn index_by_id(&self) -> HashMap<&str, usize> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(index, node)| (node.id.as_str(), index))
            .collect()
    }

    /// Edges pointing at `id`, as listed by the service.
    pub fn inbound_edges<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |edge| edge.to == id)
    }

    /// Rebuild the edge list from node links when the service omitted edges.
    pub fn ensure_edges(&mut self) {
        if !self.edges.is_empty() {
            return;
        }

        let known = self
            .nodes
            .iter()
            .map(|node| node.id.as_str())
            .collect::<HashSet<_>>();
        let mut edges = Vec::new();
        for node in &self.nodes {
            for link in &node.links {
                if known.contains(link.to.as_str()) {
                    edges.push(Edge {
                        from: node.id.clone(),
                        to: link.to.clone(),
                        relationship: link.relationship,
                    });
                }
            }
        }
        self.edges = edges;
    }

    /// Replace a node in place after a successful update and refresh its outbound edges.
    pub fn apply_node_update(&mut self, updated: Node) {
        let id = updated.id.clone();
        let links = updated.links.clone();
        match self.node_mut(&id) {
            Some(existing) => {
                let position = existing.position;
                *existing = updated;
                if existing.position.is_none() {
                    existing.position = position;
                }
            }
            None => self.nodes.push(updated),
        }

        let known = self
            .nodes
            .iter()
            .map(|node| node.id.clone())
            .collect::<HashSet<_>>();
        self.edges.retain(|edge| edge.from != id);
        self.edges.extend(
            links
                .into_iter()
                .filter(|link| known.contains(&link.to))
                .map(|link| Edge {
                    from: id.clone(),
                    to: link.to,
                    relationship: link.relationship,
                }),
        );
    }

    pub fn remove_node(&mut self, id: &str) -> Option<Node> {
        let index = self.nodes.iter().position(|node| node.id == id)?;
        let removed = self.nodes.remove(index);
        self.edges.retain(|edge| edge.from != id && edge.to != id);
        for node in &mut self.nodes {
            node.links.retain(|link| link.to != id);
        }
        Some(removed)
    }

    /// `(min, max)` creation time across every node that carries one.
    pub fn created_range_ms(&self) -> Option<(i64, i64)> {
        self.nodes
            .iter()
            .filter_map(Node::created_ms)
            .fold(None, |range, value| match range {
                None => Some((value, value)),
                Some((min, max)) => Some((min.min(value), max.max(value))),
            })
    }
}

/// Parse ISO-8601 timestamps as produced by the notes service into epoch milliseconds.
///
/// Accepts RFC 3339, naive date-times (treated as UTC) and plain dates.
pub fn parse_timestamp_ms(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.timestamp_millis());
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed.and_utc().timestamp_millis());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|date_time| date_time.and_utc().timestamp_millis())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn node(id: &str, node_type: &str, tags: &[&str]) -> Node {
        Node {
            id: id.to_owned(),
            title: id.to_uppercase(),
            node_type: node_type.to_owned(),
            status: "active".to_owned(),
            tags: tags.iter().map(|tag| (*tag).to_owned()).collect(),
            ..Node::default()
        }
    }

    pub fn edge(from: &str, to: &str) -> Edge {
        Edge {
            from: from.to_owned(),
            to: to.to_owned(),
            relationship: RelationshipType::RelatedTo,
        }
    }

    /// Three-node graph: a(task,x) b(note,x) c(task,y), edges a->b, b->c, a->c.
    pub fn scenario_graph() -> GraphData {
        GraphData {
            nodes: vec![
                node("a", "task", &["x"]),
                node("b", "note", &["x"]),
                node("c", "task", &["y"]),
            ],
            edges: vec![edge("a", "b"), edge("b", "c"), edge("a", "c")],
        }
    }
}
