use serde::{Deserialize, Serialize};

use crate::activity::DailyActivity;
use crate::model::{Link, Node, NodeId, RelationshipType};
use crate::search::MentionCandidate;

pub const DEFAULT_PLAN_DEPTH: u32 = 2;
pub const DEFAULT_PLAN_RELATIONSHIPS: [RelationshipType; 3] = [
    RelationshipType::DependsOn,
    RelationshipType::RelatedTo,
    RelationshipType::Blocks,
];
pub const DEFAULT_SUGGESTION_THRESHOLD_DAYS: u32 = 14;

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Health {
    #[serde(default)]
    pub status: String,
}

impl Health {
    pub fn is_ok(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("ok")
    }
}

/// `GET /node/{id}` wraps the node and returns the body beside it.
#[derive(Clone, Debug, Deserialize)]
pub(super) struct NodeEnvelope {
    pub node: Node,
    #[serde(default)]
    pub body_md: Option<String>,
}

impl NodeEnvelope {
    pub fn into_node(self) -> Node {
        let mut node = self.node;
        if self.body_md.is_some() {
            node.body_md = self.body_md;
        }
        node
    }
}

/// Partial node update; absent fields are left untouched by the service.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct NodeUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<Link>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_md: Option<String>,
}

impl NodeUpdate {
    pub fn links(links: Vec<Link>) -> Self {
        Self {
            links: Some(links),
            ..Self::default()
        }
    }

    pub fn status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Self::default()
        }
    }

    pub fn node_type(node_type: impl Into<String>) -> Self {
        Self {
            node_type: Some(node_type.into()),
            ..Self::default()
        }
    }

    /// Every editable field of `node`.
    pub fn from_node(node: &Node) -> Self {
        Self {
            title: Some(node.title.clone()),
            node_type: Some(node.node_type.clone()),
            status: Some(node.status.clone()),
            tags: Some(node.tags.clone()),
            priority: node.priority.clone(),
            risk: node.risk.clone(),
            links: Some(node.links.clone()),
            body_md: node.body_md.clone(),
        }
    }

    /// Apply the update locally, as the service would.
    pub fn apply_to(&self, node: &mut Node) {
        if let Some(title) = &self.title {
            node.title.clone_from(title);
        }
        if let Some(node_type) = &self.node_type {
            node.node_type.clone_from(node_type);
        }
        if let Some(status) = &self.status {
            node.status.clone_from(status);
        }
        if let Some(tags) = &self.tags {
            node.tags.clone_from(tags);
        }
        if self.priority.is_some() {
            node.priority.clone_from(&self.priority);
        }
        if self.risk.is_some() {
            node.risk.clone_from(&self.risk);
        }
        if let Some(links) = &self.links {
            node.links.clone_from(links);
        }
        if self.body_md.is_some() {
            node.body_md.clone_from(&self.body_md);
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct WriteReceipt {
    pub id: NodeId,
    #[serde(default)]
    pub source_path: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct WriteResponse {
    pub node: WriteReceipt,
    #[serde(default)]
    pub reindexed: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct NewNode {
    pub title: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub status: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub body_md: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct SearchItem {
    pub id: NodeId,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub(super) struct SearchEnvelope {
    #[serde(default)]
    pub items: Vec<SearchItem>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct PathResult {
    pub found: bool,
    #[serde(default)]
    pub path: Vec<NodeId>,
    #[serde(default)]
    pub length: usize,
    #[serde(default)]
    pub total_weight: f64,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub(super) struct ActivityEnvelope {
    #[serde(default)]
    pub daily_activity: Vec<DailyActivity>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct GraphMetrics {
    #[serde(default)]
    pub node_count: usize,
    #[serde(default)]
    pub edge_count: usize,
    #[serde(default)]
    pub orphan_count: usize,
    #[serde(default)]
    pub avg_degree: f64,
    #[serde(default)]
    pub num_components: usize,
    #[serde(default)]
    pub largest_component_size: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Suggestion {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub priority: String,
}

/// Accepts both a bare list and `{ "<key>": [...] }`.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum ListPayload<T> {
    List(Vec<T>),
    Suggestions { suggestions: Vec<T> },
    Nodes { nodes: Vec<T> },
    Comments { comments: Vec<T> },
}

impl<T> ListPayload<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::List(items)
            | Self::Suggestions { suggestions: items }
            | Self::Nodes { nodes: items }
            | Self::Comments { comments: items } => items,
        }
    }
}

pub type NodeSummary = MentionCandidate;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub replies: Vec<Comment>,
}

impl Comment {
    /// Depth-first with nesting level, for indented rendering.
    pub fn flatten(comments: &[Comment]) -> Vec<(usize, &Comment)> {
        fn walk<'a>(comments: &'a [Comment], depth: usize, out: &mut Vec<(usize, &'a Comment)>) {
            for comment in comments {
                out.push((depth, comment));
                walk(&comment.replies, depth + 1, out);
            }
        }
        let mut out = Vec::new();
        walk(comments, 0, &mut out);
        out
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct NewComment {
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PlanRequest {
    pub selection: Vec<NodeId>,
    pub depth: u32,
    pub include_rel_types: Vec<RelationshipType>,
}

impl PlanRequest {
    pub fn new(selection: Vec<NodeId>) -> Self {
        Self {
            selection,
            depth: DEFAULT_PLAN_DEPTH,
            include_rel_types: DEFAULT_PLAN_RELATIONSHIPS.to_vec(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub markdown: String,
}
