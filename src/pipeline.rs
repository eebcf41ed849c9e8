use std::collections::{HashMap, HashSet};

use crate::cluster::{self, ExpandedSet};
use crate::filter::{self, FilterState};
use crate::heat::HeatMetric;
use crate::interaction::{HitTarget, SceneIndex, Selection};
use crate::model::{GraphData, Node, NodeId, NodeType, Position, RelationshipType};
use crate::theme::Palette;
use crate::timeline::Timeline;
use crate::visual::{
    EdgeVisual, NodeVisual, PathState, VisualContext, cluster_edge_visual, cluster_visual,
    edge_visual, node_visual,
};

pub struct PipelineInput<'a> {
    pub graph: &'a GraphData,
    pub filters: &'a FilterState,
    pub expanded: &'a ExpandedSet,
    pub zoom: f64,
    pub timeline: &'a Timeline,
    pub heat: Option<HeatMetric>,
    pub path: &'a PathState,
    pub selection: &'a Selection,
    pub palette: &'a Palette,
    pub now_ms: i64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum RenderKind {
    Node(NodeType),
    Cluster { members: Vec<NodeId> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderNode {
    pub id: String,
    pub label: String,
    pub kind: RenderKind,
    pub position: Option<Position>,
    pub visual: NodeVisual,
    pub hidden: bool,
}

impl RenderNode {
    pub fn is_cluster(&self) -> bool {
        matches!(self.kind, RenderKind::Cluster { .. })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RenderEdge {
    pub from: String,
    pub to: String,
    /// `None` for aggregated cluster edges.
    pub relationship: Option<RelationshipType>,
    pub weight: usize,
    pub visual: EdgeVisual,
    pub hidden: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderSet {
    pub nodes: Vec<RenderNode>,
    pub edges: Vec<RenderEdge>,
    pub matched_count: usize,
    pub total_count: usize,
    pub clustered: bool,
}

impl RenderSet {
    pub fn visible_nodes(&self) -> impl Iterator<Item = &RenderNode> {
        self.nodes.iter().filter(|node| !node.hidden)
    }

    pub fn visible_edges(&self) -> impl Iterator<Item = &RenderEdge> {
        self.edges.iter().filter(|edge| !edge.hidden)
    }

    pub fn node(&self, id: &str) -> Option<&RenderNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Hit areas for visible nodes that have a position.
    pub fn scene_index(&self) -> SceneIndex {
        SceneIndex {
            targets: self
                .visible_nodes()
                .filter_map(|node| {
                    node.position.map(|position| HitTarget {
                        id: node.id.clone(),
                        position,
                        radius: node.visual.size,
                        is_cluster: node.is_cluster(),
                    })
                })
                .collect(),
        }
    }
}

fn centroid(positions: impl Iterator<Item = Position>) -> Option<Position> {
    let (sum, count) = positions.fold((Position::default(), 0usize), |(sum, count), position| {
        (
            Position {
                x: sum.x + position.x,
                y: sum.y + position.y,
            },
            count + 1,
        )
    });
    (count > 0).then(|| Position {
        x: sum.x / count as f64,
        y: sum.y / count as f64,
    })
}

/// Filter, decide between clusters and detail, apply timeline visibility,
/// then attach visual attributes.
pub fn build_render_set(input: &PipelineInput<'_>) -> RenderSet {
    let filtered = filter::filter_graph(input.graph, input.filters, input.now_ms);
    let ctx = VisualContext {
        palette: input.palette,
        filters: input.filters,
        heat: input.heat,
        path: input.path,
        selection: input.selection,
        now_ms: input.now_ms,
    };

    let mut degree: HashMap<&str, usize> = HashMap::new();
    for edge in &filtered.edges {
        *degree.entry(edge.from.as_str()).or_default() += 1;
        *degree.entry(edge.to.as_str()).or_default() += 1;
    }

    let clustered = cluster::use_clusters(input.zoom);
    let mut nodes = Vec::new();
    let mut edges = Vec::new();

    let detail_node = |node: &Node| RenderNode {
        id: node.id.clone(),
        label: node.display_title().to_owned(),
        kind: RenderKind::Node(node.kind()),
        position: node.position,
        visual: node_visual(node, degree.get(node.id.as_str()).copied().unwrap_or_default(), &ctx),
        hidden: input.timeline.is_hidden(node),
    };

    if clustered {
        let view = cluster::build_cluster_view(&filtered.nodes, &filtered.edges, input.expanded);
        for cluster in view.collapsed() {
            nodes.push(RenderNode {
                id: cluster.id.clone(),
                label: cluster.label.clone(),
                kind: RenderKind::Cluster {
                    members: cluster.nodes.iter().map(|node| node.id.clone()).collect(),
                },
                position: centroid(cluster.nodes.iter().filter_map(|node| node.position)),
                visual: cluster_visual(cluster, &ctx),
                hidden: cluster.nodes.iter().all(|node| input.timeline.is_hidden(node)),
            });
        }
        nodes.extend(view.nodes.iter().map(detail_node));

        for cluster_edge in &view.cluster_edges {
            edges.push(RenderEdge {
                from: cluster_edge.from.clone(),
                to: cluster_edge.to.clone(),
                relationship: None,
                weight: cluster_edge.weight,
                visual: cluster_edge_visual(cluster_edge.weight, &ctx),
                hidden: false,
            });
        }
        edges.extend(view.edges.iter().map(|edge| RenderEdge {
            from: edge.from.clone(),
            to: edge.to.clone(),
            relationship: Some(edge.relationship),
            weight: 1,
            visual: edge_visual(edge, &ctx),
            hidden: false,
        }));
    } else {
        nodes.extend(filtered.nodes.iter().map(detail_node));
        edges.extend(filtered.edges.iter().map(|edge| RenderEdge {
            from: edge.from.clone(),
            to: edge.to.clone(),
            relationship: Some(edge.relationship),
            weight: 1,
            visual: edge_visual(edge, &ctx),
            hidden: false,
        }));
    }

    let hidden = nodes
        .iter()
        .filter(|node| node.hidden)
        .map(|node| node.id.clone())
        .collect::<HashSet<_>>();
    for edge in &mut edges {
        edge.hidden = hidden.contains(&edge.from) || hidden.contains(&edge.to);
    }

    RenderSet {
        nodes,
        edges,
        matched_count: filtered.nodes.len(),
        total_count: input.graph.nodes.len(),
        clustered,
    }
}
