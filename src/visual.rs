use std::collections::{HashMap, HashSet};

use crate::cluster::Cluster;
use crate::filter::{self, FilterState};
use crate::heat::{HeatMetric, heat_color};
use crate::interaction::Selection;
use crate::model::{Edge, Node, NodeId, NodeType, RelationshipType};
use crate::theme::{Palette, Rgb};

pub const BASE_NODE_SIZE: f64 = 10.0;
pub const BASE_EDGE_WIDTH: f64 = 1.5;
const FADE_AMOUNT: f64 = 0.75;

/// Nodes and hops of the last path query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathState {
    pub nodes: Vec<NodeId>,
    hops: HashSet<(NodeId, NodeId)>,
}

impl PathState {
    pub fn from_path(path: &[NodeId]) -> Self {
        let hops = path
            .windows(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect();
        Self {
            nodes: path.to_vec(),
            hops,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|node| node == id)
    }

    /// Path hops match in either direction.
    pub fn contains_edge(&self, from: &str, to: &str) -> bool {
        self.hops
            .iter()
            .any(|(a, b)| (a == from && b == to) || (a == to && b == from))
    }
}

pub struct VisualContext<'a> {
    pub palette: &'a Palette,
    pub filters: &'a FilterState,
    pub heat: Option<HeatMetric>,
    pub path: &'a PathState,
    pub selection: &'a Selection,
    pub now_ms: i64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeVisual {
    pub color: Rgb,
    pub size: f64,
    pub border_color: Rgb,
    pub border_width: f64,
    pub faded: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeVisual {
    pub color: Rgb,
    pub width: f64,
    pub highlighted: bool,
    pub faded: bool,
}

fn fade(color: Rgb, palette: &Palette) -> Rgb {
    color.lerp(palette.canvas_background, FADE_AMOUNT)
}

pub fn node_visual(node: &Node, degree: usize, ctx: &VisualContext<'_>) -> NodeVisual {
    let palette = ctx.palette;
    let base = match ctx.heat {
        Some(metric) => heat_color(node.metrics.value(metric)),
        None => palette.node_color(node.kind()),
    };
    let mut visual = NodeVisual {
        color: base,
        size: BASE_NODE_SIZE + degree.min(12) as f64 * 0.5,
        border_color: base,
        border_width: 0.0,
        faded: false,
    };

    let on_path = ctx.path.contains_node(&node.id);
    if on_path {
        visual.border_color = palette.edge_highlight;
        visual.border_width = 3.0;
        visual.size *= 1.2;
    }

    match ctx.selection {
        Selection::Single(id) if *id == node.id => {
            visual.border_color = palette.text;
            visual.border_width = 3.0;
            visual.size *= 1.25;
        }
        Selection::Multi(ids) if ids.contains(&node.id) => {
            visual.border_color = palette.status_info_text;
            visual.border_width = 2.5;
        }
        _ => {}
    }

    let off_path = ctx.path.is_active() && !on_path;
    if off_path || !filter::matches(node, ctx.filters, ctx.now_ms) {
        visual.faded = true;
        visual.color = fade(visual.color, palette);
        visual.border_color = fade(visual.border_color, palette);
    }

    visual
}

pub fn edge_visual(edge: &Edge, ctx: &VisualContext<'_>) -> EdgeVisual {
    let palette = ctx.palette;
    let color = match edge.relationship {
        RelationshipType::RelatedTo | RelationshipType::Other => palette.edge_default,
        relationship => relationship.color(),
    };
    let mut visual = EdgeVisual {
        color,
        width: BASE_EDGE_WIDTH,
        highlighted: false,
        faded: false,
    };

    if ctx.path.is_active() {
        if ctx.path.contains_edge(&edge.from, &edge.to) {
            visual.color = palette.edge_highlight;
            visual.width = 3.0;
            visual.highlighted = true;
        } else {
            visual.faded = true;
            visual.color = fade(visual.color, palette);
        }
        return visual;
    }

    if ctx.selection.contains(&edge.from) || ctx.selection.contains(&edge.to) {
        visual.color = palette.edge_highlight;
        visual.width = 2.0;
        visual.highlighted = true;
    }
    visual
}

/// Supernode styling: most common member type, or mean heat when a metric is shown.
pub fn cluster_visual(cluster: &Cluster, ctx: &VisualContext<'_>) -> NodeVisual {
    let palette = ctx.palette;
    let color = match ctx.heat {
        Some(metric) => {
            let values = cluster
                .nodes
                .iter()
                .filter_map(|node| node.metrics.value(metric))
                .collect::<Vec<_>>();
            let mean = (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64);
            heat_color(mean)
        }
        None => palette.node_color(dominant_kind(&cluster.nodes)),
    };

    let mut visual = NodeVisual {
        color,
        size: 12.0 + (cluster.nodes.len() as f64).sqrt() * 4.0,
        border_color: palette.panel_border,
        border_width: 2.0,
        faded: false,
    };
    if ctx.path.is_active() && !cluster.nodes.iter().any(|node| ctx.path.contains_node(&node.id)) {
        visual.faded = true;
        visual.color = fade(visual.color, palette);
        visual.border_color = fade(visual.border_color, palette);
    }
    visual
}

pub fn cluster_edge_visual(weight: usize, ctx: &VisualContext<'_>) -> EdgeVisual {
    EdgeVisual {
        color: ctx.palette.edge_default,
        width: (BASE_EDGE_WIDTH + (weight as f64).ln_1p() * 1.5).min(8.0),
        highlighted: false,
        faded: ctx.path.is_active(),
    }
}

fn dominant_kind(nodes: &[Node]) -> NodeType {
    let mut counts: HashMap<NodeType, usize> = HashMap::new();
    for node in nodes {
        *counts.entry(node.kind()).or_default() += 1;
    }
    NodeType::ALL
        .into_iter()
        .chain([NodeType::Other])
        .max_by_key(|kind| (counts.get(kind).copied().unwrap_or_default(), std::cmp::Reverse(*kind as u8)))
        .unwrap_or(NodeType::Other)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::compute_clusters;
    use crate::heat::NO_DATA_COLOR;
    use crate::model::fixtures::{edge, node};
    use crate::theme::ThemeMode;

    fn context<'a>(
        filters: &'a FilterState,
        path: &'a PathState,
        selection: &'a Selection,
        heat: Option<HeatMetric>,
    ) -> VisualContext<'a> {
        VisualContext {
            palette: ThemeMode::Light.palette(),
            filters,
            heat,
            path,
            selection,
            now_ms: 0,
        }
    }

    #[test]
    fn type_color_unless_heat_is_shown() {
        let filters = FilterState::default();
        let path = PathState::default();
        let selection = Selection::default();
        let mut item = node("a", "concept", &[]);
        item.metrics.recency = Some(1.0);

        let plain = node_visual(&item, 0, &context(&filters, &path, &selection, None));
        assert_eq!(plain.color.to_hex(), "#3498db");
        assert!(!plain.faded);

        let heat = node_visual(&item, 0, &context(&filters, &path, &selection, Some(HeatMetric::Recency)));
        assert_eq!(heat.color, heat_color(Some(1.0)));
        let missing = node_visual(&item, 0, &context(&filters, &path, &selection, Some(HeatMetric::Task)));
        assert_eq!(missing.color, NO_DATA_COLOR);
    }

    #[test]
    fn selection_enlarges_and_borders() {
        let filters = FilterState::default();
        let path = PathState::default();
        let mut selection = Selection::default();
        selection.select("a");
        let ctx = context(&filters, &path, &selection, None);

        let selected = node_visual(&node("a", "task", &[]), 4, &ctx);
        let other = node_visual(&node("b", "task", &[]), 4, &ctx);
        assert!(selected.size > other.size);
        assert_eq!(selected.border_width, 3.0);
        assert_eq!(other.border_width, 0.0);
    }

    #[test]
    fn active_path_fades_everything_else() {
        let filters = FilterState::default();
        let path = PathState::from_path(&["a".to_owned(), "b".to_owned()]);
        let selection = Selection::default();
        let ctx = context(&filters, &path, &selection, None);

        let on = node_visual(&node("a", "task", &[]), 0, &ctx);
        let off = node_visual(&node("c", "task", &[]), 0, &ctx);
        assert!(!on.faded);
        assert!(off.faded);
        assert_eq!(on.border_color, ctx.palette.edge_highlight);

        let hop = edge_visual(&edge("b", "a"), &ctx);
        let side = edge_visual(&edge("a", "c"), &ctx);
        assert!(hop.highlighted && !hop.faded);
        assert!(side.faded && !side.highlighted);
    }

    #[test]
    fn unmatched_nodes_are_faded() {
        let filters = FilterState {
            node_type: "concept".to_owned(),
            ..FilterState::default()
        };
        let path = PathState::default();
        let selection = Selection::default();
        let ctx = context(&filters, &path, &selection, None);
        assert!(node_visual(&node("a", "task", &[]), 0, &ctx).faded);
        assert!(!node_visual(&node("b", "concept", &[]), 0, &ctx).faded);
    }

    #[test]
    fn edges_use_relationship_colors() {
        let filters = FilterState::default();
        let path = PathState::default();
        let selection = Selection::default();
        let ctx = context(&filters, &path, &selection, None);
        let mut blocking = edge("a", "b");
        blocking.relationship = RelationshipType::Blocks;
        assert_eq!(edge_visual(&blocking, &ctx).color.to_hex(), "#e67e22");
        assert_eq!(edge_visual(&edge("a", "b"), &ctx).color, ctx.palette.edge_default);
    }

    #[test]
    fn clusters_take_the_dominant_member_type() {
        let filters = FilterState::default();
        let path = PathState::default();
        let selection = Selection::default();
        let ctx = context(&filters, &path, &selection, None);
        let clusters = compute_clusters(&[
            node("a", "task", &["x"]),
            node("b", "task", &["x"]),
            node("c", "concept", &["x"]),
        ]);
        let visual = cluster_visual(&clusters[0], &ctx);
        assert_eq!(visual.color, ctx.palette.node_task);
        assert!(visual.size > BASE_NODE_SIZE);
        assert!(cluster_edge_visual(10, &ctx).width > cluster_edge_visual(1, &ctx).width);
    }
}
