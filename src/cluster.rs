use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::model::{Edge, Node, NodeId};

/// Below this zoom ratio the graph renders cluster supernodes.
pub const CLUSTER_ZOOM_THRESHOLD: f64 = 0.5;
/// Above this zoom ratio every detail is shown. Between the two thresholds
/// the full node set is still rendered.
pub const DETAIL_ZOOM_THRESHOLD: f64 = 1.0;

pub const CLUSTER_ID_PREFIX: &str = "cluster_";

pub type ExpandedSet = BTreeSet<String>;

pub fn use_clusters(zoom: f64) -> bool {
    zoom < CLUSTER_ZOOM_THRESHOLD
}

pub fn cluster_id(tag: &str) -> String {
    format!("{CLUSTER_ID_PREFIX}{tag}")
}

/// Flip a cluster between collapsed and expanded. Returns the new expanded flag.
pub fn toggle_expanded(expanded: &mut ExpandedSet, id: &str) -> bool {
    if expanded.remove(id) {
        false
    } else {
        expanded.insert(id.to_owned());
        true
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Cluster {
    pub id: String,
    pub label: String,
    pub nodes: Vec<Node>,
    pub tags: Vec<String>,
    pub expanded: bool,
}

impl Cluster {
    pub fn tag(&self) -> &str {
        self.tags.first().map(String::as_str).unwrap_or_default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.iter().any(|node| node.id == id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClusterEdge {
    pub from: String,
    pub to: String,
    pub weight: usize,
}

/// Partition nodes by primary tag. Clusters are ordered by tag and keep the
/// input order of their members.
pub fn compute_clusters(nodes: &[Node]) -> Vec<Cluster> {
    let mut groups: BTreeMap<&str, Vec<Node>> = BTreeMap::new();
    for node in nodes {
        groups
            .entry(node.primary_tag())
            .or_default()
            .push(node.clone());
    }

    groups
        .into_iter()
        .map(|(tag, members)| Cluster {
            id: cluster_id(tag),
            label: format!("{tag} ({})", members.len()),
            nodes: members,
            tags: vec![tag.to_owned()],
            expanded: false,
        })
        .collect()
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClusterView {
    pub clusters: Vec<Cluster>,
    /// Members of expanded clusters, rendered individually.
    pub nodes: Vec<Node>,
    /// Aggregated edges between two collapsed clusters.
    pub cluster_edges: Vec<ClusterEdge>,
    /// Original edges touching an expanded member. An endpoint inside a
    /// collapsed cluster is replaced by that cluster's id.
    pub edges: Vec<Edge>,
}

impl ClusterView {
    pub fn collapsed(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter().filter(|cluster| !cluster.expanded)
    }

    pub fn cluster(&self, id: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|cluster| cluster.id == id)
    }
}

pub fn build_cluster_view(nodes: &[Node], edges: &[Edge], expanded: &ExpandedSet) -> ClusterView {
    let mut clusters = compute_clusters(nodes);
    for cluster in &mut clusters {
        cluster.expanded = expanded.contains(&cluster.id);
    }

    let owner: HashMap<&str, (&str, bool)> = clusters
        .iter()
        .flat_map(|cluster| {
            cluster
                .nodes
                .iter()
                .map(move |node| (node.id.as_str(), (cluster.id.as_str(), cluster.expanded)))
        })
        .collect();

    let mut weights: BTreeMap<(String, String), usize> = BTreeMap::new();
    let mut member_edges = Vec::new();
    let mut seen = HashSet::new();

    for edge in edges {
        let (Some(&(from_cluster, from_open)), Some(&(to_cluster, to_open))) =
            (owner.get(edge.from.as_str()), owner.get(edge.to.as_str()))
        else {
            continue;
        };

        if !from_open && !to_open {
            if from_cluster == to_cluster {
                continue;
            }
            let key = if from_cluster <= to_cluster {
                (from_cluster.to_owned(), to_cluster.to_owned())
            } else {
                (to_cluster.to_owned(), from_cluster.to_owned())
            };
            *weights.entry(key).or_default() += 1;
            continue;
        }

        let endpoint = |id: &NodeId, cluster: &str, open: bool| {
            if open { id.clone() } else { cluster.to_owned() }
        };
        let mapped = Edge {
            from: endpoint(&edge.from, from_cluster, from_open),
            to: endpoint(&edge.to, to_cluster, to_open),
            relationship: edge.relationship,
        };
        if seen.insert(mapped.clone()) {
            member_edges.push(mapped);
        }
    }

    let expanded_nodes = clusters
        .iter()
        .filter(|cluster| cluster.expanded)
        .flat_map(|cluster| cluster.nodes.iter().cloned())
        .collect();

    ClusterView {
        clusters,
        nodes: expanded_nodes,
        cluster_edges: weights
            .into_iter()
            .map(|((from, to), weight)| ClusterEdge { from, to, weight })
            .collect(),
        edges: member_edges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{edge, node, scenario_graph};

    #[test]
    fn clusters_partition_by_primary_tag() {
        let graph = scenario_graph();
        let clusters = compute_clusters(&graph.nodes);

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].id, "cluster_x");
        assert_eq!(clusters[0].label, "x (2)");
        let x_members = clusters[0]
            .nodes
            .iter()
            .map(|node| node.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(x_members, ["a", "b"]);
        assert_eq!(clusters[1].id, "cluster_y");
        assert_eq!(clusters[1].label, "y (1)");
    }

    #[test]
    fn every_node_lands_in_exactly_one_cluster() {
        let nodes = vec![
            node("a", "task", &["x", "y"]),
            node("b", "task", &[]),
            node("c", "task", &["y"]),
            node("d", "task", &["x"]),
            node("e", "task", &[]),
        ];
        let clusters = compute_clusters(&nodes);

        let mut seen = clusters
            .iter()
            .flat_map(|cluster| cluster.nodes.iter().map(|node| node.id.clone()))
            .collect::<Vec<_>>();
        seen.sort();
        assert_eq!(seen, ["a", "b", "c", "d", "e"]);

        for cluster in &clusters {
            let count = cluster.nodes.len();
            assert!(cluster.label.ends_with(&format!("({count})")));
        }
        assert!(clusters.iter().any(|cluster| cluster.id == "cluster_untagged"));
    }

    #[test]
    fn recomputation_is_idempotent() {
        let graph = scenario_graph();
        let expanded = ExpandedSet::new();
        assert_eq!(
            build_cluster_view(&graph.nodes, &graph.edges, &expanded),
            build_cluster_view(&graph.nodes, &graph.edges, &expanded)
        );
    }

    #[test]
    fn collapsed_clusters_aggregate_edge_weights() {
        let graph = scenario_graph();
        let view = build_cluster_view(&graph.nodes, &graph.edges, &ExpandedSet::new());

        assert!(view.nodes.is_empty());
        assert!(view.edges.is_empty());
        assert_eq!(
            view.cluster_edges,
            [ClusterEdge {
                from: "cluster_x".to_owned(),
                to: "cluster_y".to_owned(),
                weight: 2,
            }]
        );
    }

    #[test]
    fn expanded_members_use_original_edges() {
        let graph = scenario_graph();
        let mut expanded = ExpandedSet::new();
        assert!(toggle_expanded(&mut expanded, "cluster_x"));

        let view = build_cluster_view(&graph.nodes, &graph.edges, &expanded);
        assert!(view.cluster_edges.is_empty());
        assert_eq!(view.collapsed().count(), 1);
        let members = view.nodes.iter().map(|node| node.id.as_str()).collect::<Vec<_>>();
        assert_eq!(members, ["a", "b"]);

        let pairs = view
            .edges
            .iter()
            .map(|edge| (edge.from.as_str(), edge.to.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(pairs, [("a", "b"), ("b", "cluster_y"), ("a", "cluster_y")]);

        assert!(!toggle_expanded(&mut expanded, "cluster_x"));
        assert!(expanded.is_empty());
    }

    #[test]
    fn edges_to_filtered_out_nodes_are_ignored() {
        let nodes = vec![node("a", "task", &["x"]), node("b", "task", &["y"])];
        let edges = vec![edge("a", "b"), edge("a", "gone"), edge("b", "a")];
        let view = build_cluster_view(&nodes, &edges, &ExpandedSet::new());
        assert_eq!(view.cluster_edges.len(), 1);
        assert_eq!(view.cluster_edges[0].weight, 2);
    }

    #[test]
    fn zoom_switch_is_binary_at_lower_threshold() {
        assert!(use_clusters(0.49));
        assert!(!use_clusters(CLUSTER_ZOOM_THRESHOLD));
        assert!(!use_clusters(0.75));
        assert!(!use_clusters(DETAIL_ZOOM_THRESHOLD));
    }
}
