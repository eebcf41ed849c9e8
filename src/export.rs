use std::collections::HashMap;

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::model::{GraphData, Node, Position};
use crate::pipeline::{RenderKind, RenderNode, RenderSet};
use crate::theme::Palette;

const SVG_PADDING: f64 = 40.0;
const EXPORT_STEM: &str = "brain-map";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Png,
    Svg,
    GraphMl,
    Markdown,
}

impl ExportFormat {
    pub const ALL: [Self; 4] = [Self::Png, Self::Svg, Self::GraphMl, Self::Markdown];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Svg => "svg",
            Self::GraphMl => "graphml",
            Self::Markdown => "md",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Png => "PNG image",
            Self::Svg => "SVG vector",
            Self::GraphMl => "GraphML",
            Self::Markdown => "Markdown table",
        }
    }

    pub fn file_name(self) -> String {
        format!("{EXPORT_STEM}.{}", self.extension())
    }
}

fn position_of(node: &RenderNode) -> Position {
    node.position.unwrap_or_default()
}

/// Standalone SVG of the visible render set.
pub fn render_svg(set: &RenderSet, palette: &Palette) -> String {
    let visible = set.visible_nodes().collect::<Vec<_>>();
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (0.0_f64, 0.0_f64, 0.0_f64, 0.0_f64);
    for (index, node) in visible.iter().enumerate() {
        let position = position_of(node);
        let radius = node.visual.size;
        if index == 0 {
            (min_x, min_y, max_x, max_y) = (
                position.x - radius,
                position.y - radius,
                position.x + radius,
                position.y + radius,
            );
            continue;
        }
        min_x = min_x.min(position.x - radius);
        min_y = min_y.min(position.y - radius);
        max_x = max_x.max(position.x + radius);
        max_y = max_y.max(position.y + radius);
    }
    let origin_x = min_x - SVG_PADDING;
    let origin_y = min_y - SVG_PADDING;
    let width = (max_x - min_x) + SVG_PADDING * 2.0;
    let height = (max_y - min_y) + SVG_PADDING * 2.0;

    let mut svg = String::new();
    svg.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width:.0}\" height=\"{height:.0}\" viewBox=\"{origin_x:.1} {origin_y:.1} {width:.1} {height:.1}\" font-family=\"system-ui, sans-serif\">\n"
    ));
    svg.push_str(&format!(
        "  <rect x=\"{origin_x:.1}\" y=\"{origin_y:.1}\" width=\"{width:.1}\" height=\"{height:.1}\" fill=\"{}\" />\n",
        palette.canvas_background.to_hex()
    ));

    let positions = visible
        .iter()
        .map(|node| (node.id.as_str(), position_of(node)))
        .collect::<HashMap<_, _>>();
    for edge in set.visible_edges() {
        let (Some(from), Some(to)) = (positions.get(edge.from.as_str()), positions.get(edge.to.as_str()))
        else {
            continue;
        };
        let opacity = if edge.visual.faded { 0.3 } else { 0.9 };
        svg.push_str(&format!(
            "  <line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" stroke=\"{}\" stroke-width=\"{:.1}\" stroke-opacity=\"{opacity}\" />\n",
            from.x,
            from.y,
            to.x,
            to.y,
            edge.visual.color.to_hex(),
            edge.visual.width,
        ));
    }

    for node in &visible {
        let position = position_of(node);
        let visual = &node.visual;
        svg.push_str(&format!(
            "  <circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"{:.1}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"{:.1}\"><title>{}</title></circle>\n",
            position.x,
            position.y,
            visual.size,
            visual.color.to_hex(),
            visual.border_color.to_hex(),
            visual.border_width,
            encode_text(&node.id),
        ));
        svg.push_str(&format!(
            "  <text x=\"{:.1}\" y=\"{:.1}\" fill=\"{}\" font-size=\"12\" text-anchor=\"middle\">{}</text>\n",
            position.x,
            position.y + visual.size + 14.0,
            palette.text.to_hex(),
            encode_text(&node.label),
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

/// GraphML with a fixed attribute schema.
pub fn render_graphml(set: &RenderSet, graph: &GraphData) -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\">\n");
    for (id, name, kind) in [
        ("d0", "label", "string"),
        ("d1", "type", "string"),
        ("d2", "status", "string"),
        ("d3", "x", "double"),
        ("d4", "y", "double"),
        ("d5", "size", "double"),
        ("d6", "color", "string"),
    ] {
        xml.push_str(&format!(
            "  <key id=\"{id}\" for=\"node\" attr.name=\"{name}\" attr.type=\"{kind}\"/>\n"
        ));
    }
    xml.push_str("  <key id=\"d7\" for=\"edge\" attr.name=\"relationship_type\" attr.type=\"string\"/>\n");
    xml.push_str("  <graph id=\"G\" edgedefault=\"directed\">\n");

    for node in set.visible_nodes() {
        let (node_type, status) = match &node.kind {
            RenderKind::Node(_) => graph
                .node(&node.id)
                .map(|source| (source.node_type.as_str(), source.status.as_str()))
                .unwrap_or_default(),
            RenderKind::Cluster { .. } => ("cluster", ""),
        };
        let position = position_of(node);
        xml.push_str(&format!(
            "    <node id=\"{}\">\n",
            encode_double_quoted_attribute(&node.id)
        ));
        for (key, value) in [
            ("d0", node.label.clone()),
            ("d1", node_type.to_owned()),
            ("d2", status.to_owned()),
            ("d3", format!("{:.2}", position.x)),
            ("d4", format!("{:.2}", position.y)),
            ("d5", format!("{:.2}", node.visual.size)),
            ("d6", node.visual.color.to_hex()),
        ] {
            xml.push_str(&format!(
                "      <data key=\"{key}\">{}</data>\n",
                encode_text(&value)
            ));
        }
        xml.push_str("    </node>\n");
    }

    for (index, edge) in set.visible_edges().enumerate() {
        let relationship = edge
            .relationship
            .map(|relationship| relationship.as_str().to_owned())
            .unwrap_or_else(|| format!("aggregate:{}", edge.weight));
        xml.push_str(&format!(
            "    <edge id=\"e{index}\" source=\"{}\" target=\"{}\">\n      <data key=\"d7\">{}</data>\n    </edge>\n",
            encode_double_quoted_attribute(&edge.from),
            encode_double_quoted_attribute(&edge.to),
            encode_text(&relationship),
        ));
    }

    xml.push_str("  </graph>\n</graphml>\n");
    xml
}

fn markdown_cell(value: &str) -> String {
    value.replace('|', "\\|").replace('\n', " ")
}

/// One row per visible node; collapsed clusters contribute their members.
pub fn render_markdown(set: &RenderSet, graph: &GraphData) -> String {
    let mut rows: Vec<&Node> = Vec::new();
    for node in set.visible_nodes() {
        match &node.kind {
            RenderKind::Node(_) => rows.extend(graph.node(&node.id)),
            RenderKind::Cluster { members } => {
                rows.extend(members.iter().filter_map(|id| graph.node(id)));
            }
        }
    }

    let mut table = String::from("| ID | Title | Type | Status | Tags |\n|----|-------|------|--------|------|\n");
    for node in rows {
        table.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            markdown_cell(&node.id),
            markdown_cell(&node.title),
            markdown_cell(&node.node_type),
            markdown_cell(&node.status),
            markdown_cell(&node.tags.join(", ")),
        ));
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ExpandedSet;
    use crate::filter::FilterState;
    use crate::interaction::Selection;
    use crate::model::fixtures::scenario_graph;
    use crate::pipeline::{PipelineInput, build_render_set};
    use crate::theme::ThemeMode;
    use crate::timeline::Timeline;
    use crate::visual::PathState;

    fn render(graph: &GraphData, zoom: f64) -> RenderSet {
        build_render_set(&PipelineInput {
            graph,
            filters: &FilterState::default(),
            expanded: &ExpandedSet::new(),
            zoom,
            timeline: &Timeline::default(),
            heat: None,
            path: &PathState::default(),
            selection: &Selection::default(),
            palette: ThemeMode::Light.palette(),
            now_ms: 0,
        })
    }

    fn positioned_graph() -> GraphData {
        let mut graph = scenario_graph();
        for (index, node) in graph.nodes.iter_mut().enumerate() {
            node.position = Some(Position {
                x: index as f64 * 100.0,
                y: 50.0,
            });
        }
        graph.nodes[0].title = "Cache <layer> & \"friends\"".to_owned();
        graph
    }

    #[test]
    fn export_file_names_share_a_stem() {
        assert_eq!(ExportFormat::GraphMl.file_name(), "brain-map.graphml");
        assert_eq!(ExportFormat::Markdown.file_name(), "brain-map.md");
    }

    #[test]
    fn svg_contains_every_visible_node_and_edge() {
        let graph = positioned_graph();
        let svg = render_svg(&render(&graph, 1.0), ThemeMode::Light.palette());
        assert!(svg.starts_with("<?xml"));
        assert_eq!(svg.matches("<circle").count(), 3);
        assert_eq!(svg.matches("<line").count(), 3);
        assert!(svg.contains("Cache &lt;layer&gt; &amp;"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn graphml_declares_fixed_schema() {
        let graph = positioned_graph();
        let xml = render_graphml(&render(&graph, 1.0), &graph);
        for name in ["label", "type", "status", "x", "y", "size", "color", "relationship_type"] {
            assert!(xml.contains(&format!("attr.name=\"{name}\"")), "missing {name}");
        }
        assert_eq!(xml.matches("<node ").count(), 3);
        assert_eq!(xml.matches("<edge ").count(), 3);
        assert!(xml.contains("<data key=\"d7\">related_to</data>"));
        assert!(xml.contains("<data key=\"d3\">100.00</data>"));
        assert!(!xml.contains("<layer>"));
    }

    #[test]
    fn markdown_lists_cluster_members() {
        let graph = positioned_graph();
        let table = render_markdown(&render(&graph, 0.2), &graph);
        let lines = table.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "| ID | Title | Type | Status | Tags |");
        assert!(lines[2].starts_with("| a | Cache <layer>"));
        assert!(lines.iter().any(|line| line.starts_with("| c | C | task | active | y |")));
    }

    #[test]
    fn markdown_escapes_pipes() {
        assert_eq!(markdown_cell("a|b\nc"), "a\\|b c");
    }
}
