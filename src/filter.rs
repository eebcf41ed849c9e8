use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::model::{GraphData, Node};

const DAY_MS: i64 = 86_400_000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BooleanMode {
    #[default]
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

impl BooleanMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "AND" => Some(Self::And),
            "OR" => Some(Self::Or),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recency {
    #[default]
    #[serde(rename = "all")]
    All,
    #[serde(rename = "7d")]
    Week,
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
}

impl Recency {
    pub const ALL: [Self; 4] = [Self::All, Self::Week, Self::Month, Self::Quarter];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Week => "7d",
            Self::Month => "30d",
            Self::Quarter => "90d",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::All => "All time",
            Self::Week => "Last 7 days",
            Self::Month => "Last 30 days",
            Self::Quarter => "Last 90 days",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|recency| recency.as_str().eq_ignore_ascii_case(value.trim()))
    }

    pub fn window_ms(self) -> Option<i64> {
        match self {
            Self::All => None,
            Self::Week => Some(7 * DAY_MS),
            Self::Month => Some(30 * DAY_MS),
            Self::Quarter => Some(90 * DAY_MS),
        }
    }
}

/// Field filters; empty strings mean "unset".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterState {
    #[serde(rename = "type")]
    pub node_type: String,
    pub status: String,
    pub tags: String,
    pub recency: Recency,
    pub priority: String,
    pub risk: String,
    #[serde(rename = "booleanMode")]
    pub boolean_mode: BooleanMode,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterField {
    Type,
    Status,
    Tags,
    Recency,
    Priority,
    Risk,
}

impl FilterField {
    pub const ALL: [Self; 6] = [
        Self::Type,
        Self::Status,
        Self::Tags,
        Self::Recency,
        Self::Priority,
        Self::Risk,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Status => "status",
            Self::Tags => "tags",
            Self::Recency => "recency",
            Self::Priority => "priority",
            Self::Risk => "risk",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Type => "Type",
            Self::Status => "Status",
            Self::Tags => "Tags",
            Self::Recency => "Recency",
            Self::Priority => "Priority",
            Self::Risk => "Risk",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterChip {
    pub field: FilterField,
    pub label: &'static str,
    pub value: String,
}

impl FilterState {
    pub fn quick_inbox() -> Self {
        Self {
            node_type: "Inbox".to_owned(),
            ..Self::default()
        }
    }

    /// Raw value of a field, or `None` when the field is unset.
    pub fn value(&self, field: FilterField) -> Option<&str> {
        let value = match field {
            FilterField::Type => self.node_type.as_str(),
            FilterField::Status => self.status.as_str(),
            FilterField::Tags => self.tags.as_str(),
            FilterField::Recency => match self.recency {
                Recency::All => "",
                recency => recency.as_str(),
            },
            FilterField::Priority => self.priority.as_str(),
            FilterField::Risk => self.risk.as_str(),
        };
        (!value.trim().is_empty()).then_some(value)
    }

    pub fn set(&mut self, field: FilterField, value: &str) {
        match field {
            FilterField::Type => self.node_type = value.to_owned(),
            FilterField::Status => self.status = value.to_owned(),
            FilterField::Tags => self.tags = value.to_owned(),
            FilterField::Recency => self.recency = Recency::parse(value).unwrap_or_default(),
            FilterField::Priority => self.priority = value.to_owned(),
            FilterField::Risk => self.risk = value.to_owned(),
        }
    }

    pub fn clear(&mut self, field: FilterField) {
        self.set(field, "");
    }

    /// Clears every field; the boolean mode survives a reset.
    pub fn reset(&mut self) {
        *self = Self {
            boolean_mode: self.boolean_mode,
            ..Self::default()
        };
    }

    pub fn is_empty(&self) -> bool {
        FilterField::ALL
            .into_iter()
            .all(|field| self.value(field).is_none())
    }

    pub fn active_chips(&self) -> Vec<FilterChip> {
        FilterField::ALL
            .into_iter()
            .filter_map(|field| {
                self.value(field).map(|value| FilterChip {
                    field,
                    label: field.label(),
                    value: value.to_owned(),
                })
            })
            .collect()
    }

    pub fn tag_set(&self) -> HashSet<String> {
        self.tags
            .split(',')
            .map(|tag| tag.trim().to_lowercase())
            .filter(|tag| !tag.is_empty())
            .collect()
    }

    /// Query-string form with default values omitted.
    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for field in FilterField::ALL {
            if let Some(value) = self.value(field) {
                serializer.append_pair(field.key(), value);
            }
        }
        if self.boolean_mode != BooleanMode::default() {
            serializer.append_pair("mode", self.boolean_mode.as_str());
        }
        serializer.finish()
    }

    /// Seed filters from a query string. Unknown keys and bad values are ignored.
    pub fn from_query_string(query: &str) -> Self {
        let query = query.trim_start_matches('?');
        let mut filters = Self::default();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            if key == "mode" {
                if let Some(mode) = BooleanMode::parse(&value) {
                    filters.boolean_mode = mode;
                }
                continue;
            }
            if let Some(field) = FilterField::ALL.into_iter().find(|field| field.key() == key) {
                filters.set(field, &value);
            }
        }
        filters
    }
}

/// One boolean per active field, in field order.
pub fn active_checks(node: &Node, filters: &FilterState, now_ms: i64) -> Vec<bool> {
    let mut checks = Vec::with_capacity(FilterField::ALL.len());

    if let Some(node_type) = filters.value(FilterField::Type) {
        checks.push(node.node_type.eq_ignore_ascii_case(node_type.trim()));
    }
    if let Some(status) = filters.value(FilterField::Status) {
        checks.push(node.status.eq_ignore_ascii_case(status.trim()));
    }
    if filters.value(FilterField::Tags).is_some() {
        let wanted = filters.tag_set();
        checks.push(
            node.tags
                .iter()
                .any(|tag| wanted.contains(&tag.to_lowercase())),
        );
    }
    if let Some(window) = filters.recency.window_ms() {
        checks.push(
            node.updated_ms()
                .is_some_and(|updated| now_ms - updated <= window),
        );
    }
    if let Some(priority) = filters.value(FilterField::Priority) {
        checks.push(node.priority.as_deref() == Some(priority));
    }
    if let Some(risk) = filters.value(FilterField::Risk) {
        checks.push(
            node.risk
                .as_deref()
                .is_some_and(|value| value.eq_ignore_ascii_case(risk.trim())),
        );
    }

    checks
}

pub fn matches(node: &Node, filters: &FilterState, now_ms: i64) -> bool {
    let checks = active_checks(node, filters, now_ms);
    if checks.is_empty() {
        return true;
    }
    match filters.boolean_mode {
        BooleanMode::And => checks.iter().all(|check| *check),
        BooleanMode::Or => checks.iter().any(|check| *check),
    }
}

pub fn count_matches(nodes: &[Node], filters: &FilterState, now_ms: i64) -> usize {
    nodes
        .iter()
        .filter(|node| matches(node, filters, now_ms))
        .count()
}

/// Matched nodes plus the edges whose endpoints both survived.
pub fn filter_graph(graph: &GraphData, filters: &FilterState, now_ms: i64) -> GraphData {
    let nodes = graph
        .nodes
        .iter()
        .filter(|node| matches(node, filters, now_ms))
        .cloned()
        .collect::<Vec<_>>();
    let kept = nodes
        .iter()
        .map(|node| node.id.as_str())
        .collect::<HashSet<_>>();
    let edges = graph
        .edges
        .iter()
        .filter(|edge| kept.contains(edge.from.as_str()) && kept.contains(edge.to.as_str()))
        .cloned()
        .collect();

    GraphData { nodes, edges }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{node, scenario_graph};

    const NOW: i64 = 1_700_000_000_000;

    fn ids(graph: &GraphData) -> Vec<&str> {
        graph.nodes.iter().map(|node| node.id.as_str()).collect()
    }

    #[test]
    fn empty_filters_match_everything_in_both_modes() {
        let graph = scenario_graph();
        for mode in [BooleanMode::And, BooleanMode::Or] {
            let filters = FilterState {
                boolean_mode: mode,
                ..FilterState::default()
            };
            assert!(filters.is_empty());
            assert_eq!(count_matches(&graph.nodes, &filters, NOW), 3);
        }
        assert!(matches(&Node::default(), &FilterState::default(), NOW));
    }

    #[test]
    fn type_filter_keeps_tasks() {
        let graph = scenario_graph();
        let filters = FilterState {
            node_type: "TASK".to_owned(),
            ..FilterState::default()
        };
        let filtered = filter_graph(&graph, &filters, NOW);
        assert_eq!(ids(&filtered), ["a", "c"]);
        assert_eq!(filtered.edges.len(), 1);
        assert_eq!((filtered.edges[0].from.as_str(), filtered.edges[0].to.as_str()), ("a", "c"));
    }

    #[test]
    fn or_mode_accepts_any_active_check() {
        let graph = scenario_graph();
        let filters = FilterState {
            node_type: "task".to_owned(),
            tags: "y".to_owned(),
            boolean_mode: BooleanMode::Or,
            ..FilterState::default()
        };
        assert_eq!(ids(&filter_graph(&graph, &filters, NOW)), ["a", "c"]);

        let and = FilterState {
            boolean_mode: BooleanMode::And,
            ..filters
        };
        assert_eq!(ids(&filter_graph(&graph, &and, NOW)), ["c"]);
    }

    #[test]
    fn or_count_dominates_and_count() {
        let mut nodes = scenario_graph().nodes;
        nodes[1].status = "done".to_owned();
        nodes[2].priority = Some("P1".to_owned());
        let combos = [
            ("task", "", "", ""),
            ("task", "done", "", ""),
            ("", "active", "x, y", "P1"),
            ("note", "", "y", "P1"),
        ];
        for (node_type, status, tags, priority) in combos {
            let mut filters = FilterState {
                node_type: node_type.to_owned(),
                status: status.to_owned(),
                tags: tags.to_owned(),
                priority: priority.to_owned(),
                ..FilterState::default()
            };
            let and = count_matches(&nodes, &filters, NOW);
            filters.boolean_mode = BooleanMode::Or;
            let or = count_matches(&nodes, &filters, NOW);
            assert!(or >= and);
            if filters.active_chips().len() <= 1 {
                assert_eq!(or, and);
            }
        }
    }

    #[test]
    fn tags_match_any_listed_tag_in_both_modes() {
        let tagged = node("n", "concept", &["A", "b"]);
        for mode in [BooleanMode::And, BooleanMode::Or] {
            let filters = FilterState {
                tags: " b , C ".to_owned(),
                boolean_mode: mode,
                ..FilterState::default()
            };
            assert!(matches(&tagged, &filters, NOW));
        }
        let filters = FilterState {
            tags: "c".to_owned(),
            ..FilterState::default()
        };
        assert!(!matches(&tagged, &filters, NOW));
    }

    #[test]
    fn recency_window_uses_updated_at() {
        let mut fresh = node("fresh", "task", &[]);
        fresh.updated_at = Some("2023-11-10T00:00:00Z".to_owned());
        let mut stale = node("stale", "task", &[]);
        stale.updated_at = Some("2023-01-01T00:00:00Z".to_owned());
        let undated = node("undated", "task", &[]);

        let filters = FilterState {
            recency: Recency::Week,
            ..FilterState::default()
        };
        let now = crate::model::parse_timestamp_ms("2023-11-14T00:00:00Z").expect("timestamp");
        assert!(matches(&fresh, &filters, now));
        assert!(!matches(&stale, &filters, now));
        assert!(!matches(&undated, &filters, now));
    }

    #[test]
    fn priority_is_case_sensitive_and_risk_is_not() {
        let mut item = node("n", "task", &[]);
        item.priority = Some("P0".to_owned());
        item.risk = Some("High".to_owned());

        let mut filters = FilterState {
            priority: "p0".to_owned(),
            ..FilterState::default()
        };
        assert!(!matches(&item, &filters, NOW));
        filters.priority = "P0".to_owned();
        filters.risk = "high".to_owned();
        assert!(matches(&item, &filters, NOW));
    }

    #[test]
    fn filtered_edges_never_dangle() {
        let graph = scenario_graph();
        for node_type in ["", "task", "note", "missing"] {
            let filters = FilterState {
                node_type: node_type.to_owned(),
                ..FilterState::default()
            };
            let filtered = filter_graph(&graph, &filters, NOW);
            let kept = ids(&filtered);
            assert!(filtered
                .edges
                .iter()
                .all(|edge| kept.contains(&edge.from.as_str()) && kept.contains(&edge.to.as_str())));
        }
    }

    #[test]
    fn query_string_omits_defaults() {
        assert_eq!(FilterState::default().to_query_string(), "");

        let filters = FilterState {
            node_type: "Task".to_owned(),
            tags: "a,b".to_owned(),
            recency: Recency::Month,
            boolean_mode: BooleanMode::Or,
            ..FilterState::default()
        };
        let query = filters.to_query_string();
        assert_eq!(query, "type=Task&tags=a%2Cb&recency=30d&mode=OR");
        assert_eq!(FilterState::from_query_string(&format!("?{query}")), filters);
    }

    #[test]
    fn query_string_ignores_unknown_values() {
        let filters = FilterState::from_query_string("recency=1y&mode=XOR&colour=red&status=done");
        assert_eq!(filters.recency, Recency::All);
        assert_eq!(filters.boolean_mode, BooleanMode::And);
        assert_eq!(filters.status, "done");
    }

    #[test]
    fn chips_track_active_fields_and_clear_individually() {
        let mut filters = FilterState {
            status: "blocked".to_owned(),
            recency: Recency::Week,
            boolean_mode: BooleanMode::Or,
            ..FilterState::default()
        };
        let chips = filters.active_chips();
        assert_eq!(chips.len(), 2);
        assert_eq!(chips[1].field, FilterField::Recency);
        assert_eq!(chips[1].value, "7d");

        filters.clear(FilterField::Recency);
        assert_eq!(filters.recency, Recency::All);
        assert_eq!(filters.active_chips().len(), 1);

        filters.reset();
        assert!(filters.is_empty());
        assert_eq!(filters.boolean_mode, BooleanMode::Or);
    }
}
