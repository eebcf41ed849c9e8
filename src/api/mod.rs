mod client;
mod types;

pub use client::{ApiClient, DEFAULT_API_BASE_URL, REQUEST_TIMEOUT};
pub use types::{
    Comment, DEFAULT_PLAN_DEPTH, DEFAULT_PLAN_RELATIONSHIPS, DEFAULT_SUGGESTION_THRESHOLD_DAYS,
    GraphMetrics, Health, NewComment, NewNode, NodeSummary, NodeUpdate, PathResult, Plan,
    PlanRequest, SearchItem, Suggestion, WriteReceipt, WriteResponse,
};

#[cfg(test)]
mod tests {
    use super::client::{decode, detail_message, error_from_status};
    use super::types::{ListPayload, NodeEnvelope};
    use super::*;
    use crate::error::BrainMapError;
    use crate::model::{GraphData, Link, RelationshipType};

    fn client(base: &str) -> ApiClient {
        ApiClient::new(base).expect("client")
    }

    #[test]
    fn endpoints_encode_ids_and_keep_base_path() {
        let api = client("http://localhost:8000");
        assert_eq!(api.endpoint(&["graph"]).as_str(), "http://localhost:8000/graph");
        assert_eq!(
            api.endpoint(&["node", "bm 1/2", "position"]).as_str(),
            "http://localhost:8000/node/bm%201%2F2/position"
        );

        let nested = client("https://notes.example.org/api/");
        assert_eq!(
            nested.endpoint(&["insights", "activity"]).as_str(),
            "https://notes.example.org/api/insights/activity"
        );
    }

    #[test]
    fn path_query_carries_both_anchors() {
        let url = client("http://localhost:8000").path_url("bm_a", "bm b");
        assert_eq!(url.as_str(), "http://localhost:8000/path?from=bm_a&to=bm+b");
    }

    #[test]
    fn invalid_base_url_is_a_validation_error() {
        assert!(matches!(
            ApiClient::new("not a url"),
            Err(BrainMapError::Validation(_))
        ));
        assert!(matches!(
            ApiClient::new("mailto:someone@example.org"),
            Err(BrainMapError::Validation(_))
        ));
    }

    #[test]
    fn status_codes_map_onto_the_error_taxonomy() {
        let not_found = error_from_status(
            404,
            r#"{"detail":{"error":"NODE_NOT_FOUND","message":"Node 'x' not found"}}"#,
        );
        assert_eq!(not_found, BrainMapError::NotFound("Node 'x' not found".to_owned()));
        assert!(not_found.should_refresh());

        let invalid = error_from_status(400, r#"{"detail":"tags_mode must be 'all' or 'any'"}"#);
        assert_eq!(
            invalid,
            BrainMapError::Validation("tags_mode must be 'all' or 'any'".to_owned())
        );

        assert_eq!(
            error_from_status(503, "<html>"),
            BrainMapError::Network {
                status: Some(503),
                message: "HTTP 503".to_owned(),
            }
        );
        assert_eq!(
            detail_message(r#"{"detail":[{"msg":"field required"}]}"#).as_deref(),
            Some("field required")
        );
    }

    #[test]
    fn health_status_is_case_insensitive() {
        assert!(decode::<Health>(r#"{"status":"OK"}"#).expect("decode").is_ok());
        assert!(!decode::<Health>(r#"{"status":"degraded"}"#).expect("decode").is_ok());
        assert!(!decode::<Health>("{}").expect("decode").is_ok());
    }

    #[test]
    fn node_detail_merges_body() {
        let envelope: NodeEnvelope = decode(
            r##"{"node":{"id":"bm_1","title":"Cache","type":"Concept","links":[{"to":"bm_2","type":"depends_on"}]},"body_md":"# Notes"}"##,
        )
        .expect("decode");
        let node = envelope.into_node();
        assert_eq!(node.body_md.as_deref(), Some("# Notes"));
        assert_eq!(
            node.links,
            [Link {
                to: "bm_2".to_owned(),
                relationship: RelationshipType::DependsOn,
            }]
        );
    }

    #[test]
    fn graph_without_edges_is_rebuilt_from_links() {
        let mut graph: GraphData = decode(
            r#"{"nodes":[{"id":"a","links":[{"to":"b"}]},{"id":"b"}],"page":{"limit":100}}"#,
        )
        .expect("decode");
        graph.ensure_edges();
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].relationship, RelationshipType::RelatedTo);
    }

    #[test]
    fn list_payloads_accept_bare_and_wrapped_lists() {
        let bare: ListPayload<Suggestion> =
            decode(r#"[{"title":"Review stale inbox","priority":"high"}]"#).expect("bare");
        let wrapped: ListPayload<Suggestion> =
            decode(r#"{"suggestions":[{"title":"Link orphans"}]}"#).expect("wrapped");
        assert_eq!(bare.into_vec()[0].priority, "high");
        assert_eq!(wrapped.into_vec()[0].title, "Link orphans");

        let comments: ListPayload<Comment> = decode(
            r#"{"comments":[{"id":"c1","body":"top","replies":[{"id":"c2","body":"reply"}]}]}"#,
        )
        .expect("comments");
        let tree = comments.into_vec();
        let flat = Comment::flatten(&tree);
        assert_eq!(
            flat.iter().map(|(depth, comment)| (*depth, comment.id.as_str())).collect::<Vec<_>>(),
            [(0, "c1"), (1, "c2")]
        );
    }

    #[test]
    fn path_and_metrics_decode() {
        let path: PathResult =
            decode(r#"{"found":true,"path":["a","b"],"length":1,"total_weight":1.5}"#).expect("path");
        assert!(path.found);
        assert_eq!(path.path, ["a", "b"]);

        let metrics: GraphMetrics =
            decode(r#"{"node_count":3,"edge_count":2,"avg_degree":1.33}"#).expect("metrics");
        assert_eq!(metrics.node_count, 3);
        assert_eq!(metrics.orphan_count, 0);
    }

    #[test]
    fn garbage_bodies_are_decode_errors() {
        assert!(matches!(decode::<PathResult>("{"), Err(BrainMapError::Decode(_))));
        assert!(matches!(decode::<PathResult>(""), Err(BrainMapError::Decode(_))));
    }

    #[test]
    fn partial_updates_only_serialize_present_fields() {
        let update = NodeUpdate::links(vec![Link {
            to: "b".to_owned(),
            relationship: RelationshipType::Blocks,
        }]);
        assert_eq!(
            serde_json::to_string(&update).expect("json"),
            r#"{"links":[{"to":"b","type":"blocks"}]}"#
        );

        let plan = PlanRequest::new(vec!["a".to_owned()]);
        assert_eq!(
            serde_json::to_value(&plan).expect("json")["include_rel_types"],
            serde_json::json!(["depends_on", "related_to", "blocks"])
        );
    }

    #[test]
    fn local_validation_happens_before_any_request() {
        let api = client("http://127.0.0.1:9");
        assert!(matches!(
            api.create_node(&NewNode::default()),
            Err(BrainMapError::Validation(_))
        ));
        assert!(matches!(
            api.generate_plan(&PlanRequest::new(Vec::new())),
            Err(BrainMapError::Validation(_))
        ));
        assert!(matches!(
            api.add_comment("a", &NewComment::default()),
            Err(BrainMapError::Validation(_))
        ));
    }

    #[test]
    fn update_applies_locally() {
        let mut node = crate::model::fixtures::node("a", "inbox", &[]);
        NodeUpdate::node_type("concept").apply_to(&mut node);
        NodeUpdate::status("archived").apply_to(&mut node);
        assert_eq!((node.node_type.as_str(), node.status.as_str()), ("concept", "archived"));
        assert_eq!(NodeUpdate::from_node(&node).title.as_deref(), Some("A"));
    }
}
