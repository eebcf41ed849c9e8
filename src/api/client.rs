use std::time::Duration;

use log::{debug, warn};
use reqwest::Method;
use reqwest::blocking::{Client, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use super::types::{
    ActivityEnvelope, Comment, GraphMetrics, Health, ListPayload, NewComment, NewNode,
    NodeEnvelope, NodeSummary, NodeUpdate, PathResult, Plan, PlanRequest, SearchEnvelope,
    SearchItem, Suggestion, WriteResponse,
};
use crate::activity::DailyActivity;
use crate::error::{BrainMapError, Result};
use crate::model::{GraphData, Node, Position};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Blocking client for the notes service. Cheap to clone; share one per app.
#[derive(Clone, Debug)]
pub struct ApiClient {
    base: Url,
    http: Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|error| BrainMapError::validation(format!("invalid API base URL {base_url:?}: {error}")))?;
        if base.cannot_be_a_base() {
            return Err(BrainMapError::validation(format!(
                "API base URL {base_url:?} cannot carry a path"
            )));
        }
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| BrainMapError::network(format!("failed to build HTTP client: {error}")))?;
        Ok(Self { base, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Joins path segments onto the base, percent-encoding each one.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub fn health(&self) -> Result<Health> {
        self.fetch(self.http.get(self.endpoint(&["health"])))
    }

    /// The whole dataset; filtering happens locally.
    pub fn graph(&self) -> Result<GraphData> {
        let mut graph: GraphData = self.fetch(self.http.get(self.endpoint(&["graph"])))?;
        graph.ensure_edges();
        debug!(
            "loaded graph with {} nodes and {} edges",
            graph.nodes.len(),
            graph.edges.len()
        );
        Ok(graph)
    }

    pub fn node(&self, id: &str) -> Result<Node> {
        let envelope: NodeEnvelope = self.fetch(self.http.get(self.endpoint(&["node", id])))?;
        Ok(envelope.into_node())
    }

    pub fn update_node(&self, id: &str, update: &NodeUpdate) -> Result<WriteResponse> {
        self.send(Method::PUT, self.endpoint(&["node", id]), update)
    }

    pub fn create_node(&self, node: &NewNode) -> Result<WriteResponse> {
        if node.title.trim().is_empty() {
            return Err(BrainMapError::validation("Title is required"));
        }
        self.send(Method::POST, self.endpoint(&["node"]), node)
    }

    pub fn delete_node(&self, id: &str) -> Result<()> {
        self.execute(self.http.delete(self.endpoint(&["node", id])))
            .map(drop)
    }

    pub fn persist_position(&self, id: &str, position: Position) -> Result<()> {
        self.execute(
            self.http
                .put(self.endpoint(&["node", id, "position"]))
                .json(&position),
        )
        .map(drop)
    }

    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchItem>> {
        let mut url = self.endpoint(&["search"]);
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("limit", &limit.to_string());
        let envelope: SearchEnvelope = self.fetch(self.http.get(url))?;
        Ok(envelope.items)
    }

    pub fn path(&self, from: &str, to: &str) -> Result<PathResult> {
        self.fetch(self.http.get(self.path_url(from, to)))
    }

    pub fn path_url(&self, from: &str, to: &str) -> Url {
        let mut url = self.endpoint(&["path"]);
        url.query_pairs_mut()
            .append_pair("from", from)
            .append_pair("to", to);
        url
    }

    pub fn activity(&self) -> Result<Vec<DailyActivity>> {
        let envelope: ActivityEnvelope =
            self.fetch(self.http.get(self.endpoint(&["insights", "activity"])))?;
        Ok(envelope.daily_activity)
    }

    pub fn metrics(&self) -> Result<GraphMetrics> {
        self.fetch(self.http.get(self.endpoint(&["metrics"])))
    }

    pub fn suggestions(&self, threshold_days: u32) -> Result<Vec<Suggestion>> {
        let mut url = self.endpoint(&["insights", "suggestions"]);
        url.query_pairs_mut()
            .append_pair("threshold_days", &threshold_days.to_string());
        let payload: ListPayload<Suggestion> = self.fetch(self.http.get(url))?;
        Ok(payload.into_vec())
    }

    /// Lightweight listing for `@mention` completion.
    pub fn nodes(&self) -> Result<Vec<NodeSummary>> {
        let payload: ListPayload<NodeSummary> = self.fetch(self.http.get(self.endpoint(&["nodes"])))?;
        Ok(payload.into_vec())
    }

    pub fn comments(&self, id: &str) -> Result<Vec<Comment>> {
        let payload: ListPayload<Comment> =
            self.fetch(self.http.get(self.endpoint(&["node", id, "comments"])))?;
        Ok(payload.into_vec())
    }

    /// Returns the updated comment tree.
    pub fn add_comment(&self, id: &str, comment: &NewComment) -> Result<Vec<Comment>> {
        if comment.body.trim().is_empty() {
            return Err(BrainMapError::validation("Comment cannot be empty"));
        }
        let payload: ListPayload<Comment> =
            self.send(Method::POST, self.endpoint(&["node", id, "comments"]), comment)?;
        Ok(payload.into_vec())
    }

    pub fn generate_plan(&self, request: &PlanRequest) -> Result<Plan> {
        if request.selection.is_empty() {
            return Err(BrainMapError::validation("Select at least one node"));
        }
        self.send(Method::POST, self.endpoint(&["generate-plan"]), request)
    }

    fn send<B, T>(&self, method: Method, url: Url, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.fetch(self.http.request(method, url).json(body))
    }

    fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        decode(&self.execute(request)?)
    }

    fn execute(&self, request: RequestBuilder) -> Result<String> {
        let response = request.send().map_err(|error| {
            warn!("request failed: {error}");
            BrainMapError::network(error.to_string())
        })?;
        let status = response.status();
        let url = response.url().clone();
        let body = response
            .text()
            .map_err(|error| BrainMapError::network(format!("failed to read response: {error}")))?;
        if status.is_success() {
            debug!("{url} -> {status}");
            Ok(body)
        } else {
            warn!("{url} -> {status}");
            Err(error_from_status(status.as_u16(), &body))
        }
    }
}

/// Decode a response body; an empty body decodes as JSON `null`.
pub(super) fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    let body = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(body).map_err(|error| BrainMapError::Decode(error.to_string()))
}

/// The service reports failures as `{"detail": "..."}` or
/// `{"detail": {"error": "...", "message": "..."}}`.
pub(super) fn detail_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(message) => Some(message.clone()),
        Value::Object(detail) => detail
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_owned),
        Value::Array(errors) => errors
            .first()
            .and_then(|error| error.get("msg"))
            .and_then(Value::as_str)
            .map(str::to_owned),
        _ => None,
    }
}

pub(super) fn error_from_status(status: u16, body: &str) -> BrainMapError {
    let message = detail_message(body).unwrap_or_else(|| format!("HTTP {status}"));
    match status {
        400 | 422 => BrainMapError::Validation(message),
        404 => BrainMapError::NotFound(message),
        _ => BrainMapError::Network {
            status: Some(status),
            message,
        },
    }
}
