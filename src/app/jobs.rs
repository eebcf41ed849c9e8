use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use eframe::egui::Context;

use brain_map::BrainMapError;
use brain_map::activity::DailyActivity;
use brain_map::api::{
    ApiClient, Comment, GraphMetrics, NewNode, NodeSummary, NodeUpdate, PathResult, Plan,
    SearchItem, Suggestion, WriteResponse,
};
use brain_map::model::{Node, NodeId, Position};

type Outcome<T> = Result<T, BrainMapError>;

/// Results of background requests, tagged so stale ones can be dropped.
pub(in crate::app) enum JobOutcome {
    NodeLoaded {
        token: u64,
        result: Outcome<Node>,
    },
    NodeSaved {
        id: NodeId,
        update: NodeUpdate,
        link_token: Option<u64>,
        result: Outcome<WriteResponse>,
    },
    NodeCreated {
        draft: NewNode,
        position: Position,
        result: Outcome<WriteResponse>,
    },
    NodeDeleted {
        id: NodeId,
        result: Outcome<()>,
    },
    PositionSaved {
        id: NodeId,
        token: u64,
        result: Outcome<()>,
    },
    BulkUpdated {
        update: NodeUpdate,
        saved: Vec<NodeId>,
        failed: Vec<(NodeId, BrainMapError)>,
    },
    Search {
        token: u64,
        result: Outcome<Vec<SearchItem>>,
    },
    Path {
        token: u64,
        result: Outcome<PathResult>,
    },
    Comments {
        token: u64,
        id: NodeId,
        result: Outcome<Vec<Comment>>,
    },
    Mentions(Outcome<Vec<NodeSummary>>),
    Metrics(Outcome<GraphMetrics>),
    Suggestions(Outcome<Vec<Suggestion>>),
    Activity(Outcome<Vec<DailyActivity>>),
    Plan {
        token: u64,
        result: Outcome<Plan>,
    },
}

/// One worker thread per request; results come back over a channel and
/// wake the UI.
pub(in crate::app) struct Jobs {
    api: ApiClient,
    ctx: Context,
    tx: Sender<JobOutcome>,
    rx: Receiver<JobOutcome>,
}

impl Jobs {
    pub(in crate::app) fn new(api: ApiClient, ctx: Context) -> Self {
        let (tx, rx) = mpsc::channel();
        Self { api, ctx, tx, rx }
    }

    pub(in crate::app) fn api(&self) -> &ApiClient {
        &self.api
    }

    pub(in crate::app) fn spawn(&self, job: impl FnOnce(&ApiClient) -> JobOutcome + Send + 'static) {
        let api = self.api.clone();
        let tx = self.tx.clone();
        let ctx = self.ctx.clone();
        thread::spawn(move || {
            let _ = tx.send(job(&api));
            ctx.request_repaint();
        });
    }

    pub(in crate::app) fn drain(&self) -> Vec<JobOutcome> {
        self.rx.try_iter().collect()
    }
}
