use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use eframe::egui::{self, Context};
use log::{debug, info, warn};

use brain_map::activity::ActivityCalendar;
use brain_map::api::{
    ApiClient, Comment, DEFAULT_SUGGESTION_THRESHOLD_DAYS, GraphMetrics, Health, NodeSummary,
    PathResult, SearchItem, Suggestion,
};
use brain_map::cluster::ExpandedSet;
use brain_map::filter::FilterState;
use brain_map::heat::HeatMetric;
use brain_map::interaction::{Controller, LinkEdits, NoticeLevel, SceneIndex, Viewport};
use brain_map::layout::{Layout, LayoutConfig};
use brain_map::model::{GraphData, Node, NodeId, Position, RelationshipType};
use brain_map::pipeline::RenderSet;
use brain_map::search::{Debouncer, KeyedGate, RequestGate};
use brain_map::settings::Settings;
use brain_map::theme::ThemeMode;
use brain_map::timeline::Playback;
use brain_map::view_state::{SharedView, ViewLibrary};
use brain_map::visual::PathState;

mod actions;
mod graph;
mod jobs;
mod render_utils;
mod ui;

use jobs::Jobs;

const SUCCESS_NOTICE: Duration = Duration::from_secs(3);
const ERROR_NOTICE: Duration = Duration::from_secs(6);

/// Everything the viewer needs besides the graph itself.
pub struct Session {
    pub settings: Settings,
    pub export_dir: PathBuf,
    pub theme: Option<ThemeMode>,
    pub filters: Option<FilterState>,
    pub shared_view: Option<String>,
}

pub struct BrainMapApp {
    api: ApiClient,
    session: Option<Session>,
    state: AppState,
    reload_rx: Option<Receiver<Result<GraphData, String>>>,
    health: HealthCheck,
}

/// Liveness check shown next to a failed load.
#[derive(Default)]
enum HealthCheck {
    #[default]
    Idle,
    Running(Receiver<Result<Health, String>>),
    Done(Result<Health, String>),
}

impl HealthCheck {
    fn start(api: ApiClient) -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let _ = tx.send(api.health().map_err(|error| error.to_string()));
        });
        Self::Running(rx)
    }

    fn poll(&mut self) {
        if let Self::Running(rx) = self {
            match rx.try_recv() {
                Ok(result) => *self = Self::Done(result),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    *self = Self::Done(Err("Health check worker disconnected".to_owned()));
                }
            }
        }
    }

    fn summary(&self) -> Option<String> {
        match self {
            Self::Idle => None,
            Self::Running(_) => Some("Checking service health...".to_owned()),
            Self::Done(Ok(health)) if health.is_ok() => {
                Some("Service is up; the graph request itself failed.".to_owned())
            }
            Self::Done(Ok(health)) => Some(format!("Service reports status {:?}", health.status)),
            Self::Done(Err(error)) => Some(format!("Service unreachable: {error}")),
        }
    }
}

enum AppState {
    Loading {
        rx: Receiver<Result<GraphData, String>>,
    },
    Ready(Box<ViewModel>),
    Error(String),
}

struct ViewModel {
    jobs: Jobs,
    settings: Settings,
    export_dir: PathBuf,
    graph: GraphData,
    theme: ThemeMode,
    filters: FilterState,
    /// Bookmarkable form of `filters`, accepted back by `--filters`.
    filter_query: String,
    tag_input: String,
    expanded: ExpandedSet,
    playback: Playback,
    heat: Option<HeatMetric>,
    hotspots_expanded: bool,
    path: PathState,
    path_result: Option<PathResult>,
    controller: Controller,
    layout: Layout,
    layout_config: LayoutConfig,
    render: RenderSet,
    render_dirty: bool,
    reload_requested: bool,
    scene: SceneIndex,
    canvas_press: bool,
    views: ViewLibrary,
    view_name: String,
    share_input: String,
    notices: Vec<Notice>,
    gates: Gates,
    search: SearchPalette,
    editor: Option<Editor>,
    new_link: NewLink,
    comments: CommentThread,
    quick_add: QuickAdd,
    insights: Insights,
    activity: ActivityPanel,
    plan: PlanPanel,
    context_menu: Option<(NodeId, Position)>,
    presentation: bool,
    pending_screenshot: bool,
}

struct Notice {
    level: NoticeLevel,
    message: String,
    expires: Instant,
}

#[derive(Default)]
struct Gates {
    node: RequestGate,
    search: RequestGate,
    path: RequestGate,
    comments: RequestGate,
    plan: RequestGate,
    positions: KeyedGate,
    links: LinkEdits,
}

#[derive(Default)]
struct SearchPalette {
    open: bool,
    query: String,
    debouncer: Debouncer,
    results: Vec<SearchItem>,
    loading: bool,
}

/// Working copy of the selected node.
struct Editor {
    draft: Node,
    tags: String,
    saving: bool,
}

#[derive(Default)]
struct NewLink {
    target: String,
    relationship: RelationshipType,
}

#[derive(Default)]
struct CommentThread {
    node_id: Option<NodeId>,
    tree: Vec<Comment>,
    draft: String,
    reply_to: Option<String>,
    candidates: Option<Vec<NodeSummary>>,
    loading: bool,
    posting: bool,
}

struct QuickAdd {
    open: bool,
    title: String,
    body: String,
    node_type: String,
    status: String,
    tags: String,
}

impl Default for QuickAdd {
    fn default() -> Self {
        Self {
            open: false,
            title: String::new(),
            body: String::new(),
            node_type: "Inbox".to_owned(),
            status: "active".to_owned(),
            tags: String::new(),
        }
    }
}

struct Insights {
    open: bool,
    threshold_days: u32,
    metrics: Option<GraphMetrics>,
    suggestions: Vec<Suggestion>,
    loading: bool,
}

impl Default for Insights {
    fn default() -> Self {
        Self {
            open: false,
            threshold_days: DEFAULT_SUGGESTION_THRESHOLD_DAYS,
            metrics: None,
            suggestions: Vec::new(),
            loading: false,
        }
    }
}

#[derive(Default)]
struct ActivityPanel {
    open: bool,
    calendar: Option<ActivityCalendar>,
    loading: bool,
}

#[derive(Default)]
struct PlanPanel {
    open: bool,
    markdown: Option<String>,
    loading: bool,
}

impl BrainMapApp {
    pub fn new(cc: &eframe::CreationContext<'_>, api: ApiClient, session: Session) -> Self {
        let theme = session.theme.unwrap_or_else(|| session.settings.theme());
        apply_theme(&cc.egui_ctx, theme);
        let state = Self::start_load(api.clone());
        Self {
            api,
            session: Some(session),
            state,
            reload_rx: None,
            health: HealthCheck::Idle,
        }
    }

    fn spawn_load(api: ApiClient) -> Receiver<Result<GraphData, String>> {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = api.graph().map_err(|error| error.to_string());
            let _ = tx.send(result);
        });

        rx
    }

    fn start_load(api: ApiClient) -> AppState {
        info!("loading graph from {}", api.base_url());
        AppState::Loading {
            rx: Self::spawn_load(api),
        }
    }
}

pub(in crate::app) fn apply_theme(ctx: &Context, theme: ThemeMode) {
    ctx.set_visuals(match theme {
        ThemeMode::Light => egui::Visuals::light(),
        ThemeMode::Dark => egui::Visuals::dark(),
    });
}

impl eframe::App for BrainMapApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match &mut self.state {
            AppState::Loading { rx } => {
                match rx.try_recv() {
                    Ok(Ok(graph)) => {
                        transition = Some(match self.session.take() {
                            Some(session) => AppState::Ready(Box::new(ViewModel::new(
                                ctx,
                                self.api.clone(),
                                session,
                                graph,
                            ))),
                            None => AppState::Error("Viewer session was already started".to_owned()),
                        });
                    }
                    Ok(Err(error)) => {
                        warn!("graph load failed: {error}");
                        self.health = HealthCheck::start(self.api.clone());
                        transition = Some(AppState::Error(error));
                    }
                    Err(TryRecvError::Empty) => {}
                    Err(TryRecvError::Disconnected) => {
                        transition = Some(AppState::Error("Background load worker disconnected".to_owned()));
                    }
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Loading knowledge graph...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
                ctx.request_repaint_after(Duration::from_millis(100));
            }
            AppState::Error(error) => {
                self.health.poll();
                if matches!(self.health, HealthCheck::Running(_)) {
                    ctx.request_repaint_after(Duration::from_millis(100));
                }
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to load the knowledge graph");
                    ui.add_space(6.0);
                    ui.label(error.as_str());
                    ui.label(format!("API: {}", self.api.base_url()));
                    if let Some(summary) = self.health.summary() {
                        ui.label(summary);
                    }
                    ui.add_space(10.0);
                    ui.horizontal(|ui| {
                        if ui.button("Retry").clicked() {
                            transition = Some(Self::start_load(self.api.clone()));
                        }
                        let idle = !matches!(self.health, HealthCheck::Running(_));
                        if ui.add_enabled(idle, egui::Button::new("Check service")).clicked() {
                            self.health = HealthCheck::start(self.api.clone());
                        }
                    });
                });
            }
            AppState::Ready(model) => {
                let mut reload_requested = false;
                let is_reloading = self.reload_rx.is_some();
                model.show(ctx, &mut reload_requested, is_reloading);

                if reload_requested && self.reload_rx.is_none() {
                    self.reload_rx = Some(Self::spawn_load(self.api.clone()));
                }

                if let Some(rx) = self.reload_rx.take() {
                    match rx.try_recv() {
                        Ok(Ok(graph)) => model.replace_graph(graph),
                        Ok(Err(error)) => model.notify(NoticeLevel::Error, format!("Reload failed: {error}")),
                        Err(TryRecvError::Empty) => {
                            self.reload_rx = Some(rx);
                            ctx.request_repaint_after(Duration::from_millis(100));
                        }
                        Err(TryRecvError::Disconnected) => {
                            model.notify(NoticeLevel::Error, "Background load worker disconnected");
                        }
                    }
                }
            }
        }

        if let Some(next_state) = transition {
            self.reload_rx = None;
            self.state = next_state;
        }
    }
}

impl ViewModel {
    fn new(ctx: &Context, api: ApiClient, session: Session, graph: GraphData) -> Self {
        let theme = session.theme.unwrap_or_else(|| session.settings.theme());
        let views = session.settings.view_library();
        let mut model = Self {
            jobs: Jobs::new(api, ctx.clone()),
            settings: session.settings,
            export_dir: session.export_dir,
            graph,
            theme,
            filters: session.filters.unwrap_or_default(),
            filter_query: String::new(),
            tag_input: String::new(),
            expanded: ExpandedSet::new(),
            playback: Playback::default(),
            heat: None,
            hotspots_expanded: false,
            path: PathState::default(),
            path_result: None,
            controller: Controller::default(),
            layout: Layout::default(),
            layout_config: LayoutConfig::default(),
            render: RenderSet::default(),
            render_dirty: true,
            reload_requested: false,
            scene: SceneIndex::default(),
            canvas_press: false,
            views,
            view_name: String::new(),
            share_input: String::new(),
            notices: Vec::new(),
            gates: Gates::default(),
            search: SearchPalette::default(),
            editor: None,
            new_link: NewLink::default(),
            comments: CommentThread::default(),
            quick_add: QuickAdd::default(),
            insights: Insights::default(),
            activity: ActivityPanel::default(),
            plan: PlanPanel::default(),
            context_menu: None,
            presentation: false,
            pending_screenshot: false,
        };
        model.tag_input.clone_from(&model.filters.tags);
        model.filters_changed();
        if let Some(payload) = session.shared_view {
            model.open_shared_payload(&payload);
        }
        info!(
            "graph ready: {} nodes, {} edges",
            model.graph.nodes.len(),
            model.graph.edges.len()
        );
        model
    }

    fn replace_graph(&mut self, graph: GraphData) {
        info!("graph reloaded: {} nodes", graph.nodes.len());
        self.graph = graph;
        self.playback.refresh_range(&self.graph);
        let stale = self
            .controller
            .selection()
            .ids()
            .into_iter()
            .any(|id| self.graph.node(&id).is_none());
        if stale {
            self.controller.selection_mut().clear();
            self.on_selection_changed();
        }
        self.render_dirty = true;
    }

    fn notify(&mut self, level: NoticeLevel, message: impl Into<String>) {
        let message = message.into();
        let lifetime = match level {
            NoticeLevel::Error => ERROR_NOTICE,
            NoticeLevel::Info | NoticeLevel::Success => SUCCESS_NOTICE,
        };
        if level == NoticeLevel::Error {
            warn!("{message}");
        }
        self.notices.push(Notice {
            level,
            message,
            expires: Instant::now() + lifetime,
        });
    }

    fn viewport(&self) -> Viewport {
        *self.controller.viewport()
    }

    fn apply_shared_view(&mut self, view: SharedView) {
        self.filters = view.filters;
        self.tag_input.clone_from(&self.filters.tags);
        *self.controller.viewport_mut() = Viewport::from_camera(view.camera, view.zoom);
        self.filters_changed();
    }

    fn filters_changed(&mut self) {
        self.filter_query = self.filters.to_query_string();
        debug!("filters: {:?}", self.filter_query);
        self.render_dirty = true;
    }
}
