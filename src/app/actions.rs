use std::fs;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use log::{debug, info};

use brain_map::BrainMapError;
use brain_map::api::{NewComment, NewNode, NodeSummary, NodeUpdate, PlanRequest};
use brain_map::activity::build_calendar;
use brain_map::export::{ExportFormat, render_graphml, render_markdown, render_svg};
use brain_map::interaction::{NoticeLevel, validate_link};
use brain_map::model::{Link, Node, NodeId, Position, RelationshipType};
use brain_map::search::SEARCH_LIMIT;
use brain_map::theme::ThemeMode;
use brain_map::view_state::{SharedView, decode_share, share_from_url};
use brain_map::visual::PathState;

use super::jobs::JobOutcome;
use super::{Editor, ViewModel, apply_theme};

pub(in crate::app) fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect()
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl ViewModel {
    pub(in crate::app) fn on_selection_changed(&mut self) {
        self.render_dirty = true;
        self.context_menu = None;
        self.gates.node.invalidate();
        self.gates.comments.invalidate();

        let Some(id) = self.controller.selection().single().map(str::to_owned) else {
            self.editor = None;
            self.comments = Default::default();
            return;
        };
        let Some(node) = self.graph.node(&id).cloned() else {
            self.editor = None;
            return;
        };

        self.editor = Some(Editor {
            tags: node.tags.join(", "),
            draft: node,
            saving: false,
        });
        let token = self.gates.node.begin();
        let fetch_id = id.clone();
        self.jobs.spawn(move |api| JobOutcome::NodeLoaded {
            token,
            result: api.node(&fetch_id),
        });
        self.load_comments(id);
    }

    pub(in crate::app) fn select_node(&mut self, id: &str, center: bool) {
        self.controller.selection_mut().select(id);
        if center && let Some(position) = self.layout.position(id) {
            let zoom = self.viewport().zoom;
            let viewport = self.controller.viewport_mut();
            viewport.pan = Position::new(-position.x * zoom, -position.y * zoom);
        }
        self.on_selection_changed();
    }

    fn load_comments(&mut self, id: NodeId) {
        let token = self.gates.comments.begin();
        self.comments.node_id = Some(id.clone());
        self.comments.tree.clear();
        self.comments.reply_to = None;
        self.comments.loading = true;
        self.jobs.spawn(move |api| JobOutcome::Comments {
            token,
            result: api.comments(&id),
            id,
        });
    }

    pub(in crate::app) fn load_mentions(&mut self) {
        if self.comments.candidates.is_some() {
            return;
        }
        self.comments.candidates = Some(Vec::new());
        self.jobs.spawn(|api| JobOutcome::Mentions(api.nodes()));
    }

    pub(in crate::app) fn post_comment(&mut self) {
        let Some(id) = self.comments.node_id.clone() else {
            return;
        };
        let comment = NewComment {
            body: self.comments.draft.trim().to_owned(),
            parent_id: self.comments.reply_to.clone(),
        };
        if comment.body.is_empty() {
            self.notify(NoticeLevel::Error, "Comment cannot be empty");
            return;
        }
        let token = self.gates.comments.begin();
        self.comments.loading = true;
        self.comments.posting = true;
        self.jobs.spawn(move |api| JobOutcome::Comments {
            token,
            result: api.add_comment(&id, &comment),
            id,
        });
    }

    pub(in crate::app) fn save_editor(&mut self) {
        let Some(editor) = self.editor.as_mut() else {
            return;
        };
        if editor.draft.title.trim().is_empty() {
            self.notify(NoticeLevel::Error, "Title is required");
            return;
        }
        editor.draft.tags = split_tags(&editor.tags);
        editor.saving = true;
        let update = NodeUpdate::from_node(&editor.draft);
        let id = editor.draft.id.clone();
        self.spawn_update(id, update, None);
    }

    fn spawn_update(&self, id: NodeId, update: NodeUpdate, link_token: Option<u64>) {
        self.jobs.spawn(move |api| JobOutcome::NodeSaved {
            result: api.update_node(&id, &update),
            id,
            update,
            link_token,
        });
    }

    fn spawn_link_update(&mut self, source: &str, links: Vec<Link>) {
        let Some(token) = self.gates.links.begin(&mut self.graph, source, links.clone()) else {
            return;
        };
        self.refresh_editor_links(source);
        self.render_dirty = true;
        self.spawn_update(source.to_owned(), NodeUpdate::links(links), Some(token));
    }

    fn refresh_editor_links(&mut self, id: &str) {
        if let Some(editor) = self.editor.as_mut()
            && editor.draft.id == id
            && let Some(node) = self.graph.node(id)
        {
            editor.draft.links.clone_from(&node.links);
        }
    }

    pub(in crate::app) fn promote(&mut self, id: &str) {
        self.spawn_update(id.to_owned(), NodeUpdate::node_type("Concept"), None);
    }

    pub(in crate::app) fn archive(&mut self, id: &str) {
        self.spawn_update(id.to_owned(), NodeUpdate::status("archived"), None);
    }

    pub(in crate::app) fn bulk_update(&mut self, update: NodeUpdate) {
        let ids = self.controller.selection().ids();
        if ids.is_empty() {
            return;
        }
        info!("bulk update of {} nodes", ids.len());
        self.jobs.spawn(move |api| {
            let mut saved = Vec::new();
            let mut failed = Vec::new();
            for id in ids {
                match api.update_node(&id, &update) {
                    Ok(_) => saved.push(id),
                    Err(error) => failed.push((id, error)),
                }
            }
            JobOutcome::BulkUpdated {
                update,
                saved,
                failed,
            }
        });
    }

    pub(in crate::app) fn delete_node(&mut self, id: &str) {
        let id = id.to_owned();
        self.jobs.spawn(move |api| JobOutcome::NodeDeleted {
            result: api.delete_node(&id),
            id,
        });
    }

    pub(in crate::app) fn add_link(&mut self, source: &str, target: &str, relationship: RelationshipType) {
        if let Err(error) = validate_link(&self.graph, source, target) {
            self.notify(NoticeLevel::Error, error.to_string());
            return;
        }
        let Some(node) = self.graph.node(source) else {
            return;
        };
        let mut links = node.links.clone();
        links.push(Link {
            to: target.to_owned(),
            relationship,
        });
        debug!("linking {source} -> {target} ({})", relationship.as_str());
        self.spawn_link_update(source, links);
    }

    pub(in crate::app) fn remove_link(&mut self, source: &str, index: usize) {
        let Some(node) = self.graph.node(source) else {
            return;
        };
        let mut links = node.links.clone();
        if index >= links.len() {
            return;
        }
        links.remove(index);
        self.spawn_link_update(source, links);
    }

    pub(in crate::app) fn place_node(&mut self, position: Position) {
        let draft = NewNode {
            title: self.quick_add.title.trim().to_owned(),
            node_type: self.quick_add.node_type.clone(),
            status: self.quick_add.status.clone(),
            tags: split_tags(&self.quick_add.tags),
            body_md: self.quick_add.body.trim().to_owned(),
            links: Vec::new(),
        };
        if draft.title.is_empty() || draft.body_md.is_empty() {
            self.notify(NoticeLevel::Error, "Title and body are required before placing a node");
            return;
        }
        self.jobs.spawn(move |api| JobOutcome::NodeCreated {
            result: api.create_node(&draft),
            draft,
            position,
        });
    }

    pub(in crate::app) fn persist_position(&mut self, id: NodeId, position: Position) {
        if let Some(node) = self.graph.node_mut(&id) {
            node.position = Some(position);
        }
        let token = self.gates.positions.begin(&id);
        self.jobs.spawn(move |api| JobOutcome::PositionSaved {
            result: api.persist_position(&id, position),
            id,
            token,
        });
    }

    pub(in crate::app) fn find_path(&mut self, from: NodeId, to: NodeId) {
        let token = self.gates.path.begin();
        self.jobs.spawn(move |api| JobOutcome::Path {
            token,
            result: api.path(&from, &to),
        });
    }

    pub(in crate::app) fn clear_path(&mut self) {
        self.gates.path.invalidate();
        self.path = PathState::default();
        self.path_result = None;
        self.render_dirty = true;
    }

    pub(in crate::app) fn run_search(&mut self, query: String) {
        let token = self.gates.search.begin();
        self.search.loading = true;
        self.jobs.spawn(move |api| JobOutcome::Search {
            token,
            result: api.search(&query, SEARCH_LIMIT),
        });
    }

    pub(in crate::app) fn refresh_insights(&mut self) {
        self.insights.loading = true;
        let threshold_days = self.insights.threshold_days;
        self.jobs.spawn(|api| JobOutcome::Metrics(api.metrics()));
        self.jobs
            .spawn(move |api| JobOutcome::Suggestions(api.suggestions(threshold_days)));
    }

    pub(in crate::app) fn load_activity(&mut self) {
        self.activity.loading = true;
        self.jobs.spawn(|api| JobOutcome::Activity(api.activity()));
    }

    pub(in crate::app) fn generate_plan(&mut self) {
        let request = PlanRequest::new(self.controller.selection().ids());
        let token = self.gates.plan.begin();
        self.plan.open = true;
        self.plan.loading = true;
        self.plan.markdown = None;
        self.jobs.spawn(move |api| JobOutcome::Plan {
            token,
            result: api.generate_plan(&request),
        });
    }

    pub(in crate::app) fn set_theme(&mut self, ctx: &eframe::egui::Context, theme: ThemeMode) {
        self.theme = theme;
        apply_theme(ctx, theme);
        self.render_dirty = true;
        if let Err(error) = self.settings.set_theme(theme) {
            self.notify(NoticeLevel::Error, error.to_string());
        }
    }

    pub(in crate::app) fn save_view(&mut self) {
        let shared = self.current_view();
        let name = self.view_name.clone();
        let saved = self
            .views
            .save(&name, shared, now_ms())
            .map(|view| view.name.clone());
        match saved.and_then(|name| self.settings.save_views(&self.views).map(|()| name)) {
            Ok(name) => {
                info!("saved view {name}");
                self.view_name.clear();
                self.notify(NoticeLevel::Success, format!("Saved view \"{name}\""));
            }
            Err(error) => self.notify(NoticeLevel::Error, error.to_string()),
        }
    }

    pub(in crate::app) fn apply_view(&mut self, name: &str) {
        let Some(view) = self.views.get(name) else {
            return;
        };
        info!("applying view {name}");
        self.apply_shared_view(view.shared());
    }

    pub(in crate::app) fn delete_view(&mut self, name: &str) {
        match self
            .views
            .delete(name)
            .and_then(|_| self.settings.save_views(&self.views))
        {
            Ok(()) => self.notify(NoticeLevel::Info, format!("Deleted view \"{name}\"")),
            Err(error) => self.notify(NoticeLevel::Error, error.to_string()),
        }
    }

    pub(in crate::app) fn current_view(&self) -> SharedView {
        let viewport = self.viewport();
        SharedView {
            filters: self.filters.clone(),
            zoom: viewport.zoom,
            camera: viewport.camera(),
        }
    }

    /// Accepts a full share link or a bare payload.
    pub(in crate::app) fn open_shared_payload(&mut self, input: &str) {
        let input = input.trim();
        let decoded = if input.contains("://") {
            share_from_url(input).and_then(|view| {
                view.ok_or_else(|| BrainMapError::MalformedShare("link carries no view".to_owned()))
            })
        } else {
            decode_share(input)
        };
        match decoded {
            Ok(view) => {
                self.apply_shared_view(view);
                self.notify(NoticeLevel::Info, "Opened shared view");
            }
            Err(error) => self.notify(NoticeLevel::Error, error.to_string()),
        }
    }

    pub(in crate::app) fn export(&mut self, format: ExportFormat) {
        if format == ExportFormat::Png {
            self.pending_screenshot = true;
            return;
        }
        let result = self.write_export(format);
        self.report_export(result);
    }

    pub(in crate::app) fn report_export(&mut self, result: Result<PathBuf>) {
        match result {
            Ok(path) => {
                info!("exported {}", path.display());
                self.notify(NoticeLevel::Success, format!("Exported {}", path.display()));
            }
            Err(error) => self.notify(NoticeLevel::Error, format!("{error:#}")),
        }
    }

    fn write_export(&self, format: ExportFormat) -> Result<PathBuf> {
        let content = match format {
            ExportFormat::Svg => render_svg(&self.render, self.theme.palette()),
            ExportFormat::GraphMl => render_graphml(&self.render, &self.graph),
            ExportFormat::Markdown => render_markdown(&self.render, &self.graph),
            ExportFormat::Png => anyhow::bail!("PNG exports come from a screenshot"),
        };
        let path = self.export_dir.join(format.file_name());
        fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    pub(in crate::app) fn write_screenshot(&self, image: &eframe::egui::ColorImage) -> Result<PathBuf> {
        let mut bytes = Vec::with_capacity(image.pixels.len() * 4);
        for pixel in &image.pixels {
            let (r, g, b, a) = pixel.to_tuple();
            bytes.extend_from_slice(&[r, g, b, a]);
        }
        let path = self.export_dir.join(ExportFormat::Png.file_name());
        image::save_buffer(
            &path,
            &bytes,
            image.size[0] as u32,
            image.size[1] as u32,
            image::ColorType::Rgba8,
        )
        .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    pub(in crate::app) fn mention_candidates(&self) -> Vec<NodeSummary> {
        match &self.comments.candidates {
            Some(candidates) if !candidates.is_empty() => candidates.clone(),
            _ => self
                .graph
                .nodes
                .iter()
                .map(|node| NodeSummary {
                    id: node.id.clone(),
                    title: node.title.clone(),
                })
                .collect(),
        }
    }

    pub(in crate::app) fn poll_jobs(&mut self) {
        for outcome in self.jobs.drain() {
            self.apply_outcome(outcome);
        }
    }

    fn apply_outcome(&mut self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::NodeLoaded { token, result } => {
                if !self.gates.node.is_current(token) {
                    return;
                }
                match result {
                    Ok(node) => {
                        if let Some(editor) = self.editor.as_mut()
                            && editor.draft.id == node.id
                            && !editor.saving
                        {
                            editor.tags = node.tags.join(", ");
                            editor.draft = node.clone();
                        }
                        self.graph.apply_node_update(node);
                        self.render_dirty = true;
                    }
                    Err(error) => self.request_failed(error),
                }
            }
            JobOutcome::NodeSaved {
                id,
                update,
                link_token,
                result,
            } => {
                if let Some(editor) = self.editor.as_mut()
                    && editor.draft.id == id
                {
                    editor.saving = false;
                }
                match result {
                    Ok(response) => {
                        // Link edits are already shown; replaying them could undo a newer one.
                        match (link_token, &update.links) {
                            (Some(token), Some(links)) => self.gates.links.succeeded(&id, token, links),
                            _ => self.apply_local_update(&id, &update),
                        }
                        let message = if response.reindexed { "Saved and reindexed" } else { "Saved" };
                        self.notify(NoticeLevel::Success, message);
                    }
                    Err(error) => {
                        if let Some(token) = link_token
                            && self.gates.links.failed(&mut self.graph, &id, token)
                        {
                            self.refresh_editor_links(&id);
                            self.render_dirty = true;
                        }
                        self.request_failed(error);
                    }
                }
            }
            JobOutcome::NodeCreated {
                draft,
                position,
                result,
            } => match result {
                Ok(response) => {
                    let id = response.node.id;
                    let node = Node {
                        id: id.clone(),
                        title: draft.title,
                        node_type: draft.node_type,
                        status: draft.status,
                        tags: draft.tags,
                        body_md: Some(draft.body_md),
                        created_at: response.node.created_at,
                        updated_at: response.node.updated_at,
                        source_path: response.node.source_path,
                        position: Some(position),
                        ..Node::default()
                    };
                    self.graph.apply_node_update(node);
                    self.playback.refresh_range(&self.graph);
                    self.quick_add = Default::default();
                    self.persist_position(id.clone(), position);
                    self.select_node(&id, false);
                    self.notify(NoticeLevel::Success, "Node created");
                }
                Err(error) => self.request_failed(error),
            },
            JobOutcome::NodeDeleted { id, result } => match result {
                Ok(()) => {
                    self.graph.remove_node(&id);
                    if self.controller.selection().contains(&id) {
                        self.controller.selection_mut().clear();
                        self.on_selection_changed();
                    }
                    self.render_dirty = true;
                    self.notify(NoticeLevel::Success, "Node deleted");
                }
                Err(error) => self.request_failed(error),
            },
            JobOutcome::PositionSaved { id, token, result } => {
                let latest = self.gates.positions.finish(&id, token);
                if let Err(error) = result
                    && latest
                {
                    self.request_failed(error);
                }
            }
            JobOutcome::BulkUpdated {
                update,
                saved,
                failed,
            } => {
                for id in &saved {
                    self.apply_local_update(id, &update);
                }
                if failed.is_empty() {
                    self.notify(NoticeLevel::Success, format!("Updated {} nodes", saved.len()));
                } else {
                    let refresh = failed.iter().any(|(_, error)| error.should_refresh());
                    self.notify(
                        NoticeLevel::Error,
                        format!("Updated {}, failed {}", saved.len(), failed.len()),
                    );
                    if refresh {
                        self.reload_requested = true;
                    }
                }
            }
            JobOutcome::Search { token, result } => {
                if !self.gates.search.is_current(token) {
                    return;
                }
                self.search.loading = false;
                match result {
                    Ok(items) => self.search.results = items,
                    Err(error) => self.request_failed(error),
                }
            }
            JobOutcome::Path { token, result } => {
                if !self.gates.path.is_current(token) {
                    return;
                }
                match result {
                    Ok(path) if path.found => {
                        self.path = PathState::from_path(&path.path);
                        self.path_result = Some(path);
                    }
                    Ok(path) => {
                        self.path = PathState::default();
                        self.path_result = Some(path);
                        self.notify(NoticeLevel::Info, "No path between these nodes");
                    }
                    Err(error) => self.request_failed(error),
                }
                self.render_dirty = true;
            }
            JobOutcome::Comments { token, id, result } => {
                if !self.gates.comments.is_current(token) || self.comments.node_id.as_deref() != Some(&id) {
                    return;
                }
                self.comments.loading = false;
                let posted = std::mem::take(&mut self.comments.posting);
                match result {
                    Ok(tree) => {
                        if posted {
                            self.comments.draft.clear();
                            self.comments.reply_to = None;
                        }
                        self.comments.tree = tree;
                    }
                    Err(error) => self.request_failed(error),
                }
            }
            JobOutcome::Mentions(result) => match result {
                Ok(candidates) => self.comments.candidates = Some(candidates),
                Err(error) => debug!("mention list unavailable, using graph titles: {error}"),
            },
            JobOutcome::Metrics(result) => {
                self.insights.loading = false;
                match result {
                    Ok(metrics) => self.insights.metrics = Some(metrics),
                    Err(error) => self.request_failed(error),
                }
            }
            JobOutcome::Suggestions(result) => match result {
                Ok(suggestions) => self.insights.suggestions = suggestions,
                Err(error) => self.request_failed(error),
            },
            JobOutcome::Activity(result) => {
                self.activity.loading = false;
                match result {
                    Ok(days) => {
                        let today = chrono::Local::now().date_naive();
                        self.activity.calendar = Some(build_calendar(&days, today));
                    }
                    Err(error) => self.request_failed(error),
                }
            }
            JobOutcome::Plan { token, result } => {
                if !self.gates.plan.is_current(token) {
                    return;
                }
                self.plan.loading = false;
                match result {
                    Ok(plan) => self.plan.markdown = Some(plan.markdown),
                    Err(error) => self.request_failed(error),
                }
            }
        }
    }

    fn apply_local_update(&mut self, id: &str, update: &NodeUpdate) {
        let Some(mut node) = self.graph.node(id).cloned() else {
            return;
        };
        update.apply_to(&mut node);
        if let Some(editor) = self.editor.as_mut()
            && editor.draft.id == id
        {
            editor.tags = node.tags.join(", ");
            editor.draft = node.clone();
        }
        self.graph.apply_node_update(node);
        self.render_dirty = true;
    }

    fn request_failed(&mut self, error: BrainMapError) {
        if error.should_refresh() {
            self.reload_requested = true;
        }
        self.notify(NoticeLevel::Error, error.to_string());
    }
}
