use std::collections::{BTreeSet, HashMap};

use log::debug;

use crate::error::{BrainMapError, Result};
use crate::model::{GraphData, Link, NodeId, Position, RelationshipType};
use crate::search::KeyedGate;
use crate::view_state::Camera;

pub const MIN_ZOOM: f64 = 0.1;
pub const MAX_ZOOM: f64 = 10.0;
pub const LONG_PRESS_MS: u64 = 500;
/// Pointer travel, in screen units, that still counts as "not moved".
pub const PRESS_SLOP: f64 = 4.0;
/// Link targets snap within this multiple of their radius.
pub const LINK_SNAP_FACTOR: f64 = 1.5;

/// Screen-space offset and zoom. Screen points are relative to the canvas center.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub pan: Position,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            pan: Position::default(),
            zoom: 1.0,
        }
    }
}

impl Viewport {
    pub fn to_world(&self, screen: Position) -> Position {
        Position {
            x: (screen.x - self.pan.x) / self.zoom,
            y: (screen.y - self.pan.y) / self.zoom,
        }
    }

    pub fn to_screen(&self, world: Position) -> Position {
        Position {
            x: world.x * self.zoom + self.pan.x,
            y: world.y * self.zoom + self.pan.y,
        }
    }

    /// Zoom by `factor` keeping the world point under `anchor` fixed.
    pub fn zoom_at(&mut self, anchor: Position, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let world = self.to_world(anchor);
        self.zoom = (self.zoom * factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.pan = Position {
            x: anchor.x - world.x * self.zoom,
            y: anchor.y - world.y * self.zoom,
        };
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.pan.x += dx;
        self.pan.y += dy;
    }

    /// World point at the canvas center.
    pub fn camera(&self) -> Camera {
        let center = self.to_world(Position::default());
        Camera {
            x: center.x,
            y: center.y,
            angle: 0.0,
        }
    }

    pub fn from_camera(camera: Camera, zoom: f64) -> Self {
        let zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        Self {
            pan: Position {
                x: -camera.x * zoom,
                y: -camera.y * zoom,
            },
            zoom,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HitTarget {
    pub id: NodeId,
    pub position: Position,
    pub radius: f64,
    pub is_cluster: bool,
}

/// World-space hit areas of whatever is currently rendered.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneIndex {
    pub targets: Vec<HitTarget>,
}

impl SceneIndex {
    pub fn hit(&self, world: Position) -> Option<&str> {
        self.target_at(world).map(|target| target.id.as_str())
    }

    pub fn target_at(&self, world: Position) -> Option<&HitTarget> {
        self.nearest_within(world, 1.0, |_| true)
    }

    /// Nearest node (never a cluster) whose snap radius covers `world`.
    pub fn link_candidate(&self, world: Position) -> Option<&str> {
        self.nearest_within(world, LINK_SNAP_FACTOR, |target| !target.is_cluster)
            .map(|target| target.id.as_str())
    }

    fn nearest_within(
        &self,
        world: Position,
        factor: f64,
        keep: impl Fn(&HitTarget) -> bool,
    ) -> Option<&HitTarget> {
        self.targets
            .iter()
            .filter(|target| keep(target))
            .filter_map(|target| {
                let distance = target.position.distance(world);
                (distance <= target.radius * factor).then_some((target, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(target, _)| target)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    None,
    Single(NodeId),
    Multi(BTreeSet<NodeId>),
}

impl Selection {
    pub fn select(&mut self, id: &str) {
        *self = Self::Single(id.to_owned());
    }

    /// Shift-click: toggles membership and drops any single selection.
    pub fn toggle_multi(&mut self, id: &str) {
        let mut set = match std::mem::take(self) {
            Self::Multi(set) => set,
            Self::None | Self::Single(_) => BTreeSet::new(),
        };
        if !set.remove(id) {
            set.insert(id.to_owned());
        }
        *self = if set.is_empty() {
            Self::None
        } else {
            Self::Multi(set)
        };
    }

    pub fn clear(&mut self) {
        *self = Self::None;
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn single(&self) -> Option<&str> {
        match self {
            Self::Single(id) => Some(id),
            _ => None,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        match self {
            Self::None => false,
            Self::Single(selected) => selected == id,
            Self::Multi(set) => set.contains(id),
        }
    }

    pub fn ids(&self) -> Vec<NodeId> {
        match self {
            Self::None => Vec::new(),
            Self::Single(id) => vec![id.clone()],
            Self::Multi(set) => set.iter().cloned().collect(),
        }
    }
}

/// Duplicate links are detected by target id alone.
pub fn link_exists(graph: &GraphData, source: &str, target: &str) -> bool {
    graph
        .node(source)
        .is_some_and(|node| node.links.iter().any(|link| link.to == target))
}

/// Guard shared by link dragging and the relationship editor.
pub fn validate_link(graph: &GraphData, source: &str, target: &str) -> Result<()> {
    if source == target {
        return Err(BrainMapError::validation("Cannot link a node to itself"));
    }
    if graph.node(source).is_none() {
        return Err(BrainMapError::NotFound(source.to_owned()));
    }
    if graph.node(target).is_none() {
        return Err(BrainMapError::NotFound(target.to_owned()));
    }
    if link_exists(graph, source, target) {
        return Err(BrainMapError::validation("Link already exists"));
    }
    Ok(())
}

fn replace_links(graph: &mut GraphData, source: &str, links: Vec<Link>) -> bool {
    let Some(mut node) = graph.node(source).cloned() else {
        return false;
    };
    node.links = links;
    graph.apply_node_update(node);
    true
}

/// Link edits shown locally while their update is in flight.
///
/// Each edit is built on top of the previous local state, so back-to-back
/// edits on one node never drop each other. A failed edit rolls the node back
/// to the last list the service accepted, unless a newer edit is still pending.
#[derive(Debug, Default)]
pub struct LinkEdits {
    gate: KeyedGate,
    accepted: HashMap<NodeId, Vec<Link>>,
}

impl LinkEdits {
    /// Apply `links` to `source` locally. Returns the token of the update to send.
    pub fn begin(&mut self, graph: &mut GraphData, source: &str, links: Vec<Link>) -> Option<u64> {
        let previous = graph.node(source)?.links.clone();
        self.accepted.entry(source.to_owned()).or_insert(previous);
        replace_links(graph, source, links);
        Some(self.gate.begin(source))
    }

    pub fn succeeded(&mut self, source: &str, token: u64, links: &[Link]) {
        if self.gate.finish(source, token) {
            self.accepted.remove(source);
        } else if let Some(accepted) = self.accepted.get_mut(source) {
            *accepted = links.to_vec();
        }
    }

    /// Returns whether the node was rolled back.
    pub fn failed(&mut self, graph: &mut GraphData, source: &str, token: u64) -> bool {
        if !self.gate.finish(source, token) {
            return false;
        }
        match self.accepted.remove(source) {
            Some(links) => replace_links(graph, source, links),
            None => false,
        }
    }

    pub fn pending(&self) -> usize {
        self.gate.in_flight()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum InteractionMode {
    #[default]
    Idle,
    Panning {
        last: Position,
    },
    DraggingNode(NodeId),
    CreatingLink {
        source: NodeId,
        preview: Position,
        hover: Option<NodeId>,
    },
    PlacingNode,
    FindingPath {
        start: Option<NodeId>,
        end: Option<NodeId>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    PointerDown {
        point: Position,
        shift: bool,
        time_ms: u64,
    },
    PointerMove {
        point: Position,
        time_ms: u64,
    },
    PointerUp {
        point: Position,
        time_ms: u64,
    },
    /// Lets a held, motionless press become a long press.
    Tick {
        time_ms: u64,
    },
    Wheel {
        anchor: Position,
        factor: f64,
    },
    Escape,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    SelectionChanged,
    ToggleCluster(String),
    /// Click-to-place was abandoned before a position was picked.
    PlacementCancelled,
    MoveNode { id: NodeId, position: Position },
    PersistPosition { id: NodeId, position: Position },
    CreateLink { source: NodeId, link: Link },
    PlaceNode { position: Position },
    FindPath { from: NodeId, to: NodeId },
    ClearPath,
    OpenContextMenu { id: NodeId, anchor: Position },
    Notice { level: NoticeLevel, message: String },
}

impl Effect {
    pub fn notice(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self::Notice {
            level,
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct PressTarget {
    id: NodeId,
    is_cluster: bool,
}

impl PressTarget {
    fn node(&self) -> Option<&NodeId> {
        (!self.is_cluster).then_some(&self.id)
    }
}

#[derive(Clone, Debug, PartialEq)]
struct Press {
    origin: Position,
    time_ms: u64,
    target: Option<PressTarget>,
    shift: bool,
    moved: bool,
    long_fired: bool,
}

/// Arbitrates one pointer/keyboard stream into mutually exclusive modes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Controller {
    mode: InteractionMode,
    viewport: Viewport,
    selection: Selection,
    layout_locked: bool,
    press: Option<Press>,
}

impl Controller {
    pub fn mode(&self) -> &InteractionMode {
        &self.mode
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    pub fn layout_locked(&self) -> bool {
        self.layout_locked
    }

    pub fn set_layout_locked(&mut self, locked: bool) {
        self.layout_locked = locked;
    }

    pub fn is_gesture_active(&self) -> bool {
        matches!(
            self.mode,
            InteractionMode::Panning { .. }
                | InteractionMode::DraggingNode(_)
                | InteractionMode::CreatingLink { .. }
        )
    }

    pub fn set_placing(&mut self, on: bool) -> Vec<Effect> {
        let effects = self.leave_path_finder();
        self.press = None;
        if on {
            self.mode = InteractionMode::PlacingNode;
        } else if self.mode == InteractionMode::PlacingNode {
            self.mode = InteractionMode::Idle;
        }
        effects
    }

    pub fn set_path_finder(&mut self, on: bool) -> Vec<Effect> {
        let effects = self.leave_path_finder();
        self.press = None;
        if on {
            self.mode = InteractionMode::FindingPath {
                start: None,
                end: None,
            };
        }
        effects
    }

    fn leave_path_finder(&mut self) -> Vec<Effect> {
        if matches!(self.mode, InteractionMode::FindingPath { .. }) {
            self.mode = InteractionMode::Idle;
            vec![Effect::ClearPath]
        } else {
            Vec::new()
        }
    }

    pub fn handle(&mut self, event: InputEvent, scene: &SceneIndex, graph: &GraphData) -> Vec<Effect> {
        match event {
            InputEvent::PointerDown {
                point,
                shift,
                time_ms,
            } => self.pointer_down(point, shift, time_ms, scene),
            InputEvent::PointerMove { point, time_ms } => self.pointer_move(point, time_ms, scene),
            InputEvent::PointerUp { point, time_ms } => self.pointer_up(point, time_ms, scene, graph),
            InputEvent::Tick { time_ms } => self.check_long_press(time_ms).into_iter().collect(),
            InputEvent::Wheel { anchor, factor } => {
                self.viewport.zoom_at(anchor, factor);
                Vec::new()
            }
            InputEvent::Escape => self.escape(),
        }
    }

    fn pointer_down(
        &mut self,
        point: Position,
        shift: bool,
        time_ms: u64,
        scene: &SceneIndex,
    ) -> Vec<Effect> {
        let world = self.viewport.to_world(point);
        let target = scene.target_at(world).map(|target| PressTarget {
            id: target.id.clone(),
            is_cluster: target.is_cluster,
        });

        self.press = Some(Press {
            origin: point,
            time_ms,
            target,
            shift,
            moved: false,
            long_fired: false,
        });
        Vec::new()
    }

    fn pointer_move(&mut self, point: Position, time_ms: u64, scene: &SceneIndex) -> Vec<Effect> {
        let world = self.viewport.to_world(point);

        match &mut self.mode {
            InteractionMode::CreatingLink { preview, hover, .. } => {
                *preview = world;
                *hover = scene.link_candidate(world).map(str::to_owned);
                return Vec::new();
            }
            InteractionMode::DraggingNode(id) => {
                return vec![Effect::MoveNode {
                    id: id.clone(),
                    position: world,
                }];
            }
            InteractionMode::Panning { last } => {
                let (dx, dy) = (point.x - last.x, point.y - last.y);
                *last = point;
                self.viewport.pan_by(dx, dy);
                return Vec::new();
            }
            InteractionMode::Idle | InteractionMode::PlacingNode | InteractionMode::FindingPath { .. } => {}
        }

        let mut effects = self.check_long_press(time_ms).into_iter().collect::<Vec<_>>();
        let idle = self.mode == InteractionMode::Idle;
        let locked = self.layout_locked;
        let Some(press) = self.press.as_mut() else {
            return effects;
        };
        if press.moved || press.origin.distance(point) <= PRESS_SLOP {
            return effects;
        }
        press.moved = true;
        if !idle || press.long_fired {
            return effects;
        }

        let node = press.target.as_ref().and_then(PressTarget::node).cloned();
        if press.shift
            && let Some(source) = node.clone()
        {
            debug!("link drag started from {source}");
            self.mode = InteractionMode::CreatingLink {
                source,
                preview: world,
                hover: scene.link_candidate(world).map(str::to_owned),
            };
            return effects;
        }

        match node.filter(|_| locked) {
            Some(id) => {
                debug!("dragging node {id}");
                effects.push(Effect::MoveNode {
                    id: id.clone(),
                    position: world,
                });
                self.mode = InteractionMode::DraggingNode(id);
            }
            None => {
                let origin = press.origin;
                self.viewport.pan_by(point.x - origin.x, point.y - origin.y);
                self.mode = InteractionMode::Panning { last: point };
            }
        }
        effects
    }

    fn check_long_press(&mut self, time_ms: u64) -> Option<Effect> {
        if self.mode != InteractionMode::Idle {
            return None;
        }
        let press = self.press.as_mut()?;
        if press.moved || press.long_fired || time_ms.saturating_sub(press.time_ms) < LONG_PRESS_MS {
            return None;
        }
        let id = press.target.as_ref().and_then(PressTarget::node)?.clone();
        press.long_fired = true;
        Some(Effect::OpenContextMenu {
            id,
            anchor: press.origin,
        })
    }

    fn pointer_up(
        &mut self,
        point: Position,
        time_ms: u64,
        scene: &SceneIndex,
        graph: &GraphData,
    ) -> Vec<Effect> {
        let world = self.viewport.to_world(point);

        match std::mem::take(&mut self.mode) {
            InteractionMode::CreatingLink { source, hover, .. } => {
                self.press = None;
                let target = hover.or_else(|| scene.link_candidate(world).map(str::to_owned));
                let Some(target) = target else {
                    return Vec::new();
                };
                return match validate_link(graph, &source, &target) {
                    Ok(()) => vec![Effect::CreateLink {
                        source,
                        link: Link {
                            to: target,
                            relationship: RelationshipType::RelatedTo,
                        },
                    }],
                    Err(error) => vec![Effect::notice(NoticeLevel::Error, error.to_string())],
                };
            }
            InteractionMode::DraggingNode(id) => {
                self.press = None;
                return vec![Effect::PersistPosition {
                    id,
                    position: world,
                }];
            }
            InteractionMode::Panning { .. } => {
                self.press = None;
                return Vec::new();
            }
            mode => self.mode = mode,
        }

        if let Some(menu) = self.check_long_press(time_ms) {
            self.press = None;
            return vec![menu];
        }
        let Some(press) = self.press.take() else {
            return Vec::new();
        };
        if press.moved || press.long_fired {
            return Vec::new();
        }
        self.click(press.target, press.shift, world)
    }

    fn click(&mut self, target: Option<PressTarget>, shift: bool, world: Position) -> Vec<Effect> {
        match &mut self.mode {
            InteractionMode::PlacingNode => match target {
                Some(_) => Vec::new(),
                None => vec![Effect::PlaceNode { position: world }],
            },
            InteractionMode::FindingPath { start, end } => {
                let Some(id) = target.as_ref().and_then(PressTarget::node).cloned() else {
                    return Vec::new();
                };
                match (start.clone(), end.is_some()) {
                    (Some(from), false) if from == id => vec![Effect::notice(
                        NoticeLevel::Info,
                        "Pick a different node as the path end",
                    )],
                    (Some(from), false) => {
                        *end = Some(id.clone());
                        vec![Effect::FindPath { from, to: id }]
                    }
                    (None, _) | (Some(_), true) => {
                        *start = Some(id);
                        *end = None;
                        vec![Effect::ClearPath]
                    }
                }
            }
            _ => match target {
                Some(PressTarget { id, is_cluster: true }) => vec![Effect::ToggleCluster(id)],
                Some(PressTarget { id, .. }) if shift => {
                    self.selection.toggle_multi(&id);
                    vec![Effect::SelectionChanged]
                }
                Some(PressTarget { id, .. }) => {
                    self.selection.select(&id);
                    vec![Effect::SelectionChanged]
                }
                None if !self.selection.is_empty() => {
                    self.selection.clear();
                    vec![Effect::SelectionChanged]
                }
                None => Vec::new(),
            },
        }
    }

    fn escape(&mut self) -> Vec<Effect> {
        match std::mem::take(&mut self.mode) {
            InteractionMode::FindingPath { .. } => vec![Effect::ClearPath],
            InteractionMode::PlacingNode => {
                self.press = None;
                vec![Effect::PlacementCancelled]
            }
            // A node drag only ends on release so its position is always persisted.
            InteractionMode::DraggingNode(id) => {
                self.mode = InteractionMode::DraggingNode(id);
                Vec::new()
            }
            InteractionMode::Idle if !self.selection.is_empty() => {
                self.selection.clear();
                vec![Effect::SelectionChanged]
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::scenario_graph;

    fn target(id: &str, x: f64, y: f64, radius: f64, is_cluster: bool) -> HitTarget {
        HitTarget {
            id: id.to_owned(),
            position: Position { x, y },
            radius,
            is_cluster,
        }
    }

    fn scene() -> SceneIndex {
        SceneIndex {
            targets: vec![
                target("a", 0.0, 0.0, 10.0, false),
                target("b", 100.0, 0.0, 10.0, false),
                target("c", 0.0, 100.0, 20.0, false),
                target("tag:z", -200.0, 0.0, 30.0, true),
            ],
        }
    }

    fn at(x: f64, y: f64) -> Position {
        Position { x, y }
    }

    fn down(point: Position, shift: bool, time_ms: u64) -> InputEvent {
        InputEvent::PointerDown {
            point,
            shift,
            time_ms,
        }
    }

    fn moved(point: Position, time_ms: u64) -> InputEvent {
        InputEvent::PointerMove { point, time_ms }
    }

    fn up(point: Position, time_ms: u64) -> InputEvent {
        InputEvent::PointerUp { point, time_ms }
    }

    fn run(controller: &mut Controller, graph: &GraphData, events: Vec<InputEvent>) -> Vec<Effect> {
        let scene = scene();
        events
            .into_iter()
            .flat_map(|event| controller.handle(event, &scene, graph))
            .collect()
    }

    fn graph_with_link() -> GraphData {
        let mut graph = scenario_graph();
        graph.nodes[0].links.push(Link {
            to: "c".to_owned(),
            relationship: RelationshipType::Blocks,
        });
        graph
    }

    #[test]
    fn click_selects_and_empty_click_clears() {
        let graph = scenario_graph();
        let mut controller = Controller::default();

        let effects = run(&mut controller, &graph, vec![down(at(1.0, 1.0), false, 0), up(at(1.0, 1.0), 50)]);
        assert_eq!(effects, [Effect::SelectionChanged]);
        assert_eq!(controller.selection().single(), Some("a"));

        run(&mut controller, &graph, vec![down(at(50.0, 50.0), false, 100), up(at(50.0, 50.0), 120)]);
        assert!(controller.selection().is_empty());
    }

    #[test]
    fn shift_click_toggles_multi_selection_exclusively() {
        let mut selection = Selection::default();
        selection.select("a");
        selection.toggle_multi("b");
        assert!(!selection.contains("a"));
        assert!(selection.contains("b"));
        selection.toggle_multi("c");
        assert_eq!(selection.ids(), ["b", "c"]);
        selection.select("a");
        assert_eq!(selection, Selection::Single("a".to_owned()));
        selection.toggle_multi("a");
        selection.toggle_multi("a");
        assert!(selection.is_empty());
    }

    #[test]
    fn shift_click_on_canvas_builds_multi_selection() {
        let graph = scenario_graph();
        let mut controller = Controller::default();
        run(&mut controller, &graph, vec![down(at(0.0, 0.0), false, 0), up(at(0.0, 0.0), 10)]);

        let effects = run(&mut controller, &graph, vec![down(at(100.0, 0.0), true, 100), up(at(101.0, 0.0), 120)]);
        assert_eq!(effects, [Effect::SelectionChanged]);
        assert_eq!(*controller.selection(), Selection::Multi(BTreeSet::from(["b".to_owned()])));

        run(&mut controller, &graph, vec![down(at(0.0, 100.0), true, 200), up(at(0.0, 100.0), 210)]);
        assert_eq!(controller.selection().ids(), ["b", "c"]);
        assert_eq!(*controller.mode(), InteractionMode::Idle);
    }

    #[test]
    fn regular_node_with_cluster_like_id_is_selectable() {
        let graph = scenario_graph();
        let scene = SceneIndex {
            targets: vec![target("cluster_notes", 0.0, 0.0, 10.0, false)],
        };
        let mut controller = Controller::default();
        controller.handle(down(at(0.0, 0.0), false, 0), &scene, &graph);
        let effects = controller.handle(up(at(0.0, 0.0), 10), &scene, &graph);
        assert_eq!(effects, [Effect::SelectionChanged]);
        assert_eq!(controller.selection().single(), Some("cluster_notes"));
        assert_eq!(scene.link_candidate(at(0.0, 0.0)), Some("cluster_notes"));
    }

    #[test]
    fn drag_on_empty_canvas_pans() {
        let graph = scenario_graph();
        let mut controller = Controller::default();
        run(
            &mut controller,
            &graph,
            vec![
                down(at(50.0, 50.0), false, 0),
                moved(at(60.0, 50.0), 10),
                moved(at(70.0, 55.0), 20),
            ],
        );
        assert!(matches!(controller.mode(), InteractionMode::Panning { .. }));
        assert_eq!(controller.viewport().pan, at(20.0, 5.0));

        let effects = run(&mut controller, &graph, vec![up(at(70.0, 55.0), 30)]);
        assert!(effects.is_empty());
        assert_eq!(*controller.mode(), InteractionMode::Idle);
        assert!(controller.selection().is_empty());
    }

    #[test]
    fn node_drag_requires_locked_layout() {
        let graph = scenario_graph();
        let mut unlocked = Controller::default();
        run(&mut unlocked, &graph, vec![down(at(0.0, 0.0), false, 0), moved(at(30.0, 0.0), 10)]);
        assert!(matches!(unlocked.mode(), InteractionMode::Panning { .. }));

        let mut locked = Controller::default();
        locked.set_layout_locked(true);
        let effects = run(
            &mut locked,
            &graph,
            vec![
                down(at(0.0, 0.0), false, 0),
                moved(at(30.0, 0.0), 10),
                moved(at(40.0, 5.0), 20),
                up(at(40.0, 5.0), 30),
            ],
        );
        assert_eq!(locked.viewport().pan, Position::default());
        assert_eq!(
            effects.last(),
            Some(&Effect::PersistPosition {
                id: "a".to_owned(),
                position: at(40.0, 5.0),
            })
        );
        assert_eq!(
            effects
                .iter()
                .filter(|effect| matches!(effect, Effect::MoveNode { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn shift_drag_creates_related_link() {
        let graph = scenario_graph();
        let mut controller = Controller::default();
        let effects = run(
            &mut controller,
            &graph,
            vec![
                down(at(0.0, 0.0), true, 0),
                moved(at(50.0, 0.0), 10),
                moved(at(112.0, 0.0), 20),
            ],
        );
        assert!(effects.is_empty());
        let InteractionMode::CreatingLink { source, hover, .. } = controller.mode() else {
            panic!("expected link mode");
        };
        assert_eq!(source, "a");
        assert_eq!(hover.as_deref(), Some("b"));

        let effects = run(&mut controller, &graph, vec![up(at(112.0, 0.0), 30)]);
        assert_eq!(
            effects,
            [Effect::CreateLink {
                source: "a".to_owned(),
                link: Link {
                    to: "b".to_owned(),
                    relationship: RelationshipType::RelatedTo,
                },
            }]
        );
        assert_eq!(*controller.mode(), InteractionMode::Idle);
    }

    #[test]
    fn self_and_duplicate_links_are_rejected_without_requests() {
        let graph = graph_with_link();
        let mut controller = Controller::default();

        let effects = run(
            &mut controller,
            &graph,
            vec![down(at(0.0, 0.0), true, 0), moved(at(8.0, 0.0), 5), up(at(8.0, 0.0), 10)],
        );
        assert!(matches!(
            effects.as_slice(),
            [Effect::Notice { level: NoticeLevel::Error, message }] if message.contains("itself")
        ));

        let effects = run(
            &mut controller,
            &graph,
            vec![down(at(0.0, 0.0), true, 0), moved(at(0.0, 105.0), 5), up(at(0.0, 105.0), 10)],
        );
        assert!(matches!(
            effects.as_slice(),
            [Effect::Notice { level: NoticeLevel::Error, message }] if message.contains("already")
        ));
    }

    #[test]
    fn duplicate_detection_ignores_relationship_type() {
        let graph = graph_with_link();
        assert!(link_exists(&graph, "a", "c"));
        assert!(!link_exists(&graph, "c", "a"));
        assert!(validate_link(&graph, "a", "b").is_ok());
        assert!(matches!(validate_link(&graph, "a", "ghost"), Err(BrainMapError::NotFound(_))));
    }

    #[test]
    fn link_snap_radius_scales_with_target_size() {
        let scene = scene();
        assert_eq!(scene.link_candidate(at(0.0, 128.0)), Some("c"));
        assert_eq!(scene.link_candidate(at(100.0, 14.0)), Some("b"));
        assert_eq!(scene.link_candidate(at(100.0, 16.0)), None);
        assert_eq!(scene.link_candidate(at(-200.0, 0.0)), None);
        assert_eq!(scene.hit(at(-200.0, 0.0)), Some("tag:z"));
    }

    #[test]
    fn long_press_opens_context_menu_instead_of_click() {
        let graph = scenario_graph();
        let mut controller = Controller::default();
        let scene = scene();

        controller.handle(down(at(100.0, 0.0), false, 1_000), &scene, &graph);
        assert!(controller.handle(InputEvent::Tick { time_ms: 1_400 }, &scene, &graph).is_empty());
        let effects = controller.handle(InputEvent::Tick { time_ms: 1_500 }, &scene, &graph);
        assert_eq!(
            effects,
            [Effect::OpenContextMenu {
                id: "b".to_owned(),
                anchor: at(100.0, 0.0),
            }]
        );
        assert!(controller.handle(up(at(100.0, 0.0), 1_600), &scene, &graph).is_empty());
        assert!(controller.selection().is_empty());
    }

    #[test]
    fn movement_before_threshold_cancels_long_press() {
        let graph = scenario_graph();
        let mut controller = Controller::default();
        let effects = run(
            &mut controller,
            &graph,
            vec![
                down(at(100.0, 0.0), false, 0),
                moved(at(130.0, 0.0), 100),
                InputEvent::Tick { time_ms: 900 },
                up(at(130.0, 0.0), 1_000),
            ],
        );
        assert!(effects.is_empty());
        assert_eq!(controller.viewport().pan, at(30.0, 0.0));
    }

    #[test]
    fn long_press_detected_on_release() {
        let graph = scenario_graph();
        let mut controller = Controller::default();
        let effects = run(&mut controller, &graph, vec![down(at(0.0, 0.0), false, 0), up(at(1.0, 0.0), 700)]);
        assert!(matches!(effects.as_slice(), [Effect::OpenContextMenu { id, .. }] if id == "a"));
    }

    #[test]
    fn placing_mode_emits_world_coordinates_for_empty_space_only() {
        let graph = scenario_graph();
        let mut controller = Controller::default();
        controller.viewport_mut().pan = at(10.0, 10.0);
        controller.viewport_mut().zoom = 2.0;
        controller.set_placing(true);

        let on_node = run(&mut controller, &graph, vec![down(at(10.0, 10.0), false, 0), up(at(10.0, 10.0), 5)]);
        assert!(on_node.is_empty());

        let effects = run(&mut controller, &graph, vec![down(at(110.0, 60.0), false, 10), up(at(110.0, 60.0), 20)]);
        assert_eq!(effects, [Effect::PlaceNode { position: at(50.0, 25.0) }]);
        assert!(controller.selection().is_empty());
        assert_eq!(*controller.mode(), InteractionMode::PlacingNode);

        controller.set_placing(false);
        assert_eq!(*controller.mode(), InteractionMode::Idle);
    }

    #[test]
    fn path_finder_picks_start_then_end() {
        let graph = scenario_graph();
        let mut controller = Controller::default();
        controller.set_path_finder(true);

        let click = |x: f64, y: f64, t: u64| vec![down(at(x, y), false, t), up(at(x, y), t + 10)];
        assert_eq!(run(&mut controller, &graph, click(0.0, 0.0, 0)), [Effect::ClearPath]);
        let same = run(&mut controller, &graph, click(0.0, 0.0, 100));
        assert!(matches!(same.as_slice(), [Effect::Notice { .. }]));
        assert_eq!(
            run(&mut controller, &graph, click(100.0, 0.0, 200)),
            [Effect::FindPath {
                from: "a".to_owned(),
                to: "b".to_owned(),
            }]
        );
        assert_eq!(run(&mut controller, &graph, click(0.0, 100.0, 300)), [Effect::ClearPath]);
        assert_eq!(
            *controller.mode(),
            InteractionMode::FindingPath {
                start: Some("c".to_owned()),
                end: None,
            }
        );
        assert_eq!(controller.set_path_finder(false), [Effect::ClearPath]);
        assert_eq!(*controller.mode(), InteractionMode::Idle);
    }

    #[test]
    fn clicking_cluster_toggles_it_without_touching_selection() {
        let graph = scenario_graph();
        let mut controller = Controller::default();
        controller.selection_mut().select("a");
        let effects = run(&mut controller, &graph, vec![down(at(-200.0, 0.0), false, 0), up(at(-200.0, 0.0), 10)]);
        assert_eq!(effects, [Effect::ToggleCluster("tag:z".to_owned())]);
        assert_eq!(controller.selection().single(), Some("a"));
    }

    #[test]
    fn zoom_is_bounded_and_anchored() {
        let mut viewport = Viewport::default();
        let anchor = at(40.0, -20.0);
        let before = viewport.to_world(anchor);
        viewport.zoom_at(anchor, 3.0);
        let after = viewport.to_world(anchor);
        assert!((before.x - after.x).abs() < 1e-9 && (before.y - after.y).abs() < 1e-9);

        for _ in 0..20 {
            viewport.zoom_at(anchor, 4.0);
        }
        assert_eq!(viewport.zoom, MAX_ZOOM);
        for _ in 0..40 {
            viewport.zoom_at(anchor, 0.25);
        }
        assert_eq!(viewport.zoom, MIN_ZOOM);
        viewport.zoom_at(anchor, f64::NAN);
        assert_eq!(viewport.zoom, MIN_ZOOM);
    }

    #[test]
    fn camera_round_trips_through_viewport() {
        let camera = Camera {
            x: 12.5,
            y: -3.0,
            angle: 0.0,
        };
        let viewport = Viewport::from_camera(camera, 2.0);
        assert_eq!(viewport.camera(), camera);
        assert_eq!(viewport.zoom, 2.0);
    }

    #[test]
    fn escape_cancels_link_creation() {
        let graph = scenario_graph();
        let mut controller = Controller::default();
        run(&mut controller, &graph, vec![down(at(0.0, 0.0), true, 0)]);
        assert!(!controller.is_gesture_active());
        run(&mut controller, &graph, vec![moved(at(20.0, 0.0), 5)]);
        assert!(controller.is_gesture_active());
        let effects = run(&mut controller, &graph, vec![InputEvent::Escape]);
        assert!(effects.is_empty());
        assert_eq!(*controller.mode(), InteractionMode::Idle);
    }

    #[test]
    fn escape_while_placing_reports_cancellation() {
        let graph = scenario_graph();
        let mut controller = Controller::default();
        controller.set_placing(true);
        let effects = run(&mut controller, &graph, vec![InputEvent::Escape]);
        assert_eq!(effects, [Effect::PlacementCancelled]);
        assert_eq!(*controller.mode(), InteractionMode::Idle);
    }

    fn link(to: &str) -> Link {
        Link {
            to: to.to_owned(),
            relationship: RelationshipType::RelatedTo,
        }
    }

    fn links_of(graph: &GraphData, id: &str) -> Vec<String> {
        graph
            .node(id)
            .map(|node| node.links.iter().map(|link| link.to.clone()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn back_to_back_link_edits_build_on_each_other() {
        let mut graph = scenario_graph();
        let mut edits = LinkEdits::default();
        let base = graph.node("a").map(|node| node.links.clone()).unwrap_or_default();

        let mut first = base;
        first.push(link("b"));
        let t1 = edits.begin(&mut graph, "a", first.clone()).expect("node a");
        assert!(matches!(validate_link(&graph, "a", "b"), Err(BrainMapError::Validation(_))));

        let mut second = graph.node("a").map(|node| node.links.clone()).unwrap_or_default();
        second.push(link("c"));
        let t2 = edits.begin(&mut graph, "a", second.clone()).expect("node a");
        assert!(links_of(&graph, "a").ends_with(&["b".to_owned(), "c".to_owned()]));
        assert!(graph.edges.iter().any(|edge| edge.from == "a" && edge.to == "c"));
        assert_eq!(edits.pending(), 1);

        edits.succeeded("a", t1, &first);
        assert!(!edits.failed(&mut graph, "a", t1));
        edits.succeeded("a", t2, &second);
        assert_eq!(edits.pending(), 0);
        assert_eq!(graph.node("a").map(|node| node.links.clone()), Some(second));
    }

    #[test]
    fn failed_link_edit_rolls_back_to_accepted_links() {
        let mut graph = scenario_graph();
        let mut edits = LinkEdits::default();
        let base = graph.node("a").map(|node| node.links.clone()).unwrap_or_default();

        let mut first = base;
        first.push(link("b"));
        let t1 = edits.begin(&mut graph, "a", first.clone()).expect("node a");
        let mut second = first.clone();
        second.push(link("c"));
        let t2 = edits.begin(&mut graph, "a", second).expect("node a");

        edits.succeeded("a", t1, &first);
        assert!(edits.failed(&mut graph, "a", t2));
        assert_eq!(graph.node("a").map(|node| node.links.clone()), Some(first));
        assert!(!graph.edges.iter().any(|edge| edge.from == "a" && edge.to == "c"));
        assert!(edits.begin(&mut graph, "ghost", Vec::new()).is_none());
    }
}
