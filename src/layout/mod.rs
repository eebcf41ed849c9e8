//! Force-directed placement for the render set.
//!
//! Repulsion uses a Barnes-Hut quadtree, edges act as damped springs and
//! overlapping nodes are pushed apart. Positions already known (persisted
//! or from a previous sync) are kept; new nodes are seeded next to a placed
//! neighbor, or on a hash-derived direction from the origin.

mod forces;
mod quadtree;

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::f64::consts::TAU;
use std::hash::{Hash, Hasher};

use crate::model::Position;
use crate::pipeline::RenderSet;
use forces::{Collision, Repulsion};
use quadtree::Cell;

const BARNES_HUT_THETA: f64 = 0.72;
const SOFTENING: f64 = 620.0;
const COLLISION_SPACING: f64 = 4.2;
const SPRING_DAMPING: f64 = 0.22;
const SLEEP_SPEED_SQ: f64 = 0.02 * 0.02;
const SLEEP_FORCE_SQ: f64 = 0.08 * 0.08;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutConfig {
    pub intensity: f64,
    pub repulsion_scale: f64,
    pub spring_scale: f64,
    pub collision_scale: f64,
    pub velocity_damping: f64,
    pub delta_seconds: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            intensity: 1.0,
            repulsion_scale: 1.0,
            spring_scale: 1.0,
            collision_scale: 1.0,
            velocity_damping: 0.9,
            delta_seconds: 1.0 / 60.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LayoutNode {
    pub id: String,
    pub position: Position,
    pub velocity: Position,
    pub radius: f64,
    /// Pinned nodes exert forces but never move.
    pub pinned: bool,
}

#[derive(Clone, Debug, Default)]
pub struct Layout {
    nodes: Vec<LayoutNode>,
    edges: Vec<(usize, usize)>,
    index_by_id: HashMap<String, usize>,
}

/// Deterministic unit direction for `id`.
pub fn stable_direction(id: &str) -> Position {
    let mut hasher = DefaultHasher::new();
    id.hash(&mut hasher);
    let hash = hasher.finish();
    let angle = ((hash & 0xffff_ffff) as f64 / f64::from(u32::MAX)) * TAU;
    Position::new(angle.cos(), angle.sin())
}

impl Layout {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[LayoutNode] {
        &self.nodes
    }

    pub fn position(&self, id: &str) -> Option<Position> {
        self.index_by_id.get(id).map(|&index| self.nodes[index].position)
    }

    /// Rebuild from the visible part of `set`, keeping every position that is
    /// already known.
    pub fn sync(&mut self, set: &RenderSet) {
        let previous = std::mem::take(&mut self.nodes)
            .into_iter()
            .map(|node| (node.id.clone(), node))
            .collect::<HashMap<_, _>>();
        self.index_by_id.clear();
        self.edges.clear();

        let visible = set.visible_nodes().collect::<Vec<_>>();
        let spread = (visible.len().max(1) as f64).sqrt() * 42.0;
        let mut unplaced = Vec::new();
        for render in &visible {
            let index = self.nodes.len();
            let (position, velocity, pinned) = match previous.get(&render.id) {
                Some(node) => (Some(node.position), node.velocity, node.pinned),
                None => (render.position.filter(|position| position.is_finite()), Position::ZERO, false),
            };
            if position.is_none() {
                unplaced.push(index);
            }
            self.index_by_id.insert(render.id.clone(), index);
            self.nodes.push(LayoutNode {
                id: render.id.clone(),
                position: position.unwrap_or(Position::ZERO),
                velocity,
                radius: render.visual.size,
                pinned,
            });
        }

        for edge in set.visible_edges() {
            if let (Some(&from), Some(&to)) = (self.index_by_id.get(&edge.from), self.index_by_id.get(&edge.to))
                && from != to
            {
                self.edges.push((from, to));
            }
        }

        let mut placed = vec![true; self.nodes.len()];
        for &index in &unplaced {
            placed[index] = false;
        }
        for index in unplaced {
            let direction = stable_direction(&self.nodes[index].id);
            let anchor = self
                .edges
                .iter()
                .find_map(|&(from, to)| match (from == index, to == index) {
                    (true, _) if placed[to] => Some(to),
                    (_, true) if placed[from] => Some(from),
                    _ => None,
                });
            self.nodes[index].position = match anchor {
                Some(anchor) => {
                    let reach = 96.0 + (self.nodes[anchor].radius + self.nodes[index].radius) * 4.0;
                    self.nodes[anchor].position + direction * reach
                }
                None => direction * spread,
            };
            placed[index] = true;
        }
    }

    /// Moves a node and stops it; used while dragging.
    pub fn set_position(&mut self, id: &str, position: Position) -> bool {
        let Some(&index) = self.index_by_id.get(id) else {
            return false;
        };
        let node = &mut self.nodes[index];
        node.position = position;
        node.velocity = Position::ZERO;
        true
    }

    pub fn set_pinned(&mut self, id: &str, pinned: bool) {
        if let Some(&index) = self.index_by_id.get(id) {
            self.nodes[index].pinned = pinned;
            self.nodes[index].velocity = Position::ZERO;
        }
    }

    pub fn unpin_all(&mut self) {
        for node in &mut self.nodes {
            node.pinned = false;
        }
    }

    /// Writes layout positions back into the render set.
    pub fn apply_to(&self, set: &mut RenderSet) {
        for node in &mut set.nodes {
            if let Some(position) = self.position(&node.id) {
                node.position = Some(position);
            }
        }
    }

    /// Advance the simulation one frame. Returns whether anything still moves.
    pub fn step(&mut self, config: LayoutConfig) -> bool {
        let count = self.nodes.len();
        if count < 2 {
            return false;
        }

        let positions = self.nodes.iter().map(|node| node.position).collect::<Vec<_>>();
        let radii = self.nodes.iter().map(|node| node.radius).collect::<Vec<_>>();
        let max_radius = radii.iter().copied().fold(0.0_f64, f64::max);

        let intensity = config.intensity.clamp(0.2, 2.5);
        let repulsion = Repulsion {
            strength: 78_000.0 * intensity * config.repulsion_scale.clamp(0.25, 2.6),
            softening: SOFTENING,
            theta: BARNES_HUT_THETA,
        };
        let collision = Collision {
            strength: 1.9 * intensity * config.collision_scale.clamp(0.2, 2.0),
            spacing: COLLISION_SPACING,
            max_reach: max_radius * 2.0 * COLLISION_SPACING,
        };
        let spring_strength = 0.016 * intensity * config.spring_scale.clamp(0.2, 2.2);
        let center_pull = 0.0011 * intensity;
        let damping = (config.velocity_damping - intensity * 0.015).clamp(0.78, 0.97);
        let time_scale = (config.delta_seconds * 60.0).clamp(0.25, 3.0);
        let damping_factor = damping.powf(time_scale);

        let Some(tree) = Cell::build(&positions) else {
            return false;
        };
        let mut net = vec![Position::ZERO; count];
        for (index, force) in net.iter_mut().enumerate() {
            *force += forces::repulsion(&tree, index, &positions, repulsion);
            if collision.max_reach > 0.0 {
                *force += forces::collision(&tree, index, &positions, &radii, collision);
            }
            *force -= positions[index] * center_pull;
        }

        for &(from, to) in &self.edges {
            let delta = positions[from] - positions[to];
            let distance = delta.length();
            if distance <= 0.0001 {
                continue;
            }
            let direction = delta / distance;
            let preferred = 96.0 + (radii[from] + radii[to]) * 4.0;
            let spring = (distance - preferred) * spring_strength;
            let relative = self.nodes[from].velocity - self.nodes[to].velocity;
            let correction = direction * (spring + relative.dot(direction) * SPRING_DAMPING);
            net[from] -= correction;
            net[to] += correction;
        }

        let max_force = 165.0 + intensity * 90.0;
        let max_speed = 11.0 + intensity * 15.0;
        let mut moving = false;
        let mut free = 0usize;
        let mut average_velocity = Position::ZERO;
        for (node, mut force) in self.nodes.iter_mut().zip(net) {
            if node.pinned {
                node.velocity = Position::ZERO;
                continue;
            }
            let force_sq = force.length_sq();
            if force_sq > max_force * max_force {
                force *= max_force / force_sq.sqrt();
            }

            let mut velocity = (node.velocity + force * (0.055 * time_scale)) * damping_factor;
            let mut speed_sq = velocity.length_sq();
            if speed_sq > max_speed * max_speed {
                velocity *= max_speed / speed_sq.sqrt();
                speed_sq = max_speed * max_speed;
            }
            if speed_sq < SLEEP_SPEED_SQ && force_sq < SLEEP_FORCE_SQ {
                velocity = Position::ZERO;
                speed_sq = 0.0;
            }

            node.velocity = velocity;
            node.position += velocity * time_scale;
            average_velocity += velocity;
            free += 1;
            moving |= speed_sq > 0.000_001;
        }

        if free > 0 {
            average_velocity = average_velocity / free as f64;
            if average_velocity.length_sq() > 0.000_001 {
                for node in self.nodes.iter_mut().filter(|node| !node.pinned) {
                    node.velocity -= average_velocity;
                }
            }
        }

        moving
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeType;
    use crate::pipeline::{RenderEdge, RenderKind, RenderNode};
    use crate::theme::Rgb;
    use crate::visual::{EdgeVisual, NodeVisual};

    fn render_node(id: &str, position: Option<Position>) -> RenderNode {
        RenderNode {
            id: id.to_owned(),
            label: id.to_owned(),
            kind: RenderKind::Node(NodeType::Concept),
            position,
            visual: NodeVisual {
                color: Rgb::new(0, 0, 0),
                size: 10.0,
                border_color: Rgb::new(0, 0, 0),
                border_width: 1.0,
                faded: false,
            },
            hidden: false,
        }
    }

    fn render_edge(from: &str, to: &str) -> RenderEdge {
        RenderEdge {
            from: from.to_owned(),
            to: to.to_owned(),
            relationship: None,
            weight: 1,
            visual: EdgeVisual {
                color: Rgb::new(0, 0, 0),
                width: 1.0,
                highlighted: false,
                faded: false,
            },
            hidden: false,
        }
    }

    fn set(nodes: Vec<RenderNode>, edges: Vec<RenderEdge>) -> RenderSet {
        RenderSet {
            nodes,
            edges,
            ..RenderSet::default()
        }
    }

    #[test]
    fn persisted_positions_seed_the_layout() {
        let mut layout = Layout::default();
        layout.sync(&set(
            vec![render_node("a", Some(Position::new(30.0, -40.0))), render_node("b", None)],
            vec![render_edge("a", "b")],
        ));
        assert_eq!(layout.position("a"), Some(Position::new(30.0, -40.0)));
        let b = layout.position("b").expect("b placed");
        assert!((b.distance(Position::new(30.0, -40.0)) - 176.0).abs() < 1e-9);
    }

    #[test]
    fn resync_keeps_simulated_positions_and_drops_hidden_nodes() {
        let mut layout = Layout::default();
        layout.sync(&set(vec![render_node("a", None), render_node("b", None)], Vec::new()));
        layout.set_position("a", Position::new(5.0, 5.0));

        let mut hidden = render_node("b", None);
        hidden.hidden = true;
        layout.sync(&set(vec![render_node("a", Some(Position::ZERO)), hidden], Vec::new()));
        assert_eq!(layout.len(), 1);
        assert_eq!(layout.position("a"), Some(Position::new(5.0, 5.0)));
        assert_eq!(layout.position("b"), None);
    }

    #[test]
    fn stepping_separates_crowded_nodes() {
        let mut layout = Layout::default();
        layout.sync(&set(
            vec![
                render_node("a", Some(Position::new(0.0, 0.0))),
                render_node("b", Some(Position::new(1.0, 0.0))),
                render_node("c", Some(Position::new(0.0, 1.0))),
            ],
            vec![render_edge("a", "b")],
        ));
        assert!(layout.step(LayoutConfig::default()));
        for _ in 0..200 {
            layout.step(LayoutConfig::default());
        }
        let a = layout.position("a").expect("a");
        let b = layout.position("b").expect("b");
        let c = layout.position("c").expect("c");
        assert!(a.distance(b) > 20.0);
        assert!(a.distance(c) > 20.0);
        assert!(layout.nodes().iter().all(|node| node.position.is_finite()));
    }

    #[test]
    fn pinned_nodes_stay_put() {
        let mut layout = Layout::default();
        layout.sync(&set(
            vec![
                render_node("a", Some(Position::new(0.0, 0.0))),
                render_node("b", Some(Position::new(2.0, 0.0))),
            ],
            Vec::new(),
        ));
        layout.set_pinned("a", true);
        for _ in 0..10 {
            layout.step(LayoutConfig::default());
        }
        assert_eq!(layout.position("a"), Some(Position::ZERO));
        assert!(layout.position("b").expect("b").x > 2.0);
    }

    #[test]
    fn apply_writes_positions_back() {
        let mut layout = Layout::default();
        let mut render = set(vec![render_node("a", None)], Vec::new());
        layout.sync(&render);
        layout.set_position("a", Position::new(1.0, 2.0));
        layout.apply_to(&mut render);
        assert_eq!(render.nodes[0].position, Some(Position::new(1.0, 2.0)));
    }

    #[test]
    fn stable_direction_is_a_unit_vector() {
        let direction = stable_direction("bm_1");
        assert_eq!(direction, stable_direction("bm_1"));
        assert!((direction.length() - 1.0).abs() < 1e-9);
    }
}
