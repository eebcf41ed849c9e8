use std::f64::consts::TAU;

use super::quadtree::{Cell, Square};
use crate::model::Position;

const MIN_DISTANCE: f64 = 0.0001;

#[derive(Clone, Copy, Debug)]
pub(super) struct Repulsion {
    pub(super) strength: f64,
    pub(super) softening: f64,
    pub(super) theta: f64,
}

#[derive(Clone, Copy, Debug)]
pub(super) struct Collision {
    pub(super) strength: f64,
    /// Multiple of the summed radii below which two nodes push apart.
    pub(super) spacing: f64,
    pub(super) max_reach: f64,
}

/// Unit vector from `b` to `a`; coincident points get a deterministic direction.
fn direction(a: Position, b: Position, salt: usize) -> (Position, f64) {
    let delta = a - b;
    let distance = delta.length();
    if distance > MIN_DISTANCE {
        (delta / distance, distance)
    } else {
        let angle = (salt as f64 * 0.618_034 + 0.37) * TAU;
        (Position::new(angle.cos(), angle.sin()), distance)
    }
}

/// Repulsive force on `index`, approximating far cells by their center of mass.
pub(super) fn repulsion(cell: &Cell, index: usize, positions: &[Position], params: Repulsion) -> Position {
    if cell.mass <= 0.0 {
        return Position::ZERO;
    }
    let point = positions[index];

    if cell.is_leaf() {
        return cell
            .points
            .iter()
            .filter(|&&other| other != index)
            .fold(Position::ZERO, |force, &other| {
                let (toward, distance) = direction(point, positions[other], index + other);
                force + toward * (params.strength / (distance * distance + params.softening))
            });
    }

    let delta = point - cell.center_of_mass;
    let distance_sq = delta.length_sq().max(MIN_DISTANCE);
    let distance = distance_sq.sqrt();
    if !cell.square.contains(point) && cell.square.side() / distance < params.theta && cell.mass > 1.0 {
        return delta / distance * (params.strength * cell.mass / (distance_sq + params.softening));
    }

    cell.children()
        .fold(Position::ZERO, |force, child| force + repulsion(child, index, positions, params))
}

/// Overlap push on `index` from every node closer than its spacing.
pub(super) fn collision(
    cell: &Cell,
    index: usize,
    positions: &[Position],
    radii: &[f64],
    params: Collision,
) -> Position {
    let point = positions[index];
    let probe = Square {
        center: point,
        half: 0.0,
    };
    if cell.square.gap_sq(probe) > params.max_reach * params.max_reach {
        return Position::ZERO;
    }

    if cell.is_leaf() {
        return cell
            .points
            .iter()
            .filter(|&&other| other != index)
            .fold(Position::ZERO, |force, &other| {
                let (toward, distance) = direction(point, positions[other], index + other);
                let min_distance = (radii[index] + radii[other]) * params.spacing;
                if distance < min_distance {
                    force + toward * ((min_distance - distance) * params.strength)
                } else {
                    force
                }
            });
    }

    cell.children().fold(Position::ZERO, |force, child| {
        force + collision(child, index, positions, radii, params)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPULSION: Repulsion = Repulsion {
        strength: 1000.0,
        softening: 1.0,
        theta: 0.7,
    };

    #[test]
    fn repulsion_pushes_points_apart() {
        let positions = [Position::new(-1.0, 0.0), Position::new(1.0, 0.0)];
        let tree = Cell::build(&positions).expect("tree");
        let left = repulsion(&tree, 0, &positions, REPULSION);
        let right = repulsion(&tree, 1, &positions, REPULSION);
        assert!(left.x < 0.0);
        assert!(right.x > 0.0);
        assert!((left.x + right.x).abs() < 1e-9);
    }

    #[test]
    fn far_clusters_are_approximated_close_to_exact() {
        let mut positions = vec![Position::new(-500.0, 0.0)];
        positions.extend((0..30).map(|index| Position::new(500.0 + (index % 6) as f64, (index / 6) as f64)));
        let tree = Cell::build(&positions).expect("tree");
        let approx = repulsion(&tree, 0, &positions, REPULSION);
        let exact = positions[1..].iter().fold(Position::ZERO, |force, other| {
            let (toward, distance) = direction(positions[0], *other, 0);
            force + toward * (REPULSION.strength / (distance * distance + REPULSION.softening))
        });
        assert!((approx.x - exact.x).abs() / exact.x.abs() < 0.05);
    }

    #[test]
    fn collision_only_acts_on_overlaps() {
        let positions = [Position::ZERO, Position::new(5.0, 0.0), Position::new(400.0, 0.0)];
        let radii = [10.0, 10.0, 10.0];
        let params = Collision {
            strength: 1.0,
            spacing: 1.0,
            max_reach: 40.0,
        };
        let tree = Cell::build(&positions).expect("tree");
        let push = collision(&tree, 0, &positions, &radii, params);
        assert_eq!(push, Position::new(-15.0, 0.0));
        assert_eq!(collision(&tree, 2, &positions, &radii, params), Position::ZERO);
    }

    #[test]
    fn coincident_points_still_separate() {
        let (toward, distance) = direction(Position::ZERO, Position::ZERO, 3);
        assert_eq!(distance, 0.0);
        assert!((toward.length() - 1.0).abs() < 1e-9);
    }
}
