use crate::model::Position;

const LEAF_CAPACITY: usize = 12;
const MAX_DEPTH: usize = 10;

/// Axis-aligned square cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) struct Square {
    pub(super) center: Position,
    pub(super) half: f64,
}

impl Square {
    fn enclosing(points: &[Position]) -> Option<Self> {
        let (min, max) = points.iter().fold(
            (
                Position::new(f64::INFINITY, f64::INFINITY),
                Position::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            ),
            |(min, max), point| {
                (
                    Position::new(min.x.min(point.x), min.y.min(point.y)),
                    Position::new(max.x.max(point.x), max.y.max(point.y)),
                )
            },
        );
        if !min.is_finite() || !max.is_finite() {
            return None;
        }

        let span = (max.x - min.x).max(max.y - min.y).max(1.0);
        Some(Self {
            center: (min + max) * 0.5,
            half: span * 0.5 + 1.0,
        })
    }

    pub(super) fn contains(self, point: Position) -> bool {
        (point.x - self.center.x).abs() <= self.half && (point.y - self.center.y).abs() <= self.half
    }

    pub(super) fn side(self) -> f64 {
        self.half * 2.0
    }

    /// Squared gap between two cells; zero when they touch or overlap.
    pub(super) fn gap_sq(self, other: Self) -> f64 {
        let reach = self.half + other.half;
        let dx = ((self.center.x - other.center.x).abs() - reach).max(0.0);
        let dy = ((self.center.y - other.center.y).abs() - reach).max(0.0);
        dx * dx + dy * dy
    }

    fn quadrant(self, point: Position) -> usize {
        usize::from(point.x >= self.center.x) | (usize::from(point.y >= self.center.y) << 1)
    }

    fn child(self, quadrant: usize) -> Self {
        let quarter = self.half * 0.5;
        let dx = if quadrant & 1 == 1 { quarter } else { -quarter };
        let dy = if quadrant & 2 == 2 { quarter } else { -quarter };
        Self {
            center: self.center + Position::new(dx, dy),
            half: quarter,
        }
    }
}

/// Barnes-Hut cell: leaves keep their point indices, branches only aggregate mass.
pub(super) struct Cell {
    pub(super) square: Square,
    pub(super) center_of_mass: Position,
    pub(super) mass: f64,
    pub(super) points: Vec<usize>,
    pub(super) children: [Option<Box<Cell>>; 4],
}

impl Cell {
    pub(super) fn build(positions: &[Position]) -> Option<Self> {
        let square = Square::enclosing(positions)?;
        Some(Self::split(square, (0..positions.len()).collect(), positions, 0))
    }

    fn split(square: Square, points: Vec<usize>, positions: &[Position], depth: usize) -> Self {
        let mass = points.len() as f64;
        let center_of_mass = if points.is_empty() {
            square.center
        } else {
            points
                .iter()
                .fold(Position::ZERO, |sum, &index| sum + positions[index])
                / mass
        };

        let mut cell = Self {
            square,
            center_of_mass,
            mass,
            points,
            children: std::array::from_fn(|_| None),
        };
        if depth >= MAX_DEPTH || cell.points.len() <= LEAF_CAPACITY {
            return cell;
        }

        let mut buckets: [Vec<usize>; 4] = std::array::from_fn(|_| Vec::new());
        for &index in &cell.points {
            buckets[square.quadrant(positions[index])].push(index);
        }
        if buckets.iter().filter(|bucket| !bucket.is_empty()).count() <= 1 {
            return cell;
        }

        for (quadrant, bucket) in buckets.into_iter().enumerate() {
            if !bucket.is_empty() {
                cell.children[quadrant] = Some(Box::new(Self::split(
                    square.child(quadrant),
                    bucket,
                    positions,
                    depth + 1,
                )));
            }
        }
        cell.points.clear();
        cell
    }

    pub(super) fn is_leaf(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }

    pub(super) fn children(&self) -> impl Iterator<Item = &Cell> {
        self.children.iter().filter_map(|child| child.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crowded_cells_split_and_keep_total_mass() {
        let positions = (0..40)
            .map(|index| Position::new((index % 8) as f64 * 10.0, (index / 8) as f64 * 10.0))
            .collect::<Vec<_>>();
        let root = Cell::build(&positions).expect("tree");

        assert!(!root.is_leaf());
        assert_eq!(root.mass, 40.0);
        assert_eq!(root.children().map(|child| child.mass).sum::<f64>(), 40.0);
        assert!(positions.iter().all(|point| root.square.contains(*point)));
    }

    #[test]
    fn empty_or_non_finite_input_builds_nothing() {
        assert!(Cell::build(&[]).is_none());
        assert!(Cell::build(&[Position::new(f64::NAN, 0.0)]).is_none());
    }

    #[test]
    fn gap_between_distant_squares() {
        let a = Square {
            center: Position::ZERO,
            half: 1.0,
        };
        let b = Square {
            center: Position::new(5.0, 0.0),
            half: 1.0,
        };
        assert_eq!(a.gap_sq(b), 9.0);
        assert_eq!(a.gap_sq(a), 0.0);
    }
}
