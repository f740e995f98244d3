use serde::{Deserialize, Serialize};

pub mod config;
pub mod error;
pub mod generator;
pub mod handle;
pub mod map;
pub mod maze;
pub mod pathfinding;
pub mod placement;
pub mod pursuer;
pub mod scheduler;
pub mod session;
pub mod sound;
pub mod worker;

pub use config::{Difficulty, GameConfig};
pub use error::{ConfigError, PlacementError, SessionError};
pub use handle::{SessionHandle, spawn_session};
pub use maze::Maze;
pub use session::{GameOutcome, GameSession, SessionEvent, SessionSnapshot};

/// Identifier of a gem, its index in the session's gem list.
pub type GemId = usize;

/// Represents a 2D coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }

    /// Returns manhattan distance between two positions
    pub fn manhattan_distance(&self, other: &Position) -> usize {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Moves one cell in `direction`, returning `None` when the step would
    /// leave a `width` x `height` grid.
    pub fn step(&self, direction: Direction, width: usize, height: usize) -> Option<Position> {
        let (dx, dy) = direction.offset();
        let x = self.x.checked_add_signed(dx)?;
        let y = self.y.checked_add_signed(dy)?;
        (x < width && y < height).then_some(Position { x, y })
    }
}

/// One of the four orthogonal directions. `Up` decreases `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Left,
    Down,
    Right,
    Up,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Left,
        Direction::Down,
        Direction::Right,
        Direction::Up,
    ];

    pub fn offset(self) -> (isize, isize) {
        match self {
            Direction::Left => (-1, 0),
            Direction::Down => (0, 1),
            Direction::Right => (1, 0),
            Direction::Up => (0, -1),
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Left => Direction::Right,
            Direction::Down => Direction::Up,
            Direction::Right => Direction::Left,
            Direction::Up => Direction::Down,
        }
    }

    /// Direction of the step from `from` to an orthogonally adjacent `to`.
    pub fn between(from: Position, to: Position) -> Option<Direction> {
        let dx = to.x as isize - from.x as isize;
        let dy = to.y as isize - from.y as isize;
        match (dx, dy) {
            (-1, 0) => Some(Direction::Left),
            (0, 1) => Some(Direction::Down),
            (1, 0) => Some(Direction::Right),
            (0, -1) => Some(Direction::Up),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_is_clamped_to_the_grid() {
        let origin = Position::new(0, 0);
        assert_eq!(origin.step(Direction::Left, 3, 3), None);
        assert_eq!(origin.step(Direction::Up, 3, 3), None);
        assert_eq!(origin.step(Direction::Right, 3, 3), Some(Position::new(1, 0)));
        assert_eq!(origin.step(Direction::Down, 3, 3), Some(Position::new(0, 1)));
        assert_eq!(Position::new(2, 2).step(Direction::Right, 3, 3), None);
    }

    #[test]
    fn between_inverts_step() {
        let from = Position::new(4, 4);
        for direction in Direction::ALL {
            let to = from.step(direction, 10, 10).unwrap();
            assert_eq!(Direction::between(from, to), Some(direction));
            assert_eq!(Direction::between(to, from), Some(direction.opposite()));
        }
        assert_eq!(Direction::between(from, Position::new(6, 4)), None);
    }

    #[test]
    fn manhattan_distance_is_symmetric() {
        let a = Position::new(1, 7);
        let b = Position::new(4, 2);
        assert_eq!(a.manhattan_distance(&b), 8);
        assert_eq!(b.manhattan_distance(&a), 8);
    }
}
