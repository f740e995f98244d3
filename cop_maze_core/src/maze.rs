use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::{
    Direction, Position,
    map::{Grid, GridError},
};

bitflags! {
    /// Open edges of a single maze cell.
    ///
    /// A set bit means the wall on that side has been carved away. A freshly
    /// created cell has no bits set and is enclosed on all four sides.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct CellFlags: u8 {
        const LEFT   = 1 << 0;
        const BOTTOM = 1 << 1;
        const RIGHT  = 1 << 2;
        const TOP    = 1 << 3;
    }
}

impl CellFlags {
    pub fn from_direction(direction: Direction) -> Self {
        match direction {
            Direction::Left => CellFlags::LEFT,
            Direction::Down => CellFlags::BOTTOM,
            Direction::Right => CellFlags::RIGHT,
            Direction::Up => CellFlags::TOP,
        }
    }
}

/// A wall segment identified by the cell it belongs to and the side it is on.
pub type Wall = (Position, Direction);

/// The wall grid of a maze.
///
/// Wall openness is kept symmetric: whenever an interior wall is opened the
/// neighbouring cell gets the mirrored flag in the same call. Only border
/// walls, which have no neighbour, are ever open on a single side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Maze {
    cells: Grid<CellFlags>,
}

impl Maze {
    /// Creates a maze where every wall is closed.
    pub fn new(width: usize, height: usize) -> Self {
        Maze {
            cells: Grid::new(width, height),
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.cells.width()
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.cells.height()
    }

    /// Total number of cells.
    #[inline]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn contains(&self, pos: Position) -> bool {
        self.cells.is_valid(pos)
    }

    /// Open-edge flags of the cell at `pos`.
    pub fn flags(&self, pos: Position) -> Option<CellFlags> {
        self.cells.get(pos).copied()
    }

    /// Returns true when the wall on side `direction` of `pos` is closed.
    /// Positions outside the grid are treated as solid.
    pub fn has_wall(&self, pos: Position, direction: Direction) -> bool {
        match self.cells.get(pos) {
            Some(flags) => !flags.contains(CellFlags::from_direction(direction)),
            None => true,
        }
    }

    #[inline]
    pub fn is_open(&self, pos: Position, direction: Direction) -> bool {
        !self.has_wall(pos, direction)
    }

    /// The in-grid cell adjacent to `pos` on side `direction`.
    pub fn neighbor(&self, pos: Position, direction: Direction) -> Option<Position> {
        pos.step(direction, self.width(), self.height())
    }

    /// Opens the wall on side `direction` of `pos`.
    ///
    /// Sets the flag on `pos` and the opposite flag on the neighbour together.
    /// A border wall is opened outward on `pos` only. Returns the neighbour,
    /// if any.
    pub fn open_wall(
        &mut self,
        pos: Position,
        direction: Direction,
    ) -> Result<Option<Position>, GridError> {
        if !self.contains(pos) {
            return Err(self.cells.out_of_bounds(pos));
        }
        let neighbor = self.neighbor(pos, direction);
        self.cells[pos].insert(CellFlags::from_direction(direction));
        if let Some(next) = neighbor {
            self.cells[next].insert(CellFlags::from_direction(direction.opposite()));
        }
        Ok(neighbor)
    }

    /// In-grid neighbours of `pos` reachable through an open wall.
    pub fn passable_neighbors(&self, pos: Position) -> impl Iterator<Item = Position> + '_ {
        Direction::ALL.into_iter().filter_map(move |direction| {
            if self.is_open(pos, direction) {
                self.neighbor(pos, direction)
            } else {
                None
            }
        })
    }

    /// Every interior edge exactly once, named by its left or upper cell.
    pub fn interior_walls(&self) -> impl Iterator<Item = Wall> + '_ {
        let (width, height) = (self.width(), self.height());
        self.cells.positions().flat_map(move |pos| {
            let right = (pos.x + 1 < width).then_some((pos, Direction::Right));
            let down = (pos.y + 1 < height).then_some((pos, Direction::Down));
            right.into_iter().chain(down)
        })
    }

    /// Number of interior edges that are open.
    pub fn open_interior_edges(&self) -> usize {
        self.interior_walls()
            .filter(|&(pos, direction)| self.is_open(pos, direction))
            .count()
    }

    /// Interior walls that are still closed.
    pub fn closed_interior_walls(&self) -> Vec<Wall> {
        self.interior_walls()
            .filter(|&(pos, direction)| self.has_wall(pos, direction))
            .collect()
    }

    /// All `2 * (width + height)` wall segments on the outer boundary.
    pub fn border_walls(&self) -> Vec<Wall> {
        let (width, height) = (self.width(), self.height());
        if width == 0 || height == 0 {
            return Vec::new();
        }
        let mut walls = Vec::with_capacity(2 * (width + height));
        for x in 0..width {
            walls.push((Position { x, y: 0 }, Direction::Up));
            walls.push((Position { x, y: height - 1 }, Direction::Down));
        }
        for y in 0..height {
            walls.push((Position { x: 0, y }, Direction::Left));
            walls.push((Position { x: width - 1, y }, Direction::Right));
        }
        walls
    }

    /// Border wall segments that have been opened, i.e. the exits.
    pub fn border_openings(&self) -> Vec<Wall> {
        self.border_walls()
            .into_iter()
            .filter(|&(pos, direction)| self.is_open(pos, direction))
            .collect()
    }
}

/// Renders the walls as `+--+` / `|` box drawing, one text row for the top
/// walls of each maze row and one for its side walls.
impl fmt::Display for Maze {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (width, height) = (self.width(), self.height());
        if width == 0 || height == 0 {
            return Ok(());
        }
        for y in 0..height {
            for x in 0..width {
                let top = if self.has_wall(Position { x, y }, Direction::Up) {
                    "--"
                } else {
                    "  "
                };
                write!(f, "+{top}")?;
            }
            writeln!(f, "+")?;
            for x in 0..width {
                let left = if self.has_wall(Position { x, y }, Direction::Left) {
                    '|'
                } else {
                    ' '
                };
                write!(f, "{left}  ")?;
            }
            let right = if self.has_wall(Position { x: width - 1, y }, Direction::Right) {
                '|'
            } else {
                ' '
            };
            writeln!(f, "{right}")?;
        }
        for x in 0..width {
            let bottom = if self.has_wall(Position { x, y: height - 1 }, Direction::Down) {
                "--"
            } else {
                "  "
            };
            write!(f, "+{bottom}")?;
        }
        writeln!(f, "+")
    }
}
