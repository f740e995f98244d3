//! Randomized placement of gems, the key and pursuer origins.
use rand::Rng;
use tracing::debug;

use crate::{Position, error::PlacementError, map::Grid, maze::Maze};

/// Rejection-sampling attempts per cell before switching to an exhaustive
/// draw over the remaining candidates.
const ATTEMPTS_PER_CELL: usize = 8;

/// Picks cells for the items of a new session.
///
/// Tracks which cells are already taken by gems and pursuer origins so later
/// draws never overlap earlier ones.
#[derive(Debug, Clone)]
pub struct ItemPlacer {
    gem_cells: Grid<bool>,
    pursuer_cells: Grid<bool>,
}

impl ItemPlacer {
    pub fn new(maze: &Maze) -> Self {
        Self {
            gem_cells: Grid::new(maze.width(), maze.height()),
            pursuer_cells: Grid::new(maze.width(), maze.height()),
        }
    }

    /// Places `count` gems on distinct cells.
    pub fn place_gems<R: Rng + ?Sized>(
        &mut self,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<Position>, PlacementError> {
        let mut placed = Vec::with_capacity(count);
        for _ in 0..count {
            let gem_cells = &self.gem_cells;
            let pos = sample_cell(gem_cells.width(), gem_cells.height(), rng, |pos| {
                !gem_cells[pos]
            })
            .ok_or(PlacementError::NotEnoughCells {
                item: "gems",
                requested: count,
                available: placed.len(),
            })?;
            self.gem_cells[pos] = true;
            placed.push(pos);
        }
        debug!(gems = placed.len(), "gems placed");
        Ok(placed)
    }

    /// Any cell at all; the key may share a cell with a gem.
    pub fn place_key<R: Rng + ?Sized>(&self, rng: &mut R) -> Position {
        let (width, height) = (self.gem_cells.width(), self.gem_cells.height());
        Position {
            x: rng.random_range(0..width),
            y: rng.random_range(0..height),
        }
    }

    /// Places `count` pursuer origins away from gems, the start and the door,
    /// at manhattan distance of at least `min_distance` from `start`.
    pub fn place_pursuers<R: Rng + ?Sized>(
        &mut self,
        count: usize,
        start: Position,
        door: Position,
        min_distance: usize,
        rng: &mut R,
    ) -> Result<Vec<Position>, PlacementError> {
        let mut placed = Vec::with_capacity(count);
        for _ in 0..count {
            let gem_cells = &self.gem_cells;
            let pursuer_cells = &self.pursuer_cells;
            let eligible = |pos: Position| {
                !gem_cells[pos]
                    && !pursuer_cells[pos]
                    && pos != start
                    && pos != door
                    && pos.manhattan_distance(&start) >= min_distance
            };
            let pos = sample_cell(gem_cells.width(), gem_cells.height(), rng, eligible).ok_or(
                PlacementError::NotEnoughCells {
                    item: "pursuers",
                    requested: count,
                    available: placed.len(),
                },
            )?;
            self.pursuer_cells[pos] = true;
            placed.push(pos);
        }
        debug!(pursuers = placed.len(), min_distance, "pursuers placed");
        Ok(placed)
    }
}

/// Draws a uniformly random cell satisfying `eligible`.
///
/// Tries rejection sampling first; once the attempt budget is spent, falls
/// back to picking among the enumerated candidates, and gives up only when
/// there are none.
fn sample_cell<R, F>(width: usize, height: usize, rng: &mut R, eligible: F) -> Option<Position>
where
    R: Rng + ?Sized,
    F: Fn(Position) -> bool,
{
    let cells = width * height;
    if cells == 0 {
        return None;
    }
    for _ in 0..cells * ATTEMPTS_PER_CELL {
        let pos = Position {
            x: rng.random_range(0..width),
            y: rng.random_range(0..height),
        };
        if eligible(pos) {
            return Some(pos);
        }
    }
    let candidates: Vec<Position> = (0..cells)
        .map(|index| Position {
            x: index % width,
            y: index / width,
        })
        .filter(|&pos| eligible(pos))
        .collect();
    if candidates.is_empty() {
        None
    } else {
        Some(candidates[rng.random_range(0..candidates.len())])
    }
}
