//! Maze construction: Wilson's algorithm, loosening and exit carving.
use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    Direction, Position, config::check_dimensions, error::ConfigError, map::Grid, maze::Maze,
};

/// The single opening carved through the outer boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exit {
    pub position: Position,
    /// Side of `position` on which the border wall was removed.
    pub direction: Direction,
}

/// Builds mazes of a fixed size and difficulty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MazeGenerator {
    width: usize,
    height: usize,
    easiness: f64,
}

impl MazeGenerator {
    pub fn new(width: usize, height: usize, easiness: f64) -> Result<Self, ConfigError> {
        check_dimensions(width, height)?;
        if !(0.0..=1.0).contains(&easiness) {
            return Err(ConfigError::EasinessOutOfRange(easiness));
        }
        Ok(Self {
            width,
            height,
            easiness,
        })
    }

    /// Runs the full pipeline: perfect maze, loosening, then one exit.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<(Maze, Exit), ConfigError> {
        let mut maze = self.perfect(rng)?;
        let opened = self.loosen(&mut maze, rng)?;
        let exit = carve_exit(&mut maze, rng)?;
        debug!(
            width = self.width,
            height = self.height,
            loosened = opened,
            exit = ?exit,
            "maze generated"
        );
        Ok((maze, exit))
    }

    /// Generates a perfect maze (a uniform spanning tree of the grid) with
    /// Wilson's algorithm.
    pub fn perfect<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Maze, ConfigError> {
        let mut maze = Maze::new(self.width, self.height);
        let mut connected: Grid<bool> = Grid::new(self.width, self.height);
        let cells: Vec<Position> = connected.positions().collect();

        let target = cells[rng.random_range(0..cells.len())];
        connected[target] = true;
        let mut unconnected: Vec<Position> =
            cells.into_iter().filter(|&pos| pos != target).collect();

        let mut walks = 0usize;
        while !unconnected.is_empty() {
            let start = unconnected[rng.random_range(0..unconnected.len())];
            let path = loop_erased_walk(&connected, start, rng);
            for pair in path.windows(2) {
                if let Some(direction) = Direction::between(pair[0], pair[1]) {
                    maze.open_wall(pair[0], direction)?;
                }
            }
            for &pos in &path {
                connected[pos] = true;
            }
            unconnected.retain(|&pos| !connected[pos]);
            walks += 1;
        }
        debug!(walks, "spanning tree complete");
        Ok(maze)
    }

    /// Opens a shuffled `easiness` fraction of the remaining interior walls.
    /// Returns how many walls were opened.
    pub fn loosen<R: Rng + ?Sized>(
        &self,
        maze: &mut Maze,
        rng: &mut R,
    ) -> Result<usize, ConfigError> {
        let mut walls = maze.closed_interior_walls();
        walls.shuffle(rng);
        let count = (walls.len() as f64 * self.easiness).round() as usize;
        for &(pos, direction) in walls.iter().take(count) {
            maze.open_wall(pos, direction)?;
        }
        Ok(count)
    }
}

/// Random walk from `start` until it hits a connected cell, erasing loops as
/// they form. A step that would leave the grid keeps the walk in place.
fn loop_erased_walk<R: Rng + ?Sized>(
    connected: &Grid<bool>,
    start: Position,
    rng: &mut R,
) -> Vec<Position> {
    let (width, height) = (connected.width(), connected.height());
    let mut path = vec![start];
    let mut current = start;
    while !connected[current] {
        let direction = Direction::ALL[rng.random_range(0..Direction::ALL.len())];
        if let Some(next) = current.step(direction, width, height) {
            current = next;
        }
        if let Some(seen) = path.iter().position(|&pos| pos == current) {
            path.truncate(seen);
        }
        path.push(current);
    }
    path
}

/// Opens one uniformly chosen border wall segment outward.
pub fn carve_exit<R: Rng + ?Sized>(maze: &mut Maze, rng: &mut R) -> Result<Exit, ConfigError> {
    let walls = maze.border_walls();
    if walls.is_empty() {
        return Err(ConfigError::InvalidDimensions {
            width: maze.width(),
            height: maze.height(),
        });
    }
    let (position, direction) = walls[rng.random_range(0..walls.len())];
    maze.open_wall(position, direction)?;
    Ok(Exit {
        position,
        direction,
    })
}
