//! Breadth-first search over the maze's open walls.
use std::collections::VecDeque;

use crate::{Direction, Position, map::Grid, maze::Maze};

/// Shortest path from `from` to `to`, excluding `from` and including `to`.
///
/// Each visited cell only remembers the direction it was entered through;
/// the route is rebuilt by walking those directions backwards from `to`.
/// Returns `Some(vec![])` when both ends coincide and `None` when either end
/// lies outside the maze or `to` cannot be reached.
pub fn shortest_path(maze: &Maze, from: Position, to: Position) -> Option<Vec<Position>> {
    if !maze.contains(from) || !maze.contains(to) {
        return None;
    }
    if from == to {
        return Some(Vec::new());
    }

    let mut entered_by: Grid<Option<Direction>> = Grid::new(maze.width(), maze.height());
    let mut visited: Grid<bool> = Grid::new(maze.width(), maze.height());
    let mut frontier = VecDeque::new();
    visited[from] = true;
    frontier.push_back(from);

    while let Some(current) = frontier.pop_front() {
        if current == to {
            break;
        }
        for direction in Direction::ALL {
            if maze.has_wall(current, direction) {
                continue;
            }
            let Some(next) = maze.neighbor(current, direction) else {
                continue;
            };
            if visited[next] {
                continue;
            }
            visited[next] = true;
            entered_by[next] = Some(direction);
            frontier.push_back(next);
        }
    }

    if !visited[to] {
        return None;
    }

    let mut path = Vec::new();
    let mut cursor = to;
    while cursor != from {
        path.push(cursor);
        let direction = entered_by[cursor]?;
        cursor = maze.neighbor(cursor, direction.opposite())?;
    }
    path.reverse();
    Some(path)
}

/// First cell on the shortest path from `from` to `to`, if a step is needed.
pub fn next_step(maze: &Maze, from: Position, to: Position) -> Option<Position> {
    shortest_path(maze, from, to)?.first().copied()
}

/// Length of the shortest path between two cells.
pub fn distance(maze: &Maze, from: Position, to: Position) -> Option<usize> {
    shortest_path(maze, from, to).map(|path| path.len())
}

/// Number of cells reachable from `from`, `from` included.
pub fn reachable_from(maze: &Maze, from: Position) -> usize {
    if !maze.contains(from) {
        return 0;
    }
    let mut visited: Grid<bool> = Grid::new(maze.width(), maze.height());
    let mut frontier = VecDeque::from([from]);
    visited[from] = true;
    let mut count = 0;
    while let Some(current) = frontier.pop_front() {
        count += 1;
        for next in maze.passable_neighbors(current) {
            if !visited[next] {
                visited[next] = true;
                frontier.push_back(next);
            }
        }
    }
    count
}
