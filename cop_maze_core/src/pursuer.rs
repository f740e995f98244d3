use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{Position, maze::Maze, pathfinding};

/// What a pursuer is doing on a given tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PursuerPhase {
    /// Walking toward the character's current cell.
    Chase,
    /// Walking back toward its own origin.
    Return,
}

/// Repeating chase/return cycle shared by every pursuer of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseWindow {
    pub chase_ticks: u32,
    pub return_ticks: u32,
}

impl PhaseWindow {
    pub fn new(chase_ticks: u32, return_ticks: u32) -> Self {
        Self {
            chase_ticks,
            return_ticks,
        }
    }

    /// Ticks in one full cycle. Computed in `u64` so it cannot overflow.
    pub fn len(&self) -> u64 {
        u64::from(self.chase_ticks) + u64::from(self.return_ticks)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Phase for the `turn`-th step of the cycle.
    pub fn phase_at(&self, turn: u64) -> PursuerPhase {
        if self.is_empty() {
            return PursuerPhase::Chase;
        }
        if turn % self.len() < u64::from(self.chase_ticks) {
            PursuerPhase::Chase
        } else {
            PursuerPhase::Return
        }
    }
}

/// Outcome of advancing one pursuer by a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PursuerStep {
    pub phase: PursuerPhase,
    pub from: Position,
    pub to: Position,
}

impl PursuerStep {
    pub fn moved(&self) -> bool {
        self.from != self.to
    }
}

/// A pursuer walking the maze.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pursuer {
    position: Position,
    origin: Position,
    /// Shifts this pursuer's cycle so pursuers are not in lock-step.
    phase_offset: u32,
    /// Number of steps taken so far.
    move_turn: u64,
}

impl Pursuer {
    pub fn new(origin: Position, phase_offset: u32) -> Self {
        Self {
            position: origin,
            origin,
            phase_offset,
            move_turn: 0,
        }
    }

    /// Creates a pursuer with a phase offset drawn from `0..=max_phase_offset`.
    pub fn spawn<R: Rng + ?Sized>(origin: Position, max_phase_offset: u32, rng: &mut R) -> Self {
        Self::new(origin, rng.random_range(0..=max_phase_offset))
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn origin(&self) -> Position {
        self.origin
    }

    pub fn phase_offset(&self) -> u32 {
        self.phase_offset
    }

    pub fn move_turn(&self) -> u64 {
        self.move_turn
    }

    /// Phase the next step will run in.
    pub fn phase(&self, window: PhaseWindow) -> PursuerPhase {
        window.phase_at(self.move_turn + u64::from(self.phase_offset))
    }

    /// Takes one step along the shortest path toward `character` or toward
    /// the origin, depending on the phase. Stays put when already there.
    pub fn advance(
        &mut self,
        maze: &Maze,
        character: Position,
        window: PhaseWindow,
    ) -> PursuerStep {
        let phase = self.phase(window);
        let goal = match phase {
            PursuerPhase::Chase => character,
            PursuerPhase::Return => self.origin,
        };
        let from = self.position;
        if let Some(next) = pathfinding::next_step(maze, from, goal) {
            self.position = next;
        }
        self.move_turn += 1;
        PursuerStep {
            phase,
            from,
            to: self.position,
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn open_maze(width: usize, height: usize) -> Maze {
        let mut maze = Maze::new(width, height);
        for (pos, direction) in maze.closed_interior_walls() {
            maze.open_wall(pos, direction).unwrap();
        }
        maze
    }

    #[test]
    fn phase_window_alternates() {
        let window = PhaseWindow::new(2, 1);
        let phases: Vec<PursuerPhase> = (0..6).map(|turn| window.phase_at(turn)).collect();
        assert_eq!(
            phases,
            vec![
                PursuerPhase::Chase,
                PursuerPhase::Chase,
                PursuerPhase::Return,
                PursuerPhase::Chase,
                PursuerPhase::Chase,
                PursuerPhase::Return,
            ]
        );
    }

    #[test]
    fn extreme_windows_do_not_overflow() {
        let window = PhaseWindow::new(u32::MAX, u32::MAX);
        assert_eq!(window.len(), 2 * u64::from(u32::MAX));
        assert_eq!(window.phase_at(u64::from(u32::MAX) - 1), PursuerPhase::Chase);
        assert_eq!(window.phase_at(u64::from(u32::MAX)), PursuerPhase::Return);
    }

    #[test]
    fn chases_then_returns_home() {
        let maze = open_maze(10, 10);
        let window = PhaseWindow::new(20, 10);
        let origin = Position::new(0, 0);
        let character = Position::new(3, 3);
        let mut pursuer = Pursuer::new(origin, 0);

        for _ in 0..20 {
            let step = pursuer.advance(&maze, character, window);
            assert_eq!(step.phase, PursuerPhase::Chase);
        }
        assert_eq!(pathfinding::distance(&maze, pursuer.position(), character), Some(0));

        for _ in 0..10 {
            let step = pursuer.advance(&maze, character, window);
            assert_eq!(step.phase, PursuerPhase::Return);
        }
        assert_eq!(pursuer.position(), origin);
        assert_eq!(pursuer.move_turn(), 30);
        assert_eq!(pursuer.phase(window), PursuerPhase::Chase);
    }

    #[test]
    fn offset_shifts_the_cycle() {
        let maze = open_maze(4, 4);
        let window = PhaseWindow::new(20, 10);
        let origin = Position::new(3, 3);
        let mut pursuer = Pursuer::new(origin, 20);
        assert_eq!(pursuer.phase(window), PursuerPhase::Return);
        let step = pursuer.advance(&maze, Position::new(0, 0), window);
        assert_eq!(step.phase, PursuerPhase::Return);
        assert!(!step.moved());
        assert_eq!(pursuer.position(), origin);
    }

    #[test]
    fn spawn_offset_stays_within_bounds() {
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..100 {
            let pursuer = Pursuer::spawn(Position::new(1, 1), 5, &mut rng);
            assert!(pursuer.phase_offset() <= 5);
            assert_eq!(pursuer.move_turn(), 0);
        }
    }
}
