use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::{
    Direction, GemId, Position,
    config::GameConfig,
    error::ConfigError,
    generator::{Exit, MazeGenerator},
    map::{Grid, GridError},
    maze::Maze,
    placement::ItemPlacer,
    pursuer::{PhaseWindow, Pursuer, PursuerPhase, PursuerStep},
    sound::SoundGate,
};

/// The player's avatar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    pub name: String,
    pub position: Position,
    pub owned_gems: usize,
    pub has_key: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gem {
    pub id: GemId,
    pub position: Position,
    pub collected: bool,
}

/// The door key. It only shows up once every gem is collected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    pub position: Position,
    pub visible: bool,
    /// Set once the key has been used on the door.
    pub collected: bool,
}

/// The way out, sitting on the cell whose border wall was carved open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Door {
    pub position: Position,
    pub opened: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum GameOutcome {
    #[default]
    InProgress,
    Won,
    Lost,
}

impl GameOutcome {
    pub fn is_terminal(self) -> bool {
        self != GameOutcome::InProgress
    }
}

/// Notification fired after every state change of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    CharacterMoved {
        from: Position,
        to: Position,
    },
    GemCollected {
        id: GemId,
        remaining: usize,
    },
    KeyRevealed {
        position: Position,
    },
    KeyPickedUp,
    DoorOpened,
    PursuerMoved {
        index: usize,
        from: Position,
        to: Position,
        phase: PursuerPhase,
    },
    PursuersScared {
        level: f64,
    },
    OutcomeChanged {
        outcome: GameOutcome,
    },
}

/// Result of one scheduled pursuer tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickReport {
    /// The game is already over; nothing happened.
    Skipped,
    /// The sound level scared every pursuer into staying put.
    Scared { level: f64 },
    /// Pursuers stepped, in order. Stops early on a capture.
    Advanced { steps: Vec<PursuerStep> },
}

/// Read-only copy of the mutable part of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub character: Character,
    pub gems: Vec<Gem>,
    pub key: Key,
    pub door: Door,
    pub pursuers: Vec<Pursuer>,
    pub outcome: GameOutcome,
    pub gems_left: usize,
    pub exit: Exit,
    pub window: PhaseWindow,
}

/// Explicit placement of everything in a session.
///
/// [`GameSession::new`] produces one from random generation; tests and
/// replays can build one by hand.
#[derive(Debug, Clone)]
pub struct SessionLayout {
    pub maze: Maze,
    pub exit: Exit,
    pub start: Position,
    pub gems: Vec<Position>,
    pub key: Position,
    pub pursuers: Vec<Pursuer>,
    pub window: PhaseWindow,
    pub require_key_pickup: bool,
    pub character_name: String,
}

type ChangeListener = Box<dyn FnMut(&SessionEvent) + Send>;

/// A single game: the maze, everything in it, and the rules that move it.
pub struct GameSession {
    maze: Arc<Maze>,
    exit: Exit,
    gem_cells: Grid<Option<GemId>>,
    character: Character,
    gems: Vec<Gem>,
    key: Key,
    door: Door,
    pursuers: Vec<Pursuer>,
    window: PhaseWindow,
    require_key_pickup: bool,
    outcome: GameOutcome,
    listeners: Vec<ChangeListener>,
}

impl GameSession {
    /// Generates a maze and places every item according to `config`.
    pub fn new<R: Rng + ?Sized>(config: &GameConfig, rng: &mut R) -> Result<Self, ConfigError> {
        config.validate()?;
        let generator = MazeGenerator::new(config.width, config.height, config.easiness)?;
        let (maze, exit) = generator.generate(rng)?;

        let mut placer = ItemPlacer::new(&maze);
        let gems = placer.place_gems(config.gems, rng)?;
        let key = placer.place_key(rng);
        let pursuers = placer
            .place_pursuers(
                config.pursuers,
                config.start,
                exit.position,
                config.min_pursuer_distance,
                rng,
            )?
            .into_iter()
            .map(|origin| Pursuer::spawn(origin, config.max_phase_offset, rng))
            .collect();

        let layout = SessionLayout {
            maze,
            exit,
            start: config.start,
            gems,
            key,
            pursuers,
            window: PhaseWindow::new(config.chase_ticks, config.return_ticks),
            require_key_pickup: config.require_key_pickup,
            character_name: config.character_name.clone(),
        };
        Self::from_layout(layout)
    }

    /// Builds a session from an explicit layout.
    ///
    /// Every position must lie inside the maze and gems must sit on distinct
    /// cells.
    pub fn from_layout(layout: SessionLayout) -> Result<Self, ConfigError> {
        let maze = layout.maze;
        let mut checked = vec![layout.start, layout.key, layout.exit.position];
        checked.extend(layout.gems.iter().copied());
        checked.extend(layout.pursuers.iter().map(Pursuer::origin));
        if let Some(outside) = checked.into_iter().find(|&pos| !maze.contains(pos)) {
            return Err(ConfigError::Grid(GridError::OutOfBounds {
                x: outside.x,
                y: outside.y,
                width: maze.width(),
                height: maze.height(),
            }));
        }

        let mut gem_cells: Grid<Option<GemId>> = Grid::new(maze.width(), maze.height());
        let mut gems = Vec::with_capacity(layout.gems.len());
        for (id, position) in layout.gems.into_iter().enumerate() {
            if gem_cells[position].is_some() {
                return Err(ConfigError::DuplicateGem {
                    x: position.x,
                    y: position.y,
                });
            }
            gem_cells.set(position, Some(id))?;
            gems.push(Gem {
                id,
                position,
                collected: false,
            });
        }

        debug!(
            gems = gems.len(),
            pursuers = layout.pursuers.len(),
            door = ?layout.exit.position,
            "session created"
        );

        Ok(GameSession {
            key: Key {
                position: layout.key,
                visible: gems.is_empty(),
                collected: false,
            },
            door: Door {
                position: layout.exit.position,
                opened: false,
            },
            character: Character {
                name: layout.character_name,
                position: layout.start,
                owned_gems: 0,
                has_key: false,
            },
            maze: Arc::new(maze),
            exit: layout.exit,
            gem_cells,
            gems,
            pursuers: layout.pursuers,
            window: layout.window,
            require_key_pickup: layout.require_key_pickup,
            outcome: GameOutcome::InProgress,
            listeners: Vec::new(),
        })
    }

    /// Registers a callback run after every state change.
    pub fn on_change<F>(&mut self, listener: F)
    where
        F: FnMut(&SessionEvent) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    fn emit(&mut self, event: SessionEvent) {
        trace!(?event, "session event");
        for listener in &mut self.listeners {
            listener(&event);
        }
    }

    /// Moves the character one cell. Returns false, changing nothing, when
    /// the game is over or a wall or the maze boundary is in the way.
    pub fn move_character(&mut self, direction: Direction) -> bool {
        if self.outcome.is_terminal() {
            return false;
        }
        let from = self.character.position;
        if self.maze.has_wall(from, direction) {
            return false;
        }
        let Some(to) = self.maze.neighbor(from, direction) else {
            return false;
        };

        self.character.position = to;
        self.emit(SessionEvent::CharacterMoved { from, to });
        self.collect_gem_at(to);
        self.pick_up_key_at(to);
        self.check_capture();
        self.check_escape();
        true
    }

    fn collect_gem_at(&mut self, pos: Position) {
        let Some(id) = self.gem_cells.get_mut(pos).and_then(Option::take) else {
            return;
        };
        let gem = &mut self.gems[id];
        if gem.collected {
            return;
        }
        gem.collected = true;
        self.character.owned_gems += 1;
        let remaining = self.num_gems_left();
        self.emit(SessionEvent::GemCollected { id, remaining });

        if self.character.owned_gems == self.gems.len() && !self.key.visible {
            self.key.visible = true;
            let position = self.key.position;
            self.emit(SessionEvent::KeyRevealed { position });
        }
    }

    fn pick_up_key_at(&mut self, pos: Position) {
        if self.key.visible
            && !self.key.collected
            && !self.character.has_key
            && self.key.position == pos
        {
            self.character.has_key = true;
            self.emit(SessionEvent::KeyPickedUp);
        }
    }

    /// Uses the key on the door. Only possible once the key is visible and
    /// unused, and, if the session requires it, picked up.
    pub fn apply_key(&mut self) -> bool {
        if self.outcome.is_terminal() || !self.key.visible || self.key.collected {
            return false;
        }
        if self.require_key_pickup && !self.character.has_key {
            return false;
        }
        self.key.collected = true;
        self.door.opened = true;
        self.character.has_key = true;
        self.emit(SessionEvent::DoorOpened);
        self.check_escape();
        true
    }

    /// Advances every pursuer by one step unless the game is over or the
    /// sound gate scares them off.
    pub fn tick_pursuers(&mut self, gate: &mut SoundGate) -> TickReport {
        if self.outcome.is_terminal() {
            return TickReport::Skipped;
        }
        if gate.is_scared() {
            let level = gate.last_level();
            self.emit(SessionEvent::PursuersScared { level });
            return TickReport::Scared { level };
        }

        let mut steps = Vec::with_capacity(self.pursuers.len());
        for index in 0..self.pursuers.len() {
            let step =
                self.pursuers[index].advance(&self.maze, self.character.position, self.window);
            trace!(index, ?step, "pursuer advanced");
            steps.push(step);
            if step.moved() {
                self.emit(SessionEvent::PursuerMoved {
                    index,
                    from: step.from,
                    to: step.to,
                    phase: step.phase,
                });
            }
            if self.check_capture() {
                break;
            }
        }
        TickReport::Advanced { steps }
    }

    /// Ends the game as lost if a pursuer shares the character's cell.
    fn check_capture(&mut self) -> bool {
        let position = self.character.position;
        if self.pursuers.iter().any(|p| p.position() == position) {
            self.finish(GameOutcome::Lost);
            true
        } else {
            false
        }
    }

    fn check_escape(&mut self) {
        if self.door.opened && self.character.position == self.door.position {
            self.finish(GameOutcome::Won);
        }
    }

    fn finish(&mut self, outcome: GameOutcome) {
        if self.outcome.is_terminal() {
            return;
        }
        self.outcome = outcome;
        info!(?outcome, position = ?self.character.position, "game over");
        self.emit(SessionEvent::OutcomeChanged { outcome });
    }

    pub fn maze(&self) -> &Arc<Maze> {
        &self.maze
    }

    pub fn exit(&self) -> Exit {
        self.exit
    }

    pub fn character(&self) -> &Character {
        &self.character
    }

    pub fn gems(&self) -> &[Gem] {
        &self.gems
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn door(&self) -> &Door {
        &self.door
    }

    pub fn pursuers(&self) -> &[Pursuer] {
        &self.pursuers
    }

    pub fn window(&self) -> PhaseWindow {
        self.window
    }

    pub fn outcome(&self) -> GameOutcome {
        self.outcome
    }

    pub fn is_won(&self) -> bool {
        self.outcome == GameOutcome::Won
    }

    pub fn is_lost(&self) -> bool {
        self.outcome == GameOutcome::Lost
    }

    pub fn num_gems_left(&self) -> usize {
        self.gems.len() - self.character.owned_gems
    }

    /// Gem still lying on `pos`, if any.
    pub fn gem_at(&self, pos: Position) -> Option<GemId> {
        self.gem_cells.get(pos).copied().flatten()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            character: self.character.clone(),
            gems: self.gems.clone(),
            key: self.key.clone(),
            door: self.door.clone(),
            pursuers: self.pursuers.clone(),
            outcome: self.outcome,
            gems_left: self.num_gems_left(),
            exit: self.exit,
            window: self.window,
        }
    }
}

impl std::fmt::Debug for GameSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession")
            .field("character", &self.character)
            .field("key", &self.key)
            .field("door", &self.door)
            .field("pursuers", &self.pursuers)
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::sound::{SharedSoundLevel, SilentSource};

    /// A 5x1 open corridor: start at (0, 0), gems at (1, 0) and (2, 0), key at
    /// (3, 0), door at (4, 0) with the exit on its right.
    fn corridor(pursuers: Vec<Pursuer>) -> GameSession {
        let mut maze = Maze::new(5, 1);
        for (pos, direction) in maze.closed_interior_walls() {
            maze.open_wall(pos, direction).unwrap();
        }
        let exit = Exit {
            position: Position::new(4, 0),
            direction: Direction::Right,
        };
        maze.open_wall(exit.position, exit.direction).unwrap();
        GameSession::from_layout(SessionLayout {
            maze,
            exit,
            start: Position::new(0, 0),
            gems: vec![Position::new(1, 0), Position::new(2, 0)],
            key: Position::new(3, 0),
            pursuers,
            window: PhaseWindow::new(20, 10),
            require_key_pickup: false,
            character_name: "Clyde".to_string(),
        })
        .unwrap()
    }

    fn silent_gate() -> SoundGate {
        SoundGate::new(Box::new(SilentSource), 10.0)
    }

    #[test]
    fn walls_and_the_boundary_block_moves() {
        let mut session = corridor(vec![]);
        assert!(!session.move_character(Direction::Up));
        assert!(!session.move_character(Direction::Left));
        assert_eq!(session.character().position, Position::new(0, 0));
        for _ in 0..4 {
            assert!(session.move_character(Direction::Right));
        }
        // The exit opening leads out of the grid; the character stays inside.
        assert!(session.maze().is_open(Position::new(4, 0), Direction::Right));
        assert!(!session.move_character(Direction::Right));
        assert_eq!(session.character().position, Position::new(4, 0));
    }

    #[test]
    fn gems_count_once_and_reveal_the_key() {
        let mut session = corridor(vec![]);
        assert_eq!(session.num_gems_left(), 2);
        assert!(session.move_character(Direction::Right));
        assert_eq!(session.character().owned_gems, 1);
        assert!(!session.key().visible);

        assert!(session.move_character(Direction::Left));
        assert!(session.move_character(Direction::Right));
        assert_eq!(session.character().owned_gems, 1);
        assert!(session.gems()[0].collected);
        assert_eq!(session.gem_at(Position::new(1, 0)), None);

        assert!(session.move_character(Direction::Right));
        assert_eq!(session.character().owned_gems, 2);
        assert_eq!(session.num_gems_left(), 0);
        assert!(session.key().visible);

        assert!(session.move_character(Direction::Left));
        assert!(session.key().visible);
    }

    #[test]
    fn key_cannot_be_used_before_it_appears() {
        let mut session = corridor(vec![]);
        assert!(!session.apply_key());
        assert!(!session.door().opened);
    }

    #[test]
    fn reaching_a_closed_door_does_not_win() {
        let mut session = corridor(vec![]);
        for _ in 0..4 {
            session.move_character(Direction::Right);
        }
        assert_eq!(session.character().position, session.door().position);
        assert_eq!(session.outcome(), GameOutcome::InProgress);

        assert!(session.apply_key());
        assert!(session.door().opened);
        assert!(session.key().collected);
        assert!(session.is_won());
        assert!(!session.apply_key());
        assert!(!session.move_character(Direction::Left));
    }

    #[test]
    fn opening_the_door_early_wins_on_arrival() {
        let mut session = corridor(vec![]);
        session.move_character(Direction::Right);
        session.move_character(Direction::Right);
        assert!(session.apply_key());
        assert!(!session.is_won());
        session.move_character(Direction::Right);
        session.move_character(Direction::Right);
        assert!(session.is_won());
    }

    #[test]
    fn key_pickup_policy_gates_the_door() {
        let mut session = corridor(vec![]);
        session.require_key_pickup = true;
        session.move_character(Direction::Right);
        session.move_character(Direction::Right);
        assert!(!session.apply_key());
        session.move_character(Direction::Right);
        assert!(session.character().has_key);
        assert!(session.apply_key());
    }

    #[test]
    fn walking_into_a_pursuer_loses() {
        let mut session = corridor(vec![Pursuer::new(Position::new(2, 0), 0)]);
        session.move_character(Direction::Right);
        assert_eq!(session.outcome(), GameOutcome::InProgress);
        session.move_character(Direction::Right);
        assert!(session.is_lost());
        assert!(!session.move_character(Direction::Left));
        assert_eq!(session.tick_pursuers(&mut silent_gate()), TickReport::Skipped);
    }

    #[test]
    fn pursuer_tick_catches_the_character() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut session = corridor(vec![Pursuer::new(Position::new(3, 0), 0)]);
        let sink = Arc::clone(&events);
        session.on_change(move |event| sink.lock().unwrap().push(event.clone()));
        let mut gate = silent_gate();

        let TickReport::Advanced { steps } = session.tick_pursuers(&mut gate) else {
            panic!("pursuers should advance");
        };
        assert_eq!(steps[0].to, Position::new(2, 0));
        assert_eq!(session.outcome(), GameOutcome::InProgress);

        session.tick_pursuers(&mut gate);
        session.tick_pursuers(&mut gate);
        assert!(session.is_lost());

        let events = events.lock().unwrap();
        assert_eq!(
            events.last(),
            Some(&SessionEvent::OutcomeChanged {
                outcome: GameOutcome::Lost
            })
        );
        let moves = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::PursuerMoved { .. }))
            .count();
        assert_eq!(moves, 3);
    }

    #[test]
    fn loud_ticks_freeze_pursuers() {
        let level = SharedSoundLevel::new();
        let mut gate = SoundGate::new(Box::new(level.clone()), 10.0);
        let mut session = corridor(vec![Pursuer::new(Position::new(4, 0), 0)]);

        level.set(50.0);
        assert_eq!(
            session.tick_pursuers(&mut gate),
            TickReport::Scared { level: 50.0 }
        );
        assert_eq!(session.pursuers()[0].position(), Position::new(4, 0));
        assert_eq!(session.pursuers()[0].move_turn(), 0);

        level.set(0.0);
        session.tick_pursuers(&mut gate);
        assert_eq!(session.pursuers()[0].position(), Position::new(3, 0));
    }

    #[test]
    fn gems_sharing_a_cell_are_rejected() {
        let mut maze = Maze::new(3, 1);
        for (pos, direction) in maze.closed_interior_walls() {
            maze.open_wall(pos, direction).unwrap();
        }
        let exit = Exit {
            position: Position::new(2, 0),
            direction: Direction::Right,
        };
        maze.open_wall(exit.position, exit.direction).unwrap();
        let result = GameSession::from_layout(SessionLayout {
            maze,
            exit,
            start: Position::new(0, 0),
            gems: vec![Position::new(1, 0), Position::new(1, 0)],
            key: Position::new(2, 0),
            pursuers: vec![],
            window: PhaseWindow::new(1, 1),
            require_key_pickup: false,
            character_name: String::new(),
        });
        assert_eq!(
            result.err(),
            Some(ConfigError::DuplicateGem { x: 1, y: 0 })
        );
    }

    #[test]
    fn validated_config_can_still_run_out_of_pursuer_cells() {
        use rand::{SeedableRng, rngs::StdRng};

        use crate::error::PlacementError;

        // Only (2, 2) is far enough from the start, and a gem always lands there.
        let config = GameConfig {
            width: 3,
            height: 3,
            gems: 9,
            pursuers: 1,
            min_pursuer_distance: 4,
            ..GameConfig::default()
        };
        assert_eq!(config.validate(), Ok(()));
        let result = GameSession::new(&config, &mut StdRng::seed_from_u64(3));
        assert_eq!(
            result.err(),
            Some(ConfigError::Placement(PlacementError::NotEnoughCells {
                item: "pursuers",
                requested: 1,
                available: 0
            }))
        );
    }

    #[test]
    fn snapshot_carries_the_phase_window() {
        let session = corridor(vec![]);
        assert_eq!(session.snapshot().window, PhaseWindow::new(20, 10));
        assert_eq!(session.snapshot().window, session.window());
    }

    #[test]
    fn no_gems_means_the_key_starts_visible() {
        let mut maze = Maze::new(2, 1);
        maze.open_wall(Position::new(0, 0), Direction::Right).unwrap();
        maze.open_wall(Position::new(1, 0), Direction::Right).unwrap();
        let session = GameSession::from_layout(SessionLayout {
            maze,
            exit: Exit {
                position: Position::new(1, 0),
                direction: Direction::Right,
            },
            start: Position::new(0, 0),
            gems: vec![],
            key: Position::new(0, 0),
            pursuers: vec![],
            window: PhaseWindow::new(1, 1),
            require_key_pickup: false,
            character_name: String::new(),
        })
        .unwrap();
        assert!(session.key().visible);
        assert_eq!(session.num_gems_left(), 0);
    }
}
