//! Game parameters and the difficulty presets offered to players.
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{Position, error::ConfigError};

/// Largest maze, in cells, a session may be built with.
pub const MAX_CELLS: usize = 1 << 20;

/// Checks `width` x `height` is a non-empty maze of at most [`MAX_CELLS`]
/// cells and returns its cell count.
pub fn check_dimensions(width: usize, height: usize) -> Result<usize, ConfigError> {
    if width == 0 || height == 0 {
        return Err(ConfigError::InvalidDimensions { width, height });
    }
    match width.checked_mul(height) {
        Some(cells) if cells <= MAX_CELLS => Ok(cells),
        _ => Err(ConfigError::MazeTooLarge {
            width,
            height,
            max_cells: MAX_CELLS,
        }),
    }
}

/// Everything needed to build a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub width: usize,
    pub height: usize,
    /// Fraction of the spanning tree's closed interior walls to open, in `[0, 1]`.
    pub easiness: f64,
    pub gems: usize,
    pub pursuers: usize,
    /// Ticks a pursuer spends chasing the character in each phase window.
    pub chase_ticks: u32,
    /// Ticks a pursuer spends walking back to its origin in each phase window.
    pub return_ticks: u32,
    /// Upper bound (inclusive) of the random phase offset given to each pursuer.
    pub max_phase_offset: u32,
    /// Minimum manhattan distance between a pursuer's origin and the start.
    pub min_pursuer_distance: usize,
    pub start: Position,
    /// Sound level above which pursuers freeze for a tick.
    pub scare_threshold: f64,
    /// Period of the pursuer tick. Zero disables the scheduler; ticks must
    /// then be driven by hand.
    pub tick_interval_ms: u64,
    /// When set, the key must be walked over before it can open the door.
    pub require_key_pickup: bool,
    pub seed: Option<u64>,
    pub character_name: String,
}

impl Default for GameConfig {
    fn default() -> Self {
        Difficulty::Easy.config()
    }
}

impl GameConfig {
    pub fn cell_count(&self) -> usize {
        self.width.saturating_mul(self.height)
    }

    /// Length of the chase/return cycle, `None` if it does not fit a `u32`.
    pub fn phase_window(&self) -> Option<u32> {
        self.chase_ticks.checked_add(self.return_ticks)
    }

    /// Rejects parameters that can never produce a playable session.
    ///
    /// This is a necessary check, not a sufficient one. Pursuer feasibility
    /// only counts cells far enough from the start, while gems and the door
    /// are placed first and may take some of those cells. Construction then
    /// fails with [`ConfigError::Placement`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        let cells = check_dimensions(self.width, self.height)?;
        if !(0.0..=1.0).contains(&self.easiness) {
            return Err(ConfigError::EasinessOutOfRange(self.easiness));
        }
        match self.phase_window() {
            None => {
                return Err(ConfigError::PhaseWindowOverflow {
                    chase_ticks: self.chase_ticks,
                    return_ticks: self.return_ticks,
                });
            }
            Some(0) => return Err(ConfigError::EmptyPhaseWindow),
            Some(_) => {}
        }
        if !self.scare_threshold.is_finite() || self.scare_threshold < 0.0 {
            return Err(ConfigError::InvalidScareThreshold(self.scare_threshold));
        }
        if self.start.x >= self.width || self.start.y >= self.height {
            return Err(ConfigError::StartOutOfBounds {
                x: self.start.x,
                y: self.start.y,
                width: self.width,
                height: self.height,
            });
        }
        if self.gems > cells {
            return Err(ConfigError::TooManyGems {
                gems: self.gems,
                cells,
            });
        }
        if self.pursuers > 0 {
            let eligible = self.pursuer_candidate_count();
            if eligible < self.pursuers {
                return Err(ConfigError::InfeasiblePursuers {
                    pursuers: self.pursuers,
                    eligible,
                    min_distance: self.min_pursuer_distance,
                });
            }
        }
        Ok(())
    }

    /// Cells other than the start that satisfy the spawn distance.
    fn pursuer_candidate_count(&self) -> usize {
        let mut count = 0;
        for y in 0..self.height {
            for x in 0..self.width {
                let pos = Position { x, y };
                if pos != self.start
                    && pos.manhattan_distance(&self.start) >= self.min_pursuer_distance
                {
                    count += 1;
                }
            }
        }
        count
    }
}

/// Preset levels of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Hard,
    SuperHard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Hard, Difficulty::SuperHard];

    pub fn name(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Hard => "Hard",
            Difficulty::SuperHard => "Super Hard",
        }
    }

    /// Full configuration for this level.
    pub fn config(self) -> GameConfig {
        // (width, height, gems, pursuers, easiness)
        let (width, height, gems, pursuers, easiness) = match self {
            Difficulty::Easy => (18, 14, 3, 1, 0.3),
            Difficulty::Hard => (20, 15, 5, 2, 0.2),
            Difficulty::SuperHard => (22, 16, 7, 3, 0.1),
        };
        GameConfig {
            width,
            height,
            easiness,
            gems,
            pursuers,
            chase_ticks: 20,
            return_ticks: 10,
            max_phase_offset: 29,
            min_pursuer_distance: 8,
            start: Position::new(0, 0),
            scare_threshold: 1000.0,
            tick_interval_ms: 1000,
            require_key_pickup: false,
            seed: None,
            character_name: "Bonnie".to_string(),
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Difficulty {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "easy" => Ok(Difficulty::Easy),
            "hard" => Ok(Difficulty::Hard),
            "superhard" => Ok(Difficulty::SuperHard),
            _ => Err(ConfigError::UnknownDifficulty(s.to_string())),
        }
    }
}
