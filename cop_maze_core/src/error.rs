//! Error types surfaced by session construction and the session handle.
use thiserror::Error;
use tokio::sync::oneshot;

use crate::map::GridError;

/// Invalid game parameters, reported before any generation work is done.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("maze dimensions must be positive, got {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("easiness must be within [0, 1], got {0}")]
    EasinessOutOfRange(f64),

    #[error("maze of {width}x{height} exceeds the limit of {max_cells} cells")]
    MazeTooLarge {
        width: usize,
        height: usize,
        max_cells: usize,
    },

    #[error("chase and return phases cannot both be empty")]
    EmptyPhaseWindow,

    #[error("phase window of {chase_ticks} chase and {return_ticks} return ticks overflows")]
    PhaseWindowOverflow { chase_ticks: u32, return_ticks: u32 },

    #[error("scare threshold must be a finite non-negative number, got {0}")]
    InvalidScareThreshold(f64),

    #[error("character start ({x}, {y}) is outside the {width}x{height} maze")]
    StartOutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },

    #[error("{gems} gems do not fit in a maze of {cells} cells")]
    TooManyGems { gems: usize, cells: usize },

    #[error(
        "{pursuers} pursuers need cells at distance >= {min_distance} from the start, only {eligible} exist"
    )]
    InfeasiblePursuers {
        pursuers: usize,
        eligible: usize,
        min_distance: usize,
    },

    #[error("two gems share cell ({x}, {y})")]
    DuplicateGem { x: usize, y: usize },

    #[error("unknown difficulty '{0}'")]
    UnknownDifficulty(String),

    #[error(transparent)]
    Placement(#[from] PlacementError),

    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Raised when randomized placement runs out of eligible cells.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("cannot place {requested} {item}: only {available} eligible cells remain")]
    NotEnoughCells {
        item: &'static str,
        requested: usize,
        available: usize,
    },
}

/// Failure reported by a sound level source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SoundError {
    #[error("sound input unavailable: {0}")]
    Unavailable(String),

    #[error("sound input disconnected")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Failures of the session handle talking to its worker.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session worker command channel closed")]
    CommandChannelClosed,

    #[error("session worker reply channel closed")]
    ReplyChannelClosed(#[source] oneshot::error::RecvError),
}
