//! Single-task owner of a [`GameSession`].
//!
//! Player commands and scheduler ticks arrive on the same queue and are
//! applied one at a time, so a win and a loss can never be decided
//! concurrently.
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::{
    Direction,
    scheduler::TickerHandle,
    session::{GameSession, SessionSnapshot, TickReport},
    sound::SoundGate,
};

/// Commands that can be sent to the session worker
pub enum Command {
    /// Move the character one cell
    Move {
        direction: Direction,
        reply: oneshot::Sender<bool>,
    },
    /// Use the key on the door
    ApplyKey { reply: oneshot::Sender<bool> },
    /// Advance the pursuers. Scheduled ticks carry no reply.
    Tick {
        reply: Option<oneshot::Sender<TickReport>>,
    },
    /// Copy the current state
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    /// Stop the ticker and the worker
    Shutdown { reply: oneshot::Sender<()> },
}

/// Session worker that owns the game state and processes commands
pub struct SessionWorker {
    session: GameSession,
    gate: SoundGate,
    ticker: TickerHandle,
    command_rx: mpsc::Receiver<Command>,
}

impl SessionWorker {
    pub fn new(
        session: GameSession,
        gate: SoundGate,
        ticker: TickerHandle,
        command_rx: mpsc::Receiver<Command>,
    ) -> Self {
        Self {
            session,
            gate,
            ticker,
            command_rx,
        }
    }

    /// Main worker loop. Ends on shutdown or once every sender is dropped.
    pub async fn run(mut self) {
        while let Some(cmd) = self.command_rx.recv().await {
            if !self.handle_command(cmd) {
                break;
            }
        }
        self.ticker.cancel();
        debug!("session worker stopped");
    }

    /// Applies one command; returns false when the worker should stop.
    fn handle_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Move { direction, reply } => {
                let moved = self.session.move_character(direction);
                self.settle();
                let _ = reply.send(moved);
            }
            Command::ApplyKey { reply } => {
                let applied = self.session.apply_key();
                self.settle();
                let _ = reply.send(applied);
            }
            Command::Tick { reply: None } if self.ticker.is_cancelled() => {
                debug!("dropping tick queued before cancellation");
            }
            Command::Tick { reply } => {
                let report = self.session.tick_pursuers(&mut self.gate);
                self.settle();
                if let Some(reply) = reply {
                    let _ = reply.send(report);
                }
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.session.snapshot());
            }
            Command::Shutdown { reply } => {
                self.ticker.cancel();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    /// Cancels the ticker once the game has ended.
    fn settle(&mut self) {
        if self.session.outcome().is_terminal() && self.ticker.cancel() {
            info!(outcome = ?self.session.outcome(), "pursuer ticks stopped");
        }
    }
}
