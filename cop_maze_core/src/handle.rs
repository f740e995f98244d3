//! Cloneable façade for driving a running session.
//!
//! [`SessionHandle`] hides the channel plumbing to the [`SessionWorker`] and
//! exposes the immutable maze directly, since walls never change after
//! construction.
use std::sync::Arc;

use rand::{SeedableRng, rngs::StdRng};
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    time::Duration,
};

use crate::{
    Direction,
    config::GameConfig,
    error::{ConfigError, Result, SessionError},
    generator::Exit,
    maze::Maze,
    scheduler::{Ticker, TickerHandle},
    session::{GameSession, SessionEvent, SessionSnapshot, TickReport},
    sound::{SoundGate, SoundLevelSource},
    worker::{Command, SessionWorker},
};

const COMMAND_CAPACITY: usize = 64;
const EVENT_CAPACITY: usize = 256;

/// Builds a session from `config` and starts its worker and ticker.
///
/// Must be called from within a tokio runtime.
pub fn spawn_session(
    config: &GameConfig,
    sound: Box<dyn SoundLevelSource>,
) -> std::result::Result<SessionHandle, ConfigError> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let session = GameSession::new(config, &mut rng)?;
    let gate = SoundGate::new(sound, config.scare_threshold);
    let period =
        (config.tick_interval_ms > 0).then(|| Duration::from_millis(config.tick_interval_ms));
    Ok(SessionHandle::spawn(session, gate, period))
}

/// Client-facing handle to interact with a session
#[derive(Clone)]
pub struct SessionHandle {
    command_tx: mpsc::Sender<Command>,
    event_tx: broadcast::Sender<SessionEvent>,
    maze: Arc<Maze>,
    exit: Exit,
}

impl SessionHandle {
    /// Starts a worker for an already built session. With `tick_period` of
    /// `None` pursuers only move on [`SessionHandle::tick`].
    pub fn spawn(mut session: GameSession, gate: SoundGate, tick_period: Option<Duration>) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let events = event_tx.clone();
        session.on_change(move |event| {
            // No subscribers is fine.
            let _ = events.send(event.clone());
        });

        let ticker = match tick_period {
            Some(period) => Ticker::every(period, &command_tx, || Command::Tick { reply: None }),
            None => TickerHandle::manual(),
        };
        let maze = Arc::clone(session.maze());
        let exit = session.exit();
        tokio::spawn(SessionWorker::new(session, gate, ticker, command_rx).run());

        Self {
            command_tx,
            event_tx,
            maze,
            exit,
        }
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(make(reply_tx))
            .await
            .map_err(|_| SessionError::CommandChannelClosed)?;
        reply_rx.await.map_err(SessionError::ReplyChannelClosed)
    }

    /// Moves the character; `Ok(false)` means the move was not possible.
    pub async fn move_character(&self, direction: Direction) -> Result<bool> {
        self.request(|reply| Command::Move { direction, reply }).await
    }

    /// Uses the key on the door; `Ok(false)` means it was not usable yet.
    pub async fn apply_key(&self) -> Result<bool> {
        self.request(|reply| Command::ApplyKey { reply }).await
    }

    /// Runs one pursuer tick immediately, outside the schedule.
    pub async fn tick(&self) -> Result<TickReport> {
        self.request(|reply| Command::Tick { reply: Some(reply) }).await
    }

    /// Query the current game state (read-only snapshot)
    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Stops the ticker and the worker. Later requests fail with
    /// [`SessionError::CommandChannelClosed`].
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    /// Subscribe to state change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// The maze walls. Shared, never modified after construction.
    pub fn maze(&self) -> Arc<Maze> {
        Arc::clone(&self.maze)
    }

    pub fn exit(&self) -> Exit {
        self.exit
    }
}
