//! Fixed-interval tick source for the pursuer AI.
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, Duration, MissedTickBehavior},
};
use tracing::debug;

/// Spawns periodic tasks that push a message into a worker queue.
pub struct Ticker;

impl Ticker {
    /// Enqueues `make()` on `queue` every `period`, starting one period from
    /// now. The task only holds a weak sender, so it never keeps the queue
    /// open on its own and stops once the receiving side is gone.
    ///
    /// Must be called from within a tokio runtime.
    pub fn every<M, F>(period: Duration, queue: &mpsc::Sender<M>, make: F) -> TickerHandle
    where
        M: Send + 'static,
        F: Fn() -> M + Send + 'static,
    {
        let queue = queue.downgrade();
        let task = tokio::spawn(async move {
            let mut interval = time::interval_at(time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(queue) = queue.upgrade() else {
                    break;
                };
                if queue.send(make()).await.is_err() {
                    break;
                }
            }
        });
        TickerHandle {
            task: Some(task),
            cancelled: false,
        }
    }
}

/// Cancellation handle for a [`Ticker`] task.
#[derive(Debug, Default)]
pub struct TickerHandle {
    task: Option<JoinHandle<()>>,
    cancelled: bool,
}

impl TickerHandle {
    /// A handle with no task behind it, for sessions ticked by hand.
    pub fn manual() -> Self {
        Self::default()
    }

    /// Stops the task. Returns true only for the call that actually
    /// cancelled; later calls are no-ops.
    pub fn cancel(&mut self) -> bool {
        if self.cancelled {
            return false;
        }
        self.cancelled = true;
        if let Some(task) = self.task.take() {
            task.abort();
        }
        debug!("ticker cancelled");
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
