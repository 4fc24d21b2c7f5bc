use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::cancel::{CancelReason, CancelSignal};

/// Idle-timeout monitor for one vendor stream
///
/// A single timer is armed to the timeout and pushed back on every reset.
/// While suspended the timer cannot fire; resuming re-arms it to a full
/// timeout. When it fires the request is cancelled with
/// [`CancelReason::Timeout`].
pub struct Watchdog {
    reset: mpsc::Sender<()>,
    suspended: watch::Sender<bool>,
    stop: CancellationToken,
    task: JoinHandle<()>,
}

impl Watchdog {
    /// Start monitoring; `signal` is cancelled if the timer fires
    pub fn start(timeout: Duration, signal: CancelSignal) -> Self {
        let (reset, mut resets) = mpsc::channel::<()>(1);
        let (suspended, mut suspension) = watch::channel(false);
        let stop = CancellationToken::new();
        let stopped = stop.clone();

        let task = tokio::spawn(async move {
            let timer = tokio::time::sleep(timeout);
            tokio::pin!(timer);
            let mut paused = false;

            loop {
                tokio::select! {
                    () = &mut timer, if !paused => {
                        tracing::warn!(timeout = ?timeout, "no stream data received within idle timeout, cancelling");
                        signal.cancel(CancelReason::Timeout(timeout));
                        return;
                    }
                    () = stopped.cancelled() => return,
                    Some(()) = resets.recv() => timer.as_mut().reset(Instant::now() + timeout),
                    Ok(()) = suspension.changed() => {
                        paused = *suspension.borrow_and_update();
                        timer.as_mut().reset(Instant::now() + timeout);
                    }
                }
            }
        });

        Self {
            reset,
            suspended,
            stop,
            task,
        }
    }

    /// Push the deadline back by a full timeout
    ///
    /// Never blocks: a reset already queued covers this one.
    pub fn reset(&self) {
        let _ = self.reset.try_send(());
    }

    /// Hold the timer until [`Watchdog::resume`]
    pub fn suspend(&self) {
        self.suspended.send_replace(true);
    }

    /// Re-arm the timer to a full timeout
    pub fn resume(&self) {
        self.suspended.send_replace(false);
    }

    /// Stop the timer and wait for its task to exit
    pub async fn stop(self) {
        self.stop.cancel();
        if let Err(e) = self.task.await {
            tracing::debug!(error = %e, "watchdog task ended abnormally");
        }
    }
}
