//! Background dispatcher thread.
//!
//! Runs drain cycles on a fixed interval and retention cleanup on a much
//! longer one, fully decoupled from producer transactions: a request never
//! blocks on bus availability.

use std::sync::mpsc::{channel, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::warn;

use crate::bus::MessageBus;

use super::OutboxDispatcher;

/// Counters accumulated over the lifetime of a dispatcher thread.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherStats {
    pub polls: usize,
    pub published: usize,
    pub failed: usize,
    pub skipped_cycles: usize,
    pub purged: usize,
}

/// A background thread that drains the outbox on `poll_interval` and runs
/// cleanup once per `cleanup_every`.
///
/// ## Example
///
/// ```ignore
/// let dispatcher = OutboxDispatcher::new(store, bus)
///     .with_config(DispatcherConfig::default().with_poll_interval(Duration::from_millis(50)));
/// let handle = DispatcherThread::spawn(dispatcher);
///
/// // ... producers commit transactions ...
///
/// let stats = handle.stop();
/// println!("published {} events", stats.published);
/// ```
pub struct DispatcherThread {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<DispatcherStats>>,
}

impl DispatcherThread {
    /// Spawn the thread. The dispatcher (and its bus) moves into it; share
    /// the store and bus via their cloneable handles if the caller needs
    /// to observe them.
    pub fn spawn<B>(dispatcher: OutboxDispatcher<B>) -> Self
    where
        B: MessageBus + 'static,
    {
        let (stop_tx, stop_rx) = channel();

        let handle = thread::spawn(move || {
            let mut stats = DispatcherStats::default();
            let mut last_cleanup = Instant::now();

            loop {
                match stop_rx.try_recv() {
                    Ok(()) | Err(TryRecvError::Disconnected) => break,
                    Err(TryRecvError::Empty) => {}
                }

                stats.polls += 1;

                match dispatcher.drain_batch() {
                    Ok(result) => {
                        if result.skipped {
                            stats.skipped_cycles += 1;
                        }
                        stats.published += result.published;
                        stats.failed += result.failed;
                    }
                    Err(err) => {
                        warn!(error = %err, "outbox drain cycle failed");
                    }
                }

                if last_cleanup.elapsed() >= dispatcher.config().cleanup_every {
                    match dispatcher.cleanup() {
                        Ok(purged) => stats.purged += purged,
                        Err(err) => warn!(error = %err, "outbox cleanup failed"),
                    }
                    last_cleanup = Instant::now();
                }

                thread::sleep(dispatcher.config().poll_interval);
            }

            stats
        });

        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Signal the thread to stop and wait for it to finish.
    pub fn stop(mut self) -> DispatcherStats {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap_or_default()
        } else {
            DispatcherStats::default()
        }
    }

    /// Signal the thread to stop without waiting.
    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(());
    }
}

impl Drop for DispatcherThread {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        // Don't join on drop - let the thread finish naturally
    }
}
