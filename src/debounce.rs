//! Trailing-edge debounced channel.
//!
//! A [`Debouncer`] buffers the latest pushed value and hands it to a single
//! consumer once no new value has arrived for the quiescence window. A value
//! whose serialized form equals the previously emitted one is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_WINDOW: Duration = Duration::from_millis(500);

struct Shared<T> {
    generation: AtomicU64,
    // tagged with the generation of the push that stored it
    latest: Mutex<Option<(u64, T)>>,
    last_emitted: Mutex<Option<String>>,
}

fn lock<V>(m: &Mutex<V>) -> MutexGuard<'_, V> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<T: Serialize> Shared<T> {
    /// Send the buffered value. With `expected` set, only a value stored by
    /// that generation is sent; a newer one stays buffered for its own timer.
    fn emit(&self, tx: &UnboundedSender<T>, expected: Option<u64>) -> bool {
        let value = {
            let mut latest = lock(&self.latest);
            match latest.take() {
                Some((generation, value)) if expected.is_none_or(|g| g == generation) => value,
                other => {
                    *latest = other;
                    return false;
                }
            }
        };
        let serialized = match serde_json::to_string(&value) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "debounced value could not be serialized, dropping it");
                return false;
            }
        };
        let mut last = lock(&self.last_emitted);
        if last.as_deref() == Some(serialized.as_str()) {
            tracing::trace!("debounced value unchanged, suppressed");
            return false;
        }
        if tx.send(value).is_err() {
            tracing::debug!("debounce consumer dropped");
            return false;
        }
        *last = Some(serialized);
        true
    }
}

pub struct Debouncer<T> {
    window: Duration,
    tx: UnboundedSender<T>,
    shared: Arc<Shared<T>>,
    pending: Option<CancellationToken>,
}

impl<T> Debouncer<T>
where
    T: Serialize + Send + 'static,
{
    pub fn new(window: Duration, tx: UnboundedSender<T>) -> Self {
        Self {
            window,
            tx,
            shared: Arc::new(Shared {
                generation: AtomicU64::new(0),
                latest: Mutex::new(None),
                last_emitted: Mutex::new(None),
            }),
            pending: None,
        }
    }

    /// Treat `value` as already delivered, so pushing it back unchanged is a no-op.
    pub fn seed(&self, value: &T) {
        if let Ok(serialized) = serde_json::to_string(value) {
            *lock(&self.shared.last_emitted) = Some(serialized);
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Replace the buffered value and restart the window.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn push(&mut self, value: T) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
        let generation = {
            let mut latest = lock(&self.shared.latest);
            let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *latest = Some((generation, value));
            generation
        };

        let token = CancellationToken::new();
        self.pending = Some(token.clone());
        let shared = Arc::clone(&self.shared);
        let tx = self.tx.clone();
        let window = self.window;

        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(window) => {}
            }
            // a newer push may have raced past the cancel
            shared.emit(&tx, Some(generation));
        });
    }

    /// Deliver the buffered value now instead of waiting out the window.
    /// Returns whether anything was sent.
    pub fn flush(&mut self) -> bool {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
        self.shared.emit(&self.tx, None)
    }

    pub fn is_pending(&self) -> bool {
        lock(&self.shared.latest).is_some()
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(token) = self.pending.take() {
            token.cancel();
        }
    }
}
