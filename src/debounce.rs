//! Keyed debouncing for editor input.
//!
//! Each key holds at most one pending value. Scheduling again for the same key
//! replaces the value and restarts the idle timer, so only the last value is
//! committed. Commits arrive on the channel returned by [`Debouncer::new`].

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::subtitles::CueField;

/// Debounce key for a single editor field of a single cue
pub type EditKey = (String, CueField);

struct Pending<V> {
    value: V,
    generation: u64,
    handle: JoinHandle<()>,
}

struct Inner<K, V> {
    pending: HashMap<K, Pending<V>>,
    next_generation: u64,
}

/// Delays commits until input for a key has been idle for `delay`
pub struct Debouncer<K, V> {
    delay: Duration,
    inner: Arc<Mutex<Inner<K, V>>>,
    commits: mpsc::UnboundedSender<(K, V)>,
}

impl<K, V> Debouncer<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
{
    pub fn new(delay: Duration) -> (Self, mpsc::UnboundedReceiver<(K, V)>) {
        let (commits, rx) = mpsc::unbounded_channel();
        let debouncer = Self {
            delay,
            inner: Arc::new(Mutex::new(Inner {
                pending: HashMap::new(),
                next_generation: 0,
            })),
            commits,
        };
        (debouncer, rx)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn lock(&self) -> MutexGuard<'_, Inner<K, V>> {
        lock_inner(&self.inner)
    }

    /// Schedule `value` for `key`, superseding anything pending for that key.
    /// Must be called from within a tokio runtime.
    pub fn schedule(&self, key: K, value: V) {
        let mut inner = self.lock();
        let generation = inner.next_generation;
        inner.next_generation += 1;

        let shared = Arc::clone(&self.inner);
        let commits = self.commits.clone();
        let delay = self.delay;
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let value = {
                let mut inner = lock_inner(&shared);
                match inner.pending.get(&task_key) {
                    Some(entry) if entry.generation == generation => {
                        inner.pending.remove(&task_key).map(|entry| entry.value)
                    }
                    _ => None,
                }
            };

            if let Some(value) = value {
                let _ = commits.send((task_key, value));
            }
        });

        let entry = Pending {
            value,
            generation,
            handle,
        };
        if let Some(previous) = inner.pending.insert(key, entry) {
            previous.handle.abort();
            debug!("Debounced edit superseded");
        }
    }

    /// Commit every pending value now. Returns how many were committed.
    pub fn flush(&self) -> usize {
        let drained: Vec<(K, Pending<V>)> = self.lock().pending.drain().collect();
        let count = drained.len();
        for (key, entry) in drained {
            entry.handle.abort();
            let _ = self.commits.send((key, entry.value));
        }
        if count > 0 {
            debug!("Flushed {} pending edits", count);
        }
        count
    }

    /// Drop the pending value for `key` without committing it
    pub fn cancel(&self, key: &K) -> Option<V> {
        let entry = self.lock().pending.remove(key)?;
        entry.handle.abort();
        Some(entry.value)
    }

    /// Drop every pending value without committing
    pub fn cancel_all(&self) {
        for (_, entry) in self.lock().pending.drain() {
            entry.handle.abort();
        }
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.lock().pending.contains_key(key)
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }
}

impl<K, V> Drop for Debouncer<K, V> {
    fn drop(&mut self) {
        let inner = lock_inner(&self.inner);
        for entry in inner.pending.values() {
            entry.handle.abort();
        }
    }
}

fn lock_inner<K, V>(inner: &Mutex<Inner<K, V>>) -> MutexGuard<'_, Inner<K, V>> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
