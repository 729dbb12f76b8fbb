//! Live reload fan-out
//!
//! Every connected client gets its own bounded queue. `notify` pushes into all
//! of them without waiting, so a slow client only loses its own events and
//! never holds up the watcher or the other clients.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::watch::ChangeEvent;

/// Pending events a single subscriber may hold before new ones are dropped
pub const SUBSCRIBER_BUFFER: usize = 16;

/// One broadcast notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadEvent {
    /// 1-based number of the `notify` call that produced this event
    pub seq: u64,
}

struct Subscriber {
    tx: mpsc::Sender<ReloadEvent>,
    cancel: CancellationToken,
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    seq: u64,
    entries: HashMap<u64, Subscriber>,
}

/// Broadcaster for reload notifications
#[derive(Clone, Default)]
pub struct ReloadBroadcaster {
    subscribers: Arc<Mutex<Subscribers>>,
}

impl ReloadBroadcaster {
    /// Create a broadcaster with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber and return its stream of events
    ///
    /// Registration happens immediately, so every `notify` issued after this
    /// call returns is delivered. The stream ends once `cancel` fires, and the
    /// subscriber is removed when the stream ends or is dropped.
    pub fn subscribe(
        &self,
        cancel: CancellationToken,
    ) -> impl Stream<Item = ReloadEvent> + Send + 'static {
        let (tx, mut rx) = mpsc::channel(SUBSCRIBER_BUFFER);

        let id = {
            let mut subscribers = self.subscribers.lock();
            let id = subscribers.next_id;
            subscribers.next_id += 1;
            subscribers.entries.insert(
                id,
                Subscriber {
                    tx,
                    cancel: cancel.clone(),
                },
            );
            id
        };
        tracing::debug!("Live reload client {} connected", id);

        let registration = Registration {
            subscribers: Arc::clone(&self.subscribers),
            id,
        };

        async_stream::stream! {
            let _registration = registration;
            loop {
                let event = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    event = rx.recv() => event,
                };
                match event {
                    Some(event) => yield event,
                    None => break,
                }
            }
        }
    }

    /// Send one event to every registered subscriber, returning how many accepted it
    ///
    /// Never blocks: a subscriber whose queue is full misses this event, and
    /// subscribers that are cancelled or gone are removed.
    pub fn notify(&self) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.seq += 1;
        let event = ReloadEvent {
            seq: subscribers.seq,
        };

        let mut delivered = 0;
        subscribers.entries.retain(|id, subscriber| {
            if subscriber.cancel.is_cancelled() {
                return false;
            }
            match subscriber.tx.try_send(event) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    tracing::debug!("Live reload client {} is busy, dropping event", id);
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            }
        });

        delivered
    }

    /// Number of currently registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().entries.len()
    }
}

/// Removes a subscriber from the set when its stream goes away
struct Registration {
    subscribers: Arc<Mutex<Subscribers>>,
    id: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.subscribers.lock().entries.remove(&self.id);
        tracing::debug!("Live reload client {} disconnected", self.id);
    }
}

/// Forward watcher changes to the broadcaster until the change stream ends
///
/// Without a debounce window every change produces one `notify`. With a
/// window, changes arriving less than `window` apart collapse into a single
/// `notify` sent once the burst has been quiet for `window`.
pub async fn relay<S>(changes: S, broadcaster: ReloadBroadcaster, debounce: Option<Duration>)
where
    S: Stream<Item = ChangeEvent>,
{
    tokio::pin!(changes);

    while let Some(change) = changes.next().await {
        let mut ended = false;
        let mut coalesced = 1;

        if let Some(window) = debounce {
            loop {
                match tokio::time::timeout(window, changes.next()).await {
                    Ok(Some(_)) => coalesced += 1,
                    Ok(None) => {
                        ended = true;
                        break;
                    }
                    Err(_) => break,
                }
            }
        }

        let delivered = broadcaster.notify();
        tracing::debug!(
            "Reload sent to {} clients ({:?}, {} changes)",
            delivered,
            change.kind,
            coalesced
        );

        if ended {
            break;
        }
    }

    tracing::debug!("Change stream ended, relay stopped");
}
