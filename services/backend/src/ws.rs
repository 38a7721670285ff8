//! WebSocket fan-out hub.
//!
//! Every subscriber owns a bounded queue and a dedicated sender task; the
//! broadcast path never writes to a socket.  A put that cannot complete
//! within the queue timeout enters backpressure handling: drop the oldest
//! queued message, retry once without blocking, and evict the subscriber
//! after enough consecutive drops.  Slow subscribers therefore cost the
//! broadcast at most one queue timeout and never stall each other.

use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::metrics::Metrics;

pub const DEFAULT_QUEUE_TIMEOUT: Duration = Duration::from_millis(250);
pub const DEFAULT_MAX_BACKPRESSURE_RETRIES: u32 = 3;

/// Per-hub tuning; queue capacity comes from `ZMETA_WS_QUEUE`.
#[derive(Debug, Clone)]
pub struct WsHubConfig {
    pub queue_capacity: usize,
    pub queue_timeout: Duration,
    pub max_backpressure_retries: u32,
}

impl WsHubConfig {
    pub fn with_capacity(queue_capacity: usize) -> Self {
        WsHubConfig {
            queue_capacity,
            queue_timeout: DEFAULT_QUEUE_TIMEOUT,
            max_backpressure_retries: DEFAULT_MAX_BACKPRESSURE_RETRIES,
        }
    }
}

// ---------------------------------------------------------------------------
// Bounded per-subscriber queue
// ---------------------------------------------------------------------------

/// FIFO with a hard capacity, a timed producer side, and a consumer-side
/// drop-oldest used by backpressure handling.
struct SubscriberQueue {
    capacity: usize,
    items: Mutex<VecDeque<String>>,
    not_empty: Notify,
    not_full: Notify,
}

impl SubscriberQueue {
    fn new(capacity: usize) -> Self {
        SubscriberQueue {
            capacity: capacity.max(1),
            items: Mutex::new(VecDeque::new()),
            not_empty: Notify::new(),
            not_full: Notify::new(),
        }
    }

    fn try_push(&self, message: &str) -> bool {
        let mut items = self.items.lock().expect("queue lock poisoned");
        if items.len() >= self.capacity {
            return false;
        }
        items.push_back(message.to_owned());
        drop(items);
        self.not_empty.notify_one();
        true
    }

    /// Push, waiting up to `timeout` for space.  False means timed out.
    async fn push_timeout(&self, message: &str, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.not_full.notified();
            if self.try_push(message) {
                return true;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return false;
            }
        }
    }

    fn drop_oldest(&self) -> bool {
        let dropped = self
            .items
            .lock()
            .expect("queue lock poisoned")
            .pop_front()
            .is_some();
        if dropped {
            self.not_full.notify_one();
        }
        dropped
    }

    async fn pop(&self) -> String {
        loop {
            let notified = self.not_empty.notified();
            if let Some(message) = self.items.lock().expect("queue lock poisoned").pop_front() {
                self.not_full.notify_one();
                return message;
            }
            notified.await;
        }
    }
}

// ---------------------------------------------------------------------------
// Hub
// ---------------------------------------------------------------------------

struct Subscriber {
    queue: SubscriberQueue,
    /// Consecutive broadcast drops; reset on every successful put.
    drops: AtomicU32,
}

struct ClientEntry {
    subscriber: Arc<Subscriber>,
    sender: JoinHandle<()>,
    closed_tx: watch::Sender<bool>,
}

pub struct WsHub {
    config: WsHubConfig,
    metrics: Arc<Metrics>,
    clients: Mutex<HashMap<u64, ClientEntry>>,
    next_id: AtomicU64,
}

impl WsHub {
    pub fn new(config: WsHubConfig, metrics: Arc<Metrics>) -> Self {
        WsHub {
            config,
            metrics,
            clients: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().expect("hub lock poisoned").len()
    }

    /// Register a subscriber around the socket's sink half and spawn its
    /// sender task.  Returns the subscriber id and a closed-flag receiver
    /// the route's receive loop should watch.
    pub fn connect<S>(self: &Arc<Self>, sink: S) -> (u64, watch::Receiver<bool>)
    where
        S: Sink<Message> + Unpin + Send + 'static,
        S::Error: std::fmt::Display,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let subscriber = Arc::new(Subscriber {
            queue: SubscriberQueue::new(self.config.queue_capacity),
            drops: AtomicU32::new(0),
        });
        let (closed_tx, closed_rx) = watch::channel(false);
        let sender = tokio::spawn(run_sender(
            Arc::clone(self),
            id,
            Arc::clone(&subscriber),
            sink,
        ));
        self.clients.lock().expect("hub lock poisoned").insert(
            id,
            ClientEntry {
                subscriber,
                sender,
                closed_tx,
            },
        );
        debug!(id, "subscriber connected");
        (id, closed_rx)
    }

    /// Remove a subscriber, cancel its sender, and signal the route loop
    /// to close the socket.  Idempotent.
    pub fn disconnect(&self, id: u64) {
        self.disconnect_inner(id, true);
    }

    fn disconnect_inner(&self, id: u64, abort_sender: bool) {
        let entry = self.clients.lock().expect("hub lock poisoned").remove(&id);
        let Some(entry) = entry else { return };
        if abort_sender {
            entry.sender.abort();
        }
        let _ = entry.closed_tx.send(true);
        debug!(id, "subscriber disconnected");
    }

    /// Queue a message for one subscriber (greeting, echo).  False when
    /// the subscriber is gone or its queue is full.
    pub fn push_to(&self, id: u64, message: &str) -> bool {
        let subscriber = {
            let clients = self.clients.lock().expect("hub lock poisoned");
            clients.get(&id).map(|entry| Arc::clone(&entry.subscriber))
        };
        subscriber.is_some_and(|subscriber| subscriber.queue.try_push(message))
    }

    /// Fan a serialized message out to every subscriber.
    ///
    /// One traversal over a membership snapshot; a slow subscriber costs
    /// at most the queue timeout and only affects itself.
    pub async fn broadcast(&self, message: &str) {
        let snapshot: Vec<(u64, Arc<Subscriber>)> = {
            let clients = self.clients.lock().expect("hub lock poisoned");
            clients
                .iter()
                .map(|(id, entry)| (*id, Arc::clone(&entry.subscriber)))
                .collect()
        };
        let mut evicted = Vec::new();
        for (id, subscriber) in snapshot {
            if subscriber
                .queue
                .push_timeout(message, self.config.queue_timeout)
                .await
            {
                subscriber.drops.store(0, Ordering::Relaxed);
                continue;
            }
            // Backpressure handling: count the drop, shed the oldest
            // message, and retry once without waiting.
            self.metrics.note_ws_dropped();
            let drops = subscriber.drops.fetch_add(1, Ordering::Relaxed) + 1;
            subscriber.queue.drop_oldest();
            if !subscriber.queue.try_push(message) {
                warn!(id, "subscriber queue unrecoverable, evicting");
                evicted.push(id);
                continue;
            }
            if drops >= self.config.max_backpressure_retries {
                info!(id, drops, "subscriber too slow, evicting");
                evicted.push(id);
            }
        }
        for id in evicted {
            self.disconnect(id);
        }
    }
}

/// Per-subscriber sender: pop from the queue, write to the socket, count.
/// A send failure tears the subscriber down without aborting ourselves.
async fn run_sender<S>(hub: Arc<WsHub>, id: u64, subscriber: Arc<Subscriber>, mut sink: S)
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: std::fmt::Display,
{
    loop {
        let message = subscriber.queue.pop().await;
        if let Err(e) = sink.send(Message::Text(message.into())).await {
            debug!(id, error = %e, "subscriber send failed");
            break;
        }
        hub.metrics.note_ws_sent();
    }
    hub.disconnect_inner(id, false);
}
