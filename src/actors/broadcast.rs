//! BroadcastActor - fans out readings to live subscribers
//!
//! The subscriber set is owned by a single task; subscribe, unsubscribe,
//! eviction and publish are all commands on one queue, so they never race
//! and no lock is held while a subscriber is slow.
//!
//! Every subscriber gets its own bounded queue. Delivery is a non-blocking
//! enqueue: when a queue is full (the client cannot keep up) or closed (the
//! client went away) the subscriber is evicted and never tried again. The
//! ingestion path is never stalled by a subscriber.
//!
//! Readings are serialized once per publish and shared as `Arc<str>`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tracing::{debug, instrument, trace, warn};

use super::messages::{BroadcastCommand, HubStats};
use crate::SensorReading;
use crate::config::HubConfig;

/// Capacity of the actor's command queue
const COMMAND_BUFFER: usize = 1024;

/// Opaque subscriber identity, unique for the lifetime of a hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Receiving end of one subscriber
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<Arc<str>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next serialized reading, or `None` once the hub dropped this subscriber
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        self.receiver.recv().await
    }
}

struct BroadcastActor {
    subscribers: HashMap<SubscriberId, mpsc::Sender<Arc<str>>>,
    next_id: u64,
    config: HubConfig,
    stats: HubStats,
    command_rx: mpsc::Receiver<BroadcastCommand>,
}

impl BroadcastActor {
    fn new(command_rx: mpsc::Receiver<BroadcastCommand>, config: HubConfig) -> Self {
        Self {
            subscribers: HashMap::new(),
            next_id: 0,
            config,
            stats: HubStats::default(),
            command_rx,
        }
    }

    #[instrument(skip(self))]
    async fn run(mut self) {
        debug!(
            "starting broadcast actor (max {} subscribers, buffer {})",
            self.config.max_subscribers, self.config.subscriber_buffer
        );

        while let Some(cmd) = self.command_rx.recv().await {
            match cmd {
                BroadcastCommand::Subscribe { respond_to } => {
                    let _ = respond_to.send(self.subscribe());
                }
                BroadcastCommand::Unsubscribe { id } => {
                    if self.subscribers.remove(&id).is_some() {
                        debug!("subscriber {id} left ({} remaining)", self.subscribers.len());
                    }
                }
                BroadcastCommand::Publish { payload } => self.publish(payload),
                BroadcastCommand::GetStats { respond_to } => {
                    let _ = respond_to.send(HubStats {
                        subscribers: self.subscribers.len(),
                        ..self.stats.clone()
                    });
                }
                BroadcastCommand::Shutdown => {
                    debug!("shutting down, dropping {} subscribers", self.subscribers.len());
                    break;
                }
            }
        }
    }

    fn subscribe(&mut self) -> anyhow::Result<(SubscriberId, mpsc::Receiver<Arc<str>>)> {
        if self.subscribers.len() >= self.config.max_subscribers {
            warn!(
                "refusing subscriber: limit of {} reached",
                self.config.max_subscribers
            );
            anyhow::bail!(
                "subscriber limit reached ({})",
                self.config.max_subscribers
            );
        }

        let id = SubscriberId(self.next_id);
        self.next_id += 1;

        let (tx, rx) = mpsc::channel(self.config.subscriber_buffer.max(1));
        self.subscribers.insert(id, tx);

        debug!("subscriber {id} joined ({} total)", self.subscribers.len());
        Ok((id, rx))
    }

    fn publish(&mut self, payload: Arc<str>) {
        self.stats.published += 1;

        let mut failed = Vec::new();
        for (id, tx) in &self.subscribers {
            match tx.try_send(Arc::clone(&payload)) {
                Ok(()) => self.stats.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!("subscriber {id} is not keeping up, evicting");
                    failed.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("subscriber {id} disconnected, evicting");
                    failed.push(*id);
                }
            }
        }

        for id in failed {
            self.subscribers.remove(&id);
            self.stats.evicted += 1;
        }

        trace!("published to {} subscribers", self.subscribers.len());
    }
}

/// Handle for controlling the BroadcastActor
#[derive(Clone)]
pub struct BroadcastHandle {
    sender: mpsc::Sender<BroadcastCommand>,
}

impl BroadcastHandle {
    /// Spawn a new broadcast actor
    pub fn spawn(config: HubConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);

        let actor = BroadcastActor::new(cmd_rx, config);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Register a new subscriber
    ///
    /// Fails when the configured subscriber limit is reached.
    pub async fn subscribe(&self) -> anyhow::Result<Subscription> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(BroadcastCommand::Subscribe { respond_to: tx })
            .await?;

        let (id, receiver) = rx.await??;
        Ok(Subscription { id, receiver })
    }

    /// Remove a subscriber; removing an unknown or evicted one is a no-op
    pub async fn unsubscribe(&self, id: SubscriberId) {
        let _ = self.sender.send(BroadcastCommand::Unsubscribe { id }).await;
    }

    /// Serialize a reading once and queue it for every subscriber
    ///
    /// Only fails if the reading cannot be serialized or the hub is gone;
    /// per-subscriber failures are handled inside the hub.
    pub async fn publish(&self, reading: &SensorReading) -> anyhow::Result<()> {
        let payload: Arc<str> = reading.to_wire()?.into();
        self.sender
            .send(BroadcastCommand::Publish { payload })
            .await?;
        Ok(())
    }

    /// Get hub statistics
    pub async fn get_stats(&self) -> Option<HubStats> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(BroadcastCommand::GetStats { respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()
    }

    /// Shutdown the actor; all subscriptions end
    pub async fn shutdown(&self) {
        let _ = self.sender.send(BroadcastCommand::Shutdown).await;
    }
}
