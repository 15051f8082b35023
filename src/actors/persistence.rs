//! PersistenceRelay - best-effort storage writes off the ingestion path
//!
//! Every reading gets its own task that races the storage append against a
//! fixed deadline. A reading that misses the deadline or hits a storage
//! error is logged and dropped: no retry, no buffering, no requeue.
//!
//! [`PersistenceRelay::persist`] returns immediately with a [`PersistTicket`].
//! Ingestion drops the ticket; tests and instrumentation may await it to
//! observe the outcome.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time;
use tracing::{Instrument, debug, error, trace, trace_span, warn};

use super::messages::RelayStats;
use crate::SensorReading;
use crate::config::RelayConfig;
use crate::storage::{StorageBackend, StorageError};

/// Why a reading was not persisted
#[derive(Debug)]
pub enum RelayError {
    /// Readings without an elevator identity cannot be keyed in storage
    MissingElevatorId,

    /// Storage did not answer before the deadline
    Timeout(Duration),

    /// Storage rejected the write
    Storage(StorageError),

    /// The write task died before reporting
    TaskPanicked(String),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::MissingElevatorId => write!(f, "reading has no elevator id"),
            RelayError::Timeout(after) => write!(f, "storage write timed out after {after:?}"),
            RelayError::Storage(e) => write!(f, "storage write failed: {e}"),
            RelayError::TaskPanicked(msg) => write!(f, "persist task failed: {msg}"),
        }
    }
}

impl std::error::Error for RelayError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelayError::Storage(e) => Some(e),
            _ => None,
        }
    }
}

/// Outcome of one [`PersistenceRelay::persist`] call
///
/// Dropping the ticket does not cancel the write.
#[derive(Debug)]
pub struct PersistTicket {
    state: TicketState,
}

#[derive(Debug)]
enum TicketState {
    Ready(Result<(), RelayError>),
    Pending(JoinHandle<Result<(), RelayError>>),
}

impl PersistTicket {
    fn ready(result: Result<(), RelayError>) -> Self {
        Self {
            state: TicketState::Ready(result),
        }
    }

    fn pending(task: JoinHandle<Result<(), RelayError>>) -> Self {
        Self {
            state: TicketState::Pending(task),
        }
    }

    /// Wait for the write to finish or fail
    pub async fn outcome(self) -> Result<(), RelayError> {
        match self.state {
            TicketState::Ready(result) => result,
            TicketState::Pending(task) => task
                .await
                .unwrap_or_else(|e| Err(RelayError::TaskPanicked(e.to_string()))),
        }
    }
}

#[derive(Debug, Default)]
struct RelayCounters {
    persisted: AtomicU64,
    dropped: AtomicU64,
    skipped: AtomicU64,
}

/// Forwards readings to storage with a bounded deadline
#[derive(Clone)]
pub struct PersistenceRelay {
    backend: Arc<dyn StorageBackend>,
    timeout: Duration,
    counters: Arc<RelayCounters>,
}

impl PersistenceRelay {
    pub fn new(backend: Arc<dyn StorageBackend>, config: &RelayConfig) -> Self {
        debug!("persistence relay deadline: {:?}", config.timeout());
        Self {
            backend,
            timeout: config.timeout(),
            counters: Arc::new(RelayCounters::default()),
        }
    }

    /// Start writing `reading` without waiting for it
    ///
    /// Must be called from within a Tokio runtime.
    pub fn persist(&self, reading: SensorReading) -> PersistTicket {
        let Some(elevator_id) = reading.elevator_id.clone() else {
            self.counters.skipped.fetch_add(1, Ordering::Relaxed);
            debug!("not persisting reading without elevator id");
            return PersistTicket::ready(Err(RelayError::MissingElevatorId));
        };

        let backend = Arc::clone(&self.backend);
        let counters = Arc::clone(&self.counters);
        let deadline = self.timeout;
        let span = trace_span!("persist", elevator_id = %elevator_id);

        let task = tokio::spawn(
            async move {
                match time::timeout(deadline, backend.append_reading(&elevator_id, &reading)).await
                {
                    Ok(Ok(())) => {
                        counters.persisted.fetch_add(1, Ordering::Relaxed);
                        trace!("reading persisted");
                        Ok(())
                    }
                    Ok(Err(e)) => {
                        counters.dropped.fetch_add(1, Ordering::Relaxed);
                        error!("failed to persist reading, dropping it: {}", e);
                        Err(RelayError::Storage(e))
                    }
                    Err(_) => {
                        counters.dropped.fetch_add(1, Ordering::Relaxed);
                        warn!("storage write exceeded {:?}, dropping reading", deadline);
                        Err(RelayError::Timeout(deadline))
                    }
                }
            }
            .instrument(span),
        );

        PersistTicket::pending(task)
    }

    pub fn stats(&self) -> RelayStats {
        RelayStats {
            persisted: self.counters.persisted.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
        }
    }
}
