//! Actor-based telemetry pipeline
//!
//! Each long-lived component runs as an independent async task and is driven
//! through a cloneable handle over Tokio channels.
//!
//! ## Architecture Overview
//!
//! ```text
//!            POST /api/v1/sensor
//!                    │
//!              ┌─────▼──────┐
//!              │ normalizer │
//!              └─────┬──────┘
//!          ┌─────────┴──────────┐
//!   ┌──────▼────────┐   ┌───────▼───────────┐
//!   │ BroadcastActor│   │ PersistenceRelay  │ (task per reading,
//!   └──────┬────────┘   └───────┬───────────┘  bounded deadline)
//!          │ bounded queue      │
//!   ┌──────▼──────┐      ┌──────▼──────┐
//!   │ subscribers │      │   storage   │◄──── SchedulerActor (daily)
//!   └─────────────┘      └─────────────┘
//! ```
//!
//! ## Actor Types
//!
//! - **BroadcastActor**: owns the subscriber set and fans out readings
//! - **PersistenceRelay**: fire-and-forget storage writes with a deadline
//! - **SchedulerActor**: rolls the previous day into daily aggregates
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: each actor has an mpsc command channel
//! 2. **Request/Response**: oneshot channels for queries
//! 3. **Tickets**: the relay returns a handle to its write task that callers
//!    may await or drop

pub mod broadcast;
pub mod messages;
pub mod persistence;
pub mod scheduler;

pub use broadcast::{BroadcastHandle, SubscriberId, Subscription};
pub use persistence::{PersistTicket, PersistenceRelay, RelayError};
pub use scheduler::{DailySchedule, SchedulerHandle};
