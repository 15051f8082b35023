//! Numerical analysis over stored telemetry
//!
//! - [`aggregation`]: reduces one day of readings into [`DailyAggregate`] rows
//! - [`statistics`]: descriptive statistics over an elevator's full history
//! - [`anomaly`]: flags outlier days in an elevator's aggregate history
//!
//! The pure functions in these modules never touch storage; the reporter
//! types wrap them with a [`StorageBackend`] and turn failures into explicit
//! outcomes instead of errors.
//!
//! [`DailyAggregate`]: crate::storage::DailyAggregate
//! [`StorageBackend`]: crate::storage::StorageBackend

pub mod aggregation;
pub mod anomaly;
pub mod statistics;

pub use aggregation::{HIGH_CURRENT_THRESHOLD_A, aggregate_day};
pub use anomaly::{AggregateReport, AnomalyDetector, FlaggedAggregate};
pub use statistics::{StatisticsReport, StatisticsReporter};
