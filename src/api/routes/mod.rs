pub mod aggregation;
pub mod elevators;
pub mod health;
pub mod ingest;
pub mod stats;
