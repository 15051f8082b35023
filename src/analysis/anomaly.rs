//! Anomaly detector for daily aggregates
//!
//! Each aggregate row becomes a feature vector
//! `[temp_mean, temp_max, vib_max, current_max, high_current_count]` and an
//! isolation forest is fitted over the whole history of one elevator. Rows
//! that are isolated unusually quickly are flagged.
//!
//! The forest is reseeded with [`DEFAULT_SEED`] on every call, so identical
//! input always produces identical flags.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::storage::{DailyAggregate, StorageBackend};

/// Expected share of anomalous rows
pub const OUTLIER_FRACTION: f64 = 0.1;

/// Seed of the forest's random generator
pub const DEFAULT_SEED: u64 = 42;

const TREE_COUNT: usize = 100;
const MAX_SAMPLES: usize = 256;
const FEATURES: usize = 5;

/// Euler-Mascheroni constant
const EULER_GAMMA: f64 = 0.577_215_664_9;

/// Note attached when there are too few rows to fit a model
pub const INSUFFICIENT_DATA_NOTE: &str = "insufficient data for anomaly detection";

type Features = [f64; FEATURES];

/// A daily aggregate annotated with its anomaly flag
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlaggedAggregate {
    #[serde(flatten)]
    pub aggregate: DailyAggregate,

    #[serde(rename = "anomalia")]
    pub anomalous: bool,
}

/// Result of one detection pass
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub rows: Vec<FlaggedAggregate>,
    /// Set when detection was skipped
    pub note: Option<String>,
}

/// Outcome of an aggregate query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AggregateReport {
    Empty {
        message: String,
    },
    Success {
        #[serde(rename = "analise")]
        rows: Vec<FlaggedAggregate>,
        #[serde(skip_serializing_if = "Option::is_none")]
        info: Option<String>,
    },
    Error {
        message: String,
    },
}

fn features(row: &DailyAggregate) -> Features {
    [
        row.temp_mean,
        row.temp_max,
        row.vib_max,
        row.current_max,
        f64::from(row.high_current_count),
    ]
    .map(|v| if v.is_finite() { v } else { 0.0 })
}

/// Flag outlier rows, keeping the input order
pub fn detect(rows: Vec<DailyAggregate>) -> Detection {
    if rows.len() < 2 {
        return Detection {
            rows: rows
                .into_iter()
                .map(|aggregate| FlaggedAggregate {
                    aggregate,
                    anomalous: false,
                })
                .collect(),
            note: Some(INSUFFICIENT_DATA_NOTE.to_string()),
        };
    }

    let matrix: Vec<Features> = rows.iter().map(features).collect();
    let mut rng = StdRng::seed_from_u64(DEFAULT_SEED);
    let forest = IsolationForest::fit(&matrix, &mut rng);

    // Higher anomaly score means more abnormal; work on the negated score
    // so that the threshold sits at the low percentile
    let normality: Vec<f64> = matrix.iter().map(|x| -forest.score(x)).collect();
    let threshold = percentile(&normality, OUTLIER_FRACTION * 100.0);

    let rows: Vec<FlaggedAggregate> = rows
        .into_iter()
        .zip(&normality)
        .map(|(aggregate, &value)| FlaggedAggregate {
            aggregate,
            anomalous: value < threshold,
        })
        .collect();

    debug!(
        "flagged {} of {} aggregate rows",
        rows.iter().filter(|r| r.anomalous).count(),
        rows.len()
    );

    Detection { rows, note: None }
}

/// Linear-interpolated percentile (`p` in 0..=100) of a non-empty slice
fn percentile(values: &[f64], p: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;

    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Average path length of an unsuccessful search in a binary tree of `n` nodes
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

#[derive(Debug)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn grow(
        data: &[Features],
        sample: &[usize],
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> Node {
        if depth >= max_depth || sample.len() <= 1 {
            return Node::Leaf { size: sample.len() };
        }

        let spans: Vec<(usize, f64, f64)> = (0..FEATURES)
            .filter_map(|feature| {
                let (lo, hi) = sample.iter().map(|&i| data[i][feature]).fold(
                    (f64::INFINITY, f64::NEG_INFINITY),
                    |(lo, hi), v| (lo.min(v), hi.max(v)),
                );
                (lo < hi).then_some((feature, lo, hi))
            })
            .collect();

        if spans.is_empty() {
            return Node::Leaf { size: sample.len() };
        }

        let (feature, lo, hi) = spans[rng.gen_range(0..spans.len())];
        let threshold = split_point(lo, hi, rng.r#gen::<f64>());

        let (left, right): (Vec<usize>, Vec<usize>) = sample
            .iter()
            .partition(|&&i| data[i][feature] <= threshold);

        Node::Split {
            feature,
            threshold,
            left: Box::new(Node::grow(data, &left, depth + 1, max_depth, rng)),
            right: Box::new(Node::grow(data, &right, depth + 1, max_depth, rng)),
        }
    }

    fn path_length(&self, x: &Features) -> f64 {
        let mut node = self;
        let mut depth = 0.0;
        loop {
            match node {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if x[*feature] <= *threshold { left } else { right };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Point at fraction `u` of `[lo, hi]`, even when `hi - lo` overflows
fn split_point(lo: f64, hi: f64, u: f64) -> f64 {
    let span = hi - lo;
    if span.is_finite() {
        lo + u * span
    } else {
        lo * (1.0 - u) + hi * u
    }
}

#[derive(Debug)]
struct IsolationForest {
    trees: Vec<Node>,
    sample_size: usize,
}

impl IsolationForest {
    fn fit(data: &[Features], rng: &mut StdRng) -> Self {
        let sample_size = data.len().min(MAX_SAMPLES);
        let max_depth = (sample_size.max(2) as f64).log2().ceil() as usize;

        let trees = (0..TREE_COUNT)
            .map(|_| {
                let sample = index::sample(rng, data.len(), sample_size).into_vec();
                Node::grow(data, &sample, 0, max_depth, rng)
            })
            .collect();

        Self { trees, sample_size }
    }

    /// Anomaly score in (0, 1]; higher is more abnormal
    fn score(&self, x: &Features) -> f64 {
        let mean_path =
            self.trees.iter().map(|t| t.path_length(x)).sum::<f64>() / self.trees.len() as f64;
        let normalizer = average_path_length(self.sample_size);
        if normalizer == 0.0 {
            return 0.5;
        }
        2f64.powf(-mean_path / normalizer)
    }
}

/// Anomaly Detector bound to a storage backend
#[derive(Clone)]
pub struct AnomalyDetector {
    backend: Arc<dyn StorageBackend>,
}

impl AnomalyDetector {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Load an elevator's aggregates (most recent first) and flag outliers
    #[instrument(skip(self))]
    pub async fn report(&self, elevator_id: &str) -> AggregateReport {
        let rows = match self.backend.query_aggregates(elevator_id).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("aggregate query failed: {}", e);
                return AggregateReport::Error {
                    message: format!("failed to load daily aggregates: {e}"),
                };
            }
        };

        if rows.is_empty() {
            return AggregateReport::Empty {
                message: format!("no daily aggregates found for elevator {elevator_id}"),
            };
        }

        let Detection { rows, note } = detect(rows);
        AggregateReport::Success { rows, info: note }
    }
}
