//! Statistics reporter
//!
//! Descriptive statistics over an elevator's whole reading history. The
//! report is rendered for humans: every figure is a string with two decimals
//! and its physical unit, and peak instants use `YYYY-MM-DD HH:MM:SS`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::SensorReading;
use crate::storage::StorageBackend;

const PEAK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Outcome of a statistics query
///
/// "No data" and "storage failed" are both explicit values so callers can
/// render them without inspecting errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatisticsReport {
    Empty {
        message: String,
    },
    Success(ElevatorStatistics),
    Error {
        message: String,
    },
}

/// Populated report for one elevator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElevatorStatistics {
    #[serde(rename = "id_elevador")]
    pub elevator_id: String,

    #[serde(rename = "periodo_inicio")]
    pub period_start: DateTime<Utc>,

    #[serde(rename = "periodo_fim")]
    pub period_end: DateTime<Utc>,

    #[serde(rename = "total_leituras")]
    pub total_readings: usize,

    #[serde(rename = "estatisticas")]
    pub metrics: MetricTable<FormattedSummary>,

    #[serde(rename = "picos_registrados")]
    pub peaks: MetricTable<Peak>,
}

/// One entry per reported signal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricTable<T> {
    #[serde(rename = "corrente_A")]
    pub current: T,

    #[serde(rename = "temperatura_C")]
    pub temperature: T,

    #[serde(rename = "vibracao_ms2")]
    pub vibration: T,

    #[serde(rename = "tensao_V")]
    pub voltage: T,
}

/// Raw descriptive statistics of a series
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Summary {
    pub mean: f64,
    /// Sample standard deviation (n - 1); 0 for fewer than two values
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedSummary {
    pub mean: String,
    pub std: String,
    pub min: String,
    pub max: String,
    pub median: String,
}

/// Maximum of a signal and the instant it was first reached
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Peak {
    #[serde(rename = "valor")]
    pub value: String,

    #[serde(rename = "em")]
    pub at: String,
}

#[derive(Debug, Clone, Copy)]
enum Metric {
    Current,
    Temperature,
    Vibration,
    Voltage,
}

impl Metric {
    fn unit(self) -> &'static str {
        match self {
            Metric::Current => "A",
            Metric::Temperature => "°C",
            Metric::Vibration => "m/s²",
            Metric::Voltage => "V",
        }
    }

    fn of(self, reading: &SensorReading) -> f64 {
        match self {
            Metric::Current => reading.current_a,
            Metric::Temperature => reading.temperature_c,
            Metric::Vibration => reading.vibration_ms2,
            Metric::Voltage => reading.voltage_v,
        }
    }
}

impl<T> MetricTable<T> {
    fn build(f: impl Fn(Metric) -> T) -> Self {
        Self {
            current: f(Metric::Current),
            temperature: f(Metric::Temperature),
            vibration: f(Metric::Vibration),
            voltage: f(Metric::Voltage),
        }
    }
}

/// Compute mean, sample standard deviation, min, max and median
///
/// An empty series yields an all-zero summary.
pub fn describe(values: &[f64]) -> Summary {
    if values.is_empty() {
        return Summary::default();
    }

    let n = values.len() as f64;
    let mean = mean(values.iter().copied());

    let std = if values.len() < 2 {
        0.0
    } else {
        let squared: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        let std = (squared / (n - 1.0)).sqrt();
        if std.is_finite() {
            std
        } else {
            scaled_std(values, mean)
        }
    };

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let middle = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        sorted[middle - 1] / 2.0 + sorted[middle] / 2.0
    } else {
        sorted[middle]
    };

    Summary {
        mean,
        std,
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        median,
    }
}

/// Arithmetic mean; falls back to an incremental mean when the plain sum
/// overflows, so finite input always yields a finite result
pub fn mean(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let (sum, count) = values
        .clone()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        return 0.0;
    }
    if sum.is_finite() {
        return sum / count as f64;
    }

    values.zip(1usize..).fold(0.0, |mean, (v, k)| {
        let k = k as f64;
        mean + (v / k - mean / k)
    })
}

/// Sample standard deviation computed on values divided by their largest
/// magnitude; saturates at `f64::MAX`
fn scaled_std(values: &[f64], mean: f64) -> f64 {
    let scale = values.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    if scale == 0.0 {
        return 0.0;
    }
    let squared: f64 = values
        .iter()
        .map(|v| (v / scale - mean / scale).powi(2))
        .sum();
    ((squared / (values.len() as f64 - 1.0)).sqrt() * scale).min(f64::MAX)
}

/// Format a figure as `"{value:.2} {unit}"`
pub fn format_measure(value: f64, unit: &str) -> String {
    format!("{value:.2} {unit}")
}

impl FormattedSummary {
    fn new(summary: Summary, unit: &str) -> Self {
        Self {
            mean: format_measure(summary.mean, unit),
            std: format_measure(summary.std, unit),
            min: format_measure(summary.min, unit),
            max: format_measure(summary.max, unit),
            median: format_measure(summary.median, unit),
        }
    }
}

/// Index of the first reading holding the maximum of `metric`
fn peak_index(readings: &[SensorReading], metric: Metric) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, reading) in readings.iter().enumerate() {
        let value = metric.of(reading);
        match best {
            Some((_, max)) if value <= max => {}
            _ => best = Some((index, value)),
        }
    }
    best.map(|(index, _)| index)
}

fn peak(readings: &[SensorReading], metric: Metric) -> Peak {
    match peak_index(readings, metric) {
        Some(index) => Peak {
            value: format_measure(metric.of(&readings[index]), metric.unit()),
            at: readings[index].timestamp.format(PEAK_TIME_FORMAT).to_string(),
        },
        None => Peak {
            value: format_measure(0.0, metric.unit()),
            at: String::new(),
        },
    }
}

fn metric_summary(readings: &[SensorReading], metric: Metric) -> FormattedSummary {
    let values: Vec<f64> = readings.iter().map(|r| metric.of(r)).collect();
    FormattedSummary::new(describe(&values), metric.unit())
}

/// Build the report for an elevator's history
pub fn summarize(elevator_id: &str, readings: &[SensorReading]) -> StatisticsReport {
    let timestamps = readings.iter().map(|r| r.timestamp);
    let (Some(period_start), Some(period_end)) = (timestamps.clone().min(), timestamps.max())
    else {
        return StatisticsReport::Empty {
            message: format!("no sensor readings found for elevator {elevator_id}"),
        };
    };

    StatisticsReport::Success(ElevatorStatistics {
        elevator_id: elevator_id.to_string(),
        period_start,
        period_end,
        total_readings: readings.len(),
        metrics: MetricTable::build(|metric| metric_summary(readings, metric)),
        peaks: MetricTable::build(|metric| peak(readings, metric)),
    })
}

/// Statistics Reporter bound to a storage backend
#[derive(Clone)]
pub struct StatisticsReporter {
    backend: Arc<dyn StorageBackend>,
}

impl StatisticsReporter {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Report on an elevator's full history
    ///
    /// Storage failures become [`StatisticsReport::Error`].
    #[instrument(skip(self))]
    pub async fn report(&self, elevator_id: &str) -> StatisticsReport {
        match self.backend.query_history(elevator_id).await {
            Ok(readings) => {
                debug!("summarizing {} readings", readings.len());
                summarize(elevator_id, &readings)
            }
            Err(e) => {
                warn!("statistics query failed: {}", e);
                StatisticsReport::Error {
                    message: format!("failed to load sensor history: {e}"),
                }
            }
        }
    }
}
