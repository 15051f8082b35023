//! Daily aggregation of stored readings

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::trace;

use super::statistics::mean;
use crate::SensorReading;
use crate::storage::DailyAggregate;

/// Current (A) above which a reading counts as a high-current peak
pub const HIGH_CURRENT_THRESHOLD_A: f64 = 10.0;

/// Reduce one day of readings into one row per elevator
///
/// Elevators without readings produce no row. Readings without an elevator
/// identity cannot be attributed and are skipped. Rows come back ordered by
/// elevator id.
pub fn aggregate_day(reference_date: NaiveDate, readings: &[SensorReading]) -> Vec<DailyAggregate> {
    let mut groups: BTreeMap<&str, Vec<&SensorReading>> = BTreeMap::new();

    for reading in readings {
        match reading.elevator_id.as_deref() {
            Some(elevator_id) => groups.entry(elevator_id).or_default().push(reading),
            None => trace!("skipping reading without elevator id at {}", reading.timestamp),
        }
    }

    groups
        .into_iter()
        .map(|(elevator_id, group)| reduce(elevator_id, reference_date, &group))
        .collect()
}

fn reduce(elevator_id: &str, reference_date: NaiveDate, group: &[&SensorReading]) -> DailyAggregate {
    let mean_of = |value: fn(&SensorReading) -> f64| -> f64 {
        mean(group.iter().map(|r| value(r)))
    };
    let max = |value: fn(&SensorReading) -> f64| -> f64 {
        group
            .iter()
            .map(|r| value(r))
            .fold(f64::NEG_INFINITY, f64::max)
    };

    let high_current_count = group
        .iter()
        .filter(|r| r.current_a > HIGH_CURRENT_THRESHOLD_A)
        .count();

    DailyAggregate {
        elevator_id: elevator_id.to_string(),
        reference_date,
        temp_mean: mean_of(|r| r.temperature_c),
        temp_max: max(|r| r.temperature_c),
        vib_mean: mean_of(|r| r.vibration_ms2),
        vib_max: max(|r| r.vibration_ms2),
        current_mean: mean_of(|r| r.current_a),
        current_max: max(|r| r.current_a),
        voltage_mean: mean_of(|r| r.voltage_v),
        high_current_count: saturating_u32(high_current_count),
        total_readings: saturating_u32(group.len()),
    }
}

fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
