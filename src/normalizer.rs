//! Reading normalizer - turns a raw sensor payload into a [`SensorReading`]
//!
//! This is the single validation boundary of the pipeline. Sensor firmware is
//! sloppy: numbers arrive as strings, fields go missing, and some boards send
//! no voltage at all. Instead of rejecting such payloads, every field falls
//! back to a documented default:
//!
//! | Field            | Wire name                  | Default                          |
//! |------------------|----------------------------|----------------------------------|
//! | current          | `ia`                       | `0.0`                            |
//! | temperature      | `temp_c`                   | `0.0`                            |
//! | vibration        | `vib_s1_ms2`               | `0.0`                            |
//! | speed            | `velocidade`               | `0.0`                            |
//! | state            | `estado`                   | `0`                              |
//! | distances        | `dist_l1` .. `dist_o2`     | `200.0`                          |
//! | voltage          | `tensao`                   | `clamp(2 * current, 0, 20)`      |
//! | timestamp        | `t`                        | ingestion instant                |
//! | height           | `altura`                   | passthrough                      |
//! | elevator id      | `id_elevador`              | absent                           |
//!
//! Downstream components trust that the output is fully typed and finite.
//!
//! Firmware also emits number literals strict JSON cannot hold (`NaN`,
//! `Infinity`, `1e400`). [`null_non_finite`] rewrites those to `null` before
//! parsing so the affected field takes its default like any other bad value.

use std::borrow::Cow;

use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::SensorReading;

/// Volts per ampere used when the sensor does not report a voltage
pub const VOLTAGE_PER_AMPERE: f64 = 2.0;

/// Upper bound of a derived voltage
pub const MAX_DERIVED_VOLTAGE: f64 = 20.0;

/// Normalize a raw payload, stamping it with the current instant if needed
pub fn normalize(raw: &Map<String, Value>) -> SensorReading {
    normalize_at(raw, Utc::now())
}

/// Normalize a raw payload received at `received_at`
///
/// Never fails: absent or mistyped fields are replaced by their defaults.
pub fn normalize_at(raw: &Map<String, Value>, received_at: DateTime<Utc>) -> SensorReading {
    let current_a = float_field(raw, "ia", 0.0);

    // Only a real JSON number counts as a measured voltage
    let voltage_v = match raw.get("tensao") {
        Some(Value::Number(n)) => n
            .as_f64()
            .filter(|v| v.is_finite())
            .unwrap_or_else(|| derive_voltage(current_a)),
        _ => derive_voltage(current_a),
    };

    SensorReading {
        timestamp: timestamp_field(raw, "t").unwrap_or_else(|| received_at.trunc_subsecs(3)),
        elevator_id: elevator_id_field(raw, "id_elevador"),
        current_a,
        temperature_c: float_field(raw, "temp_c", 0.0),
        vibration_ms2: float_field(raw, "vib_s1_ms2", 0.0),
        voltage_v,
        speed: float_field(raw, "velocidade", 0.0),
        state: int_field(raw, "estado", 0),
        distance_l1: float_field(raw, "dist_l1", SensorReading::DEFAULT_DISTANCE),
        distance_l2: float_field(raw, "dist_l2", SensorReading::DEFAULT_DISTANCE),
        distance_o1: float_field(raw, "dist_o1", SensorReading::DEFAULT_DISTANCE),
        distance_o2: float_field(raw, "dist_o2", SensorReading::DEFAULT_DISTANCE),
        height: raw.get("altura").filter(|v| !v.is_null()).cloned(),
    }
}

/// Voltage estimate for boards without a voltage sensor
pub fn derive_voltage(current_a: f64) -> f64 {
    (current_a * VOLTAGE_PER_AMPERE).clamp(0.0, MAX_DERIVED_VOLTAGE)
}

/// Replace number literals with no finite `f64` value by `null`
///
/// Only bare tokens outside string literals are touched; the text is returned
/// unchanged (and unallocated) when nothing needs rewriting.
pub fn null_non_finite(text: &str) -> Cow<'_, str> {
    let bytes = text.as_bytes();
    let mut rewritten: Option<String> = None;
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i += 1;
                while i < bytes.len() {
                    match bytes[i] {
                        b'\\' => i += 2,
                        b'"' => {
                            i += 1;
                            break;
                        }
                        _ => i += 1,
                    }
                }
            }
            b'-' | b'0'..=b'9' | b'N' | b'I' => {
                let start = i;
                while i < bytes.len() && is_number_byte(bytes[i]) {
                    i += 1;
                }

                if !is_finite_literal(&text[start..i]) {
                    let out = rewritten.get_or_insert_with(|| String::with_capacity(text.len()));
                    out.push_str(&text[copied..start]);
                    out.push_str("null");
                    copied = i;
                }
            }
            _ => i += 1,
        }
    }

    match rewritten {
        Some(mut out) => {
            out.push_str(&text[copied..]);
            Cow::Owned(out)
        }
        None => Cow::Borrowed(text),
    }
}

fn is_number_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'+' | b'.')
}

/// Garbage tokens are kept so the JSON parser still rejects them
fn is_finite_literal(token: &str) -> bool {
    match token {
        "NaN" | "Infinity" | "-Infinity" => false,
        _ => token.parse::<f64>().map_or(true, f64::is_finite),
    }
}

fn float_field(raw: &Map<String, Value>, key: &str, default: f64) -> f64 {
    let value = match raw.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    value.filter(|v| v.is_finite()).unwrap_or(default)
}

fn int_field(raw: &Map<String, Value>, key: &str, default: i64) -> i64 {
    let value = match raw.get(key) {
        Some(Value::Number(n)) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|v| v.is_finite() && v.abs() < i64::MAX as f64)
                .map(|v| v.trunc() as i64)
        }),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    };

    value.unwrap_or(default)
}

fn elevator_id_field(raw: &Map<String, Value>, key: &str) -> Option<String> {
    match raw.get(key) {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn timestamp_field(raw: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    match raw.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc).trunc_subsecs(3)),
        _ => None,
    }
}
