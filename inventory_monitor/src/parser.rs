//! Parser for loadcell report lines
//!
//! The controller prints `로드셀 <index> 무게: <grams> g` for each weight
//! change. Everything else on the link (banners, tare confirmations, line
//! noise) is ignored: parsing never fails, it only yields `None`.

use station_common::{SensorId, SensorTable};

/// Prefix of every loadcell report line
pub const SENSOR_MARKER: &str = "로드셀";

/// One weight report from the controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub sensor: SensorId,
    pub grams: f64,
}

/// Parse a report line for one of the installed sensors
///
/// Well-formed reports from a loadcell missing in `sensors` are logged and
/// dropped.
pub fn parse(line: &str, sensors: &SensorTable) -> Option<Reading> {
    let reading = parse_report(line)?;
    if !sensors.contains(reading.sensor) {
        log::warn!("Report from unconfigured {}: {}", reading.sensor, line);
        return None;
    }
    Some(reading)
}

/// Parse a report line without checking the sensor index against the installation
///
/// The index is the second space-separated word before the first colon, the
/// weight is the first word after it.
pub fn parse_report(line: &str) -> Option<Reading> {
    if !line.starts_with(SENSOR_MARKER) {
        return None;
    }

    let mut parts = line.split(':');
    let label = parts.next()?;
    let value = parts.next()?;

    let index: u8 = label.split(' ').nth(1)?.parse().ok()?;
    let grams: f64 = value.trim().split(' ').next()?.parse().ok()?;
    if !grams.is_finite() {
        return None;
    }

    Some(Reading {
        sensor: SensorId::new(index),
        grams,
    })
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
