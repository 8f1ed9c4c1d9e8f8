//! Device snapshot model
//!
//! A [`RawSnapshot`] is the immutable result of one successful fetch. All
//! volumetric fields are expressed in the unit named by `volume_unit`.

use crate::error::{Result, SoftenerError};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest day offset a device can plausibly report, about a century
pub const MAX_DAY_OFFSET: i64 = 36_500;

/// Device operating mode at fetch time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceState {
    #[serde(alias = "ready", alias = "Ready")]
    Ready,
    #[serde(alias = "in_use", alias = "InUse")]
    InUse,
    #[serde(alias = "regenerating", alias = "Regenerating")]
    Regenerating,
    #[serde(alias = "error", alias = "Error")]
    Error,
    #[serde(other)]
    Unknown,
}

impl DeviceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::Ready => "READY",
            DeviceState::InUse => "IN_USE",
            DeviceState::Regenerating => "REGENERATING",
            DeviceState::Error => "ERROR",
            DeviceState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit governing every volumetric field of a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeUnit {
    #[serde(alias = "LITERS", alias = "Liters")]
    Liters,
    #[serde(alias = "GALLONS", alias = "Gallons")]
    Gallons,
}

/// One immutable device snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSnapshot {
    /// Operating mode
    pub state: DeviceState,

    /// Device clock, with the device's own offset
    pub device_time: DateTime<FixedOffset>,

    pub days_since_last_regeneration: u32,

    /// Negative when the salt is already overdue
    pub out_of_salt_estimated_days: i32,

    /// 0..=100, absent when unknown
    #[serde(default)]
    pub salt_level_percent: Option<u8>,

    pub volume_unit: VolumeUnit,

    /// Milli-units for liters, gallons otherwise
    pub total_water_available: f64,
    pub today_use: f64,
    pub average_daily_use: f64,

    /// Native per-minute rate
    pub current_water_flow: f64,
}

impl RawSnapshot {
    /// Reject snapshots that no device could have produced
    pub fn validate(&self) -> Result<()> {
        if let Some(level) = self.salt_level_percent {
            if level > 100 {
                return Err(SoftenerError::parsing(format!(
                    "salt_level_percent out of range: {level}"
                )));
            }
        }

        for (field, days) in [
            (
                "days_since_last_regeneration",
                i64::from(self.days_since_last_regeneration),
            ),
            (
                "out_of_salt_estimated_days",
                i64::from(self.out_of_salt_estimated_days),
            ),
        ] {
            if days.abs() > MAX_DAY_OFFSET {
                return Err(SoftenerError::parsing(format!(
                    "{field} out of range: {days}"
                )));
            }
        }

        for (field, value) in [
            ("total_water_available", self.total_water_available),
            ("today_use", self.today_use),
            ("average_daily_use", self.average_daily_use),
            ("current_water_flow", self.current_water_flow),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SoftenerError::parsing(format!(
                    "{field} must be a non-negative number, got {value}"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn wire_snapshot() -> serde_json::Value {
        serde_json::json!({
            "state": "REGENERATING",
            "device_time": "2024-06-10T08:00:00+02:00",
            "days_since_last_regeneration": 4,
            "out_of_salt_estimated_days": -3,
            "salt_level_percent": 40,
            "volume_unit": "liters",
            "total_water_available": 45000,
            "today_use": 230.5,
            "average_daily_use": 310,
            "current_water_flow": 2.5
        })
    }

    #[test]
    fn test_deserialize_wire_snapshot() {
        let snapshot: RawSnapshot = serde_json::from_value(wire_snapshot()).unwrap();

        assert_eq!(snapshot.state, DeviceState::Regenerating);
        assert_eq!(snapshot.device_time.offset().local_minus_utc(), 2 * 3600);
        assert_eq!(snapshot.out_of_salt_estimated_days, -3);
        assert_eq!(snapshot.salt_level_percent, Some(40));
        assert_eq!(snapshot.volume_unit, VolumeUnit::Liters);
        assert_eq!(snapshot.total_water_available, 45000.0);
        assert!(snapshot.validate().is_ok());
    }

    #[test]
    fn test_unrecognised_state_is_unknown() {
        let mut wire = wire_snapshot();
        wire["state"] = serde_json::json!("DESCALING");
        wire["salt_level_percent"] = serde_json::Value::Null;

        let snapshot: RawSnapshot = serde_json::from_value(wire).unwrap();
        assert_eq!(snapshot.state, DeviceState::Unknown);
        assert_eq!(snapshot.salt_level_percent, None);
        assert_eq!(snapshot.state.to_string(), "UNKNOWN");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut snapshot: RawSnapshot = serde_json::from_value(wire_snapshot()).unwrap();
        snapshot.salt_level_percent = Some(101);
        assert!(matches!(snapshot.validate(), Err(SoftenerError::Parsing(_))));

        snapshot.salt_level_percent = Some(100);
        snapshot.today_use = -1.0;
        assert!(snapshot.validate().is_err());

        snapshot.today_use = f64::NAN;
        assert!(snapshot.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_day_offsets_past_a_century() {
        let mut snapshot: RawSnapshot = serde_json::from_value(wire_snapshot()).unwrap();
        snapshot.out_of_salt_estimated_days = i32::MAX;
        assert!(matches!(snapshot.validate(), Err(SoftenerError::Parsing(_))));

        snapshot.out_of_salt_estimated_days = -36_501;
        assert!(snapshot.validate().is_err());

        snapshot.out_of_salt_estimated_days = -36_500;
        assert!(snapshot.validate().is_ok());

        snapshot.days_since_last_regeneration = u32::MAX;
        assert!(matches!(snapshot.validate(), Err(SoftenerError::Parsing(_))));
    }
}
