//! Derived readings
//!
//! Every reading is computed on demand from a [`RawSnapshot`] and a "now"
//! timestamp. The [`READINGS`] table maps each [`ReadingKey`] to its
//! computation, unit selection and presentation metadata.

use crate::models::{RawSnapshot, VolumeUnit};
use chrono::{DateTime, Duration, FixedOffset, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pattern used for the DATE_TIME reading
pub const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Names of the readings exposed per device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadingKey {
    State,
    DateTime,
    LastRegeneration,
    OutOfSaltEstimatedDay,
    SaltLevel,
    AvailableWater,
    WaterCurrentFlow,
    WaterUsageToday,
    WaterUsageDailyAverage,
}

impl ReadingKey {
    pub const ALL: [ReadingKey; 9] = [
        ReadingKey::State,
        ReadingKey::DateTime,
        ReadingKey::LastRegeneration,
        ReadingKey::OutOfSaltEstimatedDay,
        ReadingKey::SaltLevel,
        ReadingKey::AvailableWater,
        ReadingKey::WaterCurrentFlow,
        ReadingKey::WaterUsageToday,
        ReadingKey::WaterUsageDailyAverage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingKey::State => "STATE",
            ReadingKey::DateTime => "DATE_TIME",
            ReadingKey::LastRegeneration => "LAST_REGENERATION",
            ReadingKey::OutOfSaltEstimatedDay => "OUT_OF_SALT_ESTIMATED_DAY",
            ReadingKey::SaltLevel => "SALT_LEVEL",
            ReadingKey::AvailableWater => "AVAILABLE_WATER",
            ReadingKey::WaterCurrentFlow => "WATER_CURRENT_FLOW",
            ReadingKey::WaterUsageToday => "WATER_USAGE_TODAY",
            ReadingKey::WaterUsageDailyAverage => "WATER_USAGE_DAILY_AVERAGE",
        }
    }

    /// Table entry for this key
    pub fn descriptor(&self) -> &'static ReadingDescriptor {
        // READINGS is ordered like ALL
        &READINGS[*self as usize]
    }
}

impl fmt::Display for ReadingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit attached to a reading value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "%")]
    Percent,
    #[serde(rename = "m³")]
    CubicMeters,
    #[serde(rename = "gal")]
    Gallons,
    #[serde(rename = "L/min")]
    LitersPerMinute,
    #[serde(rename = "gal/min")]
    GallonsPerMinute,
}

impl Unit {
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::Percent => "%",
            Unit::CubicMeters => "m³",
            Unit::Gallons => "gal",
            Unit::LitersPerMinute => "L/min",
            Unit::GallonsPerMinute => "gal/min",
        }
    }
}

/// A computed reading value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReadingValue {
    Text(String),
    Timestamp(DateTime<FixedOffset>),
    Integer(i64),
    Float(f64),
    None,
}

impl fmt::Display for ReadingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadingValue::Text(text) => f.write_str(text),
            ReadingValue::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
            ReadingValue::Integer(value) => write!(f, "{value}"),
            ReadingValue::Float(value) => write!(f, "{value}"),
            ReadingValue::None => f.write_str("unknown"),
        }
    }
}

/// (key, value, unit) triple computed from a snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedReading {
    pub key: ReadingKey,
    pub value: ReadingValue,
    pub unit: Option<Unit>,
}

impl fmt::Display for DerivedReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.unit {
            Some(unit) => write!(f, "{}: {} {}", self.key, self.value, unit.symbol()),
            None => write!(f, "{}: {}", self.key, self.value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Timestamp,
    Water,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateClass {
    Measurement,
    Total,
    TotalIncreasing,
}

/// One row of the reading table
pub struct ReadingDescriptor {
    pub key: ReadingKey,
    pub name: &'static str,
    /// Static icon; SALT_LEVEL picks its icon from the value instead
    pub icon: Option<&'static str>,
    pub device_class: Option<DeviceClass>,
    pub state_class: Option<StateClass>,
    compute: fn(&RawSnapshot, DateTime<Utc>) -> ReadingValue,
    unit: fn(VolumeUnit) -> Option<Unit>,
}

impl ReadingDescriptor {
    pub fn compute(&self, snapshot: &RawSnapshot, now: DateTime<Utc>) -> ReadingValue {
        (self.compute)(snapshot, now)
    }

    pub fn unit(&self, volume_unit: VolumeUnit) -> Option<Unit> {
        (self.unit)(volume_unit)
    }
}

impl fmt::Debug for ReadingDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadingDescriptor")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("icon", &self.icon)
            .field("device_class", &self.device_class)
            .field("state_class", &self.state_class)
            .finish()
    }
}

/// Descriptor table, in [`ReadingKey::ALL`] order
pub static READINGS: [ReadingDescriptor; 9] = [
    ReadingDescriptor {
        key: ReadingKey::State,
        name: "State",
        icon: None,
        device_class: None,
        state_class: None,
        compute: |s, _| ReadingValue::Text(s.state.to_string()),
        unit: no_unit,
    },
    ReadingDescriptor {
        key: ReadingKey::DateTime,
        name: "Date/time",
        icon: Some("mdi:clock"),
        device_class: None,
        state_class: None,
        compute: |s, _| ReadingValue::Text(s.device_time.format(DATE_TIME_FORMAT).to_string()),
        unit: no_unit,
    },
    ReadingDescriptor {
        key: ReadingKey::LastRegeneration,
        name: "Last regeneration",
        icon: None,
        device_class: Some(DeviceClass::Timestamp),
        state_class: None,
        compute: |s, now| {
            let days = -i64::from(s.days_since_last_regeneration);
            days_from_now(s, now, days)
                .and_then(start_of_day)
                .map_or(ReadingValue::None, ReadingValue::Timestamp)
        },
        unit: no_unit,
    },
    ReadingDescriptor {
        key: ReadingKey::OutOfSaltEstimatedDay,
        name: "Out of salt estimated day",
        icon: None,
        device_class: Some(DeviceClass::Timestamp),
        state_class: None,
        compute: |s, now| {
            let days = i64::from(s.out_of_salt_estimated_days);
            days_from_now(s, now, days)
                .and_then(start_of_day)
                .map_or(ReadingValue::None, ReadingValue::Timestamp)
        },
        unit: no_unit,
    },
    ReadingDescriptor {
        key: ReadingKey::SaltLevel,
        name: "Salt level",
        icon: None,
        device_class: None,
        state_class: Some(StateClass::Measurement),
        compute: |s, _| match s.salt_level_percent {
            Some(level) => ReadingValue::Integer(i64::from(level)),
            None => ReadingValue::None,
        },
        unit: |_| Some(Unit::Percent),
    },
    ReadingDescriptor {
        key: ReadingKey::AvailableWater,
        name: "Available water",
        icon: Some("mdi:water"),
        device_class: Some(DeviceClass::Water),
        state_class: Some(StateClass::Total),
        compute: |s, _| ReadingValue::Float(volume(s, s.total_water_available)),
        unit: volume_unit,
    },
    ReadingDescriptor {
        key: ReadingKey::WaterCurrentFlow,
        name: "Water current flow",
        icon: Some("mdi:water-pump"),
        device_class: None,
        state_class: Some(StateClass::Measurement),
        compute: |s, _| ReadingValue::Float(s.current_water_flow),
        unit: flow_unit,
    },
    ReadingDescriptor {
        key: ReadingKey::WaterUsageToday,
        name: "Today water usage",
        icon: Some("mdi:water-minus"),
        device_class: Some(DeviceClass::Water),
        state_class: Some(StateClass::TotalIncreasing),
        compute: |s, _| ReadingValue::Float(volume(s, s.today_use)),
        unit: volume_unit,
    },
    ReadingDescriptor {
        key: ReadingKey::WaterUsageDailyAverage,
        name: "Water usage daily average",
        icon: None,
        device_class: Some(DeviceClass::Water),
        state_class: Some(StateClass::Measurement),
        compute: |s, _| ReadingValue::Float(volume(s, s.average_daily_use)),
        unit: volume_unit,
    },
];

fn no_unit(_: VolumeUnit) -> Option<Unit> {
    None
}

fn volume_unit(unit: VolumeUnit) -> Option<Unit> {
    Some(match unit {
        VolumeUnit::Liters => Unit::CubicMeters,
        VolumeUnit::Gallons => Unit::Gallons,
    })
}

fn flow_unit(unit: VolumeUnit) -> Option<Unit> {
    Some(match unit {
        VolumeUnit::Liters => Unit::LitersPerMinute,
        VolumeUnit::Gallons => Unit::GallonsPerMinute,
    })
}

/// Liter volumes are reported in thousandths; gallons pass through
fn volume(snapshot: &RawSnapshot, raw: f64) -> f64 {
    match snapshot.volume_unit {
        VolumeUnit::Liters => raw / 1000.0,
        VolumeUnit::Gallons => raw,
    }
}

/// "now" in the device's zone, shifted by whole days; `None` past chrono's date range
fn days_from_now(
    snapshot: &RawSnapshot,
    now: DateTime<Utc>,
    days: i64,
) -> Option<DateTime<FixedOffset>> {
    now.with_timezone(snapshot.device_time.offset())
        .checked_add_signed(Duration::try_days(days)?)
}

/// Midnight of the same local day, offset unchanged
fn start_of_day(dt: DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
    dt.checked_sub_signed(Duration::seconds(i64::from(dt.num_seconds_from_midnight())))?
        .checked_sub_signed(Duration::nanoseconds(i64::from(dt.nanosecond())))
}

/// Compute one reading
pub fn derive(key: ReadingKey, snapshot: &RawSnapshot, now: DateTime<Utc>) -> DerivedReading {
    let descriptor = key.descriptor();
    DerivedReading {
        key,
        value: descriptor.compute(snapshot, now),
        unit: descriptor.unit(snapshot.volume_unit),
    }
}

/// Compute every reading, in table order
pub fn derive_all(snapshot: &RawSnapshot, now: DateTime<Utc>) -> Vec<DerivedReading> {
    ReadingKey::ALL
        .iter()
        .map(|key| derive(*key, snapshot, now))
        .collect()
}

/// Icon for the SALT_LEVEL reading
pub fn salt_level_icon(level: Option<u8>) -> &'static str {
    match level {
        None => "mdi:signal",
        Some(level) if level > 75 => "mdi:signal-cellular-3",
        Some(level) if level > 50 => "mdi:signal-cellular-2",
        Some(level) if level > 25 => "mdi:signal-cellular-1",
        Some(level) if level > 5 => "mdi:signal-cellular-outline",
        Some(_) => "mdi:signal-off",
    }
}

/// Icon for a reading of this snapshot
pub fn icon(key: ReadingKey, snapshot: &RawSnapshot) -> Option<&'static str> {
    match key {
        ReadingKey::SaltLevel => Some(salt_level_icon(snapshot.salt_level_percent)),
        _ => key.descriptor().icon,
    }
}

/// Start of the current accumulation period of AVAILABLE_WATER
pub fn available_water_last_reset(
    snapshot: &RawSnapshot,
    now: DateTime<Utc>,
) -> Option<DateTime<FixedOffset>> {
    days_from_now(snapshot, now, -i64::from(snapshot.days_since_last_regeneration))
}

/// Stable per-device identifier of a reading
pub fn unique_id(device_serial_number: &str, key: ReadingKey) -> String {
    format!("{device_serial_number}_{key}").to_lowercase()
}
