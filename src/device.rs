//! Device Types
//!
//! A device is a monitored piece of gym equipment. Records come from the
//! REST API and the live channel in the same camelCase JSON shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Battery level reported when the sensor does not know its charge
pub const UNKNOWN_BATTERY: f64 = -1.0;

/// A monitored piece of equipment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Server-assigned id, unique across the collection
    pub id: String,
    /// Security key, only present for administrators
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// True while the machine is in use
    #[serde(default)]
    pub occupancy: bool,
    #[serde(default)]
    pub is_offline: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Occupancy history, only returned when explicitly requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<Vec<TimelineInterval>>,
}

/// Derived display state of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    Offline,
    Occupied,
    Available,
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceStatus::Offline => write!(f, "offline"),
            DeviceStatus::Occupied => write!(f, "taken"),
            DeviceStatus::Available => write!(f, "available"),
        }
    }
}

impl Device {
    /// Create a bare record with only an id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key: None,
            occupancy: false,
            is_offline: false,
            battery_level: None,
            name: None,
            location: None,
            created_at: None,
            updated_at: None,
            timeline: None,
        }
    }

    /// Builder: set the name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Builder: set the location
    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Builder: set occupancy
    pub fn occupied(mut self, occupancy: bool) -> Self {
        self.occupancy = occupancy;
        self
    }

    /// Battery charge, `None` when absent or reported as unknown
    pub fn battery_percent(&self) -> Option<f64> {
        self.battery_level.filter(|level| *level >= 0.0)
    }

    /// Offline takes precedence over occupancy
    pub fn status(&self) -> DeviceStatus {
        if self.is_offline {
            DeviceStatus::Offline
        } else if self.occupancy {
            DeviceStatus::Occupied
        } else {
            DeviceStatus::Available
        }
    }

    /// Name if set, otherwise the id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Field-wise merge of a newer record into this one.
    ///
    /// Required fields are always taken from `newer`; optional fields only
    /// when `newer` carries them.
    pub fn merge_from(&mut self, newer: &Device) {
        self.occupancy = newer.occupancy;
        self.is_offline = newer.is_offline;
        if newer.key.is_some() {
            self.key = newer.key.clone();
        }
        if newer.battery_level.is_some() {
            self.battery_level = newer.battery_level;
        }
        if newer.name.is_some() {
            self.name = newer.name.clone();
        }
        if newer.location.is_some() {
            self.location = newer.location.clone();
        }
        if newer.created_at.is_some() {
            self.created_at = newer.created_at;
        }
        if newer.updated_at.is_some() {
            self.updated_at = newer.updated_at;
        }
        if newer.timeline.is_some() {
            self.timeline = newer.timeline.clone();
        }
    }
}

/// One interval of the occupancy timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineInterval {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub occupancy: bool,
}

impl TimelineInterval {
    pub fn duration_ms(&self) -> i64 {
        (self.to - self.from).num_milliseconds()
    }
}

/// A timeline interval scaled to a share of a fixed width
#[derive(Debug, Clone, PartialEq)]
pub struct TimelineSegment {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub occupancy: bool,
    pub width: f64,
}

/// Ascending by `from`, each interval starting where the previous ended
pub fn timeline_is_well_formed(timeline: &[TimelineInterval]) -> bool {
    timeline.iter().all(|i| i.from <= i.to)
        && timeline.windows(2).all(|pair| pair[0].to == pair[1].from)
}

/// Fraction of the covered time during which the device was occupied
pub fn occupied_ratio(timeline: &[TimelineInterval]) -> Option<f64> {
    let total: i64 = timeline.iter().map(TimelineInterval::duration_ms).sum();
    if total <= 0 {
        return None;
    }
    let occupied: i64 = timeline
        .iter()
        .filter(|i| i.occupancy)
        .map(TimelineInterval::duration_ms)
        .sum();
    Some(occupied as f64 / total as f64)
}

/// Split `width` across the intervals in proportion to their durations
pub fn timeline_segments(timeline: &[TimelineInterval], width: f64) -> Vec<TimelineSegment> {
    let total: i64 = timeline.iter().map(TimelineInterval::duration_ms).sum();
    timeline
        .iter()
        .map(|i| TimelineSegment {
            from: i.from,
            to: i.to,
            occupancy: i.occupancy,
            width: if total > 0 {
                i.duration_ms() as f64 / total as f64 * width
            } else {
                0.0
            },
        })
        .collect()
}

/// Partial update sent with `PUT /iot/:id`
///
/// Only present fields are serialized and applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevicePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupancy: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_offline: Option<bool>,
}

impl DevicePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Write the present fields onto `device`
    pub fn apply(&self, device: &mut Device) {
        if let Some(name) = &self.name {
            device.name = Some(name.clone());
        }
        if let Some(location) = &self.location {
            device.location = Some(location.clone());
        }
        if let Some(key) = &self.key {
            device.key = Some(key.clone());
        }
        if let Some(level) = self.battery_level {
            device.battery_level = Some(level);
        }
        if let Some(occupancy) = self.occupancy {
            device.occupancy = occupancy;
        }
        if let Some(offline) = self.is_offline {
            device.is_offline = offline;
        }
    }

    /// Restore the fields this patch touches from `before`, leaving every
    /// other field as it currently is.
    pub fn revert(&self, device: &mut Device, before: &Device) {
        if self.name.is_some() {
            device.name = before.name.clone();
        }
        if self.location.is_some() {
            device.location = before.location.clone();
        }
        if self.key.is_some() {
            device.key = before.key.clone();
        }
        if self.battery_level.is_some() {
            device.battery_level = before.battery_level;
        }
        if self.occupancy.is_some() {
            device.occupancy = before.occupancy;
        }
        if self.is_offline.is_some() {
            device.is_offline = before.is_offline;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    fn interval(from: u32, to: u32, occupancy: bool) -> TimelineInterval {
        TimelineInterval {
            from: at(from),
            to: at(to),
            occupancy,
        }
    }

    #[test]
    fn test_deserialize_camel_case() {
        let json = r#"{
            "id": "d1",
            "occupancy": true,
            "isOffline": false,
            "batteryLevel": 87.5,
            "name": "Rower",
            "createdAt": "2024-03-01T10:00:00Z"
        }"#;
        let device: Device = serde_json::from_str(json).unwrap();
        assert_eq!(device.id, "d1");
        assert!(device.occupancy);
        assert_eq!(device.battery_percent(), Some(87.5));
        assert_eq!(device.display_name(), "Rower");
        assert_eq!(device.created_at, Some(at(10)));
        assert!(device.timeline.is_none());
    }

    #[test]
    fn test_missing_flags_default_to_false() {
        let device: Device = serde_json::from_str(r#"{"id": "d2"}"#).unwrap();
        assert!(!device.occupancy);
        assert!(!device.is_offline);
        assert_eq!(device.display_name(), "d2");
    }

    #[test]
    fn test_unknown_battery() {
        let mut device = Device::new("d1");
        assert_eq!(device.battery_percent(), None);
        device.battery_level = Some(UNKNOWN_BATTERY);
        assert_eq!(device.battery_percent(), None);
    }

    #[test]
    fn test_status_offline_wins() {
        let mut device = Device::new("d1").occupied(true);
        assert_eq!(device.status(), DeviceStatus::Occupied);
        device.is_offline = true;
        assert_eq!(device.status(), DeviceStatus::Offline);
        device.is_offline = false;
        device.occupancy = false;
        assert_eq!(device.status(), DeviceStatus::Available);
    }

    #[test]
    fn test_merge_keeps_absent_optionals() {
        let mut cached = Device::new("d1").name("Bench").location("Floor 2");
        cached.battery_level = Some(50.0);

        let pushed = Device::new("d1").occupied(true).location("Floor 3");
        cached.merge_from(&pushed);

        assert!(cached.occupancy);
        assert_eq!(cached.name.as_deref(), Some("Bench"));
        assert_eq!(cached.location.as_deref(), Some("Floor 3"));
        assert_eq!(cached.battery_level, Some(50.0));
    }

    #[test]
    fn test_patch_serializes_present_fields_only() {
        let patch = DevicePatch::new().name("B");
        let json = serde_json::to_string(&patch).unwrap();
        assert_eq!(json, r#"{"name":"B"}"#);

        let patch = DevicePatch {
            is_offline: Some(true),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&patch).unwrap(), r#"{"isOffline":true}"#);
    }

    #[test]
    fn test_patch_apply_and_revert() {
        let before = Device::new("d1").name("A").location("Hall");
        let mut device = before.clone();
        let patch = DevicePatch::new().name("B");

        patch.apply(&mut device);
        assert_eq!(device.name.as_deref(), Some("B"));
        assert_eq!(device.location.as_deref(), Some("Hall"));

        // A concurrent change to an unpatched field survives the revert
        device.occupancy = true;
        patch.revert(&mut device, &before);
        assert_eq!(device.name.as_deref(), Some("A"));
        assert!(device.occupancy);
    }

    #[test]
    fn test_patch_revert_restores_absent_field() {
        let before = Device::new("d1");
        let mut device = before.clone();
        let patch = DevicePatch::new().location("Hall");
        patch.apply(&mut device);
        patch.revert(&mut device, &before);
        assert_eq!(device, before);
    }

    #[test]
    fn test_timeline_well_formed() {
        let good = vec![interval(8, 9, false), interval(9, 11, true), interval(11, 12, false)];
        assert!(timeline_is_well_formed(&good));

        let gap = vec![interval(8, 9, false), interval(10, 11, true)];
        assert!(!timeline_is_well_formed(&gap));

        let backwards = vec![interval(9, 8, false)];
        assert!(!timeline_is_well_formed(&backwards));

        assert!(timeline_is_well_formed(&[]));
    }

    #[test]
    fn test_occupied_ratio_and_segments() {
        let timeline = vec![interval(8, 9, false), interval(9, 12, true)];
        assert_eq!(occupied_ratio(&timeline), Some(0.75));

        let segments = timeline_segments(&timeline, 400.0);
        assert_eq!(segments.len(), 2);
        assert!((segments[0].width - 100.0).abs() < 1e-9);
        assert!((segments[1].width - 300.0).abs() < 1e-9);
        assert!(segments[1].occupancy);

        assert_eq!(occupied_ratio(&[]), None);
    }
}
