//! Outbound telemetry events.
//!
//! The command machine emits these through the
//! [`TelemetrySink`](super::ports::TelemetrySink) port.  The web UI keys on
//! the exact field names, so the serialised shapes below are a wire
//! contract:
//!
//! ```text
//! {"z_steps":0,"vl53l1x":68,"name":"","status":"stop"}
//! {"name":"vase","status":"scan","points_count":1,"time":0.8,
//!  "is_last":false,"z_steps":0,"r":2.0,"points":[[2.0,0.0,0.0]]}
//! ```

use serde::ser::{SerializeTuple, Serializer};
use serde::Serialize;

use super::commands::ProjectName;

/// One point of the cloud, in millimetres / sensor units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Serialize for ScanPoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut t = serializer.serialize_tuple(3)?;
        t.serialize_element(&self.x)?;
        t.serialize_element(&self.y)?;
        t.serialize_element(&self.z)?;
        t.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Stop,
    Scan,
}

/// Idle-state status frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopHeartbeat {
    pub z_steps: u32,
    /// Latest raw distance; `None` goes out as 0.
    #[serde(rename = "vl53l1x", serialize_with = "distance_or_zero")]
    pub distance: Option<u32>,
    pub name: ProjectName,
    pub status: ScanStatus,
}

/// One emitted scan point plus session bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanProgress {
    pub name: ProjectName,
    pub status: ScanStatus,
    pub points_count: u64,
    /// Seconds since the first scan tick of the session.
    pub time: f64,
    pub is_last: bool,
    pub z_steps: u32,
    pub r: f64,
    pub points: heapless::Vec<ScanPoint, 1>,
}

/// Structured events emitted by the scan loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TelemetryEvent {
    Heartbeat(StopHeartbeat),
    ScanProgress(ScanProgress),
}

impl TelemetryEvent {
    pub fn heartbeat(z_steps: u32, distance: Option<u32>, name: &ProjectName) -> Self {
        Self::Heartbeat(StopHeartbeat {
            z_steps,
            distance,
            name: name.clone(),
            status: ScanStatus::Stop,
        })
    }

    /// Serialise to the JSON text the web UI consumes.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// The scan point carried by this event, if any.
    pub fn point(&self) -> Option<&ScanPoint> {
        match self {
            Self::ScanProgress(p) => p.points.first(),
            Self::Heartbeat(_) => None,
        }
    }
}

fn distance_or_zero<S: Serializer>(d: &Option<u32>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u32(d.unwrap_or(0))
}
