//! Values resolved back to the web layer

use serde::Serialize;

use crate::domain::marker::MarkerId;
use crate::platform::location::LocationFix;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CameraPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerReply {
    pub marker_id: MarkerId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClearReply {
    pub cleared: bool,
    pub message: String,
}

impl ClearReply {
    pub fn cleared() -> Self {
        Self {
            cleared: true,
            message: "All markers cleared successfully".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VisibilityReply {
    pub visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReadyReply {
    pub ready: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LocationReply {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f32,
}

impl From<LocationFix> for LocationReply {
    fn from(fix: LocationFix) -> Self {
        Self {
            latitude: fix.position.latitude,
            longitude: fix.position.longitude,
            accuracy: fix.accuracy,
        }
    }
}
