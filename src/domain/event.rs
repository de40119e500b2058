//! Translated events emitted to the web layer

use serde::Serialize;
use serde_json::Value;

use crate::domain::core::{BridgePoint, LatLng, NativePoint};
use crate::domain::marker::MarkerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    MarkerClick,
    MarkerDragStart,
    MarkerDrag,
    MarkerDragEnd,
    MapClick,
    BoundsChanged,
    LocationFound,
}

impl EventKind {
    /// Name under which the host runtime delivers the event to listeners
    pub fn event_name(self) -> &'static str {
        match self {
            EventKind::MarkerClick => "onMarkerClick",
            EventKind::MarkerDragStart => "onMarkerDragStart",
            EventKind::MarkerDrag => "onMarkerDrag",
            EventKind::MarkerDragEnd => "onMarkerDragEnd",
            EventKind::MapClick => "onMapClick",
            EventKind::BoundsChanged => "onBoundsChanged",
            EventKind::LocationFound => "onLocationFound",
        }
    }
}

/// Visible geographic area of the map
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibleBounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
    pub center: LatLng,
}

/// Canonical event shape delivered outward
///
/// Built once by the event translator and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoEvent {
    pub kind: EventKind,
    pub position: LatLng,
    pub native_pixel: NativePoint,
    pub bridge_pixel: BridgePoint,
    pub marker_id: Option<MarkerId>,
    pub title: Option<String>,
    pub address: Option<String>,
    pub bounds: Option<VisibleBounds>,
    pub accuracy: Option<f32>,
}

impl GeoEvent {
    pub fn new(kind: EventKind, position: LatLng, native_pixel: NativePoint, bridge_pixel: BridgePoint) -> Self {
        Self {
            kind,
            position,
            native_pixel,
            bridge_pixel,
            marker_id: None,
            title: None,
            address: None,
            bounds: None,
            accuracy: None,
        }
    }

    pub fn with_marker(mut self, marker_id: MarkerId, title: Option<String>) -> Self {
        self.marker_id = Some(marker_id);
        self.title = title;
        self
    }

    pub fn with_address(mut self, address: Option<String>) -> Self {
        self.address = address;
        self
    }

    pub fn with_bounds(mut self, bounds: VisibleBounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_accuracy(mut self, accuracy: f32) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    pub fn event_name(&self) -> &'static str {
        self.kind.event_name()
    }

    /// JSON payload in the shape web listeners consume
    pub fn to_payload(&self, map_id: &str) -> Value {
        let payload = EventPayload {
            map_id,
            latitude: self.position.latitude,
            longitude: self.position.longitude,
            marker_id: self.marker_id.as_ref(),
            title: self.title.as_deref(),
            address: self.address.as_deref(),
            screen_x: self.bridge_pixel.x,
            screen_y: self.bridge_pixel.y,
            map_x: self.native_pixel.x,
            map_y: self.native_pixel.y,
            accuracy: self.accuracy,
            bounds: self.bounds.map(BoundsPayload::from),
        };

        serde_json::to_value(payload).unwrap_or(Value::Null)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EventPayload<'a> {
    map_id: &'a str,
    latitude: f64,
    longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    marker_id: Option<&'a MarkerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<&'a str>,
    screen_x: i32,
    screen_y: i32,
    map_x: i32,
    map_y: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    accuracy: Option<f32>,
    #[serde(flatten)]
    bounds: Option<BoundsPayload>,
}

#[derive(Serialize)]
struct BoundsPayload {
    north: f64,
    south: f64,
    east: f64,
    west: f64,
    center_lat: f64,
    center_lng: f64,
}

impl From<VisibleBounds> for BoundsPayload {
    fn from(bounds: VisibleBounds) -> Self {
        Self {
            north: bounds.north,
            south: bounds.south,
            east: bounds.east,
            west: bounds.west,
            center_lat: bounds.center.latitude,
            center_lng: bounds.center.longitude,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_click_payload() {
        let event = GeoEvent::new(
            EventKind::MarkerClick,
            LatLng::new(37.0, -122.0),
            NativePoint::new(300, 500),
            BridgePoint::new(110, 187),
        )
        .with_marker(MarkerId::new("m3"), Some("Home".to_string()));

        let payload = event.to_payload("default-map");
        assert_eq!(event.event_name(), "onMarkerClick");
        assert_eq!(payload["mapId"], "default-map");
        assert_eq!(payload["markerId"], "m3");
        assert_eq!(payload["title"], "Home");
        assert_eq!(payload["screenX"], 110);
        assert_eq!(payload["mapY"], 500);
        assert!(payload.get("address").is_none());
        assert!(payload.get("north").is_none());
    }

    #[test]
    fn bounds_are_flattened() {
        let bounds = VisibleBounds {
            north: 10.0,
            south: -10.0,
            east: 20.0,
            west: -20.0,
            center: LatLng::new(0.0, 0.0),
        };
        let event = GeoEvent::new(
            EventKind::BoundsChanged,
            bounds.center,
            NativePoint::default(),
            BridgePoint::default(),
        )
        .with_bounds(bounds);

        let payload = event.to_payload("default-map");
        assert_eq!(payload["north"], 10.0);
        assert_eq!(payload["west"], -20.0);
        assert_eq!(payload["center_lat"], 0.0);
    }
}
