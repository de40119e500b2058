//! Core geometry types
//!
//! This module defines the pure value types shared by every layer. Two pixel
//! spaces exist side by side: native pixels (raw device pixels owned by the
//! map surface) and bridge pixels (density-independent pixels owned by the
//! web content layer). Values only cross between the two through the
//! coordinate bridge.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Rectangle in native (device) pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    /// Creates a new rectangle
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Returns the right edge coordinate
    pub fn right(&self) -> i32 {
        self.x + self.w
    }

    /// Returns the bottom edge coordinate
    pub fn bottom(&self) -> i32 {
        self.y + self.h
    }

    /// Returns true if this rectangle contains the given point
    pub fn contains_point(&self, px: i32, py: i32) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    /// True when the rectangle covers no pixels
    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }
}

/// Placeholder region in bridge pixel coordinates
///
/// Describes where the web layer expects the native surface to sit. The
/// region is stored exactly as the web layer reported it; any scaling
/// happens when it is converted for layout.
///
/// Layout rects measured by the web layer are usually fractional; they are
/// truncated toward zero on the way in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Region {
    #[serde(deserialize_with = "truncate_dp")]
    pub x: i32,
    #[serde(deserialize_with = "truncate_dp")]
    pub y: i32,
    #[serde(deserialize_with = "truncate_dp")]
    pub width: i32,
    #[serde(deserialize_with = "truncate_dp")]
    pub height: i32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// A region with non-positive width or height cannot be tracked and
    /// makes the surface fill its parent instead.
    pub fn is_degenerate(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

/// Truncate a bridge-pixel measurement toward zero
pub fn dp_to_whole(value: f64) -> Option<i32> {
    value.is_finite().then(|| value.trunc().clamp(i32::MIN as f64, i32::MAX as f64) as i32)
}

fn truncate_dp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
    let value = f64::deserialize(deserializer)?;
    dp_to_whole(value).ok_or_else(|| D::Error::custom("bridge pixel value must be finite"))
}

/// Point in native (device) pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct NativePoint {
    pub x: i32,
    pub y: i32,
}

impl NativePoint {
    pub const ORIGIN: NativePoint = NativePoint { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Point in bridge (density-independent) pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct BridgePoint {
    pub x: i32,
    pub y: i32,
}

impl BridgePoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Geographic position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLng {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Geographic rectangle described by its corners
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub northeast: LatLng,
    pub southwest: LatLng,
}

impl GeoBounds {
    pub fn new(southwest: LatLng, northeast: LatLng) -> Self {
        Self { northeast, southwest }
    }

    /// Center of the bounds, taking the shorter way around when the bounds
    /// cross the antimeridian (west edge numerically east of the east edge).
    pub fn center(&self) -> LatLng {
        let latitude = (self.northeast.latitude + self.southwest.latitude) / 2.0;
        let west = self.southwest.longitude;
        let east = self.northeast.longitude;

        let longitude = if west <= east {
            (west + east) / 2.0
        } else {
            let mid = (west + east + 360.0) / 2.0;
            if mid > 180.0 { mid - 360.0 } else { mid }
        };

        LatLng::new(latitude, longitude)
    }
}
