//! Coordinate bridge between native pixels, bridge pixels and geography
//!
//! Pure conversions only. Projection math belongs to the map SDK and is
//! consumed through the [`Projection`] trait; this module contributes the
//! density scaling and the container-offset correction around it.
//!
//! Callers must hand every conversion of one layout pass the same
//! [`Density`] sample, otherwise the surface visibly jitters.

use crate::domain::core::{BridgePoint, LatLng, NativePoint, Rect, Region};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoordError {
    #[error("Density factor must be positive and finite, got {0}")]
    InvalidDensity(f32),
}

/// Device pixels per bridge pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Density(f32);

impl Density {
    /// 1:1 scaling, used when the host cannot report a density yet
    pub const UNIT: Density = Density(1.0);

    pub fn new(factor: f32) -> Result<Self, CoordError> {
        if factor.is_finite() && factor > 0.0 {
            Ok(Self(factor))
        } else {
            Err(CoordError::InvalidDensity(factor))
        }
    }

    pub fn factor(self) -> f32 {
        self.0
    }
}

/// Screen projection capability supplied by the map SDK
///
/// Returns the position of a coordinate relative to the map view's own
/// top-left corner, in native pixels.
pub trait Projection {
    fn to_screen_location(&self, position: LatLng) -> NativePoint;
}

/// Where the map view sits inside its compositing container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeFrame {
    /// Match the parent bounds
    Fill,
    /// Explicit frame in native pixels, relative to the container
    Rect(Rect),
}

impl NativeFrame {
    /// Resolve the frame against the bounds of the parent container
    pub fn resolve(self, parent: Rect) -> Rect {
        match self {
            NativeFrame::Fill => Rect::new(0, 0, parent.w, parent.h),
            NativeFrame::Rect(rect) => rect,
        }
    }
}

fn scale_to_native(value: i32, density: Density) -> i32 {
    (value as f64 * density.factor() as f64).round() as i32
}

fn scale_to_bridge(value: i32, density: Density) -> i32 {
    (value as f64 / density.factor() as f64).round() as i32
}

/// Convert a native pixel into bridge pixel space
pub fn to_bridge_pixels(native: NativePoint, density: Density) -> BridgePoint {
    BridgePoint::new(scale_to_bridge(native.x, density), scale_to_bridge(native.y, density))
}

/// Convert a bridge pixel into native pixel space
pub fn to_native_pixels(bridge: BridgePoint, density: Density) -> NativePoint {
    NativePoint::new(scale_to_native(bridge.x, density), scale_to_native(bridge.y, density))
}

/// Scale a density-independent length (elevation, margin, size) to device pixels
pub fn dp_to_native_length(dp: f32, density: Density) -> f32 {
    (dp * density.factor()).round()
}

/// Convert a placeholder region into the frame the map view should occupy
///
/// Degenerate regions fill the parent instead of collapsing the surface.
pub fn region_to_native(region: Region, density: Density) -> NativeFrame {
    if region.is_degenerate() {
        return NativeFrame::Fill;
    }

    NativeFrame::Rect(Rect::new(
        scale_to_native(region.x, density),
        scale_to_native(region.y, density),
        scale_to_native(region.width, density),
        scale_to_native(region.height, density),
    ))
}

/// Position of a coordinate in container-space native pixels
///
/// `viewport` is the map view's resolved frame inside its container. A
/// zero-sized viewport has no meaningful projection and yields the origin.
pub fn geo_to_native_pixel<P: Projection + ?Sized>(
    position: LatLng,
    projection: &P,
    viewport: Rect,
) -> NativePoint {
    if viewport.is_empty() {
        return NativePoint::ORIGIN;
    }

    projection
        .to_screen_location(position)
        .offset(viewport.x, viewport.y)
}
