//! Vendor map SDK capability
//!
//! The SDK renders tiles, stores markers, animates the camera and owns the
//! projection math. The bridge drives it through these traits.

use std::sync::Arc;

use crate::domain::coords::{NativeFrame, Projection};
use crate::domain::core::{GeoBounds, LatLng};
use crate::domain::marker::MarkerId;
use crate::platform::{CapabilityError, Signal};
use crate::ui::marker_icon::MarkerBitmap;

/// Fired once when the map controller behind a view becomes available
pub type MapReadySignal = Signal<Result<(), CapabilityError>>;

/// Factory for native map views
pub trait MapSdk {
    fn create_map_view(&mut self, api_key: &str) -> Result<Box<dyn MapView>, CapabilityError>;
}

/// The native map view placed inside the compositing container
pub trait MapView {
    /// Ask for the map controller; readiness is reported through `signal`
    fn request_map(&mut self, signal: MapReadySignal);

    /// Hand over the map controller once readiness has been signalled
    fn take_map(&mut self) -> Option<Box<dyn MapHandle>>;

    /// Apply position and size in one relayout
    fn apply_frame(&mut self, frame: NativeFrame);

    fn frame(&self) -> NativeFrame;

    fn set_visible(&mut self, visible: bool);

    fn is_visible(&self) -> bool;

    fn on_pause(&mut self);

    fn on_resume(&mut self);

    fn on_destroy(&mut self);
}

#[derive(Debug, Clone)]
pub struct MarkerOptions {
    pub position: LatLng,
    pub title: Option<String>,
    pub draggable: bool,
    pub icon: Option<MarkerBitmap>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraUpdate {
    pub target: LatLng,
    pub zoom: f32,
    pub animate: bool,
}

/// Map controller available once the view reports ready
pub trait MapHandle: Projection {
    fn add_marker(&mut self, options: MarkerOptions) -> Result<MarkerId, CapabilityError>;

    fn remove_marker(&mut self, id: &MarkerId);

    fn move_camera(&mut self, update: CameraUpdate);

    /// Geographic area currently visible in the view
    fn visible_region(&self) -> GeoBounds;

    fn set_zoom_limits(&mut self, min: Option<f32>, max: Option<f32>) -> Result<(), CapabilityError>;

    /// Install the listener for taps, drags and camera moves
    fn set_event_sink(&mut self, sink: SdkEventSink);
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerEvent {
    pub id: MarkerId,
    pub position: LatLng,
    pub title: Option<String>,
}

/// Raw callback delivered by the SDK
#[derive(Debug, Clone, PartialEq)]
pub enum SdkEvent {
    MapClick { position: LatLng },
    MarkerClick(MarkerEvent),
    MarkerDragStart(MarkerEvent),
    MarkerDrag(MarkerEvent),
    MarkerDragEnd(MarkerEvent),
    CameraMove,
}

/// Listener handle the SDK invokes for every callback, from any thread
#[derive(Clone)]
pub struct SdkEventSink {
    deliver: Arc<dyn Fn(SdkEvent) + Send + Sync>,
}

impl SdkEventSink {
    pub fn new(deliver: impl Fn(SdkEvent) + Send + Sync + 'static) -> Self {
        Self { deliver: Arc::new(deliver) }
    }

    pub fn deliver(&self, event: SdkEvent) {
        (self.deliver)(event)
    }
}

impl std::fmt::Debug for SdkEventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SdkEventSink")
    }
}
