//! In-memory platform
//!
//! Implements every capability trait without a display, a network or a
//! vendor SDK. Each type is a cheap handle over shared state, so a test can
//! keep a clone for inspection and hand the other to the session.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::domain::coords::{NativeFrame, Projection};
use crate::domain::core::{GeoBounds, LatLng, NativePoint, Rect, Region};
use crate::domain::marker::MarkerId;
use crate::platform::host::{ButtonPlacement, HostViewTree, LayerId, Stacking};
use crate::platform::location::{Geocoder, LocationFix, LocationProvider, LocationSignal, PermissionState};
use crate::platform::map_sdk::{
    CameraUpdate, MapHandle, MapReadySignal, MapSdk, MapView, MarkerEvent, MarkerOptions, SdkEvent,
    SdkEventSink,
};
use crate::platform::CapabilityError;

/// Tile size of the Web Mercator world at zoom 0
const TILE_SIZE: f64 = 256.0;
const MAX_LATITUDE: f64 = 85.051_128_78;
/// Taps closer than this to a marker's anchor hit the marker
const MARKER_HIT_RADIUS: i32 = 24;

fn lock<T>(state: &Mutex<T>) -> MutexGuard<'_, T> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// --- Host view tree ---

/// A compositing layer as the headless host records it
#[derive(Debug, Clone, PartialEq)]
pub struct LayerRecord {
    pub id: LayerId,
    pub tag: String,
    pub stacking: Option<Stacking>,
    pub button: Option<ButtonPlacement>,
    pub button_visible: bool,
}

#[derive(Debug)]
struct HostState {
    density: f32,
    parent: Rect,
    placeholders: HashMap<String, Region>,
    layers: Vec<LayerRecord>,
    next_layer: u64,
    web_transparent: bool,
    mutations: usize,
    insert_failure: Option<String>,
    button_failure: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HeadlessHost {
    state: Arc<Mutex<HostState>>,
}

impl HeadlessHost {
    pub fn new(density: f32, parent: Rect) -> Self {
        Self {
            state: Arc::new(Mutex::new(HostState {
                density,
                parent,
                placeholders: HashMap::new(),
                layers: Vec::new(),
                next_layer: 1,
                web_transparent: false,
                mutations: 0,
                insert_failure: None,
                button_failure: None,
            })),
        }
    }

    /// Register a placeholder element the web layer has laid out
    pub fn with_placeholder(self, id: impl Into<String>, region: Region) -> Self {
        lock(&self.state).placeholders.insert(id.into(), region);
        self
    }

    pub fn set_density(&self, density: f32) {
        lock(&self.state).density = density;
    }

    pub fn fail_layer_insertion(&self, message: impl Into<String>) {
        lock(&self.state).insert_failure = Some(message.into());
    }

    pub fn fail_button_insertion(&self, message: impl Into<String>) {
        lock(&self.state).button_failure = Some(message.into());
    }

    pub fn layers(&self) -> Vec<LayerRecord> {
        lock(&self.state).layers.clone()
    }

    pub fn layer(&self, id: LayerId) -> Option<LayerRecord> {
        lock(&self.state).layers.iter().find(|layer| layer.id == id).cloned()
    }

    pub fn web_transparent(&self) -> bool {
        lock(&self.state).web_transparent
    }

    /// Number of changes made to the view tree so far
    pub fn mutation_count(&self) -> usize {
        lock(&self.state).mutations
    }
}

impl HostViewTree for HeadlessHost {
    fn density(&self) -> f32 {
        lock(&self.state).density
    }

    fn parent_bounds(&self) -> Rect {
        lock(&self.state).parent
    }

    fn placeholder_region(&self, placeholder_id: &str) -> Option<Region> {
        lock(&self.state).placeholders.get(placeholder_id).copied()
    }

    fn insert_layer_behind_web(&mut self, tag: &str) -> Result<LayerId, CapabilityError> {
        let mut state = lock(&self.state);
        if let Some(message) = &state.insert_failure {
            return Err(CapabilityError::new(message.clone()));
        }

        let id = LayerId(state.next_layer);
        state.next_layer += 1;
        state.mutations += 1;
        state.layers.push(LayerRecord {
            id,
            tag: tag.to_string(),
            stacking: None,
            button: None,
            button_visible: false,
        });
        Ok(id)
    }

    fn remove_layer(&mut self, layer: LayerId) -> bool {
        let mut state = lock(&self.state);
        let before = state.layers.len();
        state.layers.retain(|record| record.id != layer);
        let removed = state.layers.len() != before;
        if removed {
            state.mutations += 1;
        }
        removed
    }

    fn set_web_background_transparent(&mut self) {
        let mut state = lock(&self.state);
        state.web_transparent = true;
        state.mutations += 1;
    }

    fn set_stacking(&mut self, layer: LayerId, stacking: Stacking) {
        let mut state = lock(&self.state);
        state.mutations += 1;
        if let Some(record) = state.layers.iter_mut().find(|record| record.id == layer) {
            record.stacking = Some(stacking);
        }
    }

    fn add_location_button(
        &mut self,
        layer: LayerId,
        placement: ButtonPlacement,
    ) -> Result<(), CapabilityError> {
        let mut state = lock(&self.state);
        if let Some(message) = &state.button_failure {
            return Err(CapabilityError::new(message.clone()));
        }

        let record = state
            .layers
            .iter_mut()
            .find(|record| record.id == layer)
            .ok_or_else(|| CapabilityError::new("layer is not attached"))?;
        record.button = Some(placement);
        record.button_visible = true;
        state.mutations += 1;
        Ok(())
    }

    fn set_location_button_visible(&mut self, layer: LayerId, visible: bool) -> bool {
        let mut state = lock(&self.state);
        let Some(record) = state
            .layers
            .iter_mut()
            .find(|record| record.id == layer && record.button.is_some())
        else {
            return false;
        };
        record.button_visible = visible;
        state.mutations += 1;
        true
    }
}

// --- Map SDK ---

/// How the headless SDK reports map readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyMode {
    /// Fire the readiness signal from inside `request_map`
    Immediate,
    /// Hold readiness signals until [`HeadlessMapSdk::complete_pending`]
    Manual,
}

struct SdkState {
    mode: ReadyMode,
    ready_failure: Option<String>,
    pending: Vec<MapReadySignal>,
    views_created: usize,
    views_destroyed: usize,
    latest_map: Option<Arc<Mutex<MapState>>>,
}

#[derive(Clone)]
pub struct HeadlessMapSdk {
    state: Arc<Mutex<SdkState>>,
}

impl HeadlessMapSdk {
    pub const DEFAULT_CENTER: LatLng = LatLng { latitude: 0.0, longitude: 0.0 };
    pub const DEFAULT_ZOOM: f32 = 2.0;
    pub const DEFAULT_SIZE: (i32, i32) = (1080, 1920);

    pub fn new(mode: ReadyMode) -> Self {
        Self {
            state: Arc::new(Mutex::new(SdkState {
                mode,
                ready_failure: None,
                pending: Vec::new(),
                views_created: 0,
                views_destroyed: 0,
                latest_map: None,
            })),
        }
    }

    /// Report readiness failures with this message from now on
    pub fn fail_ready(&self, message: impl Into<String>) {
        lock(&self.state).ready_failure = Some(message.into());
    }

    /// Fire every held readiness signal; returns how many fired
    pub fn complete_pending(&self) -> usize {
        let (signals, failure) = {
            let mut state = lock(&self.state);
            (std::mem::take(&mut state.pending), state.ready_failure.clone())
        };

        let count = signals.len();
        for signal in signals {
            signal.fire(ready_result(failure.as_deref()));
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.state).pending.len()
    }

    pub fn views_created(&self) -> usize {
        lock(&self.state).views_created
    }

    pub fn views_destroyed(&self) -> usize {
        lock(&self.state).views_destroyed
    }

    /// Inspect and drive the map behind the most recently created view
    pub fn probe(&self) -> Option<HeadlessMapProbe> {
        lock(&self.state)
            .latest_map
            .clone()
            .map(|state| HeadlessMapProbe { state })
    }
}

fn ready_result(failure: Option<&str>) -> Result<(), CapabilityError> {
    match failure {
        Some(message) => Err(CapabilityError::new(message)),
        None => Ok(()),
    }
}

impl MapSdk for HeadlessMapSdk {
    fn create_map_view(&mut self, api_key: &str) -> Result<Box<dyn MapView>, CapabilityError> {
        debug!(key_len = api_key.len(), "creating headless map view");
        let map = Arc::new(Mutex::new(MapState::new(
            Self::DEFAULT_CENTER,
            Self::DEFAULT_ZOOM,
            Self::DEFAULT_SIZE,
        )));

        let mut state = lock(&self.state);
        state.views_created += 1;
        state.latest_map = Some(Arc::clone(&map));

        Ok(Box::new(HeadlessMapView {
            sdk: Some(Arc::clone(&self.state)),
            map,
            map_taken: false,
            frame: NativeFrame::Fill,
            visible: true,
            paused: false,
            relayouts: 0,
        }))
    }
}

/// Map view produced by [`HeadlessMapSdk`]
pub struct HeadlessMapView {
    sdk: Option<Arc<Mutex<SdkState>>>,
    map: Arc<Mutex<MapState>>,
    map_taken: bool,
    frame: NativeFrame,
    visible: bool,
    paused: bool,
    relayouts: usize,
}

impl HeadlessMapView {
    /// A view with no SDK behind it, for layout checks
    pub fn detached() -> Self {
        Self {
            sdk: None,
            map: Arc::new(Mutex::new(MapState::new(
                HeadlessMapSdk::DEFAULT_CENTER,
                HeadlessMapSdk::DEFAULT_ZOOM,
                HeadlessMapSdk::DEFAULT_SIZE,
            ))),
            map_taken: false,
            frame: NativeFrame::Fill,
            visible: true,
            paused: false,
            relayouts: 0,
        }
    }

    pub fn relayout_count(&self) -> usize {
        self.relayouts
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

impl MapView for HeadlessMapView {
    fn request_map(&mut self, signal: MapReadySignal) {
        let Some(sdk) = &self.sdk else {
            signal.fire(Ok(()));
            return;
        };

        let (mode, failure) = {
            let state = lock(sdk);
            (state.mode, state.ready_failure.clone())
        };
        match mode {
            ReadyMode::Immediate => signal.fire(ready_result(failure.as_deref())),
            ReadyMode::Manual => lock(sdk).pending.push(signal),
        }
    }

    fn take_map(&mut self) -> Option<Box<dyn MapHandle>> {
        if self.map_taken {
            return None;
        }
        self.map_taken = true;
        Some(Box::new(HeadlessMap {
            state: Arc::clone(&self.map),
        }))
    }

    fn apply_frame(&mut self, frame: NativeFrame) {
        if let NativeFrame::Rect(rect) = frame {
            lock(&self.map).size = (rect.w, rect.h);
        }
        self.frame = frame;
        self.relayouts += 1;
    }

    fn frame(&self) -> NativeFrame {
        self.frame
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn on_pause(&mut self) {
        self.paused = true;
    }

    fn on_resume(&mut self) {
        self.paused = false;
    }

    fn on_destroy(&mut self) {
        if let Some(sdk) = &self.sdk {
            lock(sdk).views_destroyed += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessMarker {
    pub id: MarkerId,
    pub position: LatLng,
    pub title: Option<String>,
    pub draggable: bool,
    pub has_icon: bool,
}

struct MapState {
    center: LatLng,
    zoom: f32,
    size: (i32, i32),
    markers: Vec<HeadlessMarker>,
    next_marker: u64,
    zoom_limits: (Option<f32>, Option<f32>),
    sink: Option<SdkEventSink>,
    camera_moves: Vec<CameraUpdate>,
}

impl MapState {
    fn new(center: LatLng, zoom: f32, size: (i32, i32)) -> Self {
        Self {
            center,
            zoom,
            size,
            markers: Vec::new(),
            next_marker: 0,
            zoom_limits: (None, None),
            sink: None,
            camera_moves: Vec::new(),
        }
    }

    fn world_size(&self) -> f64 {
        TILE_SIZE * 2f64.powf(self.zoom as f64)
    }

    /// Web Mercator world pixel of a coordinate at the current zoom
    fn world_pixel(&self, position: LatLng) -> (f64, f64) {
        let world = self.world_size();
        let latitude = position.latitude.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        let x = (position.longitude + 180.0) / 360.0 * world;
        let y = (1.0 - (latitude.tan() + 1.0 / latitude.cos()).ln() / PI) / 2.0 * world;
        (x, y)
    }

    fn unproject(&self, x: f64, y: f64) -> LatLng {
        let world = self.world_size();
        let longitude = x / world * 360.0 - 180.0;
        let n = PI * (1.0 - 2.0 * y / world);
        let latitude = n.sinh().atan().to_degrees();
        LatLng::new(latitude, longitude)
    }

    fn screen_point(&self, position: LatLng) -> NativePoint {
        let (cx, cy) = self.world_pixel(self.center);
        let (px, py) = self.world_pixel(position);
        let (w, h) = self.size;
        NativePoint::new(
            (px - cx + w as f64 / 2.0).round() as i32,
            (py - cy + h as f64 / 2.0).round() as i32,
        )
    }

    fn screen_to_geo(&self, point: NativePoint) -> LatLng {
        let (cx, cy) = self.world_pixel(self.center);
        let (w, h) = self.size;
        self.unproject(
            cx + point.x as f64 - w as f64 / 2.0,
            cy + point.y as f64 - h as f64 / 2.0,
        )
    }

    fn clamp_zoom(&self, zoom: f32) -> f32 {
        let (min, max) = self.zoom_limits;
        let zoom = min.map_or(zoom, |min| zoom.max(min));
        max.map_or(zoom, |max| zoom.min(max))
    }
}

/// Map controller handed out by [`HeadlessMapView::take_map`]
pub struct HeadlessMap {
    state: Arc<Mutex<MapState>>,
}

impl HeadlessMap {
    /// Standalone map with a fixed camera, for projection checks
    pub fn centered_at(center: LatLng, zoom: f32, size: (i32, i32)) -> Self {
        Self {
            state: Arc::new(Mutex::new(MapState::new(center, zoom, size))),
        }
    }
}

impl Projection for HeadlessMap {
    fn to_screen_location(&self, position: LatLng) -> NativePoint {
        lock(&self.state).screen_point(position)
    }
}

impl MapHandle for HeadlessMap {
    fn add_marker(&mut self, options: MarkerOptions) -> Result<MarkerId, CapabilityError> {
        let mut state = lock(&self.state);
        let id = MarkerId::new(format!("m{}", state.next_marker));
        state.next_marker += 1;
        state.markers.push(HeadlessMarker {
            id: id.clone(),
            position: options.position,
            title: options.title,
            draggable: options.draggable,
            has_icon: options.icon.is_some(),
        });
        Ok(id)
    }

    fn remove_marker(&mut self, id: &MarkerId) {
        lock(&self.state).markers.retain(|marker| &marker.id != id);
    }

    fn move_camera(&mut self, update: CameraUpdate) {
        let sink = {
            let mut state = lock(&self.state);
            state.center = update.target;
            state.zoom = state.clamp_zoom(update.zoom);
            state.camera_moves.push(update);
            state.sink.clone()
        };
        if let Some(sink) = sink {
            sink.deliver(SdkEvent::CameraMove);
        }
    }

    fn visible_region(&self) -> GeoBounds {
        let state = lock(&self.state);
        let (w, h) = state.size;
        let southwest = state.screen_to_geo(NativePoint::new(0, h));
        let northeast = state.screen_to_geo(NativePoint::new(w, 0));
        GeoBounds::new(southwest, northeast)
    }

    fn set_zoom_limits(&mut self, min: Option<f32>, max: Option<f32>) -> Result<(), CapabilityError> {
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(CapabilityError::new("minimum zoom exceeds maximum zoom"));
            }
        }
        let mut state = lock(&self.state);
        state.zoom_limits = (min, max);
        state.zoom = state.clamp_zoom(state.zoom);
        Ok(())
    }

    fn set_event_sink(&mut self, sink: SdkEventSink) {
        lock(&self.state).sink = Some(sink);
    }
}

/// Test-side view of a live headless map
#[derive(Clone)]
pub struct HeadlessMapProbe {
    state: Arc<Mutex<MapState>>,
}

impl HeadlessMapProbe {
    pub fn markers(&self) -> Vec<HeadlessMarker> {
        lock(&self.state).markers.clone()
    }

    pub fn camera(&self) -> (LatLng, f32) {
        let state = lock(&self.state);
        (state.center, state.zoom)
    }

    pub fn camera_moves(&self) -> Vec<CameraUpdate> {
        lock(&self.state).camera_moves.clone()
    }

    pub fn zoom_limits(&self) -> (Option<f32>, Option<f32>) {
        lock(&self.state).zoom_limits
    }

    pub fn has_event_sink(&self) -> bool {
        lock(&self.state).sink.is_some()
    }

    /// Tap the map at a coordinate, hitting a marker when one is close enough
    pub fn tap(&self, position: LatLng) -> bool {
        let (event, sink) = {
            let state = lock(&self.state);
            let point = state.screen_point(position);
            let hit = state.markers.iter().find(|marker| {
                let anchor = state.screen_point(marker.position);
                let side = MARKER_HIT_RADIUS * 2 + 1;
                Rect::new(anchor.x - MARKER_HIT_RADIUS, anchor.y - MARKER_HIT_RADIUS, side, side)
                    .contains_point(point.x, point.y)
            });
            let event = match hit {
                Some(marker) => SdkEvent::MarkerClick(MarkerEvent {
                    id: marker.id.clone(),
                    position: marker.position,
                    title: marker.title.clone(),
                }),
                None => SdkEvent::MapClick { position },
            };
            (event, state.sink.clone())
        };

        match sink {
            Some(sink) => {
                sink.deliver(event);
                true
            }
            None => false,
        }
    }

    /// Drag a draggable marker to a new position in one step
    pub fn drag(&self, id: &MarkerId, to: LatLng) -> bool {
        let (marker, sink) = {
            let mut state = lock(&self.state);
            let sink = state.sink.clone();
            let Some(marker) = state.markers.iter_mut().find(|marker| &marker.id == id && marker.draggable)
            else {
                return false;
            };
            let start = MarkerEvent {
                id: marker.id.clone(),
                position: marker.position,
                title: marker.title.clone(),
            };
            marker.position = to;
            (start, sink)
        };
        let Some(sink) = sink else {
            return false;
        };

        let moved = MarkerEvent { position: to, ..marker.clone() };
        sink.deliver(SdkEvent::MarkerDragStart(marker));
        sink.deliver(SdkEvent::MarkerDrag(moved.clone()));
        sink.deliver(SdkEvent::MarkerDragEnd(moved));
        true
    }

    /// Pan the camera as a user gesture would
    pub fn pan(&self, to: LatLng) {
        let sink = {
            let mut state = lock(&self.state);
            state.center = to;
            state.sink.clone()
        };
        if let Some(sink) = sink {
            sink.deliver(SdkEvent::CameraMove);
        }
    }
}

// --- Location and geocoding ---

#[derive(Debug)]
struct LocationState {
    granted: bool,
    grant_on_request: bool,
    fix: Option<LocationFix>,
    failure: Option<String>,
    permission_requests: usize,
}

#[derive(Debug, Clone)]
pub struct HeadlessLocation {
    state: Arc<Mutex<LocationState>>,
}

impl HeadlessLocation {
    fn with_state(granted: bool, grant_on_request: bool, fix: Option<LocationFix>, failure: Option<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(LocationState {
                granted,
                grant_on_request,
                fix,
                failure,
                permission_requests: 0,
            })),
        }
    }

    /// Permission granted, reporting the given fix
    pub fn with_fix(fix: LocationFix) -> Self {
        Self::with_state(true, true, Some(fix), None)
    }

    /// Permission granted, but no fix is known
    pub fn unavailable() -> Self {
        Self::with_state(true, true, None, None)
    }

    /// Permission missing and the user declines the prompt
    pub fn denied() -> Self {
        Self::with_state(false, false, None, None)
    }

    /// Permission missing until the prompt is accepted
    pub fn prompting(fix: LocationFix) -> Self {
        Self::with_state(false, true, Some(fix), None)
    }

    /// Permission granted, but the provider errors
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_state(true, true, None, Some(message.into()))
    }

    pub fn permission_requests(&self) -> usize {
        lock(&self.state).permission_requests
    }
}

impl LocationProvider for HeadlessLocation {
    fn has_permission(&self) -> bool {
        lock(&self.state).granted
    }

    fn request_location_permission(&mut self) -> PermissionState {
        let mut state = lock(&self.state);
        state.permission_requests += 1;
        if state.grant_on_request {
            state.granted = true;
        }
        if state.granted {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        }
    }

    fn last_location(&mut self, signal: LocationSignal) {
        let result = {
            let state = lock(&self.state);
            match &state.failure {
                Some(message) => Err(CapabilityError::new(message.clone())),
                None => Ok(state.fix),
            }
        };
        signal.fire(result);
    }
}

#[derive(Debug, Clone)]
pub enum HeadlessGeocoder {
    Fixed(String),
    Empty,
    Failing(String),
}

impl HeadlessGeocoder {
    pub fn fixed(address: impl Into<String>) -> Self {
        Self::Fixed(address.into())
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::Failing(message.into())
    }
}

impl Geocoder for HeadlessGeocoder {
    fn reverse_geocode(&self, _position: LatLng) -> Result<Option<String>, CapabilityError> {
        match self {
            Self::Fixed(address) => Ok(Some(address.clone())),
            Self::Empty => Ok(None),
            Self::Failing(message) => Err(CapabilityError::new(message.clone())),
        }
    }
}
