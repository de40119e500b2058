//! Event translation and outward delivery
//!
//! The SDK's raw callbacks arrive on the owning thread through the
//! subscription installed when the surface becomes ready. Each one is turned
//! into a [`GeoEvent`] carrying both native and bridge pixels and handed to
//! every subscriber in the order it was delivered.

use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, trace, warn};

use crate::domain::coords::{self, Density};
use crate::domain::core::{LatLng, NativePoint, Rect};
use crate::domain::event::{EventKind, GeoEvent, VisibleBounds};
use crate::platform::location::{Geocoder, LocationFix};
use crate::platform::map_sdk::{MapHandle, MarkerEvent, SdkEvent};

/// Fan-out of translated events to any number of subscribers
///
/// Cloning shares the subscriber list. Subscribers whose receiver was
/// dropped are pruned on the next emit.
#[derive(Clone, Default)]
pub struct EventEmitter {
    subscribers: Arc<Mutex<Vec<Sender<GeoEvent>>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<GeoEvent> {
        let (tx, rx) = unbounded();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn emit(&self, event: GeoEvent) {
        trace!(event = event.event_name(), "emitting");
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Projection state for one translation, sampled on the owning thread
pub struct TranslationContext<'a> {
    pub map: &'a dyn MapHandle,
    /// Map view frame inside the container, in native pixels
    pub viewport: Rect,
    pub density: Density,
}

impl TranslationContext<'_> {
    fn pixels(&self, position: LatLng) -> (NativePoint, crate::domain::core::BridgePoint) {
        let native = coords::geo_to_native_pixel(position, self.map, self.viewport);
        (native, coords::to_bridge_pixels(native, self.density))
    }
}

/// Converts SDK callbacks into outward events
pub struct EventTranslator {
    emitter: EventEmitter,
    geocoder: Option<Box<dyn Geocoder>>,
}

impl EventTranslator {
    pub fn new(emitter: EventEmitter, geocoder: Option<Box<dyn Geocoder>>) -> Self {
        Self { emitter, geocoder }
    }

    pub fn emitter(&self) -> &EventEmitter {
        &self.emitter
    }

    /// Translate one SDK callback
    pub fn translate(&self, event: SdkEvent, ctx: &TranslationContext<'_>) -> GeoEvent {
        match event {
            SdkEvent::MapClick { position } => {
                let (native, bridge) = ctx.pixels(position);
                GeoEvent::new(EventKind::MapClick, position, native, bridge)
            }
            SdkEvent::MarkerClick(marker) => Self::marker_event(EventKind::MarkerClick, marker, ctx),
            SdkEvent::MarkerDragStart(marker) => {
                Self::marker_event(EventKind::MarkerDragStart, marker, ctx)
            }
            SdkEvent::MarkerDrag(marker) => Self::marker_event(EventKind::MarkerDrag, marker, ctx),
            SdkEvent::MarkerDragEnd(marker) => {
                let position = marker.position;
                let address = self.reverse_geocode(position);
                Self::marker_event(EventKind::MarkerDragEnd, marker, ctx).with_address(address)
            }
            SdkEvent::CameraMove => {
                let region = ctx.map.visible_region();
                let center = region.center();
                let bounds = VisibleBounds {
                    north: region.northeast.latitude,
                    south: region.southwest.latitude,
                    east: region.northeast.longitude,
                    west: region.southwest.longitude,
                    center,
                };
                let (native, bridge) = ctx.pixels(center);
                GeoEvent::new(EventKind::BoundsChanged, center, native, bridge).with_bounds(bounds)
            }
        }
    }

    /// Translate and emit, preserving delivery order
    pub fn forward(&self, event: SdkEvent, ctx: &TranslationContext<'_>) -> GeoEvent {
        let translated = self.translate(event, ctx);
        self.emitter.emit(translated.clone());
        translated
    }

    /// Emit a location fix; pixels are only known while a map is ready
    pub fn emit_location(&self, fix: LocationFix, ctx: Option<&TranslationContext<'_>>) -> GeoEvent {
        let (native, bridge) = ctx.map(|ctx| ctx.pixels(fix.position)).unwrap_or_default();
        let event = GeoEvent::new(EventKind::LocationFound, fix.position, native, bridge)
            .with_accuracy(fix.accuracy);
        self.emitter.emit(event.clone());
        event
    }

    fn marker_event(kind: EventKind, marker: MarkerEvent, ctx: &TranslationContext<'_>) -> GeoEvent {
        let (native, bridge) = ctx.pixels(marker.position);
        GeoEvent::new(kind, marker.position, native, bridge).with_marker(marker.id, marker.title)
    }

    /// Address lookup for drag-end enrichment; failures only cost the address
    fn reverse_geocode(&self, position: LatLng) -> Option<String> {
        let geocoder = self.geocoder.as_ref()?;
        match geocoder.reverse_geocode(position) {
            Ok(address) => address,
            Err(err) => {
                warn!(%err, "reverse geocoding failed, emitting drag end without address");
                None
            }
        }
    }
}

impl std::fmt::Debug for EventTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventTranslator")
            .field("emitter", &self.emitter)
            .field("geocoder", &self.geocoder.is_some())
            .finish()
    }
}

/// Drop events that belong to a surface generation that no longer exists
pub fn is_current_generation(event_generation: u64, live_generation: Option<u64>) -> bool {
    let current = live_generation == Some(event_generation);
    if !current {
        debug!(event_generation, ?live_generation, "dropping event from a torn-down surface");
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::core::BridgePoint;
    use crate::domain::marker::MarkerId;
    use crate::platform::headless::{HeadlessGeocoder, HeadlessMap};

    fn context(map: &HeadlessMap, density: f32) -> TranslationContext<'_> {
        TranslationContext {
            map,
            viewport: Rect::new(20, 40, 600, 800),
            density: Density::new(density).unwrap(),
        }
    }

    fn marker(id: &str, position: LatLng) -> MarkerEvent {
        MarkerEvent {
            id: MarkerId::new(id),
            position,
            title: Some("Home".to_string()),
        }
    }

    #[test]
    fn emitter_fans_out_in_order() {
        let emitter = EventEmitter::new();
        let first = emitter.subscribe();
        let second = emitter.subscribe();

        let event = |kind| GeoEvent::new(kind, LatLng::default(), NativePoint::default(), BridgePoint::default());
        emitter.emit(event(EventKind::MapClick));
        emitter.emit(event(EventKind::BoundsChanged));

        for rx in [&first, &second] {
            assert_eq!(rx.try_recv().unwrap().kind, EventKind::MapClick);
            assert_eq!(rx.try_recv().unwrap().kind, EventKind::BoundsChanged);
        }
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let emitter = EventEmitter::new();
        let kept = emitter.subscribe();
        drop(emitter.subscribe());

        emitter.emit(GeoEvent::new(
            EventKind::MapClick,
            LatLng::default(),
            NativePoint::default(),
            BridgePoint::default(),
        ));
        assert_eq!(emitter.subscriber_count(), 1);
        assert!(kept.try_recv().is_ok());
    }

    #[test]
    fn marker_click_carries_both_pixel_spaces() {
        let map = HeadlessMap::centered_at(LatLng::new(37.0, -122.0), 14.0, (600, 800));
        let translator = EventTranslator::new(EventEmitter::new(), None);

        let event = translator.translate(
            SdkEvent::MarkerClick(marker("m0", LatLng::new(37.0, -122.0))),
            &context(&map, 2.0),
        );

        // Camera center projects to the middle of the view, offset by the frame origin
        assert_eq!(event.native_pixel, NativePoint::new(320, 440));
        assert_eq!(event.bridge_pixel, BridgePoint::new(160, 220));
        assert_eq!(event.marker_id, Some(MarkerId::new("m0")));
        assert_eq!(event.title.as_deref(), Some("Home"));
    }

    #[test]
    fn drag_end_enriched_with_address() {
        let map = HeadlessMap::centered_at(LatLng::new(37.0, -122.0), 14.0, (600, 800));
        let geocoder = HeadlessGeocoder::fixed("1 Infinite Loop");
        let translator = EventTranslator::new(EventEmitter::new(), Some(Box::new(geocoder)));

        let event = translator.translate(
            SdkEvent::MarkerDragEnd(marker("m0", LatLng::new(37.0, -122.0))),
            &context(&map, 1.0),
        );
        assert_eq!(event.kind, EventKind::MarkerDragEnd);
        assert_eq!(event.address.as_deref(), Some("1 Infinite Loop"));
    }

    #[test]
    fn geocoder_failure_still_emits() {
        let map = HeadlessMap::centered_at(LatLng::new(37.0, -122.0), 14.0, (600, 800));
        let translator = EventTranslator::new(
            EventEmitter::new(),
            Some(Box::new(HeadlessGeocoder::failing("service unavailable"))),
        );
        let rx = translator.emitter().subscribe();

        translator.forward(
            SdkEvent::MarkerDragEnd(marker("m0", LatLng::new(37.0, -122.0))),
            &context(&map, 1.0),
        );

        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, EventKind::MarkerDragEnd);
        assert!(event.address.is_none());
    }

    #[test]
    fn camera_move_reports_visible_bounds() {
        let map = HeadlessMap::centered_at(LatLng::new(10.0, 20.0), 10.0, (600, 800));
        let translator = EventTranslator::new(EventEmitter::new(), None);

        let event = translator.translate(SdkEvent::CameraMove, &context(&map, 1.0));
        let bounds = event.bounds.unwrap();

        assert_eq!(event.kind, EventKind::BoundsChanged);
        assert!(bounds.north > 10.0 && bounds.south < 10.0);
        assert!(bounds.east > 20.0 && bounds.west < 20.0);
        assert!((bounds.center.longitude - 20.0).abs() < 1e-6);
    }

    #[test]
    fn location_without_map_has_zero_pixels() {
        let translator = EventTranslator::new(EventEmitter::new(), None);
        let fix = LocationFix {
            position: LatLng::new(1.0, 2.0),
            accuracy: 5.0,
        };

        let event = translator.emit_location(fix, None);
        assert_eq!(event.kind, EventKind::LocationFound);
        assert_eq!(event.native_pixel, NativePoint::ORIGIN);
        assert_eq!(event.accuracy, Some(5.0));
    }

    #[test]
    fn stale_generations_rejected() {
        assert!(is_current_generation(3, Some(3)));
        assert!(!is_current_generation(2, Some(3)));
        assert!(!is_current_generation(2, None));
    }
}
