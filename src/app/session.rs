//! The single owned map session
//!
//! `MapSession` holds every piece of mutable bridge state and lives on the
//! owner thread. Inbound calls arrive as closures marshaled onto that thread;
//! capability callbacks (map readiness, SDK events, location fixes) are
//! posted back the same way, so no state is ever shared across threads.

use tracing::{debug, info, warn};

use crate::app::error::{ConfigError, PluginError, StateError};
use crate::app::events::{self, EventEmitter, EventTranslator, TranslationContext};
use crate::app::reply::{CameraPosition, ClearReply, LocationReply, MarkerReply, ReadyReply, VisibilityReply};
use crate::app::state::{InteractionArbiter, InteractionEvent, InteractionMode};
use crate::config::options::{
    AddCustomMarkerOptions, AddMarkerOptions, ButtonMargins, InitializeOptions, MapBoundsOptions,
    MoveCameraOptions, MoveToPositionOptions, ZoomLimitsOptions,
};
use crate::config::PluginConfig;
use crate::domain::coords::{self, Density};
use crate::domain::core::{NativePoint, Region};
use crate::domain::marker::{MarkerRecord, MarkerTable};
use crate::input::owner_thread::{Marshal, Resolver};
use crate::platform::host::{ButtonPlacement, HostViewTree};
use crate::platform::location::{
    Geocoder, LocationFix, LocationProvider, LocationSignal, PermissionState,
};
use crate::platform::map_sdk::{CameraUpdate, MapReadySignal, MapSdk, MarkerOptions, SdkEvent, SdkEventSink};
use crate::platform::CapabilityError;
use crate::ui::layout::LayoutSynchronizer;
use crate::ui::marker_icon::{MarkerBitmap, MarkerIconError, MarkerIconSpec, MarkerIconSynthesizer};
use crate::ui::surface::{CreateOutcome, ReadyOutcome, SurfaceConfig, SurfaceManager, SurfaceState};

/// Only data URLs are decoded as images; anything else draws the palette pin
const DATA_IMAGE_PREFIX: &str = "data:image";

/// Capabilities the host supplies, built on the owner thread
pub struct Platform {
    pub host: Box<dyn HostViewTree>,
    pub sdk: Box<dyn MapSdk>,
    pub location: Box<dyn LocationProvider>,
    pub geocoder: Option<Box<dyn Geocoder>>,
}

pub struct MapSession {
    config: PluginConfig,
    host: Box<dyn HostViewTree>,
    sdk: Box<dyn MapSdk>,
    location: Box<dyn LocationProvider>,
    surface: SurfaceManager,
    layout: LayoutSynchronizer,
    mode: InteractionMode,
    markers: MarkerTable,
    icons: MarkerIconSynthesizer,
    translator: EventTranslator,
    /// Location button requested by the initialize call, attached at ready
    button_request: Option<ButtonMargins>,
    pending_init: Vec<Resolver<()>>,
    pending_location: Vec<Resolver<LocationReply>>,
    marshal: Marshal<MapSession>,
}

impl MapSession {
    pub fn new(
        config: PluginConfig,
        platform: Platform,
        emitter: EventEmitter,
        marshal: Marshal<MapSession>,
    ) -> Self {
        let icons = match config.load_icon_font().map(MarkerIconSynthesizer::with_font_bytes) {
            Some(Ok(icons)) => icons,
            Some(Err(err)) => {
                warn!(%err, "icon font rejected, palette markers will have no glyph");
                MarkerIconSynthesizer::new()
            }
            None => MarkerIconSynthesizer::new(),
        }
        .with_image_scale(config.marker_image_scale);

        Self {
            surface: SurfaceManager::new(config.map_id.clone()),
            config,
            host: platform.host,
            sdk: platform.sdk,
            location: platform.location,
            layout: LayoutSynchronizer::new(),
            mode: InteractionMode::default(),
            markers: MarkerTable::new(),
            icons,
            translator: EventTranslator::new(emitter, platform.geocoder),
            button_request: None,
            pending_init: Vec::new(),
            pending_location: Vec::new(),
            marshal,
        }
    }

    pub fn config(&self) -> &PluginConfig {
        &self.config
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    // --- Surface lifecycle ---

    pub fn initialize(&mut self, options: InitializeOptions, resolver: Resolver<()>) {
        let placeholder_id = options
            .container_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| self.config.default_container_id.clone());
        let initial_region = options
            .initial_bounds
            .or_else(|| self.host.placeholder_region(&placeholder_id));
        let surface_config = SurfaceConfig {
            api_key: options.api_key,
            placeholder_id,
            initial_region,
        };

        let marshal = self.marshal.clone();
        let outcome = self.surface.create_surface(
            &surface_config,
            self.host.as_mut(),
            self.sdk.as_mut(),
            move |generation| {
                MapReadySignal::new(move |result| {
                    let posted = marshal.post(move |session| session.on_map_ready(generation, result));
                    if posted.is_err() {
                        debug!(generation, "map became ready after the session stopped");
                    }
                })
            },
        );

        match outcome {
            Ok(CreateOutcome::Started { generation }) => {
                info!(generation, placeholder = %surface_config.placeholder_id, "initializing map");
                self.button_request = options
                    .show_location_button
                    .then(|| options.location_button_position.unwrap_or_default());
                // Readiness is delivered through the owner queue, so this always queues
                if let (Some(region), Some(handle)) = (surface_config.initial_region, self.surface.handle_mut()) {
                    let density = handle.revalidate_density(self.host.as_ref());
                    self.layout.apply_region(region, density, None);
                }
                self.pending_init.push(resolver);
            }
            Ok(CreateOutcome::Existing(SurfaceState::Ready)) => resolver.resolve(()),
            Ok(CreateOutcome::Existing(_)) => {
                debug!("initialize joined the pending creation");
                self.pending_init.push(resolver);
            }
            Err(err) => {
                warn!(%err, "map initialization rejected");
                resolver.reject(err);
            }
        }
    }

    fn on_map_ready(&mut self, generation: u64, result: Result<(), CapabilityError>) {
        match self.surface.complete_creation(generation, result, self.host.as_mut()) {
            Ok(ReadyOutcome::Stale) => {}
            Ok(ReadyOutcome::Ready) => {
                self.attach_ready_surface(generation);
                for resolver in self.pending_init.drain(..) {
                    resolver.resolve(());
                }
            }
            Err(err) => {
                let err = PluginError::from(err);
                for resolver in self.pending_init.drain(..) {
                    resolver.reject(err.clone());
                }
                self.layout.reset();
                self.button_request = None;
            }
        }
    }

    /// Replay queued layout, subscribe to SDK events and apply initial stacking
    fn attach_ready_surface(&mut self, generation: u64) {
        let Some(handle) = self.surface.handle_mut() else {
            return;
        };
        let density = handle.revalidate_density(self.host.as_ref());
        self.layout.replay(density, handle.view_mut());

        let marshal = self.marshal.clone();
        if let Some(map) = handle.map_mut() {
            map.set_event_sink(SdkEventSink::new(move |event| {
                let _ = marshal.post(move |session| session.on_sdk_event(generation, event));
            }));
        }

        let layer = handle.layer();
        self.host
            .set_stacking(layer, InteractionArbiter::stacking_for(self.mode, density));

        if let Some(margins) = self.button_request.take() {
            let button = &self.config.location_button;
            let placement = scale_placement(margins.placement_dp(button.size, button.bottom_inset), density);
            if let Err(err) = self.host.add_location_button(layer, placement) {
                warn!(%err, "failed to add location button");
            }
        }
    }

    /// Tear the surface down; tolerant of no surface
    pub fn destroy(&mut self) {
        let destroyed = self.surface.destroy_surface(self.host.as_mut());

        for resolver in self.pending_init.drain(..) {
            resolver.reject(StateError::Destroyed);
        }
        let cleared = self.markers.drain().len();
        self.layout.reset();
        self.mode = InteractionMode::default();
        self.button_request = None;

        if destroyed {
            info!(cleared, "map destroyed");
        }
    }

    pub fn handle_pause(&mut self) {
        self.surface.pause();
    }

    pub fn handle_resume(&mut self) {
        self.surface.resume();
    }

    pub fn is_ready(&self) -> ReadyReply {
        ReadyReply {
            ready: self.surface.state() == SurfaceState::Ready,
        }
    }

    // --- Layout ---

    pub fn update_map_bounds(&mut self, region: Region) -> Result<(), PluginError> {
        let handle = self.surface.handle_mut().ok_or(StateError::NotInitialized)?;
        let density = handle.revalidate_density(self.host.as_ref());
        let view = if handle.is_ready() { Some(handle.view_mut()) } else { None };
        let outcome = self.layout.apply_region(region, density, view);
        debug!(?region, ?outcome, "map bounds updated");
        Ok(())
    }

    /// The current placeholder region in bridge pixels
    /// Apply bounds as the web layer sent them, keeping omitted fields
    pub fn update_map_bounds_from(&mut self, bounds: MapBoundsOptions) -> Result<(), PluginError> {
        let current = self.map_bounds()?;
        self.update_map_bounds(bounds.resolve(current))
    }

    pub fn map_bounds(&self) -> Result<Region, PluginError> {
        if let Some(region) = self.layout.current_region() {
            return Ok(region);
        }

        let handle = self.surface.handle().ok_or(StateError::NotInitialized)?;
        let parent = self.host.parent_bounds();
        let size = coords::to_bridge_pixels(NativePoint::new(parent.w, parent.h), handle.density());
        Ok(Region::new(0, 0, size.x, size.y))
    }

    pub fn set_map_visibility(&mut self, visible: bool) -> Result<(), PluginError> {
        self.surface.set_visible(visible)?;
        Ok(())
    }

    pub fn toggle_location_button(&mut self, show: bool) -> Result<VisibilityReply, PluginError> {
        let layer = self
            .surface
            .handle()
            .map(|handle| handle.layer())
            .ok_or(StateError::LocationButtonNotInitialized)?;

        if !self.host.set_location_button_visible(layer, show) {
            return Err(StateError::LocationButtonNotInitialized.into());
        }
        Ok(VisibilityReply { visible: show })
    }

    // --- Interaction ---

    pub fn set_interaction(&mut self, event: InteractionEvent) -> Result<(), PluginError> {
        let handle = self.surface.handle_mut().ok_or(StateError::NotInitialized)?;
        let transition = InteractionArbiter::process_event(self.mode, event);
        if !transition.is_change() {
            return Ok(());
        }

        let density = handle.revalidate_density(self.host.as_ref());
        let layer = handle.layer();
        self.host
            .set_stacking(layer, InteractionArbiter::stacking_for(transition.to, density));
        self.mode = transition.to;
        debug!(from = ?transition.from, to = ?transition.to, "interaction mode changed");
        Ok(())
    }

    // --- Camera ---

    pub fn move_camera(&mut self, options: MoveCameraOptions) -> Result<(), PluginError> {
        let zoom = options.zoom.unwrap_or(self.config.move_camera_zoom);
        self.camera_to(options.latitude, options.longitude, zoom, false)?;
        Ok(())
    }

    pub fn move_to_position(&mut self, options: MoveToPositionOptions) -> Result<CameraPosition, PluginError> {
        let zoom = options.zoom.unwrap_or(self.config.move_to_position_zoom);
        self.camera_to(options.latitude, options.longitude, zoom, options.animate)
    }

    fn camera_to(
        &mut self,
        latitude: f64,
        longitude: f64,
        zoom: f32,
        animate: bool,
    ) -> Result<CameraPosition, PluginError> {
        let map = self
            .surface
            .handle_mut()
            .and_then(|handle| handle.map_mut())
            .ok_or(StateError::NotReady)?;

        let zoom = PluginConfig::sanitize_zoom(zoom);
        map.move_camera(CameraUpdate {
            target: crate::domain::core::LatLng::new(latitude, longitude),
            zoom,
            animate,
        });
        Ok(CameraPosition { latitude, longitude, zoom })
    }

    pub fn set_zoom_limits(&mut self, options: ZoomLimitsOptions) -> Result<(), PluginError> {
        let map = self
            .surface
            .handle_mut()
            .and_then(|handle| handle.map_mut())
            .ok_or(StateError::NotReady)?;

        if let (Some(min), Some(max)) = (options.min_zoom, options.max_zoom) {
            if min > max {
                return Err(ConfigError::InvalidZoomLimits { min, max }.into());
            }
        }
        map.set_zoom_limits(options.min_zoom, options.max_zoom)
            .map_err(|err| PluginError::capability("Failed to set zoom limits", err))
    }

    // --- Markers ---

    pub fn add_marker(&mut self, options: AddMarkerOptions) -> Result<MarkerReply, PluginError> {
        let position = options.position();
        let title = (!options.title.is_empty()).then(|| options.title.clone());
        let id = self.add_to_map(MarkerOptions {
            position,
            title,
            draggable: options.draggable,
            icon: None,
        })?;

        self.markers.insert(MarkerRecord {
            id: id.clone(),
            position,
            title: options.title,
            draggable: options.draggable,
        });
        Ok(MarkerReply { marker_id: id })
    }

    pub fn add_custom_marker(&mut self, options: AddCustomMarkerOptions) -> Result<MarkerReply, PluginError> {
        if self.surface.state() != SurfaceState::Ready {
            return Err(StateError::NotReady.into());
        }

        let AddCustomMarkerOptions {
            position,
            icon_image,
            colors,
            mdi_icon,
            draggable,
        } = options;

        let image = icon_image.filter(|image| image.trim_start().starts_with(DATA_IMAGE_PREFIX));
        let icon = match image {
            Some(encoded) => match self.icons.synthesize(&MarkerIconSpec::FromImage { encoded }) {
                Ok(icon) => icon,
                Err(MarkerIconError::Decode(reason)) => {
                    warn!(%reason, "marker image unusable, drawing palette pin");
                    self.palette_icon(colors, mdi_icon)?
                }
                Err(err) => return Err(err.into()),
            },
            None => self.palette_icon(colors, mdi_icon)?,
        };

        let id = self.add_to_map(MarkerOptions {
            position,
            title: None,
            draggable,
            icon: Some(icon),
        })?;
        self.markers.insert(MarkerRecord {
            id: id.clone(),
            position,
            title: String::new(),
            draggable,
        });
        Ok(MarkerReply { marker_id: id })
    }

    fn palette_icon(&self, colors: Vec<String>, glyph: String) -> Result<MarkerBitmap, PluginError> {
        if colors.len() < 3 {
            return Err(ConfigError::InvalidColorArray.into());
        }
        Ok(self.icons.synthesize(&MarkerIconSpec::FromPalette { colors, glyph })?)
    }

    fn add_to_map(&mut self, options: MarkerOptions) -> Result<crate::domain::marker::MarkerId, PluginError> {
        let map = self
            .surface
            .handle_mut()
            .and_then(|handle| handle.map_mut())
            .ok_or(StateError::NotReady)?;
        map.add_marker(options)
            .map_err(|err| PluginError::capability("Failed to add marker", err))
    }

    pub fn clear_markers(&mut self) -> Result<ClearReply, PluginError> {
        let map = self
            .surface
            .handle_mut()
            .and_then(|handle| handle.map_mut())
            .ok_or(StateError::NotReady)?;

        let records = self.markers.drain();
        for record in &records {
            map.remove_marker(&record.id);
        }
        debug!(count = records.len(), "markers cleared");
        Ok(ClearReply::cleared())
    }

    // --- Location ---

    pub fn get_current_location(&mut self, resolver: Resolver<LocationReply>) {
        if !self.location.has_permission()
            && self.location.request_location_permission() == PermissionState::Denied
        {
            info!("location permission denied");
            resolver.reject(PluginError::location(CapabilityError::new("Location permission denied")));
            return;
        }

        self.pending_location.push(resolver);
        if self.pending_location.len() > 1 {
            debug!("location request already in flight, joined it");
            return;
        }

        let marshal = self.marshal.clone();
        self.location.last_location(LocationSignal::new(move |result| {
            let _ = marshal.post(move |session| session.on_location(result));
        }));
    }

    /// The host's native location button was tapped
    pub fn location_button_pressed(&mut self) {
        let (resolver, _unobserved) = crate::input::owner_thread::completion();
        self.get_current_location(resolver);
    }

    fn on_location(&mut self, result: Result<Option<LocationFix>, CapabilityError>) {
        let resolvers: Vec<_> = self.pending_location.drain(..).collect();

        let fix = match result {
            Ok(Some(fix)) => fix,
            Ok(None) => {
                for resolver in resolvers {
                    resolver.reject(StateError::LocationUnavailable);
                }
                return;
            }
            Err(err) => {
                warn!(%err, "location provider failed");
                let err = PluginError::location(err);
                for resolver in resolvers {
                    resolver.reject(err.clone());
                }
                return;
            }
        };

        let location_zoom = self.config.location_zoom;
        if let Some(map) = self.surface.handle_mut().and_then(|handle| handle.map_mut()) {
            map.move_camera(CameraUpdate {
                target: fix.position,
                zoom: location_zoom,
                animate: true,
            });
        }

        match self.translation_context() {
            Some(ctx) => self.translator.emit_location(fix, Some(&ctx)),
            None => self.translator.emit_location(fix, None),
        };

        let reply = LocationReply::from(fix);
        for resolver in resolvers {
            resolver.resolve(reply);
        }
    }

    // --- SDK events ---

    fn translation_context(&self) -> Option<TranslationContext<'_>> {
        let handle = self.surface.handle()?;
        let map = handle.map()?;
        Some(TranslationContext {
            map,
            viewport: handle.viewport(self.host.as_ref()),
            density: handle.density(),
        })
    }

    fn on_sdk_event(&mut self, generation: u64, event: SdkEvent) {
        let live = self.surface.handle().map(|handle| handle.generation());
        if !events::is_current_generation(generation, live) {
            return;
        }

        match &event {
            SdkEvent::MarkerClick(marker) | SdkEvent::MarkerDragStart(marker)
                if !self.markers.contains(&marker.id) =>
            {
                debug!(marker = %marker.id, "dropping event for a cleared marker");
                return;
            }
            SdkEvent::MarkerDrag(marker) | SdkEvent::MarkerDragEnd(marker) => {
                if !self.markers.contains(&marker.id) {
                    debug!(marker = %marker.id, "dropping event for a cleared marker");
                    return;
                }
                self.markers.update_position(&marker.id, marker.position);
            }
            _ => {}
        }

        if let Some(ctx) = self.translation_context() {
            self.translator.forward(event, &ctx);
        }
    }
}

impl std::fmt::Debug for MapSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapSession")
            .field("surface", &self.surface)
            .field("mode", &self.mode)
            .field("markers", &self.markers.len())
            .field("pending_init", &self.pending_init.len())
            .field("pending_location", &self.pending_location.len())
            .finish()
    }
}

/// Scale a dp placement to native pixels
fn scale_placement(placement: ButtonPlacement, density: Density) -> ButtonPlacement {
    let scale = |value: i32| coords::dp_to_native_length(value as f32, density) as i32;
    ButtonPlacement {
        size: scale(placement.size),
        left: scale(placement.left),
        top: scale(placement.top),
        right: scale(placement.right),
        bottom: scale(placement.bottom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placement_scales_every_field() {
        let placement = ButtonMargins { left: 0, top: 0, right: 16, bottom: 8 }.placement_dp(48, 72);
        let scaled = scale_placement(placement, Density::new(2.0).unwrap());
        assert_eq!(
            scaled,
            ButtonPlacement { size: 96, left: 0, top: 0, right: 32, bottom: 160 }
        );
    }
}
