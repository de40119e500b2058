//! Public facade for the host runtime
//!
//! `MapOverlayPlugin` owns the owner thread and the event emitter. Every
//! inbound operation is marshaled onto the owner thread; synchronous ones
//! block for the reply, `initialize` and `getCurrentLocation` hand back a
//! [`Completion`]. Host lifecycle hooks are posted without waiting.

use crossbeam_channel::Receiver;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::app::error::PluginError;
use crate::app::events::EventEmitter;
use crate::app::reply::{CameraPosition, ClearReply, LocationReply, MarkerReply, ReadyReply, VisibilityReply};
use crate::app::session::{MapSession, Platform};
use crate::app::state::InteractionEvent;
use crate::config::options::{
    AddCustomMarkerOptions, AddMarkerOptions, InitializeOptions, MapBoundsOptions, MoveCameraOptions,
    MoveToPositionOptions, ZoomLimitsOptions,
};
use crate::config::PluginConfig;
use crate::domain::core::Region;
use crate::domain::event::GeoEvent;
use crate::input::dispatch::Request;
use crate::input::owner_thread::{self, Completion, OwnerThread};

pub struct MapOverlayPlugin {
    owner: OwnerThread<MapSession>,
    emitter: EventEmitter,
    map_id: String,
}

impl MapOverlayPlugin {
    pub const THREAD_NAME: &'static str = "map-overlay-owner";

    /// Start the owner thread and build the session on it
    ///
    /// `platform` runs on the owner thread, so the capabilities it returns
    /// never cross threads.
    pub fn start<F>(mut config: PluginConfig, platform: F) -> Result<Self, PluginError>
    where
        F: FnOnce() -> Platform + Send + 'static,
    {
        config.sanitize();
        let emitter = EventEmitter::new();
        let map_id = config.map_id.clone();

        let session_emitter = emitter.clone();
        let owner = OwnerThread::spawn(Self::THREAD_NAME, move |marshal| {
            MapSession::new(config, platform(), session_emitter, marshal)
        })?;
        info!(map_id = %map_id, "map overlay plugin started");

        Ok(Self {
            owner,
            emitter,
            map_id,
        })
    }

    pub fn map_id(&self) -> &str {
        &self.map_id
    }

    /// Receive every outward event from now on
    pub fn subscribe(&self) -> Receiver<GeoEvent> {
        self.emitter.subscribe()
    }

    fn call<R>(
        &self,
        job: impl FnOnce(&mut MapSession) -> Result<R, PluginError> + Send + 'static,
    ) -> Result<R, PluginError>
    where
        R: Send + 'static,
    {
        self.owner.run(job)?
    }

    fn notify(&self, hook: &'static str, job: impl FnOnce(&mut MapSession) + Send + 'static) {
        if let Err(err) = self.owner.post(job) {
            warn!(hook, %err, "lifecycle hook dropped");
        }
    }

    // --- Inbound operations ---

    pub fn initialize(&self, options: InitializeOptions) -> Completion<()> {
        let (resolver, completion) = owner_thread::completion();
        // A job the stopped thread never runs drops its resolver, which rejects
        self.notify("initialize", move |session| session.initialize(options, resolver));
        completion
    }

    pub fn update_map_bounds(&self, region: Region) -> Result<(), PluginError> {
        self.call(move |session| session.update_map_bounds(region))
    }

    /// Partial or fractional bounds straight from the web layer
    pub fn update_map_bounds_from(&self, bounds: MapBoundsOptions) -> Result<(), PluginError> {
        self.call(move |session| session.update_map_bounds_from(bounds))
    }

    pub fn map_bounds(&self) -> Result<Region, PluginError> {
        self.call(|session| session.map_bounds())
    }

    pub fn set_map_visibility(&self, visible: bool) -> Result<(), PluginError> {
        self.call(move |session| session.set_map_visibility(visible))
    }

    pub fn toggle_location_button(&self, show: bool) -> Result<VisibilityReply, PluginError> {
        self.call(move |session| session.toggle_location_button(show))
    }

    pub fn enable_map_interaction(&self) -> Result<(), PluginError> {
        self.call(|session| session.set_interaction(InteractionEvent::EnableMapInteraction))
    }

    pub fn disable_map_interaction(&self) -> Result<(), PluginError> {
        self.call(|session| session.set_interaction(InteractionEvent::DisableMapInteraction))
    }

    pub fn move_camera(&self, options: MoveCameraOptions) -> Result<(), PluginError> {
        self.call(move |session| session.move_camera(options))
    }

    pub fn move_to_position(&self, options: MoveToPositionOptions) -> Result<CameraPosition, PluginError> {
        self.call(move |session| session.move_to_position(options))
    }

    pub fn add_marker(&self, options: AddMarkerOptions) -> Result<MarkerReply, PluginError> {
        self.call(move |session| session.add_marker(options))
    }

    pub fn add_custom_marker(&self, options: AddCustomMarkerOptions) -> Result<MarkerReply, PluginError> {
        self.call(move |session| session.add_custom_marker(options))
    }

    pub fn clear_markers(&self) -> Result<ClearReply, PluginError> {
        self.call(|session| session.clear_markers())
    }

    pub fn get_current_location(&self) -> Completion<LocationReply> {
        let (resolver, completion) = owner_thread::completion();
        self.notify("getCurrentLocation", move |session| session.get_current_location(resolver));
        completion
    }

    pub fn destroy_map(&self) -> Result<(), PluginError> {
        self.call(|session| {
            session.destroy();
            Ok(())
        })
    }

    pub fn set_zoom_limits(&self, options: ZoomLimitsOptions) -> Result<(), PluginError> {
        self.call(move |session| session.set_zoom_limits(options))
    }

    pub fn is_ready(&self) -> Result<ReadyReply, PluginError> {
        self.call(|session| Ok(session.is_ready()))
    }

    // --- Host lifecycle ---

    pub fn handle_pause(&self) {
        self.notify("pause", MapSession::handle_pause);
    }

    pub fn handle_resume(&self) {
        self.notify("resume", MapSession::handle_resume);
    }

    pub fn handle_destroy(&self) {
        self.notify("destroy", MapSession::destroy);
    }

    /// The host's native location button was tapped
    pub fn location_button_pressed(&self) {
        self.notify("locationButton", MapSession::location_button_pressed);
    }

    // --- Host runtime entry point ---

    /// Execute a method by name with JSON arguments and return the JSON reply
    ///
    /// Asynchronous methods block until they settle; callers wanting a bound
    /// use the typed methods and [`Completion::wait_timeout`].
    pub fn dispatch(&self, method: &str, args: Value) -> Result<Value, PluginError> {
        let request = Request::parse(method, args)?;
        debug!(method = request.method(), "dispatching");

        match request {
            Request::Initialize(options) => {
                self.initialize(options).wait()?;
                Ok(Value::Null)
            }
            Request::UpdateMapBounds(bounds) => self.update_map_bounds_from(bounds).map(|()| Value::Null),
            Request::GetMapBounds => to_reply(self.map_bounds()?),
            Request::SetMapVisibility(options) => {
                self.set_map_visibility(options.visible).map(|()| Value::Null)
            }
            Request::ToggleLocationButton(options) => to_reply(self.toggle_location_button(options.show)?),
            Request::EnableMapInteraction => self.enable_map_interaction().map(|()| Value::Null),
            Request::DisableMapInteraction => self.disable_map_interaction().map(|()| Value::Null),
            Request::MoveCamera(options) => self.move_camera(options).map(|()| Value::Null),
            Request::MoveToPosition(options) => to_reply(self.move_to_position(options)?),
            Request::AddMarker(options) => to_reply(self.add_marker(options)?),
            Request::AddCustomMarker(options) => to_reply(self.add_custom_marker(options)?),
            Request::ClearMarkers => to_reply(self.clear_markers()?),
            Request::GetCurrentLocation => {
                to_reply(self.get_current_location().wait()?)
            }
            Request::DestroyMap => self.destroy_map().map(|()| Value::Null),
            Request::SetZoomLimits(options) => self.set_zoom_limits(options).map(|()| Value::Null),
            Request::IsReady => to_reply(self.is_ready()?),
        }
    }
}

impl std::fmt::Debug for MapOverlayPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapOverlayPlugin")
            .field("map_id", &self.map_id)
            .field("emitter", &self.emitter)
            .finish()
    }
}

fn to_reply<T: Serialize>(value: T) -> Result<Value, PluginError> {
    serde_json::to_value(value).map_err(|err| PluginError::Decode(format!("Failed to encode reply: {err}")))
}
