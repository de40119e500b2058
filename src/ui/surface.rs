//! Native map surface lifecycle
//!
//! Owns the single live [`SurfaceHandle`]: the map view, the compositing
//! layer that holds it in the host view tree, and the map controller once
//! the SDK reports ready. Creation is idempotent, teardown tolerates an
//! absent surface, and pause/resume are forwarded only when a surface exists.
//!
//! Every creation is stamped with a generation number. Tearing a surface
//! down while its readiness signal is still outstanding leaves that signal
//! pointing at a generation that no longer exists, so the late completion
//! is discarded instead of re-attaching a surface.

use tracing::{debug, info, warn};

use crate::domain::coords::Density;
use crate::domain::core::{Rect, Region};
use crate::platform::host::{HostViewTree, LayerId};
use crate::platform::map_sdk::{MapHandle, MapReadySignal, MapSdk, MapView};
use crate::platform::CapabilityError;

/// Surface lifecycle errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SurfaceError {
    #[error("API key is required")]
    MissingApiKey,

    #[error("Failed to initialize map: {0}")]
    CreationFailed(CapabilityError),

    #[error("Map not initialized")]
    NotInitialized,
}

/// Options recognised by [`SurfaceManager::create_surface`]
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceConfig {
    pub api_key: String,
    pub placeholder_id: String,
    pub initial_region: Option<Region>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
    Empty,
    Pending,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// A new surface was attached; readiness arrives for `generation`
    Started { generation: u64 },
    /// A surface already exists in the given state and was made visible
    Existing(SurfaceState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyOutcome {
    Ready,
    /// The signal belonged to a surface that was torn down
    Stale,
}

/// The live native surface and its compositing container
pub struct SurfaceHandle {
    layer: LayerId,
    view: Box<dyn MapView>,
    map: Option<Box<dyn MapHandle>>,
    density: Density,
    generation: u64,
    paused: bool,
}

impl SurfaceHandle {
    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_ready(&self) -> bool {
        self.map.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Density sampled for the most recent layout pass
    pub fn density(&self) -> Density {
        self.density
    }

    /// Re-read the host density at the start of a layout pass
    ///
    /// The returned value must be used for every conversion in that pass.
    pub fn revalidate_density(&mut self, host: &dyn HostViewTree) -> Density {
        match Density::new(host.density()) {
            Ok(density) if density != self.density => {
                debug!(old = self.density.factor(), new = density.factor(), "display density changed");
                self.density = density;
            }
            Ok(_) => {}
            Err(err) => warn!(%err, "host reported an invalid density, keeping previous value"),
        }
        self.density
    }

    pub fn view(&self) -> &dyn MapView {
        self.view.as_ref()
    }

    pub fn view_mut(&mut self) -> &mut dyn MapView {
        self.view.as_mut()
    }

    pub fn map(&self) -> Option<&dyn MapHandle> {
        self.map.as_deref()
    }

    pub fn map_mut(&mut self) -> Option<&mut (dyn MapHandle + 'static)> {
        self.map.as_deref_mut()
    }

    /// The map view's frame inside its container, resolved against the parent
    pub fn viewport(&self, host: &dyn HostViewTree) -> Rect {
        self.view.frame().resolve(host.parent_bounds())
    }
}

impl std::fmt::Debug for SurfaceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceHandle")
            .field("layer", &self.layer)
            .field("generation", &self.generation)
            .field("ready", &self.is_ready())
            .field("paused", &self.paused)
            .finish()
    }
}

/// Manager for the single native map surface
#[derive(Debug)]
pub struct SurfaceManager {
    surface: Option<SurfaceHandle>,
    next_generation: u64,
    /// Tag the container layer carries in the host view tree
    layer_tag: String,
}

impl SurfaceManager {
    pub fn new(layer_tag: impl Into<String>) -> Self {
        Self {
            surface: None,
            next_generation: 1,
            layer_tag: layer_tag.into(),
        }
    }

    pub fn state(&self) -> SurfaceState {
        match &self.surface {
            None => SurfaceState::Empty,
            Some(handle) if handle.is_ready() => SurfaceState::Ready,
            Some(_) => SurfaceState::Pending,
        }
    }

    pub fn handle(&self) -> Option<&SurfaceHandle> {
        self.surface.as_ref()
    }

    pub fn handle_mut(&mut self) -> Option<&mut SurfaceHandle> {
        self.surface.as_mut()
    }

    /// Create and attach the surface, or make an existing one visible
    ///
    /// `ready_signal` builds the readiness callback for the new generation.
    /// Nothing stays attached when creation fails.
    pub fn create_surface(
        &mut self,
        config: &SurfaceConfig,
        host: &mut dyn HostViewTree,
        sdk: &mut dyn MapSdk,
        ready_signal: impl FnOnce(u64) -> MapReadySignal,
    ) -> Result<CreateOutcome, SurfaceError> {
        if config.api_key.trim().is_empty() {
            return Err(SurfaceError::MissingApiKey);
        }

        let state = self.state();
        if let Some(handle) = self.surface.as_mut() {
            if !handle.view.is_visible() {
                handle.view.set_visible(true);
            }
            debug!(?state, "surface already exists, ensured visible");
            return Ok(CreateOutcome::Existing(state));
        }

        let density = Density::new(host.density()).unwrap_or_else(|err| {
            warn!(%err, "falling back to unit density");
            Density::UNIT
        });

        let mut view = sdk
            .create_map_view(&config.api_key)
            .map_err(SurfaceError::CreationFailed)?;

        let layer = match host.insert_layer_behind_web(&self.layer_tag) {
            Ok(layer) => layer,
            Err(err) => {
                view.on_destroy();
                return Err(SurfaceError::CreationFailed(err));
            }
        };
        host.set_web_background_transparent();
        view.on_resume();

        let generation = self.next_generation;
        self.next_generation += 1;

        info!(generation, ?layer, placeholder = %config.placeholder_id, "map surface attached");
        view.request_map(ready_signal(generation));

        self.surface = Some(SurfaceHandle {
            layer,
            view,
            map: None,
            density,
            generation,
            paused: false,
        });

        Ok(CreateOutcome::Started { generation })
    }

    /// Finish a creation when the SDK signals readiness
    ///
    /// A failed or malformed readiness signal tears the surface down.
    pub fn complete_creation(
        &mut self,
        generation: u64,
        result: Result<(), CapabilityError>,
        host: &mut dyn HostViewTree,
    ) -> Result<ReadyOutcome, SurfaceError> {
        let handle = match self.surface.as_mut() {
            Some(handle) if handle.generation == generation && !handle.is_ready() => handle,
            _ => {
                debug!(generation, "discarding readiness for a torn-down surface");
                return Ok(ReadyOutcome::Stale);
            }
        };

        let outcome = result.and_then(|()| {
            handle
                .view
                .take_map()
                .ok_or_else(|| CapabilityError::new("map view reported ready without a map"))
        });

        match outcome {
            Ok(map) => {
                handle.map = Some(map);
                info!(generation, "map surface ready");
                Ok(ReadyOutcome::Ready)
            }
            Err(err) => {
                warn!(generation, %err, "map capability failed to become ready");
                self.destroy_surface(host);
                Err(SurfaceError::CreationFailed(err))
            }
        }
    }

    /// Detach and release the surface; returns false when none existed
    pub fn destroy_surface(&mut self, host: &mut dyn HostViewTree) -> bool {
        let Some(mut handle) = self.surface.take() else {
            return false;
        };

        if !host.remove_layer(handle.layer) {
            debug!(layer = ?handle.layer, "container layer was already detached");
        }
        handle.view.on_destroy();
        info!(generation = handle.generation, "map surface destroyed");
        true
    }

    pub fn pause(&mut self) {
        if let Some(handle) = self.surface.as_mut() {
            if !handle.paused {
                handle.view.on_pause();
                handle.paused = true;
            }
        }
    }

    pub fn resume(&mut self) {
        if let Some(handle) = self.surface.as_mut() {
            if handle.paused {
                handle.view.on_resume();
                handle.paused = false;
            }
        }
    }

    pub fn set_visible(&mut self, visible: bool) -> Result<(), SurfaceError> {
        let handle = self.surface.as_mut().ok_or(SurfaceError::NotInitialized)?;
        handle.view.set_visible(visible);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::headless::{HeadlessHost, HeadlessMapSdk, ReadyMode};
    use std::sync::{Arc, Mutex};

    fn config() -> SurfaceConfig {
        SurfaceConfig {
            api_key: "K".to_string(),
            placeholder_id: "map-container".to_string(),
            initial_region: None,
        }
    }

    /// Readiness signals that record the generation they fired for
    fn recording_signal(log: &Arc<Mutex<Vec<u64>>>) -> impl FnOnce(u64) -> MapReadySignal {
        let log = Arc::clone(log);
        move |generation| {
            MapReadySignal::new(move |_result| {
                log.lock().unwrap().push(generation);
            })
        }
    }

    #[test]
    fn surface_manager_creation() {
        let manager = SurfaceManager::new("default-map");
        assert_eq!(manager.state(), SurfaceState::Empty);
        assert!(manager.handle().is_none());
    }

    #[test]
    fn missing_api_key_attaches_nothing() {
        let mut manager = SurfaceManager::new("default-map");
        let mut host = HeadlessHost::new(2.0, Rect::new(0, 0, 1080, 1920));
        let mut sdk = HeadlessMapSdk::new(ReadyMode::Manual);
        let fired = Arc::new(Mutex::new(Vec::new()));

        let mut cfg = config();
        cfg.api_key = String::new();
        let result = manager.create_surface(&cfg, &mut host, &mut sdk, recording_signal(&fired));

        assert_eq!(result, Err(SurfaceError::MissingApiKey));
        assert!(host.layers().is_empty());
        assert_eq!(sdk.views_created(), 0);
    }

    #[test]
    fn create_twice_keeps_one_handle() {
        let mut manager = SurfaceManager::new("default-map");
        let mut host = HeadlessHost::new(2.0, Rect::new(0, 0, 1080, 1920));
        let mut sdk = HeadlessMapSdk::new(ReadyMode::Manual);
        let fired = Arc::new(Mutex::new(Vec::new()));

        let first = manager.create_surface(&config(), &mut host, &mut sdk, recording_signal(&fired));
        let second = manager.create_surface(&config(), &mut host, &mut sdk, recording_signal(&fired));

        assert_eq!(first, Ok(CreateOutcome::Started { generation: 1 }));
        assert_eq!(second, Ok(CreateOutcome::Existing(SurfaceState::Pending)));
        assert_eq!(host.layers().len(), 1);
        assert_eq!(sdk.views_created(), 1);
        assert!(host.web_transparent());
    }

    #[test]
    fn readiness_completes_creation() {
        let mut manager = SurfaceManager::new("default-map");
        let mut host = HeadlessHost::new(2.0, Rect::new(0, 0, 1080, 1920));
        let mut sdk = HeadlessMapSdk::new(ReadyMode::Manual);
        let fired = Arc::new(Mutex::new(Vec::new()));

        manager
            .create_surface(&config(), &mut host, &mut sdk, recording_signal(&fired))
            .unwrap();
        sdk.complete_pending();
        assert_eq!(*fired.lock().unwrap(), vec![1]);

        let outcome = manager.complete_creation(1, Ok(()), &mut host);
        assert_eq!(outcome, Ok(ReadyOutcome::Ready));
        assert_eq!(manager.state(), SurfaceState::Ready);
    }

    #[test]
    fn destroy_without_surface_is_noop() {
        let mut manager = SurfaceManager::new("default-map");
        let mut host = HeadlessHost::new(2.0, Rect::new(0, 0, 1080, 1920));

        assert!(!manager.destroy_surface(&mut host));
        assert_eq!(host.mutation_count(), 0);

        // Lifecycle hooks are safe without a surface
        manager.pause();
        manager.resume();
        assert_eq!(manager.set_visible(true), Err(SurfaceError::NotInitialized));
    }

    #[test]
    fn destroy_during_pending_discards_late_readiness() {
        let mut manager = SurfaceManager::new("default-map");
        let mut host = HeadlessHost::new(2.0, Rect::new(0, 0, 1080, 1920));
        let mut sdk = HeadlessMapSdk::new(ReadyMode::Manual);
        let fired = Arc::new(Mutex::new(Vec::new()));

        manager
            .create_surface(&config(), &mut host, &mut sdk, recording_signal(&fired))
            .unwrap();
        assert!(manager.destroy_surface(&mut host));
        assert!(host.layers().is_empty());

        let outcome = manager.complete_creation(1, Ok(()), &mut host);
        assert_eq!(outcome, Ok(ReadyOutcome::Stale));
        assert_eq!(manager.state(), SurfaceState::Empty);
        assert!(host.layers().is_empty());
    }

    #[test]
    fn failed_readiness_detaches_container() {
        let mut manager = SurfaceManager::new("default-map");
        let mut host = HeadlessHost::new(2.0, Rect::new(0, 0, 1080, 1920));
        let mut sdk = HeadlessMapSdk::new(ReadyMode::Manual);
        let fired = Arc::new(Mutex::new(Vec::new()));

        manager
            .create_surface(&config(), &mut host, &mut sdk, recording_signal(&fired))
            .unwrap();
        let outcome = manager.complete_creation(1, Err(CapabilityError::new("no play services")), &mut host);

        assert_eq!(
            outcome,
            Err(SurfaceError::CreationFailed(CapabilityError::new("no play services")))
        );
        assert!(host.layers().is_empty());
        assert_eq!(manager.state(), SurfaceState::Empty);
    }

    #[test]
    fn failed_layer_insertion_releases_view() {
        let mut manager = SurfaceManager::new("default-map");
        let mut host = HeadlessHost::new(2.0, Rect::new(0, 0, 1080, 1920));
        host.fail_layer_insertion("parent view missing");
        let mut sdk = HeadlessMapSdk::new(ReadyMode::Manual);
        let fired = Arc::new(Mutex::new(Vec::new()));

        let result = manager.create_surface(&config(), &mut host, &mut sdk, recording_signal(&fired));

        assert!(matches!(result, Err(SurfaceError::CreationFailed(_))));
        assert_eq!(manager.state(), SurfaceState::Empty);
        assert_eq!(sdk.views_destroyed(), 1);
    }

    #[test]
    fn pause_and_resume_forwarded_once() {
        let mut manager = SurfaceManager::new("default-map");
        let mut host = HeadlessHost::new(1.0, Rect::new(0, 0, 1080, 1920));
        let mut sdk = HeadlessMapSdk::new(ReadyMode::Manual);
        let fired = Arc::new(Mutex::new(Vec::new()));

        manager
            .create_surface(&config(), &mut host, &mut sdk, recording_signal(&fired))
            .unwrap();
        manager.pause();
        manager.pause();
        assert!(manager.handle().unwrap().is_paused());

        // Teardown from a paused state is allowed
        assert!(manager.destroy_surface(&mut host));
        assert_eq!(sdk.views_destroyed(), 1);
    }
}
