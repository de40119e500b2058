//! Platform capability boundary
//!
//! The host view tree, the vendor map SDK and the device location services
//! are consumed through the traits in this module. Core logic never depends
//! on a concrete host; [`headless`] provides an in-memory implementation.

pub mod headless;
pub mod host;
pub mod location;
pub mod map_sdk;

pub use host::{ButtonPlacement, HostViewTree, InputTarget, LayerId, StackOrder, Stacking};
pub use location::{Geocoder, LocationFix, LocationProvider, LocationSignal, PermissionState};
pub use map_sdk::{
    CameraUpdate, MapHandle, MapReadySignal, MapSdk, MapView, MarkerEvent, MarkerOptions, SdkEvent,
    SdkEventSink,
};

/// Failure reported by an external capability
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CapabilityError {
    message: String,
}

impl CapabilityError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Single-shot completion callback handed to a capability
///
/// Capabilities may fire it from any thread. Implementations inside this
/// crate marshal the value back onto the owning thread before touching state.
pub struct Signal<T> {
    notify: Box<dyn FnOnce(T) + Send>,
}

impl<T> Signal<T> {
    pub fn new(notify: impl FnOnce(T) + Send + 'static) -> Self {
        Self { notify: Box::new(notify) }
    }

    pub fn fire(self, value: T) {
        (self.notify)(value)
    }
}

impl<T> std::fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Signal")
    }
}
