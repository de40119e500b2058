//! Device location and geocoding capabilities

use crate::domain::core::LatLng;
use crate::platform::{CapabilityError, Signal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    Granted,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    pub position: LatLng,
    /// Horizontal accuracy radius in meters
    pub accuracy: f32,
}

/// Completion for a last-known-location request; `Ok(None)` means the
/// provider had no fix to report.
pub type LocationSignal = Signal<Result<Option<LocationFix>, CapabilityError>>;

pub trait LocationProvider {
    fn has_permission(&self) -> bool;

    /// Ask the host to grant location access
    fn request_location_permission(&mut self) -> PermissionState;

    fn last_location(&mut self, signal: LocationSignal);
}

/// Reverse geocoding, used only to enrich drag-end events
pub trait Geocoder {
    fn reverse_geocode(&self, position: LatLng) -> Result<Option<String>, CapabilityError>;
}
