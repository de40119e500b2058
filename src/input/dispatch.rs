//! Inbound method dispatch
//!
//! The host runtime delivers calls as a method name plus a JSON argument
//! object. [`Request::parse`] turns that pair into a typed request before
//! anything is marshaled onto the owner thread, so malformed arguments are
//! rejected without touching the session.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::app::error::ConfigError;
use crate::config::options::{
    AddCustomMarkerOptions, AddMarkerOptions, InitializeOptions, MapBoundsOptions, MoveCameraOptions,
    MoveToPositionOptions, ToggleLocationButtonOptions, VisibilityOptions, ZoomLimitsOptions,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Initialize(InitializeOptions),
    UpdateMapBounds(MapBoundsOptions),
    GetMapBounds,
    SetMapVisibility(VisibilityOptions),
    ToggleLocationButton(ToggleLocationButtonOptions),
    EnableMapInteraction,
    DisableMapInteraction,
    MoveCamera(MoveCameraOptions),
    MoveToPosition(MoveToPositionOptions),
    AddMarker(AddMarkerOptions),
    AddCustomMarker(AddCustomMarkerOptions),
    ClearMarkers,
    GetCurrentLocation,
    DestroyMap,
    SetZoomLimits(ZoomLimitsOptions),
    IsReady,
}

impl Request {
    /// Method names the bridge answers to
    pub const METHODS: [&'static str; 16] = [
        "initialize",
        "updateMapBounds",
        "getMapBounds",
        "setMapVisibility",
        "toggleLocationButton",
        "enableMapInteraction",
        "disableMapInteraction",
        "moveCamera",
        "moveToPosition",
        "addMarker",
        "addCustomMarker",
        "clearMarkers",
        "getCurrentLocation",
        "destroyMap",
        "setZoomLimits",
        "isReady",
    ];

    pub fn parse(method: &str, args: Value) -> Result<Self, ConfigError> {
        let request = match method {
            "initialize" => Self::Initialize(decode(method, args)?),
            "updateMapBounds" => Self::UpdateMapBounds(decode(method, args)?),
            "getMapBounds" => Self::GetMapBounds,
            "setMapVisibility" => Self::SetMapVisibility(decode(method, args)?),
            "toggleLocationButton" => Self::ToggleLocationButton(decode(method, args)?),
            "enableMapInteraction" => Self::EnableMapInteraction,
            "disableMapInteraction" => Self::DisableMapInteraction,
            "moveCamera" => Self::MoveCamera(decode(method, args)?),
            "moveToPosition" => Self::MoveToPosition(decode(method, args)?),
            "addMarker" => Self::AddMarker(decode(method, args)?),
            "addCustomMarker" => Self::AddCustomMarker(decode(method, args)?),
            "clearMarkers" => Self::ClearMarkers,
            "getCurrentLocation" => Self::GetCurrentLocation,
            "destroyMap" => Self::DestroyMap,
            "setZoomLimits" => Self::SetZoomLimits(decode(method, args)?),
            "isReady" => Self::IsReady,
            other => return Err(ConfigError::UnknownMethod(other.to_string())),
        };
        Ok(request)
    }

    pub fn method(&self) -> &'static str {
        match self {
            Self::Initialize(_) => "initialize",
            Self::UpdateMapBounds(_) => "updateMapBounds",
            Self::GetMapBounds => "getMapBounds",
            Self::SetMapVisibility(_) => "setMapVisibility",
            Self::ToggleLocationButton(_) => "toggleLocationButton",
            Self::EnableMapInteraction => "enableMapInteraction",
            Self::DisableMapInteraction => "disableMapInteraction",
            Self::MoveCamera(_) => "moveCamera",
            Self::MoveToPosition(_) => "moveToPosition",
            Self::AddMarker(_) => "addMarker",
            Self::AddCustomMarker(_) => "addCustomMarker",
            Self::ClearMarkers => "clearMarkers",
            Self::GetCurrentLocation => "getCurrentLocation",
            Self::DestroyMap => "destroyMap",
            Self::SetZoomLimits(_) => "setZoomLimits",
            Self::IsReady => "isReady",
        }
    }

    /// Requests that complete after a capability answers
    pub fn is_async(&self) -> bool {
        matches!(self, Self::Initialize(_) | Self::GetCurrentLocation)
    }
}

/// Missing or null arguments decode as an empty object
fn decode<T: DeserializeOwned>(method: &str, args: Value) -> Result<T, ConfigError> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };

    serde_json::from_value(args).map_err(|err| ConfigError::InvalidArguments {
        method: method.to_string(),
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::core::Region;
    use serde_json::json;

    #[test]
    fn every_method_round_trips_its_name() {
        let args = |method: &str| match method {
            "updateMapBounds" => json!({"x": 0, "y": 0, "width": 10, "height": 10}),
            "setMapVisibility" => json!({"visible": true}),
            "addCustomMarker" => json!({"position": {"latitude": 0.0, "longitude": 0.0}}),
            _ => Value::Null,
        };

        for method in Request::METHODS {
            let request = Request::parse(method, args(method)).unwrap();
            assert_eq!(request.method(), method);
        }
    }

    #[test]
    fn update_bounds_accepts_fractional_and_partial_args() {
        let request = Request::parse(
            "updateMapBounds",
            json!({"x": 10.5, "y": 20.25, "width": 300.75, "height": 400}),
        )
        .unwrap();
        let Request::UpdateMapBounds(bounds) = request else {
            panic!("expected updateMapBounds, got {request:?}");
        };
        assert_eq!(bounds.resolve(Region::default()), Region::new(10, 20, 300, 400));

        let partial = Request::parse("updateMapBounds", json!({"height": 120})).unwrap();
        assert_eq!(
            partial,
            Request::UpdateMapBounds(MapBoundsOptions {
                height: Some(120.0),
                ..MapBoundsOptions::default()
            })
        );
    }

    #[test]
    fn unknown_method_is_config_error() {
        assert_eq!(
            Request::parse("startNavigation", Value::Null),
            Err(ConfigError::UnknownMethod("startNavigation".to_string()))
        );
    }

    #[test]
    fn malformed_arguments_name_the_method() {
        let err = Request::parse("setMapVisibility", json!({"visible": "yes"})).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidArguments { ref method, .. } if method == "setMapVisibility"));
    }

    #[test]
    fn only_initialize_and_location_are_async() {
        assert!(Request::parse("getCurrentLocation", Value::Null).unwrap().is_async());
        assert!(!Request::parse("clearMarkers", Value::Null).unwrap().is_async());
    }
}
