//! Error taxonomy surfaced to the host runtime
//!
//! Component errors roll up into [`PluginError`]. Its `Display` output is the
//! rejection message the web layer receives, so those strings are part of the
//! host contract.

use crate::input::owner_thread::SchedulerError;
use crate::platform::CapabilityError;
use crate::ui::marker_icon::MarkerIconError;
use crate::ui::surface::SurfaceError;

/// Invalid input from the caller or the plugin configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("API key is required")]
    MissingApiKey,

    #[error("Invalid color array")]
    InvalidColorArray,

    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Invalid arguments for {method}: {message}")]
    InvalidArguments { method: String, message: String },

    #[error("Minimum zoom {min} exceeds maximum zoom {max}")]
    InvalidZoomLimits { min: f32, max: f32 },

    #[error("Invalid plugin configuration: {0}")]
    Parse(String),
}

/// The surface is not in a state that allows the operation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("Map not ready")]
    NotReady,

    #[error("Map not initialized")]
    NotInitialized,

    #[error("Location button not initialized")]
    LocationButtonNotInitialized,

    #[error("Unable to get current location")]
    LocationUnavailable,

    #[error("Map was destroyed before it became ready")]
    Destroyed,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PluginError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    State(#[from] StateError),

    /// Payload that could not be decoded or encoded
    #[error("{0}")]
    Decode(String),

    #[error("{context}: {source}")]
    Capability {
        context: &'static str,
        source: CapabilityError,
    },

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("Call was dropped before it completed")]
    Abandoned,
}

impl PluginError {
    pub fn capability(context: &'static str, source: CapabilityError) -> Self {
        Self::Capability { context, source }
    }

    /// Failure to bring the map up
    pub fn initialization(source: CapabilityError) -> Self {
        Self::capability("Failed to initialize map", source)
    }

    /// Failure reported by the location provider
    pub fn location(source: CapabilityError) -> Self {
        Self::capability("Failed to get location", source)
    }
}

impl From<SurfaceError> for PluginError {
    fn from(err: SurfaceError) -> Self {
        match err {
            SurfaceError::MissingApiKey => ConfigError::MissingApiKey.into(),
            SurfaceError::CreationFailed(source) => Self::initialization(source),
            SurfaceError::NotInitialized => StateError::NotInitialized.into(),
        }
    }
}

impl From<MarkerIconError> for PluginError {
    fn from(err: MarkerIconError) -> Self {
        match err {
            MarkerIconError::InvalidPalette(_) => ConfigError::InvalidColorArray.into(),
            other => Self::Decode(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_messages_match_host_contract() {
        let cases: Vec<(PluginError, &str)> = vec![
            (SurfaceError::MissingApiKey.into(), "API key is required"),
            (StateError::NotReady.into(), "Map not ready"),
            (SurfaceError::NotInitialized.into(), "Map not initialized"),
            (
                MarkerIconError::InvalidPalette("expected 3 colors".into()).into(),
                "Invalid color array",
            ),
            (StateError::LocationButtonNotInitialized.into(), "Location button not initialized"),
            (StateError::LocationUnavailable.into(), "Unable to get current location"),
            (
                PluginError::location(CapabilityError::new("GPS off")),
                "Failed to get location: GPS off",
            ),
            (
                SurfaceError::CreationFailed(CapabilityError::new("no services")).into(),
                "Failed to initialize map: no services",
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.to_string(), expected);
        }
    }

    #[test]
    fn scheduler_errors_convert() {
        let err: PluginError = SchedulerError::Stopped.into();
        assert!(matches!(err, PluginError::Scheduler(SchedulerError::Stopped)));
    }
}
