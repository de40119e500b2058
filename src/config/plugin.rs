use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::app::error::ConfigError;

/// Plugin-wide settings read from the host's plugin configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PluginConfig {
    /// Identifier stamped on every outward event and on the container layer
    pub map_id: String,
    /// Placeholder used when `initialize` names no container
    pub default_container_id: String,
    pub move_camera_zoom: f32,
    pub move_to_position_zoom: f32,
    /// Zoom the camera animates to after a location fix
    pub location_zoom: f32,
    pub marker_image_scale: f32,
    pub location_button: LocationButtonConfig,
    /// Icon font used for palette marker glyphs
    pub icon_font_path: Option<PathBuf>,
}

/// Location button geometry in dp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocationButtonConfig {
    pub size: i32,
    /// Added to the caller's bottom margin to clear the map attribution
    pub bottom_inset: i32,
}

impl LocationButtonConfig {
    pub const DEFAULT_SIZE: i32 = 48;
    pub const DEFAULT_BOTTOM_INSET: i32 = 72;
    pub const MIN_SIZE: i32 = 24;
    pub const MAX_SIZE: i32 = 96;
    pub const MAX_INSET: i32 = 400;
}

impl Default for LocationButtonConfig {
    fn default() -> Self {
        Self {
            size: Self::DEFAULT_SIZE,
            bottom_inset: Self::DEFAULT_BOTTOM_INSET,
        }
    }
}

impl PluginConfig {
    pub const DEFAULT_MAP_ID: &'static str = "default-map";
    pub const DEFAULT_CONTAINER_ID: &'static str = "map-container";
    pub const DEFAULT_MOVE_CAMERA_ZOOM: f32 = 14.0;
    pub const DEFAULT_MOVE_TO_POSITION_ZOOM: f32 = 15.0;
    pub const DEFAULT_LOCATION_ZOOM: f32 = 18.0;
    pub const DEFAULT_IMAGE_SCALE: f32 = 1.5;
    pub const MIN_ZOOM: f32 = 0.0;
    pub const MAX_ZOOM: f32 = 22.0;
    pub const MIN_IMAGE_SCALE: f32 = 0.25;
    pub const MAX_IMAGE_SCALE: f32 = 4.0;

    /// Parse a JSON configuration section and clamp it into range
    pub fn from_json(source: &str) -> Result<Self, ConfigError> {
        let mut config: Self =
            serde_json::from_str(source).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.sanitize();
        Ok(config)
    }

    pub fn sanitize_zoom(value: f32) -> f32 {
        if value.is_finite() {
            value.clamp(Self::MIN_ZOOM, Self::MAX_ZOOM)
        } else {
            Self::DEFAULT_MOVE_CAMERA_ZOOM
        }
    }

    /// Clamp every field into its supported range
    pub fn sanitize(&mut self) {
        if self.map_id.trim().is_empty() {
            self.map_id = Self::DEFAULT_MAP_ID.to_string();
        }
        if self.default_container_id.trim().is_empty() {
            self.default_container_id = Self::DEFAULT_CONTAINER_ID.to_string();
        }

        self.move_camera_zoom = Self::sanitize_zoom(self.move_camera_zoom);
        self.move_to_position_zoom = Self::sanitize_zoom(self.move_to_position_zoom);
        self.location_zoom = Self::sanitize_zoom(self.location_zoom);

        self.marker_image_scale = if self.marker_image_scale.is_finite() {
            self.marker_image_scale
                .clamp(Self::MIN_IMAGE_SCALE, Self::MAX_IMAGE_SCALE)
        } else {
            Self::DEFAULT_IMAGE_SCALE
        };

        self.location_button.size = self
            .location_button
            .size
            .clamp(LocationButtonConfig::MIN_SIZE, LocationButtonConfig::MAX_SIZE);
        self.location_button.bottom_inset = self
            .location_button
            .bottom_inset
            .clamp(0, LocationButtonConfig::MAX_INSET);
    }

    /// Read the configured icon font; a missing or unreadable file only costs glyphs
    pub fn load_icon_font(&self) -> Option<Vec<u8>> {
        let path = self.icon_font_path.as_ref()?;
        match std::fs::read(path) {
            Ok(bytes) => {
                debug!(path = %path.display(), bytes = bytes.len(), "loaded icon font");
                Some(bytes)
            }
            Err(err) => {
                warn!(path = %path.display(), %err, "failed to read icon font");
                None
            }
        }
    }
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            map_id: Self::DEFAULT_MAP_ID.to_string(),
            default_container_id: Self::DEFAULT_CONTAINER_ID.to_string(),
            move_camera_zoom: Self::DEFAULT_MOVE_CAMERA_ZOOM,
            move_to_position_zoom: Self::DEFAULT_MOVE_TO_POSITION_ZOOM,
            location_zoom: Self::DEFAULT_LOCATION_ZOOM,
            marker_image_scale: Self::DEFAULT_IMAGE_SCALE,
            location_button: LocationButtonConfig::default(),
            icon_font_path: None,
        }
    }
}
