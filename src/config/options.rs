//! Per-call arguments as the web layer sends them
//!
//! Field names follow the host contract (camelCase). Omitted optional fields
//! take the defaults the plugin documents; zoom defaults come from
//! [`PluginConfig`](super::PluginConfig) and are filled in by the session.

use serde::Deserialize;

use crate::domain::core::{dp_to_whole, LatLng, Region};
use crate::platform::host::ButtonPlacement;

fn default_true() -> bool {
    true
}

/// Location button margins in dp, relative to the bottom-end corner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ButtonMargins {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl ButtonMargins {
    /// Placement in dp; the bottom inset keeps the button clear of attribution
    pub fn placement_dp(self, size: i32, bottom_inset: i32) -> ButtonPlacement {
        ButtonPlacement {
            size,
            left: self.left,
            top: self.top,
            right: self.right,
            bottom: self.bottom + bottom_inset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeOptions {
    #[serde(default)]
    pub api_key: String,
    /// Placeholder element id; the configured default when omitted
    #[serde(default)]
    pub container_id: Option<String>,
    #[serde(default)]
    pub show_location_button: bool,
    #[serde(default)]
    pub location_button_position: Option<ButtonMargins>,
    /// Region to lay out with before the web layer reports one
    #[serde(default)]
    pub initial_bounds: Option<Region>,
}

impl InitializeOptions {
    pub fn new(api_key: impl Into<String>, container_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            container_id: Some(container_id.into()),
            show_location_button: false,
            location_button_position: None,
            initial_bounds: None,
        }
    }

    pub fn with_location_button(mut self, margins: ButtonMargins) -> Self {
        self.show_location_button = true;
        self.location_button_position = Some(margins);
        self
    }
}

/// Placeholder bounds reported by the web layer, in fractional dp
///
/// Any field may be left out; it then keeps the value of the region the
/// map currently occupies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct MapBoundsOptions {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

impl MapBoundsOptions {
    pub fn from_region(region: Region) -> Self {
        Self {
            x: Some(region.x.into()),
            y: Some(region.y.into()),
            width: Some(region.width.into()),
            height: Some(region.height.into()),
        }
    }

    /// Whole-dp region, truncating each field and filling gaps from `current`
    pub fn resolve(self, current: Region) -> Region {
        let pick = |value: Option<f64>, fallback: i32| value.and_then(dp_to_whole).unwrap_or(fallback);
        Region::new(
            pick(self.x, current.x),
            pick(self.y, current.y),
            pick(self.width, current.width),
            pick(self.height, current.height),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct VisibilityOptions {
    pub visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ToggleLocationButtonOptions {
    #[serde(default = "default_true")]
    pub show: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct MoveCameraOptions {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub zoom: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct MoveToPositionOptions {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub zoom: Option<f32>,
    #[serde(default = "default_true")]
    pub animate: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AddMarkerOptions {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub draggable: bool,
}

impl AddMarkerOptions {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCustomMarkerOptions {
    pub position: LatLng,
    /// `data:image` URL; takes precedence over the palette when it decodes
    #[serde(default)]
    pub icon_image: Option<String>,
    #[serde(default)]
    pub colors: Vec<String>,
    /// Glyph drawn in the pin; empty draws none
    #[serde(default)]
    pub mdi_icon: String,
    #[serde(default)]
    pub draggable: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoomLimitsOptions {
    #[serde(default)]
    pub min_zoom: Option<f32>,
    #[serde(default)]
    pub max_zoom: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn initialize_defaults() {
        let options: InitializeOptions = serde_json::from_value(json!({"apiKey": "K"})).unwrap();
        assert_eq!(options.api_key, "K");
        assert_eq!(options.container_id, None);
        assert!(!options.show_location_button);
        assert!(options.location_button_position.is_none());
    }

    #[test]
    fn partial_margins_default_to_zero() {
        let options: InitializeOptions = serde_json::from_value(json!({
            "apiKey": "K",
            "showLocationButton": true,
            "locationButtonPosition": {"right": 16}
        }))
        .unwrap();

        let margins = options.location_button_position.unwrap();
        assert_eq!(margins, ButtonMargins { left: 0, top: 0, right: 16, bottom: 0 });
        assert_eq!(margins.placement_dp(48, 72).bottom, 72);
    }

    #[test]
    fn move_to_position_animates_by_default() {
        let options: MoveToPositionOptions =
            serde_json::from_value(json!({"latitude": 1.5, "longitude": 2.5})).unwrap();
        assert!(options.animate);
        assert!(options.zoom.is_none());
    }

    #[test]
    fn custom_marker_requires_position() {
        let missing = serde_json::from_value::<AddCustomMarkerOptions>(json!({"colors": ["red"]}));
        assert!(missing.is_err());

        let options: AddCustomMarkerOptions = serde_json::from_value(json!({
            "position": {"latitude": 1.0, "longitude": 2.0},
            "colors": ["#ff0000", "#ffffff", "#000000"],
            "mdiIcon": "\u{f0034}"
        }))
        .unwrap();
        assert_eq!(options.colors.len(), 3);
        assert!(options.icon_image.is_none());

        // No glyph unless one is named
        let bare: AddCustomMarkerOptions =
            serde_json::from_value(json!({"position": {"latitude": 1.0, "longitude": 2.0}})).unwrap();
        assert_eq!(bare.mdi_icon, "");
    }

    #[test]
    fn bounds_truncate_and_keep_omitted_fields() {
        let bounds: MapBoundsOptions =
            serde_json::from_value(json!({"x": 10.5, "width": 300.75})).unwrap();
        let current = Region::new(1, 2, 3, 4);
        assert_eq!(bounds.resolve(current), Region::new(10, 2, 300, 4));

        let full = MapBoundsOptions::from_region(Region::new(5, 6, 7, 8));
        assert_eq!(full.resolve(current), Region::new(5, 6, 7, 8));
    }

    #[test]
    fn toggle_shows_by_default() {
        let options: ToggleLocationButtonOptions = serde_json::from_value(json!({})).unwrap();
        assert!(options.show);
    }
}
