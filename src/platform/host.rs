//! Host view tree capability
//!
//! The host owns the native view hierarchy that contains the web content
//! view. The map surface lives in a separate compositing layer inserted into
//! the same parent, so both share an origin.

use crate::domain::core::{Rect, Region};
use crate::platform::CapabilityError;

/// Identifier of a compositing layer inserted into the host view tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOrder {
    AboveWeb,
    BelowWeb,
}

/// Which surface receives pointer input first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputTarget {
    Map,
    Web,
}

/// Z-order and input routing for the map layer relative to the web view
///
/// Elevations are in native pixels; the coordinate bridge scales them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stacking {
    pub order: StackOrder,
    pub layer_elevation: f32,
    pub web_elevation: f32,
    pub input: InputTarget,
}

/// Size and bottom-end margins of the location button in native pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonPlacement {
    pub size: i32,
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// Native view hierarchy owned by the host application
///
/// Every method is called on the owning thread only.
pub trait HostViewTree {
    /// Current display density (device pixels per bridge pixel)
    fn density(&self) -> f32;

    /// Bounds of the parent that holds both the web view and map layers
    fn parent_bounds(&self) -> Rect;

    /// Region of the placeholder element with the given id, in bridge pixels
    fn placeholder_region(&self, placeholder_id: &str) -> Option<Region>;

    /// Insert a full-size container layer behind the web view
    fn insert_layer_behind_web(&mut self, tag: &str) -> Result<LayerId, CapabilityError>;

    /// Detach a layer; returns false when it was not attached
    fn remove_layer(&mut self, layer: LayerId) -> bool;

    /// Let the map layer show through the web view's background
    fn set_web_background_transparent(&mut self);

    fn set_stacking(&mut self, layer: LayerId, stacking: Stacking);

    /// Add a location button to the layer's bottom-end corner
    fn add_location_button(
        &mut self,
        layer: LayerId,
        placement: ButtonPlacement,
    ) -> Result<(), CapabilityError>;

    /// Toggle the location button; returns false when the layer has none
    fn set_location_button_visible(&mut self, layer: LayerId, visible: bool) -> bool;
}
