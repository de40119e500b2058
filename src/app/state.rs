//! Interaction mode state machine
//!
//! Decides which of the two composited surfaces owns pointer input. The map
//! surface is never removed from the view tree on a mode switch; it is only
//! raised above or lowered beneath the web layer.

use crate::domain::coords::{self, Density};
use crate::platform::host::{InputTarget, StackOrder, Stacking};

/// Which surface currently owns input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionMode {
    /// The map is on top and receives touches
    MapActive,
    /// The web layer is on top; the map stays visible beneath it
    #[default]
    WebActive,
}

/// Mode switch requests arriving from the web layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionEvent {
    EnableMapInteraction,
    DisableMapInteraction,
}

/// Result of processing an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: InteractionMode,
    pub to: InteractionMode,
}

impl Transition {
    /// Re-entering the current mode changes nothing
    pub fn is_change(&self) -> bool {
        self.from != self.to
    }
}

/// Stateless transition rules plus the stacking each mode requires
pub struct InteractionArbiter;

impl InteractionArbiter {
    /// Elevation of the map layer while it owns input, in dp
    pub const MAP_ACTIVE_LAYER_ELEVATION_DP: f32 = 10.0;
    /// Elevation of the web view while the map owns input, in dp
    pub const MAP_ACTIVE_WEB_ELEVATION_DP: f32 = 0.0;
    /// Elevation of the map layer while the web view owns input, in dp
    pub const WEB_ACTIVE_LAYER_ELEVATION_DP: f32 = -40.0;
    /// Elevation of the web view while it owns input, in dp
    pub const WEB_ACTIVE_WEB_ELEVATION_DP: f32 = 20.0;

    pub fn process_event(current: InteractionMode, event: InteractionEvent) -> Transition {
        let to = match event {
            InteractionEvent::EnableMapInteraction => InteractionMode::MapActive,
            InteractionEvent::DisableMapInteraction => InteractionMode::WebActive,
        };

        Transition { from: current, to }
    }

    /// Stacking the host must apply for a mode, scaled to native pixels
    pub fn stacking_for(mode: InteractionMode, density: Density) -> Stacking {
        match mode {
            InteractionMode::MapActive => Stacking {
                order: StackOrder::AboveWeb,
                layer_elevation: coords::dp_to_native_length(Self::MAP_ACTIVE_LAYER_ELEVATION_DP, density),
                web_elevation: coords::dp_to_native_length(Self::MAP_ACTIVE_WEB_ELEVATION_DP, density),
                input: InputTarget::Map,
            },
            InteractionMode::WebActive => Stacking {
                order: StackOrder::BelowWeb,
                layer_elevation: coords::dp_to_native_length(Self::WEB_ACTIVE_LAYER_ELEVATION_DP, density),
                web_elevation: coords::dp_to_native_length(Self::WEB_ACTIVE_WEB_ELEVATION_DP, density),
                input: InputTarget::Web,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mode_is_web_active() {
        assert_eq!(InteractionMode::default(), InteractionMode::WebActive);
    }

    #[test]
    fn enable_is_idempotent() {
        let first = InteractionArbiter::process_event(
            InteractionMode::WebActive,
            InteractionEvent::EnableMapInteraction,
        );
        assert!(first.is_change());
        assert_eq!(first.to, InteractionMode::MapActive);

        let second = InteractionArbiter::process_event(first.to, InteractionEvent::EnableMapInteraction);
        assert!(!second.is_change());
        assert_eq!(second.to, InteractionMode::MapActive);
    }

    #[test]
    fn disable_returns_to_web_active() {
        let transition = InteractionArbiter::process_event(
            InteractionMode::MapActive,
            InteractionEvent::DisableMapInteraction,
        );
        assert!(transition.is_change());
        assert_eq!(transition.to, InteractionMode::WebActive);
    }

    #[test]
    fn stacking_scales_with_density() {
        let density = Density::new(2.0).unwrap();

        let map = InteractionArbiter::stacking_for(InteractionMode::MapActive, density);
        assert_eq!(map.order, StackOrder::AboveWeb);
        assert_eq!(map.input, InputTarget::Map);
        assert_eq!(map.layer_elevation, 20.0);

        let web = InteractionArbiter::stacking_for(InteractionMode::WebActive, density);
        assert_eq!(web.order, StackOrder::BelowWeb);
        assert_eq!(web.input, InputTarget::Web);
        assert!(web.web_elevation > web.layer_elevation);
    }
}
