//! Application orchestration layer
//!
//! Coordinates the surface, layout, interaction and event components on
//! behalf of the web layer. All mutable state lives in one [`MapSession`]
//! owned by the owner thread.

pub mod controller;
pub mod error;
pub mod events;
pub mod reply;
pub mod session;
pub mod state;

pub use controller::MapOverlayPlugin;
pub use error::{ConfigError, PluginError, StateError};
pub use events::{EventEmitter, EventTranslator};
pub use session::{MapSession, Platform};
pub use state::{InteractionArbiter, InteractionEvent, InteractionMode};
