//! Plugin configuration
//!
//! [`PluginConfig`] is read once from the host's plugin configuration
//! section; [`options`] holds the per-call arguments the web layer sends.

pub mod options;
pub mod plugin;

pub use plugin::{LocationButtonConfig, PluginConfig};
