//! Overlay compositor and coordinate bridge for a native map surface placed
//! beneath a hybrid app's web layer.
//!
//! The web layer drives the map through [`MapOverlayPlugin`]; the host
//! supplies its view tree, map SDK and location services through the traits
//! in [`platform`].

pub mod app;
pub mod config;
pub mod domain;
pub mod input;
pub mod logging;
pub mod platform;
pub mod ui;

pub use app::{MapOverlayPlugin, PluginError, Platform};
pub use config::PluginConfig;
