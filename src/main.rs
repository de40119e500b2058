//! Line-oriented driver for the bridge on the headless platform
//!
//! Reads one JSON call per line from stdin, `{"method": "...", "args": {...}}`,
//! and prints the reply. Outward events are printed as they arrive.

use std::io::{self, BufRead, Write};
use std::thread;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};

use map_overlay_bridge::domain::core::{LatLng, Rect};
use map_overlay_bridge::platform::headless::{
    HeadlessGeocoder, HeadlessHost, HeadlessLocation, HeadlessMapSdk, ReadyMode,
};
use map_overlay_bridge::platform::location::LocationFix;
use map_overlay_bridge::{logging, MapOverlayPlugin, Platform, PluginConfig};

#[derive(Debug, Deserialize)]
struct Call {
    method: String,
    #[serde(default)]
    args: Value,
}

fn main() {
    logging::init();

    let config = match std::env::var("MAP_OVERLAY_CONFIG") {
        Ok(source) => match PluginConfig::from_json(&source) {
            Ok(config) => config,
            Err(err) => {
                error!(%err, "ignoring invalid MAP_OVERLAY_CONFIG");
                PluginConfig::default()
            }
        },
        Err(_) => PluginConfig::default(),
    };

    let plugin = match MapOverlayPlugin::start(config, headless_platform) {
        Ok(plugin) => plugin,
        Err(err) => {
            error!(%err, "failed to start map overlay");
            return;
        }
    };

    let events = plugin.subscribe();
    let map_id = plugin.map_id().to_string();
    thread::spawn(move || {
        for event in events {
            println!("{}", json!({"event": event.event_name(), "data": event.to_payload(&map_id)}));
        }
    });

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<Call>(&line) {
            Ok(call) => match plugin.dispatch(&call.method, call.args) {
                Ok(value) => json!({"method": call.method, "ok": value}),
                Err(err) => json!({"method": call.method, "error": err.to_string()}),
            },
            Err(err) => json!({"error": format!("Malformed call: {err}")}),
        };
        println!("{reply}");
        let _ = io::stdout().flush();
    }

    plugin.handle_destroy();
    info!("input closed, shutting down");
}

fn headless_platform() -> Platform {
    let fix = LocationFix {
        position: LatLng::new(37.7749, -122.4194),
        accuracy: 12.0,
    };

    Platform {
        host: Box::new(HeadlessHost::new(2.0, Rect::new(0, 0, 1080, 1920))),
        sdk: Box::new(HeadlessMapSdk::new(ReadyMode::Immediate)),
        location: Box::new(HeadlessLocation::with_fix(fix)),
        geocoder: Some(Box::new(HeadlessGeocoder::fixed("Market St, San Francisco"))),
    }
}
