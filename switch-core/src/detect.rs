//! Best-effort model detection from unauthenticated pages.

use std::time::Duration;

use log::{debug, info};

use crate::adapter::{SwitchAdapter, SwitchConfig};
use crate::error::Result;
use crate::models::{binardat_10g08, sl_swtg124as, sl_swtgw218as, vm_s100_0800ms};
use crate::registry::{self, DEFAULT_MODEL};
use crate::session::{normalize_base_url, HttpTransport, Request, Transport};

/// Pages readable without a session, tried in order.
pub const PROBE_PATHS: [&str; 4] = ["/", "/login.cgi", "/index.cgi", "/login.html"];

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Model named by a page body, if any marker in it is recognised.
pub fn sniff(body: &str) -> Option<&'static str> {
    let upper = body.to_uppercase();
    for model in [
        sl_swtgw218as::MODEL,
        sl_swtg124as::MODEL,
        binardat_10g08::MODEL,
        vm_s100_0800ms::MODEL,
    ] {
        if upper.contains(model) {
            return Some(model);
        }
    }
    if upper.contains("BINARDAT") {
        return Some(binardat_10g08::MODEL);
    }

    if body.contains("home_loginAuth") || body.contains("cgi/get.cgi") {
        return Some(vm_s100_0800ms::MODEL);
    }
    if body.contains("User Login") && body.contains("pwd") {
        return Some(binardat_10g08::MODEL);
    }
    if body.contains("login.cgi") && body.contains("Response") {
        return Some(sl_swtg124as::MODEL);
    }
    None
}

/// Walk [`PROBE_PATHS`] until one body is recognised.
pub fn probe(transport: &dyn Transport, url: &str) -> Option<&'static str> {
    let base = normalize_base_url(url);
    for path in PROBE_PATHS {
        let request = Request::get(format!("{}{}", base, path)).timeout(PROBE_TIMEOUT);
        match transport.send(request) {
            Ok(reply) if reply.is_ok() => {
                if let Some(model) = sniff(&reply.body) {
                    info!("detected {} at {}{}", model, base, path);
                    return Some(model);
                }
            }
            Ok(reply) => debug!("probe {}{} answered HTTP {}", base, path, reply.status),
            Err(err) => debug!("probe {}{} failed: {}", base, path, err),
        }
    }
    None
}

pub fn detect_switch_model(url: &str) -> Result<Option<&'static str>> {
    let transport = HttpTransport::new(PROBE_TIMEOUT)?;
    Ok(probe(&transport, url))
}

/// Pick the detected model, else `fallback`, else the default model.
fn choose<'a>(detected: Option<&'a str>, fallback: Option<&'a str>) -> &'a str {
    detected.or(fallback).unwrap_or(DEFAULT_MODEL)
}

pub fn connect_with_detection(
    config: &SwitchConfig,
    fallback: Option<&str>,
) -> Result<Box<dyn SwitchAdapter>> {
    let transport = HttpTransport::new(PROBE_TIMEOUT)?;
    connect_via(&transport, config, fallback)
}

fn connect_via(
    transport: &dyn Transport,
    config: &SwitchConfig,
    fallback: Option<&str>,
) -> Result<Box<dyn SwitchAdapter>> {
    let detected = probe(transport, &config.url);
    let model = choose(detected, fallback);
    if detected.is_none() {
        info!("could not detect the model at {}, using {}", config.url, model);
    }
    registry::create(model, config)
}
