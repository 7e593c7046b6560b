//! The per-model adapter contract.
//!
//! Every model authenticates in its own way and renders its pages in its own
//! shape, but extraction always follows the same steps: authenticate, fetch a
//! fixed list of endpoints, parse each one, then normalize the lot into an
//! [`Inventory`]. [`SwitchAdapter`] provides that sequence; models supply the
//! handshake and the parsers.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::error::{Result, SwitchError};
use crate::model::{Endpoint, Inventory, MacEntry, PageKind, Payload, Vlan};
use crate::session::{normalize_base_url, HttpTransport, Reply, Request, Transport, DEFAULT_TIMEOUT};
use crate::snapshot::Snapshot;
use crate::vendor::{VendorResolver, DEFAULT_DELAY};

/// Shortest MAC string worth sending to the vendor API.
const MIN_RESOLVABLE_MAC: usize = 11;

#[derive(Clone, Debug)]
pub struct SwitchConfig {
    pub url: String,
    pub username: String,
    pub password: String,
    pub mac_lookup_delay: Duration,
    pub resolve_vendors: bool,
    pub timeout: Duration,
}

impl SwitchConfig {
    pub fn new(url: &str, username: &str, password: &str) -> Self {
        Self {
            url: url.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            mac_lookup_delay: DEFAULT_DELAY,
            resolve_vendors: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn mac_lookup_delay(mut self, delay: Duration) -> Self {
        self.mac_lookup_delay = delay;
        self
    }

    pub fn resolve_vendors(mut self, enabled: bool) -> Self {
        self.resolve_vendors = enabled;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// State every adapter carries: where the switch is, how to log in, and the
/// HTTP session used to talk to it.
pub struct SwitchBase {
    url: String,
    username: String,
    password: String,
    transport: Arc<dyn Transport>,
    vendors: VendorResolver,
    resolve_vendors: bool,
}

impl SwitchBase {
    pub fn new(config: &SwitchConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(config.timeout)?);
        Ok(Self::with_transport(config, transport))
    }

    pub fn with_transport(config: &SwitchConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            url: normalize_base_url(&config.url),
            username: config.username.clone(),
            password: config.password.clone(),
            vendors: VendorResolver::new(transport.clone(), config.mac_lookup_delay),
            transport,
            resolve_vendors: config.resolve_vendors,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn vendors(&self) -> &VendorResolver {
        &self.vendors
    }

    pub fn resolves_vendors(&self) -> bool {
        self.resolve_vendors
    }

    /// Absolute URL of a page relative to the switch root.
    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}/{}", self.url, path.trim_start_matches('/'))
    }

    pub fn send(&self, request: Request) -> Result<Reply> {
        self.transport.send(request)
    }

    pub fn get(&self, path: &str) -> Result<Reply> {
        self.send(Request::get(self.endpoint_url(path)))
    }

    pub fn set_cookie(&self, name: &str, value: &str) {
        self.transport.set_cookie(&self.url, name, value);
    }
}

/// GET `endpoint` and keep the body as JSON when it parses, text otherwise.
pub fn fetch_json_or_text(base: &SwitchBase, endpoint: &Endpoint) -> Result<Payload> {
    let reply = require_ok(endpoint.path, base.get(endpoint.path)?)?;
    Ok(match reply.json() {
        Some(value) => Payload::Json(value),
        None => Payload::Text(reply.body),
    })
}

pub(crate) fn require_ok(path: &str, reply: Reply) -> Result<Reply> {
    if reply.is_ok() {
        Ok(reply)
    } else {
        Err(SwitchError::InvalidResponse(format!(
            "{} answered HTTP {}",
            path, reply.status
        )))
    }
}

/// Fill in `vendor` on every entry; short or placeholder addresses get `N/A`.
pub fn resolve_vendors(resolver: &VendorResolver, entries: &mut [MacEntry]) {
    let total = entries.len();
    if total > 0 {
        info!("resolving vendors for {} MAC entries", total);
    }
    for (index, entry) in entries.iter_mut().enumerate() {
        let vendor = if entry.mac.len() >= MIN_RESOLVABLE_MAC {
            debug!("looking up vendor for {} ({}/{})", entry.mac, index + 1, total);
            resolver.resolve(&entry.mac).to_string()
        } else {
            "N/A".to_string()
        };
        entry.vendor = Some(vendor);
    }
}

pub(crate) fn unsupported(operation: &'static str, model: &'static str) -> SwitchError {
    SwitchError::Unsupported { operation, model }
}

pub trait SwitchAdapter: Send + Sync {
    fn model_name(&self) -> &'static str;

    fn manufacturer(&self) -> Option<&'static str> {
        None
    }

    fn endpoints(&self) -> &'static [Endpoint];

    fn login_endpoint(&self) -> &'static str;

    fn base(&self) -> &SwitchBase;

    fn authenticate(&self) -> Result<()>;

    fn fetch(&self, endpoint: &Endpoint) -> Result<Payload> {
        fetch_json_or_text(self.base(), endpoint)
    }

    /// Normalize fetched payloads, keyed by endpoint name.
    fn summarize(&self, _payloads: &BTreeMap<String, Payload>) -> Inventory {
        Inventory::default()
    }

    fn extract_all(&self) -> Snapshot {
        let mut snapshot = Snapshot::new(self.model_name(), self.base().url());

        if let Err(err) = self.authenticate() {
            warn!("{}: {}", self.model_name(), err);
            snapshot.error = Some("Authentication failed".to_string());
            return snapshot;
        }

        for endpoint in self.endpoints() {
            info!("retrieving {}", endpoint.name);
            match self.fetch(endpoint) {
                Ok(payload) => {
                    snapshot.endpoints.insert(endpoint.name.to_string(), payload);
                }
                Err(err) => {
                    warn!("failed to retrieve {}: {}", endpoint.name, err);
                    snapshot.failed.push(endpoint.name.to_string());
                }
            }
        }

        snapshot.inventory = self.summarize(&snapshot.endpoints);
        if self.base().resolves_vendors() {
            resolve_vendors(self.base().vendors(), &mut snapshot.inventory.mac_table);
        }
        snapshot
    }

    fn list_vlans(&self) -> Result<Vec<Vlan>> {
        self.authenticate()?;
        let mut payloads = BTreeMap::new();
        for endpoint in self.endpoints().iter().filter(|e| e.kind == PageKind::Vlans) {
            payloads.insert(endpoint.name.to_string(), self.fetch(endpoint)?);
        }
        Ok(self.summarize(&payloads).vlans)
    }

    fn create_vlan(&self, _id: u16, _name: &str) -> Result<()> {
        Err(unsupported("create_vlan", self.model_name()))
    }

    fn delete_vlan(&self, _id: u16) -> Result<()> {
        Err(unsupported("delete_vlan", self.model_name()))
    }

    fn enable_ssh(&self) -> Result<()> {
        Err(unsupported("enable_ssh", self.model_name()))
    }

    fn disable_ssh(&self) -> Result<()> {
        Err(unsupported("disable_ssh", self.model_name()))
    }

    fn save_configuration(&self) -> Result<()> {
        Err(unsupported("save_configuration", self.model_name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::ScriptedTransport;

    static ENDPOINTS: [Endpoint; 2] = [
        Endpoint::new("system_info", "info.json", PageKind::SystemInfo),
        Endpoint::new("mac_table", "mac.cgi", PageKind::MacTable),
    ];

    struct Fake {
        base: SwitchBase,
        accept: bool,
    }

    impl SwitchAdapter for Fake {
        fn model_name(&self) -> &'static str {
            "FAKE-1"
        }

        fn endpoints(&self) -> &'static [Endpoint] {
            &ENDPOINTS
        }

        fn login_endpoint(&self) -> &'static str {
            "login.cgi"
        }

        fn base(&self) -> &SwitchBase {
            &self.base
        }

        fn authenticate(&self) -> Result<()> {
            if self.accept {
                Ok(())
            } else {
                Err(SwitchError::AuthFailed("bad password".into()))
            }
        }

        fn summarize(&self, payloads: &BTreeMap<String, Payload>) -> Inventory {
            let mut inventory = Inventory::default();
            if payloads.contains_key("system_info") {
                inventory.mac_table = vec![
                    MacEntry::new("24:5a:4c:11:22:33", "1", "3", "dynamic"),
                    MacEntry::new("-", "1", "4", "dynamic"),
                ];
            }
            inventory
        }
    }

    fn fake(transport: &Arc<ScriptedTransport>, accept: bool) -> Fake {
        let config = SwitchConfig::new("10.0.0.9/", "admin", "admin").mac_lookup_delay(Duration::ZERO);
        Fake {
            base: SwitchBase::with_transport(&config, transport.clone()),
            accept,
        }
    }

    #[test]
    fn base_normalizes_url() {
        let transport = ScriptedTransport::new();
        let adapter = fake(&transport, true);
        assert_eq!(adapter.base().url(), "http://10.0.0.9");
        assert_eq!(adapter.base().endpoint_url("/info.cgi"), "http://10.0.0.9/info.cgi");
    }

    #[test]
    fn extract_records_failures_and_resolves_vendors() {
        let transport = ScriptedTransport::new();
        transport
            .get("/info.json", 200, r#"{"model":"FAKE-1"}"#)
            .get("/mac.cgi", 500, "")
            .get("api.macvendors.com", 200, "Ubiquiti Inc");
        let snapshot = fake(&transport, true).extract_all();

        assert!(snapshot.is_ok());
        assert_eq!(
            snapshot.endpoints["system_info"],
            Payload::Json(serde_json::json!({"model": "FAKE-1"}))
        );
        assert_eq!(snapshot.failed, vec!["mac_table"]);
        let vendors: Vec<_> = snapshot
            .inventory
            .mac_table
            .iter()
            .map(|entry| entry.vendor.as_deref())
            .collect();
        assert_eq!(vendors, vec![Some("Ubiquiti Inc"), Some("N/A")]);
    }

    #[test]
    fn failed_login_yields_error_snapshot() {
        let transport = ScriptedTransport::new();
        let snapshot = fake(&transport, false).extract_all();
        assert_eq!(snapshot.error.as_deref(), Some("Authentication failed"));
        assert!(snapshot.endpoints.is_empty());
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn mutations_are_unsupported_by_default() {
        let transport = ScriptedTransport::new();
        let adapter = fake(&transport, true);
        let err = adapter.create_vlan(30, "Cameras").unwrap_err();
        assert_eq!(err.to_string(), "create_vlan is not supported on FAKE-1");
        assert!(matches!(
            adapter.save_configuration(),
            Err(SwitchError::Unsupported { operation: "save_configuration", .. })
        ));
    }

    #[test]
    fn text_bodies_are_kept_verbatim() {
        let transport = ScriptedTransport::new();
        transport.get("/info.json", 200, "<html>hi</html>");
        let adapter = fake(&transport, true);
        assert_eq!(
            adapter.fetch(&ENDPOINTS[0]).unwrap(),
            Payload::Text("<html>hi</html>".into())
        );
    }
}
