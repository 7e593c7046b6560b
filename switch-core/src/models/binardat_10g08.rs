//! Binardat 10G08-0800GSM layer 3 switch.
//!
//! The login page RC4-encodes both credentials client side before posting
//! them, then keeps the session alive through base64 credential cookies.
//! Most pages are HTML, though a few newer firmware pages answer JSON.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{info, warn};
use serde_json::Value;

use super::pages;
use crate::adapter::{require_ok, SwitchAdapter, SwitchBase, SwitchConfig};
use crate::crypto::{base64, rc4_encode};
use crate::error::{Result, SwitchError};
use crate::html::{is_number, record, Page};
use crate::model::{
    link_state, normalize_duplex, normalize_speed, parse_port_list, port_number, validate_vlan_id,
    Endpoint, Inventory, MacEntry, PageKind, Payload, Port, PortVlan, Vlan,
};
use crate::session::{
    Body, Reply, Request, Transport, ACCEPT_JSON, ACCEPT_LANGUAGE, FORM_CONTENT_TYPE, USER_AGENT,
};

pub const MODEL: &str = "10G08-0800GSM";
pub const MANUFACTURER: &str = "Binardat";

/// Key the login script feeds to its RC4 routine.
const LOGIN_KEY: &str = "iensuegdul27c90d";
const LOGIN_PAGE: &str = "index.cgi";
/// Row count the VLAN table form reports back on delete.
const DELETE_MAXNUM: &str = "13";

const CODE_OK: i64 = 0;
const CODE_NO_PERMISSION: i64 = 6;

static ENDPOINTS: [Endpoint; 12] = [
    Endpoint::new("system_info", "homepage.cgi", PageKind::Homepage),
    Endpoint::new("port_statistics", "port.cgi?page=stats", PageKind::PortStatistics),
    Endpoint::new("port_config", "port.cgi?page=config", PageKind::PortConfig),
    Endpoint::new("vlan_static", "getVlanConfig.cgi?page=inside", PageKind::Vlans),
    Endpoint::new("vlan_port_based", "vlan.cgi?page=port_based", PageKind::PortVlans),
    Endpoint::new("mac_forwarding_table", "mac.cgi?page=fwd_tbl", PageKind::MacTable),
    Endpoint::new("mac_static", "mac.cgi?page=static", PageKind::StaticMacTable),
    Endpoint::new("arp_table", "getSearchMac.cgi?page=inside", PageKind::ArpTable),
    Endpoint::new("ip_settings", "ip.cgi", PageKind::IpSettings),
    Endpoint::new("user_accounts", "user.cgi", PageKind::UserAccounts),
    Endpoint::new("status", "status.cgi", PageKind::Status),
    Endpoint::new("info", "info.cgi", PageKind::SystemInfo),
];

const HOMEPAGE_PORT_COLUMNS: [&str; 6] =
    ["port", "status", "type", "speed", "duplex", "auto_negotiation"];
const STATS_COLUMNS: [&str; 5] = ["port", "tx_packets", "rx_packets", "tx_bytes", "rx_bytes"];
const CONFIG_COLUMNS: [&str; 4] = ["port", "state", "speed", "duplex"];
const ARP_COLUMNS: [&str; 5] = ["vlan_id", "mac_address", "type", "creator", "port"];

pub struct Binardat10G08 {
    base: SwitchBase,
}

impl Binardat10G08 {
    pub fn new(config: &SwitchConfig) -> Result<Self> {
        Ok(Self {
            base: SwitchBase::new(config)?,
        })
    }

    pub fn with_transport(config: &SwitchConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            base: SwitchBase::with_transport(config, transport),
        }
    }

    fn open_login_page(&self) -> Result<Reply> {
        let url = self.base.endpoint_url(LOGIN_PAGE);
        self.base.send(Request::get(url.clone()).browser(url))
    }

    /// Form POST the way the admin UI's XHR sends it.
    fn post_command(&self, path: &str, body: Body) -> Result<Reply> {
        let request = Request::post(self.base.endpoint_url(path), body)
            .header("Accept", "*/*")
            .header("Accept-Language", ACCEPT_LANGUAGE)
            .header("Connection", "keep-alive")
            .header("Content-Type", FORM_CONTENT_TYPE)
            .header("Origin", self.base.url())
            .header("Referer", self.base.endpoint_url(LOGIN_PAGE))
            .header("User-Agent", USER_AGENT);
        self.base.send(request)
    }

    fn command(&self, operation: &'static str, path: &str, body: Body) -> Result<()> {
        let reply = self.post_command(path, body)?;
        if reply.is_ok() {
            Ok(())
        } else {
            Err(pages::rejected(operation, MODEL, reply.status, &reply.body))
        }
    }
}

fn looks_like_mac(text: &str) -> bool {
    let digits = text.chars().filter(char::is_ascii_hexdigit).count();
    digits == 12 && text.chars().all(|c| c.is_ascii_hexdigit() || ":-.".contains(c))
}

fn mentions(cells: &[String], needles: &[&str]) -> bool {
    cells
        .iter()
        .any(|cell| needles.iter().any(|needle| cell.contains(needle)))
}

/// Device info pairs and port rows, both rendered on the landing page.
fn homepage(page: &Page) -> Payload {
    let mut device_info = BTreeMap::new();
    let mut ports = Vec::new();
    for cells in page.rows().into_iter().filter(|cells| cells.len() >= 4) {
        if mentions(&cells, &["Hostname", "IP Address", "Uptime"]) {
            for pair in cells.chunks_exact(2) {
                let key = pair[0].replace(':', "");
                let key = key.trim();
                if !key.is_empty() && !pair[1].is_empty() {
                    device_info.insert(key.to_string(), pair[1].clone());
                }
            }
        } else if mentions(&cells, &["Ethernet"]) && cells.len() >= 6 {
            ports.push(record(&HOMEPAGE_PORT_COLUMNS, &cells));
        }
    }
    Payload::Homepage { device_info, ports }
}

fn key_values(page: &Page) -> BTreeMap<String, String> {
    let mut fields: BTreeMap<String, String> = page
        .rows_with_headers()
        .into_iter()
        .filter(|cells| cells.len() >= 2)
        .map(|cells| (cells[0].clone(), cells[1].clone()))
        .collect();
    fields.extend(page.labelled_fields());
    fields
}

fn records(page: &Page, columns: &[&str], min_cells: usize) -> Vec<BTreeMap<String, String>> {
    page.rows()
        .into_iter()
        .filter(|cells| cells.len() >= min_cells)
        .map(|cells| record(columns, &cells))
        .collect()
}

/// `id, name, ports, untagged, tagged` rows of the VLAN configuration page.
fn vlan_config(page: &Page) -> Vec<Vlan> {
    page.rows()
        .into_iter()
        .filter(|cells| cells.len() >= 3 && is_number(&cells[0]))
        .filter_map(|cells| {
            Some(Vlan {
                id: cells[0].parse().ok()?,
                name: cells[1].clone(),
                ports: Some(cells[2].clone()),
                untagged: cells.get(3).cloned(),
                tagged: cells.get(4).cloned(),
            })
        })
        .collect()
}

fn mac_table(page: &Page, default_kind: &str) -> Vec<MacEntry> {
    page.rows()
        .into_iter()
        .filter(|cells| cells.len() >= 3 && looks_like_mac(&cells[0]))
        .map(|cells| {
            let kind = cells.get(3).map_or(default_kind, String::as_str);
            MacEntry::new(&cells[0], &cells[1], &cells[2], kind)
        })
        .collect()
}

fn arp_table(page: &Page) -> Vec<BTreeMap<String, String>> {
    page.rows()
        .into_iter()
        .filter(|cells| cells.len() >= 5 && is_number(&cells[0]))
        .map(|cells| record(&ARP_COLUMNS, &cells))
        .collect()
}

fn is_active(flag: &str) -> bool {
    ["enable", "enabled", "on", "auto"]
        .iter()
        .any(|word| flag.eq_ignore_ascii_case(word))
}

/// Tagged and untagged membership per `Port N`.
fn memberships(vlans: &[Vlan]) -> BTreeMap<String, PortVlan> {
    let mut out: BTreeMap<String, PortVlan> = BTreeMap::new();
    for vlan in vlans {
        if let Some(untagged) = vlan.untagged.as_deref() {
            for port in parse_port_list(untagged) {
                out.entry(format!("Port {}", port))
                    .or_default()
                    .untagged
                    .push(vlan.id);
            }
        }
        if let Some(tagged) = vlan.tagged.as_deref() {
            for port in parse_port_list(tagged) {
                out.entry(format!("Port {}", port))
                    .or_default()
                    .tagged
                    .push(vlan.id);
            }
        }
    }
    out
}

impl SwitchAdapter for Binardat10G08 {
    fn model_name(&self) -> &'static str {
        MODEL
    }

    fn manufacturer(&self) -> Option<&'static str> {
        Some(MANUFACTURER)
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
        let reply = self.open_login_page()?;
        if !reply.is_ok() {
            return Err(SwitchError::AuthFailed(format!(
                "login page answered HTTP {}",
                reply.status
            )));
        }

        let username = self.base.username();
        let password = self.base.password();
        let body = format!(
            "name={}&pwd={}",
            rc4_encode(LOGIN_KEY, username),
            rc4_encode(LOGIN_KEY, password)
        );
        let request = Request::post(self.base.endpoint_url("login.cgi"), Body::Raw(body))
            .header("Content-Type", FORM_CONTENT_TYPE)
            .header("User-Agent", USER_AGENT)
            .header("Accept", ACCEPT_JSON)
            .header("X-Requested-With", "XMLHttpRequest")
            .header("Referer", self.base.endpoint_url(LOGIN_PAGE));
        let reply = self.base.send(request)?;
        if !reply.is_ok() {
            return Err(SwitchError::AuthFailed(format!("HTTP {}", reply.status)));
        }

        let code = reply
            .json()
            .ok_or_else(|| SwitchError::AuthFailed("invalid response format".into()))?
            .get("code")
            .and_then(Value::as_i64);
        match code {
            Some(CODE_OK) => {}
            Some(CODE_NO_PERMISSION) => {
                return Err(SwitchError::AuthFailed("insufficient permissions".into()))
            }
            _ => return Err(SwitchError::AuthFailed("invalid credentials".into())),
        }

        self.base.set_cookie("webusername", &base64(username));
        self.base.set_cookie("webpassword", &base64(password));
        self.base.set_cookie("menudatalink", "homepage.cgi");

        let landing = self.open_login_page()?;
        if !landing.is_ok() || landing.body.contains("User Login") {
            warn!("{} accepted the login but still shows the login page", self.base.url());
        }
        info!("authenticated to {} {} at {}", MANUFACTURER, MODEL, self.base.url());
        Ok(())
    }

    fn fetch(&self, endpoint: &Endpoint) -> Result<Payload> {
        let request = Request::get(self.base.endpoint_url(endpoint.path))
            .browser(self.base.endpoint_url(LOGIN_PAGE));
        let reply = require_ok(endpoint.path, self.base.send(request)?)?;
        if let Some(value) = reply.json() {
            return Ok(Payload::Json(value));
        }

        let page = Page::parse(&reply.body);
        Ok(match endpoint.kind {
            PageKind::Homepage => homepage(&page),
            PageKind::SystemInfo | PageKind::Status | PageKind::IpSettings => {
                Payload::Fields(key_values(&page))
            }
            PageKind::PortStatistics => Payload::Records(records(&page, &STATS_COLUMNS, 4)),
            PageKind::PortConfig => Payload::Records(records(&page, &CONFIG_COLUMNS, 3)),
            PageKind::Vlans => Payload::Vlans(vlan_config(&page)),
            PageKind::PortVlans => Payload::Vlans(pages::vlan_rows(&page)),
            PageKind::MacTable => Payload::MacTable(mac_table(&page, "dynamic")),
            PageKind::StaticMacTable => Payload::MacTable(mac_table(&page, "static")),
            PageKind::ArpTable => Payload::Records(arp_table(&page)),
            _ => Payload::Text(page.text()),
        })
    }

    fn summarize(&self, payloads: &BTreeMap<String, Payload>) -> Inventory {
        let mut inventory = Inventory::default();

        let configured: BTreeMap<&str, &str> = match payloads.get("port_config") {
            Some(Payload::Records(rows)) => rows
                .iter()
                .filter_map(|row| Some((row.get("port")?.as_str(), row.get("state")?.as_str())))
                .collect(),
            _ => BTreeMap::new(),
        };

        if let Some(Payload::Homepage { device_info, ports }) = payloads.get("system_info") {
            inventory.system = device_info.clone();
            for row in ports {
                let cell = |name: &str| row.get(name).map_or("", String::as_str);
                let port_id = cell("port");
                let media = cell("type");
                inventory.ports.push(Port {
                    port_id: port_id.to_string(),
                    port_number: port_number(port_id),
                    status: link_state(cell("status")),
                    enabled: configured
                        .get(port_id)
                        .map_or(true, |state| state.to_lowercase().contains("enable")),
                    speed: normalize_speed(cell("speed")),
                    duplex: normalize_duplex(cell("duplex")),
                    auto_negotiation: is_active(cell("auto_negotiation")),
                    flow_control: false,
                    media_type: (!media.is_empty()).then(|| media.to_string()),
                });
            }
        }

        if let Some(Payload::Fields(fields)) = payloads.get("info") {
            for (key, value) in fields {
                inventory
                    .system
                    .entry(key.clone())
                    .or_insert_with(|| value.clone());
            }
        }

        if let Some(Payload::Vlans(vlans)) = payloads.get("vlan_static") {
            inventory.vlans = vlans.clone();
            inventory.port_vlans = memberships(vlans);
        }

        for name in ["mac_forwarding_table", "mac_static"] {
            if let Some(Payload::MacTable(entries)) = payloads.get(name) {
                inventory.mac_table.extend(entries.iter().cloned());
            }
        }

        inventory
    }

    fn create_vlan(&self, id: u16, name: &str) -> Result<()> {
        validate_vlan_id(id)?;
        self.authenticate()?;
        let vid = id.to_string();
        let body = pages::form(&[
            ("vid", vid.as_str()),
            ("name", name),
            ("cmd", "add"),
            ("page", "inside"),
        ]);
        self.command("create_vlan", "setVlanConfig.cgi", body)?;
        info!("created VLAN {} '{}' on {}", id, name, self.base.url());
        Ok(())
    }

    fn delete_vlan(&self, id: u16) -> Result<()> {
        validate_vlan_id(id)?;
        self.authenticate()?;
        let vid = id.to_string();
        let body = pages::form(&[
            ("del_2", vid.as_str()),
            ("cmd", "del"),
            ("maxnum", DELETE_MAXNUM),
            ("page", "inside"),
        ]);
        self.command("delete_vlan", "setVlanConfig.cgi", body)?;
        info!("deleted VLAN {} on {}", id, self.base.url());
        Ok(())
    }

    fn save_configuration(&self) -> Result<()> {
        self.authenticate()?;
        self.command(
            "save_configuration",
            "syscmd.cgi",
            Body::Raw("cmd=save&page=inside".to_string()),
        )?;
        info!("configuration saved on {}", self.base.url());
        Ok(())
    }
}
