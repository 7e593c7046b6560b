//! SL-SWTG124AS: plain HTML pages. The login page only computes
//! `md5(username + password)` into an `admin` cookie, so authenticating is a
//! matter of setting that cookie and checking a protected page renders.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info, warn};

use super::pages::{self, MacColumns};
use crate::adapter::{require_ok, SwitchAdapter, SwitchBase, SwitchConfig};
use crate::crypto::credential_hash;
use crate::error::{Result, SwitchError};
use crate::html::Page;
use crate::model::{
    link_state, normalize_duplex, normalize_speed, port_number, validate_vlan_id, Endpoint,
    Inventory, PageKind, Payload, Port,
};
use crate::session::{Reply, Request, Transport, FORM_CONTENT_TYPE};

pub const MODEL: &str = "SL-SWTG124AS";

/// Member ports offered by the static VLAN form.
const VLAN_FORM_PORTS: usize = 6;

static ENDPOINTS: [Endpoint; 10] = [
    Endpoint::new("system_info", "info.cgi", PageKind::SystemInfo),
    Endpoint::new("port_status", "port.cgi", PageKind::PortStatus),
    Endpoint::new("port_statistics", "port.cgi?page=stats", PageKind::PortStatistics),
    Endpoint::new("port_config", "port.cgi?page=config", PageKind::PortConfig),
    Endpoint::new("vlan_static", "vlan.cgi?page=static", PageKind::Vlans),
    Endpoint::new("vlan_port_based", "vlan.cgi?page=port_based", PageKind::PortVlans),
    Endpoint::new("mac_forwarding_table", "mac.cgi?page=fwd_tbl", PageKind::MacTable),
    Endpoint::new("mac_static", "mac.cgi?page=static", PageKind::StaticMacTable),
    Endpoint::new("ip_settings", "ip.cgi", PageKind::IpSettings),
    Endpoint::new("user_accounts", "user.cgi", PageKind::UserAccounts),
];

const STATUS_COLUMNS: [&str; 6] = [
    "port",
    "state",
    "config_speed",
    "actual_speed",
    "config_flow",
    "actual_flow",
];
const STATS_COLUMNS: [&str; 8] = [
    "port",
    "state",
    "link_status",
    "tx_good_pkt",
    "rx_good_pkt",
    "tx_drop_pkt",
    "rx_drop_pkt",
    "collisions",
];
const CONFIG_COLUMNS: [&str; 6] = [
    "port",
    "state",
    "duplex",
    "speed",
    "auto_negotiation",
    "flow_control",
];
const MAC_COLUMNS: MacColumns = MacColumns {
    min_cells: 5,
    mac: 1,
    vlan: 2,
    port: 4,
    kind: Some(3),
};

const SSH_PAGES: [&str; 4] = ["system.cgi", "config.cgi", "admin.cgi", "ssh.cgi"];
const SSH_ENABLE_FORMS: [&[(&str, &str)]; 5] = [
    &[("ssh_enable", "1"), ("cmd", "ssh")],
    &[("ssh_state", "enable"), ("cmd", "system")],
    &[("service_ssh", "1"), ("cmd", "services")],
    &[("enable_ssh", "on"), ("cmd", "config")],
    &[("ssh", "enable")],
];
const SSH_DISABLE_FORMS: [&[(&str, &str)]; 5] = [
    &[("ssh_enable", "0"), ("cmd", "ssh")],
    &[("ssh_state", "disable"), ("cmd", "system")],
    &[("service_ssh", "0"), ("cmd", "services")],
    &[("enable_ssh", "off"), ("cmd", "config")],
    &[("ssh", "disable")],
];

pub struct SlSwtg124As {
    base: SwitchBase,
}

impl SlSwtg124As {
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

    fn post_form(&self, path: &str, fields: &[(&str, &str)], referer: &str) -> Result<Reply> {
        let request = Request::post(self.base.endpoint_url(path), pages::form(fields))
            .browser(referer)
            .header("Content-Type", FORM_CONTENT_TYPE);
        self.base.send(request)
    }

    /// Post every candidate form to every candidate page until one answers
    /// with a success indicator.
    fn toggle_ssh(&self, forms: &[&[(&str, &str)]], indicators: &[&str]) -> bool {
        let referer = format!("{}/", self.base.url());
        for page in SSH_PAGES {
            for fields in forms {
                match self.post_form(page, fields, &referer) {
                    Ok(reply) if reply.is_ok() && reply.mentions_any(indicators) => {
                        info!("SSH setting accepted by {}", page);
                        return true;
                    }
                    Ok(reply) => debug!("{} answered {} to SSH form", page, reply.status),
                    Err(err) => debug!("{} rejected SSH form: {}", page, err),
                }
            }
        }
        false
    }

    /// Last resort: switch SSH on from the system page, if it mentions SSH at all.
    fn enable_ssh_from_system_page(&self) -> Result<()> {
        let page = self.base.endpoint_url("system.cgi");
        let reply = self.base.get("system.cgi")?;
        if !reply.is_ok() {
            return Err(pages::rejected("enable_ssh", MODEL, reply.status, &reply.body));
        }
        if !reply.mentions("ssh") {
            return Err(SwitchError::OperationFailed {
                operation: "enable_ssh",
                model: MODEL,
                reason: "SSH service not found in system configuration".into(),
            });
        }
        let reply = self.post_form("system.cgi", &[("ssh", "on"), ("apply", "Apply")], &page)?;
        if reply.is_ok() && reply.mentions("success") {
            Ok(())
        } else {
            Err(pages::rejected("enable_ssh", MODEL, reply.status, &reply.body))
        }
    }
}

fn records(payload: Option<&Payload>) -> &[BTreeMap<String, String>] {
    match payload {
        Some(Payload::Records(rows)) => rows,
        _ => &[],
    }
}

fn column<'a>(row: &'a BTreeMap<String, String>, name: &str) -> &'a str {
    row.get(name).map_or("", String::as_str)
}

impl SwitchAdapter for SlSwtg124As {
    fn model_name(&self) -> &'static str {
        MODEL
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
        let hash = credential_hash(self.base.username(), self.base.password());
        self.base.set_cookie("admin", &hash);

        let reply = self.base.get("info.cgi")?;
        if reply.is_ok() && reply.body.contains(MODEL) {
            info!("authenticated to {} at {}", MODEL, self.base.url());
            Ok(())
        } else if reply.is_ok() {
            Err(SwitchError::AuthFailed("info page did not render".into()))
        } else {
            Err(SwitchError::AuthFailed(format!("HTTP {}", reply.status)))
        }
    }

    fn fetch(&self, endpoint: &Endpoint) -> Result<Payload> {
        let reply = require_ok(endpoint.path, self.base.get(endpoint.path)?)?;
        let page = Page::parse(&reply.body);
        Ok(match endpoint.kind {
            PageKind::SystemInfo => Payload::Fields(pages::first_table_fields(&page)),
            PageKind::PortStatus => {
                Payload::Records(pages::port_records(&page, &STATUS_COLUMNS, 6))
            }
            PageKind::PortStatistics => {
                Payload::Records(pages::port_records(&page, &STATS_COLUMNS, 8))
            }
            PageKind::PortConfig => {
                Payload::Records(pages::port_records(&page, &CONFIG_COLUMNS, 6))
            }
            PageKind::Vlans | PageKind::PortVlans => Payload::Vlans(pages::vlan_rows(&page)),
            PageKind::MacTable => Payload::MacTable(pages::mac_rows(&page, &MAC_COLUMNS, "dynamic")),
            PageKind::StaticMacTable => {
                Payload::MacTable(pages::mac_rows(&page, &MAC_COLUMNS, "static"))
            }
            _ => Payload::Text(page.text()),
        })
    }

    fn summarize(&self, payloads: &BTreeMap<String, Payload>) -> Inventory {
        let mut inventory = Inventory::default();

        if let Some(Payload::Fields(fields)) = payloads.get("system_info") {
            inventory.system = fields.clone();
        }

        for row in records(payloads.get("port_config")) {
            let port_id = column(row, "port");
            let speed = column(row, "speed");
            inventory.ports.push(Port {
                port_id: port_id.to_string(),
                port_number: port_number(port_id),
                status: link_state(speed),
                enabled: pages::is_enabled(column(row, "state")),
                speed: normalize_speed(speed),
                duplex: normalize_duplex(column(row, "duplex")),
                auto_negotiation: pages::is_on(column(row, "auto_negotiation")),
                flow_control: pages::is_on(column(row, "flow_control")),
                media_type: None,
            });
        }

        // The live status page wins over the configured values.
        for row in records(payloads.get("port_status")) {
            let port_id = column(row, "port");
            let actual = column(row, "actual_speed");
            let index = match inventory.ports.iter().position(|p| p.port_id == port_id) {
                Some(index) => index,
                None => {
                    inventory.ports.push(Port {
                        port_id: port_id.to_string(),
                        port_number: port_number(port_id),
                        auto_negotiation: column(row, "config_speed").eq_ignore_ascii_case("auto"),
                        ..Port::default()
                    });
                    inventory.ports.len() - 1
                }
            };
            let port = &mut inventory.ports[index];
            port.status = link_state(actual);
            port.enabled = pages::is_enabled(column(row, "state"));
            port.speed = normalize_speed(actual);
            port.duplex = normalize_duplex(actual);
            port.flow_control = pages::is_on(column(row, "actual_flow"));
        }

        if let Some(Payload::Vlans(vlans)) = payloads.get("vlan_static") {
            inventory.vlans = vlans.clone();
            inventory.port_vlans = pages::untagged_assignments(vlans);
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
        pages::submit_vlan(&self.base, MODEL, VLAN_FORM_PORTS, id, name)
    }

    fn delete_vlan(&self, id: u16) -> Result<()> {
        validate_vlan_id(id)?;
        self.authenticate()?;
        pages::remove_vlan(&self.base, MODEL, id)
    }

    fn enable_ssh(&self) -> Result<()> {
        self.authenticate()?;
        if self.toggle_ssh(&SSH_ENABLE_FORMS, &["success", "applied", "saved", "enabled"]) {
            return Ok(());
        }
        warn!("no SSH form accepted on {}, trying the system page", self.base.url());
        self.enable_ssh_from_system_page()
    }

    fn disable_ssh(&self) -> Result<()> {
        self.authenticate()?;
        if self.toggle_ssh(&SSH_DISABLE_FORMS, &["success", "applied", "saved", "disabled"]) {
            Ok(())
        } else {
            Err(SwitchError::OperationFailed {
                operation: "disable_ssh",
                model: MODEL,
                reason: "no SSH configuration page accepted the change".into(),
            })
        }
    }

    fn save_configuration(&self) -> Result<()> {
        self.authenticate()?;
        let page = self.base.endpoint_url("save.cgi");
        let request = Request::post(page.clone(), pages::form(&[("cmd", "save")]))
            .browser(page)
            .header("Cache-Control", "max-age=0")
            .header("Content-Type", FORM_CONTENT_TYPE)
            .header("Origin", self.base.url());
        let reply = self.base.send(request)?;
        if reply.is_ok() {
            info!("configuration saved on {}", self.base.url());
            Ok(())
        } else {
            Err(pages::rejected("save_configuration", MODEL, reply.status, &reply.body))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::model::{Duplex, LinkState};
    use crate::session::testing::ScriptedTransport;
    use crate::session::Method;

    const INFO: &str = r#"<html><body><table>
        <tr><th>Device Model</th><td>SL-SWTG124AS</td></tr>
        <tr><th>Firmware Version</th><td>V1.0.3</td></tr>
        <tr><th>MAC Address</th><td>1C:2A:A3:00:10:20</td></tr>
        </table></body></html>"#;

    const PORT_STATUS: &str = r#"<table>
        <tr><th>Port</th><th>State</th><th>Speed/Duplex Config</th><th>Actual</th><th>Flow Config</th><th>Actual</th></tr>
        <tr><td>Port 1</td><td>Enable</td><td>Auto</td><td>1000Full</td><td>Off</td><td>Off</td></tr>
        <tr><td>Port 2</td><td>Enable</td><td>Auto</td><td>Link Down</td><td>Off</td><td>Off</td></tr>
        <tr><td>Port 3</td><td>Disable</td><td>100Full</td><td>Link Down</td><td>On</td><td>On</td></tr>
        </table>"#;

    const PORT_CONFIG: &str = r#"<table>
        <tr><td>Port 1</td><td>Enable</td><td>Auto</td><td>1000Full</td><td>On</td><td>Off</td></tr>
        </table>"#;

    const VLANS: &str = r#"<table>
        <tr><th>VLAN ID</th><th>Name</th><th>Members</th></tr>
        <tr><td>1</td><td>default</td><td>1-2</td></tr>
        <tr><td>110</td><td>Management</td><td>3</td></tr>
        </table>"#;

    const MACS: &str = r#"<table>
        <tr><td>No.</td><td>MAC Address</td><td>VLAN</td><td>Type</td><td>Port</td></tr>
        <tr><td>1</td><td>24:5A:4C:11:22:33</td><td>110</td><td>Dynamic</td><td>3</td></tr>
        <tr><td>2</td><td>--</td><td>1</td><td>Dynamic</td><td>1</td></tr>
        </table>"#;

    fn adapter(transport: &Arc<ScriptedTransport>) -> SlSwtg124As {
        let config = SwitchConfig::new("http://10.41.8.34", "admin", "admin")
            .mac_lookup_delay(Duration::ZERO);
        SlSwtg124As::with_transport(&config, transport.clone())
    }

    fn logged_in() -> Arc<ScriptedTransport> {
        let transport = ScriptedTransport::new();
        transport.get("/info.cgi", 200, INFO);
        transport
    }

    #[test]
    fn login_sets_md5_cookie_and_checks_model() {
        let transport = logged_in();
        adapter(&transport).authenticate().unwrap();
        assert_eq!(
            transport.cookie("admin").as_deref(),
            Some("f6fdffe48c908deb0f4c3bd36c032e72")
        );
    }

    #[test]
    fn login_page_means_bad_credentials() {
        let transport = ScriptedTransport::new();
        transport.get("/info.cgi", 200, "<form action=login.cgi>");
        assert!(matches!(
            adapter(&transport).authenticate(),
            Err(SwitchError::AuthFailed(_))
        ));
    }

    #[test]
    fn statistics_and_port_based_pages() {
        let transport = ScriptedTransport::new();
        transport
            .get(
                "port.cgi?page=stats",
                200,
                r#"<table>
                <tr><td>Port</td><td>State</td><td>Link</td><td>TxGood</td><td>RxGood</td><td>TxDrop</td><td>RxDrop</td><td>Collision</td></tr>
                <tr><td>Port 1</td><td>Enable</td><td>Up</td><td>1520</td><td>998</td><td>0</td><td>2</td><td>0</td></tr>
                <tr><td>Port 2</td><td>Enable</td><td>Down</td><td>0</td><td>0</td><td>0</td><td>0</td></tr>
                </table>"#,
            )
            .get(
                "vlan.cgi?page=port_based",
                200,
                r#"<table>
                <tr><td>VLAN</td><td>Name</td><td>Members</td></tr>
                <tr><td>1</td><td>default</td><td>1-6</td></tr>
                <tr><td>120</td><td>Cameras</td><td>4,6</td></tr>
                </table>"#,
            );
        let adapter = adapter(&transport);

        let Payload::Records(rows) = adapter.fetch(&ENDPOINTS[2]).unwrap() else {
            panic!("statistics should be records");
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["port"], "Port 1");
        assert_eq!(rows[0]["tx_good_pkt"], "1520");
        assert_eq!(rows[0]["rx_drop_pkt"], "2");
        assert_eq!(rows[0]["collisions"], "0");

        let Payload::Vlans(vlans) = adapter.fetch(&ENDPOINTS[5]).unwrap() else {
            panic!("port based VLANs should be VLAN rows");
        };
        let ids: Vec<u16> = vlans.iter().map(|vlan| vlan.id).collect();
        assert_eq!(ids, vec![1, 120]);
        assert_eq!(vlans[1].name, "Cameras");
        assert_eq!(vlans[1].ports.as_deref(), Some("4,6"));
    }

    #[test]
    fn status_page_overrides_config_page() {
        let transport = logged_in();
        transport
            .get("/port.cgi", 200, PORT_STATUS)
            .get("port.cgi?page=config", 200, PORT_CONFIG)
            .get("vlan.cgi?page=static", 200, VLANS)
            .get("mac.cgi?page=fwd_tbl", 200, MACS);
        let mut config = SwitchConfig::new("10.41.8.34", "admin", "admin");
        config.resolve_vendors = false;
        let snapshot = SlSwtg124As::with_transport(&config, transport.clone()).extract_all();

        let inventory = &snapshot.inventory;
        assert_eq!(inventory.system["Firmware Version"], "V1.0.3");
        assert_eq!(inventory.ports.len(), 3);

        let first = &inventory.ports[0];
        assert_eq!(first.port_number, 1);
        assert_eq!(first.status, LinkState::Up);
        assert_eq!(first.speed, "1G");
        assert_eq!(first.duplex, Duplex::Full);
        // Only the config page knows about auto-negotiation.
        assert!(first.auto_negotiation);
        assert!(!first.flow_control);

        let third = &inventory.ports[2];
        assert_eq!(third.status, LinkState::Down);
        assert!(!third.enabled);
        assert!(!third.auto_negotiation);
        assert!(third.flow_control);

        assert_eq!(inventory.vlans.len(), 2);
        assert_eq!(inventory.port_vlans["Port 3"].untagged, vec![110]);
        assert_eq!(inventory.mac_table.len(), 2);
        assert_eq!(inventory.mac_table[0].kind, "Dynamic");
        assert!(inventory.mac_table[0].vendor.is_none());
    }

    #[test]
    fn short_mac_entries_get_no_vendor_lookup() {
        let transport = logged_in();
        transport
            .get("mac.cgi?page=fwd_tbl", 200, MACS)
            .get("api.macvendors.com", 200, "Ubiquiti Inc");
        let snapshot = adapter(&transport).extract_all();
        let vendors: Vec<_> = snapshot
            .inventory
            .mac_table
            .iter()
            .map(|entry| entry.vendor.clone().unwrap_or_default())
            .collect();
        assert_eq!(vendors, vec!["Ubiquiti Inc", "N/A"]);
        assert_eq!(transport.requests_to(Method::Get, "macvendors").len(), 1);
    }

    #[test]
    fn create_vlan_posts_static_form() {
        let transport = logged_in();
        transport.post("vlan.cgi?page=static", 200, "<html>VLAN table</html>");
        adapter(&transport).create_vlan(130, "Printers").unwrap();

        let post = &transport.requests_to(Method::Post, "vlan.cgi?page=static")[0];
        assert_eq!(post.form_value("vid"), Some("130"));
        assert_eq!(post.form_value("name"), Some("Printers"));
        assert_eq!(post.form_value("vlanPort_5"), Some("0"));
        assert_eq!(post.form_value("vlanPort_6"), None);
        assert_eq!(post.form_value("cmd"), Some("vlanstatic"));
    }

    #[test]
    fn delete_vlan_ticks_remove_checkbox() {
        let transport = logged_in();
        transport.post("getRmvVlanEntry", 200, "Entry deleted");
        adapter(&transport).delete_vlan(130).unwrap();
        let post = &transport.requests_to(Method::Post, "getRmvVlanEntry")[0];
        assert_eq!(post.form_value("remove_130"), Some("on"));
        assert_eq!(post.form_value("cmd"), Some("vlanstatictbl"));

        let refused = logged_in();
        refused.post("getRmvVlanEntry", 200, "<html>Error</html>");
        assert!(adapter(&refused).delete_vlan(130).is_err());
    }

    #[test]
    fn enable_ssh_stops_at_first_accepting_form() {
        let transport = logged_in();
        transport.post("config.cgi", 200, "Settings applied");
        adapter(&transport).enable_ssh().unwrap();
        let posts = transport.requests_to(Method::Post, ".cgi");
        // Five rejected forms on system.cgi, then the first form on config.cgi.
        assert_eq!(posts.len(), 6);
        assert_eq!(posts[5].form_value("ssh_enable"), Some("1"));
    }

    #[test]
    fn enable_ssh_gives_up_without_ssh_on_system_page() {
        let transport = logged_in();
        transport.get("system.cgi", 200, "<html>System settings</html>");
        let err = adapter(&transport).enable_ssh().unwrap_err();
        assert!(err.to_string().contains("SSH service not found"));
    }

    #[test]
    fn save_accepts_any_ok_reply() {
        let transport = logged_in();
        transport.post("save.cgi", 200, "");
        adapter(&transport).save_configuration().unwrap();
        let post = &transport.requests_to(Method::Post, "save.cgi")[0];
        assert_eq!(post.form_value("cmd"), Some("save"));
    }
}
