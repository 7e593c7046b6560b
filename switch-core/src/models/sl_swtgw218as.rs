//! SL-SWTGW218AS: same page family as the SL-SWTG124AS, but the login form
//! has to be submitted along with the `admin` cookie, and the switch answers
//! short placeholder pages instead of errors when a session is missing.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::info;

use super::pages::{self, MacColumns};
use crate::adapter::{SwitchAdapter, SwitchBase, SwitchConfig};
use crate::crypto::credential_hash;
use crate::error::{Result, SwitchError};
use crate::html::Page;
use crate::model::{
    link_state, normalize_duplex, normalize_speed, port_number, validate_vlan_id, Endpoint,
    Inventory, PageKind, Payload, Port,
};
use crate::session::{Request, Transport, FORM_CONTENT_TYPE};

pub const MODEL: &str = "SL-SWTGW218AS";

const VLAN_FORM_PORTS: usize = 24;

/// Anything shorter is a placeholder, not a rendered admin page.
const MIN_PAGE_LEN: usize = 500;

static ENDPOINTS: [Endpoint; 10] = [
    Endpoint::new("system_info", "info.cgi", PageKind::SystemInfo),
    Endpoint::new("port_status", "port.cgi", PageKind::PortStatus),
    Endpoint::new("port_statistics", "port.cgi?page=stats", PageKind::PortStatistics),
    Endpoint::new("port_config", "port.cgi", PageKind::PortConfig),
    Endpoint::new("vlan_static", "vlan.cgi?page=static", PageKind::Vlans),
    Endpoint::new("vlan_port_based", "vlan.cgi?page=port_based", PageKind::PortVlans),
    Endpoint::new("mac_forwarding_table", "mac.cgi?page=fwd_tbl", PageKind::MacTable),
    Endpoint::new("mac_static", "mac.cgi?page=static", PageKind::StaticMacTable),
    Endpoint::new("ip_settings", "ip.cgi", PageKind::IpSettings),
    Endpoint::new("user_accounts", "user.cgi", PageKind::UserAccounts),
];

const PORT_COLUMNS: [&str; 4] = ["port", "state", "speed", "flow_control"];
const MAC_COLUMNS: MacColumns = MacColumns {
    min_cells: 4,
    mac: 1,
    vlan: 2,
    port: 3,
    kind: None,
};

pub struct SlSwtgw218As {
    base: SwitchBase,
}

impl SlSwtgw218As {
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
}

impl SwitchAdapter for SlSwtgw218As {
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

        let form = pages::form(&[
            ("username", self.base.username()),
            ("password", self.base.password()),
            ("Response", hash.as_str()),
        ]);
        let request = Request::post(self.base.endpoint_url("login.cgi"), form)
            .header("Content-Type", FORM_CONTENT_TYPE);
        let reply = self.base.send(request)?;
        if !reply.is_ok() {
            return Err(SwitchError::AuthFailed(format!("HTTP {}", reply.status)));
        }
        // A rejected login renders the login page again.
        if reply.mentions("login") {
            return Err(SwitchError::AuthFailed("login page returned".into()));
        }
        info!("authenticated to {} at {}", MODEL, self.base.url());
        Ok(())
    }

    fn fetch(&self, endpoint: &Endpoint) -> Result<Payload> {
        let request = Request::get(self.base.endpoint_url(endpoint.path))
            .browser(format!("{}/", self.base.url()));
        let reply = self.base.send(request)?;
        if !reply.is_ok() || reply.body.len() <= MIN_PAGE_LEN {
            return Err(SwitchError::InvalidResponse(format!(
                "{}: HTTP {}, Length: {}",
                endpoint.path,
                reply.status,
                reply.body.len()
            )));
        }

        let page = Page::parse(&reply.body);
        Ok(match endpoint.kind {
            PageKind::SystemInfo | PageKind::IpSettings => {
                Payload::Fields(pages::filled_fields(&page))
            }
            PageKind::Vlans | PageKind::PortVlans => Payload::Vlans(pages::vlan_rows(&page)),
            PageKind::PortStatus | PageKind::PortConfig | PageKind::PortStatistics => {
                Payload::Records(pages::port_records(&page, &PORT_COLUMNS, 4))
            }
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

        if let Some(Payload::Records(rows)) = payloads.get("port_status") {
            for row in rows {
                let cell = |name: &str| row.get(name).cloned().unwrap_or_default();
                let port_id = cell("port");
                let speed = cell("speed");
                inventory.ports.push(Port {
                    port_number: port_number(&port_id),
                    port_id,
                    status: link_state(&speed),
                    enabled: pages::is_enabled(&cell("state")),
                    duplex: normalize_duplex(&speed),
                    speed: normalize_speed(&speed),
                    flow_control: pages::is_on(&cell("flow_control")),
                    ..Port::default()
                });
            }
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
}
