//! VM-S100-0800MS: every page is a JSON CGI call under `cgi/get.cgi`, and
//! configuration changes go through `cgi/set.cgi` with the form encoded into
//! the key of a JSON object.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use reqwest::Url;
use serde_json::{json, Value};

use crate::adapter::{require_ok, SwitchAdapter, SwitchBase, SwitchConfig};
use crate::error::{Result, SwitchError};
use crate::model::{
    compress_ids, validate_vlan_id, value_text, Endpoint, Inventory, MacEntry, PageKind, Payload,
    PortVlan, Vlan,
};
use crate::session::{Body, Reply, Request, Transport, ACCEPT_JSON, ACCEPT_LANGUAGE, USER_AGENT};

pub const MODEL: &str = "VM-S100-0800MS";

const LOGIN: &str = "cgi/set.cgi?cmd=home_loginAuth";
const VLAN_FORM_PAGE: &str = "html/vlan_vlan_create.html?_ver=3.1.0";

static ENDPOINTS: [Endpoint; 14] = [
    Endpoint::new("system_info", "cgi/get.cgi?cmd=sys_sysinfo", PageKind::SystemInfo),
    Endpoint::new("cpu_memory", "cgi/get.cgi?cmd=sys_cpumem", PageKind::CpuMemory),
    Endpoint::new("port_count", "cgi/get.cgi?cmd=port_cnt", PageKind::PortCount),
    Endpoint::new("port_bandwidth", "cgi/get.cgi?cmd=port_bwutilz", PageKind::PortBandwidth),
    Endpoint::new("lag_info", "cgi/get.cgi?cmd=lag_mgmt", PageKind::LinkAggregation),
    Endpoint::new("syslog", "cgi/get.cgi?cmd=log_syslog", PageKind::Syslog),
    Endpoint::new("panel_info", "cgi/get.cgi?cmd=panel_info", PageKind::Panel),
    Endpoint::new("panel_layout", "cgi/get.cgi?cmd=panel_layout", PageKind::Panel),
    Endpoint::new("vlan_config", "cgi/get.cgi?cmd=vlan_conf", PageKind::Vlans),
    Endpoint::new("vlan_membership", "cgi/get.cgi?cmd=vlan_membership", PageKind::PortVlans),
    Endpoint::new("vlan_port", "cgi/get.cgi?cmd=vlan_port", PageKind::PortVlans),
    Endpoint::new("mac_dynamic", "cgi/get.cgi?cmd=mac_dynamic", PageKind::MacTable),
    Endpoint::new("mac_static", "cgi/get.cgi?cmd=mac_static", PageKind::StaticMacTable),
    Endpoint::new("mac_status", "cgi/get.cgi?cmd=mac_miscStatus", PageKind::MacStatus),
];

pub struct VmS1000800Ms {
    base: SwitchBase,
}

impl VmS1000800Ms {
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

    /// POST `form` to `cgi/set.cgi?cmd=<cmd>` the way the web UI's XHR does.
    fn set_command(&self, cmd: &str, form: String) -> Result<Reply> {
        let url = self.base.endpoint_url(&format!(
            "cgi/set.cgi?cmd={}&dummy={}",
            cmd,
            Utc::now().timestamp_millis()
        ));
        let mut body = serde_json::Map::new();
        body.insert(format!("_ds=1&{}&_de=1", form), json!({}));
        let request = Request::post(url, Body::Json(Value::Object(body)))
            .header("Accept", ACCEPT_JSON)
            .header("Accept-Language", ACCEPT_LANGUAGE)
            .header("Origin", self.base.url())
            .header("Referer", self.base.endpoint_url(VLAN_FORM_PAGE))
            .header("User-Agent", USER_AGENT)
            .header("X-Requested-With", "XMLHttpRequest");
        self.base.send(request)
    }

    fn current_vlan_ids(&self) -> Result<Vec<u16>> {
        let endpoint = ENDPOINTS
            .iter()
            .find(|e| e.kind == PageKind::Vlans)
            .ok_or_else(|| SwitchError::InvalidResponse("no VLAN endpoint".into()))?;
        let payload = self.fetch(endpoint)?;
        Ok(vlans(&payload).into_iter().map(|vlan| vlan.id).collect())
    }
}

/// `success` truthy, or no `logout` marker. Only an object can say either.
fn accepted(reply: &Value) -> bool {
    let Value::Object(reply) = reply else {
        return false;
    };
    let success = match reply.get("success") {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::Null) | None => false,
    };
    success || reply.get("logout").is_none()
}

/// `key=value&...` with every value form-encoded.
fn encode_form(pairs: &[(&str, &str)]) -> Result<String> {
    let url = Url::parse_with_params("http://localhost/", pairs)
        .map_err(|err| SwitchError::InvalidResponse(format!("cannot encode form: {}", err)))?;
    Ok(url.query().unwrap_or_default().to_string())
}

fn reason(reply: &Value) -> String {
    reply
        .get("reason")
        .and_then(value_text)
        .unwrap_or_else(|| "Unknown error".to_string())
}

fn check_set(operation: &'static str, reply: Reply) -> Result<()> {
    let failed = |reason: String| SwitchError::OperationFailed {
        operation,
        model: MODEL,
        reason,
    };
    if !reply.is_ok() {
        return Err(failed(format!("HTTP {}", reply.status)));
    }
    match reply.json() {
        Some(value) if accepted(&value) => Ok(()),
        Some(value) => Err(failed(reason(&value))),
        None => Err(failed("invalid response format".into())),
    }
}

/// `data.<list>` as a sequence, whether the switch sent an object or an array.
fn data_items<'a>(payload: &'a Payload, list: &str) -> Vec<(String, &'a Value)> {
    let Payload::Json(value) = payload else {
        return Vec::new();
    };
    match value.get("data").and_then(|data| data.get(list)) {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(index, v)| (index.to_string(), v))
            .collect(),
        _ => Vec::new(),
    }
}

fn field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(value_text)
}

fn vlans(payload: &Payload) -> Vec<Vlan> {
    let mut vlans: Vec<Vlan> = data_items(payload, "vlanList")
        .into_iter()
        .filter_map(|(key, value)| {
            let id = key.parse::<u16>().ok().or_else(|| {
                field(value, "vlanId")
                    .or_else(|| field(value, "id"))
                    .and_then(|id| id.parse().ok())
            })?;
            let name = value_text(value)
                .or_else(|| field(value, "vlanName"))
                .or_else(|| field(value, "name"))
                .unwrap_or_default();
            Some(Vlan {
                id,
                name,
                ..Vlan::default()
            })
        })
        .collect();
    vlans.sort_by_key(|vlan| vlan.id);
    vlans
}

fn mac_entries(payload: &Payload, kind: &str) -> Vec<MacEntry> {
    data_items(payload, "macList")
        .into_iter()
        .map(|(_, value)| {
            let get = |key: &str| field(value, key).unwrap_or_else(|| "Unknown".to_string());
            MacEntry::new(&get("mac"), &get("vlan"), &get("port"), kind)
        })
        .collect()
}

impl SwitchAdapter for VmS1000800Ms {
    fn model_name(&self) -> &'static str {
        MODEL
    }

    fn endpoints(&self) -> &'static [Endpoint] {
        &ENDPOINTS
    }

    fn login_endpoint(&self) -> &'static str {
        LOGIN
    }

    fn base(&self) -> &SwitchBase {
        &self.base
    }

    fn authenticate(&self) -> Result<()> {
        let form = vec![
            ("username".to_string(), self.base.username().to_string()),
            ("password".to_string(), self.base.password().to_string()),
        ];
        let reply = self
            .base
            .send(Request::post(self.base.endpoint_url(LOGIN), Body::Form(form)))?;
        if !reply.is_ok() {
            return Err(SwitchError::AuthFailed(format!("HTTP {}", reply.status)));
        }
        match reply.json() {
            Some(value) if accepted(&value) => {}
            Some(value) => return Err(SwitchError::AuthFailed(reason(&value))),
            None if reply.mentions_any(&["success", "login"]) => {}
            None => return Err(SwitchError::AuthFailed("invalid response format".into())),
        }
        info!("authenticated to {} at {}", MODEL, self.base.url());
        Ok(())
    }

    fn fetch(&self, endpoint: &Endpoint) -> Result<Payload> {
        let request = Request::get(self.base.endpoint_url(endpoint.path))
            .header("Accept", ACCEPT_JSON)
            .header("X-Requested-With", "XMLHttpRequest");
        let reply = require_ok(endpoint.path, self.base.send(request)?)?;
        match reply.json() {
            Some(value) if value.get("logout").is_some() => Err(SwitchError::NotAuthenticated),
            Some(value) => Ok(Payload::Json(value)),
            None => Ok(Payload::Text(reply.body)),
        }
    }

    fn summarize(&self, payloads: &BTreeMap<String, Payload>) -> Inventory {
        let mut inventory = Inventory::default();

        if let Some(Payload::Json(value)) = payloads.get("system_info") {
            if let Some(Value::Object(data)) = value.get("data") {
                inventory.system = data
                    .iter()
                    .filter_map(|(key, value)| Some((key.clone(), value_text(value)?)))
                    .collect();
            }
        }

        if let Some(payload) = payloads.get("vlan_config") {
            inventory.vlans = vlans(payload);
        }

        if let Some(payload) = payloads.get("vlan_port") {
            for (port, config) in data_items(payload, "portVlanList") {
                inventory.port_vlans.insert(
                    port,
                    PortVlan {
                        mode: field(config, "mode"),
                        pvid: field(config, "pvid"),
                        membership: field(config, "membership"),
                        forbidden: field(config, "forbidden"),
                        ..PortVlan::default()
                    },
                );
            }
        }

        for (name, kind) in [("mac_dynamic", "dynamic"), ("mac_static", "static")] {
            if let Some(payload) = payloads.get(name) {
                inventory.mac_table.extend(mac_entries(payload, kind));
            }
        }

        inventory
    }

    fn create_vlan(&self, id: u16, name: &str) -> Result<()> {
        validate_vlan_id(id)?;
        self.authenticate()?;

        let mut ids = self.current_vlan_ids()?;
        ids.push(id);
        let reply = self.set_command("vlan_create", format!("vlanList={}", compress_ids(&ids)))?;
        check_set("create_vlan", reply)?;
        info!("created VLAN {} on {}", id, self.base.url());

        let vid = id.to_string();
        let rename = encode_form(&[("vlanId", vid.as_str()), ("vlanName", name)])?;
        let renamed = self
            .set_command("vlan_edit", rename)
            .and_then(|reply| check_set("rename_vlan", reply));
        if let Err(err) = renamed {
            warn!("VLAN {} created but naming it '{}' failed: {}", id, name, err);
        }
        Ok(())
    }

    fn delete_vlan(&self, id: u16) -> Result<()> {
        validate_vlan_id(id)?;
        self.authenticate()?;
        let reply = self.set_command("vlan_del", format!("vlanList={}", id))?;
        check_set("delete_vlan", reply)?;
        info!("deleted VLAN {} on {}", id, self.base.url());
        Ok(())
    }
}
