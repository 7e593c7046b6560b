use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, SwitchError};

/// What an admin page holds, independent of how a given model renders it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageKind {
    SystemInfo,
    Homepage,
    CpuMemory,
    PortCount,
    PortStatus,
    PortStatistics,
    PortConfig,
    PortBandwidth,
    Panel,
    LinkAggregation,
    Syslog,
    Vlans,
    PortVlans,
    MacTable,
    StaticMacTable,
    MacStatus,
    ArpTable,
    IpSettings,
    UserAccounts,
    Status,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub name: &'static str,
    pub path: &'static str,
    pub kind: PageKind,
}

impl Endpoint {
    pub const fn new(name: &'static str, path: &'static str, kind: PageKind) -> Self {
        Self { name, path, kind }
    }
}

/// Parsed body of a single endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Payload {
    Json(Value),
    Fields(BTreeMap<String, String>),
    Records(Vec<BTreeMap<String, String>>),
    Vlans(Vec<Vlan>),
    MacTable(Vec<MacEntry>),
    Homepage {
        device_info: BTreeMap<String, String>,
        ports: Vec<BTreeMap<String, String>>,
    },
    Text(String),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Up,
    Down,
    #[default]
    Unknown,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Duplex {
    Auto,
    Full,
    Half,
    #[default]
    Unknown,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub port_id: String,
    pub port_number: u32,
    pub status: LinkState,
    pub enabled: bool,
    pub speed: String,
    pub duplex: Duplex,
    pub auto_negotiation: bool,
    pub flow_control: bool,
    #[serde(default)]
    pub media_type: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vlan {
    pub id: u16,
    pub name: String,
    /// Member ports as the switch prints them, e.g. `1-4,8`.
    #[serde(default)]
    pub ports: Option<String>,
    #[serde(default)]
    pub untagged: Option<String>,
    #[serde(default)]
    pub tagged: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortVlan {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub pvid: Option<String>,
    #[serde(default)]
    pub membership: Option<String>,
    #[serde(default)]
    pub forbidden: Option<String>,
    #[serde(default)]
    pub tagged: Vec<u16>,
    #[serde(default)]
    pub untagged: Vec<u16>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacEntry {
    pub mac: String,
    pub vlan: String,
    pub port: String,
    pub kind: String,
    #[serde(default)]
    pub vendor: Option<String>,
}

impl MacEntry {
    pub fn new(mac: &str, vlan: &str, port: &str, kind: &str) -> Self {
        Self {
            mac: mac.to_string(),
            vlan: vlan.to_string(),
            port: port.to_string(),
            kind: kind.to_string(),
            vendor: None,
        }
    }
}

/// Normalized view of a switch, whatever its web interface looks like.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub system: BTreeMap<String, String>,
    pub ports: Vec<Port>,
    pub vlans: Vec<Vlan>,
    pub port_vlans: BTreeMap<String, PortVlan>,
    pub mac_table: Vec<MacEntry>,
}

pub const MAX_VLAN_ID: u16 = 4094;

pub fn validate_vlan_id(id: u16) -> Result<()> {
    if (1..=MAX_VLAN_ID).contains(&id) {
        Ok(())
    } else {
        Err(SwitchError::InvalidVlan(id))
    }
}

pub fn normalize_speed(speed: &str) -> String {
    if speed.contains("10G") {
        "10G".to_string()
    } else if speed.contains("2500") {
        "2.5G".to_string()
    } else if speed.contains("1000") {
        "1G".to_string()
    } else if speed.contains("100") {
        "100M".to_string()
    } else if speed.contains("10") {
        "10M".to_string()
    } else if speed.contains("Link Down") {
        "Down".to_string()
    } else {
        speed.to_string()
    }
}

pub fn normalize_duplex(duplex: &str) -> Duplex {
    let lower = duplex.to_lowercase();
    if lower == "auto" {
        Duplex::Auto
    } else if lower.contains("full") {
        Duplex::Full
    } else if lower.contains("half") {
        Duplex::Half
    } else {
        Duplex::Unknown
    }
}

/// Link state from an "actual speed" cell such as `1000Full` or `Link Down`.
pub fn link_state(actual_speed: &str) -> LinkState {
    let lower = actual_speed.trim().to_lowercase();
    if lower.is_empty() {
        LinkState::Unknown
    } else if lower.contains("down") {
        LinkState::Down
    } else {
        LinkState::Up
    }
}

/// Trailing number of a port label (`Port 7` → 7), 0 when there is none.
pub fn port_number(port_id: &str) -> u32 {
    port_id
        .split_whitespace()
        .last()
        .and_then(|token| token.parse().ok())
        .unwrap_or(0)
}

/// Highest port number a member list may name.
pub const MAX_PORT: u32 = MAX_VLAN_ID as u32;

/// Expand a member list such as `1,3,5-8`. Malformed pieces, reversed ranges
/// and anything above [`MAX_PORT`] are skipped.
pub fn parse_port_list(list: &str) -> Vec<u32> {
    let mut ports = Vec::new();
    for piece in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match piece.split_once('-') {
            Some((start, end)) => {
                if let (Ok(start), Ok(end)) = (start.trim().parse::<u32>(), end.trim().parse::<u32>()) {
                    if start <= end && end <= MAX_PORT {
                        ports.extend(start..=end);
                    }
                }
            }
            None => {
                if let Ok(port) = piece.parse::<u32>() {
                    if port <= MAX_PORT {
                        ports.push(port);
                    }
                }
            }
        }
    }
    ports
}

/// Inverse of [`parse_port_list`] for VLAN ids: `[1, 105, 106, 110]` → `1,105-106,110`.
pub fn compress_ids(ids: &[u16]) -> String {
    let mut sorted = ids.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut parts = Vec::new();
    let mut iter = sorted.into_iter().peekable();
    while let Some(start) = iter.next() {
        let mut end = start;
        while let Some(&next) = iter.peek() {
            if end.checked_add(1) != Some(next) {
                break;
            }
            end = next;
            iter.next();
        }
        if start == end {
            parts.push(start.to_string());
        } else {
            parts.push(format!("{}-{}", start, end));
        }
    }
    parts.join(",")
}

/// Render a JSON scalar the way it would show up in a table cell.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speeds_normalize_from_most_specific() {
        assert_eq!(normalize_speed("10GFull"), "10G");
        assert_eq!(normalize_speed("2500Full"), "2.5G");
        assert_eq!(normalize_speed("1000Full"), "1G");
        assert_eq!(normalize_speed("100Half"), "100M");
        assert_eq!(normalize_speed("10Full"), "10M");
        assert_eq!(normalize_speed("Link Down"), "Down");
        assert_eq!(normalize_speed("Auto"), "Auto");
    }

    #[test]
    fn duplex_and_link_state() {
        assert_eq!(normalize_duplex("Auto"), Duplex::Auto);
        assert_eq!(normalize_duplex("1000Full"), Duplex::Full);
        assert_eq!(normalize_duplex("10Half"), Duplex::Half);
        assert_eq!(normalize_duplex("-"), Duplex::Unknown);
        assert_eq!(link_state("1000Full"), LinkState::Up);
        assert_eq!(link_state("Link Down"), LinkState::Down);
        assert_eq!(link_state(""), LinkState::Unknown);
    }

    #[test]
    fn port_lists_expand_and_compress() {
        assert_eq!(parse_port_list("1, 3,5-7,x,9-"), vec![1, 3, 5, 6, 7]);
        assert_eq!(port_number("Port 12"), 12);
        assert_eq!(port_number("uplink"), 0);
        assert_eq!(compress_ids(&[110, 1, 106, 105, 105, 120]), "1,105-106,110,120");
        assert_eq!(compress_ids(&[]), "");
    }

    #[test]
    fn oversized_and_reversed_ranges_are_dropped() {
        assert!(parse_port_list("1-4294967295").is_empty());
        assert!(parse_port_list("1-50000000").is_empty());
        assert_eq!(parse_port_list("8-5,2,70000,4090-4094"), vec![2, 4090, 4091, 4092, 4093, 4094]);
    }

    #[test]
    fn vlan_ids_are_bounded() {
        assert!(validate_vlan_id(1).is_ok());
        assert!(validate_vlan_id(4094).is_ok());
        assert!(validate_vlan_id(0).is_err());
        assert!(validate_vlan_id(4095).is_err());
    }
}
