//! Table parsers and form helpers shared by the HTML-based models.
//!
//! The SL-SWTG series serve the same `*.cgi` page family behind an MD5
//! `admin` cookie, so their VLAN forms live here as well.

use std::collections::BTreeMap;

use log::info;

use crate::adapter::SwitchBase;
use crate::error::{Result, SwitchError};
use crate::html::{is_number, record, Page};
use crate::model::{parse_port_list, MacEntry, PortVlan, Vlan};
use crate::session::{Body, Request, FORM_CONTENT_TYPE};

pub(crate) const VLAN_STATIC: &str = "vlan.cgi?page=static";
pub(crate) const VLAN_REMOVE: &str = "vlan.cgi?page=getRmvVlanEntry";

pub(crate) fn form(fields: &[(&str, &str)]) -> Body {
    Body::Form(
        fields
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect(),
    )
}

/// Key/value pairs from the rows of the first table.
pub(crate) fn first_table_fields(page: &Page) -> BTreeMap<String, String> {
    page.first_table_rows()
        .into_iter()
        .filter(|cells| cells.len() >= 2)
        .map(|cells| (cells[0].clone(), cells[1].clone()))
        .collect()
}

/// Key/value pairs from every data row where both sides are filled in.
pub(crate) fn filled_fields(page: &Page) -> BTreeMap<String, String> {
    page.rows()
        .into_iter()
        .filter(|cells| cells.len() >= 2 && !cells[0].is_empty() && !cells[1].is_empty())
        .map(|cells| (cells[0].clone(), cells[1].clone()))
        .collect()
}

/// Rows with at least `min_cells` data cells, named by `columns`. Header rows
/// rendered as `td` (first cell reads `Port`) are dropped.
pub(crate) fn port_records(
    page: &Page,
    columns: &[&str],
    min_cells: usize,
) -> Vec<BTreeMap<String, String>> {
    page.rows()
        .into_iter()
        .filter(|cells| cells.len() >= min_cells)
        .filter(|cells| !cells[0].eq_ignore_ascii_case("port"))
        .map(|cells| record(columns, &cells))
        .collect()
}

/// `id, name[, ports]` rows; rows whose id is not a number are headers.
pub(crate) fn vlan_rows(page: &Page) -> Vec<Vlan> {
    page.rows()
        .into_iter()
        .filter(|cells| cells.len() >= 2 && is_number(&cells[0]))
        .filter_map(|cells| {
            Some(Vlan {
                id: cells[0].parse().ok()?,
                name: cells[1].clone(),
                ports: cells.get(2).cloned(),
                ..Vlan::default()
            })
        })
        .collect()
}

pub(crate) struct MacColumns {
    pub min_cells: usize,
    pub mac: usize,
    pub vlan: usize,
    pub port: usize,
    pub kind: Option<usize>,
}

/// MAC table rows, recognised by a numeric index in the first cell.
pub(crate) fn mac_rows(page: &Page, columns: &MacColumns, default_kind: &str) -> Vec<MacEntry> {
    page.rows()
        .into_iter()
        .filter(|cells| cells.len() >= columns.min_cells && is_number(&cells[0]))
        .map(|cells| {
            let kind = columns
                .kind
                .and_then(|index| cells.get(index))
                .map_or(default_kind, String::as_str);
            MacEntry::new(
                &cells[columns.mac],
                &cells[columns.vlan],
                &cells[columns.port],
                kind,
            )
        })
        .collect()
}

/// Untagged membership per `Port N`, derived from VLAN member lists.
pub(crate) fn untagged_assignments(vlans: &[Vlan]) -> BTreeMap<String, PortVlan> {
    let mut assignments: BTreeMap<String, PortVlan> = BTreeMap::new();
    for vlan in vlans {
        let Some(ports) = vlan.ports.as_deref() else {
            continue;
        };
        for port in parse_port_list(ports) {
            assignments
                .entry(format!("Port {}", port))
                .or_default()
                .untagged
                .push(vlan.id);
        }
    }
    assignments
}

pub(crate) fn is_enabled(state: &str) -> bool {
    state.eq_ignore_ascii_case("enable")
}

pub(crate) fn is_on(flag: &str) -> bool {
    flag.eq_ignore_ascii_case("on")
}

/// Create a static VLAN with `ports` member ports all untagged.
pub(crate) fn submit_vlan(
    base: &SwitchBase,
    model: &'static str,
    ports: usize,
    id: u16,
    name: &str,
) -> Result<()> {
    let mut fields = vec![
        ("vid".to_string(), id.to_string()),
        ("name".to_string(), name.to_string()),
    ];
    fields.extend((0..ports).map(|port| (format!("vlanPort_{}", port), "0".to_string())));
    fields.push(("cmd".to_string(), "vlanstatic".to_string()));

    let referer = base.endpoint_url(VLAN_STATIC);
    let request = Request::post(referer.clone(), Body::Form(fields))
        .browser(referer)
        .header("Content-Type", FORM_CONTENT_TYPE);
    let reply = base.send(request)?;
    if reply.is_ok() && reply.mentions_any(&["success", "vlan"]) {
        info!("created VLAN {} '{}' on {}", id, name, base.url());
        Ok(())
    } else {
        Err(rejected("create_vlan", model, reply.status, &reply.body))
    }
}

pub(crate) fn remove_vlan(base: &SwitchBase, model: &'static str, id: u16) -> Result<()> {
    let checkbox = format!("remove_{}", id);
    let request = Request::post(
        base.endpoint_url(VLAN_REMOVE),
        form(&[(checkbox.as_str(), "on"), ("cmd", "vlanstatictbl")]),
    )
    .browser(base.endpoint_url(VLAN_STATIC))
    .header("Content-Type", FORM_CONTENT_TYPE);
    let reply = base.send(request)?;
    if reply.is_ok() && reply.mentions_any(&["success", "deleted"]) {
        info!("deleted VLAN {} on {}", id, base.url());
        Ok(())
    } else {
        Err(rejected("delete_vlan", model, reply.status, &reply.body))
    }
}

pub(crate) fn rejected(
    operation: &'static str,
    model: &'static str,
    status: u16,
    body: &str,
) -> SwitchError {
    let reason = if status == 200 {
        let excerpt: String = body.chars().take(200).collect();
        format!("unexpected response: {}", excerpt.trim())
    } else {
        format!("HTTP {}", status)
    };
    SwitchError::OperationFailed {
        operation,
        model,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VLAN_PAGE: &str = r#"
        <table>
          <tr><td>VLAN ID</td><td>VLAN Name</td><td>Member Ports</td></tr>
          <tr><td>1</td><td>default</td><td>1-4,6</td></tr>
          <tr><td>110</td><td>Management</td><td>3,5</td></tr>
          <tr><td>x9</td><td>bogus</td></tr>
        </table>"#;

    #[test]
    fn vlan_rows_skip_headers() {
        let vlans = vlan_rows(&Page::parse(VLAN_PAGE));
        assert_eq!(vlans.len(), 2);
        assert_eq!(vlans[1].id, 110);
        assert_eq!(vlans[1].ports.as_deref(), Some("3,5"));
    }

    #[test]
    fn untagged_membership_follows_member_lists() {
        let assignments = untagged_assignments(&vlan_rows(&Page::parse(VLAN_PAGE)));
        assert_eq!(assignments["Port 3"].untagged, vec![1, 110]);
        assert_eq!(assignments["Port 6"].untagged, vec![1]);
        assert!(!assignments.contains_key("Port 7"));
    }

    #[test]
    fn mac_rows_need_numeric_index() {
        let page = Page::parse(
            r#"<table>
                 <tr><td>No.</td><td>MAC</td><td>VLAN</td><td>Type</td><td>Port</td></tr>
                 <tr><td>1</td><td>24:5A:4C:11:22:33</td><td>110</td><td>Dynamic</td><td>3</td></tr>
               </table>"#,
        );
        let columns = MacColumns {
            min_cells: 5,
            mac: 1,
            vlan: 2,
            port: 4,
            kind: Some(3),
        };
        let entries = mac_rows(&page, &columns, "dynamic");
        assert_eq!(entries, vec![MacEntry::new("24:5A:4C:11:22:33", "110", "3", "Dynamic")]);
    }

    #[test]
    fn rejection_quotes_body_excerpt() {
        let err = rejected("create_vlan", "SL-SWTG124AS", 200, "  <html>error</html>");
        assert_eq!(
            err.to_string(),
            "create_vlan failed on SL-SWTG124AS: unexpected response: <html>error</html>"
        );
        let err = rejected("delete_vlan", "SL-SWTG124AS", 500, "");
        assert!(err.to_string().ends_with("HTTP 500"));
    }
}
