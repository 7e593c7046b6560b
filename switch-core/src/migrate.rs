//! Copying VLAN definitions from one switch to another.

use std::collections::BTreeSet;
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;

use crate::adapter::SwitchAdapter;
use crate::error::{Result, SwitchError};

/// VLAN 1 exists on every switch and is never copied.
const DEFAULT_VLAN: u16 = 1;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub created: Vec<u16>,
    pub skipped: Vec<u16>,
    pub failed: Vec<(u16, String)>,
    pub saved: bool,
}

impl MigrationReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Create on `dest` every VLAN of `source` it lacks, waiting `pause`
/// between creations. The destination configuration is saved when anything
/// was created and the model supports it.
pub fn copy_vlans(
    source: &dyn SwitchAdapter,
    dest: &dyn SwitchAdapter,
    pause: Duration,
) -> Result<MigrationReport> {
    let wanted = source.list_vlans()?;
    let existing: BTreeSet<u16> = dest.list_vlans()?.iter().map(|vlan| vlan.id).collect();
    info!(
        "copying {} VLANs from {} to {} ({} already present)",
        wanted.len(),
        source.model_name(),
        dest.model_name(),
        existing.len()
    );

    let mut report = MigrationReport::default();
    for vlan in wanted {
        if vlan.id == DEFAULT_VLAN || existing.contains(&vlan.id) {
            debug!("VLAN {} already on {}", vlan.id, dest.model_name());
            report.skipped.push(vlan.id);
            continue;
        }
        if !report.created.is_empty() || !report.failed.is_empty() {
            thread::sleep(pause);
        }
        match dest.create_vlan(vlan.id, &vlan.name) {
            Ok(()) => report.created.push(vlan.id),
            Err(err) => {
                warn!("could not create VLAN {} '{}': {}", vlan.id, vlan.name, err);
                report.failed.push((vlan.id, err.to_string()));
            }
        }
    }

    if !report.created.is_empty() {
        match dest.save_configuration() {
            Ok(()) => report.saved = true,
            Err(SwitchError::Unsupported { .. }) => {
                debug!("{} keeps changes without an explicit save", dest.model_name())
            }
            Err(err) => warn!("could not save configuration on {}: {}", dest.model_name(), err),
        }
    }

    info!(
        "migration finished: {} created, {} skipped, {} failed",
        report.created.len(),
        report.skipped.len(),
        report.failed.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::adapter::{SwitchBase, SwitchConfig};
    use crate::model::{Endpoint, Vlan};
    use crate::session::testing::ScriptedTransport;

    struct Lab {
        base: SwitchBase,
        vlans: Mutex<Vec<Vlan>>,
        refuse: Option<u16>,
        saves: Mutex<u32>,
    }

    impl Lab {
        fn new(ids: &[u16], refuse: Option<u16>) -> Self {
            let config = SwitchConfig::new("10.41.8.50", "admin", "admin");
            let vlans = ids
                .iter()
                .map(|&id| Vlan {
                    id,
                    name: format!("VLAN{:04}", id),
                    ..Vlan::default()
                })
                .collect();
            Self {
                base: SwitchBase::with_transport(&config, ScriptedTransport::new()),
                vlans: Mutex::new(vlans),
                refuse,
                saves: Mutex::new(0),
            }
        }

        fn ids(&self) -> Vec<u16> {
            self.vlans.lock().unwrap().iter().map(|vlan| vlan.id).collect()
        }
    }

    impl SwitchAdapter for Lab {
        fn model_name(&self) -> &'static str {
            "LAB-8"
        }

        fn endpoints(&self) -> &'static [Endpoint] {
            &[]
        }

        fn login_endpoint(&self) -> &'static str {
            "login.cgi"
        }

        fn base(&self) -> &SwitchBase {
            &self.base
        }

        fn authenticate(&self) -> Result<()> {
            Ok(())
        }

        fn list_vlans(&self) -> Result<Vec<Vlan>> {
            Ok(self.vlans.lock().unwrap().clone())
        }

        fn create_vlan(&self, id: u16, name: &str) -> Result<()> {
            if self.refuse == Some(id) {
                return Err(SwitchError::OperationFailed {
                    operation: "create_vlan",
                    model: "LAB-8",
                    reason: "HTTP 500".into(),
                });
            }
            self.vlans.lock().unwrap().push(Vlan {
                id,
                name: name.to_string(),
                ..Vlan::default()
            });
            Ok(())
        }

        fn save_configuration(&self) -> Result<()> {
            *self.saves.lock().unwrap() += 1;
            Ok(())
        }
    }

    #[test]
    fn copies_missing_vlans_only() {
        let source = Lab::new(&[1, 105, 106, 120], None);
        let dest = Lab::new(&[1, 106], None);
        let report = copy_vlans(&source, &dest, Duration::ZERO).unwrap();

        assert_eq!(report.created, vec![105, 120]);
        assert_eq!(report.skipped, vec![1, 106]);
        assert!(report.is_complete());
        assert!(report.saved);
        assert_eq!(dest.ids(), vec![1, 106, 105, 120]);
        assert_eq!(dest.vlans.lock().unwrap()[2].name, "VLAN0105");
        assert_eq!(*dest.saves.lock().unwrap(), 1);
    }

    #[test]
    fn failures_are_reported_and_do_not_stop_the_copy() {
        let source = Lab::new(&[1, 105, 106, 120], None);
        let dest = Lab::new(&[1], Some(106));
        let report = copy_vlans(&source, &dest, Duration::ZERO).unwrap();

        assert_eq!(report.created, vec![105, 120]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 106);
        assert!(report.failed[0].1.contains("HTTP 500"));
        assert!(!report.is_complete());
    }

    #[test]
    fn nothing_to_do_skips_the_save() {
        let source = Lab::new(&[1, 105], None);
        let dest = Lab::new(&[1, 105], None);
        let report = copy_vlans(&source, &dest, Duration::ZERO).unwrap();
        assert!(report.created.is_empty());
        assert!(!report.saved);
        assert_eq!(*dest.saves.lock().unwrap(), 0);
    }
}
