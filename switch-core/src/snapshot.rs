use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{Inventory, Payload};

/// Everything one extraction run pulled from a switch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub model: String,
    pub url: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub endpoints: BTreeMap<String, Payload>,
    #[serde(default)]
    pub failed: Vec<String>,
    pub inventory: Inventory,
}

impl Snapshot {
    pub fn new(model: &str, url: &str) -> Self {
        Self {
            model: model.to_string(),
            url: url.to_string(),
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            error: None,
            endpoints: BTreeMap::new(),
            failed: Vec::new(),
            inventory: Inventory::default(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Write the snapshot as pretty JSON to
    /// `dir/<prefix>_<model>_<YYYYmmdd_HHMMSS>.json`.
    pub fn export(&self, dir: &Path, prefix: &str) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let name = format!(
            "{}_{}_{}.json",
            prefix,
            self.model,
            Local::now().format("%Y%m%d_%H%M%S")
        );
        let path = dir.join(name);
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(path)
    }
}
