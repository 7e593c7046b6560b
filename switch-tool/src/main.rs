use anyhow::{anyhow, bail, Context, Result};
use directories::ProjectDirs;
use keyring::Entry;
use log::{error, info, warn};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use switch_core::{
    connect_with_detection, copy_vlans, detect_switch_model, list_models, SwitchAdapter,
    SwitchConfig,
};

const KEYRING_SERVICE: &str = "switch_tool";

#[derive(Clone, Debug, Deserialize)]
struct SwitchEntry {
    name: String,
    url: String,
    username: String,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
struct MigrationEntry {
    source: String,
    dest: String,
    #[serde(default = "default_pause_ms")]
    pause_ms: u64,
}

fn default_pause_ms() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ToolConfig {
    #[serde(default)]
    switches: Vec<SwitchEntry>,
    #[serde(default)]
    export_dir: Option<PathBuf>,
    #[serde(default)]
    migrations: Vec<MigrationEntry>,
    #[serde(default)]
    mac_lookup_delay_ms: Option<u64>,
    #[serde(default = "default_true")]
    resolve_vendors: bool,
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("net", "switchscrape", "SwitchTool")
}

fn config_path() -> PathBuf {
    let dir = project_dirs()
        .map(|d| d.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));
    if let Err(err) = fs::create_dir_all(&dir) {
        warn!("Failed to create config dir: {err}");
    }
    dir.join("switches.json")
}

fn load_config() -> Result<ToolConfig> {
    let path = config_path();
    let data = fs::read_to_string(&path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    parse_config(&data).with_context(|| format!("invalid config in {}", path.display()))
}

fn parse_config(data: &str) -> Result<ToolConfig> {
    Ok(serde_json::from_str(data)?)
}

fn export_dir(config: &ToolConfig) -> PathBuf {
    config.export_dir.clone().unwrap_or_else(|| {
        project_dirs()
            .map(|d| d.data_dir().join("snapshots"))
            .unwrap_or_else(|| PathBuf::from("snapshots"))
    })
}

fn get_password(name: &str) -> Option<String> {
    let entry = Entry::new(KEYRING_SERVICE, name).ok()?;
    entry.get_password().ok()
}

fn switch_config(config: &ToolConfig, entry: &SwitchEntry) -> Result<SwitchConfig> {
    let password = get_password(&entry.name)
        .ok_or_else(|| anyhow!("no password stored for {} in the keyring", entry.name))?;
    let mut switch = SwitchConfig::new(&entry.url, &entry.username, &password)
        .resolve_vendors(config.resolve_vendors);
    if let Some(delay) = config.mac_lookup_delay_ms {
        switch = switch.mac_lookup_delay(Duration::from_millis(delay));
    }
    Ok(switch)
}

fn connect(config: &ToolConfig, entry: &SwitchEntry) -> Result<Box<dyn SwitchAdapter>> {
    let switch = switch_config(config, entry)?;
    let adapter = match entry.model.as_deref() {
        Some(model) => switch_core::create(model, &switch)?,
        None => connect_with_detection(&switch, None)?,
    };
    Ok(adapter)
}

fn find_switch<'a>(config: &'a ToolConfig, name: &str) -> Result<&'a SwitchEntry> {
    config
        .switches
        .iter()
        .find(|entry| entry.name == name)
        .ok_or_else(|| anyhow!("switch {name} is not in the config"))
}

fn extract(config: &ToolConfig) -> Result<()> {
    let dir = export_dir(config);
    for entry in &config.switches {
        let adapter = match connect(config, entry) {
            Ok(adapter) => adapter,
            Err(err) => {
                error!("{}: {err:#}", entry.name);
                continue;
            }
        };
        let snapshot = adapter.extract_all();
        if let Some(reason) = &snapshot.error {
            error!("{}: {reason}", entry.name);
            continue;
        }
        let path = snapshot.export(&dir, &entry.name)?;
        info!(
            "{}: {} ports, {} VLANs, {} MAC entries, {} failed endpoints -> {}",
            entry.name,
            snapshot.inventory.ports.len(),
            snapshot.inventory.vlans.len(),
            snapshot.inventory.mac_table.len(),
            snapshot.failed.len(),
            path.display()
        );
    }
    Ok(())
}

fn detect(config: &ToolConfig) -> Result<()> {
    for entry in &config.switches {
        match detect_switch_model(&entry.url)? {
            Some(model) => println!("{}\t{}\t{}", entry.name, entry.url, model),
            None => println!("{}\t{}\tunknown", entry.name, entry.url),
        }
    }
    Ok(())
}

fn migrate(config: &ToolConfig) -> Result<()> {
    if config.migrations.is_empty() {
        warn!("no migrations configured");
    }
    for migration in &config.migrations {
        let source = connect(config, find_switch(config, &migration.source)?)?;
        let dest = connect(config, find_switch(config, &migration.dest)?)?;
        let report = copy_vlans(
            &*source,
            &*dest,
            Duration::from_millis(migration.pause_ms),
        )?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        if !report.is_complete() {
            warn!(
                "{} -> {}: {} VLANs need manual configuration",
                migration.source,
                migration.dest,
                report.failed.len()
            );
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let action = std::env::args().nth(1).unwrap_or_else(|| "extract".to_string());
    match action.as_str() {
        "models" => {
            for model in list_models() {
                println!("{model}");
            }
            Ok(())
        }
        "extract" => extract(&load_config()?),
        "detect" => detect(&load_config()?),
        "migrate" => migrate(&load_config()?),
        other => bail!("unknown action {other}; expected extract, models, detect or migrate"),
    }
}
