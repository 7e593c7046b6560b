//! Global model registry mapping model names to adapter constructors.

use std::sync::{PoisonError, RwLock};

use once_cell::sync::Lazy;

use crate::adapter::{SwitchAdapter, SwitchConfig};
use crate::error::{Result, SwitchError};
use crate::models::{Binardat10G08, SlSwtg124As, SlSwtgw218As, VmS1000800Ms};

/// Builds a boxed adapter for one model.
pub type Factory = fn(&SwitchConfig) -> Result<Box<dyn SwitchAdapter>>;

/// Key used when nothing better is known about a switch.
pub const DEFAULT_MODEL: &str = "default";

static REGISTRY: Lazy<RwLock<ModelRegistry>> = Lazy::new(|| {
    let mut registry = ModelRegistry::new();
    registry.register_builtin_models();
    RwLock::new(registry)
});

fn vm_s100(config: &SwitchConfig) -> Result<Box<dyn SwitchAdapter>> {
    Ok(Box::new(VmS1000800Ms::new(config)?))
}

fn sl_swtg124as(config: &SwitchConfig) -> Result<Box<dyn SwitchAdapter>> {
    Ok(Box::new(SlSwtg124As::new(config)?))
}

fn sl_swtgw218as(config: &SwitchConfig) -> Result<Box<dyn SwitchAdapter>> {
    Ok(Box::new(SlSwtgw218As::new(config)?))
}

fn binardat(config: &SwitchConfig) -> Result<Box<dyn SwitchAdapter>> {
    Ok(Box::new(Binardat10G08::new(config)?))
}

/// Model keys in registration order. Lookups ignore case.
#[derive(Default)]
pub struct ModelRegistry {
    models: Vec<(String, Factory)>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn global() -> &'static RwLock<ModelRegistry> {
        &REGISTRY
    }

    fn register_builtin_models(&mut self) {
        let builtin: [(&str, Factory); 10] = [
            ("vm-s100-0800ms", vm_s100),
            ("vms1000800ms", vm_s100),
            ("sl-swtg124as", sl_swtg124as),
            ("slswtg124as", sl_swtg124as),
            ("sl-swtgw218as", sl_swtgw218as),
            ("slswtgw218as", sl_swtgw218as),
            ("10g08-0800gsm", binardat),
            ("binardat-10g08-0800gsm", binardat),
            ("binardat", binardat),
            (DEFAULT_MODEL, vm_s100),
        ];
        for (key, factory) in builtin {
            self.models.push((key.to_string(), factory));
        }
    }

    pub fn register(&mut self, key: &str, factory: Factory) -> Result<()> {
        let key = key.to_lowercase();
        if self.contains(&key) {
            return Err(SwitchError::AlreadyRegistered(key));
        }
        self.models.push((key, factory));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Factory> {
        let key = name.to_lowercase();
        self.models
            .iter()
            .find(|(candidate, _)| *candidate == key)
            .map(|(_, factory)| *factory)
            .ok_or_else(|| SwitchError::UnknownModel {
                name: name.to_string(),
                available: self.names(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        let key = name.to_lowercase();
        self.models.iter().any(|(candidate, _)| *candidate == key)
    }

    pub fn names(&self) -> Vec<String> {
        self.models.iter().map(|(key, _)| key.clone()).collect()
    }
}

/// Constructor registered under `name`.
pub fn get_model(name: &str) -> Result<Factory> {
    ModelRegistry::global()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name)
}

pub fn list_models() -> Vec<String> {
    ModelRegistry::global()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .names()
}

pub fn register(key: &str, factory: Factory) -> Result<()> {
    ModelRegistry::global()
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .register(key, factory)
}

/// Build the adapter registered under `name` for the switch in `config`.
pub fn create(name: &str, config: &SwitchConfig) -> Result<Box<dyn SwitchAdapter>> {
    let factory = get_model(name)?;
    factory(config)
}
