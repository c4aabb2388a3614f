use serde::Deserialize;
use std::{fs, path::Path};

use crate::core::{BroadcasterBuilder, DeliveryMode};

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct BroadcasterSettings {
    pub delivery_mode: DeliveryMode,
}

impl BroadcasterSettings {
    /// Builder preconfigured from these settings.
    pub fn builder(&self) -> BroadcasterBuilder {
        BroadcasterBuilder::new().delivery_mode(self.delivery_mode)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct WorkloadConfig {
    pub publishers: usize,
    pub subscribers: usize,
    pub messages_per_publisher: usize,
    /// Every n-th subscriber disposes its subscription halfway through the run.
    pub unsubscribe_every: Option<usize>,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            publishers: 2,
            subscribers: 4,
            messages_per_publisher: 1000,
            unsubscribe_every: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub broadcaster: BroadcasterSettings,
    pub workload: WorkloadConfig,
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, anyhow::Error> {
    let raw: String = fs::read_to_string(path)?;
    parse_config(&raw)
}

pub fn parse_config(raw: &str) -> Result<Config, anyhow::Error> {
    let config: Config = toml::from_str(raw)?;
    Ok(config)
}
