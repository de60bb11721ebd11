// Containership Firewall - Configuration
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Daemon settings loaded from a local JSON file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{Role, RuleTemplate};

/// Inclusive port range handed out by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub min_port: u16,
    pub max_port: u16,
}

impl PortRange {
    fn validate(&self, name: &str) -> Result<()> {
        if self.min_port > self.max_port {
            bail!(
                "{} port range is inverted: {}:{}",
                name,
                self.min_port,
                self.max_port
            );
        }
        Ok(())
    }
}

/// Which roles receive cloud-pushed rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudScope {
    #[default]
    Followers,
    Leaders,
    All,
}

impl CloudScope {
    pub fn includes(&self, role: Role) -> bool {
        match self {
            Self::Followers => !role.is_leader(),
            Self::Leaders => role.is_leader(),
            Self::All => true,
        }
    }
}

/// Cloud policy integration settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudSettings {
    #[serde(default)]
    pub enabled: bool,
    /// Control-plane address range allowed to reach the management API.
    #[serde(default = "default_whitelist")]
    pub whitelist: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub cluster_id: String,
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub applies_to: CloudScope,
}

fn default_whitelist() -> String { "52.70.63.225/28".to_string() }
fn default_base_url() -> String { "https://api.containership.io".to_string() }
fn default_credentials_path() -> PathBuf { PathBuf::from("/etc/containership/cloud.json") }
fn default_timeout_ms() -> u64 { 10_000 }

impl Default for CloudSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            whitelist: default_whitelist(),
            base_url: default_base_url(),
            cluster_id: String::new(),
            credentials_path: default_credentials_path(),
            timeout_ms: default_timeout_ms(),
            applies_to: CloudScope::default(),
        }
    }
}

impl CloudSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Packet-filter backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Iptables,
    Firewalld,
}

/// Daemon settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirewallSettings {
    /// Managed chain, fully replaced on every pass.
    #[serde(default = "default_chain")]
    pub chain: String,
    /// Primary inbound chain; its policy and jump rule are set once at reset.
    #[serde(default = "default_input_chain")]
    pub input_chain: String,
    /// Milliseconds between passes.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
    /// Node role. Fixed for the lifetime of the process.
    #[serde(default)]
    pub mode: Role,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_cluster_ports")]
    pub cluster_ports: Vec<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_interface: Option<String>,
    /// Address scope used for per-peer cluster-communication rules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_scope: Option<String>,
    #[serde(default = "default_loadbalancer")]
    pub loadbalancer: PortRange,
    #[serde(default = "default_container")]
    pub container: PortRange,
    #[serde(default)]
    pub initial_rules: Vec<RuleTemplate>,
    #[serde(default)]
    pub cloud: CloudSettings,
    #[serde(default = "default_peers_path")]
    pub peers_path: PathBuf,
    #[serde(default)]
    pub backend: BackendKind,
}

fn default_chain() -> String { "ContainerShip".to_string() }
fn default_input_chain() -> String { "INPUT".to_string() }
fn default_refresh_interval() -> u64 { 60_000 }
fn default_api_port() -> u16 { 8080 }
fn default_cluster_ports() -> Vec<u16> { vec![2666, 2777] }
fn default_loadbalancer() -> PortRange { PortRange { min_port: 10000, max_port: 11023 } }
fn default_container() -> PortRange { PortRange { min_port: 11024, max_port: 22511 } }
fn default_peers_path() -> PathBuf { PathBuf::from("/var/lib/containership/peers.json") }

/// Shortest accepted refresh interval.
const MIN_REFRESH_INTERVAL_MS: u64 = 1_000;

impl Default for FirewallSettings {
    fn default() -> Self {
        Self {
            chain: default_chain(),
            input_chain: default_input_chain(),
            refresh_interval: default_refresh_interval(),
            mode: Role::default(),
            api_port: default_api_port(),
            cluster_ports: default_cluster_ports(),
            cluster_interface: None,
            cluster_scope: None,
            loadbalancer: default_loadbalancer(),
            container: default_container(),
            initial_rules: Vec::new(),
            cloud: CloudSettings::default(),
            peers_path: default_peers_path(),
            backend: BackendKind::default(),
        }
    }
}

impl FirewallSettings {
    /// Default settings file location.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/etc"))
            .join("containership")
            .join("firewall.json")
    }

    /// Load settings.
    ///
    /// An explicitly given path must exist and parse. The default path is
    /// optional: a missing or unreadable default file falls back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let path = Self::default_path();
                if !path.exists() {
                    debug!("No settings file at {}, using defaults", path.display());
                    return Ok(Self::default());
                }
                match Self::from_file(&path) {
                    Ok(settings) => Ok(settings),
                    Err(e) => {
                        warn!("Failed to load settings: {:#}", e);
                        Ok(Self::default())
                    }
                }
            }
        }
    }

    /// Read and parse a settings file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let settings: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))?;
        settings
            .validate()
            .with_context(|| format!("Invalid settings file {}", path.display()))?;
        Ok(settings)
    }

    /// Reject values that would make every apply fail.
    pub fn validate(&self) -> Result<()> {
        self.loadbalancer.validate("loadbalancer")?;
        self.container.validate("container")?;
        Ok(())
    }

    /// Interval between reconciliation passes, clamped to one second.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval.max(MIN_REFRESH_INTERVAL_MS))
    }
}
