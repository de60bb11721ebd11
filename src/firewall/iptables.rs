// Containership Firewall - iptables Backend
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Backend driving `iptables` and `iptables-restore`.

use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{anyhow, Context, Result};
use tracing::debug;

use super::{check_args, rule_args, PacketFilter, FILTER_TABLE};
use crate::models::{Rule, RulePolicy};

/// Shell-free iptables backend.
///
/// Chain replacement goes through `iptables-restore --noflush`, which commits
/// the flush and every append of one chain as a single transaction.
#[derive(Debug, Clone)]
pub struct IptablesBackend {
    iptables: String,
    restore: String,
}

impl Default for IptablesBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl IptablesBackend {
    pub fn new() -> Self {
        Self::with_binaries("iptables", "iptables-restore")
    }

    /// Use alternative binaries, e.g. `ip6tables` / `ip6tables-restore`.
    pub fn with_binaries(iptables: &str, restore: &str) -> Self {
        Self {
            iptables: iptables.to_string(),
            restore: restore.to_string(),
        }
    }

    fn run(&self, args: &[&str]) -> Result<()> {
        debug!("Running {} {}", self.iptables, args.join(" "));

        let output = Command::new(&self.iptables)
            .args(["-t", FILTER_TABLE])
            .args(args)
            .output()
            .with_context(|| format!("Failed to run {}", self.iptables))?;

        if !output.status.success() {
            return Err(anyhow!(
                "{} {} failed ({}): {}",
                self.iptables,
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(())
    }
}

/// Render a restore script replacing the contents of `chain`.
///
/// Fails without rendering anything if the chain name or any rule argument
/// contains whitespace.
pub fn restore_script(chain: &str, rules: &[Rule]) -> Result<String> {
    check_args(&[chain])?;
    let mut script = format!("*{}\n-F {}\n", FILTER_TABLE, chain);
    for rule in rules {
        script.push_str("-A ");
        script.push_str(chain);
        for arg in rule_args(rule)? {
            script.push(' ');
            script.push_str(&arg);
        }
        script.push('\n');
    }
    script.push_str("COMMIT\n");
    Ok(script)
}

impl PacketFilter for IptablesBackend {
    fn flush(&self, chain: &str) -> Result<()> {
        self.run(&["-F", chain])
    }

    fn create_chain(&self, chain: &str) -> Result<()> {
        self.run(&["-N", chain])
    }

    fn set_policy(&self, chain: &str, policy: &RulePolicy) -> Result<()> {
        self.run(&["-P", chain, policy.as_str()])
    }

    fn set_rules(&self, chain: &str, rules: &[Rule]) -> Result<()> {
        let script = restore_script(chain, rules)?;
        debug!("Restoring {} rules into {}", rules.len(), chain);

        let mut child = Command::new(&self.restore)
            .arg("--noflush")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to run {}", self.restore))?;

        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| anyhow!("{} stdin unavailable", self.restore))?;
            stdin
                .write_all(script.as_bytes())
                .with_context(|| format!("Failed to write to {}", self.restore))?;
        }

        let output = child
            .wait_with_output()
            .with_context(|| format!("Failed to wait for {}", self.restore))?;

        if !output.status.success() {
            return Err(anyhow!(
                "{} failed ({}): {}",
                self.restore,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(())
    }
}
