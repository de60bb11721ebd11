// Containership Firewall - Firewall Module
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Packet-filter backends.
//!
//! The reconciler needs exactly four operations from a backend; anything
//! able to provide them (iptables, firewalld, a remote agent) can enforce
//! the derived policy.

mod client;
mod iptables;

use anyhow::{bail, Result};

use crate::models::{Rule, RulePolicy};

pub use client::{DbusDirect, DirectBus, DirectRule, FirewalldClient};
pub use iptables::IptablesBackend;

/// Table all managed chains live in.
pub const FILTER_TABLE: &str = "filter";

/// D-Bus bus name for firewalld.
pub const BUS_NAME: &str = "org.fedoraproject.FirewallD1";

/// D-Bus object paths.
pub mod paths {
    pub const ROOT: &str = "/org/fedoraproject/FirewallD1";
}

/// D-Bus interface names.
pub mod interfaces {
    /// Direct interface (raw chains and rules)
    pub const DIRECT: &str = "org.fedoraproject.FirewallD1.direct";
}

/// The operations the reconciler performs against a packet filter.
pub trait PacketFilter: Send + Sync {
    /// Remove every rule from `chain`. Fails if the chain does not exist.
    fn flush(&self, chain: &str) -> Result<()>;

    /// Create an empty chain.
    fn create_chain(&self, chain: &str) -> Result<()>;

    /// Set the default policy of a built-in chain.
    fn set_policy(&self, chain: &str, policy: &RulePolicy) -> Result<()>;

    /// Replace the whole rule list of `chain`.
    ///
    /// Rules are checked before the chain is touched. Where the packet filter
    /// can commit atomically, readers observe either the old or the new list;
    /// otherwise a failed replace puts the old list back.
    fn set_rules(&self, chain: &str, rules: &[Rule]) -> Result<()>;
}

/// Check that every token can be passed to iptables as one argument.
///
/// Line-based input (`iptables-restore`) splits on whitespace, so a token
/// containing any would turn into extra arguments or extra lines.
pub fn check_args<S: AsRef<str>>(args: &[S]) -> Result<()> {
    for arg in args {
        let arg = arg.as_ref();
        if arg.is_empty() || arg.chars().any(char::is_whitespace) {
            bail!("invalid iptables argument {:?}", arg);
        }
    }
    Ok(())
}

/// Render `rule` as checked iptables arguments.
pub fn rule_args(rule: &Rule) -> Result<Vec<String>> {
    let args = rule.to_iptables_args();
    check_args(&args)?;
    Ok(args)
}
