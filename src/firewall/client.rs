// Containership Firewall - D-Bus Client
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Firewalld D-Bus backend using the direct interface.

use anyhow::{bail, Context, Result};
use tracing::{debug, info, warn};
use zbus::blocking::Connection;

use super::{check_args, interfaces, paths, rule_args, PacketFilter, BUS_NAME, FILTER_TABLE};
use crate::models::{Rule, RulePolicy};

/// Address family passed to every direct call.
const IPV4: &str = "ipv4";

/// Chains that exist without being created.
///
/// firewalld files `addRule` calls for these under `<CHAIN>_direct`, so they
/// are only ever touched through passthrough.
const BUILTIN_CHAINS: &[&str] = &["INPUT", "FORWARD", "OUTPUT", "PREROUTING", "POSTROUTING"];

fn is_builtin(chain: &str) -> bool {
    BUILTIN_CHAINS.contains(&chain)
}

/// A direct rule as firewalld reports it: priority and iptables arguments.
pub type DirectRule = (i32, Vec<String>);

/// The calls on `org.fedoraproject.FirewallD1.direct` this backend makes.
pub trait DirectBus: Send + Sync {
    /// Run raw iptables arguments and return their output.
    fn passthrough(&self, args: &[String]) -> Result<String>;

    fn add_chain(&self, chain: &str) -> Result<()>;

    fn get_rules(&self, chain: &str) -> Result<Vec<DirectRule>>;

    fn remove_rules(&self, chain: &str) -> Result<()>;

    fn add_rule(&self, chain: &str, priority: i32, args: &[String]) -> Result<()>;
}

/// The direct interface on the system bus.
pub struct DbusDirect {
    connection: Connection,
}

impl DbusDirect {
    /// Connect to firewalld on the system bus.
    pub fn connect() -> Result<Self> {
        info!("Connecting to firewalld...");

        let connection = Connection::system()
            .context("Failed to connect to system D-Bus")?;

        // Test connection before handing the client out
        let _: Vec<(String, String, String)> = connection
            .call_method(
                Some(BUS_NAME),
                paths::ROOT,
                Some(interfaces::DIRECT),
                "getAllChains",
                &(),
            )
            .context("firewalld direct interface unavailable")?
            .body()
            .deserialize()?;

        info!("Connected to firewalld");
        Ok(Self { connection })
    }

    fn call<B>(&self, method: &str, body: &B) -> Result<zbus::Message>
    where
        B: serde::Serialize + zbus::zvariant::DynamicType,
    {
        self.connection
            .call_method(
                Some(BUS_NAME),
                paths::ROOT,
                Some(interfaces::DIRECT),
                method,
                body,
            )
            .with_context(|| format!("firewalld direct.{} failed", method))
    }
}

impl DirectBus for DbusDirect {
    fn passthrough(&self, args: &[String]) -> Result<String> {
        debug!("firewalld passthrough: {}", args.join(" "));
        let output: String = self
            .call("passthrough", &(IPV4, args.to_vec()))?
            .body()
            .deserialize()?;
        Ok(output)
    }

    fn add_chain(&self, chain: &str) -> Result<()> {
        self.call("addChain", &(IPV4, FILTER_TABLE, chain))?;
        Ok(())
    }

    fn get_rules(&self, chain: &str) -> Result<Vec<DirectRule>> {
        let rules: Vec<DirectRule> = self
            .call("getRules", &(IPV4, FILTER_TABLE, chain))?
            .body()
            .deserialize()?;
        Ok(rules)
    }

    fn remove_rules(&self, chain: &str) -> Result<()> {
        self.call("removeRules", &(IPV4, FILTER_TABLE, chain))?;
        Ok(())
    }

    fn add_rule(&self, chain: &str, priority: i32, args: &[String]) -> Result<()> {
        self.call("addRule", &(IPV4, FILTER_TABLE, chain, priority, args.to_vec()))?;
        Ok(())
    }
}

/// Client driving firewalld's direct interface.
///
/// The managed chain is a direct chain, so firewalld keeps it across
/// reloads. Built-in chains go through passthrough: a direct rule added to
/// `INPUT` would land in `INPUT_direct` instead.
///
/// firewalld has no call replacing a chain in one step. `set_rules` checks
/// every rule before touching the chain and puts the previous rules back if
/// an add fails part way.
pub struct FirewalldClient<B: DirectBus = DbusDirect> {
    bus: B,
}

impl FirewalldClient {
    pub fn connect() -> Result<Self> {
        Ok(Self::with_bus(DbusDirect::connect()?))
    }
}

impl<B: DirectBus> FirewalldClient<B> {
    pub fn with_bus(bus: B) -> Self {
        Self { bus }
    }

    fn passthrough<S: AsRef<str>>(&self, args: &[S]) -> Result<String> {
        let mut full = vec!["-t".to_string(), FILTER_TABLE.to_string()];
        full.extend(args.iter().map(|a| a.as_ref().to_string()));
        self.bus.passthrough(&full)
    }

    /// Current rules of a built-in chain, read back from `-S`.
    fn builtin_rules(&self, chain: &str) -> Result<Vec<Vec<String>>> {
        let listing = self.passthrough(&["-S", chain])?;
        let prefix = format!("-A {} ", chain);
        Ok(listing
            .lines()
            .filter_map(|line| line.strip_prefix(&prefix))
            .map(|rest| rest.split_whitespace().map(String::from).collect())
            .collect())
    }

    fn load_builtin(&self, chain: &str, rules: &[Vec<String>]) -> Result<()> {
        self.passthrough(&["-F", chain])?;
        for args in rules {
            let mut line = vec!["-A".to_string(), chain.to_string()];
            line.extend_from_slice(args);
            self.passthrough(&line)?;
        }
        Ok(())
    }

    fn load_direct(&self, chain: &str, rules: &[DirectRule]) -> Result<()> {
        self.bus.remove_rules(chain)?;
        for (priority, args) in rules {
            self.bus.add_rule(chain, *priority, args)?;
        }
        Ok(())
    }
}

fn log_restore(chain: &str, restored: Result<()>) {
    match restored {
        Ok(()) => warn!("Restored previous rules on {}", chain),
        Err(e) => warn!("Failed to restore previous rules on {}: {:#}", chain, e),
    }
}

impl<B: DirectBus> PacketFilter for FirewalldClient<B> {
    fn flush(&self, chain: &str) -> Result<()> {
        // Fails for a direct chain that does not exist yet
        self.passthrough(&["-F", chain])?;
        if !is_builtin(chain) {
            self.bus.remove_rules(chain)?;
        }
        Ok(())
    }

    fn create_chain(&self, chain: &str) -> Result<()> {
        if is_builtin(chain) {
            bail!("{} is a built-in chain", chain);
        }
        self.bus.add_chain(chain)?;
        info!("Created chain {}", chain);
        Ok(())
    }

    fn set_policy(&self, chain: &str, policy: &RulePolicy) -> Result<()> {
        self.passthrough(&["-P", chain, policy.as_str()])?;
        Ok(())
    }

    fn set_rules(&self, chain: &str, rules: &[Rule]) -> Result<()> {
        check_args(&[chain])?;
        let args = rules.iter().map(rule_args).collect::<Result<Vec<_>>>()?;

        if is_builtin(chain) {
            let previous = self.builtin_rules(chain)?;
            if let Err(e) = self.load_builtin(chain, &args) {
                log_restore(chain, self.load_builtin(chain, &previous));
                return Err(e);
            }
        } else {
            let mut previous = self.bus.get_rules(chain)?;
            previous.sort_by_key(|(priority, _)| *priority);
            let next: Vec<DirectRule> = args
                .into_iter()
                .enumerate()
                .map(|(i, args)| (i32::try_from(i).unwrap_or(i32::MAX), args))
                .collect();
            if let Err(e) = self.load_direct(chain, &next) {
                log_restore(chain, self.load_direct(chain, &previous));
                return Err(e);
            }
        }

        debug!("Set {} rules on {}", rules.len(), chain);
        Ok(())
    }
}
