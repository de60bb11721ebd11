// Containership Firewall - Rule Model
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Packet-filter rule model.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::Role;

/// Target of a rule: a verdict or a jump into another chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RulePolicy {
    Accept,
    Drop,
    Jump(String),
}

impl RulePolicy {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Accept => "ACCEPT",
            Self::Drop => "DROP",
            Self::Jump(chain) => chain,
        }
    }
}

impl From<&str> for RulePolicy {
    fn from(s: &str) -> Self {
        match s {
            "ACCEPT" => Self::Accept,
            "DROP" => Self::Drop,
            chain => Self::Jump(chain.to_string()),
        }
    }
}

impl fmt::Display for RulePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for RulePolicy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RulePolicy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s.is_empty() {
            return Err(serde::de::Error::custom("rule policy must not be empty"));
        }
        Ok(Self::from(s.as_str()))
    }
}

/// Destination port: a single port or an inclusive `min:max` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortSpec {
    Single(u16),
    Range { min: u16, max: u16 },
}

impl PortSpec {
    pub fn range(min: u16, max: u16) -> Self {
        if min == max {
            Self::Single(min)
        } else {
            Self::Range { min, max }
        }
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(port) => write!(f, "{}", port),
            Self::Range { min, max } => write!(f, "{}:{}", min, max),
        }
    }
}

impl FromStr for PortSpec {
    type Err = anyhow::Error;

    /// Parse `"443"` or `"30000:30100"`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.split_once(':') {
            Some((min, max)) => {
                let min: u16 = min.trim().parse().map_err(|_| anyhow!("invalid port range: {}", s))?;
                let max: u16 = max.trim().parse().map_err(|_| anyhow!("invalid port range: {}", s))?;
                if min > max {
                    return Err(anyhow!("port range is inverted: {}", s));
                }
                Ok(Self::range(min, max))
            }
            None => s
                .parse()
                .map(Self::Single)
                .map_err(|_| anyhow!("invalid port: {}", s)),
        }
    }
}

impl Serialize for PortSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Single(port) => serializer.serialize_u16(*port),
            range => serializer.collect_str(range),
        }
    }
}

/// Wire form of a port: JSON number or string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PortValue {
    Number(u64),
    Text(String),
}

impl PortValue {
    pub fn to_spec(&self) -> Result<PortSpec> {
        match self {
            Self::Number(n) => u16::try_from(*n)
                .map(PortSpec::Single)
                .map_err(|_| anyhow!("port out of range: {}", n)),
            Self::Text(s) => s.parse(),
        }
    }
}

impl<'de> Deserialize<'de> for PortSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        PortValue::deserialize(deserializer)?
            .to_spec()
            .map_err(serde::de::Error::custom)
    }
}

/// A single packet-filter rule.
///
/// Absent fields are structurally absent (`None`); a rule never carries a
/// placeholder value for a field that does not apply to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    pub policy: RulePolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_port: Option<PortSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Vec<String>>,
}

impl Rule {
    /// Create a rule with only a policy set.
    pub fn new(policy: RulePolicy) -> Self {
        Self {
            policy,
            protocol: None,
            destination_port: None,
            source: None,
            interface: None,
            state: None,
        }
    }

    pub fn accept() -> Self {
        Self::new(RulePolicy::Accept)
    }

    /// Jump into `chain`.
    pub fn jump(chain: &str) -> Self {
        Self::new(RulePolicy::Jump(chain.to_string()))
    }

    /// ACCEPT `protocol` traffic to `port`.
    pub fn allow_port(protocol: &str, port: PortSpec) -> Self {
        Self::accept().with_protocol(protocol).with_port(port)
    }

    pub fn with_protocol(mut self, protocol: &str) -> Self {
        self.protocol = Some(protocol.to_string());
        self
    }

    pub fn with_port(mut self, port: PortSpec) -> Self {
        self.destination_port = Some(port);
        self
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    pub fn with_interface(mut self, interface: &str) -> Self {
        self.interface = Some(interface.to_string());
        self
    }

    pub fn with_state(mut self, states: &[&str]) -> Self {
        self.state = Some(states.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Render the rule as iptables match/target arguments (without `-A CHAIN`).
    pub fn to_iptables_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(interface) = &self.interface {
            args.push("-i".to_string());
            args.push(interface.clone());
        }
        if let Some(protocol) = &self.protocol {
            args.push("-p".to_string());
            args.push(protocol.clone());
        }
        if let Some(source) = &self.source {
            args.push("-s".to_string());
            args.push(source.clone());
        }
        if let Some(port) = &self.destination_port {
            // --dport needs a protocol match to be loaded
            if self.protocol.is_none() {
                args.push("-p".to_string());
                args.push("tcp".to_string());
            }
            args.push("--dport".to_string());
            args.push(port.to_string());
        }
        if let Some(states) = self.state.as_ref().filter(|s| !s.is_empty()) {
            args.push("-m".to_string());
            args.push("conntrack".to_string());
            args.push("--ctstate".to_string());
            args.push(states.join(","));
        }

        args.push("-j".to_string());
        args.push(self.policy.as_str().to_string());
        args
    }
}

/// A configured rule that may be restricted to one node role.
///
/// The `mode` is metadata; it is stripped when the template is resolved. It
/// is kept as written, so a template naming a mode no node runs as is never
/// included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTemplate {
    #[serde(flatten)]
    pub rule: Rule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

impl RuleTemplate {
    /// A template included for every role.
    pub fn always(rule: Rule) -> Self {
        Self { rule, mode: None }
    }

    /// A template included only when the node runs as `mode`.
    pub fn only(mode: Role, rule: Rule) -> Self {
        Self {
            rule,
            mode: Some(mode.as_str().to_string()),
        }
    }

    /// Resolve against the active role, dropping the `mode` tag.
    pub fn resolve(self, role: Role) -> Option<Rule> {
        match self.mode.as_deref() {
            Some(mode) if mode != role.as_str() => None,
            _ => Some(self.rule),
        }
    }
}
