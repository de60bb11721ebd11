// Containership Firewall - Models
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Data models for rules, peers and cloud policy.

mod cloud_policy;
mod peer;
mod role;
mod rule;

pub use cloud_policy::{CloudPolicyRecord, SourceType, TagSelector, WILDCARD};
pub use peer::{is_network_address, Peer};
pub use role::Role;
pub use rule::{PortSpec, PortValue, Rule, RulePolicy, RuleTemplate};
