// Containership Firewall - Rule Derivation
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Rule derivation.
//!
//! A pass assembles the managed chain in a fixed order:
//!
//! ```text
//! static rules → per-peer topology rules → cloud policy rules
//! ```
//!
//! Everything here is pure: identical inputs give an identical rule list.

mod cloud;
mod static_rules;
mod topology;

use std::sync::Arc;

pub use cloud::{expand_record, extend_with_cloud};
pub use static_rules::{base_templates, static_rules};
pub use topology::{extend_with_peers, peer_rules};

use crate::config::FirewallSettings;
use crate::models::{CloudPolicyRecord, Peer, Role, Rule};

/// Builds the full ordered rule list for one node.
///
/// The role is fixed at construction; a role change means a new builder.
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    settings: Arc<FirewallSettings>,
    role: Role,
}

impl RuleBuilder {
    pub fn new(settings: Arc<FirewallSettings>) -> Self {
        let role = settings.mode;
        Self { settings, role }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn settings(&self) -> &FirewallSettings {
        &self.settings
    }

    /// Whether this node should fetch and apply cloud policy records.
    pub fn wants_cloud_policy(&self) -> bool {
        self.settings.cloud.enabled && self.settings.cloud.applies_to.includes(self.role)
    }

    /// Assemble the rule list from live peers and fetched cloud records.
    ///
    /// `cloud` is ignored unless [`wants_cloud_policy`](Self::wants_cloud_policy).
    pub fn build(&self, peers: &[Peer], cloud: &[CloudPolicyRecord]) -> Vec<Rule> {
        let rules = static_rules(&self.settings, self.role);
        let rules = extend_with_peers(rules, &self.settings, self.role, peers);

        if self.wants_cloud_policy() {
            extend_with_cloud(rules, cloud, peers)
        } else {
            rules
        }
    }
}
