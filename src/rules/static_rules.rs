// Containership Firewall - Static Rules
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Fixed bootstrap rules plus role-conditional configured rules.

use crate::config::FirewallSettings;
use crate::models::{PortSpec, Role, Rule, RuleTemplate};

const LOOPBACK_INTERFACE: &str = "lo";

/// Bootstrap templates, in order: loopback, established/related, one rule
/// per cluster-communication port, then the leader-only management API rule
/// when cloud policy is enabled.
pub fn base_templates(settings: &FirewallSettings) -> Vec<RuleTemplate> {
    let mut templates = vec![
        RuleTemplate::always(Rule::accept().with_interface(LOOPBACK_INTERFACE)),
        RuleTemplate::always(Rule::accept().with_state(&["ESTABLISHED", "RELATED"])),
    ];

    for port in &settings.cluster_ports {
        let mut rule = Rule::allow_port("tcp", PortSpec::Single(*port));
        if let Some(interface) = &settings.cluster_interface {
            rule = rule.with_interface(interface);
        }
        templates.push(RuleTemplate::always(rule));
    }

    if settings.cloud.enabled {
        templates.push(RuleTemplate::only(
            Role::Leader,
            Rule::allow_port("tcp", PortSpec::Single(settings.api_port))
                .with_source(&settings.cloud.whitelist),
        ));
    }

    templates
}

/// The ordered rule prefix for `role`: base templates followed by the
/// operator's `initial_rules`, both filtered on `mode`.
pub fn static_rules(settings: &FirewallSettings, role: Role) -> Vec<Rule> {
    base_templates(settings)
        .into_iter()
        .chain(settings.initial_rules.iter().cloned())
        .filter_map(|template| template.resolve(role))
        .collect()
}
