// Containership Firewall - Topology Rules
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Per-peer allow rules derived from live cluster membership.

use crate::config::{FirewallSettings, PortRange};
use crate::models::{Peer, PortSpec, Role, Rule};

fn range_spec(range: &PortRange) -> PortSpec {
    PortSpec::range(range.min_port, range.max_port)
}

/// Rules admitting one peer.
///
/// A leader opens the management API to every address of the peer; a
/// follower opens the load-balancer and workload ranges. When a cluster
/// scope is configured, the cluster-communication ports are also opened to
/// the peer's address in that scope.
pub fn peer_rules(settings: &FirewallSettings, role: Role, peer: &Peer) -> Vec<Rule> {
    let mut rules = Vec::new();

    for address in peer.addresses() {
        match role {
            Role::Leader => {
                rules.push(
                    Rule::allow_port("tcp", PortSpec::Single(settings.api_port)).with_source(address),
                );
            }
            Role::Follower => {
                rules.push(
                    Rule::allow_port("tcp", range_spec(&settings.loadbalancer)).with_source(address),
                );
                rules.push(
                    Rule::allow_port("tcp", range_spec(&settings.container)).with_source(address),
                );
            }
        }
    }

    let cluster_address = settings
        .cluster_scope
        .as_deref()
        .and_then(|scope| peer.address_in(scope));

    if let Some(address) = cluster_address {
        for port in &settings.cluster_ports {
            let mut rule = Rule::allow_port("tcp", PortSpec::Single(*port)).with_source(address);
            if let Some(interface) = &settings.cluster_interface {
                rule = rule.with_interface(interface);
            }
            rules.push(rule);
        }
    }

    rules
}

/// Append rules for every peer, in membership order, to `rules`.
pub fn extend_with_peers(
    mut rules: Vec<Rule>,
    settings: &FirewallSettings,
    role: Role,
    peers: &[Peer],
) -> Vec<Rule> {
    for peer in peers {
        rules.extend(peer_rules(settings, role, peer));
    }
    rules
}
