// Containership Firewall - Cloud Rules
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Expansion of cloud policy records into concrete rules.

use tracing::debug;

use crate::models::{
    is_network_address, CloudPolicyRecord, Peer, Rule, SourceType, TagSelector, WILDCARD,
};

/// Protocols that carry a destination port.
const PORT_PROTOCOLS: &[&str] = &["tcp", "udp", "sctp", "udplite"];

/// Expand one record.
///
/// `ip` records yield a single rule; `tag` records yield one rule per
/// (matching peer, address scope). Malformed records yield nothing.
pub fn expand_record(record: &CloudPolicyRecord, peers: &[Peer]) -> Vec<Rule> {
    let protocol = record.protocol.trim().to_ascii_lowercase();
    if !PORT_PROTOCOLS.contains(&protocol.as_str()) {
        debug!("Skipping cloud policy record with protocol {:?}", record.protocol);
        return Vec::new();
    }
    let port = match record.port.to_spec() {
        Ok(port) => port,
        Err(e) => {
            debug!("Skipping cloud policy record: {}", e);
            return Vec::new();
        }
    };
    let base = Rule::allow_port(&protocol, port);

    match record.source_type {
        SourceType::Ip => {
            let source = record.source.trim();
            if source == WILDCARD {
                vec![base]
            } else if is_network_address(source) {
                vec![base.with_source(source)]
            } else {
                debug!("Skipping cloud policy record with source {:?}", record.source);
                Vec::new()
            }
        }
        SourceType::Tag => {
            let Some(selector) = TagSelector::parse(&record.source) else {
                debug!("Skipping cloud policy record with bad tag source {:?}", record.source);
                return Vec::new();
            };
            peers
                .iter()
                .filter(|peer| match &selector {
                    TagSelector::All => true,
                    TagSelector::Equals { key, value } => peer.has_tag(key, value),
                })
                .flat_map(|peer| peer.addresses())
                .map(|address| base.clone().with_source(address))
                .collect()
        }
        SourceType::Unknown => {
            debug!("Skipping cloud policy record with unknown source type");
            Vec::new()
        }
    }
}

/// Append the expansion of every record, in the order returned by the
/// cloud endpoint.
pub fn extend_with_cloud(mut rules: Vec<Rule>, records: &[CloudPolicyRecord], peers: &[Peer]) -> Vec<Rule> {
    for record in records {
        rules.extend(expand_record(record, peers));
    }
    rules
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PortSpec, PortValue};

    fn record(source_type: SourceType, source: &str) -> CloudPolicyRecord {
        CloudPolicyRecord {
            protocol: "tcp".to_string(),
            port: PortValue::Number(443),
            source_type,
            source: source.to_string(),
        }
    }

    fn peers() -> Vec<Peer> {
        vec![
            Peer::new("db-1")
                .with_address("private", "10.0.0.5/32")
                .with_address("public", "52.0.0.5/32")
                .with_tag("role", "db"),
            Peer::new("web-1")
                .with_address("private", "10.0.0.6/32")
                .with_tag("role", "web"),
            Peer::new("db-2")
                .with_address("private", "10.0.0.7/32")
                .with_tag("role", "db"),
        ]
    }

    #[test]
    fn test_ip_wildcard_has_no_source() {
        let rules = expand_record(&record(SourceType::Ip, "*"), &peers());
        assert_eq!(rules, vec![Rule::allow_port("tcp", PortSpec::Single(443))]);
        assert!(rules[0].source.is_none());
    }

    #[test]
    fn test_ip_literal_source() {
        let rules = expand_record(&record(SourceType::Ip, "192.168.0.0/16"), &[]);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].source.as_deref(), Some("192.168.0.0/16"));
    }

    #[test]
    fn test_tag_matches_peer_times_scopes() {
        let rules = expand_record(&record(SourceType::Tag, "role=db"), &peers());
        let sources: Vec<&str> = rules.iter().filter_map(|r| r.source.as_deref()).collect();
        // db-1 has two scopes, db-2 has one
        assert_eq!(sources, vec!["10.0.0.5/32", "52.0.0.5/32", "10.0.0.7/32"]);
        assert!(rules
            .iter()
            .all(|r| r.destination_port == Some(PortSpec::Single(443))));
    }

    #[test]
    fn test_tag_wildcard_matches_every_peer() {
        let rules = expand_record(&record(SourceType::Tag, "*"), &peers());
        assert_eq!(rules.len(), 4);
    }

    #[test]
    fn test_non_matching_records_yield_nothing() {
        assert!(expand_record(&record(SourceType::Tag, "role=cache"), &peers()).is_empty());
        assert!(expand_record(&record(SourceType::Tag, "role"), &peers()).is_empty());
        assert!(expand_record(&record(SourceType::Unknown, "*"), &peers()).is_empty());
        assert!(expand_record(&record(SourceType::Tag, "*"), &[]).is_empty());

        let mut bad_port = record(SourceType::Ip, "*");
        bad_port.port = PortValue::Text("https".to_string());
        assert!(expand_record(&bad_port, &peers()).is_empty());
    }

    #[test]
    fn test_unsupported_protocol_dropped() {
        for protocol in ["icmp", "all", "", "tcp -j DROP"] {
            let mut rec = record(SourceType::Ip, "*");
            rec.protocol = protocol.to_string();
            assert!(expand_record(&rec, &peers()).is_empty(), "{:?}", protocol);
        }

        let mut upper = record(SourceType::Ip, "*");
        upper.protocol = "UDP".to_string();
        assert_eq!(expand_record(&upper, &[])[0].protocol.as_deref(), Some("udp"));
    }

    #[test]
    fn test_malformed_ip_source_dropped() {
        for source in ["10.0.0.0/8\n-A INPUT -j ACCEPT", "10.0.0.1 -j DROP", "example.com", "300.0.0.1"] {
            assert!(expand_record(&record(SourceType::Ip, source), &[]).is_empty(), "{:?}", source);
        }
        assert_eq!(expand_record(&record(SourceType::Ip, " 10.2.0.1 "), &[]).len(), 1);
    }

    #[test]
    fn test_tag_skips_malformed_peer_address() {
        let peers = vec![Peer::new("db-9")
            .with_address("private", "10.0.0.9/32")
            .with_address("public", "not an address")
            .with_tag("role", "db")];
        let rules = expand_record(&record(SourceType::Tag, "role=db"), &peers);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].source.as_deref(), Some("10.0.0.9/32"));
    }

    #[test]
    fn test_record_order_preserved() {
        let mut udp = record(SourceType::Ip, "10.1.0.0/16");
        udp.protocol = "udp".to_string();
        udp.port = PortValue::Text("5000:5010".to_string());

        let records = vec![record(SourceType::Tag, "role=web"), udp];
        let prefix = vec![Rule::accept().with_interface("lo")];
        let rules = extend_with_cloud(prefix, &records, &peers());

        assert_eq!(rules.len(), 3);
        assert_eq!(rules[1].source.as_deref(), Some("10.0.0.6/32"));
        assert_eq!(rules[2].protocol.as_deref(), Some("udp"));
        assert_eq!(rules[2].destination_port, Some(PortSpec::Range { min: 5000, max: 5010 }));
    }
}
