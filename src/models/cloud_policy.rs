// Containership Firewall - Cloud Policy Model
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Remote policy records returned by the cloud control plane.

use serde::Deserialize;

use super::PortValue;

/// Wildcard source: any address for `ip` records, every peer for `tag` records.
pub const WILDCARD: &str = "*";

/// How a record's `source` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Ip,
    Tag,
    #[serde(other)]
    Unknown,
}

/// One policy record from the cloud endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CloudPolicyRecord {
    pub protocol: String,
    pub port: PortValue,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    pub source: String,
}

/// Parsed `source` of a tag record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagSelector {
    /// Matches every peer.
    All,
    /// Exact match on one flattened tag.
    Equals { key: String, value: String },
}

impl TagSelector {
    /// Parse `"key=value"` or `"*"`. Returns `None` for anything else.
    pub fn parse(source: &str) -> Option<Self> {
        let source = source.trim();
        if source == WILDCARD {
            return Some(Self::All);
        }
        let (key, value) = source.split_once('=')?;
        if key.is_empty() {
            return None;
        }
        Some(Self::Equals {
            key: key.to_string(),
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_records() {
        let records: Vec<CloudPolicyRecord> = serde_json::from_value(json!([
            { "protocol": "tcp", "port": 443, "type": "ip", "source": "*" },
            { "protocol": "udp", "port": "5000:5010", "type": "tag", "source": "role=db" },
            { "protocol": "tcp", "port": 22, "type": "group", "source": "ops" }
        ]))
        .unwrap();

        assert_eq!(records[0].source_type, SourceType::Ip);
        assert_eq!(records[0].port, PortValue::Number(443));
        assert_eq!(records[1].port, PortValue::Text("5000:5010".to_string()));
        assert_eq!(records[2].source_type, SourceType::Unknown);
    }

    #[test]
    fn test_tag_selector() {
        assert_eq!(TagSelector::parse("*"), Some(TagSelector::All));
        assert_eq!(
            TagSelector::parse("host.zone=us-east-1a"),
            Some(TagSelector::Equals {
                key: "host.zone".to_string(),
                value: "us-east-1a".to_string()
            })
        );
        // value keeps any further '='
        assert_eq!(
            TagSelector::parse("expr=a=b"),
            Some(TagSelector::Equals {
                key: "expr".to_string(),
                value: "a=b".to_string()
            })
        );
        assert_eq!(TagSelector::parse("no-separator"), None);
        assert_eq!(TagSelector::parse("=value"), None);
    }
}
