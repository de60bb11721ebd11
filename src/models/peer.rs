// Containership Firewall - Peer Model
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Cluster peer model.

use std::collections::BTreeMap;
use std::net::IpAddr;

use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// True for a bare IP address or a CIDR block.
pub fn is_network_address(s: &str) -> bool {
    s.parse::<IpAddr>().is_ok() || s.parse::<IpNet>().is_ok()
}

/// A live cluster member as reported by the membership source.
///
/// Maps are ordered so that rule generation is reproducible run to run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    #[serde(default)]
    pub id: String,
    /// Address (or CIDR) by network scope, e.g. `"private" -> "10.0.0.5/32"`.
    #[serde(default)]
    pub address: BTreeMap<String, String>,
    /// Flattened tags, nested keys joined with `.`.
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: BTreeMap<String, String>,
}

impl Peer {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }

    pub fn with_address(mut self, scope: &str, address: &str) -> Self {
        self.address.insert(scope.to_string(), address.to_string());
        self
    }

    pub fn with_tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.to_string(), value.to_string());
        self
    }

    /// Addresses usable as a rule source, in scope order.
    ///
    /// Entries that are not an IP address or CIDR block are skipped.
    pub fn addresses(&self) -> impl Iterator<Item = &str> + '_ {
        self.address.iter().filter_map(move |(scope, address)| {
            if is_network_address(address) {
                Some(address.as_str())
            } else {
                debug!("Ignoring {} address {:?} of peer {}", scope, address, self.id);
                None
            }
        })
    }

    /// Address in `scope`, if present and well formed.
    pub fn address_in(&self, scope: &str) -> Option<&str> {
        self.address
            .get(scope)
            .map(String::as_str)
            .filter(|address| is_network_address(address))
    }

    /// Exact key-and-value match against the flattened tags.
    pub fn has_tag(&self, key: &str, value: &str) -> bool {
        self.tags.get(key).is_some_and(|v| v == value)
    }
}

fn deserialize_tags<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(flatten_tags(&value))
}

/// Flatten a nested tag document into dotted keys.
///
/// `{"host": {"zone": "a"}}` becomes `host.zone = a`. Non-string leaves are
/// rendered with their JSON text; nulls are skipped.
fn flatten_tags(value: &Value) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    flatten_into(&mut out, None, value);
    out
}

fn flatten_into(out: &mut BTreeMap<String, String>, prefix: Option<&str>, value: &Value) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = match prefix {
                    Some(p) => format!("{}.{}", p, key),
                    None => key.clone(),
                };
                flatten_into(out, Some(&path), child);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                let path = match prefix {
                    Some(p) => format!("{}.{}", p, i),
                    None => i.to_string(),
                };
                flatten_into(out, Some(&path), child);
            }
        }
        Value::Null => {}
        Value::String(s) => {
            if let Some(p) = prefix {
                out.insert(p.to_string(), s.clone());
            }
        }
        other => {
            if let Some(p) = prefix {
                out.insert(p.to_string(), other.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flatten_nested_tags() {
        let peer: Peer = serde_json::from_value(json!({
            "id": "node-1",
            "address": { "private": "10.0.0.5/32", "public": "52.1.1.1" },
            "tags": {
                "host": { "zone": "us-east-1a", "gpu": true },
                "role": "db",
                "unset": null
            }
        }))
        .unwrap();

        assert_eq!(peer.tags.get("host.zone").map(String::as_str), Some("us-east-1a"));
        assert_eq!(peer.tags.get("host.gpu").map(String::as_str), Some("true"));
        assert!(peer.has_tag("role", "db"));
        assert!(!peer.has_tag("role", "web"));
        assert!(!peer.tags.contains_key("unset"));

        let scopes: Vec<&str> = peer.address.keys().map(String::as_str).collect();
        assert_eq!(scopes, vec!["private", "public"]);
    }

    #[test]
    fn test_malformed_addresses_skipped() {
        let peer = Peer::new("node-1")
            .with_address("private", "10.0.0.5/32")
            .with_address("public", "52.1.1.1")
            .with_address("bogus", "10.0.0.9 -j DROP")
            .with_address("v6", "fd00::/64")
            .with_address("wide", "10.0.0.0/33");

        let addresses: Vec<&str> = peer.addresses().collect();
        assert_eq!(addresses, vec!["10.0.0.5/32", "52.1.1.1", "fd00::/64"]);
        assert_eq!(peer.address_in("private"), Some("10.0.0.5/32"));
        assert_eq!(peer.address_in("bogus"), None);
        assert_eq!(peer.address_in("missing"), None);
    }

    #[test]
    fn test_network_address() {
        assert!(is_network_address("192.168.0.0/16"));
        assert!(is_network_address("10.0.0.5"));
        assert!(is_network_address("::1"));
        assert!(!is_network_address("*"));
        assert!(!is_network_address("10.0.0.5\n-A INPUT"));
        assert!(!is_network_address("example.com"));
        assert!(!is_network_address(""));
    }

    #[test]
    fn test_missing_fields_default() {
        let peer: Peer = serde_json::from_value(json!({ "id": "lonely" })).unwrap();
        assert!(peer.address.is_empty());
        assert!(peer.tags.is_empty());
    }
}
