// Containership Firewall - Peer Directory
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! File-backed and static membership sources.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use super::MembershipSource;
use crate::models::Peer;

/// Peer file layout: either a bare array or `{"peers": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PeerDocument {
    List(Vec<Peer>),
    Wrapped { peers: Vec<Peer> },
}

/// Peers published by the cluster agent as a JSON file.
///
/// The file is re-read on every call so that each pass sees current
/// membership.
#[derive(Debug, Clone)]
pub struct PeerDirectory {
    path: PathBuf,
}

impl PeerDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MembershipSource for PeerDirectory {
    fn peers(&self) -> Result<Vec<Peer>> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read peer directory {}", self.path.display()))?;
        let document: PeerDocument = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse peer directory {}", self.path.display()))?;

        Ok(match document {
            PeerDocument::List(peers) => peers,
            PeerDocument::Wrapped { peers } => peers,
        })
    }
}

/// A fixed peer list.
#[derive(Debug, Clone, Default)]
pub struct StaticPeers(pub Vec<Peer>);

impl MembershipSource for StaticPeers {
    fn peers(&self) -> Result<Vec<Peer>> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_bare_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peers.json");
        fs::write(
            &path,
            r#"[
                {"id": "a", "address": {"private": "10.0.0.5/32"}, "tags": {"role": "db"}},
                {"id": "b", "address": {"public": "52.0.0.6"}}
            ]"#,
        )
        .unwrap();

        let peers = PeerDirectory::new(&path).peers().unwrap();
        assert_eq!(peers.len(), 2);
        assert_eq!(peers[0].id, "a");
        assert!(peers[0].has_tag("role", "db"));
        assert_eq!(peers[1].address.get("public").map(String::as_str), Some("52.0.0.6"));
    }

    #[test]
    fn test_read_wrapped_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peers.json");
        fs::write(&path, r#"{"peers": [{"id": "a", "tags": {"host": {"zone": "z1"}}}]}"#).unwrap();

        let peers = PeerDirectory::new(&path).peers().unwrap();
        assert_eq!(peers.len(), 1);
        assert!(peers[0].has_tag("host.zone", "z1"));
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = PeerDirectory::new(dir.path().join("absent.json"));
        assert!(source.peers().is_err());
    }

    #[test]
    fn test_static_peers() {
        let source = StaticPeers(vec![Peer::new("x")]);
        assert_eq!(source.peers().unwrap(), vec![Peer::new("x")]);
    }
}
