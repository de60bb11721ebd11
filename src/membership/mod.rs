// Containership Firewall - Membership Module
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Cluster membership sources.
//!
//! The daemon never owns membership; it reads the current peer set once per
//! reconciliation pass from whatever directory the cluster agent exposes.

mod directory;

use anyhow::Result;

use crate::models::Peer;

pub use directory::{PeerDirectory, StaticPeers};

/// Read access to the live peer set.
pub trait MembershipSource: Send + Sync {
    /// Current peers, in the order the directory reports them.
    fn peers(&self) -> Result<Vec<Peer>>;
}
