// Containership Firewall - Role Model
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Node role within the cluster.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// The node's position in the cluster.
///
/// A leader exposes the control-plane API to peers; a follower exposes the
/// load-balancer and workload port ranges. Any mode string other than
/// `leader` deserializes as a follower.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Leader,
    #[default]
    Follower,
}

impl Role {
    pub fn from_mode(mode: &str) -> Self {
        if mode == "leader" {
            Self::Leader
        } else {
            Self::Follower
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Leader => "leader",
            Self::Follower => "follower",
        }
    }

    pub fn is_leader(&self) -> bool {
        matches!(self, Self::Leader)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mode = String::deserialize(deserializer)?;
        Ok(Self::from_mode(&mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_mode_is_follower() {
        for (mode, role) in [
            ("\"leader\"", Role::Leader),
            ("\"follower\"", Role::Follower),
            ("\"worker\"", Role::Follower),
            ("\"Leader\"", Role::Follower),
            ("\"\"", Role::Follower),
        ] {
            assert_eq!(serde_json::from_str::<Role>(mode).unwrap(), role, "{}", mode);
        }
        assert_eq!(serde_json::to_string(&Role::Leader).unwrap(), "\"leader\"");
    }
}
