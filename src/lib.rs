// Containership Firewall - Library Root
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Host firewall manager for ContainerShip cluster nodes.
//!
//! Derives an ordered packet-filter ruleset from static settings, live
//! cluster membership and cloud policy, and periodically replaces the
//! managed chain with it.

pub mod cloud;
pub mod config;
pub mod firewall;
pub mod membership;
pub mod models;
pub mod reconcile;
pub mod rules;

pub use config::FirewallSettings;
pub use reconcile::{Reconciler, RulePlanner};
pub use rules::RuleBuilder;
