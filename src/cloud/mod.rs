// Containership Firewall - Cloud Module
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Cloud control-plane policy source.
//!
//! Cloud policy is strictly additive and best-effort: a missing credential
//! file disables it, and any fetch failure means no cloud rules this pass.

mod client;

pub use client::{CloudClient, CloudCredentials};

/// Request header carrying the API key.
pub const API_KEY_HEADER: &str = "X-Api-Key";
/// Request header carrying the organization id.
pub const ORGANIZATION_HEADER: &str = "X-Organization";
