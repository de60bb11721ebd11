// Containership Firewall - Reconciliation
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Periodic reset-then-apply reconciliation against the packet filter.
//!
//! ```text
//! Resetting (once) → Applying → wait refresh_interval → Applying → ...
//! ```
//!
//! Every pass rebuilds the complete rule list from current inputs and
//! replaces the managed chain wholesale. Nothing is diffed and nothing is
//! read back from the backend.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cloud::CloudClient;
use crate::firewall::PacketFilter;
use crate::membership::MembershipSource;
use crate::models::{CloudPolicyRecord, Peer, Rule, RulePolicy};
use crate::rules::RuleBuilder;

/// Gathers live inputs and derives the rule list for one pass.
pub struct RulePlanner {
    builder: RuleBuilder,
    membership: Arc<dyn MembershipSource>,
    cloud: Option<CloudClient>,
}

impl RulePlanner {
    pub fn new(
        builder: RuleBuilder,
        membership: Arc<dyn MembershipSource>,
        cloud: Option<CloudClient>,
    ) -> Self {
        Self {
            builder,
            membership,
            cloud,
        }
    }

    pub fn builder(&self) -> &RuleBuilder {
        &self.builder
    }

    /// Current peers. An unreachable directory counts as no peers.
    fn peers(&self) -> Vec<Peer> {
        match self.membership.peers() {
            Ok(peers) => peers,
            Err(e) => {
                warn!("Unable to read cluster membership, continuing without peer rules");
                debug!("{:#}", e);
                Vec::new()
            }
        }
    }

    /// Cloud records for this pass. Any failure means none.
    async fn cloud_policies(&self) -> Vec<CloudPolicyRecord> {
        if !self.builder.wants_cloud_policy() {
            return Vec::new();
        }
        let Some(cloud) = &self.cloud else {
            return Vec::new();
        };

        match cloud.fetch_policies().await {
            Ok(records) => records,
            Err(e) => {
                warn!("Unable to fetch cloud firewall policy");
                debug!("{:#}", e);
                Vec::new()
            }
        }
    }

    /// Build the full ordered rule list from current inputs.
    pub async fn plan(&self) -> Vec<Rule> {
        let peers = self.peers();
        let records = self.cloud_policies().await;
        let rules = self.builder.build(&peers, &records);

        debug!(
            "Derived {} rules from {} peers and {} cloud records",
            rules.len(),
            peers.len(),
            records.len()
        );
        rules
    }
}

/// Outcome of a successful apply.
#[derive(Debug, Clone)]
pub struct ApplyReport {
    pub chain: String,
    pub rule_count: usize,
    pub applied_at: DateTime<Utc>,
}

/// Drives the packet filter toward the derived policy.
pub struct Reconciler {
    planner: RulePlanner,
    filter: Arc<dyn PacketFilter>,
}

impl Reconciler {
    pub fn new(planner: RulePlanner, filter: Arc<dyn PacketFilter>) -> Self {
        Self { planner, filter }
    }

    fn chain(&self) -> &str {
        &self.planner.builder().settings().chain
    }

    fn refresh_interval(&self) -> Duration {
        self.planner.builder().settings().refresh_interval()
    }

    /// Prepare the packet filter: empty (or create) the managed chain, empty
    /// the inbound chain, default it to DROP and jump into the managed chain.
    pub async fn reset(&self) -> Result<()> {
        let filter = Arc::clone(&self.filter);
        let settings = self.planner.builder().settings();
        let chain = settings.chain.clone();
        let input = settings.input_chain.clone();

        tokio::task::spawn_blocking(move || -> Result<()> {
            if let Err(e) = filter.flush(&chain) {
                debug!("Flushing {} failed, creating it: {:#}", chain, e);
                filter
                    .create_chain(&chain)
                    .with_context(|| format!("Failed to create chain {}", chain))?;
            }
            filter
                .flush(&input)
                .with_context(|| format!("Failed to flush chain {}", input))?;
            filter
                .set_policy(&input, &RulePolicy::Drop)
                .with_context(|| format!("Failed to set policy on {}", input))?;
            filter
                .set_rules(&input, &[Rule::jump(&chain)])
                .with_context(|| format!("Failed to install jump to {}", chain))?;
            Ok(())
        })
        .await
        .context("Reset task did not complete")?
    }

    /// Rebuild the rule list and replace the managed chain with it.
    pub async fn apply(&self) -> Result<ApplyReport> {
        let rules = self.planner.plan().await;
        let rule_count = rules.len();
        let filter = Arc::clone(&self.filter);
        let chain = self.chain().to_string();

        let target = chain.clone();
        tokio::task::spawn_blocking(move || filter.set_rules(&target, &rules))
            .await
            .context("Apply task did not complete")?
            .with_context(|| format!("Failed to set rules on {}", chain))?;

        Ok(ApplyReport {
            chain,
            rule_count,
            applied_at: Utc::now(),
        })
    }

    async fn reset_logged(&self) {
        if let Err(e) = self.reset().await {
            error!("Unable to reset firewall rules");
            debug!("{:#}", e);
        }
    }

    /// Apply once, logging the outcome. Returns whether the apply succeeded.
    pub async fn apply_logged(&self) -> bool {
        match self.apply().await {
            Ok(report) => {
                info!(
                    "Successfully applied {} firewall rules to {} at {}",
                    report.rule_count,
                    report.chain,
                    report.applied_at.to_rfc3339()
                );
                true
            }
            Err(e) => {
                error!("Unable to apply new firewall rules");
                debug!("{:#}", e);
                false
            }
        }
    }

    /// Reset and apply once. Used for one-shot runs.
    pub async fn run_once(&self) -> bool {
        self.reset_logged().await;
        self.apply_logged().await
    }

    /// Reset, apply immediately, then re-apply every refresh interval until
    /// `cancel` fires. Passes never overlap; a pass that overruns the
    /// interval causes the missed ticks to be skipped.
    pub async fn run(&self, cancel: CancellationToken) {
        self.reset_logged().await;
        self.apply_logged().await;

        let mut interval = tokio::time::interval(self.refresh_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval.tick().await; // consume the immediate first tick

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = interval.tick() => {
                    info!("Updating firewall rules");
                    self.apply_logged().await;
                }
            }
        }

        info!("Reconciliation stopped");
    }
}
