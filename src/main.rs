// Containership Firewall - Main Entry Point
// Copyright (C) 2026 Christos Daggas
// SPDX-License-Identifier: MIT

//! Containership Firewall daemon.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use containership_firewall::cloud::CloudClient;
use containership_firewall::config::BackendKind;
use containership_firewall::firewall::{FirewalldClient, IptablesBackend, PacketFilter};
use containership_firewall::membership::PeerDirectory;
use containership_firewall::{FirewallSettings, Reconciler, RuleBuilder, RulePlanner};

#[derive(Debug, Parser)]
#[clap(name = "containership-firewall", about = "Cluster-aware host firewall manager")]
struct Args {
    /// Settings file (JSON). Defaults to <config dir>/containership/firewall.json.
    #[clap(long, env = "CONTAINERSHIP_FIREWALL_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set.
    #[clap(long, default_value = "info", env = "CONTAINERSHIP_FIREWALL_LOG")]
    log_level: String,

    /// Reset and apply once, then exit.
    #[clap(long)]
    once: bool,

    /// Print the derived rules as JSON without touching the packet filter.
    #[clap(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .context("Invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let settings = Arc::new(FirewallSettings::load(args.config.as_deref())?);
    info!(
        "Starting as {} managing chain {} (refresh every {:?})",
        settings.mode,
        settings.chain,
        settings.refresh_interval()
    );

    let cloud = if settings.cloud.enabled {
        Some(CloudClient::new(&settings.cloud)?)
    } else {
        None
    };
    let membership = Arc::new(PeerDirectory::new(settings.peers_path.clone()));
    let planner = RulePlanner::new(RuleBuilder::new(Arc::clone(&settings)), membership, cloud);

    if args.dry_run {
        let rules = planner.plan().await;
        println!("{}", serde_json::to_string_pretty(&rules)?);
        return Ok(ExitCode::SUCCESS);
    }

    let filter = connect_backend(settings.backend).await?;
    let reconciler = Reconciler::new(planner, filter);

    if args.once {
        let applied = reconciler.run_once().await;
        return Ok(if applied { ExitCode::SUCCESS } else { ExitCode::FAILURE });
    }

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(cancel.clone()));
    reconciler.run(cancel).await;

    Ok(ExitCode::SUCCESS)
}

async fn connect_backend(kind: BackendKind) -> Result<Arc<dyn PacketFilter>> {
    Ok(match kind {
        BackendKind::Iptables => Arc::new(IptablesBackend::new()),
        BackendKind::Firewalld => {
            let client = tokio::task::spawn_blocking(FirewalldClient::connect)
                .await
                .context("firewalld connect task did not complete")??;
            Arc::new(client)
        }
    })
}

/// Cancel on SIGINT or SIGTERM. The last applied ruleset stays in place.
async fn shutdown_on_signal(cancel: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = term.recv() => {},
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }

    info!("Shutting down");
    cancel.cancel();
}
