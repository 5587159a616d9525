// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use haukka_scanner::config::{AppConfig, ObservabilityConfig};
use haukka_scanner::families::{FamilyManager, FamilyNotifier, FamilyResult};
use haukka_scanner::provider::{ArmClient, AzureClient};
use haukka_scanner::retry::{poll_until_ready, RetryConfig};
use haukka_scanner::types::{FamilyType, ScanJobConfig, ScanScope};

fn main() -> Result<()> {
    // Initialize tracing. RUST_LOG takes precedence; LOG_LEVEL is the
    // configured fallback.
    let observability = ObservabilityConfig::from_env();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&observability.log_level)),
        )
        .init();

    print!("\x1b[92m");
    println!("    __               __   __");
    println!("   / /_  ____ ___  __/ /__/ /______ _");
    println!("  / __ \\/ __ `/ / / / //_/ //_/ __ `/");
    print!("\x1b[91m");
    println!(" / / / / /_/ / /_/ / ,< / ,< / /_/ /");
    println!("/_/ /_/\\__,_/\\__,_/_/|_|_/|_|\\__,_/");
    print!("\x1b[0m");
    println!();
    print!("\x1b[1m\x1b[97m");
    println!("        Cloud VM Security Scanner");
    print!("\x1b[0m\x1b[92m");
    println!("         v1.2 - (c) 2026 Bountyy Oy");
    print!("\x1b[0m");
    println!();

    info!("Haukka Scanner v1.2.0 - Starting");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .thread_name("haukka-worker")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

async fn async_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let usage = "usage: haukka <up|down|scan> <job.json> | haukka discover [scope.json]";

    match args.get(1).map(String::as_str) {
        Some("up") => {
            let job = load_job(args.get(2).context(usage)?)?;
            let client = azure_client()?;
            let vm = poll_until_ready(&RetryConfig::default(), "scanner setup", || {
                client.ensure_scanner(&job)
            })
            .await?;
            info!(vm = %vm.name, "scanner is up and scanning");
            Ok(())
        }
        Some("down") => {
            let job = load_job(args.get(2).context(usage)?)?;
            let client = azure_client()?;
            poll_until_ready(&RetryConfig::default(), "scanner teardown", || {
                client.remove_scanner(&job)
            })
            .await?;
            info!(scan_result_id = %job.scan_result_id, "scanner resources removed");
            Ok(())
        }
        Some("scan") => {
            let job = load_job(args.get(2).context(usage)?)?;
            run_families(&job).await
        }
        Some("discover") => {
            let scope = match args.get(2) {
                Some(path) => serde_json::from_str::<ScanScope>(
                    &std::fs::read_to_string(path)
                        .with_context(|| format!("reading scope from {path}"))?,
                )?,
                None => ScanScope::default(),
            };
            let client = azure_client()?;
            let targets = client.discover_targets(&scope).await?;
            for target in &targets {
                println!("{}", target.instance_id);
            }
            info!(count = targets.len(), "discovery finished");
            Ok(())
        }
        _ => bail!(usage),
    }
}

fn load_job(path: &str) -> Result<ScanJobConfig> {
    let raw =
        std::fs::read_to_string(path).with_context(|| format!("reading scan job from {path}"))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing scan job from {path}"))
}

fn azure_client() -> Result<AzureClient> {
    let config = AppConfig::from_env()?;
    let token = std::env::var("AZURE_ACCESS_TOKEN")
        .context("AZURE_ACCESS_TOKEN is required for cloud operations")?;
    let arm = ArmClient::new(&config.azure.arm_endpoint, &config.azure.subscription_id, &token);
    Ok(AzureClient::new(Arc::new(arm), config.azure))
}

/// Run the scan families on this machine against the mounted target
/// volume. This is the path cloud-init boots a scanner VM into.
async fn run_families(job: &ScanJobConfig) -> Result<()> {
    let manager = FamilyManager::new(&job.families);
    info!(families = ?manager.family_types(), "starting scan");

    let cancel = CancellationToken::new();
    let timeout_guard = cancel.clone();
    let timeout = job.timeout();
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        warn!("scan timeout reached, cancelling remaining families");
        timeout_guard.cancel();
    });

    let notifier = LoggingNotifier;
    let errors = manager.run(&cancel, &notifier).await;
    if errors.is_empty() {
        info!("scan finished without errors");
        Ok(())
    } else {
        for err in &errors {
            error!(error = %err, "scan error");
        }
        bail!("scan finished with {} error(s)", errors.len())
    }
}

/// Progress reporting for a standalone run. The control plane swaps in
/// its own notifier to persist per-family state transitions.
struct LoggingNotifier;

#[async_trait::async_trait]
impl FamilyNotifier for LoggingNotifier {
    async fn family_started(&self, family: FamilyType) -> Result<()> {
        info!(family = %family, "family started");
        Ok(())
    }

    async fn family_finished(&self, result: FamilyResult) -> Result<()> {
        match &result.result {
            Ok(_) => info!(family = %result.family_type, "family finished"),
            Err(err) => warn!(family = %result.family_type, error = %err, "family failed"),
        }
        Ok(())
    }
}
