//! Daemon command for running the publish scheduler loop.

use std::sync::Arc;

use ember_platform::{HttpTaskStore, PlatformClient};
use ember_scheduler::PublishScheduler;
use miette::Result;
use tokio::sync::watch;
use tracing::info;

use crate::SchedulerArgs;

fn build_scheduler(args: &SchedulerArgs) -> Result<PublishScheduler> {
    let client = PlatformClient::new(&args.api_url, &args.api_token)
        .map_err(|e| miette::miette!("failed to create platform client: {}", e))?;
    let store = HttpTaskStore::new(&args.api_url, &args.api_token)
        .map_err(|e| miette::miette!("failed to create task store: {}", e))?;

    PublishScheduler::new(args.schedule_config(), Arc::new(store), Arc::new(client))
        .map_err(|e| miette::miette!("{}", e))
}

/// Run the scheduler loop until a shutdown signal arrives.
pub async fn run(args: &SchedulerArgs) -> Result<()> {
    let scheduler = Arc::new(build_scheduler(args)?);

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Handle shutdown signals
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    scheduler.run(shutdown_rx).await;
    Ok(())
}

/// Run a single publish cycle and exit.
pub async fn run_once(args: &SchedulerArgs) -> Result<()> {
    let scheduler = build_scheduler(args)?;
    let report = scheduler
        .run_cycle_now()
        .await
        .map_err(|e| miette::miette!("publish cycle failed: {}", e))?;

    info!(
        selected = report.selected,
        published = report.published,
        retrying = report.retrying,
        failed = report.failed,
        "publish cycle complete"
    );
    Ok(())
}
