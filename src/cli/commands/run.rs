//! `flatcartag run`: the controller process.

use anyhow::{Context, Result};
use clap::Args;
use std::sync::Arc;
use tracing::info;

use crate::domain::models::Config;
use crate::infrastructure::k8s::{create_client, KubeNodeInformer, KubeNodeRepository};
use crate::infrastructure::signals::shutdown_signal;
use crate::services::Controller;

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Number of concurrent workers
    #[arg(short, long)]
    pub workers: Option<usize>,
}

/// Connect to the cluster and run the controller until SIGINT/SIGTERM.
pub async fn execute(config: Config) -> Result<()> {
    let client = create_client(&config.kube)
        .await
        .context("Failed to build Kubernetes client")?;

    let feed = Arc::new(KubeNodeInformer::new(
        client.clone(),
        config.feed.resync_period(),
    ));
    let repository = Arc::new(KubeNodeRepository::new(client));
    let controller = Controller::from_config(feed, repository, &config);

    let shutdown = shutdown_signal()?;
    info!(
        signature = %config.target.os_signature,
        label = %config.target.label_key,
        workers = config.controller.workers,
        "flatcartag starting"
    );
    controller.run(shutdown).await
}
