use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use tracing::info;

use crate::domain::models::KubeConfig;

/// Build a Kubernetes client.
///
/// An explicit kubeconfig file wins; otherwise the configuration is inferred
/// (in-cluster service account, then `$KUBECONFIG`, then `~/.kube/config`).
/// `master` replaces the cluster URL either way.
pub async fn create_client(config: &KubeConfig) -> Result<Client> {
    let mut client_config = match &config.kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)
                .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
            kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .with_context(|| format!("Failed to load kubeconfig {}", path.display()))?
        }
        None => kube::Config::infer()
            .await
            .context("Failed to infer cluster configuration")?,
    };

    if let Some(master) = &config.master {
        client_config.cluster_url = master
            .parse()
            .with_context(|| format!("Invalid master URL: {master}"))?;
    }

    info!(cluster_url = %client_config.cluster_url, "connecting to cluster");

    Client::try_from(client_config).context("Failed to build kubernetes client")
}
