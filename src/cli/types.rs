//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::commands::nodes::NodesArgs;
use crate::cli::commands::run::RunArgs;
use crate::infrastructure::config::ConfigOverrides;

#[derive(Parser, Debug)]
#[command(name = "flatcartag")]
#[command(about = "Label Kubernetes nodes running Flatcar Container Linux", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Defaults to `run`
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file, merged above ./flatcartag.yaml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to a kubeconfig file (out-of-cluster use)
    #[arg(long, global = true)]
    pub kubeconfig: Option<PathBuf>,

    /// Kubernetes API server address, overrides the kubeconfig
    #[arg(long, global = true)]
    pub master: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the controller until interrupted
    Run(RunArgs),

    /// List nodes with their OS descriptor and label state
    Nodes(NodesArgs),

    /// Print the effective configuration after all layers are merged
    Config,
}

impl Default for Commands {
    fn default() -> Self {
        Self::Run(RunArgs::default())
    }
}

impl Cli {
    /// Flag values that override file and environment configuration.
    pub fn overrides(&self) -> ConfigOverrides {
        let workers = match &self.command {
            Some(Commands::Run(args)) => args.workers,
            _ => None,
        };
        ConfigOverrides {
            workers,
            log_level: self.log_level.clone(),
            kubeconfig: self.kubeconfig.clone(),
            master: self.master.clone(),
        }
    }
}
