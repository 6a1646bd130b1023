//! `flatcartag nodes`: show which nodes match and which are labeled.

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Color};
use serde::Serialize;

use crate::cli::output::{list_table, output, render_list, truncate, CommandOutput};
use crate::domain::models::{Config, Node, TargetConfig};
use crate::domain::ports::ObjectRepository;
use crate::infrastructure::k8s::{create_client, KubeNodeRepository};

#[derive(Args, Debug, Default)]
pub struct NodesArgs {
    /// Only show nodes whose OS matches the signature
    #[arg(long)]
    pub matching: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NodeRow {
    pub name: String,
    pub os: String,
    pub matches: bool,
    pub labeled: bool,
}

impl NodeRow {
    pub fn from_node(node: &Node, target: &TargetConfig) -> Self {
        Self {
            name: node.name.clone(),
            os: node.os_descriptor(target.os_field).to_string(),
            matches: target.matches(node),
            labeled: node.label(&target.label_key) == Some(target.label_value.as_str()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct NodeListOutput {
    pub label: String,
    pub nodes: Vec<NodeRow>,
}

impl NodeListOutput {
    pub fn new(nodes: &[Node], target: &TargetConfig, matching_only: bool) -> Self {
        let mut rows: Vec<NodeRow> = nodes
            .iter()
            .map(|node| NodeRow::from_node(node, target))
            .filter(|row| !matching_only || row.matches)
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            label: format!("{}={}", target.label_key, target.label_value),
            nodes: rows,
        }
    }
}

impl CommandOutput for NodeListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["name", "os", "matches", "labeled"]);
        for row in &self.nodes {
            let labeled = match (row.matches, row.labeled) {
                (true, false) => Cell::new("no").fg(Color::Yellow),
                (_, true) => Cell::new("yes").fg(Color::Green),
                (false, false) => Cell::new("no"),
            };
            table.add_row(vec![
                Cell::new(&row.name),
                Cell::new(truncate(&row.os, 48)),
                Cell::new(if row.matches { "yes" } else { "no" }),
                labeled,
            ]);
        }
        render_list("node", &table, self.nodes.len())
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: NodesArgs, config: &Config, json_mode: bool) -> Result<()> {
    let client = create_client(&config.kube)
        .await
        .context("Failed to build Kubernetes client")?;
    let repository = KubeNodeRepository::new(client);

    let nodes = repository
        .list_nodes()
        .await
        .context("Failed to list nodes")?;

    output(
        &NodeListOutput::new(&nodes, &config.target, args.matching),
        json_mode,
    );
    Ok(())
}
