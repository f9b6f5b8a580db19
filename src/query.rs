//! Listing node status: command resolution, dispatch and parsing.

use serde::Deserialize;

use crate::blocks::split_host_blocks;
use crate::dispatch::{Dispatcher, Operation, Runner};
use crate::error::LavaError;
use crate::record::NodeStatusRecord;

/// Scheduler command names for each logical operation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CommandTable {
    /// Lists every host.
    pub nodes: String,
    /// Describes one host; the node name is appended as an argument.
    pub node: String,
}

impl Default for CommandTable {
    fn default() -> Self {
        Self {
            nodes: "bhosts -l".to_string(),
            node: "bhosts -l".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalCommand<'a> {
    Nodes,
    Node(&'a str),
}

impl LogicalCommand<'_> {
    /// The literal command line, with the scheduler binaries directory prepended.
    pub fn resolve(&self, table: &CommandTable, binaries_dir: &str) -> String {
        match self {
            LogicalCommand::Nodes => format!("{}{}", binaries_dir, table.nodes),
            LogicalCommand::Node(name) => format!("{}{} {}", binaries_dir, table.node, name),
        }
    }
}

/// Queries the cluster for node status.
///
/// Either every host parses or the whole query fails; hosts are never
/// silently dropped.
pub async fn query_nodes<R: Runner + Sync>(
    dispatcher: &Dispatcher<R>,
    node: Option<&str>,
) -> Result<Vec<NodeStatusRecord>, LavaError> {
    let config = dispatcher.config();
    let command = match node {
        Some(name) => LogicalCommand::Node(name),
        None => LogicalCommand::Nodes,
    }
    .resolve(&config.commands, &config.binaries_dir);

    let stdout = dispatcher
        .dispatch(Operation::Shell(&command))
        .await?
        .into_stdout()?;

    let records = split_host_blocks(&stdout)
        .iter()
        .map(|block| NodeStatusRecord::parse(block))
        .collect::<Result<Vec<_>, _>>()?;
    tracing::info!(hosts = records.len(), command = %command, "parsed node status");
    Ok(records)
}
