//! Lava Nodes: structured node status from an OpenLava cluster.

// Command line arguments and transport configuration.
pub mod config;
// Error handling.
pub mod error;
// Turning operations into process invocations.
pub mod dispatch;
// Splitting scheduler output per host.
pub mod blocks;
// Parsing one host's block into a record.
pub mod record;
// Node listing queries.
pub mod query;
// Per-job working directories.
pub mod workdir;
// Tracing subscriber setup.
pub mod logging;

pub use blocks::split_host_blocks;
pub use config::{Executables, SshTarget, Transport, TransportConfig};
pub use dispatch::{Direction, Dispatcher, ExecutionResult, Invocation, Operation, ProcessRunner, Runner};
pub use error::LavaError;
pub use query::{query_nodes, CommandTable, LogicalCommand};
pub use record::{LoadGroup, LoadGroups, LoadMetrics, NodeStatus, NodeStatusRecord};
pub use workdir::create_work_dir;
