//! Configuration for Lava Nodes.
//!
//! Holds the clap structs for command line arguments and the transport
//! configuration read from the YAML config file.

use std::fs::File;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Deserialize;

use crate::error::LavaError;
use crate::query::CommandTable;

#[derive(Parser)]
#[command(version, author, about)]
pub struct Cli {
    /// Transport configuration file. Defaults to `lava.yaml`
    #[arg(long, short, default_value = "lava.yaml")]
    pub config: PathBuf,

    /// Kill the scheduler command if it runs longer than this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(long, short, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List node status for the whole cluster, or for the given nodes
    Nodes {
        /// Node names. Queries every node when omitted.
        names: Vec<String>,
        /// Print records as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Copy a local file to the cluster
    Send { source: String, destination: String },
    /// Copy a file from the cluster to the local machine
    Retrieve { source: String, destination: String },
    /// Create a fresh uniquely named directory under `workingDir`
    Workdir,
}

/// How commands reach the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// Commands run on this machine.
    Local,
    /// Commands run on the scheduler's server through SSH.
    Ssh(SshTarget),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub username: String,
    pub server_name: String,
    pub identity_file: String,
}

impl SshTarget {
    /// `user@host`, as SSH and SCP expect it.
    pub fn user_host(&self) -> String {
        format!("{}@{}", self.username, self.server_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executables {
    pub ssh: String,
    pub scp: String,
    pub local_shell: String,
    pub local_copy: String,
}

/// Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub transport: Transport,
    /// Copies bypass the transport entirely when a shared filesystem is available.
    pub use_shared_dir: bool,
    pub executables: Executables,
    /// Prepended verbatim to every scheduler command name.
    pub binaries_dir: String,
    pub working_dir: Option<String>,
    pub commands: CommandTable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Local,
    Ssh,
}

/// The config file as written. Every key is checked in `TryFrom`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    mode: Option<Mode>,
    use_shared_dir: Option<bool>,
    username: Option<String>,
    server_name: Option<String>,
    identity_file: Option<String>,
    ssh_executable: Option<String>,
    scp_executable: Option<String>,
    local_shell_executable: Option<String>,
    local_copy_executable: Option<String>,
    scheduler_binaries_dir: Option<String>,
    working_dir: Option<String>,
    commands: Option<CommandTable>,
}

fn required<T>(value: Option<T>, key: &str) -> Result<T, LavaError> {
    value.ok_or_else(|| LavaError::Configuration(format!("missing required key '{}'", key)))
}

fn required_str(value: Option<String>, key: &str) -> Result<String, LavaError> {
    match required(value, key)? {
        value if value.trim().is_empty() => Err(LavaError::Configuration(format!(
            "key '{}' must not be empty",
            key
        ))),
        value => Ok(value),
    }
}

impl TryFrom<RawConfig> for TransportConfig {
    type Error = LavaError;

    fn try_from(raw: RawConfig) -> Result<Self, Self::Error> {
        let transport = match required(raw.mode, "mode")? {
            Mode::Local => Transport::Local,
            Mode::Ssh => Transport::Ssh(SshTarget {
                username: required_str(raw.username, "username")?,
                server_name: required_str(raw.server_name, "serverName")?,
                identity_file: required_str(raw.identity_file, "identityFile")?,
            }),
        };
        Ok(Self {
            transport,
            use_shared_dir: required(raw.use_shared_dir, "useSharedDir")?,
            executables: Executables {
                ssh: required_str(raw.ssh_executable, "sshExecutable")?,
                scp: required_str(raw.scp_executable, "scpExecutable")?,
                local_shell: required_str(raw.local_shell_executable, "localShellExecutable")?,
                local_copy: required_str(raw.local_copy_executable, "localCopyExecutable")?,
            },
            // An empty prefix is legitimate: the scheduler binaries are on PATH.
            binaries_dir: required(raw.scheduler_binaries_dir, "schedulerBinariesDir")?,
            working_dir: raw.working_dir,
            commands: raw.commands.unwrap_or_default(),
        })
    }
}

impl TransportConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, LavaError> {
        let raw: RawConfig = serde_yaml::from_str(yaml).map_err(|e| LavaError::ConfigFile {
            path: "<inline>".to_string(),
            reason: e.to_string(),
        })?;
        raw.try_into()
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self, LavaError> {
        let display = path.display().to_string();
        let file = File::open(path).map_err(|e| LavaError::ConfigFile {
            path: display.clone(),
            reason: e.to_string(),
        })?;
        let raw: RawConfig = serde_yaml::from_reader(file).map_err(|e| LavaError::ConfigFile {
            path: display,
            reason: e.to_string(),
        })?;
        raw.try_into()
    }
}
