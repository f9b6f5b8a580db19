//! Node status records parsed from one host's `bhosts -l` block.
//!
//! A block looks like this (blank lines already removed by the splitter):
//!
//! ```text
//! node1
//! STATUS           CPUF  JL/U    MAX  NJOBS    RUN  SSUSP  USUSP    RSV DISPATCH_WINDOW
//! ok              60.00     -      8      0      0      0      0      0      -
//!  CURRENT LOAD USED FOR SCHEDULING:
//!               r15s   r1m  r15m    ut    pg    io   ls    it   tmp   swp   mem
//!  Total         0.0   0.0   0.0    0%   0.0     0    0  1234  100M  500M  200M
//!  Reserved      0.0   0.0   0.0    0%   0.0     0    0     0    0M    0M    0M
//!  LOAD THRESHOLD USED FOR SCHEDULING:
//!               r15s   r1m  r15m    ut    pg    io   ls    it   tmp   swp   mem
//!  loadSched       -     -     -     -     -     -    -     -     -     -     -
//!  loadStop        -     -     -     -     -     -    -     -     -     -     -
//! ```
//!
//! Everything after the host line is addressed by fixed row offsets.

use serde::Serialize;

use crate::error::LavaError;

/// Placeholder the scheduler prints for "no value".
const SENTINEL: &str = "-";

/// First token of the column header line that precedes the status row.
const STATUS_HEADER: &str = "STATUS";

/// Row offsets (counted after the host line) of the load groups.
pub const LOAD_ROWS: [(LoadGroup, usize); 4] = [
    (LoadGroup::TotalLoad, 4),
    (LoadGroup::ReservedLoad, 5),
    (LoadGroup::LoadSched, 8),
    (LoadGroup::LoadStop, 9),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NodeStatus {
    #[serde(rename = "OK")]
    Ok,
    Unavailable,
    Unreachable,
    Closed,
    Unknown,
}

impl From<&str> for NodeStatus {
    fn from(token: &str) -> Self {
        match token {
            "ok" => NodeStatus::Ok,
            "unavail" => NodeStatus::Unavailable,
            "unreach" => NodeStatus::Unreachable,
            "closed" => NodeStatus::Closed,
            // closed_Adm, closed_Full, closed_Excl, ...
            other if other.starts_with("closed_") => NodeStatus::Closed,
            _ => NodeStatus::Unknown,
        }
    }
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Ok => "OK",
            NodeStatus::Unavailable => "Unavailable",
            NodeStatus::Unreachable => "Unreachable",
            NodeStatus::Closed => "Closed",
            NodeStatus::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadGroup {
    TotalLoad,
    ReservedLoad,
    LoadSched,
    LoadStop,
}

/// One load row. Every field is `None` when the scheduler printed `-`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadMetrics {
    pub r15s: Option<String>,
    pub r1m: Option<String>,
    pub r15m: Option<String>,
    pub ut: Option<String>,
    pub pg: Option<String>,
    pub io: Option<String>,
    pub ls: Option<String>,
    pub it: Option<String>,
    pub tmp: Option<String>,
    pub swp: Option<String>,
    pub mem: Option<String>,
}

impl LoadMetrics {
    /// The first token is the row label and is discarded.
    fn from_row(row: &str) -> Self {
        let [r15s, r1m, r15m, ut, pg, io, ls, it, tmp, swp, mem] =
            columns(row.split_whitespace().skip(1));
        Self {
            r15s,
            r1m,
            r15m,
            ut,
            pg,
            io,
            ls,
            it,
            tmp,
            swp,
            mem,
        }
    }
}

/// Always all four groups, never a subset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadGroups {
    pub total_load: LoadMetrics,
    pub reserved_load: LoadMetrics,
    pub load_sched: LoadMetrics,
    pub load_stop: LoadMetrics,
}

impl LoadGroups {
    pub fn get(&self, group: LoadGroup) -> &LoadMetrics {
        match group {
            LoadGroup::TotalLoad => &self.total_load,
            LoadGroup::ReservedLoad => &self.reserved_load,
            LoadGroup::LoadSched => &self.load_sched,
            LoadGroup::LoadStop => &self.load_stop,
        }
    }

    fn get_mut(&mut self, group: LoadGroup) -> &mut LoadMetrics {
        match group {
            LoadGroup::TotalLoad => &mut self.total_load,
            LoadGroup::ReservedLoad => &mut self.reserved_load,
            LoadGroup::LoadSched => &mut self.load_sched,
            LoadGroup::LoadStop => &mut self.load_stop,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatusRecord {
    pub name: String,
    pub status: NodeStatus,
    pub cpu_factor: Option<String>,
    pub job_limit_per_user: Option<String>,
    pub max_job_slots: Option<String>,
    pub num_jobs: Option<String>,
    pub running: Option<String>,
    pub system_suspended: Option<String>,
    pub user_suspended: Option<String>,
    pub reserved: Option<String>,
    pub dispatch_window: Option<String>,
    /// Present iff `status` is not `Unavailable`.
    #[serde(flatten)]
    pub load_groups: Option<LoadGroups>,
}

impl NodeStatusRecord {
    /// Parses one host block as produced by `split_host_blocks`.
    pub fn parse(lines: &[&str]) -> Result<Self, LavaError> {
        let (name, rows) = match lines.split_first() {
            Some((name, rows)) => (name.trim(), rows),
            None => return Err(LavaError::malformed("", "empty host block")),
        };

        let status_row = status_row(rows)
            .ok_or_else(|| LavaError::malformed(name, "missing status row"))?;
        let mut tokens = status_row.split_whitespace();
        let status = tokens
            .next()
            .map(NodeStatus::from)
            .ok_or_else(|| LavaError::malformed(name, "empty status row"))?;
        let [cpu_factor, job_limit_per_user, max_job_slots, num_jobs, running, system_suspended, user_suspended, reserved, dispatch_window] =
            columns(tokens);

        let load_groups = if status == NodeStatus::Unavailable {
            None
        } else {
            Some(load_groups(name, rows)?)
        };

        Ok(Self {
            name: name.to_string(),
            status,
            cpu_factor,
            job_limit_per_user,
            max_job_slots,
            num_jobs,
            running,
            system_suspended,
            user_suspended,
            reserved,
            dispatch_window,
            load_groups,
        })
    }
}

/// The status row follows the column header. Without a header it is the first row.
fn status_row<'a>(rows: &[&'a str]) -> Option<&'a str> {
    let first = *rows.first()?;
    if first.split_whitespace().next() == Some(STATUS_HEADER) {
        rows.get(1).copied()
    } else {
        Some(first)
    }
}

fn load_groups(name: &str, rows: &[&str]) -> Result<LoadGroups, LavaError> {
    let mut groups = LoadGroups {
        total_load: LoadMetrics::default(),
        reserved_load: LoadMetrics::default(),
        load_sched: LoadMetrics::default(),
        load_stop: LoadMetrics::default(),
    };
    for (group, offset) in LOAD_ROWS {
        let row = rows.get(offset).ok_or_else(|| {
            LavaError::malformed(
                name,
                format!(
                    "expected a {:?} row at offset {}, block has {} rows",
                    group,
                    offset,
                    rows.len()
                ),
            )
        })?;
        *groups.get_mut(group) = LoadMetrics::from_row(row);
    }
    Ok(groups)
}

/// Takes the next `N` tokens positionally. Missing tokens and `-` are `None`.
fn columns<'a, const N: usize>(mut tokens: impl Iterator<Item = &'a str>) -> [Option<String>; N] {
    std::array::from_fn(|_| tokens.next().and_then(value))
}

fn value(token: &str) -> Option<String> {
    if token == SENTINEL {
        None
    } else {
        Some(token.to_string())
    }
}
