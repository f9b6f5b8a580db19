//! End-to-end tests for node queries.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

use lava_nodes::{
    create_work_dir, query_nodes, Dispatcher, ExecutionResult, Invocation, LavaError, NodeStatus,
    ProcessRunner, Runner, TransportConfig,
};

const BHOSTS: &str = "\
HOST  hostA
STATUS           CPUF  JL/U    MAX  NJOBS    RUN  SSUSP  USUSP    RSV DISPATCH_WINDOW
ok              60.00     -      8      1      1      0      0      0      -

 CURRENT LOAD USED FOR SCHEDULING:
              r15s   r1m  r15m    ut    pg    io   ls    it   tmp   swp   mem
 Total         0.0   0.1   0.2    3%   0.0     6    2     0  9999M 2047M 7412M
 Reserved      0.0   0.0   0.0    0%   0.0     0    0     0    0M    0M    0M

 LOAD THRESHOLD USED FOR SCHEDULING:
              r15s   r1m  r15m    ut    pg    io   ls    it   tmp   swp   mem
 loadSched       -     -     -     -     -     -    -     -     -     -     -
 loadStop        -     -     -     -     -     -    -     -     -     -     -

HOST  hostB
STATUS           CPUF  JL/U    MAX  NJOBS    RUN  SSUSP  USUSP    RSV DISPATCH_WINDOW
unavail          1.00     -      2      0      0      0      0      0      -

HOST  hostC
STATUS           CPUF  JL/U    MAX  NJOBS    RUN  SSUSP  USUSP    RSV DISPATCH_WINDOW
closed_Full     30.00     2      4      4      4      0      0      0      -

 CURRENT LOAD USED FOR SCHEDULING:
              r15s   r1m  r15m    ut    pg    io   ls    it   tmp   swp   mem
 Total         3.9   4.0   3.8  100%   0.0    12    0    44  5000M 2047M 1024M
 Reserved      0.0   0.0   0.0    0%   0.0     0    0     0    0M    0M    0M

 LOAD THRESHOLD USED FOR SCHEDULING:
              r15s   r1m  r15m    ut    pg    io   ls    it   tmp   swp   mem
 loadSched       -     -     -     -     -     -    -     -     -     -     -
 loadStop        -     -     -     -     -     -    -     -     -     -     -
";

fn ssh_config() -> TransportConfig {
    TransportConfig::from_yaml_str(
        r#"
mode: ssh
useSharedDir: false
username: lava
serverName: head.cluster
identityFile: /home/lava/.ssh/id_rsa
sshExecutable: /usr/bin/ssh
scpExecutable: /usr/bin/scp
localShellExecutable: /bin/sh
localCopyExecutable: /bin/cp
schedulerBinariesDir: /opt/openlava/bin/
workingDir: /scratch/lava/
"#,
    )
    .unwrap()
}

fn local_config(shell: &str, binaries_dir: &str, nodes_command: &str) -> TransportConfig {
    TransportConfig::from_yaml_str(&format!(
        r#"
mode: local
useSharedDir: false
sshExecutable: ssh
scpExecutable: scp
localShellExecutable: {}
localCopyExecutable: /bin/cp
schedulerBinariesDir: "{}"
commands:
  nodes: "{}"
  node: "{}"
"#,
        shell, binaries_dir, nodes_command, nodes_command
    ))
    .unwrap()
}

/// Mock runner that records invocations and replays canned output.
struct MockRunner {
    invocations: Arc<Mutex<Vec<Invocation>>>,
    stdout: String,
    stderr: String,
}

impl MockRunner {
    fn new(stdout: &str) -> Self {
        Self {
            invocations: Arc::new(Mutex::new(Vec::new())),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    fn with_stderr(mut self, stderr: &str) -> Self {
        self.stderr = stderr.to_string();
        self
    }

    fn invocations(&self) -> Arc<Mutex<Vec<Invocation>>> {
        Arc::clone(&self.invocations)
    }
}

#[async_trait]
impl Runner for MockRunner {
    async fn run(&self, invocation: &Invocation) -> Result<ExecutionResult, LavaError> {
        self.invocations.lock().await.push(invocation.clone());
        Ok(ExecutionResult {
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
            exit_status: Some(0),
        })
    }
}

#[tokio::test]
async fn test_e2e_full_listing_over_ssh() {
    let runner = MockRunner::new(BHOSTS);
    let invocations = runner.invocations();
    let dispatcher = Dispatcher::with_runner(ssh_config(), runner);

    let records = query_nodes(&dispatcher, None).await.unwrap();

    let invocations = invocations.lock().await;
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].program, "/usr/bin/ssh");
    assert_eq!(
        invocations[0].args,
        vec![
            "lava@head.cluster",
            "-o",
            "StrictHostKeyChecking=no",
            "-i",
            "/home/lava/.ssh/id_rsa",
            "/opt/openlava/bin/bhosts",
            "-l",
        ]
    );

    let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["hostA", "hostB", "hostC"]);
    assert_eq!(records[0].status, NodeStatus::Ok);
    assert_eq!(records[1].status, NodeStatus::Unavailable);
    assert_eq!(records[2].status, NodeStatus::Closed);
    assert!(records[1].load_groups.is_none());

    let host_a = records[0].load_groups.as_ref().unwrap();
    assert_eq!(host_a.total_load.tmp.as_deref(), Some("9999M"));
    assert_eq!(host_a.load_stop.mem, None);
    let host_c = records[2].load_groups.as_ref().unwrap();
    assert_eq!(host_c.total_load.ut.as_deref(), Some("100%"));
    assert_eq!(records[2].job_limit_per_user.as_deref(), Some("2"));
}

#[tokio::test]
async fn test_e2e_single_node_appends_name() {
    let runner = MockRunner::new(BHOSTS.split("\nHOST  hostB").next().unwrap());
    let invocations = runner.invocations();
    let dispatcher = Dispatcher::with_runner(ssh_config(), runner);

    let records = query_nodes(&dispatcher, Some("hostA")).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "hostA");

    let invocations = invocations.lock().await;
    let tail: Vec<_> = invocations[0].args.iter().skip(5).cloned().collect();
    assert_eq!(tail, vec!["/opt/openlava/bin/bhosts", "-l", "hostA"]);
}

#[tokio::test]
async fn test_e2e_stderr_aborts_before_parsing() {
    let runner = MockRunner::new(BHOSTS).with_stderr("ssh: connect to host head.cluster: No route\n");
    let dispatcher = Dispatcher::with_runner(ssh_config(), runner);

    let err = query_nodes(&dispatcher, None).await.unwrap_err();
    assert!(err.is_transport());
    assert!(matches!(err, LavaError::Transport(ref msg) if msg.contains("No route")));
}

#[tokio::test]
async fn test_e2e_malformed_host_fails_whole_query() {
    let broken = format!("{}HOST  hostD\nSTATUS CPUF\nok 1.0\n", BHOSTS);
    let dispatcher = Dispatcher::with_runner(ssh_config(), MockRunner::new(&broken));

    match query_nodes(&dispatcher, None).await {
        Err(LavaError::MalformedRecord { host, .. }) => assert_eq!(host, "hostD"),
        other => panic!("expected malformed record, got {:?}", other),
    }
}

#[tokio::test]
async fn test_e2e_no_hosts_is_empty_not_error() {
    let dispatcher = Dispatcher::with_runner(ssh_config(), MockRunner::new("\n  \n"));
    let records = query_nodes(&dispatcher, None).await.unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_e2e_stdout_without_marker_is_empty() {
    let dispatcher =
        Dispatcher::with_runner(ssh_config(), MockRunner::new("No matching host found\n"));
    let records = query_nodes(&dispatcher, None).await.unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn test_e2e_banner_before_first_host_is_ignored() {
    let stdout = format!(
        "bhosts: license expires soon\n{}",
        BHOSTS.split("\nHOST  hostB").next().unwrap()
    );
    let dispatcher = Dispatcher::with_runner(ssh_config(), MockRunner::new(&stdout));
    let records = query_nodes(&dispatcher, None).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "hostA");
    assert_eq!(records[0].status, NodeStatus::Ok);
}

#[tokio::test]
async fn test_e2e_work_dir_over_ssh() {
    let runner = MockRunner::new("");
    let invocations = runner.invocations();
    let dispatcher = Dispatcher::with_runner(ssh_config(), runner);

    let dir = create_work_dir(&dispatcher, "/scratch/lava/").await.unwrap();
    assert!(dir.starts_with("/scratch/lava/"));
    assert_eq!(dir.len(), "/scratch/lava/".len() + 36);

    let invocations = invocations.lock().await;
    let tail: Vec<_> = invocations[0].args.iter().skip(5).cloned().collect();
    assert_eq!(tail, vec!["mkdir".to_string(), "-p".to_string(), dir]);
}

#[tokio::test]
async fn test_e2e_work_dir_reports_stderr() {
    let runner = MockRunner::new("").with_stderr("mkdir: Permission denied\n");
    let dispatcher = Dispatcher::with_runner(ssh_config(), runner);
    let err = create_work_dir(&dispatcher, "/root").await.unwrap_err();
    assert!(matches!(err, LavaError::Transport(_)));
}

#[cfg(unix)]
#[tokio::test]
async fn test_e2e_local_process_output_is_parsed() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("bhosts.out"), BHOSTS).unwrap();
    let binaries_dir = format!("{}/", dir.path().display());
    let dispatcher = Dispatcher::new(local_config("/bin/cat", &binaries_dir, "bhosts.out"));

    let records = query_nodes(&dispatcher, None).await.unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[2].name, "hostC");
}

#[cfg(unix)]
#[tokio::test]
async fn test_e2e_timeout_kills_hanging_command() {
    let runner = ProcessRunner::new().with_timeout(Duration::from_millis(200));
    let dispatcher = Dispatcher::with_runner(local_config("/bin/sleep", "", "5"), runner);

    let err = query_nodes(&dispatcher, None).await.unwrap_err();
    assert!(matches!(err, LavaError::Timeout { .. }));
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_e2e_missing_binary_is_transport_error() {
    let dispatcher = Dispatcher::new(local_config("/nonexistent/lava-shell", "", "bhosts"));
    let err = query_nodes(&dispatcher, None).await.unwrap_err();
    assert!(matches!(err, LavaError::Spawn { .. }));
    assert!(err.is_transport());
}

#[test]
fn test_config_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"mode: local\nuseSharedDir: true\nsshExecutable: ssh\nscpExecutable: scp\nlocalShellExecutable: /bin/sh\nlocalCopyExecutable: cp\nschedulerBinariesDir: /usr/bin/\n")
        .unwrap();
    let config = TransportConfig::from_file(file.path()).unwrap();
    assert!(config.use_shared_dir);
    assert_eq!(config.binaries_dir, "/usr/bin/");

    let missing = TransportConfig::from_file(std::path::Path::new("/nonexistent/lava.yaml"));
    assert!(matches!(missing, Err(LavaError::ConfigFile { .. })));
}
