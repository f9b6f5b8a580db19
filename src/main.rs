use std::time::Duration;

use clap::Parser;
use colored::*;
use futures::future::join_all;

use lava_nodes::config::{Cli, Command};
use lava_nodes::logging::init_logging;
use lava_nodes::{
    create_work_dir, query_nodes, Direction, Dispatcher, LavaError, NodeStatus, NodeStatusRecord,
    Operation, ProcessRunner, TransportConfig,
};

fn colored_status(status: NodeStatus) -> ColoredString {
    match status {
        NodeStatus::Ok => status.as_str().green(),
        NodeStatus::Closed => status.as_str().yellow(),
        NodeStatus::Unavailable | NodeStatus::Unreachable => status.as_str().red(),
        NodeStatus::Unknown => status.as_str().normal(),
    }
}

fn print_table(records: &[NodeStatusRecord]) {
    println!(
        "{:<20} {:<12} {:>6} {:>5} {:>6} {:>5} {:>8} {:>8}",
        "HOST", "STATUS", "CPUF", "MAX", "NJOBS", "RUN", "r15s", "mem"
    );
    let dash = "-".to_string();
    for record in records {
        let total = record.load_groups.as_ref().map(|groups| &groups.total_load);
        println!(
            "{:<20} {:<12} {:>6} {:>5} {:>6} {:>5} {:>8} {:>8}",
            record.name,
            colored_status(record.status),
            record.cpu_factor.as_ref().unwrap_or(&dash),
            record.max_job_slots.as_ref().unwrap_or(&dash),
            record.num_jobs.as_ref().unwrap_or(&dash),
            record.running.as_ref().unwrap_or(&dash),
            total.and_then(|t| t.r15s.as_ref()).unwrap_or(&dash),
            total.and_then(|t| t.mem.as_ref()).unwrap_or(&dash),
        );
    }
}

async fn run_nodes(
    dispatcher: &Dispatcher,
    names: &[String],
    json: bool,
) -> Result<(), LavaError> {
    let records = if names.is_empty() {
        query_nodes(dispatcher, None).await?
    } else {
        // One independent scheduler process per requested node.
        let queries = names.iter().map(|name| query_nodes(dispatcher, Some(name.as_str())));
        let mut records = Vec::with_capacity(names.len());
        for result in join_all(queries).await {
            records.extend(result?);
        }
        records
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        print_table(&records);
    }
    Ok(())
}

async fn run_copy(
    dispatcher: &Dispatcher,
    source: &str,
    destination: &str,
    direction: Direction,
) -> Result<(), LavaError> {
    dispatcher
        .dispatch(Operation::Copy {
            source,
            destination,
            direction,
        })
        .await?
        .into_stdout()?;
    eprintln!("[Lava] Copied {} to {}", source, destination);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), LavaError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = TransportConfig::from_file(&cli.config)?;
    let mut runner = ProcessRunner::new();
    if let Some(secs) = cli.timeout {
        runner = runner.with_timeout(Duration::from_secs(secs));
    }
    let dispatcher = Dispatcher::with_runner(config, runner);

    match &cli.command {
        Command::Nodes { names, json } => run_nodes(&dispatcher, names, *json).await?,
        Command::Send {
            source,
            destination,
        } => run_copy(&dispatcher, source, destination, Direction::Send).await?,
        Command::Retrieve {
            source,
            destination,
        } => run_copy(&dispatcher, source, destination, Direction::Retrieve).await?,
        Command::Workdir => {
            let working_dir = dispatcher.config().working_dir.clone().ok_or_else(|| {
                LavaError::Configuration("'workingDir' is required to create a directory".into())
            })?;
            println!("{}", create_work_dir(&dispatcher, &working_dir).await?);
        }
    };

    Ok(())
}
