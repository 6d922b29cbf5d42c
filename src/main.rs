use clap::{Parser, Subcommand};
use slurm_watch::{NodeInventory, StateCounts, WatchResult, config, logging, shutdown};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "slurm-watch", version, about = "Watch a Slurm cluster behind a bastion host")]
struct Cli {
    /// Log at debug level unless SLURMWATCH_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll the cluster and send alerts until interrupted
    Run {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Print the node inventory
    Status,
    /// Print queue occupancy per user
    Queue,
    /// Show memory, control fields and current activity of one node
    Inspect {
        /// Node name; an all-digit name is expanded with SLURMWATCH_NODE_PREFIX
        node: String,
    },
    /// Print recorded state counts
    History {
        #[arg(long, default_value_t = 7)]
        days: u32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(error = %error, "slurm-watch failed");
            eprintln!("error: {}", error);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> WatchResult<()> {
    let watch = config::builder_from_env()?.build()?;

    match command {
        Command::Run { once: true } => {
            let mut poll_loop = watch.into_poll_loop().await?;
            let report = poll_loop.run_once().await;
            println!(
                "online: {} | nodes: {} | alerts: {}",
                report.online,
                report.nodes_seen,
                report.alerts.len()
            );
        }
        Command::Run { once: false } => {
            let token = shutdown::install_shutdown_handler();
            let poll_loop = watch.into_poll_loop().await?;
            let engine = poll_loop.run(token).await;
            tracing::info!(tracked_jobs = engine.tracked_jobs().len(), "exiting");
        }
        Command::Status => print_status(&watch.status().await?),
        Command::Queue => {
            let queue = watch.queue().await?;
            println!("{} jobs in queue", queue.total_jobs);
            for (user, count) in queue.top_users(usize::MAX) {
                println!("  {:<16} {}", user, count);
            }
        }
        Command::Inspect { node } => {
            let inspection = watch.inspect(&node).await?;
            println!("{}", inspection.name);
            match &inspection.record {
                Some(record) => {
                    println!(
                        "  state: {} ({}) | partition: {}",
                        record.canonical_state.label(),
                        record.raw_state,
                        record.partition
                    );
                    println!(
                        "  cpus allocated: {}/{} | memory allocated: {}/{} MB",
                        record.cpu_allocated,
                        record.cpu_total,
                        record.memory_allocated_mb,
                        record.memory_total_mb
                    );
                }
                None => println!("  not in inventory"),
            }
            match inspection.control.as_ref().and_then(|c| c.cpu_load()) {
                Some(load) => println!("  load: {:.2}", load),
                None if inspection.control.is_none() => println!("  no control data"),
                None => {}
            }
            let memory = inspection.memory;
            if memory.is_unavailable() {
                println!("  memory: unavailable");
            } else {
                println!(
                    "  memory: {:.1}GB free of {:.1}GB ({:.1}GB used)",
                    memory.free_gb, memory.total_gb, memory.used_gb
                );
            }
            println!("  {}", inspection.activity);
        }
        Command::History { days } => {
            let points = watch.history(days).await?;
            if points.is_empty() {
                println!("no history in the last {} days", days);
            }
            for point in points {
                let when = chrono::DateTime::from_timestamp(point.timestamp as i64, 0)
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| point.timestamp.to_string());
                print_counts(&when, &point.counts);
            }
        }
    }
    Ok(())
}

fn print_status(inventory: &NodeInventory) {
    for record in inventory.values() {
        let marker = if record.canonical_state.is_available() { "*" } else { " " };
        println!(
            "{}{:<12} {:<10} {:<14} {:>4} cpus {:>8} MB",
            marker,
            record.name,
            record.partition,
            record.raw_state,
            record.cpu_total,
            record.memory_total_mb
        );
    }
    print_counts("total", &StateCounts::from_inventory(inventory));
}

fn print_counts(label: &str, counts: &StateCounts) {
    println!(
        "{}: idle {} | mixed {} | alloc {} | down {} | nodes {}",
        label,
        counts.idle,
        counts.mixed,
        counts.allocated,
        counts.down,
        counts.total()
    );
}
