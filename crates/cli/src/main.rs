use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use finback_conf::OperatorConf;
use finback_core::{Fcid, Fjid};
use finback_observer::FlinkObserver;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "finbackctl", version, about = "Finback: Flink clusters on Kubernetes")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// Kubernetes namespace
    #[arg(long = "ns", global = true, default_value = "default")]
    namespace: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output {
    Human,
    Json,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start tracking a Flink cluster
    Track {
        /// Flink cluster id
        cluster: String,
    },
    /// Stop tracking a Flink cluster and purge its cached observations
    Untrack {
        /// Flink cluster id
        cluster: String,
    },
    /// Resolve the cluster's Flink REST endpoint
    Endpoint {
        /// Flink cluster id
        cluster: String,
        /// Bypass the cache and ask Kubernetes directly
        #[arg(long = "direct", action = ArgAction::SetTrue)]
        direct: bool,
    },
    /// List job ids of a cluster
    Jobs {
        /// Flink cluster id
        cluster: String,
    },
    /// Watch a savepoint trigger until it completes or fails
    Savepoint {
        /// Flink cluster id
        cluster: String,
        /// Job id
        job: String,
        /// Trigger id returned by the savepoint request
        trigger: String,
        /// Deadline in seconds
        #[arg(long = "timeout", default_value_t = 60)]
        timeout_secs: u64,
    },
    /// Delete a cluster's jobmanager deployment
    Kill {
        /// Flink cluster id
        cluster: String,
    },
}

fn init_tracing() {
    let env = std::env::var("FINBACK_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("FINBACK_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid FINBACK_METRICS_ADDR; expected host:port");
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!(error = %e, "command failed");
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let conf = OperatorConf::from_env();
    let observer = FlinkObserver::spawn_single_node(1, &conf);

    match cli.command {
        Commands::Track { cluster } => {
            let fcid = Fcid::new(cluster, cli.namespace);
            info!(fcid = %fcid, "track invoked");
            observer.track_cluster(&fcid).await?;
            println!("tracking {}", fcid);
        }
        Commands::Untrack { cluster } => {
            let fcid = Fcid::new(cluster, cli.namespace);
            info!(fcid = %fcid, "untrack invoked");
            observer.untrack_cluster(&fcid).await?;
            println!("untracked {}", fcid);
        }
        Commands::Endpoint { cluster, direct } => {
            let fcid = Fcid::new(cluster, cli.namespace);
            let ep = observer.retrieve_rest_endpoint(&fcid, direct).await?;
            match cli.output {
                Output::Human => println!("{} -> {}", fcid, ep),
                Output::Json => println!("{}", serde_json::to_string_pretty(&ep)?),
            }
        }
        Commands::Jobs { cluster } => {
            let fcid = Fcid::new(cluster, cli.namespace);
            let ids = observer.list_job_ids(&fcid).await?;
            match cli.output {
                Output::Human => {
                    for id in ids {
                        println!("{}", id);
                    }
                }
                Output::Json => println!("{}", serde_json::to_string_pretty(&ids)?),
            }
        }
        Commands::Savepoint { cluster, job, trigger, timeout_secs } => {
            let fjid = Fjid::new(Fcid::new(cluster, cli.namespace), job);
            let status = observer
                .watch_savepoint_trigger(&fjid, &trigger, Duration::from_secs(timeout_secs))
                .await?;
            println!("{:?}", status);
        }
        Commands::Kill { cluster } => {
            let fcid = Fcid::new(cluster, cli.namespace);
            finback_deploy::kill_cluster(&fcid, &conf).await?;
            println!("killed {}", fcid);
        }
    }
    Ok(())
}
