// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use pizza_hunt::{
    ConnectivityMonitor, HttpPizzaClient, NewPizza, PendingQueue, PizzaApi, PizzaHuntConfig,
    PizzaSize, PizzaSubmitter, SubmitOutcome, SyncAgent,
};

/// Pizza Hunt server and offline-first client
#[derive(Parser, Debug)]
#[command(name = "pizza-hunt", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP service
    Serve {
        /// Address to listen on (overrides PIZZA_HUNT_BIND_ADDR)
        #[arg(long)]
        bind: Option<String>,
        /// Document store URL (overrides PIZZA_HUNT_DATABASE_URL)
        #[arg(long)]
        database_url: Option<String>,
    },
    /// Watch connectivity and sync queued pizzas until Ctrl+C
    Sync {
        #[arg(long)]
        server_url: Option<String>,
        #[arg(long)]
        queue_path: Option<String>,
    },
    /// Create one pizza, queueing it locally if the server is unreachable
    Submit {
        #[arg(long)]
        name: String,
        #[arg(long)]
        by: String,
        #[arg(long, default_value = "Large")]
        size: PizzaSize,
        /// Comma separated
        #[arg(long, value_delimiter = ',')]
        toppings: Vec<String>,
        #[arg(long)]
        server_url: Option<String>,
        #[arg(long)]
        queue_path: Option<String>,
    },
}

type CliResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[tokio::main]
async fn main() -> ExitCode {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let mut config = match PizzaHuntConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let result: CliResult = match cli.command {
        Command::Serve { bind, database_url } => {
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            if database_url.is_some() {
                config.database_url = database_url;
            }
            pizza_hunt::server::serve(&config).await.map_err(Into::into)
        }
        Command::Sync { server_url, queue_path } => {
            override_client(&mut config, server_url, queue_path);
            run_sync(&config).await
        }
        Command::Submit {
            name,
            by,
            size,
            toppings,
            server_url,
            queue_path,
        } => {
            override_client(&mut config, server_url, queue_path);
            let pizza = NewPizza::new(name, by).with_size(size).with_toppings(toppings);
            run_submit(&config, pizza).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            ExitCode::FAILURE
        }
    }
}

fn override_client(config: &mut PizzaHuntConfig, server_url: Option<String>, queue_path: Option<String>) {
    if let Some(url) = server_url {
        config.server_url = url;
    }
    if let Some(path) = queue_path {
        config.queue_path = path;
    }
}

async fn run_sync(config: &PizzaHuntConfig) -> CliResult {
    let queue = Arc::new(PendingQueue::open(&config.queue_path, config.queue_max_items).await?);
    let api: Arc<dyn PizzaApi> =
        Arc::new(HttpPizzaClient::new(&config.server_url, config.request_timeout())?);
    let monitor = Arc::new(ConnectivityMonitor::new(false, config.offline_failure_threshold));

    // Learn the real state before the agent decides whether to drain at start.
    monitor.probe(api.as_ref()).await;

    let agent = Arc::new(SyncAgent::new(queue.clone(), api.clone(), config.request_timeout()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let probes = tokio::spawn(monitor.clone().run_probes(
        api,
        config.probe_interval(),
        shutdown_rx.clone(),
    ));
    let sync = tokio::spawn(agent.clone().run(monitor, shutdown_rx));

    info!(server = %config.server_url, queue = %queue.path(), "Sync running, Ctrl+C to stop");
    pizza_hunt::server::shutdown_signal().await;

    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(probes, sync);

    let stats = queue.stats();
    info!(pending = stats.pending, synced = stats.total_synced, "Sync stopped");
    Ok(())
}

async fn run_submit(config: &PizzaHuntConfig, pizza: NewPizza) -> CliResult {
    let queue = Arc::new(PendingQueue::open(&config.queue_path, config.queue_max_items).await?);
    let api: Arc<dyn PizzaApi> =
        Arc::new(HttpPizzaClient::new(&config.server_url, config.request_timeout())?);
    let monitor = Arc::new(ConnectivityMonitor::new(true, config.offline_failure_threshold));

    let submitter = PizzaSubmitter::new(api.clone(), queue.clone(), monitor);
    match submitter.submit(pizza).await? {
        SubmitOutcome::Created(view) => {
            println!("{}", serde_json::to_string_pretty(&view)?);
            // The server just answered, so flush anything left from earlier.
            if !queue.is_empty().await? {
                let agent = SyncAgent::new(queue, api, config.request_timeout());
                agent.drain_and_sync().await?;
            }
        }
        SubmitOutcome::Queued { seq } => {
            println!("Server unreachable, pizza queued locally as #{seq}");
        }
    }
    Ok(())
}
