//! tcp-buttons CLI - serves a button panel over the TCP control protocol.
//!
//! This is the main binary entry point. See the `tcp_buttons` library for
//! the core functionality.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tcp_buttons::hub::HubEventSender;
use tcp_buttons::panel::simulator::Simulator;
use tcp_buttons::{Config, Hub, HubEvent, Panel, VirtualPanel};

// CLI
#[derive(Parser)]
#[command(name = "tcp-buttons")]
#[command(version)]
#[command(about = "TCP control server for a bank of LED push buttons")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the control server
    Start {
        /// Configuration file (defaults to the platform config directory)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Override the control port
        #[arg(long)]
        port: Option<u16>,
        /// Override the bind address
        #[arg(long)]
        bind: Option<String>,
        /// Drive the panel from console commands on stdin
        #[arg(long)]
        simulate: bool,
    },
    /// Print the effective configuration
    Config {
        /// Configuration file (defaults to the platform config directory)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn init_logging() -> Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_timestamp_secs();

    if let Some(path) = std::env::var_os("TCP_BUTTONS_LOG_FILE") {
        let path = PathBuf::from(path);
        let log_file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create log file at {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(log_file)));
    }

    builder.init();
    Ok(())
}

/// Forward process signals to the hub.
///
/// SIGINT/SIGTERM stop the process. On unix, SIGUSR1/SIGUSR2 report the
/// network link going down/up.
#[cfg(unix)]
async fn forward_signals(hub_event_tx: HubEventSender) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut link_down = signal(SignalKind::user_defined1())?;
    let mut link_up = signal(SignalKind::user_defined2())?;

    loop {
        let event = tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                HubEvent::Shutdown
            }
            _ = terminate.recv() => HubEvent::Shutdown,
            _ = link_down.recv() => HubEvent::LinkDown,
            _ = link_up.recv() => HubEvent::LinkUp,
        };

        let stopping = event == HubEvent::Shutdown;
        if hub_event_tx.send(event).is_err() || stopping {
            return Ok(());
        }
    }
}

#[cfg(not(unix))]
async fn forward_signals(hub_event_tx: HubEventSender) -> Result<()> {
    tokio::signal::ctrl_c().await?;
    let _ = hub_event_tx.send(HubEvent::Shutdown);
    Ok(())
}

async fn run_server(config: Config, simulate: bool) -> Result<()> {
    let device = Arc::new(VirtualPanel::new());
    let panel = Panel::new(&config.buttons, device);
    let mut hub = Hub::new(&config, Some(panel));

    let addr = hub.start()?;
    println!("tcp-buttons v{} listening on {}", env!("CARGO_PKG_VERSION"), addr);

    let signal_tx = hub.event_sender();
    tokio::spawn(async move {
        if let Err(e) = forward_signals(signal_tx).await {
            log::error!("Signal handling failed: {e:#}");
        }
    });

    if simulate {
        log::info!("[Panel] Simulator attached to stdin");
        let simulator = Simulator::new(config.buttons.clone(), hub.event_sender());
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        tokio::spawn(simulator.run(stdin));
    }

    hub.run().await
}

fn main() -> Result<()> {
    init_logging()?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            config,
            port,
            bind,
            simulate,
        } => {
            let mut config = Config::load(config.as_deref())?;
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(bind) = bind {
                config.bind_address = bind;
            }

            let runtime = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
            let result = runtime.block_on(run_server(config, simulate));
            // A pending stdin read from the simulator would otherwise hold shutdown.
            runtime.shutdown_timeout(Duration::from_secs(1));
            result?;
            println!("Shut down.");
        }
        Commands::Config { config } => {
            let config = Config::load(config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
