use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::messages::NetEvent;
use crate::relay::{RelayClient, RelayHub, server};
use crate::ui;

#[derive(Debug, Parser)]
#[command(name = "loopjam", version, about = "Record into a shared loop with friends")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the relay that fans clips out between participants
    Relay {
        #[arg(long)]
        bind: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Open the loop window (default)
    Client {
        /// Relay address, e.g. ws://host:8080
        #[arg(long)]
        url: Option<String>,
    },
}

pub fn run_app() -> anyhow::Result<()> {
    // Logging
    env_logger::init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        log::warn!("Could not read config, using defaults: {}", e);
        Config::default()
    });
    config.validate()?;
    if let Err(e) = config.ensure_saved() {
        log::warn!("Could not write default config: {}", e);
    }

    match cli.command.unwrap_or(Command::Client { url: None }) {
        Command::Relay { bind, port } => run_relay(&config, bind, port),
        Command::Client { url } => run_client(&config, url),
    }
}

fn run_relay(config: &Config, bind: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let bind = bind.unwrap_or_else(|| config.relay.bind_address.clone());
    let port = port.unwrap_or(config.relay.port);
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid relay address {}:{}", bind, port))?;

    log::info!("Starting loopjam relay...");
    let hub = Arc::new(RelayHub::new(config.relay.outbound_queue_depth));
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server::start_server(addr, hub))
}

fn run_client(config: &Config, url: Option<String>) -> anyhow::Result<()> {
    log::info!("Starting loopjam...");

    let url = url.unwrap_or_else(|| config.client.relay_url.clone());
    let timeout = Duration::from_millis(config.client.connect_timeout_ms);

    let (net_tx, net_rx) = crossbeam_channel::unbounded::<NetEvent>();
    let relay = match RelayClient::connect(&url, timeout, net_tx) {
        Ok(client) => Some(client),
        Err(e) => {
            log::warn!("{}; recordings stay local", e);
            None
        }
    };

    let app = ui::LoopJamApp::new(config, relay, net_rx);

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 420.0])
            .with_min_inner_size([900.0, 300.0]),
        ..Default::default()
    };

    eframe::run_native(
        "loopjam",
        native_options,
        Box::new(move |_cc| Ok(Box::new(app))),
    )
    .map_err(|e| anyhow!("Eframe run error: {}", e))
}
