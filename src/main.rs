//! Live odds feed entry point.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use live_odds::api::{create_router, AppState};
use live_odds::config::Config;
use live_odds::error::PushError;
use live_odds::events::{EventListSort, SportType, SubscribableContent};
use live_odds::metrics;
use live_odds::provider::EventsProvider;
use live_odds::push::{decode_message, PushChannel, PushEvent, ReconnectConfig};
use live_odds::transport::ContentClient;
use live_odds::utils::shutdown_signal;

/// Real-time sports odds feed.
#[derive(Parser, Debug)]
#[command(name = "live-odds")]
#[command(about = "Subscribe to sports event lists and follow their odds live")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Subscribe one list and log its updates until shutdown.
    Run {
        /// Sport alpha id used in content routes.
        #[arg(long, default_value = "FBL")]
        sport: String,

        /// Follow in-play events instead of scheduled ones.
        #[arg(long)]
        live: bool,

        /// Events per page for scheduled lists.
        #[arg(long)]
        events: Option<usize>,

        /// HTTP server port for health/status.
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Decode a captured push frame and print the result.
    Decode {
        /// File holding one raw push frame.
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("live_odds=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    match args.command {
        Command::CheckConfig => cmd_check_config(),
        Command::Decode { file } => cmd_decode(file),
        Command::Run {
            sport,
            live,
            events,
            port,
        } => cmd_run(sport, live, events, port).await,
    }
}

/// Check configuration validity.
fn cmd_check_config() -> anyhow::Result<()> {
    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    if let Err(e) = config.validate() {
        println!("FAILED");
        println!("  Error: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed"));
    }
    println!("OK");

    println!("Configuration Summary:");
    println!("  Subscribe URL: {}", config.subscribe_url);
    println!("  Push URL: {}", config.push_ws_url);
    println!("  Language: {}", config.language_code);
    println!("  Events per page: {}", config.default_event_count);
    println!("  Subscribe timeout: {}ms", config.subscribe_timeout_ms);
    println!(
        "  Metrics: {}",
        if config.metrics_enabled {
            format!("port {}", config.metrics_port)
        } else {
            "disabled".to_string()
        }
    );

    Ok(())
}

/// Decode a captured push frame.
fn cmd_decode(file: PathBuf) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&file)?;
    serde_json::from_str::<serde_json::Value>(&text)
        .map_err(|e| PushError::ParseError(e.to_string()))?;
    let events = decode_message(&text);

    if events.is_empty() {
        println!("No decodable content in {}", file.display());
    }
    for event in events {
        match event {
            PushEvent::Session(token) => println!("session {}", token),
            PushEvent::Content(container) => println!("{} {:#?}", container.kind(), container),
        }
    }
    Ok(())
}

/// Connect the push channel, subscribe one list and log its updates.
async fn cmd_run(
    sport: String,
    live: bool,
    events: Option<usize>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    info!("Loading configuration...");
    let config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    if config.metrics_enabled {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
        PrometheusBuilder::new().with_http_listener(addr).install()?;
        info!("Metrics exporter listening on {}", addr);
    }
    metrics::init_metrics();

    let transport = Arc::new(ContentClient::new(&config)?);
    let provider = Arc::new(EventsProvider::new(transport, config.default_event_count));

    let push = Arc::new(PushChannel::with_reconnect_config(
        config.push_ws_url.clone(),
        ReconnectConfig::from_config(
            config.ws_reconnect_max_delay_s,
            config.ws_heartbeat_interval_s,
        ),
    ));

    let app_state = AppState::new(Arc::clone(&provider)).with_push(Arc::clone(&push));
    let addr = SocketAddr::from(([0, 0, 0, 0], port.unwrap_or(config.port)));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    let router = create_router(app_state);
    let _server_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    });

    let mut push_events = Arc::clone(&push).run_with_reconnect();

    info!("Waiting for push session...");
    while !provider.has_session() {
        tokio::select! {
            event = push_events.recv() => match event {
                Some(event) => provider.handle_push_event(event).await,
                None => {
                    return Err(anyhow::anyhow!(
                        "Push channel stopped before a session was assigned"
                    ))
                }
            },
            _ = shutdown_signal() => return Ok(()),
        }
    }

    let sport = SportType {
        id: sport.clone(),
        name: sport.clone(),
        alpha_id: Some(sport),
        ..SportType::default()
    };

    let mut list = if live {
        provider.subscribe_live_matches(&sport).await?
    } else {
        provider
            .subscribe_pre_live_matches(&sport, None, None, events, EventListSort::StartTime)
            .await?
    };

    info!(sport = %sport.name, live, "List subscribed, following updates");

    let consumer = {
        let provider = Arc::clone(&provider);
        tokio::spawn(async move { provider.consume_push_events(push_events).await })
    };

    let follow = async {
        while let Some(state) = list.next().await {
            match state {
                Ok(SubscribableContent::Connected { subscription }) => {
                    info!(content = %subscription.content_identifier(), "Connected");
                }
                Ok(SubscribableContent::ContentUpdate { content }) => {
                    let count: usize = content.iter().map(|g| g.events.len()).sum();
                    info!(events = count, "List updated");
                }
                Ok(SubscribableContent::Disconnected) => info!("Disconnected"),
                Err(e) => warn!(error = %e, "List subscription failed"),
            }
        }
    };

    tokio::select! {
        _ = follow => warn!("List stream ended"),
        _ = shutdown_signal() => info!("Shutting down"),
    }

    provider.unsubscribe_all().await;
    consumer.abort();
    info!("Shutdown complete");

    Ok(())
}
