use clap::Parser;
use completion_gateway::config::config_search_paths;
use completion_gateway::{build_router, AccessLog, AppState, GatewayConfig, UpstreamClient};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "completion-gateway",
    about = "Minimal HTTP gateway relaying text-generation requests to a hosted completion API",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides PORT and config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Append a JSONL access record per request to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "completion_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        for (i, path) in config_search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let mut config = GatewayConfig::find_and_load(cli.config.as_deref())?;
    config.apply_port_override(std::env::var("PORT").ok().as_deref());
    if let Some(port) = cli.port {
        config.port = port;
    }

    let upstream = UpstreamClient::from_config(&config, config.resolve_api_key())?;
    if !upstream.has_credential() {
        warn!(
            env = %config.upstream.api_key_env,
            "API key not set; generation requests will fail until it is provided"
        );
    }

    let access_log = match cli.log_file {
        Some(ref path) => Some(AccessLog::open(path).await?),
        None => None,
    };

    info!("completion-gateway v{}", env!("CARGO_PKG_VERSION"));
    info!("  Upstream:  {}", upstream.endpoint());
    info!("  Model:     {} (default)", config.defaults.model);
    info!("  Port:      {}", config.port);
    if let Some(ref path) = cli.log_file {
        info!("  Log file:  {}", path.display());
    }

    let state = Arc::new(AppState {
        config: config.clone(),
        upstream,
        access_log,
    });

    let app = build_router(state);
    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Server running on http://localhost:{}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
