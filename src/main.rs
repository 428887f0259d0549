use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use voco::relay::{router, RelayState};
use voco::Settings;

/// Relay that turns `GET /tts?q=&tl=` into MP3 audio
#[derive(Parser)]
#[command(name = "voco-relay")]
#[command(author = "StarTuz")]
#[command(version)]
#[command(about = "CORS-friendly relay for the voco speech client", long_about = None)]
struct Args {
    /// Config file to read instead of the default search locations
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let settings = match &args.config {
        Some(path) => {
            info!("Loading config from: {}", path.display());
            Settings::from_file(path)?
        }
        None => Settings::new()?,
    };

    let host = args.host.unwrap_or_else(|| settings.relay_host.clone());
    let port = args.port.unwrap_or(settings.port);

    let state = RelayState::from_settings(&settings)?;
    let app = router(state);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Upstream: {}", settings.upstream_url);
    info!("Proxy listening on http://{}", addr);
    info!("  GET /tts?q=&tl=  - MP3 audio");
    info!("  GET /health      - Health check");

    axum::serve(listener, app).await?;
    Ok(())
}
