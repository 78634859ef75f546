use anyhow::{Context, Result};
use clap::Parser;
use hashdex::persist::{load_meta, IndexPaths};
use server::{build_app, listen_addr};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

/// Serve a finalized hashdex index over HTTP
#[derive(Parser)]
#[command(name = "server")]
struct Args {
    /// Directory holding the finalized index
    #[arg(long, default_value = "./index")]
    index: PathBuf,
    /// IP address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    fmt().with_env_filter(filter).init();
    let args = Args::parse();

    let addr = listen_addr(&args.host, args.port)?;
    let app = build_app(&args.index)?;
    let meta = load_meta(&IndexPaths::new(&args.index))?;
    tracing::info!(
        index = %args.index.display(),
        docs = meta.num_docs,
        unique_tokens = meta.unique_tokens,
        created_at = %meta.created_at,
        "index loaded"
    );

    let listener = TcpListener::bind(addr).await.with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
