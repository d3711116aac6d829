use anyhow::{Context, Result};
use clap::Parser;
use pianola_server::{router, startup, telemetry, AppState, ServiceConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pianola", version, about = "PDF sheet music to piano animation data")]
struct Cli {
    /// Config file used instead of ./pianola.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    port: Option<u16>,

    #[arg(long)]
    host: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (mut config, sources) =
        ServiceConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(port) = cli.port {
        config.bind.port = port;
    }
    if let Some(host) = cli.host {
        config.bind.host = host;
    }

    telemetry::init(&config.telemetry.log_level);
    tracing::info!(
        files = ?sources.files,
        env = ?sources.env_overrides,
        "loaded configuration"
    );

    // Adapters hold blocking clients; build them before the runtime starts.
    let pipeline = startup::build_pipeline(&config)?;
    let state = AppState::new(pipeline);
    let app = router(state.clone(), config.max_upload_bytes());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;

    let served = runtime.block_on(async move {
        let addr = config.bind_addr();
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind to {addr}"))?;

        tracing::info!(%addr, "pianola ready");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("server error")?;

        tracing::info!("shutdown complete");
        Ok::<_, anyhow::Error>(())
    });

    // Release the adapters only once the runtime is gone.
    drop(runtime);
    drop(state);
    served
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(%err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::warn!(%err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
