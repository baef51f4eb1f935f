use std::sync::Arc;

use clap::Parser;
use tokio::{signal, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use urlshare::config::{Cli, Config, default_config_dir, default_config_path};
use urlshare::db::Database;
use urlshare::handler::AppState;
use urlshare::router;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Cli::parse();

    // With --config, data lives next to the config file; otherwise in ~/.urlshare.
    let (config_path, data_dir) = match args.config_path {
        Some(path) => {
            let path = std::path::PathBuf::from(path);
            let dir = path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| std::path::PathBuf::from("."));
            (path, dir)
        }
        None => (default_config_path(), default_config_dir()),
    };

    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        eprintln!("failed to create data directory {:?}: {}", data_dir, e);
        std::process::exit(1);
    }

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    tracing::info!("urlshare.svc starting");

    let cfg = Config::new(&config_path.to_string_lossy()).unwrap_or_else(|e| {
        tracing::error!(error = %e, path = ?config_path, "failed to load config file");
        std::process::exit(1);
    });
    let db = Arc::new(Database::new(&cfg, &data_dir).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup database");
        std::process::exit(1);
    }));

    let address = format!("0.0.0.0:{}", cfg.app.get_port());
    let cancellation_token = CancellationToken::new();
    let (shutdown_complete_tx, mut shutdown_complete_rx) = mpsc::channel::<()>(1);

    // The replica syncs on its own interval; push pending writes once more before exiting.
    if Database::is_replica(&cfg.app.turso_url, &cfg.app.turso_auth_token) {
        let sync_db = db.clone();
        let sync_token = cancellation_token.clone();
        let sync_done = shutdown_complete_tx.clone();
        tokio::spawn(async move {
            let _done = sync_done;
            sync_token.cancelled().await;
            match sync_db.sync().await {
                Ok(()) => tracing::info!("final replica sync complete"),
                Err(e) => tracing::warn!(error = %e, "final replica sync failed"),
            }
        });
    }

    let app = router(AppState {
        db,
        feed: cfg.app.feed,
    });

    let listener = tokio::net::TcpListener::bind(&address).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup tcp listener");
        std::process::exit(1);
    });

    tracing::info!("urlshare.svc running on {}", &address);
    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(err) = result {
                tracing::error!(error = %err, "server exited with error");
                std::process::exit(1);
            }
        }
        _ = signal::ctrl_c() => {
            tracing::info!("ctrl+c signal received, preparing to shutdown");
            cancellation_token.cancel();
        }
    }

    drop(shutdown_complete_tx);
    shutdown_complete_rx.recv().await;
    tracing::info!("urlshare.svc going off, graceful shutdown complete");
}
