//! Yatube-rs server entry point.

mod admin;
mod cli;
mod telemetry;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, info};
use yatube_common::{Config, LocalStorage, StorageBackend, config::MailTransport};
use yatube_core::{LettreMailer, Mailer};
use yatube_web::AppState;

use cli::{CliArgs, Command, ServeArgs};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn load_config(args: &CliArgs) -> anyhow::Result<Config> {
    let config = match &args.config_file {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => Config::load().context("failed to load configuration")?,
    };
    Ok(config)
}

fn build_mailer(config: &Config) -> anyhow::Result<Arc<dyn Mailer>> {
    let mailer = LettreMailer::from_config(&config.mail).context("invalid mail settings")?;
    Ok(Arc::new(mailer))
}

async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let db = yatube_db::init(config).await?;
    let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(
        config.media.root.clone(),
        config.media.url.clone(),
    ));
    Ok(AppState::new(
        Arc::new(db),
        storage,
        build_mailer(config)?,
        config,
    ))
}

async fn serve(mut config: Config, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let db = Arc::new(yatube_db::init(&config).await?);
    if args.no_migrate {
        info!("Skipping database migrations");
    } else {
        info!("Running database migrations...");
        yatube_db::migrate(&db).await?;
        info!("Migrations completed");
    }

    tokio::fs::create_dir_all(&config.media.root)
        .await
        .with_context(|| format!("failed to create {}", config.media.root.display()))?;
    let storage: Arc<dyn StorageBackend> = Arc::new(LocalStorage::new(
        config.media.root.clone(),
        config.media.url.clone(),
    ));

    if config.mail.transport == MailTransport::File {
        tokio::fs::create_dir_all(&config.mail.file_dir)
            .await
            .with_context(|| format!("failed to create {}", config.mail.file_dir.display()))?;
    }
    let mailer = build_mailer(&config)?;
    info!(transport = ?config.mail.transport, "Mail transport ready");

    let state = AppState::new(db, storage, mailer, &config);
    info!(
        ttl_secs = config.cache.index_ttl_secs,
        capacity = config.cache.capacity,
        "Index page cache ready"
    );

    let app = yatube_web::app(state, &config.media)
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("invalid listen address {}", config.server.host))?;
    info!(%addr, url = %config.server.url, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let config = load_config(&args)?;
    telemetry::init(&config.logging)?;

    match args.command.clone().unwrap_or(Command::Serve(ServeArgs::default())) {
        Command::Serve(serve_args) => {
            info!("Starting yatube-rs server...");
            serve(config, serve_args).await?;
        }
        Command::Migrate => {
            let db = yatube_db::init(&config).await?;
            yatube_db::migrate(&db).await?;
            info!("Migrations completed");
        }
        Command::CreateGroup(group) => {
            let state = build_state(&config).await?;
            admin::create_group(&state.group_service, group).await?;
        }
        Command::DeleteGroup { slug } => {
            let state = build_state(&config).await?;
            admin::delete_group(&state.group_service, &slug).await?;
        }
        Command::DeleteUser { username } => {
            let state = build_state(&config).await?;
            admin::delete_user(&state.user_service, &state.post_service, &username).await?;
        }
        Command::DeletePost { id } => {
            let state = build_state(&config).await?;
            admin::delete_post(&state.post_service, id).await?;
        }
    }

    Ok(())
}
