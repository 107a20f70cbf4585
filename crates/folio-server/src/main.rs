mod config;

use std::sync::Arc;

use tracing::info;

use folio_api::auth::{AppState, AppStateInner, OperatorIdentity};
use folio_db::Database;
use folio_gateway::dispatcher::Dispatcher;
use folio_notify::{EmailTransport, HttpTransport, LogTransport, Notifier};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "folio=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = Database::open(&config.db_path)?;

    let transport: Arc<dyn EmailTransport> = match &config.email_api_url {
        Some(url) => {
            info!("Sending email through {}", url);
            Arc::new(HttpTransport::new(url.clone(), config.email_api_key.clone()))
        }
        None => {
            info!("FOLIO_EMAIL_API_URL unset, emails will only be logged");
            Arc::new(LogTransport)
        }
    };

    let operator = OperatorIdentity::new(&config.operator_email, &config.operator_name);
    let notifier = Notifier::new(transport, operator.email.clone(), operator.name.clone());

    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret: config.jwt_secret.clone(),
        dispatcher: Dispatcher::new(),
        notifier,
        operator,
    });

    let app = folio_api::router(state);

    info!("Folio server listening on {}", config.addr);
    info!("Operator account: {}", config.operator_email);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!("SIGTERM handler unavailable: {}", e);
                    ctrl_c.await.ok();
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
