mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{HeaderName, Method, header::{AUTHORIZATION, CONTENT_TYPE}};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use nava_api::auth::AppStateInner;
use nava_api::notify::build_sender;
use nava_api::whatsapp::INGEST_KEY_HEADER;
use nava_db::Database;
use nava_feed::ApprovalMatch;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nava=debug,nava_api=debug,nava_feed=debug,nava_db=info,tower_http=debug".into()),
        )
        .init();

    let config = Config::load().inspect_err(|e| error!("FATAL: {:#}", e))?;

    if config.approval == ApprovalMatch::Legacy {
        warn!(
            "Approval filter is 'legacy': approved WhatsApp entries are left out of \
             /digitalcontent/approved and totalApprovedPosts. Set NAVA_APPROVAL_MATCH=canonical to include them."
        );
    }
    if config.ingest_key.is_none() {
        warn!("NAVA_INGEST_KEY is not set; POST /whatsapp/media will refuse every request");
    }

    let sms = build_sender(&config.sms)?;
    info!("SMS provider: {:?}", config.sms.provider);

    let db = Arc::new(Database::open(&config.db_path)?);
    let state = AppStateInner::new(
        db,
        config.approval,
        sms,
        config.jwt_secret,
        config.ingest_key,
    );

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, HeaderName::from_static(INGEST_KEY_HEADER)])
        .allow_credentials(false);

    let app = nava_api::router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Nava server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Nava server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                let _ = ctrl_c.await;
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        info!("Received Ctrl+C, shutting down...");
    }
}
