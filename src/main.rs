use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lead_capture_api::config::Config;
use lead_capture_api::content::ContentService;
use lead_capture_api::db::open_store;
use lead_capture_api::handlers::{app_router_with, AppState};
use lead_capture_api::leads::LeadService;
use lead_capture_api::mailer::mailer_from_settings;
use lead_capture_api::notifications::Notifier;

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration loading.
/// - Document store (Postgres or in-memory).
/// - Email transport and notifier.
/// - HTTP routes and middleware (CORS, body limit, rate limiting on submissions).
///
/// It then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lead_capture_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;

    let store = open_store(&config).await?;

    let mailer = mailer_from_settings(&config.mailer)?;
    if config.mailer.resend_api_key.is_some() {
        tracing::info!("✓ Email transport initialized: {}", config.mailer.resend_base_url);
    }
    let notifier = Notifier::new(mailer, config.notifications.clone());

    // Build application state
    let app_state = Arc::new(AppState {
        leads: LeadService::new(store.clone(), notifier),
        content: ContentService::new(store),
        config: config.clone(),
    });

    // Public submissions: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let app = app_router_with(app_state, |submit| {
        submit.layer(GovernorLayer {
            config: governor_conf,
        })
    })
    .layer(
        ServiceBuilder::new()
            // Request size limit: 1MB is far above any form payload
            .layer(RequestBodyLimitLayer::new(1024 * 1024)),
    )
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // SmartIpKeyExtractor falls back to the peer address
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
