//! Utility to write the form header and footer seed messages.

use dotenvy::dotenv;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lead_capture_api::config::Config;
use lead_capture_api::content::{ContentKind, ContentService};
use lead_capture_api::db::open_store;

/// Connects to the configured store and overwrites both content singletons.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lead_capture_api=info,seed_form_content=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    if config.database_url.is_none() {
        anyhow::bail!("DATABASE_URL must be set to seed form content");
    }
    let content = ContentService::new(open_store(&config).await?);

    tracing::info!("Seeding form content...");
    for kind in [ContentKind::Header, ContentKind::Footer] {
        let doc = content.seed(kind).await?;
        tracing::info!("Created {} document: {}", kind.collection(), doc.message);
    }
    tracing::info!("Form content seeding completed");

    Ok(())
}
