use serde::Deserialize;

const DEFAULT_BRAND_NAME: &str = "Stone Real Estate";
const DEFAULT_RESEND_BASE_URL: &str = "https://api.resend.com";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// Postgres URL; `None` runs the service on the in-memory store.
    pub database_url: Option<String>,
    /// Bearer token required by admin routes.
    pub admin_api_token: Option<String>,
    pub notifications: NotificationSettings,
    pub mailer: MailerSettings,
}

/// Everything the notification dispatcher needs, resolved once at start-up.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationSettings {
    pub brand_name: String,
    /// `ADMIN_EMAIL`, falling back to `RESEND_OWNER_EMAIL`.
    pub admin_email: Option<String>,
    /// `SENDER_EMAIL`, falling back to the admin address.
    pub from_address: Option<String>,
    /// Await delivery before responding (serverless hosts freeze detached tasks).
    pub await_delivery: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailerSettings {
    pub resend_api_key: Option<String>,
    pub resend_base_url: String,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            brand_name: DEFAULT_BRAND_NAME.to_string(),
            admin_email: None,
            from_address: None,
            await_delivery: false,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        match config.database_url {
            Some(ref url) => tracing::debug!("Database URL: {}...", &url[..20.min(url.len())]),
            None => tracing::warn!("DATABASE_URL not set, leads are kept in memory only"),
        }
        if config.admin_api_token.is_none() {
            tracing::warn!("ADMIN_API_TOKEN not set, admin routes will reject every request");
        }
        if config.notifications.admin_email.is_none() {
            tracing::warn!("ADMIN_EMAIL / RESEND_OWNER_EMAIL not set, lead notifications disabled");
        }
        if config.mailer.resend_api_key.is_none() {
            tracing::warn!("RESEND_API_KEY not set, notifications will only be logged");
        }
        tracing::debug!(
            "Notification delivery: {}",
            if config.notifications.await_delivery {
                "awaited"
            } else {
                "fire-and-forget"
            }
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match var("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .ok()
                .filter(|p| *p > 0)
                .ok_or_else(|| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            None => 3000,
        };

        let database_url = var("DATABASE_URL")
            .or_else(|| var("DB_URL"))
            .map(|url| {
                if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                    anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                }
                Ok(url)
            })
            .transpose()?;

        let admin_email = var("ADMIN_EMAIL").or_else(|| var("RESEND_OWNER_EMAIL"));
        let from_address = var("SENDER_EMAIL").or_else(|| admin_email.clone());

        let mailer_await = var("MAILER_AWAIT")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let on_serverless = var("VERCEL")
            .map(|v| v.trim() == "1")
            .unwrap_or(false);

        let resend_base_url = var("RESEND_BASE_URL")
            .unwrap_or_else(|| DEFAULT_RESEND_BASE_URL.to_string());
        let parsed = url::Url::parse(&resend_base_url)
            .map_err(|e| anyhow::anyhow!("RESEND_BASE_URL is not a valid URL: {}", e))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            anyhow::bail!("RESEND_BASE_URL must start with http:// or https://");
        }

        Ok(Self {
            port,
            database_url,
            admin_api_token: var("ADMIN_API_TOKEN"),
            notifications: NotificationSettings {
                brand_name: var("BRAND_NAME").unwrap_or_else(|| DEFAULT_BRAND_NAME.to_string()),
                admin_email,
                from_address,
                await_delivery: mailer_await || on_serverless,
            },
            mailer: MailerSettings {
                resend_api_key: var("RESEND_API_KEY"),
                resend_base_url: resend_base_url.trim_end_matches('/').to_string(),
            },
        })
    }
}
