use serde::Deserialize;

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string
    pub redis_url: String,

    /// Max. number of notifications sent per batch invocation (default: 50)
    pub max_emails: u32,

    /// Delay in seconds before a follow-up run when a batch was truncated
    /// by `max_emails` (default: 30)
    pub batch_delay_secs: u64,

    /// Recurring schedule interval in seconds (default: 3600 = hourly)
    pub schedule_interval_secs: u64,

    /// Retention window in days for "already notified" flags (default: 28)
    pub flag_retention_days: i64,

    /// Offset in minutes from UTC used to resolve "today" (default: 0)
    pub timezone_offset_minutes: i32,

    /// Per-request timeout in seconds for mail delivery (default: 10)
    pub mail_timeout_secs: u64,

    /// Resend API key for email delivery
    pub resend_api_key: Option<String>,

    /// Email sender address
    pub email_from: Option<String>,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            max_emails: std::env::var("MAX_EMAILS")
                .unwrap_or_else(|_| "50".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("MAX_EMAILS must be a valid u32"))?,
            batch_delay_secs: std::env::var("BATCH_DELAY_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("BATCH_DELAY_SECS must be a valid u64"))?,
            schedule_interval_secs: std::env::var("SCHEDULE_INTERVAL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SCHEDULE_INTERVAL_SECS must be a valid u64"))?,
            flag_retention_days: std::env::var("FLAG_RETENTION_DAYS")
                .unwrap_or_else(|_| "28".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("FLAG_RETENTION_DAYS must be a valid i64"))?,
            timezone_offset_minutes: std::env::var("TIMEZONE_OFFSET_MINUTES")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("TIMEZONE_OFFSET_MINUTES must be a valid i32"))?,
            mail_timeout_secs: std::env::var("MAIL_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("MAIL_TIMEOUT_SECS must be a valid u64"))?,
            resend_api_key: std::env::var("RESEND_API_KEY").ok(),
            email_from: std::env::var("EMAIL_FROM").ok(),
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
        })
    }
}
