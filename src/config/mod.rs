use crate::core::{AppError, Currency, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub mod database;
pub mod server;

pub use database::DatabaseConfig;
pub use server::ServerConfig;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub chapa: ChapaConfig,
    pub tasks: TaskConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub log_level: String,
    pub log_format: String,
    pub payment_expiry_hours: u32,
    pub default_currency: Currency,
}

/// Chapa gateway credentials and the URLs handed to it at checkout
#[derive(Debug, Clone)]
pub struct ChapaConfig {
    pub secret_key: String,
    pub webhook_secret: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Externally reachable base of this service, used for the callback URL
    pub public_base_url: String,
    /// Where the gateway sends the customer after checkout; the payment
    /// reference is appended as the last path segment
    pub return_base_url: String,
    pub checkout_title: String,
}

#[derive(Debug, Clone)]
pub struct TaskConfig {
    pub worker_count: usize,
    pub queue_size: usize,
    pub sweep_interval_secs: u64,
    /// Delay before each reverify attempt, in order
    pub reverify_schedule_secs: Vec<u64>,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
}

fn parse_var<T: FromStr>(name: &str, default: &str) -> Result<T> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse()
        .map_err(|_| AppError::Configuration(format!("Invalid {}", name)))
}

fn required_var(name: &str) -> Result<String> {
    env::var(name).map_err(|_| AppError::Configuration(format!("{} not set", name)))
}

fn parse_schedule(raw: &str) -> Result<Vec<u64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse().map_err(|_| {
                AppError::Configuration(format!("Invalid REVERIFY_SCHEDULE_SECS entry '{}'", part))
            })
        })
        .collect()
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8000".to_string())
            .trim_end_matches('/')
            .to_string();

        let config = Config {
            app: AppConfig {
                env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "debug".to_string()),
                log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
                payment_expiry_hours: parse_var("PAYMENT_EXPIRY_HOURS", "24")?,
                default_currency: env::var("DEFAULT_CURRENCY")
                    .unwrap_or_else(|_| "ETB".to_string())
                    .parse()
                    .map_err(AppError::Configuration)?,
            },
            database: DatabaseConfig::from_env()?,
            server: ServerConfig::from_env()?,
            chapa: ChapaConfig {
                secret_key: required_var("CHAPA_SECRET_KEY")?,
                webhook_secret: env::var("CHAPA_WEBHOOK_SECRET").ok(),
                base_url: env::var("CHAPA_BASE_URL")
                    .unwrap_or_else(|_| "https://api.chapa.co/v1".to_string()),
                timeout_secs: parse_var("CHAPA_TIMEOUT_SECS", "30")?,
                return_base_url: env::var("RETURN_BASE_URL")
                    .unwrap_or_else(|_| format!("{}/payment/success", public_base_url)),
                public_base_url,
                checkout_title: env::var("CHECKOUT_TITLE")
                    .unwrap_or_else(|_| "Travel Booking".to_string()),
            },
            tasks: TaskConfig {
                worker_count: parse_var("TASK_WORKERS", "4")?,
                queue_size: parse_var("TASK_QUEUE_SIZE", "1024")?,
                sweep_interval_secs: parse_var("SWEEP_INTERVAL_SECS", "3600")?,
                reverify_schedule_secs: parse_schedule(
                    &env::var("REVERIFY_SCHEDULE_SECS").unwrap_or_else(|_| "60,300,1800".to_string()),
                )?,
            },
            mail: MailConfig {
                enabled: parse_var("SMTP_ENABLED", "false")?,
                host: env::var("SMTP_HOST").unwrap_or_default(),
                port: parse_var("SMTP_PORT", "587")?,
                user: env::var("SMTP_USER").unwrap_or_default(),
                password: env::var("SMTP_PASSWORD").unwrap_or_default(),
                from_email: env::var("DEFAULT_FROM_EMAIL")
                    .unwrap_or_else(|_| "no-reply@localhost".to_string()),
                from_name: env::var("DEFAULT_FROM_NAME")
                    .unwrap_or_else(|_| "Travel Bookings".to_string()),
            },
        };

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.database.validate()?;

        if self.app.payment_expiry_hours == 0 {
            return Err(AppError::Configuration(
                "Payment expiry hours must be greater than 0".to_string(),
            ));
        }

        if self.chapa.secret_key.trim().is_empty() {
            return Err(AppError::Configuration(
                "CHAPA_SECRET_KEY must not be empty".to_string(),
            ));
        }

        if self.chapa.timeout_secs == 0 {
            return Err(AppError::Configuration(
                "Gateway timeout must be greater than 0".to_string(),
            ));
        }

        if self.tasks.worker_count == 0 || self.tasks.queue_size == 0 {
            return Err(AppError::Configuration(
                "Task worker count and queue size must be greater than 0".to_string(),
            ));
        }

        if self.tasks.sweep_interval_secs == 0 {
            return Err(AppError::Configuration(
                "Sweep interval must be greater than 0".to_string(),
            ));
        }

        if self.tasks.reverify_schedule_secs.is_empty() {
            return Err(AppError::Configuration(
                "Reverify schedule must contain at least one delay".to_string(),
            ));
        }

        if self.mail.enabled && self.mail.host.trim().is_empty() {
            return Err(AppError::Configuration(
                "SMTP_HOST is required when SMTP_ENABLED=true".to_string(),
            ));
        }

        Ok(())
    }
}

impl AppConfig {
    pub fn payment_expiry(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.payment_expiry_hours))
    }
}

impl ChapaConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn callback_url(&self) -> String {
        format!("{}/api/payments/callback", self.public_base_url)
    }
}

impl TaskConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn reverify_schedule(&self) -> Vec<Duration> {
        self.reverify_schedule_secs
            .iter()
            .copied()
            .map(Duration::from_secs)
            .collect()
    }
}
