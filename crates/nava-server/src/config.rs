use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use nava_api::notify::{SmsProvider, SmsSettings};
use nava_feed::ApprovalMatch;

/// JWT secrets shipped in sample files. Refused at startup.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me", "secret"];

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub ingest_key: Option<String>,
    pub approval: ApprovalMatch,
    pub sms: SmsSettings,
}

impl Config {
    pub fn load() -> Result<Self> {
        let jwt_secret = optional("NAVA_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("NAVA_JWT_SECRET is unset or still a placeholder; set it in .env and restart");
        }

        let provider: SmsProvider = try_load("NAVA_SMS_PROVIDER", "message-central")?;
        // Each provider reads its credentials from its own variables.
        let (gateway_url, account, password, email) = match provider {
            SmsProvider::MessageCentral => (
                optional("MESSAGE_CENTRAL_URL"),
                optional("MESSAGE_CENTRAL_CUSTOMER_ID"),
                optional("MESSAGE_CENTRAL_PASSWORD"),
                optional("MESSAGE_CENTRAL_EMAIL"),
            ),
            SmsProvider::Bearer => (
                optional("SMS_GATEWAY_URL"),
                optional("SMS_GATEWAY_USER"),
                optional("SMS_GATEWAY_PASSWORD"),
                None,
            ),
            SmsProvider::Log => (None, None, None, None),
        };

        Ok(Self {
            host: try_load("NAVA_HOST", "0.0.0.0")?,
            port: try_load("NAVA_PORT", "5000")?,
            db_path: try_load("NAVA_DB_PATH", "nava.db")?,
            jwt_secret,
            ingest_key: optional("NAVA_INGEST_KEY"),
            approval: try_load("NAVA_APPROVAL_MATCH", "legacy")?,
            sms: SmsSettings {
                provider,
                gateway_url,
                account,
                password,
                email,
                sender_id: try_load("SMS_SENDER_ID", "NAVADH")?,
                timeout: Duration::from_secs(try_load("NAVA_SMS_TIMEOUT_SECS", "10")?),
            },
        })
    }
}

/// Unset and blank both count as absent.
fn optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = optional(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            anyhow::anyhow!("{key}: {e}")
        })
        .with_context(|| format!("Environment misconfigured ({key}={raw})"))
}
