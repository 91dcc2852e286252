//! Outbound SMS. Both gateways hand out a short-lived token that must be
//! fetched before every send; they differ in how the token is presented.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use futures_util::future::{BoxFuture, FutureExt};
use reqwest::{Client, Response, header};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, info};

use nava_types::models::UnknownValue;
use nava_types::phone::phone_key;

const MESSAGE_CENTRAL_URL: &str = "https://cpaas.messagecentral.com";
const COUNTRY_CODE: &str = "91";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("SMS gateway request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SMS gateway answered {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("SMS gateway returned no auth token")]
    MissingToken,

    #[error("SMS provider is missing {0}")]
    NotConfigured(&'static str),
}

/// Delivers a text message to a phone number. Errors are returned as-is;
/// nothing is retried.
pub trait SmsSender: Send + Sync {
    fn send<'a>(&'a self, phone_number: &'a str, message: &'a str) -> BoxFuture<'a, Result<(), NotifyError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsProvider {
    /// Message Central: `authToken` header.
    MessageCentral,
    /// Generic gateway: `Authorization: Bearer` header.
    Bearer,
    /// Log only, for development.
    Log,
}

impl FromStr for SmsProvider {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "message-central" | "messagecentral" => Ok(Self::MessageCentral),
            "bearer" => Ok(Self::Bearer),
            "log" => Ok(Self::Log),
            other => Err(UnknownValue(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmsSettings {
    pub provider: SmsProvider,
    pub gateway_url: Option<String>,
    /// Customer id (Message Central) or user name (bearer gateway).
    pub account: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub sender_id: String,
    pub timeout: Duration,
}

pub fn build_sender(settings: &SmsSettings) -> Result<Arc<dyn SmsSender>, NotifyError> {
    let client = || Client::builder().timeout(settings.timeout).build();

    let sender: Arc<dyn SmsSender> = match settings.provider {
        SmsProvider::MessageCentral => Arc::new(MessageCentral {
            client: client()?,
            base_url: settings
                .gateway_url
                .clone()
                .unwrap_or_else(|| MESSAGE_CENTRAL_URL.to_string()),
            customer_id: required(&settings.account, "MESSAGE_CENTRAL_CUSTOMER_ID")?,
            password: required(&settings.password, "MESSAGE_CENTRAL_PASSWORD")?,
            email: required(&settings.email, "MESSAGE_CENTRAL_EMAIL")?,
            sender_id: settings.sender_id.clone(),
        }),
        SmsProvider::Bearer => Arc::new(BearerGateway {
            client: client()?,
            base_url: required(&settings.gateway_url, "SMS_GATEWAY_URL")?,
            username: required(&settings.account, "SMS_GATEWAY_USER")?,
            password: required(&settings.password, "SMS_GATEWAY_PASSWORD")?,
            sender_id: settings.sender_id.clone(),
        }),
        SmsProvider::Log => Arc::new(LogSender),
    };
    Ok(sender)
}

fn required(value: &Option<String>, name: &'static str) -> Result<String, NotifyError> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(NotifyError::NotConfigured(name))
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(alias = "access_token")]
    token: Option<String>,
}

impl TokenResponse {
    fn into_token(self) -> Result<String, NotifyError> {
        self.token.filter(|t| !t.is_empty()).ok_or(NotifyError::MissingToken)
    }
}

async fn check(res: Response) -> Result<Response, NotifyError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    Err(NotifyError::Rejected { status: status.as_u16(), body })
}

/// Only the last four digits make it into logs.
fn masked(phone_number: &str) -> String {
    let key = phone_key(phone_number);
    let start = key.len().saturating_sub(4);
    format!("******{}", &key[start..])
}

// -- Message Central --

pub struct MessageCentral {
    client: Client,
    base_url: String,
    customer_id: String,
    password: String,
    email: String,
    sender_id: String,
}

impl MessageCentral {
    async fn token(&self) -> Result<String, NotifyError> {
        let key = B64.encode(self.password.as_bytes());
        let res = self
            .client
            .get(format!("{}/auth/v1/authentication/token", self.base_url))
            .query(&[
                ("customerId", self.customer_id.as_str()),
                ("key", key.as_str()),
                ("scope", "NEW"),
                ("country", COUNTRY_CODE),
                ("email", self.email.as_str()),
            ])
            .header(header::ACCEPT, "*/*")
            .send()
            .await?;

        check(res).await?.json::<TokenResponse>().await?.into_token()
    }

    async fn deliver(&self, phone_number: &str, message: &str) -> Result<(), NotifyError> {
        let token = self.token().await?;
        let res = self
            .client
            .post(format!("{}/verification/v3/send", self.base_url))
            .header("authToken", token)
            .json(&json!({
                "countryCode": COUNTRY_CODE,
                "mobileNumber": phone_key(phone_number),
                "flowType": "SMS",
                "type": "SMS",
                "messageType": "OTP",
                "senderId": self.sender_id,
                "message": message,
            }))
            .send()
            .await?;
        check(res).await?;

        debug!("Message Central accepted SMS to {}", masked(phone_number));
        Ok(())
    }
}

impl SmsSender for MessageCentral {
    fn send<'a>(&'a self, phone_number: &'a str, message: &'a str) -> BoxFuture<'a, Result<(), NotifyError>> {
        self.deliver(phone_number, message).boxed()
    }
}

// -- Bearer-token gateway --

pub struct BearerGateway {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    sender_id: String,
}

impl BearerGateway {
    async fn token(&self) -> Result<String, NotifyError> {
        let res = self
            .client
            .post(format!("{}/auth/token", self.base_url))
            .json(&json!({ "username": self.username, "password": self.password }))
            .send()
            .await?;

        check(res).await?.json::<TokenResponse>().await?.into_token()
    }

    async fn deliver(&self, phone_number: &str, message: &str) -> Result<(), NotifyError> {
        let token = self.token().await?;
        let res = self
            .client
            .post(format!("{}/sms/send", self.base_url))
            .bearer_auth(token)
            .json(&json!({
                "to": format!("+{}{}", COUNTRY_CODE, phone_key(phone_number)),
                "senderId": self.sender_id,
                "message": message,
            }))
            .send()
            .await?;
        check(res).await?;

        debug!("Gateway accepted SMS to {}", masked(phone_number));
        Ok(())
    }
}

impl SmsSender for BearerGateway {
    fn send<'a>(&'a self, phone_number: &'a str, message: &'a str) -> BoxFuture<'a, Result<(), NotifyError>> {
        self.deliver(phone_number, message).boxed()
    }
}

// -- Development --

/// Logs that a message would have been sent. The body is not logged since
/// it carries a password.
pub struct LogSender;

impl SmsSender for LogSender {
    fn send<'a>(&'a self, phone_number: &'a str, message: &'a str) -> BoxFuture<'a, Result<(), NotifyError>> {
        info!("SMS to {} suppressed ({} chars)", masked(phone_number), message.chars().count());
        futures_util::future::ready(Ok(())).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(provider: SmsProvider) -> SmsSettings {
        SmsSettings {
            provider,
            gateway_url: None,
            account: None,
            password: None,
            email: None,
            sender_id: "NAVADH".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn provider_names() {
        assert_eq!("message-central".parse::<SmsProvider>(), Ok(SmsProvider::MessageCentral));
        assert_eq!("Bearer".parse::<SmsProvider>(), Ok(SmsProvider::Bearer));
        assert!("twilio".parse::<SmsProvider>().is_err());
    }

    #[test]
    fn gateways_require_credentials() {
        let err = build_sender(&settings(SmsProvider::MessageCentral)).err().unwrap();
        assert!(matches!(err, NotifyError::NotConfigured("MESSAGE_CENTRAL_CUSTOMER_ID")));

        let err = build_sender(&settings(SmsProvider::Bearer)).err().unwrap();
        assert!(matches!(err, NotifyError::NotConfigured("SMS_GATEWAY_URL")));

        assert!(build_sender(&settings(SmsProvider::Log)).is_ok());
    }

    #[test]
    fn logs_mask_numbers() {
        assert_eq!(masked("+919876543210"), "******3210");
    }

    #[tokio::test]
    async fn log_sender_always_succeeds() {
        LogSender.send("9876543210", "Your password is: x").await.unwrap();
    }
}
