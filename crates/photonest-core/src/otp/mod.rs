//! Client for the one-time-password email verification service.
//!
//! The service exposes two JSON endpoints, `POST /send-otp` and
//! `POST /verify-otp`, both answering `{"success": bool, "message": string}`.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::{compact_text, is_http_url, normalize_email};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum OtpError {
    #[error("Invalid OTP service configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("{0}")]
    InvalidInput(String),
    #[error("OTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("OTP service error ({status}): {message}")]
    Server { status: u16, message: String },
    /// The service answered `success: false`
    #[error("{0}")]
    Rejected(String),
}

impl OtpError {
    pub fn is_network(&self) -> bool {
        match self {
            Self::Http(error) => error.is_connect() || error.is_timeout() || error.is_request(),
            _ => false,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::Server { status, .. } => *status >= 500,
            other => other.is_network(),
        }
    }
}

pub type OtpResult<T> = Result<T, OtpError>;

/// Retry schedule for transient failures (connect errors, timeouts, 5xx).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based); doubles each time.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

#[derive(Debug, Serialize)]
struct SendOtpRequest<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct VerifyOtpRequest<'a> {
    email: &'a str,
    otp: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OtpResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct OtpClient {
    base_url: String,
    client: Client,
    retry: RetryPolicy,
}

impl OtpClient {
    pub fn new(base_url: &str) -> OtpResult<Self> {
        Self::with_policy(base_url, RetryPolicy::default(), REQUEST_TIMEOUT)
    }

    pub fn with_policy(base_url: &str, retry: RetryPolicy, timeout: Duration) -> OtpResult<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            return Err(OtpError::InvalidConfiguration(
                "OTP service URL must not be empty",
            ));
        }
        if !is_http_url(base_url) {
            return Err(OtpError::InvalidConfiguration(
                "OTP service URL must include http:// or https://",
            ));
        }
        if retry.max_attempts == 0 {
            return Err(OtpError::InvalidConfiguration(
                "OTP retry policy needs at least one attempt",
            ));
        }

        Ok(Self {
            base_url: base_url.to_string(),
            client: Client::builder().timeout(timeout).build()?,
            retry,
        })
    }

    /// Ask the service to email a code, returning its confirmation message.
    pub async fn send_otp(&self, email: &str) -> OtpResult<String> {
        let email = validate_email(email)?;
        self.post("send-otp", &SendOtpRequest { email: &email }).await
    }

    /// Check a code the user received, returning the service's message.
    pub async fn verify_otp(&self, email: &str, otp: &str) -> OtpResult<String> {
        let email = validate_email(email)?;
        let otp = otp.trim();
        if otp.len() < 4 || otp.len() > 8 || !otp.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(OtpError::InvalidInput(
                "Enter the numeric code from your email".to_string(),
            ));
        }
        self.post("verify-otp", &VerifyOtpRequest { email: &email, otp })
            .await
    }

    async fn post<B: Serialize + Sync>(&self, endpoint: &str, body: &B) -> OtpResult<String> {
        let url = format!("{}/{endpoint}", self.base_url);
        let mut attempt = 1;
        loop {
            match self.post_once(&url, body).await {
                Ok(response) => return Ok(response),
                Err(error) if error.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        "OTP {} attempt {}/{} failed: {}; retrying in {:?}",
                        endpoint,
                        attempt,
                        self.retry.max_attempts,
                        error,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn post_once<B: Serialize + Sync>(&self, url: &str, body: &B) -> OtpResult<String> {
        tracing::debug!("--> POST {}", url);
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        tracing::debug!("<-- {} {}", status.as_u16(), url);

        let text = response.text().await?;
        let parsed = serde_json::from_str::<OtpResponse>(&text).ok();
        if !status.is_success() {
            let message = parsed
                .map(|payload| payload.message)
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| fallback_message(status, &text));
            return Err(OtpError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let Some(payload) = parsed else {
            return Err(OtpError::Server {
                status: status.as_u16(),
                message: format!("unexpected response: {}", compact_text(&text)),
            });
        };
        if payload.success {
            Ok(payload.message)
        } else if payload.message.trim().is_empty() {
            Err(OtpError::Rejected("The code could not be verified".to_string()))
        } else {
            Err(OtpError::Rejected(payload.message))
        }
    }
}

fn validate_email(email: &str) -> OtpResult<String> {
    normalize_email(email)
        .ok_or_else(|| OtpError::InvalidInput("Enter a valid email address".to_string()))
}

fn fallback_message(status: StatusCode, body: &str) -> String {
    let body = compact_text(body);
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body
    }
}
