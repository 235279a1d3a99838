//! notify::slack
//!
//! Chat-webhook notifier backed by the Slack Web API.
//!
//! # Design
//!
//! Every lifecycle event becomes one `chat.postMessage` call carrying a
//! plain-text fallback and a single mrkdwn section block.
//!
//! # Authentication
//!
//! A bot token and a channel id are required. They are passed explicitly or
//! read from `SLACK_BOT_TOKEN` and `CHANNEL_ID`. Populate those from a dotenv
//! file with [`crate::config::load_dotenv`] before constructing the notifier.
//!
//! # Errors
//!
//! Slack answers most failures with HTTP 200 and `{"ok": false}`. Both the
//! HTTP status and the `ok` flag are mapped onto [`NotifyError`]. Nothing is
//! retried.
//!
//! # Example
//!
//! ```ignore
//! use jobhook::notify::SlackNotifier;
//!
//! let notifier = SlackNotifier::from_env()?;
//! notifier.notify_started("nightly-train").await?;
//! ```

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::traits::{Hook, Notifier, NotifyError};

/// Default Slack Web API base URL.
pub const DEFAULT_API_BASE: &str = "https://slack.com/api";

/// Environment variable holding the bot token.
pub const TOKEN_ENV: &str = "SLACK_BOT_TOKEN";

/// Environment variable holding the channel id.
pub const CHANNEL_ENV: &str = "CHANNEL_ID";

/// Environment variable overriding the API base URL.
pub const API_BASE_ENV: &str = "SLACK_API_BASE";

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "jobhook";

/// Slack error codes that mean the token is unusable.
const AUTH_ERROR_CODES: &[&str] = &[
    "invalid_auth",
    "not_authed",
    "account_inactive",
    "token_revoked",
    "token_expired",
];

/// Slack notifier.
///
/// Holds only connection parameters; a fresh request is built per event.
pub struct SlackNotifier {
    /// HTTP client for making requests
    client: Client,
    /// Bot token
    token: String,
    /// Channel the messages go to
    channel_id: String,
    /// API base URL (configurable for tests and proxies)
    api_base: String,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for SlackNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackNotifier")
            .field("has_token", &!self.token.is_empty())
            .field("channel_id", &self.channel_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl SlackNotifier {
    /// Create a Slack notifier with explicit credentials.
    pub fn new(token: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            channel_id: channel_id.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Create a Slack notifier with a custom API base URL.
    ///
    /// Use this to point the notifier at a mock server or an egress proxy.
    pub fn with_api_base(
        token: impl Into<String>,
        channel_id: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            api_base: api_base.into(),
            ..Self::new(token, channel_id)
        }
    }

    /// Create a Slack notifier, falling back to the environment for any
    /// credential that is not given.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::MissingCredential` naming the variable that is
    /// absent (or empty).
    pub fn from_parts(
        token: Option<String>,
        channel_id: Option<String>,
    ) -> Result<Self, NotifyError> {
        let token = match token {
            Some(token) => token,
            None => read_env(TOKEN_ENV)?,
        };
        let channel_id = match channel_id {
            Some(channel) => channel,
            None => read_env(CHANNEL_ENV)?,
        };
        let api_base = std::env::var(API_BASE_ENV)
            .ok()
            .filter(|base| !base.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Ok(Self::with_api_base(token, channel_id, api_base))
    }

    /// Create a Slack notifier entirely from the environment.
    pub fn from_env() -> Result<Self, NotifyError> {
        Self::from_parts(None, None)
    }

    /// Get the channel id.
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// Build the URL for a Web API method.
    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base.trim_end_matches('/'), method)
    }

    /// Build common headers for API requests.
    fn headers(&self) -> Result<HeaderMap, NotifyError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|_| NotifyError::AuthFailed("token contains invalid characters".into()))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        Ok(headers)
    }

    /// Post one message and map the outcome.
    async fn post(&self, message: SlackMessage) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.method_url("chat.postMessage"))
            .headers(self.headers()?)
            .json(&message)
            .send()
            .await
            .map_err(|e| NotifyError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(map_status_error(status, response.text().await.ok()));
        }

        let body: SlackResponse = response.json().await.map_err(|e| NotifyError::ApiError {
            status: status.as_u16(),
            message: format!("Failed to parse response: {}", e),
        })?;

        if body.ok {
            return Ok(());
        }

        let code = body.error.unwrap_or_else(|| "unknown_error".to_string());
        if AUTH_ERROR_CODES.contains(&code.as_str()) {
            Err(NotifyError::AuthFailed(code))
        } else if code == "ratelimited" {
            Err(NotifyError::RateLimited)
        } else {
            Err(NotifyError::ApiError {
                status: status.as_u16(),
                message: code,
            })
        }
    }
}

/// Read a required, non-empty environment variable.
fn read_env(name: &str) -> Result<String, NotifyError> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(NotifyError::MissingCredential(format!(
            "provide it explicitly or set ${}",
            name
        ))),
    }
}

/// Map a non-2xx HTTP status onto a notifier error.
fn map_status_error(status: StatusCode, body: Option<String>) -> NotifyError {
    let message = body
        .filter(|b| !b.trim().is_empty())
        .unwrap_or_else(|| "Unknown error".to_string());

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => NotifyError::AuthFailed(message),
        StatusCode::TOO_MANY_REQUESTS => NotifyError::RateLimited,
        _ if status.is_server_error() => NotifyError::ApiError {
            status: status.as_u16(),
            message: format!("Slack server error: {}", message),
        },
        _ => NotifyError::ApiError {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn name(&self) -> &'static str {
        "slack"
    }

    async fn notify_started(&self, job: &str) -> Result<(), NotifyError> {
        self.post(SlackMessage::for_hook(&self.channel_id, Hook::Started, job, None))
            .await
    }

    async fn notify_finished(&self, job: &str) -> Result<(), NotifyError> {
        self.post(SlackMessage::for_hook(&self.channel_id, Hook::Finished, job, None))
            .await
    }

    async fn notify_failed(&self, job: &str, error: &str) -> Result<(), NotifyError> {
        self.post(SlackMessage::for_hook(
            &self.channel_id,
            Hook::Failed,
            job,
            Some(error),
        ))
        .await
    }
}

// =============================================================================
// Slack API types (internal)
// =============================================================================

/// Body of a `chat.postMessage` call.
#[derive(Debug, Serialize)]
struct SlackMessage {
    channel: String,
    text: String,
    blocks: Vec<SlackBlock>,
}

#[derive(Debug, Serialize)]
struct SlackBlock {
    #[serde(rename = "type")]
    kind: &'static str,
    text: SlackText,
}

#[derive(Debug, Serialize)]
struct SlackText {
    #[serde(rename = "type")]
    kind: &'static str,
    text: String,
}

impl SlackMessage {
    /// Build the message for one lifecycle hook.
    fn for_hook(channel: &str, hook: Hook, job: &str, error: Option<&str>) -> Self {
        let (fallback, section) = match hook {
            Hook::Started => (
                "Job Started!",
                format!(" :ballot_box_with_check: Job {} started.", job),
            ),
            Hook::Finished => (
                "Job Finished!",
                format!(":white_check_mark: Job {} finished execution.", job),
            ),
            Hook::Failed => (
                "Job Failed!",
                format!(
                    ":x: Job {} failed, reason:\n ```{}```",
                    job,
                    error.unwrap_or("unknown error")
                ),
            ),
        };

        Self {
            channel: channel.to_string(),
            text: fallback.to_string(),
            blocks: vec![SlackBlock {
                kind: "section",
                text: SlackText {
                    kind: "mrkdwn",
                    text: section,
                },
            }],
        }
    }
}

/// Minimal view of a Web API response.
#[derive(Debug, Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}
