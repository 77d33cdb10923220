//! Exchanges long-lived refresh credentials for short-lived upstream session
//! tokens, caching per credential index and failing over when the active
//! credential is rejected.
//!
//! All mutation of the cache, active-index cursor, and error map is
//! serialized under a single [`std::sync::Mutex`]; the network exchange
//! itself runs outside the lock so a slow upstream never blocks unrelated
//! cache reads.

use crate::models::error::ProxyError;
use crate::models::settings::SessionToken;
use chrono::Utc;
use log::{debug, error, info};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::sleep;

const TOKEN_EXCHANGE_URL: &str = "https://api.github.com/copilot_internal/v2/token";
/// Safety margin before a cached token's real expiry at which it is treated
/// as already expired, so an in-flight request never races a token that
/// dies mid-call.
const EXPIRY_SAFETY_MARGIN_SECS: i64 = 300;

struct PoolState {
    active_index: usize,
    cached: HashMap<usize, SessionToken>,
    errors: HashMap<usize, String>,
}

/// Owns every refresh credential and the session tokens exchanged for them.
pub struct CredentialPool {
    client: reqwest::Client,
    refresh_tokens: Vec<String>,
    editor_version: String,
    state: Mutex<PoolState>,
}

impl CredentialPool {
    pub fn new(
        client: reqwest::Client,
        refresh_tokens: Vec<String>,
        editor_version: String,
        active_index: usize,
    ) -> Self {
        Self {
            client,
            refresh_tokens,
            editor_version,
            state: Mutex::new(PoolState {
                active_index,
                cached: HashMap::new(),
                errors: HashMap::new(),
            }),
        }
    }

    pub fn active_index(&self) -> usize {
        self.state.lock().unwrap().active_index
    }

    pub fn credential_count(&self) -> usize {
        self.refresh_tokens.len()
    }

    pub fn errors(&self) -> HashMap<usize, String> {
        self.state.lock().unwrap().errors.clone()
    }

    fn set_active(&self, index: usize) {
        let mut state = self.state.lock().unwrap();
        state.active_index = index;
        info!("switched to credential {index}");
    }

    fn cache_token(&self, index: usize, token: SessionToken) {
        let mut state = self.state.lock().unwrap();
        debug!(
            "caching token for credential {index}, expires at {}",
            token.expires_at
        );
        state.cached.insert(index, token);
        state.errors.remove(&index);
    }

    fn record_error(&self, index: usize, message: String) {
        let mut state = self.state.lock().unwrap();
        error!("credential {index} error: {message}");
        state.errors.insert(index, message);
    }

    /// Returns a valid session token for the active credential, refreshing
    /// or failing over as needed.
    pub async fn get_active_session_token(&self) -> Result<SessionToken, ProxyError> {
        let current_index = self.active_index();
        let now = Utc::now().timestamp();

        if let Some(token) = self.state.lock().unwrap().cached.get(&current_index).cloned() {
            if token.expires_at > now + EXPIRY_SAFETY_MARGIN_SECS {
                debug!("using cached token for credential {current_index}");
                return Ok(token);
            }
        }

        debug!("token for credential {current_index} expired or missing, refreshing");
        match self.refresh(current_index).await {
            Ok(token) => Ok(token),
            Err(_) => self.try_next_valid_credential(current_index).await,
        }
    }

    /// Exchanges credential `index` for a fresh session token.
    pub async fn refresh(&self, index: usize) -> Result<SessionToken, ProxyError> {
        let credential = self
            .refresh_tokens
            .get(index)
            .ok_or_else(|| ProxyError::Internal(format!("invalid credential index {index}")))?
            .clone();

        let result = self
            .client
            .get(TOKEN_EXCHANGE_URL)
            .header("Authorization", format!("token {credential}"))
            .header("editor-version", &self.editor_version)
            .send()
            .await;

        let response = match result {
            Ok(r) => r,
            Err(e) => {
                let message = format!("failed to refresh credential {index}: {e}");
                self.record_error(index, message.clone());
                return Err(ProxyError::UpstreamIoError(message));
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let parsed = parse_github_error(&body);
            let message = format!("failed to refresh credential {index}: {status} {parsed}");
            self.record_error(index, message.clone());
            return Err(ProxyError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let token: SessionToken = serde_json::from_str(&body).map_err(|e| {
            ProxyError::Internal(format!("malformed token response for credential {index}: {e}"))
        })?;
        self.cache_token(index, token.clone());
        Ok(token)
    }

    /// Iterates forward through the remaining credentials, 2s before each
    /// attempt and 1s between consecutive failures. Bounded by the number of
    /// remaining credentials, so unlike the process this proxy rotates
    /// credentials for, a run where every credential fails terminates with
    /// [`ProxyError::AllCredentialsExhausted`] instead of recursing forever.
    async fn try_next_valid_credential(
        &self,
        from_index: usize,
    ) -> Result<SessionToken, ProxyError> {
        for i in (from_index + 1)..self.refresh_tokens.len() {
            sleep(Duration::from_secs(2)).await;
            info!("attempting to switch to credential {i}");
            match self.refresh(i).await {
                Ok(token) => {
                    self.set_active(i);
                    info!("successfully switched to credential {i}");
                    return Ok(token);
                }
                Err(e) => {
                    error!("credential {i} also failed: {e}");
                    sleep(Duration::from_secs(1)).await;
                    continue;
                }
            }
        }
        Err(ProxyError::AllCredentialsExhausted(
            "all available credentials have failed".to_string(),
        ))
    }
}

/// Extracts the most useful message from a GitHub-shaped error body,
/// falling back to the raw text when it isn't JSON or doesn't match either
/// recognized shape.
fn parse_github_error(response_text: &str) -> String {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(response_text) else {
        return response_text.to_string();
    };
    if let Some(details) = value.get("error_details").and_then(|d| d.get("message")) {
        if let Some(s) = details.as_str() {
            return s.to_string();
        }
    }
    if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
        return message.to_string();
    }
    response_text.to_string()
}
