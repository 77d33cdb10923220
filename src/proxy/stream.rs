//! Ties credential rotation, admission, upstream dispatch, and SSE
//! passthrough together behind the two downstream HTTP endpoints.

use crate::credentials::pool::CredentialPool;
use crate::models::error::ProxyError;
use crate::models::settings::Settings;
use crate::proxy::normalize::normalize_request_body;
use crate::proxy::sse;
use crate::ratelimit::limiter::RateLimiter;
use crate::ratelimit::usage_store::UsageStore;
use actix_web::HttpResponse;
use bytes::Bytes;
use chrono::Utc;
use futures_util::StreamExt;
use log::{error, info, warn};
use serde_json::Value;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

const DEFAULT_CHAT_COMPLETIONS_ENDPOINT: &str =
    "https://api.individual.githubcopilot.com/chat/completions";
const DEFAULT_MODELS_ENDPOINT: &str = "https://api.individual.githubcopilot.com/models";

pub struct StreamProxy {
    client: reqwest::Client,
    credentials: Arc<CredentialPool>,
    limiter: Arc<RateLimiter>,
    usage_store: Arc<dyn UsageStore>,
    settings: Arc<Settings>,
    chat_endpoint: RwLock<String>,
    models_endpoint: RwLock<String>,
}

impl StreamProxy {
    pub fn new(
        client: reqwest::Client,
        credentials: Arc<CredentialPool>,
        limiter: Arc<RateLimiter>,
        usage_store: Arc<dyn UsageStore>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            client,
            credentials,
            limiter,
            usage_store,
            settings,
            chat_endpoint: RwLock::new(DEFAULT_CHAT_COMPLETIONS_ENDPOINT.to_string()),
            models_endpoint: RwLock::new(DEFAULT_MODELS_ENDPOINT.to_string()),
        }
    }

    /// Resolves the real upstream API base from the first successful
    /// credential exchange. Safe to call more than once; failures are
    /// logged and the static defaults are kept in place.
    pub async fn initialize(&self) {
        match self.credentials.get_active_session_token().await {
            Ok(token) => {
                if let Some(endpoints) = token.endpoints {
                    *self.chat_endpoint.write().unwrap() =
                        format!("{}/chat/completions", endpoints.api);
                    *self.models_endpoint.write().unwrap() = format!("{}/models", endpoints.api);
                    info!("resolved upstream endpoints from {}", endpoints.api);
                }
            }
            Err(e) => {
                warn!("could not resolve upstream endpoints at startup, using defaults: {e}");
            }
        }
    }

    fn chat_endpoint(&self) -> String {
        self.chat_endpoint.read().unwrap().clone()
    }

    fn models_endpoint(&self) -> String {
        self.models_endpoint.read().unwrap().clone()
    }

    pub async fn handle_models(&self) -> Result<HttpResponse, ProxyError> {
        let token = self.credentials.get_active_session_token().await?;
        let response = self
            .client
            .get(self.models_endpoint())
            .bearer_auth(&token.token)
            .header("editor-version", &self.settings.editor_version)
            .send()
            .await
            .map_err(|e| ProxyError::UpstreamIoError(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ProxyError::UpstreamIoError(e.to_string()))?;

        if !status.is_success() {
            error!("models API error: {status}");
            return Err(ProxyError::Upstream {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&body).to_string(),
            });
        }

        Ok(HttpResponse::Ok().content_type("application/json").body(body))
    }

    pub async fn handle_chat_completions(&self, mut body: Value) -> Result<HttpResponse, ProxyError> {
        let model = normalize_request_body(&mut body, self.settings.max_tokens)?;
        let is_streaming = body.get("stream").and_then(Value::as_bool).unwrap_or(false);
        let now = Utc::now().timestamp();

        if let Some(delay) = self.limiter.check_request(&model, now)? {
            info!("delaying request for model '{model}' by {delay:.1}s");
            tokio::time::sleep(Duration::from_secs_f64(delay)).await;
        }

        if self.settings.sleep_between_calls_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.settings.sleep_between_calls_ms)).await;
        }

        let token = self.credentials.get_active_session_token().await?;
        let response = self
            .client
            .post(self.chat_endpoint())
            .bearer_auth(&token.token)
            .header("editor-version", &self.settings.editor_version)
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProxyError::UpstreamIoError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            error!("chat completions API error: {status} {text}");
            return Err(ProxyError::Upstream {
                status: status.as_u16(),
                message: text,
            });
        }

        if model.starts_with("o1") && is_streaming {
            return self.respond_o1_as_sse(response, &model, now).await;
        }

        self.respond_streaming_passthrough(response, model, now)
    }

    /// `o1` doesn't support SSE upstream: fetch the full JSON response and
    /// synthesize the equivalent event stream.
    async fn respond_o1_as_sse(
        &self,
        response: reqwest::Response,
        model: &str,
        now: i64,
    ) -> Result<HttpResponse, ProxyError> {
        let full: Value = response
            .json()
            .await
            .map_err(|e| ProxyError::UpstreamIoError(e.to_string()))?;
        let converted = sse::convert_o1_response(&full);
        let frames = sse::convert_to_sse_events(&converted);
        let accumulated = frames.concat();

        self.record_usage_and_admission(model, &accumulated, now);

        Ok(HttpResponse::Ok()
            .content_type("text/event-stream")
            .body(accumulated))
    }

    /// Streams upstream chunks to the client as they arrive while
    /// accumulating them in a background task; once the upstream body is
    /// exhausted (or the connection drops), the accumulator is parsed for
    /// usage telemetry and the admission is recorded.
    fn respond_streaming_passthrough(
        &self,
        response: reqwest::Response,
        model: String,
        now: i64,
    ) -> Result<HttpResponse, ProxyError> {
        let (tx, rx) = mpsc::unbounded_channel::<Result<Bytes, actix_web::Error>>();
        let limiter = Arc::clone(&self.limiter);
        let usage_store = Arc::clone(&self.usage_store);

        actix_web::rt::spawn(async move {
            let mut accumulated = String::new();
            let mut upstream = response.bytes_stream();

            while let Some(chunk) = upstream.next().await {
                match chunk {
                    Ok(bytes) => {
                        accumulated.push_str(&String::from_utf8_lossy(&bytes));
                        if tx.send(Ok(bytes)).is_err() {
                            // Client disconnected; stop forwarding but keep
                            // accumulating isn't possible once upstream has
                            // no reader for the channel, so we fall through
                            // to recording whatever usage has been observed
                            // up to this point.
                            break;
                        }
                    }
                    Err(e) => {
                        error!("error reading upstream stream: {e}");
                        break;
                    }
                }
            }

            let events = sse::parse_events(&accumulated);
            if let Some((input_tokens, output_tokens, _total)) = sse::extract_usage(&events) {
                usage_store.record(&model, input_tokens, output_tokens, now);
            }
            if let Err(e) = limiter.check_tokens(&model, now, usage_store.as_ref()) {
                warn!("token-rate check failed after recording usage for '{model}': {e}");
            }
            limiter.record_request(&model, now);
        });

        Ok(HttpResponse::Ok()
            .content_type("text/event-stream")
            .streaming(UnboundedReceiverStream::new(rx)))
    }

    fn record_usage_and_admission(&self, model: &str, accumulated: &str, now: i64) {
        let events = sse::parse_events(accumulated);
        if let Some((input_tokens, output_tokens, _total)) = sse::extract_usage(&events) {
            self.usage_store.record(model, input_tokens, output_tokens, now);
        }
        if let Err(e) = self.limiter.check_tokens(model, now, self.usage_store.as_ref()) {
            warn!("token-rate check failed after recording usage for '{model}': {e}");
        }
        self.limiter.record_request(model, now);
    }
}
