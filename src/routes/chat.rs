//! `POST /chat/completions` - the streaming chat-completion proxy endpoint.

use crate::models::error::ProxyError;
use crate::proxy::stream::StreamProxy;
use actix_web::{web, HttpResponse};
use log::info;
use serde_json::Value;

pub async fn chat_completions(
    proxy: web::Data<StreamProxy>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ProxyError> {
    info!("received chat completion request");
    proxy.handle_chat_completions(body.into_inner()).await
}

pub fn configure_chat(cfg: &mut web::ServiceConfig) {
    cfg.route("/chat/completions", web::post().to(chat_completions));
}
