//! `GET /models` - passthrough to the upstream models endpoint.

use crate::models::error::ProxyError;
use crate::proxy::stream::StreamProxy;
use actix_web::{web, HttpResponse};

pub async fn list_models(proxy: web::Data<StreamProxy>) -> Result<HttpResponse, ProxyError> {
    proxy.handle_models().await
}

pub fn configure_models(cfg: &mut web::ServiceConfig) {
    cfg.route("/models", web::get().to(list_models));
}
