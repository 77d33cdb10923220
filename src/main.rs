use actix_web::{middleware::Logger, web, App, HttpServer};
use copilot_gateway::config::settings::load_settings;
use copilot_gateway::config::validation::ConfigValidator;
use copilot_gateway::credentials::pool::CredentialPool;
use copilot_gateway::logs::logger::configure_logger;
use copilot_gateway::models::settings::Settings;
use copilot_gateway::proxy::stream::StreamProxy;
use copilot_gateway::ratelimit::limiter::RateLimiter;
use copilot_gateway::ratelimit::usage_store::InMemoryUsageStore;
use copilot_gateway::routes::{chat, health, models};
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

fn build_http_client(settings: &Settings) -> reqwest::Client {
    let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(settings.timeout_seconds));
    if settings.record_traffic {
        // Traffic recording expects a local intercepting proxy in front of
        // this client; verifying its certificate would defeat the point.
        builder = builder.danger_accept_invalid_certs(true);
    }
    builder.build().expect("failed to build HTTP client")
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config: Settings = load_settings().expect("failed to load settings");
    configure_logger(&config.log_level);

    info!("Starting chat-completion gateway");

    let validation_result = ConfigValidator::validate_comprehensive(&config);
    if !validation_result.is_valid {
        error!("Configuration validation failed:");
        for err in &validation_result.errors {
            error!("  - {err}");
        }
        std::process::exit(1);
    }

    let settings = Arc::new(config);
    let client = build_http_client(&settings);

    let credentials = Arc::new(CredentialPool::new(
        client.clone(),
        settings.refresh_tokens.clone(),
        settings.editor_version.clone(),
        settings.active_token_index,
    ));
    let limiter = Arc::new(RateLimiter::new(settings.rate_limits.clone()));
    let usage_store: Arc<InMemoryUsageStore> = Arc::new(InMemoryUsageStore::new());
    let proxy = Arc::new(StreamProxy::new(
        client,
        Arc::clone(&credentials),
        Arc::clone(&limiter),
        usage_store,
        Arc::clone(&settings),
    ));
    proxy.initialize().await;

    let host = settings.host.clone();
    let port = settings.port;

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::from(Arc::clone(&proxy)))
            .app_data(web::JsonConfig::default().limit(1024 * 1024))
            .wrap(Logger::default())
            .configure(health::configure_health)
            .configure(models::configure_models)
            .configure(chat::configure_chat)
    })
    .bind((host.as_str(), port))?
    .run();

    tokio::select! {
        result = server => {
            match result {
                Ok(_) => info!("Server stopped gracefully"),
                Err(e) => error!("Server error: {e}"),
            }
        }
        _ = signal::ctrl_c() => {
            info!("Received shutdown signal, stopping server...");
        }
    }

    Ok(())
}
