//! # Social Reply
//!
//! Multi-tenant auto-reply service for Facebook, Instagram, WhatsApp and
//! website forms. Receives signed webhooks, resolves the tenant owning the
//! page and answers comments and messages with a greeting or an AI reply.

#![recursion_limit = "256"]

pub mod config;
pub mod consts;
pub mod metric;
pub mod models;
pub mod repo;
pub mod services;
pub mod utils;
pub mod webhook;

use anyhow::Context;
use logfire::config::MetricsOptions;
use ntex::web;
use openssl::ssl::{SslAcceptor, SslFiletype, SslMethod};

#[ntex::main]
async fn main() -> anyhow::Result<()> {
    config::init_config()?;

    let app_config = config::APP_CONFIG
        .get()
        .context("failed to get app config")?;

    // Initialize logging and metrics, local runs without a token stay on stdout
    let mut logfire_config = logfire::configure()
        .install_panic_handler()
        .with_metrics(Some(MetricsOptions::default()))
        .send_to_logfire(logfire::config::SendToLogfire::IfTokenPresent);
    if let Some(token) = &app_config.logfire_token {
        logfire_config = logfire_config.with_token(token);
    }
    let shutdown_handler = logfire_config.finish()?;

    if app_config.mock_mode && app_config.is_prod() {
        logfire::error!("MOCK_MODE is ignored in prod, webhook signatures stay enforced");
    } else if app_config.mock_mode {
        logfire::warn!("MOCK_MODE enabled, invalid webhook signatures will be accepted");
    }

    let sqlite_repo = repo::sqlite::SqlxSqliteRepo {
        db_pool: utils::setup_sqlite_db_pool(app_config.is_prod()).await?,
    };

    let http_client = utils::build_http_client(app_config.http_timeout())?;
    let (audit_sink, audit_rx) =
        services::audit::ChannelAuditSink::new(app_config.audit_buffer_size);
    ntex::rt::spawn(services::audit::run_audit_writer(
        audit_rx,
        Box::new(sqlite_repo.clone()),
    ));

    configure_and_run_server(sqlite_repo, http_client, audit_sink).await?;

    shutdown_handler.shutdown()?;

    Ok(())
}

/// Configures SSL acceptor for production environments
fn setup_ssl_acceptor() -> anyhow::Result<openssl::ssl::SslAcceptorBuilder> {
    let mut ssl_acceptor = SslAcceptor::mozilla_intermediate(SslMethod::tls_server())
        .map_err(|e| anyhow::anyhow!("Failed to create SSL acceptor: {}", e))?;

    let app_config = config::APP_CONFIG
        .get()
        .context("failed to get app config")?;
    ssl_acceptor
        .set_private_key_file(&app_config.private_key_path, SslFiletype::PEM)
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to load private key from {}: {}",
                app_config.private_key_path,
                e
            )
        })?;

    ssl_acceptor
        .set_certificate_file(&app_config.certificate_path, SslFiletype::PEM)
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to load certificate from {}: {}",
                app_config.certificate_path,
                e
            )
        })?;

    Ok(ssl_acceptor)
}

/// Completion client, disabled when no API key is configured
fn create_ai_completion(
    app_config: &config::AppConfig,
    http_client: reqwest::Client,
) -> services::ImplAiCompletion {
    match &app_config.openai_api_key {
        Some(api_key) => Box::new(services::ai::OpenAiCompletion {
            client: http_client,
            base_url: app_config.openai_base_url.clone(),
            api_key: api_key.clone(),
            model: app_config.openai_model.clone(),
        }),
        None => Box::new(services::ai::DisabledAiCompletion),
    }
}

/// Creates application state from the provided services
fn create_app_state(
    app_config: &config::AppConfig,
    sqlite_repo: repo::sqlite::SqlxSqliteRepo,
    http_client: reqwest::Client,
    audit_sink: services::audit::ChannelAuditSink,
) -> webhook::AppState {
    webhook::AppState {
        repo: Box::new(sqlite_repo),
        ai: create_ai_completion(app_config, http_client.clone()),
        sender: Box::new(services::graph::GraphApiSender {
            client: http_client,
            base_url: app_config.graph_api_base_url(),
        }),
        audit: Box::new(audit_sink),
        webhooks: app_config.webhook_config(),
        ai_timeout: app_config.ai_timeout(),
    }
}

/// Configures and starts the web server with appropriate SSL settings
async fn configure_and_run_server(
    sqlite_repo: repo::sqlite::SqlxSqliteRepo,
    http_client: reqwest::Client,
    audit_sink: services::audit::ChannelAuditSink,
) -> anyhow::Result<()> {
    let app_config = config::APP_CONFIG
        .get()
        .context("failed to get app config")?;
    let server_addr = (
        app_config.web_server_host.clone(),
        app_config.web_server_port,
    );

    if app_config.openai_api_key.is_none() {
        logfire::warn!("OPENAI_API_KEY not set, replies fall back to greetings");
    }

    let server = web::server(move || {
        web::App::new()
            .wrap(web::middleware::Logger::default())
            .wrap(web::middleware::Compress::default())
            .state(create_app_state(
                app_config,
                sqlite_repo.clone(),
                http_client.clone(),
                audit_sink.clone(),
            ))
            .configure(webhook::routes::webhooks)
    });

    let bound_server = if app_config.is_prod() {
        let ssl_acceptor = setup_ssl_acceptor()?;
        server.bind_openssl(server_addr, ssl_acceptor)?
    } else {
        server.bind(server_addr)?
    };

    logfire::info!(
        "Listening on {host}:{port}",
        host = app_config.web_server_host.clone(),
        port = app_config.web_server_port as i64
    );

    bound_server
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))
}
