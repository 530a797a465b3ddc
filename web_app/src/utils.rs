//! Start-up helpers shared by main and the handlers

use crate::config;
use anyhow::Context;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
};
use std::str::FromStr;

pub async fn setup_sqlite_db_pool(encrypted: bool) -> anyhow::Result<SqlitePool> {
    let app_config = config::APP_CONFIG
        .get()
        .context("failed to get app config")?;
    let options = SqliteConnectOptions::from_str(&app_config.db_host)
        .with_context(|| format!("invalid DB_HOST: {}", app_config.db_host))?
        .pragma("foreign_keys", "ON");

    if encrypted {
        return SqlitePool::connect_with(
            options
                .pragma("key", app_config.db_pass_encrypt.clone())
                .pragma("cipher_page_size", "1024")
                .pragma("kdf_iter", "64000")
                .pragma("cipher_hmac_algorithm", "HMAC_SHA1")
                .pragma("cipher_kdf_algorithm", "PBKDF2_HMAC_SHA1")
                .journal_mode(SqliteJournalMode::Delete),
        )
        .await
        .context("failed to open encrypted database");
    }

    SqlitePool::connect_with(options)
        .await
        .context("failed to open database")
}

/// Shared client for the Graph API and the completion provider
pub fn build_http_client(timeout: std::time::Duration) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .context("failed to build http client")
}
