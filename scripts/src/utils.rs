use crate::{action::ConnectPageArgs, config};
use anyhow::Context;
use sqlx::{
    Row, SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
};
use std::str::FromStr;

const PLATFORMS: [&str; 4] = ["facebook", "instagram", "whatsapp", "web"];

const QUERY_UPSERT_INTEGRATION_TOKEN: &str = r#"
INSERT INTO integration_token (tenant_id, platform, page_id, access_token, display_name, created_at)
VALUES (?, ?, ?, ?, ?, ?)
ON CONFLICT (platform, page_id) DO UPDATE SET
    tenant_id = excluded.tenant_id,
    access_token = excluded.access_token,
    display_name = excluded.display_name
RETURNING id;
"#;

const QUERY_DELETE_INTEGRATION_TOKEN: &str =
    "DELETE FROM integration_token WHERE platform = ? AND page_id = ?;";

const QUERY_RECENT_AUDIT_LOGS: &str = r#"
SELECT id, tenant_id, level, message, metadata, created_at
FROM audit_log
WHERE (? IS NULL OR tenant_id = ?)
ORDER BY created_at DESC, id DESC
LIMIT ?;
"#;

pub async fn run_migrations(db_pool: &sqlx::SqlitePool, file_name: &str) -> anyhow::Result<()> {
    let mut tera = tera::Tera::new("../migrations/**/*.sql")?;
    tera.autoescape_on(vec![".sql"]);

    let create_tables_query = tera.render(file_name, &tera::Context::new())?;

    sqlx::raw_sql(&create_tables_query).execute(db_pool).await?;
    Ok(())
}

pub async fn setup_sqlite_db_pool(app_config: &config::AppConfig) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&app_config.db_host)?
        .create_if_missing(true)
        .pragma("foreign_keys", "ON");

    if app_config.is_prod() {
        return Ok(SqlitePool::connect_with(
            options
                .pragma("key", app_config.db_pass_encrypt.clone())
                .pragma("cipher_page_size", "1024")
                .pragma("kdf_iter", "64000")
                .pragma("cipher_hmac_algorithm", "HMAC_SHA1")
                .pragma("cipher_kdf_algorithm", "PBKDF2_HMAC_SHA1")
                .journal_mode(SqliteJournalMode::Delete),
        )
        .await?);
    }

    Ok(SqlitePool::connect_with(options).await?)
}

fn normalize_platform(platform: &str) -> anyhow::Result<String> {
    let platform = platform.trim().to_lowercase();
    if !PLATFORMS.contains(&platform.as_str()) {
        anyhow::bail!("unknown platform '{platform}', expected one of {PLATFORMS:?}");
    }
    Ok(platform)
}

/// Same write the dashboard does after the OAuth connect flow
pub async fn connect_page(db_pool: &SqlitePool, args: &ConnectPageArgs) -> anyhow::Result<i64> {
    let platform = normalize_platform(&args.platform)?;

    let row = sqlx::query(QUERY_UPSERT_INTEGRATION_TOKEN)
        .bind(args.tenant_id)
        .bind(platform)
        .bind(&args.page_id)
        .bind(&args.access_token)
        .bind(&args.display_name)
        .bind(chrono::Utc::now())
        .fetch_one(db_pool)
        .await
        .context("failed to store integration token")?;

    Ok(row.try_get("id")?)
}

pub async fn disconnect_page(
    db_pool: &SqlitePool,
    platform: &str,
    page_id: &str,
) -> anyhow::Result<u64> {
    let platform = normalize_platform(platform)?;
    let result = sqlx::query(QUERY_DELETE_INTEGRATION_TOKEN)
        .bind(platform)
        .bind(page_id)
        .execute(db_pool)
        .await?;

    Ok(result.rows_affected())
}

/// Newest first, one json object per entry
pub async fn recent_audit_logs(
    db_pool: &SqlitePool,
    tenant_id: Option<i64>,
    limit: i64,
) -> anyhow::Result<Vec<String>> {
    let rows = sqlx::query(QUERY_RECENT_AUDIT_LOGS)
        .bind(tenant_id)
        .bind(tenant_id)
        .bind(limit.max(1))
        .fetch_all(db_pool)
        .await?;

    rows.into_iter()
        .map(|row| {
            let metadata: String = row.try_get("metadata")?;
            let created_at: chrono::DateTime<chrono::Utc> = row.try_get("created_at")?;
            let line = serde_json::json!({
                "id": row.try_get::<i64, _>("id")?,
                "tenant_id": row.try_get::<Option<i64>, _>("tenant_id")?,
                "level": row.try_get::<String, _>("level")?,
                "message": row.try_get::<String, _>("message")?,
                "metadata": serde_json::from_str::<serde_json::Value>(&metadata)
                    .unwrap_or(serde_json::Value::String(metadata)),
                "created_at": created_at.to_rfc3339(),
            });
            Ok(line.to_string())
        })
        .collect()
}
