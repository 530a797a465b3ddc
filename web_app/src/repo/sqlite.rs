use crate::models;
use async_trait::async_trait;
use sqlx::{FromRow, Row, SqlitePool, sqlite::SqliteRow};

use super::{AppRepo, sqlite_queries};

#[derive(Clone)]
pub struct SqlxSqliteRepo {
    pub db_pool: SqlitePool,
}

impl FromRow<'_, SqliteRow> for models::audit::AuditLogEntry {
    fn from_row(row: &SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            level: row.try_get("level")?,
            message: row.try_get("message")?,
            metadata: serde_json::from_str(row.try_get::<&str, &str>("metadata")?)
                .unwrap_or_else(|_| serde_json::json!({})),
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl AppRepo for SqlxSqliteRepo {
    async fn get_integration_token_by_page_id(
        &self,
        platform: models::integration::Platform,
        page_id: &str,
    ) -> anyhow::Result<Option<models::integration::IntegrationToken>> {
        Ok(sqlx::query_as::<_, models::integration::IntegrationToken>(
            sqlite_queries::QUERY_GET_INTEGRATION_TOKEN_BY_PAGE_ID,
        )
        .bind(platform.to_string())
        .bind(page_id)
        .fetch_optional(&self.db_pool)
        .await?)
    }

    async fn get_tenant_by_id(
        &self,
        tenant_id: i64,
    ) -> anyhow::Result<Option<models::tenant::Tenant>> {
        Ok(
            sqlx::query_as::<_, models::tenant::Tenant>(sqlite_queries::QUERY_GET_TENANT_BY_ID)
                .bind(tenant_id)
                .fetch_optional(&self.db_pool)
                .await?,
        )
    }

    async fn get_automation_settings(
        &self,
        tenant_id: i64,
    ) -> anyhow::Result<Option<models::automation::AutomationSettings>> {
        Ok(sqlx::query_as::<_, models::automation::AutomationSettings>(
            sqlite_queries::QUERY_GET_AUTOMATION_SETTINGS,
        )
        .bind(tenant_id)
        .fetch_optional(&self.db_pool)
        .await?)
    }

    async fn insert_audit_log(&self, entry: &models::audit::AuditLogEntry) -> anyhow::Result<i64> {
        Ok(sqlx::query(sqlite_queries::QUERY_INSERT_AUDIT_LOG)
            .bind(entry.tenant_id)
            .bind(entry.level.to_string())
            .bind(&entry.message)
            .bind(entry.metadata.to_string())
            .bind(entry.created_at)
            .execute(&self.db_pool)
            .await?
            .last_insert_rowid())
    }
}
