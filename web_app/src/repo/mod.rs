pub mod sqlite;
pub mod sqlite_queries;

use crate::models;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AppRepo {
    /// Token of a connected page, `None` when the page was never connected or got disconnected
    async fn get_integration_token_by_page_id(
        &self,
        platform: models::integration::Platform,
        page_id: &str,
    ) -> anyhow::Result<Option<models::integration::IntegrationToken>>;

    async fn get_tenant_by_id(
        &self,
        tenant_id: i64,
    ) -> anyhow::Result<Option<models::tenant::Tenant>>;

    async fn get_automation_settings(
        &self,
        tenant_id: i64,
    ) -> anyhow::Result<Option<models::automation::AutomationSettings>>;

    async fn insert_audit_log(&self, entry: &models::audit::AuditLogEntry) -> anyhow::Result<i64>;
}

pub type ImplAppRepo = Box<dyn AppRepo>;
