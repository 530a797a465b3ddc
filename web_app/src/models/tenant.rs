use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq, Display, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[display("active")]
    Active,
    #[display("trialing")]
    Trialing,
    #[display("past_due")]
    PastDue,
    #[display("canceled")]
    Canceled,
    #[default]
    #[display("inactive")]
    Inactive,
}

/// Billing customer owning connected pages
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tenant {
    pub id: i64,
    pub email: String,
    pub business_name: String,
    pub subscription_status: SubscriptionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// Billing gate: only active subscriptions spend AI and platform calls
    pub fn can_receive_replies(&self) -> bool {
        self.subscription_status == SubscriptionStatus::Active
    }
}
