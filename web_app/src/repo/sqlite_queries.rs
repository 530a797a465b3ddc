pub const QUERY_GET_INTEGRATION_TOKEN_BY_PAGE_ID: &str = r#"
SELECT
    id,tenant_id,platform,page_id,access_token,display_name,created_at
FROM integration_token
WHERE platform=$1 AND page_id=$2;
"#;

pub const QUERY_GET_TENANT_BY_ID: &str = r#"
SELECT
    id,email,business_name,subscription_status,created_at,updated_at
FROM tenant
WHERE id=$1;
"#;

pub const QUERY_GET_AUTOMATION_SETTINGS: &str = r#"
SELECT
    tenant_id,
    auto_reply_enabled,
    ai_enabled,
    system_prompt,
    greeting_message,
    comment_to_dm_enabled,
    updated_at
FROM automation_settings
WHERE tenant_id=$1;
"#;

pub const QUERY_INSERT_AUDIT_LOG: &str = r#"
INSERT INTO audit_log(
    tenant_id,level,message,metadata,created_at
) VALUES($1,$2,$3,$4,$5);
"#;
