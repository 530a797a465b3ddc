use clap::{Args, Parser, Subcommand};

use crate::{config, utils};

#[derive(Args, Debug, Clone)]
pub struct RunMigrationsArgs {
    /// Template under migrations/, e.g. `init.sql`
    #[arg(short, long)]
    file: String,
}

#[derive(Args, Debug, Clone)]
pub struct ConnectPageArgs {
    #[arg(long)]
    pub tenant_id: i64,
    /// facebook, instagram, whatsapp or web
    #[arg(long)]
    pub platform: String,
    /// Page id, Instagram account id, WhatsApp phone number id or form id
    #[arg(long)]
    pub page_id: String,
    #[arg(long, default_value = "")]
    pub access_token: String,
    #[arg(long)]
    pub display_name: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DisconnectPageArgs {
    #[arg(long)]
    pub platform: String,
    #[arg(long)]
    pub page_id: String,
}

#[derive(Args, Debug, Clone)]
pub struct AuditLogsArgs {
    /// Only entries of this tenant
    #[arg(long)]
    pub tenant_id: Option<i64>,
    #[arg(short, long, default_value_t = 50)]
    pub limit: i64,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Action {
    RunMigrations(RunMigrationsArgs),
    /// Stores the token of a connected page, replacing any previous one
    ConnectPage(ConnectPageArgs),
    DisconnectPage(DisconnectPageArgs),
    /// Prints recent audit entries as json lines
    AuditLogs(AuditLogsArgs),
}

/// Operations tooling for the social reply database
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct AppArgs {
    #[command(subcommand)]
    pub action: Action,
}

impl AppArgs {
    pub async fn run(&self) -> anyhow::Result<()> {
        let app_config = config::app_config()?;
        let db_pool = utils::setup_sqlite_db_pool(app_config).await?;

        match &self.action {
            Action::RunMigrations(RunMigrationsArgs { file }) => {
                utils::run_migrations(&db_pool, file).await
            }
            Action::ConnectPage(args) => {
                let id = utils::connect_page(&db_pool, args).await?;
                println!("integration token {id} stored for {} {}", args.platform, args.page_id);
                Ok(())
            }
            Action::DisconnectPage(DisconnectPageArgs { platform, page_id }) => {
                let removed = utils::disconnect_page(&db_pool, platform, page_id).await?;
                if removed == 0 {
                    anyhow::bail!("no integration found for {platform} {page_id}");
                }
                println!("{platform} {page_id} disconnected");
                Ok(())
            }
            Action::AuditLogs(AuditLogsArgs { tenant_id, limit }) => {
                for line in utils::recent_audit_logs(&db_pool, *tenant_id, *limit).await? {
                    println!("{line}");
                }
                Ok(())
            }
        }
    }
}
