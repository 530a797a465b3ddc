//! Operations CLI: migrations, page connections and audit log inspection.
//!
//! Reads `ENV`, `DB_HOST` and `DB_PASS_ENCRYPT` like the web app.

pub mod action;
pub mod config;
pub mod utils;

use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = action::AppArgs::parse();

    args.run().await
}
