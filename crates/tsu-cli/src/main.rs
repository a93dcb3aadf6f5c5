//! trust-store-updater - reconcile root certificates into trust stores

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    tsu_cli::run().await
}
