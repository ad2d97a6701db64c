//! dexcross - Moving-average crossover trading loop for DEX pairs

use anyhow::Result;

use dexcross::adapters::cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (secrets go here, not in config.toml)
    dotenvy::dotenv().ok();

    let app = cli::init();
    cli::execute(app).await
}
