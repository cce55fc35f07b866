mod bot;

use crate::bot::run_bot;
use common::helper::tracing::init_default_tracing;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    // Load env variables from '.env' file
    dotenv::dotenv().ok();
    // Log level is taken from 'BRIDGE_LOG', "info" by default
    init_default_tracing();
    run_bot().await
}
