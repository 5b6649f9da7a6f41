//! Hanashi gateway server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin hanashi-server
//! cargo run --bin hanashi-server -- --host 0.0.0.0 --port 8000 --ai-service-host localhost
//! ```

use std::sync::Arc;

use clap::Parser;
use hanashi_server::{
    app::build_server,
    config::{AppConfig, CliArgs},
};
use hanashi_shared::{logger::setup_logger, time::SystemClock};

#[tokio::main]
async fn main() {
    // .env は引数解析より前に読み込む（env フォールバックに反映させるため）
    if let Err(e) = dotenvy::dotenv()
        && !e.not_found()
    {
        eprintln!("Failed to load .env: {}", e);
    }

    let args = CliArgs::parse();
    let config = match AppConfig::try_from(args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };

    // Initialize tracing
    setup_logger(&[env!("CARGO_CRATE_NAME")], &config.log_level);

    let server = match build_server(&config, Arc::new(SystemClock)) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to initialize server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run(config.host, config.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
