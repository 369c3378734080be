mod app;
mod client;
mod config;
mod display;
mod error;
mod logging;
mod query;
mod save;
mod session;
mod ui;

use crate::error::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load()?;
    logging::init(&config)?;
    tracing::info!("receipt console starting against {}", config.base_url);

    let mut app = app::App::new(config)?;
    let result = app.run().await;
    if let Err(err) = &result {
        tracing::error!("console exited with error: {err}");
    }
    result
}
