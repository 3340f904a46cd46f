use std::sync::Arc;

use erthaloka::app::{self, AppContext};
use erthaloka::config::Config;
use erthaloka::jobs::ExpirySweeper;

#[tokio::main]
async fn main() -> erthaloka::Result<()> {
    // Local development reads .env; missing file is fine.
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;
    erthaloka::init_tracing_with_config(&config);

    let db = sea_orm::Database::connect(&config.database_url)
        .await
        .map_err(erthaloka::ApiError::from)?;
    tracing::info!("Database connected");

    let ctx = AppContext::from_database(&config, db)?;

    let sweeper = ExpirySweeper::new(Arc::clone(&ctx.billing), config.expiry_sweep_interval);
    let sweeper_handle = sweeper.spawn();

    let result = app::serve(ctx, &config).await;
    sweeper_handle.abort();
    result
}
