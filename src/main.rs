use std::error::Error;

use foodgram::{
    config::Config,
    routes::{self, Context},
};
use sqlx::postgres::PgPoolOptions;

async fn run() -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let addr = config.addr;
    let ctx = Context::new(pool, config);

    log::info!("Foodgram listening on {}", addr);
    warp::serve(routes::app(ctx)).run(addr).await;

    Ok(())
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        log::error!("Failed to start: {}", e);
        std::process::exit(1);
    }
}
