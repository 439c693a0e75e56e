use actix_web::{web, App, HttpServer};
use log::info;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;

use shovelwatch::indexers::{EthIndexer, NameIndexer, TransferIndexer};
use shovelwatch::rest::routes;
use shovelwatch::{AppState, Config, ShovelUpstream, Watcher};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = Config::from_env().expect("Invalid configuration");

    // The pool size caps concurrent store work across all indexers in a layer
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(20))
        .connect(&config.db_url)
        .await
        .expect("Failed to connect to shovel database");

    let upstream = Arc::new(ShovelUpstream::new(pool.clone()));
    let mut watcher = Watcher::new(
        pool.clone(),
        upstream,
        config.start_block,
        config.batch_size,
        config.slow_lag,
    );
    // Dependency layers: transfers join against rows the name indexer wrote
    watcher.add(vec![Arc::new(NameIndexer)]);
    watcher.add(vec![Arc::new(TransferIndexer)]);
    // Trace scans are too expensive for the per-tick cadence
    watcher.slow_add(Arc::new(EthIndexer));

    let watcher = Arc::new(watcher);

    // Close the gap to the upstream tip before going live
    watcher.init().await.expect("Initial catch-up failed");
    Arc::clone(&watcher).watch(Duration::from_millis(config.tick_interval_ms));

    info!("Starting HTTP server at {}", config.bind_addr);

    let state = web::Data::new(AppState {
        watcher: Arc::clone(&watcher),
        db_pool: pool,
    });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .service(routes::health)
            .service(routes::status)
            .service(routes::latest_block)
            .service(routes::wait_for_block)
            .service(routes::transfers)
            .route("/metrics", web::get().to(shovelwatch::metrics::metrics))
    })
    .bind(&config.bind_addr)?
    .run()
    .await
}
