use actix_web::{web, HttpResponse};

use super::super::database::queries::list_transfers;
use super::super::models::SyncStatus;
use super::super::AppState;

#[actix_web::get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().body("ok")
}

#[actix_web::get("/status")]
pub async fn status(state: web::Data<AppState>) -> Result<HttpResponse, actix_web::Error> {
    let upstream = state
        .watcher
        .upstream_latest()
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    Ok(HttpResponse::Ok().json(SyncStatus {
        fast: state.watcher.fast_latest(),
        slow: state.watcher.slow_latest(),
        upstream,
    }))
}

#[actix_web::get("/block/latest")]
pub async fn latest_block(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.watcher.latest_block())
}

// Blocks the caller until the fast cursor reaches the given block, or the
// poll budget runs out. Used by submitters that must not answer before their
// transaction's effects are queryable.
#[actix_web::get("/wait/{block}")]
pub async fn wait_for_block(
    path: web::Path<i64>,
    query: web::Query<std::collections::HashMap<String, String>>,
    state: web::Data<AppState>,
) -> HttpResponse {
    let block = path.into_inner();
    // Default 8 polls (~2s), capped at 40 (~10s) to keep the wait bounded
    let tries = query
        .get("tries")
        .and_then(|t| t.parse::<u32>().ok())
        .unwrap_or(8)
        .clamp(1, 40);

    let found = state.watcher.wait_for(block, tries).await;
    HttpResponse::Ok().json(serde_json::json!({ "block": block, "found": found }))
}

#[actix_web::get("/transfers")]
pub async fn transfers(
    query: web::Query<std::collections::HashMap<String, String>>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, actix_web::Error> {
    let addr = query.get("addr").cloned();
    let limit = query.get("limit").and_then(|l| l.parse::<i32>().ok());

    let rows = list_transfers(&state.db_pool, addr, limit)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    Ok(HttpResponse::Ok().json(rows))
}
