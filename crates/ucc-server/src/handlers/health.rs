//! `GET /health` — basic liveness, mirroring `sem_os_server::handlers::health`.

use serde_json::{json, Value};

pub async fn health() -> axum::Json<Value> {
    axum::Json(json!({"status": "ok"}))
}
