use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::database::Database;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub store: StoreHealth,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StoreHealth {
    pub status: String,
    pub backend: String,
    pub response_time_ms: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub start_time: DateTime<Utc>,
}

/// HTTP health endpoints.
pub struct HealthService {
    pub router: Router,
}

impl HealthService {
    /// Health service probing `db`.
    pub fn new(db: Arc<Database>) -> Self {
        let state = AppState {
            db,
            start_time: Utc::now(),
        };

        let router = Router::new()
            .route("/health", get(health_check))
            .route("/health/ready", get(readiness_check))
            .route("/health/live", get(liveness_check))
            .layer(TraceLayer::new_for_http())
            .with_state(state);

        Self { router }
    }
}

async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, StatusCode> {
    let start = std::time::Instant::now();

    let store_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(e) => {
            tracing::error!("Health probe failed: {}", e);
            "unhealthy"
        }
    };

    let response_time_ms = start.elapsed().as_millis() as u64;
    let uptime = Utc::now()
        .signed_duration_since(state.start_time)
        .num_seconds()
        .max(0) as u64;

    let health_response = HealthResponse {
        status: store_status.to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: StoreHealth {
            status: store_status.to_string(),
            backend: state.db.backend().to_string(),
            response_time_ms,
        },
        uptime_seconds: uptime,
    };

    if store_status == "healthy" {
        Ok(Json(health_response))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

async fn readiness_check(State(state): State<AppState>) -> Result<Json<&'static str>, StatusCode> {
    match state.db.ping().await {
        Ok(_) => Ok(Json("ready")),
        Err(_) => Err(StatusCode::SERVICE_UNAVAILABLE),
    }
}

async fn liveness_check() -> Json<&'static str> {
    Json("alive")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::open_store;
    use axum_test::TestServer;
    use tempfile::TempDir;

    async fn create_test_health_service() -> (HealthService, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_url = format!("sqlite://{}", temp_dir.path().join("test.db").display());

        let store = open_store(&db_url).await.expect("Failed to open test store");
        (HealthService::new(Arc::new(Database::new(store))), temp_dir)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (health_service, _temp_dir) = create_test_health_service().await;
        let server = TestServer::new(health_service.router).expect("Failed to create test server");

        let response = server.get("/health").await;

        assert_eq!(response.status_code(), StatusCode::OK);

        let health_response: HealthResponse = response.json();
        assert_eq!(health_response.status, "healthy");
        assert_eq!(health_response.store.backend, "sqlite");
        assert_eq!(health_response.version, env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_readiness_endpoint() {
        let (health_service, _temp_dir) = create_test_health_service().await;
        let server = TestServer::new(health_service.router).expect("Failed to create test server");

        let response = server.get("/health/ready").await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let ready_response: String = response.json();
        assert_eq!(ready_response, "ready");
    }

    #[tokio::test]
    async fn test_liveness_endpoint() {
        let (health_service, _temp_dir) = create_test_health_service().await;
        let server = TestServer::new(health_service.router).expect("Failed to create test server");

        let response = server.get("/health/live").await;

        assert_eq!(response.status_code(), StatusCode::OK);
        let alive_response: String = response.json();
        assert_eq!(alive_response, "alive");
    }
}
