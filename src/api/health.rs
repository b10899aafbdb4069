use crate::database::{FailoverPolicy, StoreKind};
use crate::services::DataService;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoreHealth {
    #[schema(value_type = String, example = "mongodb")]
    pub store: StoreKind,
    pub primary: bool,
    pub healthy: bool,
}

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: i64,
    /// Store the next operation would be routed to
    #[schema(value_type = String, example = "mongodb")]
    pub active_store: StoreKind,
    #[schema(value_type = String, example = "primary-only")]
    pub failover_policy: FailoverPolicy,
    pub stores: Vec<StoreHealth>,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "At least one store is reachable", body = HealthResponse),
        (status = 503, description = "Every store is down", body = HealthResponse)
    )
)]
pub async fn health_check(data: web::Data<DataService>) -> HttpResponse {
    let selector = data.selector();
    let prober = selector.prober();
    let primary = data.context().primary();

    let (primary_ok, secondary_ok) = futures::join!(
        prober.check_health(primary),
        prober.check_health(primary.other())
    );
    let active_store = selector.choose(primary_ok, secondary_ok);

    let stores = vec![
        StoreHealth {
            store: primary,
            primary: true,
            healthy: primary_ok,
        },
        StoreHealth {
            store: primary.other(),
            primary: false,
            healthy: secondary_ok,
        },
    ];

    let status = match (primary_ok, secondary_ok) {
        (true, true) => "healthy",
        (false, false) => "unavailable",
        _ => "degraded",
    };

    let body = HealthResponse {
        status: status.to_string(),
        service: "cleaning-booking-service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().timestamp(),
        active_store,
        failover_policy: selector.policy(),
        stores,
    };

    if primary_ok || secondary_ok {
        HttpResponse::Ok().json(body)
    } else {
        log::error!("❌ Health check: no store is reachable");
        HttpResponse::ServiceUnavailable().json(body)
    }
}
