use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Cleaning Booking Service - Data Layer",
        version = "1.0.0",
        description = "Operational endpoints for the booking data layer. \n\n**Storage:** MongoDB and PostgreSQL behind automatic failover.\n\n**Health:** per-store probe results and the store currently selected for new operations.",
        contact(
            name = "Cleaning Booking Team",
            email = "support@cleaning-booking.com"
        )
    ),
    paths(
        crate::api::health::health_check,
    ),
    components(
        schemas(
            crate::api::health::HealthResponse,
            crate::api::health::StoreHealth,
        )
    ),
    tags(
        (name = "Health", description = "Store health and failover status."),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_health_route() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/health"));
    }
}
