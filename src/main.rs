use actix_web::{middleware::Logger, web, App, HttpServer};
use cleaning_booking_service::{
    api,
    config::AppConfig,
    database::{LazyStore, MongoStore, PostgresStore, Store, StoreContext, StoreError, StoreKind},
    services::DataService,
};
use dotenv::dotenv;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env().expect("Invalid configuration");
    let db_config = &config.database;

    log::info!("🚀 Starting Cleaning Booking Service...");
    log::info!(
        "📊 Primary store: {} (policy: {}, probe timeout: {}ms)",
        db_config.primary,
        db_config.failover_policy,
        db_config.probe_timeout.as_millis()
    );

    // Either store may be down at startup: client builds and schema setup
    // are retried on later calls
    MongoStore::validate_uri(&db_config.mongo.uri).expect("Invalid MongoDB URI");
    let mongo_settings = db_config.mongo.clone();
    let connect_timeout = db_config.probe_timeout;
    let mongo = LazyStore::new(StoreKind::Mongo, move || {
        let settings = mongo_settings.clone();
        async move {
            let store = MongoStore::connect(&settings, connect_timeout).await?;
            Ok::<_, StoreError>(Arc::new(store) as Arc<dyn Store>)
        }
    });

    let postgres = PostgresStore::connect(&db_config.postgres, db_config.probe_timeout)
        .expect("Invalid PostgreSQL configuration");
    let postgres = LazyStore::connected(Arc::new(postgres));

    let ctx = StoreContext::new(db_config.primary, Arc::new(mongo), Arc::new(postgres))
        .expect("Failed to build store context");
    let service = DataService::new(ctx, db_config.failover_policy, db_config.probe_timeout);

    let active = service.selector().select_active_store().await;
    log::info!("✅ Data layer ready, active store: {}", active);

    let service_data = web::Data::new(service);
    let (host, port) = (config.host.clone(), config.port);

    log::info!("🌐 Server starting on {}:{}", host, port);
    log::info!("📚 Swagger UI available at: http://{}:{}/swagger-ui/", host, port);
    log::info!("📄 OpenAPI spec at: http://{}:{}/api-docs/openapi.json", host, port);

    // Start HTTP server
    HttpServer::new(move || {
        // Generate OpenAPI specification
        let openapi = api::swagger::ApiDoc::openapi();

        App::new()
            .app_data(service_data.clone())
            .wrap(Logger::default())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
            // Health check
            .route("/health", web::get().to(api::health::health_check))
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
