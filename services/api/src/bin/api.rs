//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, LlmGenerationAdapter},
    config::Config,
    error::ApiError,
    sweeper::run_cache_sweeper,
    web::{self, rest::ApiDoc, state::AppState},
};
use async_openai::{config::OpenAIConfig, Client};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use axum::Router;
use readwithme_core::TimeoutGenerator;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize the Generation Adapter ---
    let api_key = config.generation_api_key.as_ref().ok_or_else(|| {
        ApiError::Internal("GENERATION_API_KEY (or GEMINI_API_KEY) is required".to_string())
    })?;
    let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
    if let Some(base) = &config.generation_api_base {
        openai_config = openai_config.with_api_base(base);
    }
    let generation_adapter = LlmGenerationAdapter::new(
        Client::with_config(openai_config),
        config.generation_model.clone(),
    )
    .map_err(|e| ApiError::Internal(format!("Invalid citation pattern: {}", e)))?;
    let generator = Arc::new(TimeoutGenerator::new(
        Arc::new(generation_adapter),
        config.generation_timeout,
    ));
    info!(
        "Generation model {} (timeout {:?}).",
        config.generation_model, config.generation_timeout
    );

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState::new(db_adapter, generator, config.clone()));

    // --- 5. Start the Cache Sweeper ---
    let shutdown_token = CancellationToken::new();
    let sweeper = config.cache_sweep_interval.map(|interval| {
        tokio::spawn(run_cache_sweeper(
            app_state.cache.clone(),
            interval,
            shutdown_token.clone(),
        ))
    });

    // --- 6. Create the Web Router ---
    let allowed_origin = config
        .cors_allowed_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid CORS_ALLOWED_ORIGIN: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            ACCEPT,
            HeaderName::from_static(web::middleware::USER_ID_HEADER),
        ]);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(web::router(app_state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    let server_token = shutdown_token.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received.");
            server_token.cancel();
        })
        .await?;

    shutdown_token.cancel();
    if let Some(handle) = sweeper {
        handle
            .await
            .map_err(|e| ApiError::Internal(format!("Cache sweeper panicked: {}", e)))?;
    }
    info!("Server stopped.");
    Ok(())
}
