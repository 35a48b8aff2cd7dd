//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DataProviderRegistry, DbAdapter, OfflineGenerationAdapter, OpenAiGenerationAdapter},
    config::Config,
    error::ApiError,
    scheduler::spawn_scheduler,
    web::{
        auth::{login_handler, logout_handler, signup_handler},
        delete_template_handler, generate_newsletter_handler, get_template_handler,
        list_newsletters_handler, list_templates_handler, require_auth,
        rest::ApiDoc,
        save_template_handler,
        state::AppState,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use newsletter_core::compose::Composer;
use newsletter_core::ports::{AuthStore, NewsletterStore, TemplateStore, TextGenerationService};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
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

    // --- 2. Connect to Database & Create Schema ---
    info!("Connecting to database...");
    let connect_options = SqliteConnectOptions::from_str(&config.database_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(pool.clone()));
    db_adapter.init_schema().await?;
    info!("Database schema ready.");

    // --- 3. Initialize Service Adapters ---
    let generator: Arc<dyn TextGenerationService> = match &config.openai_api_key {
        Some(api_key) => {
            let openai_config = OpenAIConfig::new().with_api_key(api_key);
            Arc::new(OpenAiGenerationAdapter::new(
                Client::with_config(openai_config),
                config.generation_model.clone(),
                config.generation_timeout,
            ))
        }
        None => {
            warn!("OPENAI_API_KEY not set; generating offline draft content");
            Arc::new(OfflineGenerationAdapter)
        }
    };
    let provider = Arc::new(DataProviderRegistry::new(pool.clone()));

    let templates: Arc<dyn TemplateStore> = db_adapter.clone();
    let newsletters: Arc<dyn NewsletterStore> = db_adapter.clone();
    let auth: Arc<dyn AuthStore> = db_adapter.clone();

    let composer = Arc::new(Composer::new(
        templates.clone(),
        newsletters.clone(),
        provider,
        generator,
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        templates: templates.clone(),
        newsletters: newsletters.clone(),
        auth,
        composer: composer.clone(),
        config: config.clone(),
    });

    // --- 5. Start the Scheduler ---
    if config.scheduler_enabled {
        info!(
            "Starting scheduler (interval {}s)",
            config.scheduler_interval.as_secs()
        );
        spawn_scheduler(
            templates,
            newsletters,
            composer,
            config.scheduler_interval,
        );
    }

    let cors = CorsLayer::new()
        .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 6. Create the Web Router ---
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route(
            "/templates",
            post(save_template_handler).get(list_templates_handler),
        )
        .route(
            "/templates/{id}",
            get(get_template_handler).delete(delete_template_handler),
        )
        .route("/templates/{id}/generate", post(generate_newsletter_handler))
        .route("/newsletters", get(list_newsletters_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
