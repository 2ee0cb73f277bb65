//! HTTP API for the registration service.

mod form;
mod handlers;
mod middleware;
mod types;

pub use form::{RegistrationForm, IMAGE_FIELD};
pub use handlers::*;
pub use middleware::{
    logging_middleware, preflight_status_middleware, rate_limit_middleware, RateLimitState,
    RATE_LIMIT_MESSAGE,
};
pub use types::*;

use crate::service::RegistrationService;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method},
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// HTTP-level settings shared by the handlers.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Include server error details in responses (non-production)
    pub expose_error_details: bool,
    /// Directory where uploaded files are staged
    pub temp_dir: PathBuf,
    /// Omit access tokens from list results
    pub redact_list_tokens: bool,
    pub max_body_bytes: usize,
    pub cors_max_age: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            expose_error_details: true,
            temp_dir: std::env::temp_dir(),
            redact_list_tokens: false,
            max_body_bytes: 10 * 1024 * 1024,
            cors_max_age: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RegistrationService>,
    pub settings: Arc<ApiSettings>,
}

impl AppState {
    pub fn new(service: RegistrationService, settings: ApiSettings) -> Self {
        Self {
            service: Arc::new(service),
            settings: Arc::new(settings),
        }
    }
}

/// Create the API router without rate limiting.
pub fn create_router(state: AppState) -> Router {
    build_router(state, None)
}

/// Create the API router with a global rate limit on `/api` routes.
pub fn create_router_with_rate_limit(state: AppState, rate_limit: RateLimitState) -> Router {
    build_router(state, Some(rate_limit))
}

fn build_router(state: AppState, rate_limit: Option<RateLimitState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::ORIGIN,
        ])
        .max_age(state.settings.cors_max_age);

    let api = Router::new()
        .route("/registerJoinCommunity", post(handlers::register))
        .route("/getAllRegistrations", get(handlers::list_registrations))
        .route("/getRegistration/:id", get(handlers::get_registration))
        .route("/updateRegistration/:id", put(handlers::update_registration))
        .route("/deleteRegistration/:id", delete(handlers::delete_registration));

    let api = match rate_limit {
        Some(rate_limit) => api.layer(axum_middleware::from_fn_with_state(
            rate_limit,
            rate_limit_middleware,
        )),
        None => api,
    };

    Router::new()
        // Liveness (never rate limited)
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .nest("/api", api)
        .fallback(handlers::fallback)
        .layer(DefaultBodyLimit::max(state.settings.max_body_bytes))
        .layer(axum_middleware::from_fn(logging_middleware))
        .layer(cors)
        .layer(axum_middleware::from_fn(preflight_status_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
