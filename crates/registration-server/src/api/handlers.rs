//! HTTP request handlers.

use super::form::RegistrationForm;
use super::types::{ApiResponse, HealthResponse};
use super::AppState;
use crate::error::{ApiError, RegistrationError};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use registration_store::{PageRequest, Registration};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

/// Raw pagination query. Values are parsed leniently.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

/// Liveness text.
pub async fn root() -> &'static str {
    "Registration API is running"
}

/// Health check endpoint.
pub async fn health(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, ApiError> {
    let registration_count = state
        .service
        .store()
        .count()
        .await
        .map_err(|e| state.api_error(e.into()))?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        registration_count,
    }))
}

/// Submit a new registration with proof of payment.
pub async fn register(
    State(state): State<AppState>,
    form: RegistrationForm,
) -> Result<(StatusCode, Json<ApiResponse<Registration>>), ApiError> {
    info!(has_image = form.image.is_some(), "Registration request received");

    let registration = state
        .service
        .register(form.input, form.image)
        .await
        .map_err(|e| state.api_error(e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success("Registration successful", registration)),
    ))
}

/// Newest-first page of registrations.
pub async fn list_registrations(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<Value>>>, ApiError> {
    let request = PageRequest::from_query(query.page.as_deref(), query.limit.as_deref());

    let page = state
        .service
        .list(request)
        .await
        .map_err(|e| state.api_error(e))?;

    let redact = state.settings.redact_list_tokens;
    let page = page
        .try_map(|registration| list_item(&registration, redact))
        .map_err(|e| state.api_error(e))?;

    Ok(Json(ApiResponse::page(
        "Registrations retrieved successfully",
        page,
    )))
}

fn list_item<T: Serialize>(item: &T, redact_token: bool) -> Result<Value, RegistrationError> {
    let mut value = serde_json::to_value(item)
        .map_err(|e| RegistrationError::Internal(format!("failed to serialize list item: {e}")))?;
    if redact_token {
        if let Some(object) = value.as_object_mut() {
            object.remove("accessToken");
        }
    }
    Ok(value)
}

pub async fn get_registration(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Registration>>, ApiError> {
    let registration = state
        .service
        .get(&id)
        .await
        .map_err(|e| state.api_error(e))?;

    Ok(Json(ApiResponse::success(
        "Registration retrieved successfully",
        registration,
    )))
}

/// Partial update; a new image replaces the stored one.
pub async fn update_registration(
    State(state): State<AppState>,
    Path(id): Path<String>,
    form: RegistrationForm,
) -> Result<Json<ApiResponse<Registration>>, ApiError> {
    info!(id = %id, has_image = form.image.is_some(), "Update request received");

    let registration = state
        .service
        .update(&id, form.input, form.image)
        .await
        .map_err(|e| state.api_error(e))?;

    Ok(Json(ApiResponse::success(
        "Registration updated successfully",
        registration,
    )))
}

pub async fn delete_registration(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state
        .service
        .delete(&id)
        .await
        .map_err(|e| state.api_error(e))?;

    Ok(Json(ApiResponse::ok("Registration deleted successfully")))
}

/// JSON 404 for unknown routes.
pub async fn fallback() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "message": "Route not found" })),
    )
}

impl AppState {
    fn api_error(&self, error: RegistrationError) -> ApiError {
        ApiError::from_error(error, self.settings.expose_error_details)
    }
}
