//! API response types.

use registration_store::Page;
use serde::Serialize;

/// Envelope wrapping every API response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_items: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_page: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pages: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            total_items: None,
            current_page: None,
            total_pages: None,
            data: Some(data),
        }
    }

    /// Success without a payload.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            ..Self::failure(message)
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            total_items: None,
            current_page: None,
            total_pages: None,
            data: None,
        }
    }
}

impl<T> ApiResponse<Vec<T>> {
    /// Success carrying one page of items and its pagination metadata.
    pub fn page(message: impl Into<String>, page: Page<T>) -> Self {
        Self {
            success: true,
            message: message.into(),
            total_items: Some(page.total_items),
            current_page: Some(page.current_page),
            total_pages: Some(page.total_pages),
            data: Some(page.items),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub registration_count: usize,
}
