//! Maps `EcommerceError` onto HTTP responses.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::EcommerceError;

impl EcommerceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::UnknownProduct(_) | Self::InsufficientStock { .. } | Self::AmountExceedsLimit { .. } | Self::Webhook(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::ProductNotFound | Self::OrderNotFound => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PaymentSetup(_) | Self::StorageError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for EcommerceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::Webhook(_) => return (status, self.to_string()).into_response(),
            Self::StorageError(e) => {
                tracing::error!(error = %e, "storage failure");
                "Internal server error".to_string()
            }
            Self::PaymentSetup(_) => "Payment setup failed. The order was saved and is awaiting payment.".to_string(),
            _ => self.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<JsonRejection> for EcommerceError {
    fn from(rejection: JsonRejection) -> Self { Self::Validation(rejection.body_text()) }
}
