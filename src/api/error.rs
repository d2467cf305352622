use crate::application::lending::LendingError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::types::ErrorResponse;

/// API層のエラー型
///
/// 貸出サービスのエラーをラップし、HTTPレスポンスへのマッピングを提供する。
#[derive(Debug)]
pub struct ApiError(LendingError);

impl From<LendingError> for ApiError {
    fn from(err: LendingError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.0.to_string();
        let (status, error_type, message) = match self.0 {
            // 400 Bad Request - 入力値が不正
            LendingError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message),

            // 404 Not Found - 自然キーに該当するものがない
            LendingError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND", message),

            // 409 Conflict - 自然キーの重複
            LendingError::DuplicateKey { .. } => (StatusCode::CONFLICT, "DUPLICATE_KEY", message),

            // 422 Unprocessable Entity - ビジネスルール違反
            LendingError::AlreadyOnLoan(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "ALREADY_ON_LOAN", message)
            }
            LendingError::LoanLimitExceeded { .. } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "LOAN_LIMIT_EXCEEDED",
                message,
            ),
            LendingError::NotOnLoan(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "NOT_ON_LOAN", message)
            }

            // 500 Internal Server Error - 不整合・システム障害
            // 内部エラーの詳細はログに記録し、クライアントには一般的なメッセージのみを返す
            LendingError::InconsistentState(ref detail) => {
                tracing::error!("Inconsistent state: {}", detail);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INCONSISTENT_STATE",
                    "Lending records are inconsistent".to_string(),
                )
            }
            LendingError::Gateway(ref e) => {
                tracing::error!("Gateway error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "GATEWAY_ERROR",
                    "Failed to access storage".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse::new(error_type, message));
        (status, body).into_response()
    }
}
