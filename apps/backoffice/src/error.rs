//! # バックオフィス API エラー定義
//!
//! 管理 API 固有のエラーと、HTTP レスポンスへの変換を定義する。
//!
//! 配信トリガー API（送信・テスト送信）は歴史的経緯からレスポンス形式が
//! 独自であり、そちらのエラーマッピングは `handler::dispatch` が行う。
//! この型は CRUD エンドポイント向けに RFC 9457 Problem Details を返す。

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use reformworks_domain::DomainError;
use reformworks_infra::InfraError;
use reformworks_shared::ErrorResponse;
use thiserror::Error;

/// 管理 API で発生するエラー
#[derive(Debug, Error)]
pub enum ApiError {
    /// リソースが見つからない
    #[error("リソースが見つかりません: {0}")]
    NotFound(String),

    /// 不正なリクエスト
    #[error("不正なリクエスト: {0}")]
    BadRequest(String),

    /// 認証されていない（ゲートウェイのユーザーコンテキスト欠落）
    #[error("認証されていません: {0}")]
    Unauthorized(String),

    /// 権限不足
    #[error("権限がありません: {0}")]
    Forbidden(String),

    /// 競合（重複登録など）
    #[error("競合が発生しました: {0}")]
    Conflict(String),

    /// データベースエラー
    #[error("データベースエラー: {0}")]
    Database(#[from] InfraError),

    /// 内部エラー
    #[error("内部エラー: {0}")]
    Internal(String),
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::Validation(msg) => Self::BadRequest(msg),
            DomainError::NotFound { .. } => Self::NotFound(error.to_string()),
            DomainError::Conflict(msg) => Self::Conflict(msg),
            DomainError::Forbidden(msg) => Self::Forbidden(msg),
            DomainError::InvalidState(msg) => Self::BadRequest(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error = match &self {
            ApiError::NotFound(msg) => ErrorResponse::not_found(msg.clone()),
            ApiError::BadRequest(msg) => ErrorResponse::bad_request(msg.clone()),
            ApiError::Unauthorized(msg) => ErrorResponse::unauthorized(msg.clone()),
            ApiError::Forbidden(msg) => ErrorResponse::forbidden(msg.clone()),
            ApiError::Conflict(msg) => ErrorResponse::conflict(msg.clone()),
            ApiError::Database(e) => {
                tracing::error!(error = %e, span_trace = %e.span_trace(), "データベースエラー");
                ErrorResponse::internal_error()
            }
            ApiError::Internal(msg) => {
                tracing::error!("内部エラー: {}", msg);
                ErrorResponse::internal_error()
            }
        };

        let status =
            StatusCode::from_u16(error.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        (status, Json(error)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errorのマッピングが正しい() {
        let api: ApiError = DomainError::Validation("入力不正".to_string()).into();
        assert!(matches!(api, ApiError::BadRequest(_)));

        let api: ApiError = DomainError::NotFound {
            entity_type: "Campaign",
            id:          "xyz".to_string(),
        }
        .into();
        assert!(matches!(api, ApiError::NotFound(_)));

        let api: ApiError = DomainError::InvalidState("送信済み".to_string()).into();
        assert!(matches!(api, ApiError::BadRequest(_)));
    }

    #[test]
    fn test_into_responseのステータスコードが正しい() {
        let response = ApiError::NotFound("ない".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = ApiError::Forbidden("権限なし".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = ApiError::Internal("落ちた".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
