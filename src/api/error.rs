use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// 统一的API错误类型
#[derive(Debug)]
pub enum ApiError {
    /// 数据库错误
    Database(sqlx::Error),
    /// 未找到资源
    NotFound(String),
    /// 验证错误
    Validation(String),
    /// 权限错误
    Unauthorized(String),
    /// 禁止访问（IP 被拒）
    Forbidden(String),
    /// 机器流量被拒
    BotDetected(String),
    /// 冲突错误（如重复创建）
    Conflict(String),
    /// 触发限流
    RateLimited { reason: String, retry_after: u64 },
    /// 外部服务错误
    ExternalService(String),
    /// 内部服务器错误
    Internal(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Database(e) => write!(f, "Database error: {}", e),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Validation(msg) => write!(f, "Validation error: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::BotDetected(msg) => write!(f, "Bot detected: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::RateLimited { reason, .. } => write!(f, "Rate limited: {}", reason),
            ApiError::ExternalService(msg) => write!(f, "External service error: {}", msg),
            ApiError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

/// 从sqlx::Error转换
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            _ => ApiError::Database(err),
        }
    }
}

/// 从anyhow::Error转换
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

/// 导入错误按来源映射：拉取失败归上游，落库失败归内部
impl From<crate::services::importer::ImportError> for ApiError {
    fn from(err: crate::services::importer::ImportError) -> Self {
        use crate::services::importer::ImportError;
        match err {
            ImportError::Fetch(e) => {
                ApiError::ExternalService(format!("Failed to fetch data from TMDB: {}", e))
            }
            ImportError::Store(e) => {
                tracing::error!("Failed to save movie: {}", e);
                ApiError::Internal("Failed to save movie to database".to_string())
            }
        }
    }
}

/// 实现IntoResponse，将错误转换为HTTP响应
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            // 限流响应带 Retry-After 头和机器可读的重试秒数
            ApiError::RateLimited {
                ref reason,
                retry_after,
            } => {
                let body = Json(json!({
                    "success": false,
                    "error": {
                        "type": "rate_limit",
                        "message": reason,
                        "retry_after": retry_after,
                    }
                }));
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(header::RETRY_AFTER, retry_after.to_string())],
                    body,
                )
                    .into_response();
            }
            ApiError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "An internal database error occurred".to_string(),
                )
            }
            ApiError::NotFound(ref msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),
            ApiError::Validation(ref msg) => {
                (StatusCode::BAD_REQUEST, "validation_error", msg.clone())
            }
            ApiError::Unauthorized(ref msg) => {
                (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone())
            }
            ApiError::Forbidden(ref msg) => (StatusCode::FORBIDDEN, "ip_blocked", msg.clone()),
            ApiError::BotDetected(ref msg) => {
                (StatusCode::FORBIDDEN, "bot_detected", msg.clone())
            }
            ApiError::Conflict(ref msg) => (StatusCode::CONFLICT, "conflict", msg.clone()),
            ApiError::ExternalService(ref msg) => {
                tracing::error!("External service error: {}", msg);
                (StatusCode::BAD_GATEWAY, "external_service_error", msg.clone())
            }
            ApiError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "error": {
                "type": error_type,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result类型别名
pub type ApiResult<T> = Result<T, ApiError>;
