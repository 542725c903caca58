use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::RwLock;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Path, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{AppendHeaders, IntoResponse, Response},
    Form, Json,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use super::error::{ApiError, ApiResult};
use super::guard::client_ip;
use super::response::{success, success_message};
use super::AppState;
use crate::services::update_manager::DEFAULT_THRESHOLD_DAYS;

/// 管理会话的 cookie 名
pub const SESSION_COOKIE: &str = "admin_session";

/// 管理面板凭据与会话集合
///
/// 会话 token 只存在于进程内，重启后需要重新登录。
pub struct AdminAuth {
    username: String,
    password: String,
    sessions: RwLock<HashSet<String>>,
}

impl AdminAuth {
    /// 从环境变量读取凭据（ADMIN_USERNAME / ADMIN_PASSWORD）
    pub fn from_env() -> Self {
        let username = std::env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());
        let password = std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string());
        Self::new(username, password)
    }

    pub fn new(username: String, password: String) -> Self {
        Self {
            username,
            password,
            sessions: RwLock::new(HashSet::new()),
        }
    }

    pub fn verify(&self, username: &str, password: &str) -> bool {
        username == self.username && password == self.password
    }

    /// 登录成功后签发新的会话 token
    pub fn create_session(&self) -> String {
        let token = Uuid::new_v4().to_string();
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.insert(token.clone());
        }
        token
    }

    pub fn is_valid_session(&self, token: &str) -> bool {
        self.sessions
            .read()
            .map(|sessions| sessions.contains(token))
            .unwrap_or(false)
    }

    pub fn remove_session(&self, token: &str) {
        if let Ok(mut sessions) = self.sessions.write() {
            sessions.remove(token);
        }
    }
}

/// 从 Cookie 头里取出管理会话 token
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .find_map(|cookie| {
            let mut parts = cookie.trim().splitn(2, '=');
            match (parts.next(), parts.next()) {
                (Some(name), Some(value)) if name == SESSION_COOKIE => Some(value.to_string()),
                _ => None,
            }
        })
}

/// 管理路由的会话门
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = session_token(request.headers())
        .ok_or_else(|| ApiError::Unauthorized("Admin login required".to_string()))?;

    if !state.admin.is_valid_session(&token) {
        return Err(ApiError::Unauthorized("Admin login required".to_string()));
    }

    Ok(next.run(request).await)
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// GET /admin/login
pub async fn login_info() -> impl IntoResponse {
    success(json!({
        "usage": "POST username and password to this endpoint",
    }))
}

/// POST /admin/login：校验凭据并下发会话 cookie
///
/// 失败会给请求方 IP 记一次失败尝试。
pub async fn login(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> ApiResult<Response> {
    if !state.admin.verify(&form.username, &form.password) {
        let ip = client_ip(&headers, peer.map(|info| info.0).as_ref());
        state.security.tracker.record_failed_attempt(&ip);
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    let token = state.admin.create_session();
    let cookie = format!("{}={}; HttpOnly; Path=/", SESSION_COOKIE, token);

    Ok((
        AppendHeaders([(header::SET_COOKIE, cookie)]),
        success_message("Logged in"),
    )
        .into_response())
}

/// GET /admin/logout
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        state.admin.remove_session(&token);
    }

    let expired = format!("{}=; Max-Age=0; Path=/", SESSION_COOKIE);
    (
        AppendHeaders([(header::SET_COOKIE, expired)]),
        success_message("Logged out"),
    )
        .into_response()
}

/// GET /admin：面板总览
pub async fn dashboard(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let tracker = &state.security.tracker;
    let stats = json!({
        "total_requests": state.security.limiter.tracked_ip_count(),
        "blacklisted_ips": tracker.blacklist_len(),
        "whitelisted_ips": tracker.whitelist_len(),
        "suspicious_ips": tracker.suspicious_len(),
    });

    // 最近一小时内有活动的 IP，取前 10 个
    let recent_ips: Vec<_> = state
        .security
        .limiter
        .recent_activity(Duration::from_secs(3600))
        .into_iter()
        .take(10)
        .collect();

    let update_stats = match state.update_manager.statistics().await {
        Ok(stats) => Some(stats),
        Err(e) => {
            tracing::warn!("Failed to load update statistics: {}", e);
            None
        }
    };

    Ok(success(json!({
        "stats": stats,
        "recent_ips": recent_ips,
        "update_stats": update_stats,
    })))
}

/// GET /admin/security：黑白名单与可疑 IP 列表
pub async fn security_overview(State(state): State<AppState>) -> impl IntoResponse {
    let tracker = &state.security.tracker;
    success(json!({
        "blacklisted_ips": tracker.blacklist_snapshot(),
        "whitelisted_ips": tracker.whitelist_snapshot(),
        "suspicious_ips": tracker.suspicious_snapshot(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct IpPayload {
    pub ip: Option<String>,
}

/// POST /admin/api/blacklist
pub async fn add_to_blacklist(
    State(state): State<AppState>,
    Json(payload): Json<IpPayload>,
) -> ApiResult<impl IntoResponse> {
    let ip = required_ip(payload)?;
    state.security.tracker.add_to_blacklist(&ip);
    Ok(success_message(format!("IP {} added to blacklist", ip)))
}

/// DELETE /admin/api/blacklist/{ip}
pub async fn remove_from_blacklist(
    State(state): State<AppState>,
    Path(ip): Path<String>,
) -> impl IntoResponse {
    state.security.tracker.remove_from_blacklist(&ip);
    success_message(format!("IP {} removed from blacklist", ip))
}

/// POST /admin/api/whitelist
pub async fn add_to_whitelist(
    State(state): State<AppState>,
    Json(payload): Json<IpPayload>,
) -> ApiResult<impl IntoResponse> {
    let ip = required_ip(payload)?;
    state.security.tracker.add_to_whitelist(&ip);
    Ok(success_message(format!("IP {} added to whitelist", ip)))
}

/// DELETE /admin/api/whitelist/{ip}
pub async fn remove_from_whitelist(
    State(state): State<AppState>,
    Path(ip): Path<String>,
) -> impl IntoResponse {
    state.security.tracker.remove_from_whitelist(&ip);
    success_message(format!("IP {} removed from whitelist", ip))
}

/// POST /admin/api/clear_suspicious/{ip}
pub async fn clear_suspicious(
    State(state): State<AppState>,
    Path(ip): Path<String>,
) -> impl IntoResponse {
    state.security.tracker.clear_suspicious(&ip);
    success_message(format!("Suspicious activity cleared for {}", ip))
}

/// POST /admin/api/clear_failed_attempts/{ip}
pub async fn clear_failed_attempts(
    State(state): State<AppState>,
    Path(ip): Path<String>,
) -> impl IntoResponse {
    state.security.tracker.clear_failed_attempts(&ip);
    success_message(format!("Failed attempts cleared for {}", ip))
}

/// GET /admin/api/stats：限流与安全计数
pub async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    let tracker = &state.security.tracker;

    let rate_limit_stats = state
        .security
        .limiter
        .recent_activity(Duration::from_secs(3600));

    success(json!({
        "rate_limit_stats": rate_limit_stats,
        "security_stats": {
            "blacklisted_ips": tracker.blacklist_len(),
            "whitelisted_ips": tracker.whitelist_len(),
            "suspicious_ips": tracker.suspicious_len(),
            "failed_attempts": tracker.failed_attempt_ip_count(),
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateAllPayload {
    #[serde(default)]
    pub force_update: bool,
    pub days_threshold: Option<i64>,
}

/// POST /admin/api/update/all
pub async fn update_all(
    State(state): State<AppState>,
    Json(payload): Json<UpdateAllPayload>,
) -> ApiResult<impl IntoResponse> {
    let threshold = payload.days_threshold.unwrap_or(DEFAULT_THRESHOLD_DAYS);
    let result = state
        .update_manager
        .update_all(payload.force_update, threshold)
        .await?;

    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSinglePayload {
    pub tmdb_id: Option<i64>,
}

/// POST /admin/api/update/single
pub async fn update_single(
    State(state): State<AppState>,
    Json(payload): Json<UpdateSinglePayload>,
) -> ApiResult<impl IntoResponse> {
    let tmdb_id = payload
        .tmdb_id
        .ok_or_else(|| ApiError::Validation("TMDB ID required".to_string()))?;

    let result = state.update_manager.update_by_tmdb_id(tmdb_id).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct UpdateIdsPayload {
    #[serde(default)]
    pub tmdb_ids: Vec<i64>,
}

/// POST /admin/api/update/ids
pub async fn update_by_ids(
    State(state): State<AppState>,
    Json(payload): Json<UpdateIdsPayload>,
) -> ApiResult<impl IntoResponse> {
    if payload.tmdb_ids.is_empty() {
        return Err(ApiError::Validation("TMDB IDs required".to_string()));
    }

    let result = state.update_manager.update_by_ids(&payload.tmdb_ids).await?;
    Ok(Json(result))
}

/// GET /admin/api/update/stats
pub async fn update_stats(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let stats = state.update_manager.statistics().await?;
    Ok(success(json!({ "stats": stats })))
}

fn required_ip(payload: IpPayload) -> Result<String, ApiError> {
    payload
        .ip
        .filter(|ip| !ip.trim().is_empty())
        .map(|ip| ip.trim().to_string())
        .ok_or_else(|| ApiError::Validation("IP address required".to_string()))
}
