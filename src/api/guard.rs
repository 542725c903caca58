use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use super::error::ApiError;
use super::AppState;
use crate::security::validator;

/// 无法确定来源地址时使用的占位键
const UNKNOWN_IP: &str = "unknown";

/// 经过安全检查的请求方 IP，由中间件写入请求扩展
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

/// 解析请求方 IP：反向代理的 X-Forwarded-For 优先，退回对端地址
pub fn client_ip(headers: &HeaderMap, peer: Option<&SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_IP.to_string())
}

/// 公开路由的安全门：信誉检查 -> 机器流量检查 -> 限流
///
/// 三道检查按序短路，请求方 IP 写入扩展供 handler 记录失败尝试。
pub async fn security_guard(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let ip = client_ip(request.headers(), peer.as_ref());

    let decision = state.security.tracker.check(&ip);
    if !decision.allowed {
        tracing::warn!("Request from {} denied: {}", ip, decision.reason);
        return Err(ApiError::Forbidden(decision.reason));
    }

    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok());
    if validator::is_bot_user_agent(user_agent) {
        state
            .security
            .tracker
            .record_suspicious_activity(&ip, "bot user agent");
        return Err(ApiError::BotDetected(
            "Automated clients are not allowed".to_string(),
        ));
    }

    let rate = state.security.limiter.check(&ip);
    if !rate.allowed {
        tracing::warn!("Request from {} rate limited: {}", ip, rate.reason);
        return Err(ApiError::RateLimited {
            reason: rate.reason,
            retry_after: rate.retry_after.unwrap_or(60),
        });
    }

    request.extensions_mut().insert(ClientIp(ip));
    Ok(next.run(request).await)
}
