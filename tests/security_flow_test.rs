// 安全链路集成测试：真实路由 + 安全门，不依赖数据库和外网
//
// 数据库用懒连接池（不会真的建连），TMDB 网关不配 key，
// 因此导入请求会以 502 结束，但仍会先经过安全门并消耗限流配额。

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::postgres::PgPoolOptions;
use tempfile::TempDir;
use tower::ServiceExt;

use movie_info_backend::api::{self, AdminAuth, AppState};
use movie_info_backend::database::Database;
use movie_info_backend::external::TmdbGateway;
use movie_info_backend::security::SecurityState;
use movie_info_backend::services::{MovieImporter, PosterCache, UpdateManager};

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

async fn build_state(temp_dir: &TempDir) -> AppState {
    // 懒连接：只有真正执行查询时才会尝试建连
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://postgres@127.0.0.1:1/test")
        .expect("lazy pool");
    let database = Database::from_pool(pool);

    let gateway = TmdbGateway::new(None, "TH".to_string());
    let posters = Arc::new(
        PosterCache::new(temp_dir.path().to_path_buf())
            .await
            .expect("poster cache"),
    );
    let security = Arc::new(SecurityState::new());
    let admin = Arc::new(AdminAuth::new("admin".to_string(), "secret".to_string()));
    let importer = Arc::new(MovieImporter::new(
        gateway.clone(),
        database.repository().clone(),
        posters.clone(),
    ));
    let update_manager = Arc::new(UpdateManager::new(
        gateway.clone(),
        database.repository().clone(),
        posters.clone(),
    ));

    AppState {
        database,
        gateway,
        posters,
        security,
        admin,
        importer,
        update_manager,
    }
}

fn get_request(uri: &str, ip: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-forwarded-for", ip)
        .header(header::USER_AGENT, BROWSER_UA)
        .body(Body::empty())
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_eleventh_rapid_import_is_rate_limited() {
    let temp_dir = TempDir::new().unwrap();
    let state = build_state(&temp_dir).await;
    let app: Router = api::build_router(state);

    // 前 10 次通过限流（导入本身因没有 TMDB key 而失败，但这不计入信誉）
    for i in 0..10 {
        let response = app
            .clone()
            .oneshot(get_request("/api/import/550", "203.0.113.9"))
            .await
            .unwrap();
        assert_eq!(
            response.status(),
            StatusCode::BAD_GATEWAY,
            "call {} should pass the gate and fail upstream",
            i + 1
        );
    }

    // 第 11 次触发每分钟上限
    let response = app
        .clone()
        .oneshot(get_request("/api/import/550", "203.0.113.9"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "60");

    let body = response_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["type"], "rate_limit");
    assert_eq!(body["error"]["retry_after"], 60);

    // 其它 IP 不受影响
    let response = app
        .oneshot(get_request("/api/import/550", "203.0.113.10"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_blacklisted_ip_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let state = build_state(&temp_dir).await;
    state.security.tracker.add_to_blacklist("203.0.113.66");
    let app = api::build_router(state);

    let response = app
        .oneshot(get_request("/api/movies", "203.0.113.66"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = response_json(response).await;
    assert_eq!(body["error"]["type"], "ip_blocked");
    assert_eq!(body["error"]["message"], "IP is blacklisted");
}

#[tokio::test]
async fn test_bot_user_agent_is_rejected_and_recorded() {
    let temp_dir = TempDir::new().unwrap();
    let state = build_state(&temp_dir).await;
    let app = api::build_router(state.clone());

    let request = Request::builder()
        .uri("/api/movies")
        .header("x-forwarded-for", "203.0.113.50")
        .header(header::USER_AGENT, "curl/8.0.1")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = response_json(response).await;
    assert_eq!(body["error"]["type"], "bot_detected");

    let suspicious = state.security.tracker.suspicious_snapshot();
    assert_eq!(suspicious.len(), 1);
    assert_eq!(suspicious[0].ip, "203.0.113.50");
}

#[tokio::test]
async fn test_invalid_import_id_records_failed_attempt() {
    let temp_dir = TempDir::new().unwrap();
    let state = build_state(&temp_dir).await;
    let app = api::build_router(state.clone());

    let response = app
        .oneshot(get_request("/api/import/0", "203.0.113.77"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response_json(response).await;
    assert_eq!(body["error"]["type"], "validation_error");
    assert_eq!(state.security.tracker.failed_attempt_ip_count(), 1);
}

#[tokio::test]
async fn test_admin_routes_require_session() {
    let temp_dir = TempDir::new().unwrap();
    let state = build_state(&temp_dir).await;
    let app = api::build_router(state.clone());

    // 无会话
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/admin/security")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // 错误凭据
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/login")
                .header(
                    header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                )
                .header("x-forwarded-for", "203.0.113.88")
                .body(Body::from("username=admin&password=wrong"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(state.security.tracker.failed_attempt_ip_count(), 1);

    // 正确凭据拿到会话 cookie
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/login")
                .header(
                    header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                )
                .body(Body::from("username=admin&password=secret"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("admin_session="));

    // 带 cookie 访问受保护路由
    let session = cookie.split(';').next().unwrap().to_string();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/admin/security")
                .header(header::COOKIE, session)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_admin_blacklist_mutation_takes_effect() {
    let temp_dir = TempDir::new().unwrap();
    let state = build_state(&temp_dir).await;
    let app = api::build_router(state.clone());

    let token = state.admin.create_session();
    let cookie = format!("admin_session={}", token);

    // 拉黑一个 IP
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/api/blacklist")
                .header(header::COOKIE, &cookie)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"ip": "198.51.100.4"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // 该 IP 的公开请求立即被拒
    let response = app
        .clone()
        .oneshot(get_request("/api/movies", "198.51.100.4"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // 移除后恢复（后续失败与限流无关即可）
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/admin/api/blacklist/198.51.100.4")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(state.security.tracker.blacklist_snapshot().is_empty());
}
