pub mod admin;
pub mod error;
pub mod guard;
pub mod movies;
pub mod response;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::database::Database;
use crate::external::TmdbGateway;
use crate::security::SecurityState;
use crate::services::{MovieImporter, PosterCache, UpdateManager};

pub use admin::AdminAuth;

#[derive(Clone)]
pub struct AppState {
    pub database: Database,
    pub gateway: TmdbGateway,
    pub posters: Arc<PosterCache>,
    pub security: Arc<SecurityState>,
    pub admin: Arc<AdminAuth>,
    pub importer: Arc<MovieImporter>,
    pub update_manager: Arc<UpdateManager>,
}

/// 组装全部路由
///
/// 公开路由走安全门（信誉 -> 机器流量 -> 限流），
/// 管理路由走会话门；login/logout 本身不设门。
pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/", get(movies::index))
        .route("/movies", get(movies::movie_list))
        .route("/movie/:id", get(movies::movie_detail))
        .route("/search", get(movies::search))
        .route(
            "/import",
            get(movies::import_info).post(movies::import_movie),
        )
        .route("/api/import/:id", get(movies::api_import_movie))
        .route("/api/movies", get(movies::api_movies))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            guard::security_guard,
        ));

    let admin_session = Router::new()
        .route("/admin/login", get(admin::login_info).post(admin::login))
        .route("/admin/logout", get(admin::logout));

    let admin_panel = Router::new()
        .route("/admin", get(admin::dashboard))
        .route("/admin/security", get(admin::security_overview))
        .route("/admin/api/blacklist", post(admin::add_to_blacklist))
        .route(
            "/admin/api/blacklist/:ip",
            delete(admin::remove_from_blacklist),
        )
        .route("/admin/api/whitelist", post(admin::add_to_whitelist))
        .route(
            "/admin/api/whitelist/:ip",
            delete(admin::remove_from_whitelist),
        )
        .route(
            "/admin/api/clear_suspicious/:ip",
            post(admin::clear_suspicious),
        )
        .route(
            "/admin/api/clear_failed_attempts/:ip",
            post(admin::clear_failed_attempts),
        )
        .route("/admin/api/stats", get(admin::get_stats))
        .route("/admin/api/update/all", post(admin::update_all))
        .route("/admin/api/update/single", post(admin::update_single))
        .route("/admin/api/update/ids", post(admin::update_by_ids))
        .route("/admin/api/update/stats", get(admin::update_stats))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin::require_admin,
        ));

    Router::new()
        .merge(public)
        .merge(admin_session)
        .merge(admin_panel)
        .with_state(state)
}
