use axum::{
    extract::{Extension, Path, Query, State},
    response::IntoResponse,
    Form,
};
use serde::Deserialize;
use serde_json::json;

use super::error::{ApiError, ApiResult};
use super::guard::ClientIp;
use super::response::success;
use super::AppState;
use crate::database::MovieRepository;
use crate::security::validator;
use crate::services::poster_cache::NO_POSTER_PATH;

/// 首页展示的条数
const INDEX_LIMIT: i64 = 10;
/// 列表页展示的条数
const LIST_LIMIT: i64 = 50;

/// 首页：最近入库的电影
pub async fn index(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let movies = state
        .database
        .repository()
        .list_recent(INDEX_LIMIT)
        .await
        .map_err(|e| {
            tracing::error!("Error loading movies: {}", e);
            ApiError::Internal("Error loading movies".to_string())
        })?;

    Ok(success(json!({ "movies": movies })))
}

/// 电影列表页
pub async fn movie_list(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let movies = state
        .database
        .repository()
        .list_recent(LIST_LIMIT)
        .await
        .map_err(|e| {
            tracing::error!("Error loading movies: {}", e);
            ApiError::Internal("Error loading movies".to_string())
        })?;

    Ok(success(json!({ "movies": movies })))
}

/// 电影详情页：按本地行 ID 查询，海报与平台 logo 解析为可用 URL
pub async fn movie_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let movie = state
        .database
        .repository()
        .get_movie(id)
        .await
        .map_err(|e| {
            tracing::error!("Error loading movie {}: {}", id, e);
            ApiError::Internal("Error loading movie".to_string())
        })?
        .ok_or_else(|| ApiError::NotFound("Movie not found".to_string()))?;

    let poster_url = match movie.poster_path.as_deref() {
        Some(path) => state.posters.resolve_poster(path, movie.tmdb_id).await,
        None => NO_POSTER_PATH.to_string(),
    };
    let providers = state
        .posters
        .format_providers(&movie.streaming_providers)
        .await;

    Ok(success(json!({
        "movie": movie,
        "poster_url": poster_url,
        "providers": providers,
    })))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

/// 搜索：本库模糊匹配 + TMDB 搜索并列返回
///
/// TMDB 侧失败只降级为空结果，不影响本库部分。
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> ApiResult<impl IntoResponse> {
    let query = validator::sanitize_text(&params.q);
    if query.is_empty() {
        return Ok(success(json!({
            "query": "",
            "movies": [],
            "tmdb_results": [],
        })));
    }

    let movies = state
        .database
        .repository()
        .search_by_title(&query)
        .await
        .map_err(|e| {
            tracing::error!("Error searching movies: {}", e);
            ApiError::Internal("Error searching movies".to_string())
        })?;

    let tmdb_results = match state.gateway.search(&query).await {
        Ok(results) => results,
        Err(e) => {
            tracing::warn!("Error searching TMDB: {}", e);
            Vec::new()
        }
    };

    Ok(success(json!({
        "query": query,
        "movies": movies,
        "tmdb_results": tmdb_results,
    })))
}

/// GET /import：导入接口的使用说明
pub async fn import_info() -> impl IntoResponse {
    success(json!({
        "usage": "POST movie_id to this endpoint, or GET /api/import/{id}",
    }))
}

#[derive(Debug, Deserialize)]
pub struct ImportForm {
    #[serde(default)]
    pub movie_id: String,
}

/// POST /import：表单导入
pub async fn import_movie(
    State(state): State<AppState>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Form(form): Form<ImportForm>,
) -> ApiResult<impl IntoResponse> {
    if form.movie_id.trim().is_empty() {
        return Err(ApiError::Validation("Please enter a movie ID".to_string()));
    }

    let movie_id = validator::parse_movie_id(&form.movie_id).ok_or_else(|| {
        state.security.tracker.record_failed_attempt(&ip);
        ApiError::Validation("Invalid movie ID".to_string())
    })?;

    run_import(&state, movie_id).await
}

/// GET /api/import/{id}：API 导入
pub async fn api_import_movie(
    State(state): State<AppState>,
    Extension(ClientIp(ip)): Extension<ClientIp>,
    Path(movie_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    if !validator::is_valid_movie_id(movie_id) {
        state.security.tracker.record_failed_attempt(&ip);
        return Err(ApiError::Validation("Invalid movie ID".to_string()));
    }

    run_import(&state, movie_id).await
}

/// GET /api/movies：电影列表 API
pub async fn api_movies(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let movies = state
        .database
        .repository()
        .list_recent(LIST_LIMIT)
        .await
        .map_err(|e| {
            tracing::error!("Error listing movies: {}", e);
            ApiError::Internal("Error listing movies".to_string())
        })?;

    Ok(success(json!({ "movies": movies })))
}

/// 导入共用路径
///
/// 上游或落库失败不记失败尝试（那不是请求方的问题），
/// 只有恶意形态的输入才计入信誉。
async fn run_import(
    state: &AppState,
    movie_id: i64,
) -> ApiResult<axum::response::Response> {
    let outcome = state.importer.import(movie_id).await?;

    Ok(success(json!({
        "message": outcome.message,
        "movie_id": outcome.movie_id,
        "data": outcome.data,
    }))
    .into_response())
}
