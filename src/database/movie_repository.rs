use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use crate::models::{MovieData, MovieRecord, MovieSummary, UpdateTarget};

/// 电影存储接口
///
/// 以 TMDB ID 作为业务键做 upsert，没有删除操作。
#[async_trait]
pub trait MovieRepository: Send + Sync {
    /// 按本地行 ID 读取
    async fn get_movie(&self, id: i64) -> Result<Option<MovieRecord>>;
    /// 按 TMDB ID 读取
    async fn get_movie_by_tmdb_id(&self, tmdb_id: i64) -> Result<Option<MovieRecord>>;
    /// 按 TMDB ID upsert，返回本地行 ID；插入时 updated_at 保持 NULL
    async fn upsert_movie(&self, data: &MovieData) -> Result<i64>;
    /// 刷新已有记录并写入 updated_at
    async fn refresh_movie(&self, db_id: i64, data: &MovieData) -> Result<()>;
    /// 按创建时间倒序列出最近的记录
    async fn list_recent(&self, limit: i64) -> Result<Vec<MovieSummary>>;
    /// 标题模糊搜索
    async fn search_by_title(&self, query: &str) -> Result<Vec<MovieSummary>>;
    /// 更新管理器遍历用的最小字段集
    async fn update_targets(&self) -> Result<Vec<UpdateTarget>>;
    /// 库内电影总数
    async fn movie_count(&self) -> Result<i64>;
    /// 所有 (tmdb_id, poster_path)，供海报清理工具比对
    async fn poster_paths(&self) -> Result<Vec<(i64, Option<String>)>>;
}

const SUMMARY_COLUMNS: &str = "id, tmdb_id, title, year, director, genres, created_at";

/// Postgres 仓库实现
#[derive(Clone)]
pub struct PgMovieRepository {
    pool: PgPool,
}

impl PgMovieRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MovieRepository for PgMovieRepository {
    async fn get_movie(&self, id: i64) -> Result<Option<MovieRecord>> {
        let movie = sqlx::query_as::<_, MovieRecord>("SELECT * FROM movies WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load movie")?;

        Ok(movie)
    }

    async fn get_movie_by_tmdb_id(&self, tmdb_id: i64) -> Result<Option<MovieRecord>> {
        let movie = sqlx::query_as::<_, MovieRecord>("SELECT * FROM movies WHERE tmdb_id = $1")
            .bind(tmdb_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load movie by tmdb_id")?;

        Ok(movie)
    }

    async fn upsert_movie(&self, data: &MovieData) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO movies
                (tmdb_id, title, original_title, year, genres, cast_data,
                 director, trailer_id, poster_path, streaming_providers)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (tmdb_id) DO UPDATE SET
                title = EXCLUDED.title,
                original_title = EXCLUDED.original_title,
                year = EXCLUDED.year,
                genres = EXCLUDED.genres,
                cast_data = EXCLUDED.cast_data,
                director = EXCLUDED.director,
                trailer_id = EXCLUDED.trailer_id,
                poster_path = EXCLUDED.poster_path,
                streaming_providers = EXCLUDED.streaming_providers
            RETURNING id
            "#,
        )
        .bind(data.tmdb_id)
        .bind(&data.title)
        .bind(&data.original_title)
        .bind(&data.year)
        .bind(Json(&data.genres))
        .bind(Json(&data.cast_data))
        .bind(&data.director)
        .bind(&data.trailer_id)
        .bind(&data.poster_path)
        .bind(Json(&data.streaming_providers))
        .fetch_one(&self.pool)
        .await
        .context("Failed to upsert movie")?;

        Ok(row.get::<i64, _>("id"))
    }

    async fn refresh_movie(&self, db_id: i64, data: &MovieData) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE movies SET
                title = $1,
                original_title = $2,
                year = $3,
                genres = $4,
                cast_data = $5,
                director = $6,
                trailer_id = $7,
                poster_path = $8,
                streaming_providers = $9,
                updated_at = now()
            WHERE id = $10
            "#,
        )
        .bind(&data.title)
        .bind(&data.original_title)
        .bind(&data.year)
        .bind(Json(&data.genres))
        .bind(Json(&data.cast_data))
        .bind(&data.director)
        .bind(&data.trailer_id)
        .bind(&data.poster_path)
        .bind(Json(&data.streaming_providers))
        .bind(db_id)
        .execute(&self.pool)
        .await
        .context("Failed to refresh movie")?;

        Ok(())
    }

    async fn list_recent(&self, limit: i64) -> Result<Vec<MovieSummary>> {
        let movies = sqlx::query_as::<_, MovieSummary>(&format!(
            "SELECT {} FROM movies ORDER BY created_at DESC LIMIT $1",
            SUMMARY_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list movies")?;

        Ok(movies)
    }

    async fn search_by_title(&self, query: &str) -> Result<Vec<MovieSummary>> {
        let movies = sqlx::query_as::<_, MovieSummary>(&format!(
            "SELECT {} FROM movies WHERE title ILIKE '%' || $1 || '%' ORDER BY created_at DESC",
            SUMMARY_COLUMNS
        ))
        .bind(query)
        .fetch_all(&self.pool)
        .await
        .context("Failed to search movies")?;

        Ok(movies)
    }

    async fn update_targets(&self) -> Result<Vec<UpdateTarget>> {
        let targets = sqlx::query_as::<_, UpdateTarget>(
            "SELECT id, tmdb_id, title, updated_at FROM movies ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load update targets")?;

        Ok(targets)
    }

    async fn movie_count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM movies")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count movies")?;

        Ok(row.get::<i64, _>("count"))
    }

    async fn poster_paths(&self) -> Result<Vec<(i64, Option<String>)>> {
        let rows = sqlx::query("SELECT tmdb_id, poster_path FROM movies")
            .fetch_all(&self.pool)
            .await
            .context("Failed to load poster paths")?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get::<i64, _>("tmdb_id"), row.get("poster_path")))
            .collect())
    }
}
