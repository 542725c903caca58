use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::database::{MovieRepository, PgMovieRepository};
use crate::external::TmdbGateway;
use crate::models::MovieData;
use crate::services::poster_cache::PosterCache;

/// 导入失败的两类来源，上层据此映射成不同的 HTTP 状态
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Failed to fetch data from TMDB: {0}")]
    Fetch(anyhow::Error),

    #[error("Failed to save movie to database: {0}")]
    Store(anyhow::Error),
}

/// 一次成功导入的结果
#[derive(Debug, Serialize)]
pub struct ImportOutcome {
    pub movie_id: i64,
    pub message: String,
    pub data: MovieData,
}

/// 导入编排：网关拉取 -> 提取 -> upsert -> 海报落盘
///
/// 同一 TMDB ID 重复导入会覆盖已有记录的字段而不产生新行。
pub struct MovieImporter {
    gateway: TmdbGateway,
    repository: PgMovieRepository,
    posters: Arc<PosterCache>,
}

impl MovieImporter {
    pub fn new(
        gateway: TmdbGateway,
        repository: PgMovieRepository,
        posters: Arc<PosterCache>,
    ) -> Self {
        Self {
            gateway,
            repository,
            posters,
        }
    }

    /// 按 TMDB ID 导入一部电影
    pub async fn import(&self, tmdb_id: i64) -> Result<ImportOutcome, ImportError> {
        let data = self
            .gateway
            .fetch_movie(tmdb_id)
            .await
            .map_err(ImportError::Fetch)?;

        let movie_id = self
            .repository
            .upsert_movie(&data)
            .await
            .map_err(ImportError::Store)?;

        // 海报解析是尽力而为的，失败只会退回直链
        if let Some(poster_path) = &data.poster_path {
            self.posters.resolve_poster(poster_path, tmdb_id).await;
        }

        tracing::info!("Imported movie: {} (tmdb_id {})", data.title, tmdb_id);

        Ok(ImportOutcome {
            movie_id,
            message: format!("Successfully imported: {}", data.title),
            data,
        })
    }
}
