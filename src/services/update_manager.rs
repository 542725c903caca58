use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::database::{MovieRepository, PgMovieRepository};
use crate::external::TmdbGateway;
use crate::models::UpdateTarget;
use crate::services::poster_cache::PosterCache;

/// 默认的过期阈值（天）
pub const DEFAULT_THRESHOLD_DAYS: i64 = 7;

/// 相邻两次 TMDB 调用之间的固定间隔
const UPDATE_DELAY: Duration = Duration::from_millis(500);

/// 判断记录是否需要刷新
///
/// 从未刷新过（updated_at 为 NULL）的记录总是需要。
pub fn needs_update(updated_at: Option<DateTime<Utc>>, threshold_days: i64) -> bool {
    needs_update_at(updated_at, threshold_days, Utc::now())
}

pub fn needs_update_at(
    updated_at: Option<DateTime<Utc>>,
    threshold_days: i64,
    now: DateTime<Utc>,
) -> bool {
    match updated_at {
        None => true,
        Some(ts) => (now - ts).num_days() >= threshold_days,
    }
}

/// 批量刷新的汇总计数
#[derive(Debug, Default, Serialize)]
pub struct UpdateSummary {
    pub total: usize,
    pub updated: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// 单条记录的刷新结果
#[derive(Debug, Serialize)]
pub struct UpdateItemResult {
    pub tmdb_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub success: bool,
    pub message: String,
}

/// 一次批量刷新的完整结果
#[derive(Debug, Serialize)]
pub struct UpdateRunResult {
    pub success: bool,
    pub message: String,
    pub summary: UpdateSummary,
    pub results: Vec<UpdateItemResult>,
}

/// 库存过期统计
#[derive(Debug, Serialize)]
pub struct UpdateStatistics {
    pub total_movies: usize,
    pub needs_update: usize,
    pub recently_updated: usize,
    pub never_updated: usize,
    pub update_percentage: f64,
}

/// 更新管理器
///
/// 对过期记录按需刷新。批量操作对单条失败只记录不中断，
/// 且在相邻外部调用之间固定休眠，避免触发 TMDB 的限流。
pub struct UpdateManager {
    gateway: TmdbGateway,
    repository: PgMovieRepository,
    posters: Arc<PosterCache>,
}

impl UpdateManager {
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

    /// 刷新单条记录：重新拉取、写库并更新 updated_at、重下海报
    async fn refresh_one(&self, db_id: i64, tmdb_id: i64) -> Result<String> {
        let data = self
            .gateway
            .fetch_movie(tmdb_id)
            .await
            .context("Failed to fetch data from TMDB")?;

        self.repository
            .refresh_movie(db_id, &data)
            .await
            .context("Failed to update database")?;

        if let Some(poster_path) = &data.poster_path {
            self.posters.resolve_poster(poster_path, tmdb_id).await;
        }

        Ok(data.title)
    }

    /// 刷新单条记录，把错误折叠成结果对象
    pub async fn update_single(&self, db_id: i64, tmdb_id: i64) -> UpdateItemResult {
        tracing::info!("Updating movie tmdb_id: {}", tmdb_id);

        match self.refresh_one(db_id, tmdb_id).await {
            Ok(title) => UpdateItemResult {
                tmdb_id,
                title: Some(title.clone()),
                success: true,
                message: format!("Successfully updated: {}", title),
            },
            Err(e) => UpdateItemResult {
                tmdb_id,
                title: None,
                success: false,
                message: format!("Error updating movie: {}", e),
            },
        }
    }

    /// 按 TMDB ID 查找本地记录后刷新
    pub async fn update_by_tmdb_id(&self, tmdb_id: i64) -> Result<UpdateItemResult> {
        match self.repository.get_movie_by_tmdb_id(tmdb_id).await? {
            Some(movie) => Ok(self.update_single(movie.id, tmdb_id).await),
            None => Ok(UpdateItemResult {
                tmdb_id,
                title: None,
                success: false,
                message: "Movie not found in database".to_string(),
            }),
        }
    }

    /// 刷新全库中需要更新的记录
    ///
    /// `force` 跳过过期判断；单条失败不会中断整批。
    pub async fn update_all(&self, force: bool, threshold_days: i64) -> Result<UpdateRunResult> {
        let targets = self.repository.update_targets().await?;
        if targets.is_empty() {
            return Ok(UpdateRunResult {
                success: false,
                message: "No movies found in database".to_string(),
                summary: UpdateSummary::default(),
                results: Vec::new(),
            });
        }

        tracing::info!("Found {} movies in database", targets.len());

        let mut summary = UpdateSummary {
            total: targets.len(),
            ..Default::default()
        };
        let mut results = Vec::new();

        for target in &targets {
            if !force && !needs_update(target.updated_at, threshold_days) {
                tracing::debug!("Skipping {} (recently updated)", target.title);
                summary.skipped += 1;
                continue;
            }

            let result = self.update_single(target.id, target.tmdb_id).await;
            if result.success {
                summary.updated += 1;
                tracing::info!("Updated: {}", target.title);
            } else {
                summary.failed += 1;
                tracing::warn!("Failed: {} - {}", target.title, result.message);
            }
            results.push(result);

            tokio::time::sleep(UPDATE_DELAY).await;
        }

        Ok(UpdateRunResult {
            success: true,
            message: format!(
                "Update completed: {} updated, {} failed, {} skipped",
                summary.updated, summary.failed, summary.skipped
            ),
            summary,
            results,
        })
    }

    /// 按给定的 TMDB ID 列表刷新，库里不存在的 ID 记为单条失败
    pub async fn update_by_ids(&self, tmdb_ids: &[i64]) -> Result<UpdateRunResult> {
        let mut summary = UpdateSummary {
            total: tmdb_ids.len(),
            ..Default::default()
        };
        let mut results = Vec::new();

        for &tmdb_id in tmdb_ids {
            let result = self.update_by_tmdb_id(tmdb_id).await?;
            if result.success {
                summary.updated += 1;
            } else {
                summary.failed += 1;
            }
            results.push(result);

            tokio::time::sleep(UPDATE_DELAY).await;
        }

        Ok(UpdateRunResult {
            success: true,
            message: format!(
                "Update completed: {} updated, {} failed",
                summary.updated, summary.failed
            ),
            summary,
            results,
        })
    }

    /// 全库过期统计
    pub async fn statistics(&self) -> Result<UpdateStatistics> {
        let targets = self.repository.update_targets().await?;
        Ok(compute_statistics(
            &targets,
            DEFAULT_THRESHOLD_DAYS,
            Utc::now(),
        ))
    }
}

/// 从目标列表计算统计值（纯函数）
pub fn compute_statistics(
    targets: &[UpdateTarget],
    threshold_days: i64,
    now: DateTime<Utc>,
) -> UpdateStatistics {
    let total = targets.len();
    let mut needs = 0usize;
    let mut recent = 0usize;
    let mut never = 0usize;

    for target in targets {
        match target.updated_at {
            None => never += 1,
            Some(ts) => {
                if needs_update_at(Some(ts), threshold_days, now) {
                    needs += 1;
                } else {
                    recent += 1;
                }
            }
        }
    }

    let percentage = if total > 0 {
        (recent as f64 / total as f64 * 100.0 * 100.0).round() / 100.0
    } else {
        0.0
    };

    UpdateStatistics {
        total_movies: total,
        needs_update: needs,
        recently_updated: recent,
        never_updated: never,
        update_percentage: percentage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn target(id: i64, updated_at: Option<DateTime<Utc>>) -> UpdateTarget {
        UpdateTarget {
            id,
            tmdb_id: id * 1000,
            title: format!("Movie {}", id),
            updated_at,
        }
    }

    #[test]
    fn test_never_updated_needs_update() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        assert!(needs_update_at(None, 7, now));
    }

    #[test]
    fn test_stale_record_needs_update() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let eight_days_ago = now - chrono::Duration::days(8);
        assert!(needs_update_at(Some(eight_days_ago), 7, now));
    }

    #[test]
    fn test_fresh_record_does_not_need_update() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let yesterday = now - chrono::Duration::days(1);
        assert!(!needs_update_at(Some(yesterday), 7, now));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let exactly_seven = now - chrono::Duration::days(7);
        assert!(needs_update_at(Some(exactly_seven), 7, now));
    }

    #[test]
    fn test_compute_statistics() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let targets = vec![
            target(1, None),
            target(2, Some(now - chrono::Duration::days(10))),
            target(3, Some(now - chrono::Duration::days(1))),
            target(4, Some(now - chrono::Duration::days(2))),
        ];

        let stats = compute_statistics(&targets, 7, now);
        assert_eq!(stats.total_movies, 4);
        assert_eq!(stats.never_updated, 1);
        assert_eq!(stats.needs_update, 1);
        assert_eq!(stats.recently_updated, 2);
        assert_eq!(stats.update_percentage, 50.0);
    }

    #[test]
    fn test_compute_statistics_empty() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        let stats = compute_statistics(&[], 7, now);
        assert_eq!(stats.total_movies, 0);
        assert_eq!(stats.update_percentage, 0.0);
    }
}
