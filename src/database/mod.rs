use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

pub mod movie_repository;

pub use movie_repository::{MovieRepository, PgMovieRepository};

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    repository: PgMovieRepository,
}

impl Database {
    pub async fn new() -> Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        tracing::info!("Connecting to database");

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&database_url)
            .await
            .context("Failed to connect to database")?;

        // Run migrations
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to run migrations")?;

        let repository = PgMovieRepository::new(pool.clone());

        let count = repository.movie_count().await?;
        tracing::info!("Database initialized - Movies: {}", count);

        Ok(Self { pool, repository })
    }

    /// 直接包装一个现成的连接池（工具与测试用，不跑迁移）
    pub fn from_pool(pool: PgPool) -> Self {
        let repository = PgMovieRepository::new(pool.clone());
        Self { pool, repository }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn repository(&self) -> &PgMovieRepository {
        &self.repository
    }
}
