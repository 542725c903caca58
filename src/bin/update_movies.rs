// 刷新工具：对过期的电影记录按需重新拉取 TMDB 数据

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use movie_info_backend::database::{Database, MovieRepository};
use movie_info_backend::external::TmdbGateway;
use movie_info_backend::services::update_manager::{UpdateManager, DEFAULT_THRESHOLD_DAYS};
use movie_info_backend::services::PosterCache;

#[derive(Parser)]
#[command(name = "update_movies", about = "Update movie data from TMDB")]
struct Args {
    /// 刷新全部记录
    #[arg(long)]
    all: bool,

    /// 忽略过期判断，强制刷新
    #[arg(long)]
    force: bool,

    /// 过期阈值（天）
    #[arg(long, default_value_t = DEFAULT_THRESHOLD_DAYS)]
    days: i64,

    /// 只刷新给定的 TMDB ID
    #[arg(long, num_args = 1..)]
    ids: Vec<i64>,

    /// 按 TMDB ID 刷新单条记录
    #[arg(long)]
    single: Option<i64>,

    /// 只显示过期统计
    #[arg(long)]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    let args = Args::parse();

    let database = Database::new().await?;
    let gateway = TmdbGateway::from_env();
    let static_root =
        PathBuf::from(std::env::var("STATIC_DIR").unwrap_or_else(|_| "./static".to_string()));
    let posters = Arc::new(PosterCache::new(static_root).await?);
    let manager = UpdateManager::new(gateway, database.repository().clone(), posters);

    if args.stats {
        let stats = manager.statistics().await?;
        println!("Update statistics:");
        println!("  Total movies: {}", stats.total_movies);
        println!("  Needs update: {}", stats.needs_update);
        println!("  Recently updated: {}", stats.recently_updated);
        println!("  Never updated: {}", stats.never_updated);
        println!("  Update percentage: {}%", stats.update_percentage);
        return Ok(());
    }

    if let Some(tmdb_id) = args.single {
        match database.repository().get_movie_by_tmdb_id(tmdb_id).await? {
            Some(movie) => {
                let result = manager.update_single(movie.id, tmdb_id).await;
                println!("{}", result.message);
            }
            None => println!("Movie with TMDB ID {} not found in database", tmdb_id),
        }
        return Ok(());
    }

    if !args.ids.is_empty() {
        println!("Updating {} movies by TMDB IDs", args.ids.len());
        let result = manager.update_by_ids(&args.ids).await?;
        println!("{}", result.message);
        for item in &result.results {
            if !item.success {
                println!("  {} failed: {}", item.tmdb_id, item.message);
            }
        }
        return Ok(());
    }

    if args.all {
        println!(
            "Updating all movies (force: {}, days threshold: {})",
            args.force, args.days
        );
        let result = manager.update_all(args.force, args.days).await?;
        println!("{}", result.message);
        return Ok(());
    }

    println!("Nothing to do. Use --all, --single, --ids or --stats.");
    Ok(())
}
