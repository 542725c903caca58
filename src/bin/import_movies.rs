// 批量导入工具：按 TMDB ID 列表导入电影

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use movie_info_backend::database::Database;
use movie_info_backend::external::TmdbGateway;
use movie_info_backend::services::{MovieImporter, PosterCache};

/// 缺省导入清单
const DEFAULT_IDS: &[i64] = &[1_022_787, 299_536, 550, 13, 680, 238, 278];

/// 相邻导入之间的间隔
const IMPORT_DELAY: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(name = "import_movies", about = "Import movies from TMDB by id")]
struct Args {
    /// TMDB 电影 ID 列表，留空时使用内置清单
    ids: Vec<i64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    let args = Args::parse();
    let ids = if args.ids.is_empty() {
        DEFAULT_IDS.to_vec()
    } else {
        args.ids
    };

    let database = Database::new().await?;
    let gateway = TmdbGateway::from_env();
    let static_root =
        PathBuf::from(std::env::var("STATIC_DIR").unwrap_or_else(|_| "./static".to_string()));
    let posters = Arc::new(PosterCache::new(static_root).await?);
    let importer = MovieImporter::new(gateway, database.repository().clone(), posters);

    println!("Importing {} movies...", ids.len());

    let mut successful = 0usize;
    for (i, tmdb_id) in ids.iter().enumerate() {
        println!("[{}/{}] Processing movie ID: {}", i + 1, ids.len(), tmdb_id);

        match importer.import(*tmdb_id).await {
            Ok(outcome) => {
                successful += 1;
                println!("  {}", outcome.message);
            }
            Err(e) => println!("  Failed: {}", e),
        }

        tokio::time::sleep(IMPORT_DELAY).await;
    }

    println!(
        "Successful imports: {}/{}, failed: {}",
        successful,
        ids.len(),
        ids.len() - successful
    );

    Ok(())
}
