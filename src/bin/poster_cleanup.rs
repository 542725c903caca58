// 海报清理工具：删除缓存目录中不再对应任何库内记录的文件

use std::collections::HashSet;
use std::path::PathBuf;

use clap::Parser;

use movie_info_backend::database::{Database, MovieRepository};
use movie_info_backend::services::PosterCache;

#[derive(Parser)]
#[command(name = "poster_cleanup", about = "Remove orphaned poster files")]
struct Args {
    /// 只列出将被删除的文件，不实际删除
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    let args = Args::parse();

    let database = Database::new().await?;
    let static_root =
        PathBuf::from(std::env::var("STATIC_DIR").unwrap_or_else(|_| "./static".to_string()));
    let posters = PosterCache::new(static_root).await?;

    // 库内每条有海报的记录推导出一个存活文件名
    let rows = database.repository().poster_paths().await?;
    let live: HashSet<String> = rows
        .iter()
        .filter_map(|(tmdb_id, poster_path)| {
            poster_path
                .as_deref()
                .filter(|path| !path.is_empty())
                .map(|path| PosterCache::poster_filename(*tmdb_id, path))
        })
        .collect();

    println!(
        "Found {} movies, {} with posters",
        rows.len(),
        live.len()
    );

    let orphans = posters.orphaned_posters(&live).await?;
    if orphans.is_empty() {
        println!("No orphaned posters found");
        return Ok(());
    }

    println!("Found {} orphaned poster files", orphans.len());
    for path in &orphans {
        if args.dry_run {
            println!("  would remove {}", path.display());
        } else {
            match tokio::fs::remove_file(path).await {
                Ok(()) => println!("  removed {}", path.display()),
                Err(e) => println!("  failed to remove {}: {}", path.display(), e),
            }
        }
    }

    Ok(())
}
