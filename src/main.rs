use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use movie_info_backend::api::{self, AdminAuth, AppState};
use movie_info_backend::database::Database;
use movie_info_backend::external::TmdbGateway;
use movie_info_backend::security::SecurityState;
use movie_info_backend::services::{MovieImporter, PosterCache, UpdateManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize database
    let database = Database::new().await?;

    // Initialize TMDB gateway
    let gateway = TmdbGateway::from_env();
    if !gateway.is_available() {
        tracing::warn!("TMDB_API_KEY not configured; import and update are disabled");
    }

    // Initialize poster cache under the static file root
    let static_root =
        PathBuf::from(std::env::var("STATIC_DIR").unwrap_or_else(|_| "./static".to_string()));
    let posters = Arc::new(PosterCache::new(static_root.clone()).await?);

    // Initialize security state and admin credentials
    let security = Arc::new(SecurityState::new());
    let admin = Arc::new(AdminAuth::from_env());

    // Initialize services
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

    let state = AppState {
        database,
        gateway,
        posters,
        security,
        admin,
        importer,
        update_manager,
    };

    // Build our application with routes
    let app = api::build_router(state)
        .nest_service("/static", ServeDir::new(&static_root))
        .layer(CorsLayer::permissive());

    // Run the server
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "5000".to_string())
        .parse()
        .unwrap_or(5000);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
