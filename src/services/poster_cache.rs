// 海报缓存 - 内容寻址的图片落盘缓存
//
// 文件名由所属对象 ID + 源路径哈希构成，同一源路径永远解析到
// 同一文件；已存在的文件直接复用，不再下载。下载失败时退回
// TMDB 直链，调用方总能拿到一个可用的 URL。

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::models::StreamingProviders;

/// 无海报时的占位路径
pub const NO_POSTER_PATH: &str = "/static/images/no-poster.jpg";
/// 无平台 logo 时的占位路径
pub const NO_LOGO_PATH: &str = "/static/images/no-logo.png";

/// 海报尺寸（小图省带宽）
const POSTER_SIZE: &str = "w185";
/// 平台 logo 尺寸
const LOGO_SIZE: &str = "w45";

const DEFAULT_IMAGE_BASE: &str = "https://image.tmdb.org/t/p";

/// 海报缓存错误
#[derive(Debug, Error)]
pub enum PosterCacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
}

impl From<reqwest::Error> for PosterCacheError {
    fn from(err: reqwest::Error) -> Self {
        PosterCacheError::Download(err.to_string())
    }
}

/// 展示用的平台条目（logo 已解析为可用 URL）
#[derive(Debug, Clone, Serialize)]
pub struct DisplayProvider {
    pub name: String,
    pub logo_url: String,
    pub id: i64,
}

/// 展示用的平台分组
#[derive(Debug, Clone, Default, Serialize)]
pub struct FormattedProviders {
    pub streaming: Vec<DisplayProvider>,
    pub rent: Vec<DisplayProvider>,
    pub buy: Vec<DisplayProvider>,
    pub has_providers: bool,
}

/// 海报/平台 logo 缓存
pub struct PosterCache {
    client: Client,
    static_root: PathBuf,
    image_base: String,
}

impl PosterCache {
    /// 创建缓存并确保目录存在
    ///
    /// `static_root` 是静态文件根目录，图片落在其下的
    /// `images/posters/` 和 `images/providers/`。
    pub async fn new(static_root: PathBuf) -> Result<Self, PosterCacheError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PosterCacheError::Download(e.to_string()))?;

        fs::create_dir_all(static_root.join("images/posters")).await?;
        fs::create_dir_all(static_root.join("images/providers")).await?;

        Ok(Self {
            client,
            static_root,
            image_base: DEFAULT_IMAGE_BASE.to_string(),
        })
    }

    /// 替换图片源（镜像站点或测试桩）
    pub fn with_image_base(mut self, image_base: impl Into<String>) -> Self {
        self.image_base = image_base.into();
        self
    }

    /// 源路径哈希的前 8 个十六进制字符
    fn path_hash(source_path: &str) -> String {
        let digest = Sha256::digest(source_path.as_bytes());
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        hex[..8].to_string()
    }

    /// 海报文件名：`{tmdb_id}_{hash8}.jpg`
    pub fn poster_filename(tmdb_id: i64, poster_path: &str) -> String {
        format!("{}_{}.jpg", tmdb_id, Self::path_hash(poster_path))
    }

    /// 平台 logo 文件名：`provider_{id}_{hash8}.jpg`
    pub fn provider_logo_filename(provider_id: i64, logo_path: &str) -> String {
        format!("provider_{}_{}.jpg", provider_id, Self::path_hash(logo_path))
    }

    /// 海报的 TMDB 直链
    pub fn remote_poster_url(&self, poster_path: &str) -> String {
        format!("{}/{}{}", self.image_base, POSTER_SIZE, poster_path)
    }

    /// 平台 logo 的 TMDB 直链
    pub fn remote_logo_url(&self, logo_path: &str) -> String {
        format!("{}/{}{}", self.image_base, LOGO_SIZE, logo_path)
    }

    /// 解析海报为本地路径，必要时下载
    ///
    /// 永不失败：空路径给占位图，下载失败退回直链。
    pub async fn resolve_poster(&self, poster_path: &str, tmdb_id: i64) -> String {
        if poster_path.is_empty() {
            return NO_POSTER_PATH.to_string();
        }

        let filename = Self::poster_filename(tmdb_id, poster_path);
        let file_path = self.static_root.join("images/posters").join(&filename);
        let web_path = format!("/static/images/posters/{}", filename);

        if file_path.exists() {
            debug!("Poster cache hit: {}", filename);
            return web_path;
        }

        let url = self.remote_poster_url(poster_path);
        match self.fetch_and_store(&url, &file_path).await {
            Ok(()) => {
                info!("Downloaded poster: {}", filename);
                web_path
            }
            Err(e) => {
                warn!("Error downloading poster {}: {}", poster_path, e);
                url
            }
        }
    }

    /// 解析平台 logo 为本地路径，必要时下载
    pub async fn resolve_provider_logo(&self, logo_path: &str, provider_id: i64) -> String {
        if logo_path.is_empty() {
            return NO_LOGO_PATH.to_string();
        }

        let filename = Self::provider_logo_filename(provider_id, logo_path);
        let file_path = self.static_root.join("images/providers").join(&filename);
        let web_path = format!("/static/images/providers/{}", filename);

        if file_path.exists() {
            debug!("Provider logo cache hit: {}", filename);
            return web_path;
        }

        let url = self.remote_logo_url(logo_path);
        match self.fetch_and_store(&url, &file_path).await {
            Ok(()) => {
                info!("Downloaded provider logo: {}", filename);
                web_path
            }
            Err(e) => {
                warn!("Error downloading provider logo {}: {}", logo_path, e);
                url
            }
        }
    }

    /// 把存储里的平台条目整理成展示结构，逐个解析 logo
    pub async fn format_providers(&self, providers: &StreamingProviders) -> FormattedProviders {
        let mut formatted = FormattedProviders::default();

        for entry in &providers.streaming {
            formatted.streaming.push(self.display_provider(entry).await);
        }
        for entry in &providers.rent {
            formatted.rent.push(self.display_provider(entry).await);
        }
        for entry in &providers.buy {
            formatted.buy.push(self.display_provider(entry).await);
        }

        formatted.has_providers = !formatted.streaming.is_empty()
            || !formatted.rent.is_empty()
            || !formatted.buy.is_empty();
        formatted
    }

    async fn display_provider(&self, entry: &crate::models::ProviderEntry) -> DisplayProvider {
        DisplayProvider {
            name: entry.provider_name.clone(),
            logo_url: self
                .resolve_provider_logo(&entry.logo_path, entry.provider_id)
                .await,
            id: entry.provider_id,
        }
    }

    /// 列出缓存目录中不属于任何存活文件名的海报
    ///
    /// `live_filenames` 由当前库内的 (tmdb_id, poster_path) 推导。
    pub async fn orphaned_posters(
        &self,
        live_filenames: &HashSet<String>,
    ) -> Result<Vec<PathBuf>, PosterCacheError> {
        let posters_dir = self.static_root.join("images/posters");
        let mut orphans = Vec::new();

        let mut entries = fs::read_dir(&posters_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if !live_filenames.contains(&name) {
                orphans.push(entry.path());
            }
        }

        Ok(orphans)
    }

    async fn fetch_and_store(
        &self,
        url: &str,
        file_path: &PathBuf,
    ) -> Result<(), PosterCacheError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PosterCacheError::HttpStatus(status.as_u16()));
        }

        let bytes = response.bytes().await?;

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(file_path, &bytes).await?;

        Ok(())
    }
}
