pub mod tmdb;

use anyhow::{anyhow, Result};

pub use tmdb::{TmdbClient, TmdbExtractor, TmdbSearchMovie};

use crate::models::MovieData;

/// 默认的播放平台地区码
const DEFAULT_WATCH_REGION: &str = "TH";

/// 电影数据网关
///
/// 包装对 TMDB 的全部出站调用。API key 缺失时客户端为 None，
/// 调用点返回 upstream 错误而不是在启动时崩溃。
#[derive(Clone)]
pub struct TmdbGateway {
    client: Option<TmdbClient>,
    region: String,
}

impl TmdbGateway {
    /// 从环境变量构建（TMDB_API_KEY、TMDB_WATCH_REGION）
    pub fn from_env() -> Self {
        let client = std::env::var("TMDB_API_KEY")
            .ok()
            .and_then(|api_key| match TmdbClient::new(api_key) {
                Ok(client) => Some(client),
                Err(e) => {
                    tracing::error!("Failed to create TMDB client: {}", e);
                    None
                }
            });

        let region = std::env::var("TMDB_WATCH_REGION")
            .unwrap_or_else(|_| DEFAULT_WATCH_REGION.to_string());

        Self { client, region }
    }

    pub fn new(client: Option<TmdbClient>, region: String) -> Self {
        Self { client, region }
    }

    /// TMDB 客户端是否可用
    pub fn is_available(&self) -> bool {
        self.client.is_some()
    }

    fn client(&self) -> Result<&TmdbClient> {
        self.client
            .as_ref()
            .ok_or_else(|| anyhow!("TMDB API key not configured"))
    }

    /// 拉取电影详情 + 播放平台并提取为写入载荷
    ///
    /// 平台接口失败只降级为空列表，不影响详情导入。
    pub async fn fetch_movie(&self, tmdb_id: i64) -> Result<MovieData> {
        let client = self.client()?;
        let details = client.get_movie_details(tmdb_id).await?;

        let providers = match client.get_watch_providers(tmdb_id).await {
            Ok(providers) => providers,
            Err(e) => {
                tracing::warn!("Failed to fetch watch providers for {}: {}", tmdb_id, e);
                Default::default()
            }
        };
        let region_providers = providers.results.get(&self.region);

        Ok(TmdbExtractor::movie_data(&details, region_providers))
    }

    /// 在 TMDB 中搜索电影，返回前 10 条
    pub async fn search(&self, query: &str) -> Result<Vec<TmdbSearchMovie>> {
        let client = self.client()?;
        let response = client.search_movies(query).await?;
        Ok(TmdbExtractor::search_hits(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_gateway_without_client_errors() {
        let gateway = TmdbGateway::new(None, "TH".to_string());
        assert!(!gateway.is_available());

        let result = gateway.fetch_movie(550).await;
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("TMDB API key not configured"));
    }
}
