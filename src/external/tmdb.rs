use std::collections::HashMap;
use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::models::{CastMember, MovieData, ProviderEntry, StreamingProviders};

/// 每部电影保留的类型数
const MAX_GENRES: usize = 3;
/// 每部电影保留的演员数
const MAX_CAST: usize = 3;
/// 每个获取方式保留的平台数
const MAX_PROVIDERS: usize = 5;
/// 搜索返回的最大条数
const MAX_SEARCH_RESULTS: usize = 10;

/// TMDB API 客户端
#[derive(Clone)]
pub struct TmdbClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl TmdbClient {
    pub fn new(api_key: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| anyhow!("Failed to build TMDB HTTP client: {}", e))?;

        Ok(Self {
            client,
            api_key,
            base_url: "https://api.themoviedb.org/3".to_string(),
        })
    }

    /// 获取电影详情（内嵌演职人员与视频子资源）
    pub async fn get_movie_details(&self, movie_id: i64) -> Result<TmdbMovieDetails> {
        let url = format!("{}/movie/{}", self.base_url, movie_id);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("append_to_response", "credits,videos"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("TMDB API error: {}", response.status()));
        }

        let details: TmdbMovieDetails = response.json().await?;
        Ok(details)
    }

    /// 搜索电影
    pub async fn search_movies(&self, query: &str) -> Result<TmdbSearchResponse> {
        let url = format!("{}/search/movie", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("query", query),
                ("page", "1"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("TMDB API error: {}", response.status()));
        }

        let search_result: TmdbSearchResponse = response.json().await?;
        Ok(search_result)
    }

    /// 获取按地区分组的播放平台列表
    pub async fn get_watch_providers(&self, movie_id: i64) -> Result<TmdbWatchProviders> {
        let url = format!("{}/movie/{}/watch/providers", self.base_url, movie_id);

        let response = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("TMDB API error: {}", response.status()));
        }

        let providers: TmdbWatchProviders = response.json().await?;
        Ok(providers)
    }
}

/// TMDB 搜索响应
#[derive(Debug, Deserialize, Serialize)]
pub struct TmdbSearchResponse {
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub results: Vec<TmdbSearchMovie>,
    #[serde(default)]
    pub total_results: u32,
}

/// TMDB 搜索结果条目
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmdbSearchMovie {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub original_title: String,
    pub release_date: Option<String>,
    pub poster_path: Option<String>,
    pub overview: Option<String>,
}

/// TMDB 电影详情
#[derive(Debug, Deserialize, Serialize)]
pub struct TmdbMovieDetails {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub original_title: String,
    pub release_date: Option<String>,
    pub poster_path: Option<String>,
    #[serde(default)]
    pub genres: Vec<TmdbGenre>,
    pub credits: Option<TmdbCredits>,
    pub videos: Option<TmdbVideoList>,
}

/// TMDB 类型
#[derive(Debug, Deserialize, Serialize)]
pub struct TmdbGenre {
    pub id: i64,
    pub name: String,
}

/// TMDB 演职人员信息
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TmdbCredits {
    #[serde(default)]
    pub cast: Vec<TmdbCastMember>,
    #[serde(default)]
    pub crew: Vec<TmdbCrewMember>,
}

/// TMDB 演员
#[derive(Debug, Deserialize, Serialize)]
pub struct TmdbCastMember {
    pub name: String,
    #[serde(default)]
    pub character: String,
}

/// TMDB 制作人员
#[derive(Debug, Deserialize, Serialize)]
pub struct TmdbCrewMember {
    pub name: String,
    #[serde(default)]
    pub job: String,
}

/// TMDB 视频子资源
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TmdbVideoList {
    #[serde(default)]
    pub results: Vec<TmdbVideo>,
}

/// TMDB 视频条目
#[derive(Debug, Deserialize, Serialize)]
pub struct TmdbVideo {
    pub key: String,
    #[serde(default)]
    pub site: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// TMDB 播放平台响应（按地区码分组）
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TmdbWatchProviders {
    #[serde(default)]
    pub results: HashMap<String, TmdbRegionProviders>,
}

/// 单个地区的播放平台
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TmdbRegionProviders {
    #[serde(default)]
    pub flatrate: Vec<TmdbProvider>,
    #[serde(default)]
    pub rent: Vec<TmdbProvider>,
    #[serde(default)]
    pub buy: Vec<TmdbProvider>,
}

/// TMDB 播放平台条目
#[derive(Debug, Deserialize, Serialize)]
pub struct TmdbProvider {
    #[serde(default)]
    pub provider_name: String,
    pub logo_path: Option<String>,
    #[serde(default)]
    pub provider_id: i64,
}

/// 提取器：把 TMDB 响应裁剪为本地写入载荷
///
/// 字段选择是确定性的：类型/演员/平台按固定上限截断，
/// 导演取第一个 job 为 Director 的条目，预告片取第一个
/// YouTube Trailer。缺失的可选字段一律落为空值，提取本身不失败。
pub struct TmdbExtractor;

impl TmdbExtractor {
    /// 将电影详情 + 地区平台合并为 MovieData
    pub fn movie_data(
        details: &TmdbMovieDetails,
        region_providers: Option<&TmdbRegionProviders>,
    ) -> MovieData {
        let year = details
            .release_date
            .as_deref()
            .map(|date| date.chars().take(4).collect())
            .unwrap_or_default();

        let genres: Vec<String> = details
            .genres
            .iter()
            .take(MAX_GENRES)
            .map(|g| g.name.clone())
            .collect();

        let (cast_data, director) = match &details.credits {
            Some(credits) => {
                let cast = credits
                    .cast
                    .iter()
                    .take(MAX_CAST)
                    .map(|c| CastMember {
                        name: c.name.clone(),
                        character: c.character.clone(),
                    })
                    .collect();
                let director = credits
                    .crew
                    .iter()
                    .find(|c| c.job == "Director")
                    .map(|c| c.name.clone());
                (cast, director)
            }
            None => (Vec::new(), None),
        };

        let trailer_id = details
            .videos
            .as_ref()
            .and_then(|videos| {
                videos
                    .results
                    .iter()
                    .find(|v| v.kind == "Trailer" && v.site == "YouTube")
            })
            .map(|v| v.key.clone());

        let streaming_providers = region_providers
            .map(Self::extract_providers)
            .unwrap_or_default();

        MovieData {
            tmdb_id: details.id,
            title: details.title.clone(),
            original_title: details.original_title.clone(),
            year,
            genres,
            cast_data,
            director,
            trailer_id,
            poster_path: details.poster_path.clone(),
            streaming_providers,
        }
    }

    /// 每个获取方式截取前 5 个平台
    fn extract_providers(region: &TmdbRegionProviders) -> StreamingProviders {
        let convert = |providers: &[TmdbProvider]| -> Vec<ProviderEntry> {
            providers
                .iter()
                .take(MAX_PROVIDERS)
                .map(|p| ProviderEntry {
                    provider_name: p.provider_name.clone(),
                    logo_path: p.logo_path.clone().unwrap_or_default(),
                    provider_id: p.provider_id,
                })
                .collect()
        };

        StreamingProviders {
            streaming: convert(&region.flatrate),
            rent: convert(&region.rent),
            buy: convert(&region.buy),
        }
    }

    /// 搜索结果截断到固定上限
    pub fn search_hits(response: TmdbSearchResponse) -> Vec<TmdbSearchMovie> {
        response
            .results
            .into_iter()
            .take(MAX_SEARCH_RESULTS)
            .collect()
    }
}
