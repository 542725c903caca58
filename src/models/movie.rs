use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// 演员条目（姓名 + 角色名）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CastMember {
    pub name: String,
    #[serde(default)]
    pub character: String,
}

/// 单个播放平台条目
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderEntry {
    pub provider_name: String,
    #[serde(default)]
    pub logo_path: String,
    pub provider_id: i64,
}

/// 按获取方式分组的播放平台，每组最多 5 条
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StreamingProviders {
    #[serde(default)]
    pub streaming: Vec<ProviderEntry>,
    #[serde(default)]
    pub rent: Vec<ProviderEntry>,
    #[serde(default)]
    pub buy: Vec<ProviderEntry>,
}

impl StreamingProviders {
    pub fn is_empty(&self) -> bool {
        self.streaming.is_empty() && self.rent.is_empty() && self.buy.is_empty()
    }
}

/// movies 表完整行
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MovieRecord {
    pub id: i64,
    pub tmdb_id: i64,
    pub title: String,
    pub original_title: String,
    pub year: String, // 可能为空字符串
    pub genres: Json<Vec<String>>,
    pub cast_data: Json<Vec<CastMember>>,
    pub director: Option<String>,
    pub trailer_id: Option<String>, // YouTube video key
    pub poster_path: Option<String>,
    pub streaming_providers: Json<StreamingProviders>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>, // 首次刷新前为 NULL
}

/// 列表页使用的精简行
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MovieSummary {
    pub id: i64,
    pub tmdb_id: i64,
    pub title: String,
    pub year: String,
    pub director: Option<String>,
    pub genres: Json<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

/// 从 TMDB 提取后的写入载荷，导入和刷新共用
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MovieData {
    pub tmdb_id: i64,
    pub title: String,
    pub original_title: String,
    pub year: String,
    pub genres: Vec<String>,
    pub cast_data: Vec<CastMember>,
    pub director: Option<String>,
    pub trailer_id: Option<String>,
    pub poster_path: Option<String>,
    pub streaming_providers: StreamingProviders,
}

/// 更新管理器遍历全库时使用的最小行
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UpdateTarget {
    pub id: i64,
    pub tmdb_id: i64,
    pub title: String,
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_streaming_providers_empty() {
        let providers = StreamingProviders::default();
        assert!(providers.is_empty());

        let providers = StreamingProviders {
            rent: vec![ProviderEntry {
                provider_name: "Apple TV".to_string(),
                logo_path: "/logo.jpg".to_string(),
                provider_id: 2,
            }],
            ..Default::default()
        };
        assert!(!providers.is_empty());
    }

    #[test]
    fn test_cast_member_missing_character() {
        // TMDB 偶尔缺失 character 字段
        let member: CastMember = serde_json::from_str(r#"{"name": "Edward Norton"}"#).unwrap();
        assert_eq!(member.name, "Edward Norton");
        assert_eq!(member.character, "");
    }
}
