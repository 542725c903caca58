// 电影信息后端库
//
// 本库提供电影信息站的核心功能，包括：
// - API 路由（公开站点 + 管理面板）
// - 数据库存储（以 TMDB ID 为业务键的 upsert）
// - TMDB 数据网关与字段提取
// - 请求安全（IP 信誉 + 滑动窗口限流）
// - 海报缓存与过期记录刷新

#![allow(dead_code)]

pub mod api;
pub mod database;
pub mod external;
pub mod models;
pub mod security;
pub mod services;
