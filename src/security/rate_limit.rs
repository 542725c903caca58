use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;

/// 请求时间戳的最长保留期（24 小时），超过的条目在每次检查时被清除
const RETENTION_WINDOW: Duration = Duration::from_secs(86400);

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);

/// 三个时间桶的请求上限
#[derive(Debug, Clone)]
pub struct RateLimits {
    pub per_minute: usize,
    pub per_hour: usize,
    pub per_day: usize,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            per_minute: 10,
            per_hour: 100,
            per_day: 1000,
        }
    }
}

/// 放行时返回的各桶使用量（检查时刻、未计入本次请求）
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitUsage {
    pub per_minute: String,
    pub per_hour: String,
    pub per_day: String,
}

/// 限流判定结果
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub reason: String,
    /// 被拒绝时为触发桶的窗口长度（秒）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<RateLimitUsage>,
}

impl RateLimitDecision {
    fn denied(count: usize, limit: usize, bucket: &str, retry_after: u64) -> Self {
        Self {
            allowed: false,
            reason: format!("Rate limit exceeded: {}/{} per {}", count, limit, bucket),
            retry_after: Some(retry_after),
            usage: None,
        }
    }
}

/// 按 IP 的滑动窗口限流器
///
/// 每个 IP 维护一份请求时间戳列表，检查时先裁剪到 24 小时窗口，
/// 再按 分钟 -> 小时 -> 天 的顺序比对上限，先超先拒。
/// 状态仅存在于进程内，重启即清零。
#[derive(Debug, Clone)]
pub struct RateLimiter {
    requests: Arc<RwLock<HashMap<String, Vec<Instant>>>>,
    limits: RateLimits,
}

impl RateLimiter {
    pub fn new(limits: RateLimits) -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
            limits,
        }
    }

    /// 检查并记录一次请求
    pub fn check(&self, ip: &str) -> RateLimitDecision {
        self.check_at(ip, Instant::now())
    }

    /// 以指定时刻检查（测试注入时钟用）
    pub fn check_at(&self, ip: &str, now: Instant) -> RateLimitDecision {
        let mut requests = match self.requests.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let timestamps = requests.entry(ip.to_string()).or_default();

        // 先裁剪掉保留期外的条目
        timestamps.retain(|t| now.saturating_duration_since(*t) < RETENTION_WINDOW);

        let last_minute = timestamps
            .iter()
            .filter(|t| now.saturating_duration_since(**t) < MINUTE)
            .count();
        let last_hour = timestamps
            .iter()
            .filter(|t| now.saturating_duration_since(**t) < HOUR)
            .count();
        let last_day = timestamps.len();

        if last_minute >= self.limits.per_minute {
            return RateLimitDecision::denied(last_minute, self.limits.per_minute, "minute", 60);
        }
        if last_hour >= self.limits.per_hour {
            return RateLimitDecision::denied(last_hour, self.limits.per_hour, "hour", 3600);
        }
        if last_day >= self.limits.per_day {
            return RateLimitDecision::denied(last_day, self.limits.per_day, "day", 86400);
        }

        timestamps.push(now);

        RateLimitDecision {
            allowed: true,
            reason: "OK".to_string(),
            retry_after: None,
            usage: Some(RateLimitUsage {
                per_minute: format!("{}/{}", last_minute, self.limits.per_minute),
                per_hour: format!("{}/{}", last_hour, self.limits.per_hour),
                per_day: format!("{}/{}", last_day, self.limits.per_day),
            }),
        }
    }

    /// 当前有请求记录的 IP 数
    pub fn tracked_ip_count(&self) -> usize {
        self.requests.read().map(|r| r.len()).unwrap_or(0)
    }

    /// 指定窗口内各 IP 的活动快照，按最近请求排序
    pub fn recent_activity(&self, within: Duration) -> Vec<IpActivity> {
        let now = Instant::now();
        let requests = match self.requests.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut activity: Vec<IpActivity> = requests
            .iter()
            .filter_map(|(ip, timestamps)| {
                let recent: Vec<&Instant> = timestamps
                    .iter()
                    .filter(|t| now.saturating_duration_since(**t) < within)
                    .collect();
                let last = recent.iter().copied().max()?;
                Some(IpActivity {
                    ip: ip.clone(),
                    request_count: recent.len(),
                    last_request_secs_ago: now.saturating_duration_since(*last).as_secs(),
                })
            })
            .collect();

        activity.sort_by_key(|a| a.last_request_secs_ago);
        activity
    }

    #[cfg(test)]
    fn seed(&self, ip: &str, timestamps: Vec<Instant>) {
        self.requests
            .write()
            .unwrap()
            .insert(ip.to_string(), timestamps);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimits::default())
    }
}

/// 单个 IP 的近期活动
#[derive(Debug, Clone, Serialize)]
pub struct IpActivity {
    pub ip: String,
    pub request_count: usize,
    pub last_request_secs_ago: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_minute_limit_denies_eleventh_request() {
        let limiter = RateLimiter::default();
        let base = Instant::now();

        for i in 0..10 {
            let decision = limiter.check_at("1.2.3.4", base + Duration::from_secs(i));
            assert!(decision.allowed, "request {} should be allowed", i + 1);
        }

        let decision = limiter.check_at("1.2.3.4", base + Duration::from_secs(10));
        assert!(!decision.allowed);
        assert_eq!(decision.retry_after, Some(60));
        assert!(decision.reason.contains("per minute"));
    }

    #[test]
    fn test_minute_window_slides() {
        let limiter = RateLimiter::default();
        let base = Instant::now();

        for _ in 0..10 {
            assert!(limiter.check_at("1.2.3.4", base).allowed);
        }
        assert!(!limiter.check_at("1.2.3.4", base + Duration::from_secs(30)).allowed);

        // 61 秒后分钟桶清空，小时桶（10/100）仍有余量
        assert!(limiter.check_at("1.2.3.4", base + Duration::from_secs(61)).allowed);
    }

    #[test]
    fn test_hour_limit() {
        let limiter = RateLimiter::default();
        let base = Instant::now();

        // 预置 100 条一小时内、但都在一分钟之外的记录
        let timestamps: Vec<Instant> = (0..100)
            .map(|i| base + Duration::from_secs(61 + i * 30))
            .collect();
        let now = base + Duration::from_secs(61 + 100 * 30);
        limiter.seed("5.6.7.8", timestamps);

        let decision = limiter.check_at("5.6.7.8", now + Duration::from_secs(3000));
        assert!(decision.allowed, "old entries should have slid out");

        let decision = limiter.check_at("5.6.7.8", now);
        assert!(!decision.allowed);
        assert_eq!(decision.retry_after, Some(3600));
    }

    #[test]
    fn test_day_retention_prunes_old_entries() {
        let limiter = RateLimiter::default();
        let base = Instant::now();

        let timestamps: Vec<Instant> = (0..1000).map(|_| base).collect();
        limiter.seed("9.9.9.9", timestamps);

        // 24 小时内：天级上限命中
        let decision = limiter.check_at("9.9.9.9", base + Duration::from_secs(7200));
        assert!(!decision.allowed);
        assert_eq!(decision.retry_after, Some(86400));

        // 过了保留期后全部被清除
        let decision = limiter.check_at("9.9.9.9", base + Duration::from_secs(86401));
        assert!(decision.allowed);
    }

    #[test]
    fn test_ips_are_tracked_independently() {
        let limiter = RateLimiter::default();
        let base = Instant::now();

        for _ in 0..10 {
            assert!(limiter.check_at("1.1.1.1", base).allowed);
        }
        assert!(!limiter.check_at("1.1.1.1", base).allowed);
        assert!(limiter.check_at("2.2.2.2", base).allowed);
        assert_eq!(limiter.tracked_ip_count(), 2);
    }

    #[test]
    fn test_usage_reports_counts_before_recording() {
        let limiter = RateLimiter::default();
        let base = Instant::now();

        let decision = limiter.check_at("1.2.3.4", base);
        let usage = decision.usage.unwrap();
        assert_eq!(usage.per_minute, "0/10");

        let decision = limiter.check_at("1.2.3.4", base);
        let usage = decision.usage.unwrap();
        assert_eq!(usage.per_minute, "1/10");
    }

    proptest! {
        /// 一分钟窗口内的前 per_minute 次请求总是放行，之后必拒
        #[test]
        fn prop_minute_bucket_boundary(spacing_ms in 0u64..5000, extra in 1usize..5) {
            let limiter = RateLimiter::default();
            let base = Instant::now();

            let mut allowed = 0usize;
            let mut denied = 0usize;
            for i in 0..(10 + extra) {
                let at = base + Duration::from_millis(spacing_ms * i as u64 / 10);
                let decision = limiter.check_at("7.7.7.7", at);
                if decision.allowed {
                    allowed += 1;
                } else {
                    denied += 1;
                    prop_assert_eq!(decision.retry_after, Some(60));
                }
            }
            prop_assert_eq!(allowed, 10);
            prop_assert_eq!(denied, extra);
        }
    }
}
