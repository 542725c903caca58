use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;

/// 信誉追踪参数
#[derive(Debug, Clone)]
pub struct ReputationConfig {
    /// 封禁窗口内允许的最大失败次数
    pub max_failed_attempts: usize,
    /// 失败记录的保留期，同时也是封禁时长
    pub ban_duration: Duration,
    /// 可疑行为计数的拒绝阈值
    pub suspicious_threshold: u32,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            ban_duration: Duration::from_secs(3600),
            suspicious_threshold: 10,
        }
    }
}

/// 信誉判定结果
#[derive(Debug, Clone, Serialize)]
pub struct SecurityDecision {
    pub allowed: bool,
    pub reason: String,
    /// 因失败次数被拒时的剩余封禁秒数
    pub ban_remaining: u64,
}

impl SecurityDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: "OK".to_string(),
            ban_remaining: 0,
        }
    }

    fn deny(reason: &str) -> Self {
        Self {
            allowed: false,
            reason: reason.to_string(),
            ban_remaining: 0,
        }
    }
}

/// 可疑 IP 快照条目（管理面板用）
#[derive(Debug, Clone, Serialize)]
pub struct SuspiciousIp {
    pub ip: String,
    pub count: u32,
}

/// 按 IP 的信誉追踪器
///
/// 检查顺序是刻意固定的：黑名单先于白名单（拉黑一个已在白名单里的
/// IP 必须立即生效），白名单放行则跳过其余全部检查。
/// 失败记录按封禁窗口裁剪；可疑计数单调递增，只能由管理员清除。
/// 全部状态仅存在于进程内。
#[derive(Debug)]
pub struct IpReputationTracker {
    blacklist: Arc<RwLock<HashSet<String>>>,
    whitelist: Arc<RwLock<HashSet<String>>>,
    failed_attempts: Arc<RwLock<HashMap<String, Vec<Instant>>>>,
    suspicious: Arc<RwLock<HashMap<String, u32>>>,
    config: ReputationConfig,
}

impl IpReputationTracker {
    pub fn new(config: ReputationConfig) -> Self {
        Self {
            blacklist: Arc::new(RwLock::new(HashSet::new())),
            whitelist: Arc::new(RwLock::new(HashSet::new())),
            failed_attempts: Arc::new(RwLock::new(HashMap::new())),
            suspicious: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    /// 检查一个 IP 是否放行
    pub fn check(&self, ip: &str) -> SecurityDecision {
        self.check_at(ip, Instant::now())
    }

    /// 以指定时刻检查（测试注入时钟用）
    pub fn check_at(&self, ip: &str, now: Instant) -> SecurityDecision {
        if self.read(&self.blacklist).contains(ip) {
            return SecurityDecision::deny("IP is blacklisted");
        }

        if self.read(&self.whitelist).contains(ip) {
            return SecurityDecision::allow();
        }

        {
            let mut failed = match self.failed_attempts.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(attempts) = failed.get_mut(ip) {
                attempts.retain(|t| now.saturating_duration_since(*t) < self.config.ban_duration);

                if attempts.len() >= self.config.max_failed_attempts {
                    // 剩余封禁时间从最早一条存活记录起算
                    let oldest = attempts.iter().min().copied().unwrap_or(now);
                    let elapsed = now.saturating_duration_since(oldest);
                    let remaining = self.config.ban_duration.saturating_sub(elapsed);
                    let mut decision = SecurityDecision::deny("Too many failed attempts");
                    decision.ban_remaining = remaining.as_secs();
                    return decision;
                }
            }
        }

        let suspicious_count = self
            .read(&self.suspicious)
            .get(ip)
            .copied()
            .unwrap_or(0);
        if suspicious_count >= self.config.suspicious_threshold {
            return SecurityDecision::deny("Suspicious activity detected");
        }

        SecurityDecision::allow()
    }

    /// 记录一次失败尝试（导入失败、登录失败等）
    pub fn record_failed_attempt(&self, ip: &str) {
        self.record_failed_attempt_at(ip, Instant::now());
    }

    pub fn record_failed_attempt_at(&self, ip: &str, now: Instant) {
        let mut failed = match self.failed_attempts.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let attempts = failed.entry(ip.to_string()).or_default();
        attempts.push(now);
        attempts.retain(|t| now.saturating_duration_since(*t) < self.config.ban_duration);

        tracing::warn!("Failed attempt recorded for IP: {}", ip);
    }

    /// 记录一次可疑行为，计数不随时间衰减
    pub fn record_suspicious_activity(&self, ip: &str, activity_type: &str) {
        let mut suspicious = match self.suspicious.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *suspicious.entry(ip.to_string()).or_insert(0) += 1;

        tracing::warn!(
            "Suspicious activity detected: {} from IP: {}",
            activity_type,
            ip
        );
    }

    pub fn add_to_blacklist(&self, ip: &str) {
        self.write(&self.blacklist).insert(ip.to_string());
        tracing::warn!("IP added to blacklist: {}", ip);
    }

    pub fn remove_from_blacklist(&self, ip: &str) {
        self.write(&self.blacklist).remove(ip);
        tracing::info!("IP removed from blacklist: {}", ip);
    }

    pub fn add_to_whitelist(&self, ip: &str) {
        self.write(&self.whitelist).insert(ip.to_string());
        tracing::info!("IP added to whitelist: {}", ip);
    }

    pub fn remove_from_whitelist(&self, ip: &str) {
        self.write(&self.whitelist).remove(ip);
        tracing::info!("IP removed from whitelist: {}", ip);
    }

    /// 清除某个 IP 的可疑计数
    pub fn clear_suspicious(&self, ip: &str) {
        let mut suspicious = match self.suspicious.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        suspicious.remove(ip);
    }

    /// 清除某个 IP 的失败记录
    pub fn clear_failed_attempts(&self, ip: &str) {
        let mut failed = match self.failed_attempts.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        failed.remove(ip);
    }

    pub fn blacklist_snapshot(&self) -> Vec<String> {
        let mut ips: Vec<String> = self.read(&self.blacklist).iter().cloned().collect();
        ips.sort();
        ips
    }

    pub fn whitelist_snapshot(&self) -> Vec<String> {
        let mut ips: Vec<String> = self.read(&self.whitelist).iter().cloned().collect();
        ips.sort();
        ips
    }

    pub fn suspicious_snapshot(&self) -> Vec<SuspiciousIp> {
        let mut entries: Vec<SuspiciousIp> = self
            .read(&self.suspicious)
            .iter()
            .map(|(ip, count)| SuspiciousIp {
                ip: ip.clone(),
                count: *count,
            })
            .collect();
        entries.sort_by(|a, b| b.count.cmp(&a.count));
        entries
    }

    pub fn blacklist_len(&self) -> usize {
        self.read(&self.blacklist).len()
    }

    pub fn whitelist_len(&self) -> usize {
        self.read(&self.whitelist).len()
    }

    pub fn suspicious_len(&self) -> usize {
        self.read(&self.suspicious).len()
    }

    pub fn failed_attempt_ip_count(&self) -> usize {
        self.failed_attempts.read().map(|f| f.len()).unwrap_or(0)
    }

    fn read<'a, T>(&self, lock: &'a RwLock<T>) -> std::sync::RwLockReadGuard<'a, T> {
        match lock.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write<'a, T>(&self, lock: &'a RwLock<T>) -> std::sync::RwLockWriteGuard<'a, T> {
        match lock.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for IpReputationTracker {
    fn default() -> Self {
        Self::new(ReputationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_ip_is_allowed() {
        let tracker = IpReputationTracker::default();
        let decision = tracker.check("1.2.3.4");
        assert!(decision.allowed);
        assert_eq!(decision.reason, "OK");
    }

    #[test]
    fn test_blacklist_denies() {
        let tracker = IpReputationTracker::default();
        tracker.add_to_blacklist("1.2.3.4");

        let decision = tracker.check("1.2.3.4");
        assert!(!decision.allowed);
        assert_eq!(decision.reason, "IP is blacklisted");

        tracker.remove_from_blacklist("1.2.3.4");
        assert!(tracker.check("1.2.3.4").allowed);
    }

    #[test]
    fn test_whitelist_bypasses_failed_attempts_and_suspicion() {
        let tracker = IpReputationTracker::default();
        for _ in 0..5 {
            tracker.record_failed_attempt("1.2.3.4");
        }
        for _ in 0..10 {
            tracker.record_suspicious_activity("1.2.3.4", "probe");
        }
        assert!(!tracker.check("1.2.3.4").allowed);

        tracker.add_to_whitelist("1.2.3.4");
        assert!(tracker.check("1.2.3.4").allowed);
    }

    #[test]
    fn test_blacklist_checked_before_whitelist() {
        // 顺序是刻意的：同时在两个名单里的 IP 必须被拒
        let tracker = IpReputationTracker::default();
        tracker.add_to_whitelist("1.2.3.4");
        tracker.add_to_blacklist("1.2.3.4");

        let decision = tracker.check("1.2.3.4");
        assert!(!decision.allowed);
        assert_eq!(decision.reason, "IP is blacklisted");
    }

    #[test]
    fn test_failed_attempt_threshold_with_ban_remaining() {
        let tracker = IpReputationTracker::default();
        let base = Instant::now();

        for i in 0..4 {
            tracker.record_failed_attempt_at("1.2.3.4", base + Duration::from_secs(i * 10));
            assert!(tracker.check_at("1.2.3.4", base + Duration::from_secs(i * 10)).allowed);
        }
        tracker.record_failed_attempt_at("1.2.3.4", base + Duration::from_secs(40));

        let decision = tracker.check_at("1.2.3.4", base + Duration::from_secs(100));
        assert!(!decision.allowed);
        assert_eq!(decision.reason, "Too many failed attempts");
        // 最早一条记录在 t=0，封禁窗口 3600 秒
        assert_eq!(decision.ban_remaining, 3500);
    }

    #[test]
    fn test_failed_attempts_expire_after_ban_window() {
        let tracker = IpReputationTracker::default();
        let base = Instant::now();

        for _ in 0..5 {
            tracker.record_failed_attempt_at("1.2.3.4", base);
        }
        assert!(!tracker.check_at("1.2.3.4", base + Duration::from_secs(10)).allowed);

        let decision = tracker.check_at("1.2.3.4", base + Duration::from_secs(3601));
        assert!(decision.allowed);
    }

    #[test]
    fn test_suspicious_counter_is_monotonic_until_cleared() {
        let tracker = IpReputationTracker::default();
        for _ in 0..10 {
            tracker.record_suspicious_activity("1.2.3.4", "scrape");
        }
        assert!(!tracker.check("1.2.3.4").allowed);
        assert_eq!(
            tracker.check("1.2.3.4").reason,
            "Suspicious activity detected"
        );

        tracker.clear_suspicious("1.2.3.4");
        assert!(tracker.check("1.2.3.4").allowed);
    }

    #[test]
    fn test_clear_failed_attempts() {
        let tracker = IpReputationTracker::default();
        for _ in 0..5 {
            tracker.record_failed_attempt("1.2.3.4");
        }
        assert!(!tracker.check("1.2.3.4").allowed);

        tracker.clear_failed_attempts("1.2.3.4");
        assert!(tracker.check("1.2.3.4").allowed);
        assert_eq!(tracker.failed_attempt_ip_count(), 0);
    }

    #[test]
    fn test_snapshots() {
        let tracker = IpReputationTracker::default();
        tracker.add_to_blacklist("2.2.2.2");
        tracker.add_to_blacklist("1.1.1.1");
        tracker.add_to_whitelist("3.3.3.3");
        tracker.record_suspicious_activity("4.4.4.4", "probe");
        tracker.record_suspicious_activity("4.4.4.4", "probe");

        assert_eq!(tracker.blacklist_snapshot(), vec!["1.1.1.1", "2.2.2.2"]);
        assert_eq!(tracker.whitelist_snapshot(), vec!["3.3.3.3"]);

        let suspicious = tracker.suspicious_snapshot();
        assert_eq!(suspicious.len(), 1);
        assert_eq!(suspicious[0].ip, "4.4.4.4");
        assert_eq!(suspicious[0].count, 2);
    }
}
