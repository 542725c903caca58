pub mod rate_limit;
pub mod reputation;
pub mod validator;

pub use rate_limit::{RateLimitDecision, RateLimiter, RateLimits};
pub use reputation::{IpReputationTracker, ReputationConfig, SecurityDecision};

/// 请求安全状态：信誉追踪器 + 限流器
///
/// 由进程显式持有并通过 AppState 注入各 handler，不使用全局变量。
/// 状态为进程级：多副本部署时各副本独立计数，限流是尽力而为的
/// 近似而非全局保证。
#[derive(Debug, Default)]
pub struct SecurityState {
    pub tracker: IpReputationTracker,
    pub limiter: RateLimiter,
}

impl SecurityState {
    pub fn new() -> Self {
        Self::default()
    }
}
