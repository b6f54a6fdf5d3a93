// 分片重试策略

use crate::backend::UploadErrorKind;
use crate::config::UploadConfig;
use std::time::Duration;

/// 默认单个分片最多尝试次数
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// 初始退避延迟（毫秒）
const INITIAL_BACKOFF_MS: u64 = 100;

/// 最大退避延迟（毫秒）
const MAX_BACKOFF_MS: u64 = 5000;

/// 限流时的最少等待时间（毫秒）
const RATE_LIMIT_BACKOFF_MS: u64 = 10000;

/// 计算指数退避延迟
///
/// # 延迟序列
/// - retry_count=0: 100ms
/// - retry_count=1: 200ms
/// - retry_count=2: 400ms
/// - 最大: 5000ms，限流时至少 10000ms
pub fn calculate_backoff_delay(retry_count: u32, error_kind: UploadErrorKind) -> u64 {
    let base_delay = INITIAL_BACKOFF_MS.saturating_mul(2u64.saturating_pow(retry_count));
    let delay = base_delay.min(MAX_BACKOFF_MS);

    if error_kind == UploadErrorKind::RateLimited {
        delay.max(RATE_LIMIT_BACKOFF_MS)
    } else {
        delay
    }
}

/// 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 单个分片最多尝试次数（含首次）
    pub max_attempts: u32,
    /// 重试前是否退避
    pub backoff: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: false,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &UploadConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            backoff: config.backoff_enabled,
        }
    }

    /// 第 `attempt` 次失败后、下一次重试前的等待时间
    ///
    /// 未启用退避时立即重试
    pub fn delay_before_retry(&self, attempt: u32, kind: UploadErrorKind) -> Option<Duration> {
        if !self.backoff {
            return None;
        }
        let retry_count = attempt.saturating_sub(1);
        Some(Duration::from_millis(calculate_backoff_delay(
            retry_count,
            kind,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_sequence() {
        assert_eq!(calculate_backoff_delay(0, UploadErrorKind::Network), 100);
        assert_eq!(calculate_backoff_delay(1, UploadErrorKind::Network), 200);
        assert_eq!(calculate_backoff_delay(2, UploadErrorKind::Network), 400);
        assert_eq!(calculate_backoff_delay(10, UploadErrorKind::Network), 5000);
        assert_eq!(calculate_backoff_delay(100, UploadErrorKind::Timeout), 5000);
    }

    #[test]
    fn test_rate_limited_waits_longer() {
        assert_eq!(
            calculate_backoff_delay(0, UploadErrorKind::RateLimited),
            10000
        );
    }

    #[test]
    fn test_default_policy_retries_immediately() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert!(policy
            .delay_before_retry(1, UploadErrorKind::ServerError)
            .is_none());
    }

    #[test]
    fn test_backoff_policy() {
        let config = UploadConfig {
            backoff_enabled: true,
            max_attempts: 5,
            ..UploadConfig::default()
        };
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(
            policy.delay_before_retry(1, UploadErrorKind::Network),
            Some(Duration::from_millis(100))
        );
        assert_eq!(
            policy.delay_before_retry(2, UploadErrorKind::Network),
            Some(Duration::from_millis(200))
        );
    }
}
