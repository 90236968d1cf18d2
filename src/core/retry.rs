//! 重试策略
//!
//! BackoffPolicy：动作执行失败时指数退避（delay = initial * factor^(attempt-1)，上限 max_delay）。
//! PerturbationPolicy：推理输出解析失败时提高采样温度重试（base + boost，上限 max_temperature）。

use std::time::Duration;

/// 指数退避策略
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// 总尝试次数（含首次）
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub factor: f64,
    pub max_delay: Duration,
}

impl BackoffPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, factor: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            factor,
            max_delay: Duration::from_secs(30),
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// 不重试
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO, 1.0)
    }

    /// 第 attempt 次（从 1 开始）失败后的等待时间
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.factor.powi(exp);
        Duration::from_secs_f64(secs).min(self.max_delay)
    }
}

impl Default for BackoffPolicy {
    /// 首次调用 + 3 次重试，1s 起步，每次翻倍
    fn default() -> Self {
        Self::new(4, Duration::from_secs(1), 2.0)
    }
}

/// 温度扰动策略
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerturbationPolicy {
    /// 解析失败后最多重试次数
    pub max_retries: u32,
    pub temperature_boost: f32,
    pub max_temperature: f32,
}

impl PerturbationPolicy {
    pub fn perturbed(&self, base: f32) -> f32 {
        (base + self.temperature_boost).min(self.max_temperature)
    }
}

impl Default for PerturbationPolicy {
    fn default() -> Self {
        Self {
            max_retries: 1,
            temperature_boost: 0.3,
            max_temperature: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_delays_grow_exponentially() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
    }

    #[test]
    fn test_backoff_delay_is_capped() {
        let policy = BackoffPolicy::new(10, Duration::from_secs(1), 10.0)
            .with_max_delay(Duration::from_secs(5));
        assert_eq!(policy.delay_for(4), Duration::from_secs(5));
    }

    #[test]
    fn test_backoff_none_has_single_attempt() {
        assert_eq!(BackoffPolicy::none().max_attempts, 1);
        assert_eq!(BackoffPolicy::new(0, Duration::ZERO, 2.0).max_attempts, 1);
    }

    #[test]
    fn test_perturbation_clamped() {
        let policy = PerturbationPolicy::default();
        assert!((policy.perturbed(0.2) - 0.5).abs() < f32::EPSILON);
        assert_eq!(policy.perturbed(0.9), 1.0);
    }
}
