use std::time::Duration;

use rand::{thread_rng, Rng};
use reqwest::StatusCode;

use crate::config::RetryPolicy;

pub fn backoff(policy: &RetryPolicy, attempt: usize) -> Duration {
    let jitter = if policy.max_jitter_ms == 0 {
        0
    } else {
        thread_rng().gen_range(0..policy.max_jitter_ms)
    };
    let factor = 2_u32.saturating_pow(attempt as u32);
    policy.base_delay.saturating_mul(factor) + Duration::from_millis(jitter)
}

/// Whether zero-based `attempt` leaves another one to wait for.
pub fn has_next_attempt(policy: &RetryPolicy, attempt: usize) -> bool {
    attempt + 1 < policy.max_attempts
}

pub fn sleep_before_retry(policy: &RetryPolicy, attempt: usize) {
    let delay = backoff(policy, attempt);
    if !delay.is_zero() {
        std::thread::sleep(delay);
    }
}

pub fn should_retry_http(status: StatusCode) -> bool {
    // 408/429/5xx typically clear up on their own
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}
