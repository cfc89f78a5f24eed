use std::thread;
use std::time::Duration;

use anyhow::Result;

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY_MS: u64 = 500;
const DEFAULT_MAX_DELAY_MS: u64 = 8_000;

/// Capped exponential backoff for outbound HTTP. The policy is configuration
/// passed into the fetch and sink layers; nothing else in the crate sleeps.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn from_env() -> Self {
        let max_attempts = env_u64("SYNC_RETRY_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS as u64)
            .clamp(1, 8) as u32;
        let base_ms = env_u64("SYNC_RETRY_BASE_MS", DEFAULT_BASE_DELAY_MS).clamp(50, 10_000);
        let max_ms = env_u64("SYNC_RETRY_MAX_MS", DEFAULT_MAX_DELAY_MS).clamp(base_ms, 60_000);
        Self {
            max_attempts,
            base_delay: Duration::from_millis(base_ms),
            max_delay: Duration::from_millis(max_ms),
        }
    }

    /// Delay before retrying after the given zero-based failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run a fallible operation under this policy. Intermediate failures go
    /// to stderr; the final failure carries the attempt count.
    pub fn run<T>(&self, label: &str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempt = 0u32;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_attempts {
                        return Err(err.context(format!(
                            "{label}: giving up after {attempt} attempts"
                        )));
                    }
                    eprintln!(
                        "[WARN] {label}: attempt {attempt}/{} failed: {err:#}",
                        self.max_attempts
                    );
                    thread::sleep(self.delay_for(attempt - 1));
                }
            }
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}
