use std::time::Duration;

/// High-level classification of an error for retry purposes.
///
/// Callers map HTTP status codes, curl errors, or service rejections into
/// these kinds. Only `Transient` is retried; the two fatal kinds halt the
/// whole batch, `Permanent` fails just the current item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network blip, timeout, 5xx or throttling. Retried locally.
    Transient,
    /// Service quota or upload limit reached. Every later item would fail too.
    FatalQuota,
    /// Credentials rejected. Every later item would fail too.
    FatalAuth,
    /// Anything else (bad request, missing media). Not retried.
    Permanent,
}

impl ErrorKind {
    /// True for kinds that must halt the remaining batch.
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::FatalQuota | ErrorKind::FatalAuth)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Transient => "transient",
            ErrorKind::FatalQuota => "fatal-quota",
            ErrorKind::FatalAuth => "fatal-auth",
            ErrorKind::Permanent => "permanent",
        }
    }
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Exponential backoff policy with caps.
///
/// With `base_delay == max_delay` this degenerates to a fixed delay, which is
/// what the segment worker pool uses for requeues.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Base delay for backoff.
    pub base_delay: Duration,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Policy that always waits `delay` between attempts.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
        }
    }

    /// Compute the next backoff delay for a given attempt and error kind.
    ///
    /// `attempt` is 1-based (1 = first attempt). Returns `RetryDecision::NoRetry`
    /// when we should stop retrying.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }

        match kind {
            ErrorKind::Permanent | ErrorKind::FatalQuota | ErrorKind::FatalAuth => {
                RetryDecision::NoRetry
            }
            ErrorKind::Transient => {
                // base * 2^(attempt-1), capped.
                let exp = 1u32 << attempt.saturating_sub(1).min(8);
                let raw = self.base_delay.saturating_mul(exp);
                RetryDecision::RetryAfter(raw.min(self.max_delay))
            }
        }
    }
}
