// src/scrape/retry.rs
use std::fmt::Display;
use std::thread;

use tracing::warn;

use crate::config::RetryPolicy;

/// Final error of a retried operation and how many attempts it took.
#[derive(Debug)]
pub struct Exhausted<E> {
    pub error: E,
    pub attempts: u32,
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts run out. `op` receives the 1-based attempt number.
pub fn retry<T, E, F, R>(policy: &RetryPolicy, what: &str, retryable: R, mut op: F) -> Result<T, Exhausted<E>>
where
    E: Display,
    F: FnMut(u32) -> Result<T, E>,
    R: Fn(&E) -> bool,
{
    let max = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(v) => return Ok(v),
            Err(error) if attempt < max && retryable(&error) => {
                let wait = policy.backoff_after(attempt);
                warn!(attempt, max, wait_ms = wait.as_millis() as u64, %error, "{what} failed; retrying");
                if !wait.is_zero() {
                    thread::sleep(wait);
                }
                attempt += 1;
            }
            Err(error) => return Err(Exhausted { error, attempts: attempt }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_at_max_attempts() {
        let mut calls = 0;
        let res: Result<(), _> = retry(&RetryPolicy::immediate(3), "op", |_: &String| true, |_| {
            calls += 1;
            Err(s!("boom"))
        });
        let ex = res.unwrap_err();
        assert_eq!(ex.attempts, 3);
        assert_eq!(calls, 3);
    }

    #[test]
    fn non_retryable_fails_fast() {
        let mut calls = 0;
        let res: Result<(), _> = retry(&RetryPolicy::immediate(5), "op", |_: &String| false, |_| {
            calls += 1;
            Err(s!("fatal"))
        });
        assert_eq!(res.unwrap_err().attempts, 1);
        assert_eq!(calls, 1);
    }

    #[test]
    fn succeeds_after_transient_failures() {
        let res = retry(&RetryPolicy::immediate(3), "op", |_: &String| true, |n| {
            if n < 3 { Err(s!("flaky")) } else { Ok(n) }
        });
        assert_eq!(res.unwrap(), 3);
    }
}
