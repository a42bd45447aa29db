//! Exponential backoff with jitter for transient segment failures
//! (`spec.md` §5: base 30s, cap 120s). Jitter is drawn with `rand`, seeded
//! per `(job_id, attempt)` via `StdRng::seed_from_u64` so retries of the
//! same job/attempt pair are reproducible in tests while still being
//! de-correlated across jobs.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

const BASE_SECS: u64 = 30;
const CAP_SECS: u64 = 120;

pub fn backoff_for_attempt(attempt: u32, job_id: Uuid) -> Duration {
    let exponent = attempt.saturating_sub(1).min(4);
    let unjittered = BASE_SECS.saturating_mul(1u64 << exponent).min(CAP_SECS);
    let fraction = jitter_fraction(job_id, attempt);
    Duration::from_secs_f64(unjittered as f64 * fraction)
}

/// Pseudo-random value in `[0.5, 1.0)`, seeded from the job id and attempt
/// number so the same pair always reproduces the same jitter.
fn jitter_fraction(job_id: Uuid, attempt: u32) -> f64 {
    let seed = job_id
        .as_bytes()
        .iter()
        .fold(attempt as u64 ^ 0x9e3779b97f4a7c15, |acc, &b| {
            acc.wrapping_mul(1099511628211).wrapping_add(b as u64)
        });
    let mut rng = StdRng::seed_from_u64(seed);
    rng.gen_range(0.5..1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_never_exceeds_cap() {
        let job_id = Uuid::new_v4();
        for attempt in 1..=10 {
            let d = backoff_for_attempt(attempt, job_id);
            assert!(d <= Duration::from_secs(CAP_SECS));
        }
    }

    #[test]
    fn backoff_grows_with_attempt_before_capping() {
        let job_id = Uuid::from_u128(42);
        let first = backoff_for_attempt(1, job_id);
        let third = backoff_for_attempt(3, job_id);
        assert!(third >= first);
    }

    #[test]
    fn jitter_is_deterministic_for_same_inputs() {
        let job_id = Uuid::from_u128(7);
        assert_eq!(
            backoff_for_attempt(2, job_id),
            backoff_for_attempt(2, job_id)
        );
    }
}
