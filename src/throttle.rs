//! Request throttling
//!
//! Dispatch asks the resource's throttle before handling a request and
//! records the access afterwards, keyed by the identifier the
//! authentication plugin derived. Throttled requests answer 429.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Per-resource rate limiting seam
pub trait Throttle: Send + Sync {
    fn should_be_throttled(&self, identifier: &str) -> bool;
    fn accessed(&self, identifier: &str);
}

/// Never throttles, records nothing; the default
pub struct NoThrottle;

impl Throttle for NoThrottle {
    fn should_be_throttled(&self, _identifier: &str) -> bool {
        false
    }

    fn accessed(&self, _identifier: &str) {}
}

/// Sliding-window throttle over an in-process map
///
/// A request is throttled once `throttle_at` accesses happened inside the
/// last `time_frame` seconds. Accesses older than `expiration` are pruned so
/// idle identifiers do not accumulate forever.
pub struct MemoryThrottle {
    throttle_at: usize,
    time_frame: u64,
    expiration: u64,
    accesses: Mutex<HashMap<String, Vec<u64>>>,
}

impl MemoryThrottle {
    #[must_use]
    pub fn new(throttle_at: usize, time_frame: u64, expiration: u64) -> Self {
        Self {
            throttle_at,
            time_frame,
            expiration,
            accesses: Mutex::new(HashMap::new()),
        }
    }

    fn now() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs())
    }

    fn throttled_at(&self, identifier: &str, now: u64) -> bool {
        let key = sanitize_identifier(identifier);
        let mut accesses = self.accesses.lock().unwrap();
        let entry = accesses.entry(key).or_default();
        entry.retain(|&stamp| stamp + self.expiration > now);

        let window_start = now.saturating_sub(self.time_frame);
        let recent = entry.iter().filter(|&&stamp| stamp >= window_start).count();
        recent >= self.throttle_at
    }

    fn accessed_at(&self, identifier: &str, now: u64) {
        let key = sanitize_identifier(identifier);
        let mut accesses = self.accesses.lock().unwrap();
        accesses.entry(key).or_default().push(now);
    }
}

impl Default for MemoryThrottle {
    /// 150 requests per hour, accesses remembered for a week
    fn default() -> Self {
        Self::new(150, 3600, 604_800)
    }
}

impl Throttle for MemoryThrottle {
    fn should_be_throttled(&self, identifier: &str) -> bool {
        self.throttled_at(identifier, Self::now())
    }

    fn accessed(&self, identifier: &str) {
        self.accessed_at(identifier, Self::now());
    }
}

/// Strip identifier characters outside `[A-Za-z0-9_.-]`
fn sanitize_identifier(identifier: &str) -> String {
    identifier
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect()
}
