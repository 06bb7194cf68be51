use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

/// Minimum gap between metered calls of one org. Process-local: each
/// instance keeps its own map.
#[derive(Debug)]
pub struct OrgRateLimiter {
    min_gap: Duration,
    last_call: DashMap<Uuid, Instant>,
}

impl OrgRateLimiter {
    pub fn new(min_gap: Duration) -> Self {
        Self {
            min_gap,
            last_call: DashMap::new(),
        }
    }

    /// Records the call, or returns whole seconds until the next one is allowed.
    pub fn check(&self, org_id: Uuid) -> Result<(), u64> {
        self.check_at(org_id, Instant::now())
    }

    pub fn check_at(&self, org_id: Uuid, now: Instant) -> Result<(), u64> {
        match self.last_call.entry(org_id) {
            Entry::Occupied(mut entry) => {
                let elapsed = now.saturating_duration_since(*entry.get());
                if elapsed < self.min_gap {
                    let wait = self.min_gap - elapsed;
                    return Err(ceil_secs(wait));
                }
                entry.insert(now);
                Ok(())
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                Ok(())
            }
        }
    }

    /// Drops orgs whose last call is older than the gap; they would pass
    /// `check` anyway.
    pub fn retain_recent(&self) {
        self.retain_recent_at(Instant::now());
    }

    pub fn retain_recent_at(&self, now: Instant) {
        self.last_call
            .retain(|_, last| now.saturating_duration_since(*last) < self.min_gap);
    }

    pub fn len(&self) -> usize {
        self.last_call.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_call.is_empty()
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
