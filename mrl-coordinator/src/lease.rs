use std::time::Duration;

use tokio::time::Instant;

pub type WorkerID = String;
pub type LeaseID = u64;

/// A time-bounded claim of one worker on one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    /// Unique for the lifetime of the coordinator; a reassigned task
    /// always gets a fresh one.
    pub id: LeaseID,

    pub worker_id: WorkerID,

    pub started_at: Instant,
}

impl Lease {
    /// Time since the lease was granted.
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }

    /// Whether the holder has had the task for longer than `timeout`.
    pub fn expired(&self, now: Instant, timeout: Duration) -> bool {
        self.elapsed(now) > timeout
    }

    /// Whether a report carrying `worker_id` and `lease_id` speaks for
    /// this lease.
    pub fn held_by(&self, worker_id: &str, lease_id: LeaseID) -> bool {
        self.id == lease_id && self.worker_id == worker_id
    }
}

/// Hands out lease ids. Ids are never reused, so a report naming an old
/// lease can always be told apart from one naming the current lease.
#[derive(Debug)]
pub struct LeaseVendor {
    next_lease_id: LeaseID,
}

impl Default for LeaseVendor {
    fn default() -> Self {
        Self { next_lease_id: 1 }
    }
}

impl LeaseVendor {
    pub fn new() -> Self {
        LeaseVendor::default()
    }

    pub fn issue(&mut self, worker_id: &str, now: Instant) -> Lease {
        let id = self.next_lease_id;
        self.next_lease_id += 1;

        Lease {
            id,
            worker_id: worker_id.to_owned(),
            started_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_never_reused() {
        let mut vendor = LeaseVendor::new();
        let now = Instant::now();
        let a = vendor.issue("w", now);
        let b = vendor.issue("w", now);

        assert_ne!(a.id, b.id);
        assert!(a.held_by("w", a.id));
        assert!(!a.held_by("w", b.id));
        assert!(!a.held_by("other", a.id));
    }

    #[test]
    fn expiry_is_strict() {
        let now = Instant::now();
        let lease = LeaseVendor::new().issue("w", now);
        let timeout = Duration::from_secs(10);

        assert!(!lease.expired(now + timeout, timeout));
        assert!(lease.expired(now + timeout + Duration::from_millis(1), timeout));
        // A clock reading from before the grant is not an expiry.
        assert_eq!(lease.elapsed(now - Duration::from_secs(1)), Duration::ZERO);
    }
}
