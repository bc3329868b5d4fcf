//! Absence tracking for resources that failed to load
//!
//! Remote sources fail routinely (not found, timeouts). Without a record of
//! the failure the coordinator would reissue the same request every frame.
//! Two policies live side by side and the caller picks per failure:
//! temporary records expire after a cooldown, permanent records stay until
//! cleared.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default cooldown for temporary absences
pub const DEFAULT_ABSENCE_COOLDOWN: Duration = Duration::from_secs(60);

/// One recorded failure
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct AbsenceRecord {
    permanent: bool,
    /// None for permanent records
    expires_at: Option<Instant>,
}

/// Suppresses retrieval of keys known to fail
#[derive(Debug)]
pub struct AbsenceTracker {
    records: HashMap<u64, AbsenceRecord>,
    cooldown: Duration,
}

impl AbsenceTracker {
    /// Create a tracker whose temporary records last `cooldown`
    pub fn new(cooldown: Duration) -> Self {
        Self {
            records: HashMap::new(),
            cooldown,
        }
    }

    /// Record a failure now
    pub fn mark_absent(&mut self, key_hash: u64, permanent: bool) {
        self.mark_absent_at(key_hash, permanent, Instant::now());
    }

    /// Record a failure observed at `now`
    ///
    /// A temporary mark never downgrades an existing permanent record.
    pub fn mark_absent_at(&mut self, key_hash: u64, permanent: bool, now: Instant) {
        let record = if permanent {
            AbsenceRecord { permanent: true, expires_at: None }
        } else {
            if self.records.get(&key_hash).is_some_and(|r| r.permanent) {
                return;
            }
            AbsenceRecord { permanent: false, expires_at: Some(now + self.cooldown) }
        };
        self.records.insert(key_hash, record);
    }

    /// True while an unexpired record exists
    pub fn is_absent(&mut self, key_hash: u64) -> bool {
        self.is_absent_at(key_hash, Instant::now())
    }

    /// True while a record exists that has not expired by `now`
    ///
    /// Expired records are dropped.
    pub fn is_absent_at(&mut self, key_hash: u64, now: Instant) -> bool {
        let Some(record) = self.records.get(&key_hash) else {
            return false;
        };
        match record.expires_at {
            Some(expires_at) if now >= expires_at => {
                self.records.remove(&key_hash);
                false
            }
            _ => true,
        }
    }

    /// True if the key has a permanent record
    pub fn is_permanent(&self, key_hash: u64) -> bool {
        self.records.get(&key_hash).is_some_and(|r| r.permanent)
    }

    /// Clear a record after a later successful retrieval
    pub fn unmark_absent(&mut self, key_hash: u64) {
        self.records.remove(&key_hash);
    }

    /// Drop every record
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Drop expired temporary records
    pub fn purge_expired(&mut self, now: Instant) -> usize {
        let before = self.records.len();
        self.records
            .retain(|_, record| record.expires_at.is_none_or(|expires_at| now < expires_at));
        before - self.records.len()
    }

    /// Number of records, expired ones included until they are observed
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

impl Default for AbsenceTracker {
    fn default() -> Self {
        Self::new(DEFAULT_ABSENCE_COOLDOWN)
    }
}
