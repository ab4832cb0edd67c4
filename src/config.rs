use std::time::Duration;

/// Tunables for the indexed store and, when used, the MVCC transaction layer.
///
/// Every field has a spec-mandated default; override individual fields on the
/// struct before passing it to [`crate::store::TripleStore::with_config`] or
/// [`crate::transaction::TransactionCoordinator::from_config`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Max array-bunch size for subject-pinned bunches before promotion to a hashed bunch.
    pub subject_bunch_threshold: usize,
    /// Max array-bunch size for predicate- or object-pinned bunches before promotion.
    pub predicate_object_bunch_threshold: usize,
    /// `?PO` queries pivot to the predicate bunch when the object bunch exceeds this size
    /// and the predicate bunch is strictly smaller.
    pub secondary_lookup_threshold: usize,
    /// Deadline granted to a WRITE transaction at `begin`.
    pub write_timeout: Duration,
    /// Deadline granted to a READ transaction at `begin`.
    pub read_timeout: Duration,
    /// How often the coordinator scheduler scans for expired transactions.
    pub scheduler_tick_period: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            subject_bunch_threshold: 16,
            predicate_object_bunch_threshold: 32,
            secondary_lookup_threshold: 400,
            write_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(30),
            scheduler_tick_period: Duration::from_millis(50),
        }
    }
}

impl StoreConfig {
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_scheduler_tick_period(mut self, period: Duration) -> Self {
        self.scheduler_tick_period = period;
        self
    }

    pub fn with_secondary_lookup_threshold(mut self, threshold: usize) -> Self {
        self.secondary_lookup_threshold = threshold;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = StoreConfig::default();
        assert_eq!(cfg.subject_bunch_threshold, 16);
        assert_eq!(cfg.predicate_object_bunch_threshold, 32);
        assert_eq!(cfg.secondary_lookup_threshold, 400);
    }

    #[test]
    fn builder_overrides_fields() {
        let cfg = StoreConfig::default()
            .with_write_timeout(Duration::from_millis(400))
            .with_secondary_lookup_threshold(10);
        assert_eq!(cfg.write_timeout, Duration::from_millis(400));
        assert_eq!(cfg.secondary_lookup_threshold, 10);
    }
}
