//! Per-run duplicate suppression.

use std::collections::HashSet;

/// Subscribers already considered by one run of one job.
#[derive(Debug, Default)]
pub struct DedupSet {
    seen: HashSet<String>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `msisdn` as seen. Returns `false` if it already was.
    pub fn first_seen(&mut self, msisdn: &str) -> bool {
        if self.seen.contains(msisdn) {
            return false;
        }
        self.seen.insert(msisdn.to_string())
    }

    /// Distinct subscribers seen so far.
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeats_are_reported() {
        let mut set = DedupSet::new();
        assert!(set.first_seen("9230000001"));
        assert!(!set.first_seen("9230000001"));
        assert!(set.first_seen("9230000002"));
        assert_eq!(set.seen_count(), 2);
    }
}
