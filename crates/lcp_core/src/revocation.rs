//! In-memory revocation state.
//!
//! The revocation list is the only mutable shared state in the core: a
//! single writer (the CRL refresh task) replaces per-URL slices while many
//! reader threads run membership queries. Replacements are atomic per URL;
//! a reader sees either the previous slice or the new one, never a mix,
//! and serials merged from other URLs are untouched.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

#[derive(Debug)]
struct UrlEntry {
    this_update: DateTime<Utc>,
    serials: HashSet<Vec<u8>>,
}

/// Thread-safe set of revoked certificate serial numbers, keyed by the
/// distribution point each slice was fetched from.
#[derive(Debug, Default)]
pub struct RevocationList {
    entries: RwLock<HashMap<String, UrlEntry>>,
}

impl RevocationList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `serial` (canonical big-endian) is revoked by any merged CRL.
    pub fn contains_serial(&self, serial: &[u8]) -> bool {
        self.entries
            .read()
            .unwrap()
            .values()
            .any(|entry| entry.serials.contains(serial))
    }

    /// Atomically replace the slice of serials attributed to `url`.
    pub fn replace_from_url(
        &self,
        url: &str,
        serials: Vec<Vec<u8>>,
        this_update: DateTime<Utc>,
    ) {
        let entry = UrlEntry {
            this_update,
            serials: serials.into_iter().collect(),
        };
        self.entries.write().unwrap().insert(url.to_string(), entry);
    }

    /// `thisUpdate` of the most recently merged CRL for `url`, if any.
    pub fn this_update_for(&self, url: &str) -> Option<DateTime<Utc>> {
        self.entries
            .read()
            .unwrap()
            .get(url)
            .map(|entry| entry.this_update)
    }

    /// Whether any CRL has been merged yet.
    pub fn has_any_entries(&self) -> bool {
        !self.entries.read().unwrap().is_empty()
    }

    /// Total number of revoked serials across all sources.
    pub fn revoked_count(&self) -> usize {
        self.entries
            .read()
            .unwrap()
            .values()
            .map(|entry| entry.serials.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 6, day, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_empty_list() {
        let list = RevocationList::new();
        assert!(!list.has_any_entries());
        assert!(!list.contains_serial(&[0x01]));
        assert_eq!(list.revoked_count(), 0);
    }

    #[test]
    fn test_replace_and_lookup() {
        let list = RevocationList::new();
        list.replace_from_url("http://a/crl", vec![vec![0x01], vec![0x02]], at(1));

        assert!(list.contains_serial(&[0x01]));
        assert!(list.contains_serial(&[0x02]));
        assert!(!list.contains_serial(&[0x03]));
        assert_eq!(list.this_update_for("http://a/crl"), Some(at(1)));
        assert_eq!(list.this_update_for("http://b/crl"), None);
    }

    #[test]
    fn test_replace_is_scoped_to_url() {
        let list = RevocationList::new();
        list.replace_from_url("http://a/crl", vec![vec![0x01]], at(1));
        list.replace_from_url("http://b/crl", vec![vec![0x02]], at(1));

        // Replacing one URL's slice leaves the other's serials visible.
        list.replace_from_url("http://a/crl", vec![vec![0x03]], at(2));

        assert!(!list.contains_serial(&[0x01]));
        assert!(list.contains_serial(&[0x02]));
        assert!(list.contains_serial(&[0x03]));
        assert_eq!(list.this_update_for("http://a/crl"), Some(at(2)));
    }

    #[test]
    fn test_concurrent_readers() {
        use std::sync::Arc;
        use std::thread;

        let list = Arc::new(RevocationList::new());
        list.replace_from_url("http://a/crl", vec![vec![0x01]], at(1));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let list = list.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    assert!(list.contains_serial(&[0x01]));
                }
            }));
        }

        for i in 0..100u8 {
            list.replace_from_url("http://b/crl", vec![vec![i]], at(2));
        }

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
