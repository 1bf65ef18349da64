//! `LabelSet` is the collection of label name/value pairs attached to every
//! point. It is kept sorted by label name so that two label sets holding the
//! same pairs compare, hash and order identically regardless of the order the
//! labels were written in the source file.

use std::iter::FromIterator;
use std::slice::Iter;

/// Sorted label name, value collection. Behaves similarly to
/// `std::collections::BTreeMap` but with a specialized implementation for fast
/// searching over the handful of labels a series usually carries.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LabelSet {
    inner: Vec<(String, String)>,
}

impl LabelSet {
    /// Create an empty `LabelSet`.
    pub fn new() -> LabelSet {
        LabelSet::default()
    }

    /// Iterate the pairs in label name order.
    pub fn iter(&self) -> Iter<(String, String)> {
        self.inner.iter()
    }

    /// Get a label value, if the label exists.
    pub fn get(&self, key: &str) -> Option<&str> {
        match self.inner.binary_search_by(|probe| probe.0.as_str().cmp(key)) {
            Ok(idx) => Some(self.inner[idx].1.as_str()),
            Err(_) => None,
        }
    }

    /// Insert a label, returning the previous value if the name was already
    /// present.
    pub fn insert<K, V>(&mut self, key: K, val: V) -> Option<String>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let key = key.into();
        let val = val.into();
        match self.inner.binary_search_by(|probe| probe.0.cmp(&key)) {
            Ok(idx) => {
                let old = ::std::mem::replace(&mut self.inner[idx].1, val);
                Some(old)
            }
            Err(idx) => {
                self.inner.insert(idx, (key, val));
                None
            }
        }
    }

    /// Remove a label. The value will be returned if it existed.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        match self.inner.binary_search_by(|probe| probe.0.as_str().cmp(key)) {
            Ok(idx) => Some(self.inner.remove(idx).1),
            Err(_) => None,
        }
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True if there are no labels.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for LabelSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut labels = LabelSet::new();
        for (k, v) in iter {
            labels.insert(k, v);
        }
        labels
    }
}

impl<'a> IntoIterator for &'a LabelSet {
    type Item = &'a (String, String);
    type IntoIter = Iter<'a, (String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use quickcheck::{QuickCheck, TestResult};

    #[test]
    fn test_insertion_order_irrelevant() {
        fn inner(mut pairs: Vec<(String, String)>) -> TestResult {
            let fwd: LabelSet = pairs.clone().into_iter().collect();
            pairs.reverse();
            let rev: LabelSet = pairs.into_iter().collect();
            // Reversal changes which duplicate wins, so only compare names.
            let fwd_names: Vec<&String> = fwd.iter().map(|kv| &kv.0).collect();
            let rev_names: Vec<&String> = rev.iter().map(|kv| &kv.0).collect();
            assert_eq!(fwd_names, rev_names);
            TestResult::passed()
        }
        QuickCheck::new().quickcheck(inner as fn(Vec<(String, String)>) -> TestResult);
    }

    #[test]
    fn test_always_sorted_and_unique() {
        fn inner(pairs: Vec<(String, String)>) -> TestResult {
            let labels: LabelSet = pairs.into_iter().collect();
            let names: Vec<&String> = labels.iter().map(|kv| &kv.0).collect();
            for w in names.windows(2) {
                assert!(w[0] < w[1]);
            }
            TestResult::passed()
        }
        QuickCheck::new().quickcheck(inner as fn(Vec<(String, String)>) -> TestResult);
    }

    #[test]
    fn test_insert_get_remove() {
        let mut labels = LabelSet::new();
        assert!(labels.is_empty());
        assert_eq!(labels.insert("job", "backup"), None);
        assert_eq!(labels.insert("host", "db1"), None);
        assert_eq!(labels.insert("job", "restore"), Some("backup".to_string()));
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.get("job"), Some("restore"));
        assert_eq!(labels.get("nope"), None);
        assert_eq!(labels.remove("host"), Some("db1".to_string()));
        assert_eq!(labels.remove("host"), None);
        assert_eq!(labels.len(), 1);
    }
}
