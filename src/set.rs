//! Sets of serial numbers.
//!
//! This module provides [`SerialSet`], a deduplicating collection of
//! canonical serial numbers that only ever grows.

use std::collections::hash_set;
use std::collections::HashSet;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use crate::crl::CertificateList;
use crate::serial::Serial;


//------------ SerialSet -----------------------------------------------------

/// A set of serial numbers.
///
/// Serials are keyed by their identity, i.e., their canonical octets. Adding
/// a serial that is already present leaves the set untouched and the value
/// inserted first is kept. There is no way to remove a serial again: the
/// set grows monotonically. Callers that need eviction have to build it on
/// top, e.g., by starting over with a new set.
///
/// The order in which serials are returned by [`list`](Self::list) and
/// [`iter`](Self::iter) is unspecified and may change between calls that
/// modify the set.
///
/// # Concurrency
///
/// The set does not do any locking itself. It can be moved to or shared
/// between threads like any plain value, but adding serials needs a
/// mutable reference. Workers processing CRLs in parallel should either
/// share one set behind a mutex or collect into a set of their own each
/// and combine the results afterwards via [`merge`](Self::merge).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SerialSet {
    serials: HashSet<Serial>,
}

impl SerialSet {
    /// Creates a new, empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new, empty set with room for `capacity` serials.
    pub fn with_capacity(capacity: usize) -> Self {
        SerialSet { serials: HashSet::with_capacity(capacity) }
    }

    /// Adds a serial to the set.
    ///
    /// Returns `true` if the serial was new. If an equal serial is already
    /// present, returns `false` and leaves the set as it is.
    pub fn add(&mut self, serial: Serial) -> bool {
        self.serials.insert(serial)
    }

    /// Returns whether the set contains the given serial.
    pub fn contains(&self, serial: &Serial) -> bool {
        self.serials.contains(serial)
    }

    /// Returns all serials in the set.
    ///
    /// Every distinct serial appears exactly once. The order is
    /// unspecified.
    pub fn list(&self) -> Vec<Serial> {
        self.serials.iter().cloned().collect()
    }

    /// Returns an iterator over all serials in the set.
    pub fn iter(&self) -> Iter {
        Iter(self.serials.iter())
    }

    /// Returns the number of distinct serials in the set.
    pub fn len(&self) -> usize {
        self.serials.len()
    }

    /// Returns whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.serials.is_empty()
    }

    /// Adds the serials of all entries of a revocation list.
    ///
    /// Returns the number of serials that were new.
    pub fn add_revoked(&mut self, crl: &CertificateList) -> usize {
        self.serials.reserve(crl.len());
        crl.serials().filter(|&serial| self.add(serial.clone())).count()
    }

    /// Adds all serials of another set.
    ///
    /// Returns the number of serials that were new.
    pub fn merge(&mut self, other: SerialSet) -> usize {
        let mut res = 0;
        for serial in other.serials {
            if self.add(serial) {
                res += 1
            }
        }
        res
    }
}


//--- Extend and FromIterator

impl Extend<Serial> for SerialSet {
    fn extend<I: IntoIterator<Item = Serial>>(&mut self, iter: I) {
        for serial in iter {
            self.add(serial);
        }
    }
}

impl FromIterator<Serial> for SerialSet {
    fn from_iter<I: IntoIterator<Item = Serial>>(iter: I) -> Self {
        let mut res = SerialSet::new();
        res.extend(iter);
        res
    }
}


//--- IntoIterator

impl<'a> IntoIterator for &'a SerialSet {
    type Item = &'a Serial;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}


//--- Serialize and Deserialize

impl Serialize for SerialSet {
    fn serialize<S: Serializer>(
        &self, serializer: S
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.serials.iter())
    }
}

impl<'de> Deserialize<'de> for SerialSet {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D
    ) -> Result<Self, D::Error> {
        Vec::<Serial>::deserialize(deserializer).map(|list| {
            list.into_iter().collect()
        })
    }
}


//------------ Iter ----------------------------------------------------------

/// An iterator over the serials in a set.
#[derive(Clone, Debug)]
pub struct Iter<'a>(hash_set::Iter<'a, Serial>);

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Serial;

    fn next(&mut self) -> Option<Self::Item> {
        self.0.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<'a> ExactSizeIterator for Iter<'a> { }


//============ Tests =========================================================
