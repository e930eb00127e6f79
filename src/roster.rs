//! Ordered ring of participants
//!
//! A [`Roster`] stores one entry per participant, indexed by its position in the session.
//! Position order is the canonical order: `sid`, `ss` and `sconf` hash per-participant values in
//! roster order, never in the order messages arrived. The roster is circular: the left neighbor of
//! `i` is `i - 1 mod n`, the right neighbor is `i + 1 mod n`.

use std::ops::Index;

use crate::delivery::PartyIndex;
use crate::errors::SetupError;

/// Smallest supported number of participants
///
/// With two participants left and right neighbors coincide, which the decommitment walk doesn't
/// account for.
pub const MIN_PARTIES: u16 = 3;

/// Fixed-size circular collection of per-participant values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster<T> {
    entries: Vec<T>,
}

impl<T> Roster<T> {
    /// Constructs a roster, entry `i` belongs to participant `i`
    ///
    /// Returns error if there are fewer than [`MIN_PARTIES`] entries, or more than
    /// `PartyIndex` can address.
    pub fn new(entries: Vec<T>) -> Result<Self, SetupError> {
        let n = PartyIndex::try_from(entries.len()).map_err(|_| SetupError::TooManyParties {
            n: entries.len(),
        })?;
        if n < MIN_PARTIES {
            return Err(SetupError::TooFewParties { n });
        }
        Ok(Self { entries })
    }

    /// Number of participants
    pub fn len(&self) -> u16 {
        // fits, checked in constructor
        self.entries.len() as u16
    }

    /// Always `false`, a roster has at least [`MIN_PARTIES`] entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns entry of participant `i`, or `None` if `i` is out of range
    pub fn get(&self, i: PartyIndex) -> Option<&T> {
        self.entries.get(usize::from(i))
    }

    /// Returns mutable entry of participant `i`
    pub fn get_mut(&mut self, i: PartyIndex) -> Option<&mut T> {
        self.entries.get_mut(usize::from(i))
    }

    /// Index of the left neighbor of `i`
    pub fn left_of(&self, i: PartyIndex) -> PartyIndex {
        let n = u32::from(self.len());
        ((u32::from(i) % n + n - 1) % n) as PartyIndex
    }

    /// Index of the right neighbor of `i`
    pub fn right_of(&self, i: PartyIndex) -> PartyIndex {
        let n = u32::from(self.len());
        ((u32::from(i) % n + 1) % n) as PartyIndex
    }

    /// Walks the ring leftwards from `from` until `to` is reached
    ///
    /// Yields `from, from - 1, ..., to + 1` (all mod n). `to` itself is not yielded, so walking
    /// from a party to itself yields nothing.
    pub fn walk_left(&self, from: PartyIndex, to: PartyIndex) -> WalkLeft<'_, T> {
        WalkLeft {
            roster: self,
            next: from % self.len(),
            stop: to % self.len(),
        }
    }

    /// Iterates over entries in roster order
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.entries.iter()
    }

    /// Iterates over `(index, entry)` pairs in roster order
    pub fn iter_indexed(&self) -> impl Iterator<Item = (PartyIndex, &T)> + '_ {
        (0..).zip(&self.entries)
    }

    /// Builds a roster of the same size by applying `f` to every entry
    pub fn map<U, F>(&self, f: F) -> Roster<U>
    where
        F: FnMut(&T) -> U,
    {
        Roster {
            entries: self.entries.iter().map(f).collect(),
        }
    }

    /// Returns underlying entries
    pub fn into_vec(self) -> Vec<T> {
        self.entries
    }
}

impl<T> Index<PartyIndex> for Roster<T> {
    type Output = T;

    fn index(&self, i: PartyIndex) -> &T {
        &self.entries[usize::from(i)]
    }
}

impl<'r, T> IntoIterator for &'r Roster<T> {
    type Item = &'r T;
    type IntoIter = std::slice::Iter<'r, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Iterator returned by [`Roster::walk_left`]
pub struct WalkLeft<'r, T> {
    roster: &'r Roster<T>,
    next: PartyIndex,
    stop: PartyIndex,
}

impl<T> Iterator for WalkLeft<'_, T> {
    type Item = PartyIndex;

    fn next(&mut self) -> Option<PartyIndex> {
        if self.next == self.stop {
            return None;
        }
        let current = self.next;
        self.next = self.roster.left_of(current);
        Some(current)
    }
}
