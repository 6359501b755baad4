//! Pair generation
//!
//! Produces the full job set for a run: one self-pair per base name plus
//! one pair per unordered 2-combination of distinct base names. The self
//! pass and the combination pass are separate generators composed into one
//! ordered sequence, so the self-vs-cross tolerance policy stays visible at
//! the type level.

use std::fmt;

/// Whether a pair joins a structure with itself or with a distinct one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairKind {
    /// Same structure twice, modelling a homo-dimer.
    SelfPair,
    /// Two distinct structures, modelling a hetero-dimer.
    Cross,
}

/// An unordered pair of base names. Two keys are equal iff their member
/// sets are equal, so (A,B) and (B,A) are the same key.
#[derive(Debug, Clone)]
pub struct PairKey {
    /// First member, in input order.
    pub first: String,
    /// Second member, in input order (equal to `first` for self-pairs).
    pub second: String,
    /// Self or cross tag.
    pub kind: PairKind,
}

impl PairKey {
    /// Self-pair of one base name.
    pub fn self_pair(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            second: name.clone(),
            first: name,
            kind: PairKind::SelfPair,
        }
    }

    /// Cross-pair of two distinct base names, kept in the given order.
    pub fn cross(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
            kind: PairKind::Cross,
        }
    }

    /// The member set as a sorted tuple, the basis for equality.
    fn member_set(&self) -> (&str, &str) {
        if self.first <= self.second {
            (&self.first, &self.second)
        } else {
            (&self.second, &self.first)
        }
    }
}

impl PartialEq for PairKey {
    fn eq(&self, other: &Self) -> bool {
        self.member_set() == other.member_set()
    }
}

impl Eq for PairKey {}

impl std::hash::Hash for PairKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.member_set().hash(state);
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.first, self.second)
    }
}

/// One self-pair per base name, preserving input order.
pub fn self_pairs(base_names: &[String]) -> Vec<PairKey> {
    base_names.iter().map(PairKey::self_pair).collect()
}

/// One pair per 2-combination of distinct base names, taken in input order
/// without repetition and without reversal: [A,B,C] yields (A,B), (A,C),
/// (B,C) and never (B,A).
pub fn cross_pairs(base_names: &[String]) -> Vec<PairKey> {
    let mut pairs = Vec::with_capacity(base_names.len() * (base_names.len().saturating_sub(1)) / 2);
    for (i, first) in base_names.iter().enumerate() {
        for second in &base_names[i + 1..] {
            pairs.push(PairKey::cross(first, second));
        }
    }
    pairs
}

/// The full job set: all self-pairs followed by all cross-pairs. For n
/// distinct inputs this is exactly n + C(n,2) keys with no duplicates in
/// either orientation.
pub fn generate_pairs(base_names: &[String]) -> Vec<PairKey> {
    let mut pairs = self_pairs(base_names);
    pairs.extend(cross_pairs(base_names));
    pairs
}
