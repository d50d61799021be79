use std::fmt;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

/// Structural hash of a node, its parameters and (transitively) its operands.
///
/// Computed with `FxHasher`, which is unkeyed, so fingerprints are stable
/// across runs and processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(u64);

impl Fingerprint {
    pub const fn from_raw(raw: u64) -> Self {
        Fingerprint(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }

    /// Hashes any hashable parameter tuple.
    pub fn of<T: Hash + ?Sized>(value: &T) -> Self {
        let mut hasher = FxHasher::default();
        value.hash(&mut hasher);
        Fingerprint(hasher.finish())
    }

    /// Order-sensitive mix of two fingerprints.
    pub fn combine(self, other: Fingerprint) -> Fingerprint {
        let a = self.0;
        let mixed = a
            ^ other
                .0
                .wrapping_add(0x9e37_79b9_7f4a_7c15)
                .wrapping_add(a << 6)
                .wrapping_add(a >> 2);
        Fingerprint(mixed)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}
