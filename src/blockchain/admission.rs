/// Rule a block hash must satisfy before the ledger admits the block.
///
/// Implementations must be pure: the same hash always yields the same answer,
/// otherwise mining and validation disagree.
pub trait Admission {
    fn accepts(&self, hash: &str) -> bool;
}

/// Ad-hoc rules can be plain closures.
impl<F> Admission for F
where
    F: Fn(&str) -> bool,
{
    fn accepts(&self, hash: &str) -> bool {
        self(hash)
    }
}

/// Proof-of-Work difficulty: accepts hashes whose first `n` hex characters are `'0'`.
///
/// Expected mining effort grows as 16^n.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StartsWithZeros(pub usize);

impl StartsWithZeros {
    pub fn new(difficulty: usize) -> Self {
        Self(difficulty)
    }

    pub fn difficulty(&self) -> usize {
        self.0
    }
}

impl Admission for StartsWithZeros {
    fn accepts(&self, hash: &str) -> bool {
        // A hash shorter than the difficulty can never qualify.
        hash.len() >= self.0 && hash.bytes().take(self.0).all(|c| c == b'0')
    }
}

/// Admits every hash. Useful when only linkage matters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcceptAll;

impl Admission for AcceptAll {
    fn accepts(&self, _hash: &str) -> bool {
        true
    }
}
