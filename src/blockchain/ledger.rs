use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};
use thiserror::Error;

use super::{Admission, Block, StartsWithZeros};

/// Why [`Ledger::try_append`] refused a block. The block is handed back.
#[derive(Debug, Error)]
pub enum AppendError {
    #[error("block hash {hash} is not admitted")]
    NotAdmitted { hash: String, block: Box<Block> },
    #[error("block links to {found:?}, tip is {expected}")]
    BrokenLink {
        expected: String,
        found: Option<String>,
        block: Box<Block>,
    },
}

impl AppendError {
    pub fn into_block(self) -> Block {
        match self {
            AppendError::NotAdmitted { block, .. } | AppendError::BrokenLink { block, .. } => *block,
        }
    }
}

/// First violation found by [`Ledger::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("block at position {position} is not admitted")]
    NotAdmitted { position: usize },
    #[error("block at position {position} does not link to its predecessor")]
    BrokenLink { position: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MineError {
    #[error("no admitted nonce within {attempts} attempts")]
    Exhausted { attempts: u64 },
    #[error("mining cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },
}

/// Bounds for [`Ledger::mine_with`]. The default is unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct MineLimit<'a> {
    pub max_attempts: Option<u64>,
    pub cancel: Option<&'a AtomicBool>,
}

impl<'a> MineLimit<'a> {
    pub fn attempts(max_attempts: u64) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            cancel: None,
        }
    }

    pub fn cancel_on(mut self, flag: &'a AtomicBool) -> Self {
        self.cancel = Some(flag);
        self
    }
}

/// Unbounded nonce search shared by [`Ledger::mine`] and [`super::SharedLedger`].
pub(crate) fn seal<A: Admission + ?Sized>(admission: &A, block: &mut Block) {
    while !admission.accepts(&block.hash()) {
        block.bump_nonce();
    }
    debug!("sealed block #{} (nonce={})", block.index(), block.nonce());
}

/// In-memory append-only chain gated by an admission rule.
#[derive(Debug)]
pub struct Ledger<A = StartsWithZeros> {
    chain: Vec<Block>,
    admission: A,
}

impl<A: Admission> Ledger<A> {
    /// Create an empty ledger. The first appended block becomes genesis.
    pub fn new(admission: A) -> Self {
        Self {
            chain: Vec::new(),
            admission,
        }
    }

    pub fn admission(&self) -> &A {
        &self.admission
    }

    /// Search nonces from the block's current value until its hash is admitted.
    ///
    /// There is no iteration cap: with a rule that never accepts, this never
    /// returns. Use [`Ledger::mine_with`] when the caller needs a bound.
    pub fn mine(&self, block: &mut Block) {
        seal(&self.admission, block);
    }

    /// Consuming form of [`Ledger::mine`].
    pub fn mined(&self, mut block: Block) -> Block {
        self.mine(&mut block);
        block
    }

    /// Bounded mining. Returns how many hashes were evaluated.
    ///
    /// On error the block keeps the last nonce tried, so a later call resumes
    /// the search where this one stopped.
    pub fn mine_with(&self, block: &mut Block, limit: MineLimit<'_>) -> Result<u64, MineError> {
        let mut attempts: u64 = 0;
        loop {
            if limit.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(MineError::Exhausted { attempts });
            }
            if limit.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
                return Err(MineError::Cancelled { attempts });
            }
            attempts += 1;
            if self.admission.accepts(&block.hash()) {
                debug!(
                    "sealed block #{} (nonce={}, attempts={})",
                    block.index(),
                    block.nonce(),
                    attempts
                );
                return Ok(attempts);
            }
            block.bump_nonce();
        }
    }

    /// Append `block` at the tail, reporting why it was refused.
    ///
    /// An empty ledger takes any block as genesis. Otherwise the block must be
    /// admitted and its `previous_hash` must equal the current tip hash.
    pub fn try_append(&mut self, block: Block) -> Result<(), AppendError> {
        let Some(tip) = self.chain.last() else {
            info!("genesis block #{} appended", block.index());
            self.chain.push(block);
            return Ok(());
        };

        let hash = block.hash();
        if !self.admission.accepts(&hash) {
            return Err(AppendError::NotAdmitted {
                hash,
                block: Box::new(block),
            });
        }
        let expected = tip.hash();
        if block.previous_hash() != Some(expected.as_str()) {
            return Err(AppendError::BrokenLink {
                expected,
                found: block.previous_hash().map(str::to_owned),
                block: Box::new(block),
            });
        }

        info!("block #{} appended (hash={})", block.index(), hash);
        self.chain.push(block);
        Ok(())
    }

    /// Append `block`; `false` means it was refused and the chain is unchanged.
    pub fn append(&mut self, block: Block) -> bool {
        match self.try_append(block) {
            Ok(()) => true,
            Err(e) => {
                warn!("append rejected: {e}");
                false
            }
        }
    }

    /// Hash of the tip, recomputed on each call. `None` for an empty ledger.
    pub fn last_hash(&self) -> Option<String> {
        self.chain.last().map(Block::hash)
    }

    /// Re-derive every hash and report the first linkage or admission violation.
    pub fn validate(&self) -> Result<(), ChainError> {
        let mut previous: Option<String> = None;
        for (position, block) in self.chain.iter().enumerate() {
            let hash = block.hash();
            if let Some(expected) = &previous {
                if block.previous_hash() != Some(expected.as_str()) {
                    return Err(ChainError::BrokenLink { position });
                }
            }
            if !self.admission.accepts(&hash) {
                return Err(ChainError::NotAdmitted { position });
            }
            previous = Some(hash);
        }
        Ok(())
    }

    /// `true` if the whole chain links up and every block is admitted.
    pub fn check_valid(&self) -> bool {
        match self.validate() {
            Ok(()) => true,
            Err(e) => {
                warn!("chain invalid: {e}");
                false
            }
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.chain
    }

    pub fn last_block(&self) -> Option<&Block> {
        self.chain.last()
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use super::{AppendError, ChainError, Ledger, MineError, MineLimit};
    use crate::blockchain::{AcceptAll, Admission, Block, StartsWithZeros};

    fn two_block_ledger() -> Ledger {
        let mut ledger = Ledger::new(StartsWithZeros(2));
        let genesis = ledger.mined(Block::new(0, "Hello world", ledger.last_hash()));
        assert!(ledger.append(genesis));
        let second = ledger.mined(Block::new(1, "second", ledger.last_hash()));
        assert!(ledger.append(second));
        ledger
    }

    #[test]
    fn mining_converges() {
        let ledger = Ledger::new(StartsWithZeros(2));
        let mut b = Block::new(0, "x", None);
        ledger.mine(&mut b);
        assert!(b.hash().starts_with("00"));
        assert!(ledger.admission().accepts(&b.hash()));
    }

    #[test]
    fn mining_already_admitted_block_keeps_nonce() {
        let ledger = Ledger::new(AcceptAll);
        let mut b = Block::new(0, "x", None);
        ledger.mine(&mut b);
        assert_eq!(b.nonce(), 0);
    }

    #[test]
    fn empty_ledger() {
        let ledger = Ledger::new(StartsWithZeros(1));
        assert!(ledger.is_empty());
        assert_eq!(ledger.last_hash(), None);
        assert!(ledger.last_block().is_none());
        assert!(ledger.check_valid());
    }

    #[test]
    fn genesis_skips_checks() {
        let mut ledger = Ledger::new(|_: &str| false);
        let b = Block::new(5, "unmined", Some("nonsense".into()));
        assert!(ledger.append(b));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn append_extends_tail() {
        let ledger = two_block_ledger();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.blocks()[1].payload().as_value(), "second");
        assert_eq!(ledger.last_hash(), Some(ledger.blocks()[1].hash()));
        assert!(ledger.check_valid());
    }

    #[test]
    fn broken_link_is_rejected_without_change() {
        let mut ledger = two_block_ledger();
        let before = ledger.blocks().to_vec();
        let orphan = ledger.mined(Block::new(2, "orphan", Some("not-the-tip".into())));
        match ledger.try_append(orphan) {
            Err(AppendError::BrokenLink { expected, found, .. }) => {
                assert_eq!(Some(expected), ledger.last_hash());
                assert_eq!(found.as_deref(), Some("not-the-tip"));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(ledger.blocks(), before.as_slice());
    }

    #[test]
    fn unadmitted_block_is_rejected() {
        let mut ledger = Ledger::new(|hash: &str| hash.starts_with('0'));
        let genesis = ledger.mined(Block::new(0, "g", None));
        assert!(ledger.append(genesis));

        // Walk nonces until the hash is definitely not admitted.
        let mut b = Block::new(1, "late", ledger.last_hash());
        while b.hash().starts_with('0') {
            b.bump_nonce();
        }
        let err = ledger.try_append(b.clone()).unwrap_err();
        assert!(matches!(err, AppendError::NotAdmitted { .. }));
        assert_eq!(err.into_block(), b);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn tampered_payload_is_detected() {
        let mut ledger = two_block_ledger();
        ledger.chain[1].payload = "flipped".into();
        assert!(!ledger.check_valid());
    }

    #[test]
    fn tampered_link_is_detected() {
        let mut ledger = two_block_ledger();
        ledger.chain[1].previous_hash = Some("forged".into());
        assert_eq!(ledger.validate(), Err(ChainError::BrokenLink { position: 1 }));
    }

    #[test]
    fn tampered_nonce_is_detected() {
        let mut ledger = Ledger::new(|hash: &str| hash.starts_with('0'));
        let genesis = ledger.mined(Block::new(0, "g", None));
        assert!(ledger.append(genesis));
        // Advance the stored nonce to the next non-admitted value.
        loop {
            ledger.chain[0].bump_nonce();
            if !ledger.chain[0].hash().starts_with('0') {
                break;
            }
        }
        assert_eq!(ledger.validate(), Err(ChainError::NotAdmitted { position: 0 }));
    }

    #[test]
    fn tampering_genesis_breaks_successor_link() {
        let mut ledger = Ledger::new(AcceptAll);
        assert!(ledger.append(Block::new(0, "g", None)));
        let next = Block::new(1, "n", ledger.last_hash());
        assert!(ledger.append(next));
        ledger.chain[0].payload = "rewritten".into();
        assert_eq!(ledger.validate(), Err(ChainError::BrokenLink { position: 1 }));
    }

    #[test]
    fn unmined_genesis_is_appended_but_invalid() {
        // Genesis skips admission on append, but validation still checks it.
        let mut ledger = Ledger::new(StartsWithZeros(4));
        let mut genesis = Block::new(0, "unmined", None);
        while genesis.hash().starts_with('0') {
            genesis.bump_nonce();
        }
        assert!(ledger.append(genesis));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.validate(), Err(ChainError::NotAdmitted { position: 0 }));
        assert!(!ledger.check_valid());
    }

    #[test]
    fn indices_are_not_checked() {
        // Index is caller metadata only: duplicates and gaps are accepted.
        let mut ledger = Ledger::new(AcceptAll);
        assert!(ledger.append(Block::new(9, "a", None)));
        assert!(ledger.append(Block::new(9, "b", ledger.last_hash())));
        assert!(ledger.append(Block::new(2, "c", ledger.last_hash())));
        assert!(ledger.check_valid());
    }

    #[test]
    fn bounded_mining_gives_up() {
        let ledger = Ledger::new(|_: &str| false);
        let mut b = Block::new(0, "x", None);
        assert_eq!(
            ledger.mine_with(&mut b, MineLimit::attempts(10)),
            Err(MineError::Exhausted { attempts: 10 })
        );
        assert_eq!(b.nonce(), 10);
    }

    #[test]
    fn bounded_mining_honours_cancel() {
        let ledger = Ledger::new(|_: &str| false);
        let cancel = AtomicBool::new(true);
        let mut b = Block::new(0, "x", None);
        assert_eq!(
            ledger.mine_with(&mut b, MineLimit::default().cancel_on(&cancel)),
            Err(MineError::Cancelled { attempts: 0 })
        );
    }

    #[test]
    fn bounded_mining_succeeds() {
        let ledger = Ledger::new(StartsWithZeros(1));
        let mut b = Block::new(0, "x", None);
        let attempts = ledger.mine_with(&mut b, MineLimit::default()).unwrap();
        assert_eq!(attempts, b.nonce() + 1);
        assert!(b.hash().starts_with('0'));
    }
}
