use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, warn};

use super::ledger::seal;
use super::{Admission, Block, Ledger, Payload};

/// Cloneable, thread-safe handle over a [`Ledger`].
///
/// Every read and the append go through one mutex, so the chain still only
/// grows at its tail. Mining runs with the lock released.
#[derive(Debug)]
pub struct SharedLedger<A> {
    inner: Arc<Mutex<Ledger<A>>>,
    admission: A,
}

impl<A: Clone> Clone for SharedLedger<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            admission: self.admission.clone(),
        }
    }
}

impl<A> SharedLedger<A>
where
    A: Admission + Clone + Send + Sync,
{
    pub fn new(admission: A) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Ledger::new(admission.clone()))),
            admission,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Ledger<A>> {
        self.inner.lock().expect("mutex poisoned")
    }

    pub fn append(&self, block: Block) -> bool {
        self.lock().append(block)
    }

    pub fn last_hash(&self) -> Option<String> {
        self.lock().last_hash()
    }

    pub fn check_valid(&self) -> bool {
        self.lock().check_valid()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the current chain.
    pub fn blocks(&self) -> Vec<Block> {
        self.lock().blocks().to_vec()
    }

    /// Build a block on the current tip, mine it off-lock and append it.
    ///
    /// Returns `false` when another writer moved the tip while this block was
    /// being mined; the stale candidate is dropped.
    pub fn mine_and_append(&self, index: u64, payload: impl Into<Payload>) -> bool {
        // Snapshot the tip, then release the lock before PoW.
        let tip = self.last_hash();
        let mut block = Block::new(index, payload, tip.clone());
        seal(&self.admission, &mut block);

        let mut ledger = self.lock();
        if ledger.last_hash() != tip {
            warn!("stale candidate #{index}: tip moved while mining");
            return false;
        }
        let accepted = ledger.append(block);
        debug!("candidate #{index} accepted={accepted} height={}", ledger.len());
        accepted
    }
}
