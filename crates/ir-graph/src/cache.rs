//! Reuse of structurally identical nodes.
//!
//! The cache is keyed by fingerprint and holds only weak references, so it
//! never keeps a graph alive. A fingerprint match is confirmed with a full
//! structural comparison before a node is reused.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, Weak};

use rustc_hash::FxHashMap;

use crate::fingerprint::Fingerprint;
use crate::node::{Node, NodePtr};

#[derive(Debug, Default)]
pub struct NodeCache {
    entries: RwLock<FxHashMap<Fingerprint, Vec<Weak<Node>>>>,
    hits: AtomicUsize,
}

/// Same kind, parameters, output types and operand values.
///
/// Operands are compared by identity, so graphs must be interned bottom-up
/// for equal subtrees to be shared.
fn structurally_equal(a: &Node, b: &Node) -> bool {
    a.fingerprint() == b.fingerprint()
        && a.kind() == b.kind()
        && a.operation().fingerprint_params() == b.operation().fingerprint_params()
        && a.operation().describe_params() == b.operation().describe_params()
        && a.shapes() == b.shapes()
        && a.operands() == b.operands()
}

impl NodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a live node structurally equal to `node` if one was interned
    /// before, otherwise records `node` and returns it.
    pub fn intern(&self, node: NodePtr) -> NodePtr {
        let key = node.fingerprint();
        if let Some(existing) = self.find(key, &node) {
            return existing;
        }

        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let bucket = entries.entry(key).or_default();
        // Another thread may have interned an equal node since the lookup.
        if let Some(existing) = bucket
            .iter()
            .filter_map(Weak::upgrade)
            .find(|candidate| structurally_equal(candidate, &node))
        {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return existing;
        }
        bucket.retain(|weak| weak.strong_count() > 0);
        bucket.push(Arc::downgrade(&node));
        node
    }

    fn find(&self, key: Fingerprint, node: &Node) -> Option<NodePtr> {
        let entries = match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let found = entries
            .get(&key)?
            .iter()
            .filter_map(Weak::upgrade)
            .find(|candidate| structurally_equal(candidate, node))?;
        self.hits.fetch_add(1, Ordering::Relaxed);
        log::trace!("reused {} for fingerprint {}", found.id(), key);
        Some(found)
    }

    /// Number of live cached nodes.
    pub fn len(&self) -> usize {
        let entries = match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries
            .values()
            .flatten()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops entries whose nodes have been freed.
    pub fn purge(&self) {
        let mut entries = match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let before = entries.len();
        entries.retain(|_, bucket| {
            bucket.retain(|weak| weak.strong_count() > 0);
            !bucket.is_empty()
        });
        log::debug!("purged node cache: {} -> {} fingerprints", before, entries.len());
    }

    /// Number of `intern` calls answered with an existing node.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }
}
