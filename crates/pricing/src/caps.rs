//! Caps-only cache.
//!
//! Some sheet rows carry a complete pair of cap blocks but no tier or loan
//! bounds. They never become candidates on their own, but their caps are kept
//! here under (level, FICO) so the merge can fill gaps in sibling rows.

use std::collections::BTreeMap;

use crate::model::{Caps, CapsKey};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedCaps {
    pub purchase: Caps,
    pub refi: Caps,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapsCache {
    entries: BTreeMap<CapsKey, CachedCaps>,
}

impl CapsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store both blocks for `key`. Later rows replace earlier ones.
    pub fn insert(&mut self, key: CapsKey, purchase: Caps, refi: Caps) {
        self.entries.insert(key, CachedCaps { purchase, refi });
    }

    pub fn get(&self, key: &CapsKey) -> Option<&CachedCaps> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CapsKey, &CachedCaps)> {
        self.entries.iter()
    }

    /// Fill absent caps in `purchase` and `refi` from the entry for `key`.
    /// Returns the number of individual caps filled.
    pub fn backfill(&self, key: &CapsKey, purchase: &mut Caps, refi: &mut Caps) -> usize {
        match self.entries.get(key) {
            Some(cached) => purchase.backfill_from(&cached.purchase) + refi.backfill_from(&cached.refi),
            None => 0,
        }
    }
}
