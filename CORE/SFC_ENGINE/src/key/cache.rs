// ═══════════════════════════════════════════════════════════════════════════════
// FILE: cache.rs | CORE/SFC_ENGINE/src/key/cache.rs
// PURPOSE: Bounded, thread-safe memoization of tetrahedral type-chain builds
// MODIFIED: 2026-07-28
// ═══════════════════════════════════════════════════════════════════════════════
//
// Rebuilding a TM key from (coords, level, type) walks the parent chain once
// per level. Hot paths (encode, neighbor candidate enumeration, region
// planning) revisit the same cells constantly, so completed chains are
// memoized here. The cache key includes every input that determines the
// chain; entries never change once written, so eviction is free to drop
// anything.
//
// Engines own a cache handle; standalone key users share a process-wide
// default.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use dashmap::DashMap;

/// Hit/miss counters for diagnostics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyCacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Bounded concurrent memo of (anchor, level, type) → TM bit chain
pub struct KeyCache {
    chains: DashMap<([u32; 3], u8, u8), u128>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl KeyCache {
    pub const DEFAULT_CAPACITY: usize = 64 * 1024;

    pub fn new(capacity: usize) -> Self {
        Self {
            chains: DashMap::new(),
            capacity: capacity.max(1),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Shared process-wide cache used when no engine-owned handle is in play
    pub fn process_default() -> &'static KeyCache {
        static DEFAULT: OnceLock<KeyCache> = OnceLock::new();
        DEFAULT.get_or_init(|| KeyCache::new(Self::DEFAULT_CAPACITY))
    }

    pub fn lookup_chain(&self, anchor: [u32; 3], level: u8, ty: u8) -> Option<u128> {
        match self.chains.get(&(anchor, level, ty)) {
            Some(bits) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(*bits)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn store_chain(&self, anchor: [u32; 3], level: u8, ty: u8, bits: u128) {
        if self.chains.len() >= self.capacity {
            // entries are immutable and cheap to rebuild; dropping everything
            // keeps the bound without bookkeeping on the hot path
            self.chains.clear();
        }
        self.chains.insert((anchor, level, ty), bits);
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    pub fn clear(&self) {
        self.chains.clear();
    }

    pub fn stats(&self) -> KeyCacheStats {
        KeyCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for KeyCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
