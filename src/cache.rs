//! Bounded, advisory audit-decision cache.
//!
//! Keyed by a BLAKE3 fingerprint of a canonicalised [`AccessResource`],
//! caching only the `(is_audited, is_audited_determined)` pair for
//! recurring resources. A miss simply triggers full evaluation — the cache
//! never changes a decision, only how often the engine has to recompute
//! one (Invariant 6, cache transparency).

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::types::AccessResource;

type CacheKey = [u8; 32];
type CachedAudit = (bool, bool);

/// Compute a stable fingerprint for a resource descriptor. `AccessResource`
/// is `BTreeMap`-backed, so iteration order is already canonical.
pub fn fingerprint(resource: &AccessResource) -> CacheKey {
    let mut hasher = blake3::Hasher::new();
    for (dimension, value) in resource.iter() {
        hasher.update(dimension.as_bytes());
        hasher.update(&[0u8]); // separator, avoids "ab"+"c" colliding with "a"+"bc"
        hasher.update(value.as_bytes());
        hasher.update(&[0u8]);
    }
    *hasher.finalize().as_bytes()
}

/// The audit cache owned by one [`crate::repository::PolicyRepository`].
///
/// A capacity of `0` disables the cache outright: `get` always misses and
/// `put` is a no-op, so a host that wants to turn caching off changes no
/// decision outcome, only performance.
pub struct AuditCache {
    inner: Option<Mutex<LruCache<CacheKey, CachedAudit>>>,
}

impl AuditCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
        }
    }

    /// Look up the cached `(is_audited, is_audited_determined)` pair for a
    /// resource fingerprint.
    pub fn get(&self, resource: &AccessResource) -> Option<CachedAudit> {
        let inner = self.inner.as_ref()?;
        let key = fingerprint(resource);
        inner.lock().get(&key).copied()
    }

    /// Remember the `(is_audited, is_audited_determined)` pair for a
    /// resource fingerprint. Only called when `is_audited_determined` is
    /// true — an undetermined audit flag is not worth caching.
    pub fn put(&self, resource: &AccessResource, audited: bool, audited_determined: bool) {
        let Some(inner) = self.inner.as_ref() else {
            return;
        };
        let key = fingerprint(resource);
        inner.lock().put(key, (audited, audited_determined));
    }

    pub fn len(&self) -> usize {
        self.inner.as_ref().map(|i| i.lock().len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
