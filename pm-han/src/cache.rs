use crate::{HanMapper, MarketBasisMapper};
use parking_lot::Mutex;
use pm_core::models::{MarketBasis, MarketBasisError};
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Internal and wire bases paired up by market reference.
///
/// Only the low byte of a market reference travels on the wire, so entries
/// are keyed by that byte. Looking up a basis that equals the cached one
/// returns the cached `Arc` without calling the mapper again.
pub struct MarketBasisCache {
    mapper: Box<dyn MarketBasisMapper>,
    entries: Mutex<FxHashMap<u8, Entry>>,
}

#[derive(Clone)]
struct Entry {
    internal: Arc<MarketBasis>,
    external: Arc<MarketBasis>,
}

fn key(basis: &MarketBasis) -> u8 {
    // wrapping
    basis.market_ref() as u8
}

impl MarketBasisCache {
    /// An empty cache that derives missing pairs with `mapper`
    pub fn new(mapper: impl MarketBasisMapper + 'static) -> Self {
        Self {
            mapper: Box::new(mapper),
            entries: Mutex::default(),
        }
    }

    /// The wire basis registered under a market reference
    pub fn external_for_ref(&self, market_ref: u8) -> Option<Arc<MarketBasis>> {
        self.entries
            .lock()
            .get(&market_ref)
            .map(|entry| entry.external.clone())
    }

    /// The internal basis registered under a market reference
    pub fn internal_for_ref(&self, market_ref: u8) -> Option<Arc<MarketBasis>> {
        self.entries
            .lock()
            .get(&market_ref)
            .map(|entry| entry.internal.clone())
    }

    /// The internal and wire bases registered under a market reference, as
    /// one consistent pair
    pub fn bases_for_ref(&self, market_ref: u8) -> Option<(Arc<MarketBasis>, Arc<MarketBasis>)> {
        self.entries
            .lock()
            .get(&market_ref)
            .map(|entry| (entry.internal.clone(), entry.external.clone()))
    }

    /// The wire basis for an internal basis, deriving and caching it if needed
    pub fn external_for(&self, internal: &Arc<MarketBasis>) -> Result<Arc<MarketBasis>, MarketBasisError> {
        let mut entries = self.entries.lock();
        let key = key(internal);
        if let Some(entry) = entries.get(&key) {
            if *entry.internal == **internal {
                return Ok(entry.external.clone());
            }
        }
        let external = Arc::new(self.mapper.to_external(internal)?);
        entries.insert(
            key,
            Entry {
                internal: internal.clone(),
                external: external.clone(),
            },
        );
        Ok(external)
    }

    /// Record a wire basis seen on the wire, returning the internal basis it maps to
    pub fn register_external(&self, external: MarketBasis) -> Result<Arc<MarketBasis>, MarketBasisError> {
        let mut entries = self.entries.lock();
        let key = key(&external);
        if let Some(entry) = entries.get(&key) {
            if *entry.external == external {
                return Ok(entry.internal.clone());
            }
        }
        let internal = Arc::new(self.mapper.to_internal(&external)?);
        entries.insert(
            key,
            Entry {
                internal: internal.clone(),
                external: Arc::new(external),
            },
        );
        Ok(internal)
    }

    /// Forget the pair registered under a market reference
    pub fn remove(&self, market_ref: u8) -> bool {
        self.entries.lock().remove(&market_ref).is_some()
    }

    /// The number of market references known
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no market reference is known yet
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for MarketBasisCache {
    fn default() -> Self {
        Self::new(HanMapper::default())
    }
}

impl std::fmt::Debug for MarketBasisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketBasisCache")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts how often the cache falls through to the mapper
    #[derive(Default)]
    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    impl MarketBasisMapper for Counting {
        fn to_external(&self, internal: &MarketBasis) -> Result<MarketBasis, MarketBasisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            HanMapper::default().to_external(internal)
        }

        fn to_internal(&self, external: &MarketBasis) -> Result<MarketBasis, MarketBasisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            HanMapper::default().to_internal(external)
        }
    }

    fn basis(max: f64, market_ref: u32) -> Arc<MarketBasis> {
        Arc::new(MarketBasis::new("electricity", "EUR", 5, 0.0, max, market_ref).unwrap())
    }

    #[test]
    fn test_external_is_reused() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = MarketBasisCache::new(Counting {
            calls: calls.clone(),
        });

        let first = cache.external_for(&basis(10.0, 3)).unwrap();
        let second = cache.external_for(&basis(10.0, 3)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.external_for_ref(3).unwrap(), first);
        assert_eq!(cache.internal_for_ref(3).unwrap(), basis(10.0, 3));

        // a changed basis under the same reference replaces the pair
        let third = cache.external_for(&basis(20.0, 3)).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_references_wrap_to_a_byte() {
        let cache = MarketBasisCache::default();
        cache.external_for(&basis(10.0, 256 + 7)).unwrap();
        assert!(cache.external_for_ref(7).is_some());
        assert!(cache.remove(7));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_register_external() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = MarketBasisCache::new(Counting {
            calls: calls.clone(),
        });
        let external = MarketBasis::new("electricity", "EUR", 255, -1.0, 1.0, 5).unwrap();

        let internal = cache.register_external(external.clone()).unwrap();
        let again = cache.register_external(external.clone()).unwrap();
        assert!(Arc::ptr_eq(&internal, &again));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*cache.external_for_ref(5).unwrap(), external);
    }

    #[test]
    fn test_bases_for_ref_pairs_up_one_entry() {
        let cache = MarketBasisCache::default();
        assert!(cache.bases_for_ref(3).is_none());

        let external = cache.external_for(&basis(10.0, 3)).unwrap();
        let (internal, paired) = cache.bases_for_ref(3).unwrap();
        assert!(Arc::ptr_eq(&paired, &external));
        assert_eq!(internal, basis(10.0, 3));

        // replacing the pair replaces both halves together
        let replaced = cache.external_for(&basis(20.0, 3)).unwrap();
        let (internal, paired) = cache.bases_for_ref(3).unwrap();
        assert!(Arc::ptr_eq(&paired, &replaced));
        assert_eq!(internal, basis(20.0, 3));
    }
}
