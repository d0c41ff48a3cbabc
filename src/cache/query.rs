//! Compiled-query cache.

use std::any::TypeId;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{CacheStats, RwCache};
use crate::ast::Param;

/// Identifies the scanner plan a query's rows are hydrated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScannerKey {
    pub type_id: TypeId,
    pub type_name: &'static str,
}

impl ScannerKey {
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }
}

/// Memoized render output. Holds the SQL shape only; argument values
/// are bound from each call.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedQuery {
    pub sql: String,
    /// Bind slots in placeholder order.
    pub args: Vec<Param>,
    /// Server-side statement name derived from `sql`.
    pub statement_key: String,
    pub scanner: Option<ScannerKey>,
}

impl CachedQuery {
    pub fn new(sql: String, args: Vec<Param>) -> Self {
        let statement_key = statement_key(&sql);
        Self {
            sql,
            args,
            statement_key,
            scanner: None,
        }
    }

    pub fn with_scanner(mut self, scanner: ScannerKey) -> Self {
        self.scanner = Some(scanner);
        self
    }
}

/// Statement name for a SQL text: `s` + 16 hex digits.
pub fn statement_key(sql: &str) -> String {
    let mut hasher = DefaultHasher::new();
    sql.as_bytes().hash(&mut hasher);
    format!("s{:016x}", hasher.finish())
}

/// Fingerprint → [`CachedQuery`]. Grows with the number of distinct
/// query shapes; there is no eviction.
#[derive(Default)]
pub struct QueryCache {
    entries: RwCache<u64, CachedQuery>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read an entry without touching the hit/miss counters.
    pub fn get(&self, fingerprint: u64) -> Option<Arc<CachedQuery>> {
        self.entries.get(&fingerprint)
    }

    /// [`get`](Self::get), counting the outcome in [`stats`](Self::stats).
    pub fn lookup(&self, fingerprint: u64) -> Option<Arc<CachedQuery>> {
        let found = self.get(fingerprint);
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    pub fn set(&self, fingerprint: u64, query: CachedQuery) -> Arc<CachedQuery> {
        let query = Arc::new(query);
        self.entries.set(fingerprint, query.clone());
        query
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
