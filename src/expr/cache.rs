//! Process-wide cache of compiled expressions.
//!
//! Lookups take a shared read lock; the first caller for a new text inserts a
//! `OnceLock` cell under the write lock and compiles outside of it, so
//! concurrent callers for the same text block on that one compile instead of
//! repeating it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

use fxhash::FxHashMap;
use lazy_static::lazy_static;

use super::parser::{parse_lambda, Lambda};
use super::value::EvalResult;

type Slot = Arc<OnceLock<EvalResult<Arc<Lambda>>>>;

lazy_static! {
    static ref SHARED_CACHE: Arc<CompileCache> = Arc::new(CompileCache::new());
}

/// The cache shared by every default-constructed evaluator.
pub fn shared_cache() -> Arc<CompileCache> {
    Arc::clone(&SHARED_CACHE)
}

/// Concurrent get-or-compile map keyed by expression text.
#[derive(Debug, Default)]
pub struct CompileCache {
    slots: RwLock<FxHashMap<String, Slot>>,
    compiles: AtomicUsize,
}

impl CompileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the compiled form of `text`, compiling it at most once.
    ///
    /// Parse failures are cached too: a bad expression fails the same way on
    /// every lookup.
    pub fn get_or_compile(&self, text: &str) -> EvalResult<Arc<Lambda>> {
        let slot = self.slot(text);
        slot.get_or_init(|| {
            self.compiles.fetch_add(1, Ordering::Relaxed);
            log::trace!("compiling expression `{}`", text);
            parse_lambda(text).map(Arc::new)
        })
        .clone()
    }

    fn slot(&self, text: &str) -> Slot {
        {
            let slots = self.slots.read().unwrap_or_else(|e| e.into_inner());
            if let Some(slot) = slots.get(text) {
                return Arc::clone(slot);
            }
        }
        let mut slots = self.slots.write().unwrap_or_else(|e| e.into_inner());
        Arc::clone(slots.entry(text.to_string()).or_default())
    }

    /// Drop every cached expression.
    pub fn clear(&self) {
        self.slots
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Number of distinct expression texts currently cached.
    pub fn len(&self) -> usize {
        self.slots.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total compiles performed since construction.
    pub fn compile_count(&self) -> usize {
        self.compiles.load(Ordering::Relaxed)
    }
}
