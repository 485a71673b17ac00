use std::sync::{Arc, RwLock};

use tally_repository::CounterCache;

use crate::EngineError;

/// Shared, late-bindable reference to the counter cache.
///
/// The service starts with an empty slot when the cache is unreachable and
/// installs the connection once a background retry succeeds. Every clone sees
/// the installed cache.
#[derive(Clone, Default)]
pub struct CounterCacheSlot {
    inner: Arc<RwLock<Option<Arc<dyn CounterCache>>>>,
}

impl CounterCacheSlot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn connected(cache: Arc<dyn CounterCache>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(cache))),
        }
    }

    pub fn install(&self, cache: Arc<dyn CounterCache>) {
        if let Ok(mut slot) = self.inner.write() {
            *slot = Some(cache);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.inner.read().is_ok_and(|slot| slot.is_some())
    }

    pub(crate) fn current(&self) -> Result<Arc<dyn CounterCache>, EngineError> {
        self.inner
            .read()
            .ok()
            .and_then(|slot| slot.clone())
            .ok_or(EngineError::CounterUnavailable)
    }
}
