//! Script content cache.
//!
//! Injected into the asset store rather than held as process-global state.
//! Readers never block each other; each key has a single writer in practice
//! (the first request that misses it).

use std::sync::Arc;

use dashmap::DashMap;

pub trait ScriptCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Arc<str>>;
    fn put(&self, key: &str, value: Arc<str>);
}

#[derive(Default)]
pub struct MemoryScriptCache {
    map: DashMap<String, Arc<str>>,
}

impl MemoryScriptCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl ScriptCache for MemoryScriptCache {
    fn get(&self, key: &str) -> Option<Arc<str>> {
        self.map.get(key).map(|v| Arc::clone(v.value()))
    }

    fn put(&self, key: &str, value: Arc<str>) {
        self.map.insert(key.to_string(), value);
    }
}
