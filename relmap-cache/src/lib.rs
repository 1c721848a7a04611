use dashmap::DashMap;
use relmap_data::{describe, DataError, Entity, Value};
use std::any::Any;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

/// 32-bit FNV-1a.
pub fn fnv1a(bytes: &[u8]) -> u32 {
    const OFFSET: u32 = 2_166_136_261;
    const PRIME: u32 = 16_777_619;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u32::from(*b)).wrapping_mul(PRIME))
}

/// Cache key: the hash of the model type's full name plus the serialized
/// filter itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub type_hash: u32,
    pub filter: String,
}

impl CacheKey {
    pub fn of<T: Entity>(filter: &T) -> Result<Self, DataError> {
        let json = serde_json::to_string(filter)
            .map_err(|e| DataError::CacheOperation(format!("filter is not serializable: {e}")))?;
        Ok(Self {
            type_hash: type_hash::<T>(),
            filter: json,
        })
    }
}

pub fn type_hash<T: 'static>() -> u32 {
    type_hash_named(std::any::type_name::<T>())
}

/// Type hash from a full type name, as reported by `std::any::type_name`.
pub fn type_hash_named(type_name: &str) -> u32 {
    fnv1a(type_name.as_bytes())
}

// ---------------------------------------------------------------------------
// Memory probe
// ---------------------------------------------------------------------------

/// Reports the resident memory of the current process.
pub trait MemoryProbe: Send + Sync + 'static {
    fn resident_bytes(&self) -> Option<u64>;
}

/// Default probe backed by `sysinfo`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SysinfoProbe;

impl MemoryProbe for SysinfoProbe {
    fn resident_bytes(&self) -> Option<u64> {
        use sysinfo::{Pid, ProcessesToUpdate, System};
        let pid = Pid::from_u32(std::process::id());
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        sys.process(pid).map(|p| p.memory())
    }
}

// ---------------------------------------------------------------------------
// ResultCache
// ---------------------------------------------------------------------------

type Slot = Box<dyn Any + Send + Sync>;

/// Process-wide cache of query results, keyed by filter content.
///
/// Each entry holds the `Vec<T>` produced for one filter. Entries are indexed
/// per model type so a write can drop every cached result of its type. When
/// a memory ceiling is set and the process exceeds it, the next `put` drops
/// the whole cache before inserting.
///
/// Every invalidation bumps the type's generation. A reader that captured the
/// generation before fetching stores its result with
/// [`put_if_unchanged`](Self::put_if_unchanged), which refuses values fetched
/// before a concurrent write.
pub struct ResultCache {
    entries: DashMap<CacheKey, Slot>,
    index: DashMap<u32, HashSet<CacheKey>>,
    generations: DashMap<u32, u64>,
    memory_limit_mb: u64,
    probe: Arc<dyn MemoryProbe>,
}

impl ResultCache {
    /// Create a cache; `memory_limit_mb == 0` disables the ceiling.
    pub fn new(memory_limit_mb: u64) -> Self {
        Self::with_probe(memory_limit_mb, SysinfoProbe)
    }

    pub fn with_probe(memory_limit_mb: u64, probe: impl MemoryProbe) -> Self {
        Self {
            entries: DashMap::new(),
            index: DashMap::new(),
            generations: DashMap::new(),
            memory_limit_mb,
            probe: Arc::new(probe),
        }
    }

    pub fn memory_limit_mb(&self) -> u64 {
        self.memory_limit_mb
    }

    /// Cached result for `filter`, if any.
    pub fn get<T: Entity>(&self, filter: &T) -> Option<Vec<T>> {
        let key = match CacheKey::of(filter) {
            Ok(key) => key,
            Err(err) => {
                tracing::warn!(entity = std::any::type_name::<T>(), error = %err, "cache lookup skipped");
                return None;
            }
        };
        let entry = self.entries.get(&key)?;
        entry.value().downcast_ref::<Vec<T>>().cloned()
    }

    /// Current generation of `T`; pass it to
    /// [`put_if_unchanged`](Self::put_if_unchanged) after fetching.
    pub fn generation<T: Entity>(&self) -> u64 {
        self.generations
            .get(&type_hash::<T>())
            .map_or(0, |generation| *generation)
    }

    /// Store `values` for `filter` unless an entry already exists.
    ///
    /// A single-element result also refreshes every cached list of the same
    /// type holding an element with the same key.
    pub fn put<T: Entity>(&self, filter: &T, values: Vec<T>) {
        self.store(filter, values, None);
    }

    /// Like [`put`](Self::put), but only while `T` has not been invalidated
    /// since `generation` was read. Returns whether the value was stored.
    pub fn put_if_unchanged<T: Entity>(&self, filter: &T, values: Vec<T>, generation: u64) -> bool {
        self.store(filter, values, Some(generation))
    }

    fn store<T: Entity>(&self, filter: &T, values: Vec<T>, expected: Option<u64>) -> bool {
        self.enforce_memory_limit();
        let key = match CacheKey::of(filter) {
            Ok(key) => key,
            Err(err) => {
                tracing::warn!(entity = std::any::type_name::<T>(), error = %err, "cache put skipped");
                return false;
            }
        };

        let single = if values.len() == 1 {
            values.first().cloned()
        } else {
            None
        };
        {
            // Held while inserting so an invalidation cannot interleave.
            let generation = self.generations.entry(key.type_hash).or_insert(0);
            if expected.is_some_and(|expected| expected != *generation) {
                tracing::debug!(
                    entity = std::any::type_name::<T>(),
                    "stale result not cached"
                );
                return false;
            }
            if !self.entries.contains_key(&key) {
                self.entries.insert(key.clone(), Box::new(values));
                self.index.entry(key.type_hash).or_default().insert(key.clone());
            }
        }
        if let Some(item) = single {
            self.patch(&key, &item);
        }
        true
    }

    /// Drop the entry for `filter`, or every entry of `T` when `whole_type`.
    pub fn invalidate<T: Entity>(&self, filter: &T, whole_type: bool) {
        if whole_type {
            self.invalidate_type::<T>();
            return;
        }
        match CacheKey::of(filter) {
            Ok(key) => {
                let mut generation = self.generations.entry(key.type_hash).or_insert(0);
                *generation += 1;
                self.entries.remove(&key);
                if let Some(mut keys) = self.index.get_mut(&key.type_hash) {
                    keys.remove(&key);
                }
            }
            Err(err) => {
                tracing::warn!(entity = std::any::type_name::<T>(), error = %err, "cache invalidation skipped");
            }
        }
    }

    /// Drop every entry of `T`.
    pub fn invalidate_type<T: Entity>(&self) {
        self.invalidate_type_named(std::any::type_name::<T>());
    }

    /// Drop every entry of the type with this full name. Used for relation
    /// targets known only through their descriptors.
    pub fn invalidate_type_named(&self, type_name: &str) {
        let type_hash = type_hash_named(type_name);
        let mut generation = self.generations.entry(type_hash).or_insert(0);
        *generation += 1;
        let Some((_, keys)) = self.index.remove(&type_hash) else {
            return;
        };
        for key in &keys {
            self.entries.remove(key);
        }
        drop(generation);
        tracing::debug!(entity = type_name, removed = keys.len(), "invalidated cached results");
    }

    pub fn clear(&self) {
        self.entries.clear();
        self.index.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn enforce_memory_limit(&self) {
        if self.memory_limit_mb == 0 {
            return;
        }
        let Some(resident) = self.probe.resident_bytes() else {
            return;
        };
        let resident_mb = resident / (1024 * 1024);
        if resident_mb > self.memory_limit_mb {
            tracing::warn!(
                resident_mb,
                limit_mb = self.memory_limit_mb,
                entries = self.entries.len(),
                "memory ceiling exceeded, dropping result cache"
            );
            self.clear();
        }
    }

    /// Replace elements keyed like `item` in every other cached list of `T`.
    fn patch<T: Entity>(&self, origin: &CacheKey, item: &T) {
        let Ok(descriptor) = describe::<T>() else {
            return;
        };
        let property = descriptor.key_column().property;
        let key = item.get(property).unwrap_or(Value::Null);
        if key.is_unset() {
            return;
        }
        let keys: Vec<CacheKey> = match self.index.get(&origin.type_hash) {
            Some(keys) => keys.iter().filter(|k| *k != origin).cloned().collect(),
            None => return,
        };
        for cache_key in keys {
            let Some(mut slot) = self.entries.get_mut(&cache_key) else {
                continue;
            };
            let Some(list) = slot.value_mut().downcast_mut::<Vec<T>>() else {
                continue;
            };
            for cached in list.iter_mut() {
                if cached.get(property).as_ref() == Some(&key) {
                    *cached = item.clone();
                }
            }
        }
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(0)
    }
}

static RESULT_CACHE: OnceLock<Arc<ResultCache>> = OnceLock::new();

/// Install the process-wide cache with a memory ceiling. Has no effect once
/// the cache exists.
pub fn init_global(memory_limit_mb: u64) -> Arc<ResultCache> {
    RESULT_CACHE
        .get_or_init(|| Arc::new(ResultCache::new(memory_limit_mb)))
        .clone()
}

/// The process-wide cache, created without a memory ceiling on first access.
pub fn global() -> Arc<ResultCache> {
    RESULT_CACHE
        .get_or_init(|| Arc::new(ResultCache::default()))
        .clone()
}
