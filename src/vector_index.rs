//! Approximate vector index using locality-sensitive hashing
//!
//! Maintains L independent hash tables, each built from K random unit-norm
//! hyperplanes drawn once at construction and fixed for the index's
//! lifetime. A vector's hash in a table is the K-bit sign pattern of its dot
//! products against that table's hyperplanes, so similar vectors collide
//! with high probability.
//!
//! The index is an accelerating overlay over the external vector store, not
//! a replacement: when the candidate set undershoots the requested k the
//! caller falls back to a full scan through the external service (a
//! degraded-path event, not an error).
//!
//! All interior maps are concurrency-safe; callers only need to serialize
//! mutations per id.

use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;

use dashmap::DashMap;
use lru::LruCache;
use ordered_float::OrderedFloat;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, warn};

use crate::constants::VECTOR_RESULT_CACHE_CAPACITY;
use crate::similarity::cosine_similarity;
use crate::types::{MemoryId, MetaValue, MetadataMap, VectorEntry};

/// Equality constraints against vector-entry metadata
///
/// A candidate must satisfy every constraint to pass the pre-filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    pub equals: Vec<(String, MetaValue)>,
}

impl MetadataFilter {
    pub fn equals(key: impl Into<String>, value: MetaValue) -> Self {
        Self {
            equals: vec![(key.into(), value)],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.equals.is_empty()
    }
}

/// Outcome of an index search
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Hits ordered by descending cosine similarity
    pub hits: Vec<(MemoryId, f32)>,
    /// True when LSH produced fewer than k candidates; the caller may fall
    /// back to a full scan through the external store
    pub undershot: bool,
}

/// One LSH table: fixed hyperplanes plus hash-bucket membership
struct LshTable {
    /// K unit-norm hyperplanes, each of the index dimension
    hyperplanes: Vec<Vec<f32>>,
    /// Sign-pattern hash → member ids
    buckets: DashMap<u64, HashSet<MemoryId>>,
}

impl LshTable {
    fn new(rng: &mut StdRng, dim: usize, bits: usize) -> Self {
        let hyperplanes = (0..bits)
            .map(|_| {
                let mut v: Vec<f32> = (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect();
                let norm = v.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt() as f32;
                if norm > 0.0 {
                    for x in v.iter_mut() {
                        *x /= norm;
                    }
                }
                v
            })
            .collect();
        Self {
            hyperplanes,
            buckets: DashMap::new(),
        }
    }

    /// K-bit sign pattern of the vector against this table's hyperplanes
    fn hash(&self, vector: &[f32]) -> u64 {
        let mut bits = 0u64;
        for (i, plane) in self.hyperplanes.iter().enumerate() {
            let dot: f64 = plane
                .iter()
                .zip(vector.iter())
                .map(|(p, v)| (*p as f64) * (*v as f64))
                .sum();
            if dot >= 0.0 {
                bits |= 1 << i;
            }
        }
        bits
    }
}

/// Key for the search-result cache: query hash + k + filter hash
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ResultCacheKey {
    vector_hash: u64,
    k: usize,
    filter_hash: u64,
}

impl ResultCacheKey {
    fn new(vector: &[f32], k: usize, filter: Option<&MetadataFilter>) -> Self {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        for x in vector {
            x.to_bits().hash(&mut hasher);
        }
        let vector_hash = hasher.finish();

        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        if let Some(filter) = filter {
            for (key, value) in &filter.equals {
                key.hash(&mut hasher);
                value.to_string().hash(&mut hasher);
            }
        }
        let filter_hash = hasher.finish();

        Self {
            vector_hash,
            k,
            filter_hash,
        }
    }
}

/// Approximate nearest-neighbor index over memory vectors
pub struct LshIndex {
    dim: usize,
    tables: Vec<LshTable>,
    /// Flat id → entry store
    vectors: DashMap<MemoryId, VectorEntry>,
    /// Inverted metadata index: "key=value" → ids
    metadata_index: DashMap<String, HashSet<MemoryId>>,
    /// Cached search results; invalidated wholesale on any mutation
    result_cache: Mutex<LruCache<ResultCacheKey, Vec<(MemoryId, f32)>>>,
}

impl LshIndex {
    /// Build an index with randomly seeded hyperplanes
    pub fn new(dim: usize, num_tables: usize, hash_bits: usize) -> Self {
        Self::with_seed(dim, num_tables, hash_bits, rand::random())
    }

    /// Build an index with a fixed seed (deterministic hyperplanes)
    pub fn with_seed(dim: usize, num_tables: usize, hash_bits: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let tables = (0..num_tables)
            .map(|_| LshTable::new(&mut rng, dim, hash_bits))
            .collect();
        debug!(
            dim,
            num_tables, hash_bits, "initialized LSH index"
        );
        Self {
            dim,
            tables,
            vectors: DashMap::new(),
            metadata_index: DashMap::new(),
            result_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(VECTOR_RESULT_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    fn metadata_key(key: &str, value: &MetaValue) -> String {
        format!("{key}={value}")
    }

    /// Insert or replace an entry
    ///
    /// Replacement is delete + reinsert so bucket and metadata memberships
    /// never go stale. Cached results predate the new entry and are cleared,
    /// mirroring [`LshIndex::remove`].
    pub fn insert(&self, entry: VectorEntry) {
        if entry.vector.len() != self.dim {
            warn!(
                id = %entry.id,
                expected = self.dim,
                actual = entry.vector.len(),
                "rejecting vector with wrong dimension"
            );
            return;
        }

        if self.vectors.contains_key(&entry.id) {
            self.remove(&entry.id);
        }

        for table in &self.tables {
            let hash = table.hash(&entry.vector);
            table.buckets.entry(hash).or_default().insert(entry.id);
        }
        for (key, value) in &entry.metadata {
            self.metadata_index
                .entry(Self::metadata_key(key, value))
                .or_default()
                .insert(entry.id);
        }
        self.vectors.insert(entry.id, entry);
        self.result_cache.lock().clear();
    }

    /// Remove an entry from the flat store, every bucket, and every
    /// metadata posting, then invalidate the result cache
    ///
    /// Cache correctness depends on index state, so any removal clears all
    /// cached query results.
    pub fn remove(&self, id: &MemoryId) -> bool {
        let Some((_, entry)) = self.vectors.remove(id) else {
            return false;
        };

        for table in &self.tables {
            let hash = table.hash(&entry.vector);
            if let Some(mut bucket) = table.buckets.get_mut(&hash) {
                bucket.remove(id);
            }
        }
        for (key, value) in &entry.metadata {
            if let Some(mut posting) = self.metadata_index.get_mut(&Self::metadata_key(key, value))
            {
                posting.remove(id);
            }
        }

        self.result_cache.lock().clear();
        true
    }

    /// Look up the stored vector for an id
    pub fn get(&self, id: &MemoryId) -> Option<VectorEntry> {
        self.vectors.get(id).map(|entry| entry.clone())
    }

    /// Ids passing the metadata pre-filter, or None when no filter is given
    fn metadata_candidates(&self, filter: Option<&MetadataFilter>) -> Option<HashSet<MemoryId>> {
        let filter = filter?;
        if filter.is_empty() {
            return None;
        }

        let mut universe: Option<HashSet<MemoryId>> = None;
        for (key, value) in &filter.equals {
            let posting = self
                .metadata_index
                .get(&Self::metadata_key(key, value))
                .map(|p| p.clone())
                .unwrap_or_default();
            universe = Some(match universe {
                None => posting,
                Some(current) => current.intersection(&posting).copied().collect(),
            });
        }
        universe
    }

    /// Union of bucket members across every table for the query's hashes
    fn lsh_candidates(&self, query: &[f32]) -> HashSet<MemoryId> {
        let mut candidates = HashSet::new();
        for table in &self.tables {
            let hash = table.hash(query);
            if let Some(bucket) = table.buckets.get(&hash) {
                candidates.extend(bucket.iter().copied());
            }
        }
        candidates
    }

    /// Top-k approximate nearest neighbors by cosine similarity
    ///
    /// Pipeline: metadata pre-filter → LSH bucket union → intersection →
    /// exact cosine over the reduced set. `undershot` signals that LSH
    /// produced fewer than k candidates.
    pub fn search(&self, query: &[f32], k: usize, filter: Option<&MetadataFilter>) -> SearchOutcome {
        if query.len() != self.dim || k == 0 {
            return SearchOutcome {
                hits: Vec::new(),
                undershot: true,
            };
        }

        let cache_key = ResultCacheKey::new(query, k, filter);
        if let Some(cached) = self.result_cache.lock().get(&cache_key) {
            return SearchOutcome {
                hits: cached.clone(),
                undershot: false,
            };
        }

        let lsh_set = self.lsh_candidates(query);
        let candidates: Vec<MemoryId> = match self.metadata_candidates(filter) {
            Some(universe) => lsh_set.intersection(&universe).copied().collect(),
            None => lsh_set.into_iter().collect(),
        };
        let undershot = candidates.len() < k;
        if undershot {
            debug!(
                candidates = candidates.len(),
                k, "LSH candidate set undershot k"
            );
        }

        let mut scored: Vec<(OrderedFloat<f32>, MemoryId)> = candidates
            .into_iter()
            .filter_map(|id| {
                self.vectors
                    .get(&id)
                    .map(|entry| (OrderedFloat(cosine_similarity(query, &entry.vector)), id))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        let hits: Vec<(MemoryId, f32)> = scored
            .into_iter()
            .take(k)
            .map(|(score, id)| (id, score.0))
            .collect();

        // Undershot outcomes are not cached: the caller supplements them
        // through the external fallback, and replaying one as a full result
        // would silently drop that path
        if !undershot {
            self.result_cache.lock().put(cache_key, hits.clone());
        }
        SearchOutcome { hits, undershot }
    }
}
