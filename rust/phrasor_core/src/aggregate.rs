//! Multi-shard aggregation with memoized prefix sums.
//!
//! An `IndexSet` owns the loaded shard indexes of one direction (forward
//! or reverse) in shard discovery order, plus two cache layers: a
//! per-shard cache keyed by `(shard position, key)` and a global cache
//! keyed by the bare key. Caches are process-local, created empty, never
//! persisted, and never invalidated during a run; the indexes are
//! read-only once loaded. Both caches are concurrency-safe so scoring may
//! fan out over a thread pool.

use std::path::Path;
use std::sync::OnceLock;

use ahash::AHashMap;
use dashmap::DashMap;

use crate::index::{self, Direction, IndexError};
use crate::trie::CountTrie;
use crate::SEP;

#[derive(Debug)]
pub struct IndexSet {
    shards: Vec<CountTrie>,
    /// (shard position, key) → that shard's prefix sum for the key.
    shard_cache: DashMap<(usize, String), u64>,
    /// key → sum of per-shard prefix sums.
    global_cache: DashMap<String, u64>,
    grand_total: OnceLock<u64>,
}

impl IndexSet {
    /// Wrap already-built shard indexes, ordered by shard discovery.
    pub fn new(shards: Vec<CountTrie>) -> Self {
        IndexSet {
            shards,
            shard_cache: DashMap::new(),
            global_cache: DashMap::new(),
            grand_total: OnceLock::new(),
        }
    }

    /// Load the persisted indexes for `shards` from `index_dir`, in order.
    /// A missing or corrupt file fails the whole load with an error naming
    /// the offending shard file; the caller decides between aborting and
    /// rebuilding that shard.
    pub fn load(
        index_dir: &Path,
        shards: &[String],
        direction: Direction,
    ) -> Result<Self, IndexError> {
        let mut tries = Vec::with_capacity(shards.len());
        for shard in shards {
            let path = index::index_path(index_dir, shard, direction);
            tries.push(index::reader::load(&path)?);
        }
        Ok(Self::new(tries))
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Aggregate token-aligned prefix sum for `key` across every shard.
    /// Each shard's contribution is computed at most once per run; the
    /// all-shard total is then cached under the bare key.
    pub fn prefix_sum(&self, key: &str) -> u64 {
        if let Some(total) = self.global_cache.get(key) {
            return *total;
        }
        let tokens: Vec<&str> = key.split(SEP).collect();
        let mut total = 0u64;
        for (pos, shard) in self.shards.iter().enumerate() {
            let contribution = *self
                .shard_cache
                .entry((pos, key.to_string()))
                .or_insert_with(|| shard.prefix_sum(&tokens));
            total += contribution;
        }
        self.global_cache.insert(key.to_string(), total);
        total
    }

    /// Aggregate exact-match count for `key`. Uncached: an exact walk is a
    /// single trie descent, unlike the subtree sums above.
    pub fn exact_count(&self, key: &str) -> u64 {
        let tokens: Vec<&str> = key.split(SEP).collect();
        self.shards.iter().map(|s| s.exact_count(&tokens)).sum()
    }

    /// Aggregate occurrences of keys strictly extending `key`.
    pub fn extension_sum(&self, key: &str) -> u64 {
        let tokens: Vec<&str> = key.split(SEP).collect();
        self.shards.iter().map(|s| s.extension_sum(&tokens)).sum()
    }

    /// Merged immediate-continuation distribution under `key` across all
    /// shards: continuation token → total occurrence mass.
    pub fn branch_counts(&self, key: &str) -> Vec<(String, u64)> {
        let tokens: Vec<&str> = key.split(SEP).collect();
        let mut merged: AHashMap<String, u64> = AHashMap::new();
        for shard in &self.shards {
            for (tok, mass) in shard.branch_counts(&tokens) {
                *merged.entry(tok).or_insert(0) += mass;
            }
        }
        merged.into_iter().collect()
    }

    /// Total occurrences of every stored n-gram across all shards, the
    /// PMI normalizer. Probabilities derived from it are relative to total
    /// n-gram-occurrence mass, not corpus word count, so PMI scores are
    /// only comparable within a single index configuration (gram width,
    /// token rules). Computed once, then cached.
    pub fn grand_total(&self) -> u64 {
        *self
            .grand_total
            .get_or_init(|| self.shards.iter().map(CountTrie::occurrences).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::writer;

    fn shard_a() -> CountTrie {
        let mut t = CountTrie::new();
        t.insert(&["new", "york", "city"]);
        t.insert(&["new", "york", "state"]);
        t.insert(&["old", "york", "road"]);
        t
    }

    fn shard_b() -> CountTrie {
        let mut t = CountTrie::new();
        t.insert(&["new", "york", "city"]);
        t.insert(&["new", "deal", "era"]);
        t
    }

    #[test]
    fn prefix_sum_aggregates_across_shards() {
        let set = IndexSet::new(vec![shard_a(), shard_b()]);
        assert_eq!(set.prefix_sum("new"), 4);
        assert_eq!(set.prefix_sum("new\tyork"), 3);
        assert_eq!(set.prefix_sum("new\tyork\tcity"), 2);
        assert_eq!(set.prefix_sum("absent"), 0);
    }

    #[test]
    fn cached_queries_are_stable() {
        let set = IndexSet::new(vec![shard_a(), shard_b()]);
        let first = set.prefix_sum("new\tyork");
        let second = set.prefix_sum("new\tyork");
        assert_eq!(first, second);
        // Both cache layers are populated after the first query.
        assert!(set.global_cache.contains_key("new\tyork"));
        assert!(set.shard_cache.contains_key(&(0, "new\tyork".to_string())));
        assert!(set.shard_cache.contains_key(&(1, "new\tyork".to_string())));
    }

    #[test]
    fn exact_and_extension_queries_are_separate() {
        let set = IndexSet::new(vec![shard_a(), shard_b()]);
        assert_eq!(set.exact_count("new\tyork"), 0);
        assert_eq!(set.exact_count("new\tyork\tcity"), 2);
        assert_eq!(set.extension_sum("new\tyork"), 3);
    }

    #[test]
    fn branch_counts_merge_shards() {
        let set = IndexSet::new(vec![shard_a(), shard_b()]);
        let mut branches = set.branch_counts("new");
        branches.sort();
        assert_eq!(
            branches,
            vec![("deal".to_string(), 1), ("york".to_string(), 3)]
        );
    }

    #[test]
    fn grand_total_sums_all_stored_counts() {
        let set = IndexSet::new(vec![shard_a(), shard_b()]);
        assert_eq!(set.grand_total(), 5);
        // Cached value is stable.
        assert_eq!(set.grand_total(), 5);
    }

    #[test]
    fn load_reproduces_in_memory_results() {
        let dir = tempfile::TempDir::new().unwrap();
        for (name, trie) in [("a.txt", shard_a()), ("b.txt", shard_b())] {
            let path = index::index_path(dir.path(), name, Direction::Forward);
            writer::persist(&trie, &path).unwrap();
        }
        let names = vec!["a.txt".to_string(), "b.txt".to_string()];
        let loaded = IndexSet::load(dir.path(), &names, Direction::Forward).unwrap();
        let in_memory = IndexSet::new(vec![shard_a(), shard_b()]);

        for key in ["new", "new\tyork", "new\tyork\tcity", "old\tyork\troad", "zzz"] {
            assert_eq!(loaded.prefix_sum(key), in_memory.prefix_sum(key), "{key}");
        }
        assert_eq!(loaded.grand_total(), in_memory.grand_total());
    }

    #[test]
    fn load_failure_names_the_missing_shard() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = index::index_path(dir.path(), "a.txt", Direction::Forward);
        writer::persist(&shard_a(), &path).unwrap();

        let names = vec!["a.txt".to_string(), "b.txt".to_string()];
        let err = IndexSet::load(dir.path(), &names, Direction::Forward).unwrap_err();
        match err {
            IndexError::NotFound(p) => {
                assert!(p.to_string_lossy().contains("b.txt"), "{p:?}")
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn empty_set_answers_zero() {
        let set = IndexSet::new(Vec::new());
        assert_eq!(set.prefix_sum("anything"), 0);
        assert_eq!(set.grand_total(), 0);
        assert!(set.branch_counts("anything").is_empty());
    }
}
