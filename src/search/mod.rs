//! Hybrid BM25 + vector search index (§4.7). Rebuilt from the graph store and the
//! embedding cache at startup — nothing here is persisted independently of those.
//!
//! Grounded on suatkocar-codegraph's `src/graph/search.rs` hybrid-merge shape (BM25
//! normalised by top score, cosine floor, weighted sum) and the `bm25` crate already
//! in the dependency set for the sparse scoring half; cosine similarity is plain
//! dot-product math the way the teacher's numeric helpers are written elsewhere.

use std::collections::{HashMap, HashSet};

use bm25::{Embedder, EmbedderBuilder, Language};
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingConfig;
use crate::embed::{EmbeddingCache, EmbeddingProvider};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexedDocument {
    id: String,
    file_path: String,
    text: String,
    content_hash: String,
}

/// One scored hit from [`HybridIndex::search`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub score: f32,
}

/// Mutable hybrid search index over node snippets/identifiers.
///
/// BM25 scoring is recomputed from an `Embedder` refit to the whole corpus on every
/// mutation — acceptable because a sync pass batches many mutations before any query
/// runs, and the corpus size this tool targets (single repos, not search engines)
/// keeps a full refit cheap relative to re-parsing the files that triggered it.
pub struct HybridIndex {
    documents: HashMap<String, IndexedDocument>,
    by_file: HashMap<String, HashSet<String>>,
    embedder: Option<Embedder<u32>>,
    bm25_weight: f32,
    vector_weight: f32,
    vector_floor: f32,
}

impl HybridIndex {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            documents: HashMap::new(),
            by_file: HashMap::new(),
            embedder: None,
            bm25_weight: config.bm25_weight,
            vector_weight: config.vector_weight,
            vector_floor: config.vector_floor,
        }
    }

    pub fn count(&self) -> usize {
        self.documents.len()
    }

    pub fn add(&mut self, id: String, file_path: String, text: String, content_hash: String) {
        self.by_file.entry(file_path.clone()).or_default().insert(id.clone());
        self.documents.insert(id.clone(), IndexedDocument { id, file_path, text, content_hash });
        self.embedder = None;
    }

    pub fn add_batch(&mut self, docs: impl IntoIterator<Item = (String, String, String, String)>) {
        for (id, file_path, text, content_hash) in docs {
            self.add(id, file_path, text, content_hash);
        }
    }

    pub fn remove(&mut self, id: &str) {
        if let Some(doc) = self.documents.remove(id)
            && let Some(set) = self.by_file.get_mut(&doc.file_path)
        {
            set.remove(id);
        }
        self.embedder = None;
    }

    pub fn remove_by_file(&mut self, file_path: &str) {
        if let Some(ids) = self.by_file.remove(file_path) {
            for id in ids {
                self.documents.remove(&id);
            }
        }
        self.embedder = None;
    }

    fn ensure_embedder(&mut self) {
        if self.embedder.is_some() || self.documents.is_empty() {
            return;
        }
        let corpus: Vec<&str> = self.documents.values().map(|d| d.text.as_str()).collect();
        let embedder = EmbedderBuilder::with_fit_to_corpus(Language::English, &corpus).build();
        self.embedder = Some(embedder);
    }

    /// Tokenizes camelCase/PascalCase identifiers into both the split words and the
    /// original identifier, so `getUserById` matches queries for `get`, `user`, `by`,
    /// `id` and the literal token itself (§4.7).
    pub fn expand_identifier_tokens(text: &str) -> String {
        let mut expanded = String::new();
        for word in text.split(|c: char| !c.is_alphanumeric()) {
            if word.is_empty() {
                continue;
            }
            expanded.push(' ');
            expanded.push_str(word);
            let splits = split_camel_case(word);
            if splits.len() > 1 {
                for part in splits {
                    expanded.push(' ');
                    expanded.push_str(&part);
                }
            }
        }
        expanded
    }

    fn bm25_scores(&mut self, query: &str) -> HashMap<String, f32> {
        self.ensure_embedder();
        let mut scores = HashMap::new();
        let Some(embedder) = &self.embedder else { return scores };
        let query_embedding = embedder.embed(query);
        for doc in self.documents.values() {
            let doc_embedding = embedder.embed(&doc.text);
            let score = sparse_dot(&query_embedding, &doc_embedding);
            if score > 0.0 {
                scores.insert(doc.id.clone(), score);
            }
        }
        scores
    }

    /// Cosine of the query vector against `id`'s embedding, or `None` if the query
    /// side is unavailable. On a cache miss the document is embedded on demand via
    /// `provider` and the result persisted to `cache` (§4.7 step 3, §7 "cosine
    /// backfill will retry on next query hit") — a prior embedding error never
    /// permanently strands a document at cosine 0.
    fn cosine_for(
        &self,
        id: &str,
        query_vector: Option<&Vec<f32>>,
        provider: Option<&dyn EmbeddingProvider>,
        cache: Option<&EmbeddingCache>,
    ) -> Option<f32> {
        let qv = query_vector?;
        let doc = self.documents.get(id)?;
        let cached = cache.and_then(|c| c.get(&doc.content_hash).ok().flatten());
        let doc_vector = match cached {
            Some(v) => v,
            None => {
                let vector = provider?.embed_document(&doc.text).ok()?;
                if let Some(c) = cache {
                    let _ = c.put(&doc.content_hash, &vector);
                }
                vector
            }
        };
        Some(cosine_similarity(qv, &doc_vector))
    }

    /// Run a hybrid query: BM25 over all documents, vector cosine backfilled onto
    /// every BM25 hit regardless of the floor, plus a separate floor-gated
    /// vector-only pass for documents BM25 missed entirely (§4.7 steps 2-3).
    /// `provider`/`cache` may be `None` to fall back to BM25-only scoring.
    pub fn search(
        &mut self,
        query: &str,
        provider: Option<&dyn EmbeddingProvider>,
        cache: Option<&EmbeddingCache>,
        limit: usize,
    ) -> Vec<SearchHit> {
        let bm25_raw = self.bm25_scores(query);
        let bm25_max = bm25_raw.values().cloned().fold(0.0_f32, f32::max);

        let query_vector = provider.and_then(|p| p.embed_query(query).ok());

        let mut combined: HashMap<String, f32> = HashMap::new();

        for (id, raw) in &bm25_raw {
            let normalized_bm25 = if bm25_max > 0.0 { raw / bm25_max } else { 0.0 };
            let cosine = self.cosine_for(id, query_vector.as_ref(), provider, cache).unwrap_or(0.0);
            let score = self.bm25_weight * normalized_bm25 + self.vector_weight * cosine;
            if score > 0.0 {
                combined.insert(id.clone(), score);
            }
        }

        if query_vector.is_some() {
            let remaining: Vec<String> = self.documents.keys().filter(|id| !bm25_raw.contains_key(*id)).cloned().collect();
            for id in remaining {
                if let Some(cosine) = self.cosine_for(&id, query_vector.as_ref(), provider, cache)
                    && cosine >= self.vector_floor
                {
                    combined.insert(id, self.vector_weight * cosine);
                }
            }
        }

        let mut hits: Vec<SearchHit> = combined.into_iter().map(|(id, score)| SearchHit { id, score }).collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        hits
    }

    /// Serialize the document set for persistence across process restarts. The spec
    /// treats the search index as ephemeral (rebuilt from the store at startup), but a
    /// snapshot lets a caller skip re-tokenizing unchanged nodes on a warm restart.
    pub fn export(&self) -> Vec<u8> {
        let docs: Vec<&IndexedDocument> = self.documents.values().collect();
        serde_json::to_vec(&docs).unwrap_or_default()
    }

    pub fn restore(&mut self, bytes: &[u8]) {
        let Ok(docs) = serde_json::from_slice::<Vec<IndexedDocument>>(bytes) else { return };
        for doc in docs {
            self.by_file.entry(doc.file_path.clone()).or_default().insert(doc.id.clone());
            self.documents.insert(doc.id.clone(), doc);
        }
        self.embedder = None;
    }
}

fn split_camel_case(word: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for c in word.chars() {
        if c.is_uppercase() && prev_lower {
            parts.push(std::mem::take(&mut current));
        }
        current.push(c);
        prev_lower = c.is_lowercase();
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

fn sparse_dot(a: &bm25::Embedding, b: &bm25::Embedding) -> f32 {
    let b_map: HashMap<u32, f32> = b.indices().iter().copied().zip(b.values().iter().copied()).collect();
    a.indices().iter().zip(a.values().iter()).map(|(idx, val)| val * b_map.get(idx).copied().unwrap_or(0.0)).sum()
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 { 0.0 } else { dot / (norm_a * norm_b) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    fn default_config() -> EmbeddingConfig {
        EmbeddingConfig { bm25_weight: 0.5, vector_weight: 0.5, vector_floor: 0.6, ..Default::default() }
    }

    /// Returns a fixed query vector regardless of text, so tests can pin exact
    /// cosine similarities against hand-picked document vectors.
    struct FixedVectorProvider {
        vector: Vec<f32>,
    }

    impl EmbeddingProvider for FixedVectorProvider {
        fn embed_document(&self, _text: &str) -> Result<Vec<f32>, CoreError> {
            Ok(self.vector.clone())
        }
        fn embed_query(&self, _text: &str) -> Result<Vec<f32>, CoreError> {
            Ok(self.vector.clone())
        }
        fn dimensions(&self) -> usize {
            self.vector.len()
        }
        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    #[test]
    fn split_camel_case_splits_on_upper_boundaries() {
        assert_eq!(split_camel_case("getUserById"), vec!["get", "User", "By", "Id"]);
    }

    #[test]
    fn expand_identifier_tokens_keeps_original_and_split_words() {
        let expanded = HybridIndex::expand_identifier_tokens("getUserById");
        assert!(expanded.contains("getUserById"));
        assert!(expanded.contains("User"));
    }

    #[test]
    fn bm25_only_search_finds_exact_token_match() {
        let mut index = HybridIndex::new(&default_config());
        index.add("a".into(), "src/a.ts".into(), "function fetchUser user service".into(), "hash-a".into());
        index.add("b".into(), "src/b.ts".into(), "function unrelated widget renderer".into(), "hash-b".into());
        let hits = index.search("fetchUser", None, None, 10);
        assert!(hits.iter().any(|h| h.id == "a"));
    }

    #[test]
    fn hybrid_backfills_cosine_onto_bm25_hits_below_the_vector_floor() {
        let mut index = HybridIndex::new(&default_config());
        index.add("validateCart".into(), "src/cart.ts".into(), "function validateCart validate order".into(), "hash-cart".into());
        index.add("bm25OnlyDoc".into(), "src/other.ts".into(), "function bm25OnlyDoc validate input".into(), "hash-other".into());

        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::open(dir.path(), "fixed").unwrap();
        cache.put("hash-cart", &[0.9, 0.435_889_9]).unwrap();
        cache.put("hash-other", &[0.4, 0.916_515_1]).unwrap();
        let provider = FixedVectorProvider { vector: vec![1.0, 0.0] };

        let hits = index.search("validate", Some(&provider), Some(&cache), 10);
        let bm25_only_hit = hits.iter().find(|h| h.id == "bm25OnlyDoc").expect("bm25OnlyDoc should be included");
        assert!(hits.iter().any(|h| h.id == "validateCart"));

        let bm25_raw = index.bm25_scores("validate");
        let bm25_max = bm25_raw.values().cloned().fold(0.0_f32, f32::max);
        let normalized = bm25_raw["bm25OnlyDoc"] / bm25_max;
        let score_without_backfill = 0.5 * normalized;

        assert!(bm25_only_hit.score > score_without_backfill);
    }

    #[test]
    fn cosine_backfill_embeds_on_cache_miss_and_persists_to_cache() {
        let mut index = HybridIndex::new(&default_config());
        index.add("validateCart".into(), "src/cart.ts".into(), "function validateCart validate order".into(), "hash-cart".into());

        let dir = tempfile::tempdir().unwrap();
        let cache = EmbeddingCache::open(dir.path(), "fixed").unwrap();
        let provider = FixedVectorProvider { vector: vec![1.0, 0.0] };

        assert!(cache.get("hash-cart").unwrap().is_none());
        let hits = index.search("validate", Some(&provider), Some(&cache), 10);
        assert!(hits.iter().any(|h| h.id == "validateCart"));
        assert!(cache.get("hash-cart").unwrap().is_some());
    }

    #[test]
    fn remove_by_file_drops_all_its_documents() {
        let mut index = HybridIndex::new(&default_config());
        index.add("a".into(), "src/a.ts".into(), "alpha".into(), "h1".into());
        index.add("b".into(), "src/a.ts".into(), "beta".into(), "h2".into());
        index.add("c".into(), "src/b.ts".into(), "gamma".into(), "h3".into());
        index.remove_by_file("src/a.ts");
        assert_eq!(index.count(), 1);
    }

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn export_restore_roundtrips_documents() {
        let mut index = HybridIndex::new(&default_config());
        index.add("a".into(), "src/a.ts".into(), "alpha".into(), "h1".into());
        let bytes = index.export();
        let mut restored = HybridIndex::new(&default_config());
        restored.restore(&bytes);
        assert_eq!(restored.count(), 1);
    }
}
