//! crates/readwithme_core/src/response_cache.rs
//!
//! The anonymous response cache: generated answers to topic and search queries,
//! shared by every user and kept for a fixed window after each refresh.

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache_key::derive_key;
use crate::domain::{
    BookAnswer, CacheEntry, CacheStats, Citation, GenerationOptions, NewCacheEntry, QueryType,
};
use crate::ports::{ContentGenerator, DatabaseService, PortError, PortResult};
use crate::prompts;

/// How long an entry stays live after it is written.
pub const DEFAULT_TTL_DAYS: i64 = 7;

#[derive(Clone)]
pub struct ResponseCache {
    db: Arc<dyn DatabaseService>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(db: Arc<dyn DatabaseService>) -> Self {
        Self { db, ttl: Duration::days(DEFAULT_TTL_DAYS) }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Returns the live entry and counts the hit.
    ///
    /// Expired rows are misses but stay in place until [`sweep`](Self::sweep).
    /// Storage failures are also reported as misses so the caller regenerates.
    pub async fn get(
        &self,
        query_type: QueryType,
        query_value: &str,
    ) -> PortResult<Option<CacheEntry>> {
        validate_query(query_value)?;
        let key = derive_key(query_type, query_value);

        match self.db.record_cache_hit(&key, Utc::now()).await {
            Ok(Some(entry)) => {
                info!(cache_key = %key, hit_count = entry.hit_count, "Cache HIT: {}", query_value);
                Ok(Some(entry))
            }
            Ok(None) => {
                info!(cache_key = %key, "Cache MISS: {}", query_value);
                Ok(None)
            }
            Err(e) => {
                warn!(cache_key = %key, error = %e, "Cache read failed, treating as miss");
                Ok(None)
            }
        }
    }

    /// Writes (or refreshes) the entry for the query. The expiry window restarts
    /// and the hit count goes back to zero. Storage errors propagate.
    pub async fn put(
        &self,
        query_type: QueryType,
        query_value: &str,
        response_text: &str,
        citations: Vec<Citation>,
    ) -> PortResult<CacheEntry> {
        validate_query(query_value)?;
        let now = Utc::now();
        let entry = NewCacheEntry {
            key: derive_key(query_type, query_value),
            query_type,
            query_value: query_value.to_string(),
            response_text: response_text.to_string(),
            citations,
            created_at: now,
            expires_at: now + self.ttl,
        };

        let saved = self.db.upsert_cache_entry(entry).await?;
        info!(cache_key = %saved.key, expires_at = %saved.expires_at, "Cached: {}", query_value);
        Ok(saved)
    }

    /// Deletes every entry whose expiry has passed and returns how many went.
    pub async fn sweep(&self) -> PortResult<u64> {
        let removed = self.db.delete_expired_cache_entries(Utc::now()).await?;
        info!(removed, "Swept expired cache entries");
        Ok(removed)
    }

    pub async fn stats(&self) -> PortResult<CacheStats> {
        let now = Utc::now();
        let entries = self.db.list_cache_entries().await?;

        let (active, expired): (Vec<_>, Vec<_>) =
            entries.iter().partition(|entry| entry.is_live_at(now));
        let total_hits: i64 = active.iter().map(|e| i64::from(e.hit_count)).sum();

        Ok(CacheStats {
            total_entries: entries.len() as u64,
            active_entries: active.len() as u64,
            expired_entries: expired.len() as u64,
            total_hits,
            average_hits_per_entry: if active.is_empty() {
                0.0
            } else {
                total_hits as f64 / active.len() as f64
            },
        })
    }

    /// Live entries, most hit first.
    pub async fn popular(&self, limit: i64) -> PortResult<Vec<CacheEntry>> {
        self.db.popular_cache_entries(Utc::now(), limit.max(0)).await
    }

    pub async fn clear(&self) -> PortResult<u64> {
        let removed = self.db.clear_cache().await?;
        warn!(removed, "Cleared the whole response cache");
        Ok(removed)
    }
}

fn validate_query(query_value: &str) -> PortResult<()> {
    if query_value.trim().is_empty() {
        return Err(PortError::Validation("query value is required".to_string()));
    }
    Ok(())
}

//=========================================================================================
// Cached book discovery
//=========================================================================================

/// Topic browsing and book search, answered from the cache when possible.
#[derive(Clone)]
pub struct BookDiscovery {
    cache: ResponseCache,
    generator: Arc<dyn ContentGenerator>,
}

impl BookDiscovery {
    pub fn new(cache: ResponseCache, generator: Arc<dyn ContentGenerator>) -> Self {
        Self { cache, generator }
    }

    pub async fn by_topic(&self, topic: &str) -> PortResult<BookAnswer> {
        self.answer(QueryType::Topic, topic, prompts::topic_prompt(topic)).await
    }

    pub async fn search(&self, query: &str) -> PortResult<BookAnswer> {
        self.answer(QueryType::Search, query, prompts::search_prompt(query)).await
    }

    async fn answer(
        &self,
        query_type: QueryType,
        query_value: &str,
        prompt: String,
    ) -> PortResult<BookAnswer> {
        if let Some(entry) = self.cache.get(query_type, query_value).await? {
            return Ok(BookAnswer {
                text: entry.response_text,
                citations: entry.citations,
                cached: true,
            });
        }

        // A generation failure returns here; nothing is cached.
        let generated = self.generator.generate(&prompt, GenerationOptions::search()).await?;

        // The answer is still served when the write fails; the next request regenerates.
        if let Err(e) = self
            .cache
            .put(query_type, query_value, &generated.text, generated.citations.clone())
            .await
        {
            warn!(error = %e, query_type = %query_type, "Failed to save answer to cache");
        }

        Ok(BookAnswer { text: generated.text, citations: generated.citations, cached: false })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryDatabase, MockGenerator};

    fn cache_over(db: &Arc<InMemoryDatabase>) -> ResponseCache {
        ResponseCache::new(db.clone())
    }

    fn cite(uri: &str) -> Citation {
        Citation { uri: uri.to_string(), title: format!("title of {}", uri) }
    }

    #[tokio::test]
    async fn put_then_get_returns_payload_with_one_hit() {
        let db = Arc::new(InMemoryDatabase::new());
        let cache = cache_over(&db);
        let cites = vec![cite("https://books.example/x")];

        cache.put(QueryType::Topic, "X", "five books", cites.clone()).await.unwrap();
        let entry = cache.get(QueryType::Topic, "X").await.unwrap().expect("live entry");

        assert_eq!(entry.response_text, "five books");
        assert_eq!(entry.citations, cites);
        assert_eq!(entry.hit_count, 1);
    }

    #[tokio::test]
    async fn every_get_counts_one_hit() {
        let db = Arc::new(InMemoryDatabase::new());
        let cache = cache_over(&db);
        cache.put(QueryType::Search, "dune", "T", Vec::new()).await.unwrap();

        for _ in 0..5 {
            cache.get(QueryType::Search, "dune").await.unwrap();
        }

        let key = derive_key(QueryType::Search, "dune");
        assert_eq!(db.cache_row(&key).unwrap().hit_count, 5);
    }

    #[tokio::test]
    async fn lookups_ignore_case() {
        let db = Arc::new(InMemoryDatabase::new());
        let cache = cache_over(&db);
        cache.put(QueryType::Topic, "Science Fiction", "T", Vec::new()).await.unwrap();

        assert!(cache.get(QueryType::Topic, "science fiction").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn expired_entry_is_a_miss_but_stays_until_swept() {
        let db = Arc::new(InMemoryDatabase::new());
        let cache = cache_over(&db);
        cache.put(QueryType::Topic, "poetry", "T", Vec::new()).await.unwrap();
        let key = derive_key(QueryType::Topic, "poetry");
        db.set_cache_expiry(&key, Utc::now() - Duration::seconds(1));

        assert!(cache.get(QueryType::Topic, "poetry").await.unwrap().is_none());
        let row = db.cache_row(&key).expect("row still present");
        assert_eq!(row.hit_count, 0);
    }

    #[tokio::test]
    async fn sweep_removes_exactly_the_expired_rows() {
        let db = Arc::new(InMemoryDatabase::new());
        let cache = cache_over(&db);
        for topic in ["a", "b", "c"] {
            cache.put(QueryType::Topic, topic, "T", Vec::new()).await.unwrap();
        }
        let past = Utc::now() - Duration::hours(1);
        db.set_cache_expiry(&derive_key(QueryType::Topic, "a"), past);
        db.set_cache_expiry(&derive_key(QueryType::Topic, "b"), past);

        assert_eq!(cache.sweep().await.unwrap(), 2);
        assert_eq!(db.cache_len(), 1);
        assert!(cache.get(QueryType::Topic, "c").await.unwrap().is_some());
        assert_eq!(cache.sweep().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn refresh_replaces_payload_and_resets_hits() {
        let db = Arc::new(InMemoryDatabase::new());
        let cache = cache_over(&db);
        cache.put(QueryType::Search, "dune", "old", Vec::new()).await.unwrap();
        cache.get(QueryType::Search, "dune").await.unwrap();
        cache.get(QueryType::Search, "dune").await.unwrap();

        let refreshed = cache.put(QueryType::Search, "Dune", "new", Vec::new()).await.unwrap();

        assert_eq!(refreshed.hit_count, 0);
        assert_eq!(db.cache_len(), 1);
        let entry = cache.get(QueryType::Search, "dune").await.unwrap().unwrap();
        assert_eq!(entry.response_text, "new");
        assert_eq!(entry.hit_count, 1);
    }

    #[tokio::test]
    async fn read_failure_is_a_miss_and_write_failure_propagates() {
        let db = Arc::new(InMemoryDatabase::new());
        let cache = cache_over(&db);
        cache.put(QueryType::Topic, "history", "T", Vec::new()).await.unwrap();

        db.fail_reads(true);
        assert!(cache.get(QueryType::Topic, "history").await.unwrap().is_none());

        db.fail_writes(true);
        let err = cache.put(QueryType::Topic, "history", "T2", Vec::new()).await.unwrap_err();
        assert!(matches!(err, PortError::Storage(_)));
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let cache = cache_over(&Arc::new(InMemoryDatabase::new()));
        assert!(matches!(
            cache.get(QueryType::Topic, "  ").await,
            Err(PortError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn stats_count_live_hits_only() {
        let db = Arc::new(InMemoryDatabase::new());
        let cache = cache_over(&db);
        cache.put(QueryType::Topic, "a", "T", Vec::new()).await.unwrap();
        cache.put(QueryType::Topic, "b", "T", Vec::new()).await.unwrap();
        cache.get(QueryType::Topic, "a").await.unwrap();
        cache.get(QueryType::Topic, "a").await.unwrap();
        cache.get(QueryType::Topic, "b").await.unwrap();
        cache.put(QueryType::Topic, "old", "T", Vec::new()).await.unwrap();
        db.set_cache_expiry(&derive_key(QueryType::Topic, "old"), Utc::now() - Duration::days(1));

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.active_entries, 2);
        assert_eq!(stats.expired_entries, 1);
        assert_eq!(stats.total_hits, 3);
        assert!((stats.average_hits_per_entry - 1.5).abs() < f64::EPSILON);

        let popular = cache.popular(1).await.unwrap();
        assert_eq!(popular.len(), 1);
        assert_eq!(popular[0].query_value, "a");
    }

    #[tokio::test]
    async fn search_miss_generates_caches_and_then_hits() {
        let db = Arc::new(InMemoryDatabase::new());
        let cites = vec![cite("https://books.example/dune")];
        let generator = Arc::new(
            MockGenerator::replying("### Dune by Frank Herbert | 1965").with_citations(cites.clone()),
        );
        let discovery = BookDiscovery::new(cache_over(&db), generator.clone());

        let first = discovery.search("dune").await.unwrap();
        assert!(!first.cached);
        assert_eq!(generator.calls(), 1);
        assert_eq!(generator.last_options(), Some(GenerationOptions::search()));

        let second = discovery.search("dune").await.unwrap();
        assert!(second.cached);
        assert_eq!(second.text, first.text);
        assert_eq!(second.citations, cites);
        assert_eq!(generator.calls(), 1);
        let key = derive_key(QueryType::Search, "dune");
        assert_eq!(db.cache_row(&key).unwrap().hit_count, 1);
    }

    #[tokio::test]
    async fn generation_failure_caches_nothing() {
        let db = Arc::new(InMemoryDatabase::new());
        let discovery = BookDiscovery::new(cache_over(&db), Arc::new(MockGenerator::failing()));

        let err = discovery.by_topic("history").await.unwrap_err();
        assert!(matches!(err, PortError::Generation(_)));
        assert_eq!(db.cache_len(), 0);
    }

    #[tokio::test]
    async fn fresh_answer_is_served_when_cache_write_fails() {
        let db = Arc::new(InMemoryDatabase::new());
        db.fail_writes(true);
        let discovery =
            BookDiscovery::new(cache_over(&db), Arc::new(MockGenerator::replying("books")));

        let answer = discovery.by_topic("history").await.unwrap();
        assert_eq!(answer.text, "books");
        assert!(!answer.cached);
    }

    #[tokio::test]
    async fn parallel_misses_converge_on_one_row() {
        let db = Arc::new(InMemoryDatabase::new());
        let generator = Arc::new(MockGenerator::replying("books"));
        let discovery = BookDiscovery::new(cache_over(&db), generator.clone());

        let (a, b) = futures::join!(discovery.by_topic("art"), discovery.by_topic("Art"));
        assert_eq!(a.unwrap().text, "books");
        assert_eq!(b.unwrap().text, "books");
        assert_eq!(db.cache_len(), 1);
    }
}
