//! crates/readwithme_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete database and generation backends.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    BookDetails, BookFlag, BookRef, CacheEntry, GeneratedContent, GenerationOptions,
    NewCacheEntry, NewQuizAttempt, QuizAttempt, ReadingRecord, TranslatedGuide, User,
    UserBook, UserProfile,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// The error type shared by every port and core service.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Generation failed: {0}")]
    Generation(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Persistence for every table the backend owns.
///
/// Writes are single-row upserts keyed by the table's unique constraint, so two
/// racing requests for the same key converge instead of duplicating rows.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Anonymous response cache ---
    async fn upsert_cache_entry(&self, entry: NewCacheEntry) -> PortResult<CacheEntry>;

    /// Atomically increments the hit counter of the live entry for `key` and
    /// returns it. Expired or absent entries yield `None` and are not touched.
    async fn record_cache_hit(&self, key: &str, now: DateTime<Utc>)
        -> PortResult<Option<CacheEntry>>;

    async fn delete_expired_cache_entries(&self, now: DateTime<Utc>) -> PortResult<u64>;

    async fn list_cache_entries(&self) -> PortResult<Vec<CacheEntry>>;

    async fn popular_cache_entries(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> PortResult<Vec<CacheEntry>>;

    async fn clear_cache(&self) -> PortResult<u64>;

    // --- Users ---
    async fn upsert_user(&self, profile: UserProfile, now: DateTime<Utc>) -> PortResult<User>;

    async fn get_user(&self, user_id: &str) -> PortResult<User>;

    // --- Books and reading history ---

    /// Upserts the user's book row and refreshes `last_read_at` on the reading record.
    async fn touch_book(
        &self,
        book: &BookRef,
        details: &BookDetails,
        now: DateTime<Utc>,
    ) -> PortResult<UserBook>;

    async fn get_reading_history(&self, user_id: &str, limit: i64)
        -> PortResult<Vec<ReadingRecord>>;

    async fn list_user_books(&self, user_id: &str) -> PortResult<Vec<UserBook>>;

    async fn list_bookmarked_books(&self, user_id: &str) -> PortResult<Vec<UserBook>>;

    async fn list_favorite_books(&self, user_id: &str) -> PortResult<Vec<UserBook>>;

    /// Flips `flag` on an existing row, or creates the row with `flag` set.
    async fn toggle_book_flag(
        &self,
        book: &BookRef,
        flag: BookFlag,
        now: DateTime<Utc>,
    ) -> PortResult<UserBook>;

    // --- Reading guides and progress ---
    async fn upsert_reading_guide(
        &self,
        book: &BookRef,
        content: &str,
        language_code: &str,
        now: DateTime<Utc>,
    ) -> PortResult<()>;

    async fn get_reading_record(&self, book: &BookRef) -> PortResult<Option<ReadingRecord>>;

    /// Returns `false` when no reading record exists for the book.
    async fn update_reading_progress(
        &self,
        book: &BookRef,
        percentage: i32,
        now: DateTime<Utc>,
    ) -> PortResult<bool>;

    // --- Translations ---
    async fn get_translation(
        &self,
        book: &BookRef,
        language_code: &str,
    ) -> PortResult<Option<TranslatedGuide>>;

    async fn upsert_translation(
        &self,
        book: &BookRef,
        language_code: &str,
        content: &str,
        now: DateTime<Utc>,
    ) -> PortResult<TranslatedGuide>;

    // --- Quiz attempts (append-only) ---
    async fn insert_quiz_attempt(
        &self,
        attempt: NewQuizAttempt,
        now: DateTime<Utc>,
    ) -> PortResult<QuizAttempt>;

    /// All attempts for one book, most recent first.
    async fn list_quiz_attempts(&self, book: &BookRef) -> PortResult<Vec<QuizAttempt>>;

    async fn list_user_quiz_attempts(&self, user_id: &str, limit: i64)
        -> PortResult<Vec<QuizAttempt>>;
}

/// The external language-generation service.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Generates text for `prompt`. Implementations apply
    /// [`GenerationOptions::effective`], so JSON mode silently disables search.
    async fn generate(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> PortResult<GeneratedContent>;
}
