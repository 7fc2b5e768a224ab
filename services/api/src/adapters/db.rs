//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Every write is a single statement. Upserts go through `ON CONFLICT` on the
//! table's unique key and hit counting is an atomic `UPDATE ... RETURNING`, so
//! concurrent requests never need an application-level lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use readwithme_core::domain::{
    BookDetails, BookFlag, BookRef, CacheEntry, Citation, NewCacheEntry, NewQuizAttempt,
    QuizAnswer, QuizAttempt, ReadingRecord, TranslatedGuide, User, UserBook, UserProfile,
};
use readwithme_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn storage(e: sqlx::Error) -> PortError {
    PortError::Storage(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const CACHE_COLUMNS: &str = "cache_key, query_type, query_value, response_text, citations_json, \
                             created_at, expires_at, hit_count";

#[derive(FromRow)]
struct CacheRecord {
    cache_key: String,
    query_type: String,
    query_value: String,
    response_text: String,
    citations_json: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    hit_count: i32,
}
impl CacheRecord {
    fn to_domain(self) -> PortResult<CacheEntry> {
        let citations = match self.citations_json.as_deref() {
            None | Some("") => Vec::new(),
            Some(json) => serde_json::from_str::<Vec<Citation>>(json).map_err(|e| {
                PortError::Storage(format!("corrupt citations for {}: {}", self.cache_key, e))
            })?,
        };
        Ok(CacheEntry {
            query_type: self.query_type.parse()?,
            key: self.cache_key,
            query_value: self.query_value,
            response_text: self.response_text,
            citations,
            created_at: self.created_at,
            expires_at: self.expires_at,
            hit_count: self.hit_count,
        })
    }
}

const USER_COLUMNS: &str =
    "user_id, email, username, first_name, last_name, created_at, updated_at";

#[derive(FromRow)]
struct UserRecord {
    user_id: String,
    email: Option<String>,
    username: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl UserRecord {
    fn to_domain(self) -> User {
        User {
            profile: UserProfile {
                user_id: self.user_id,
                email: self.email,
                username: self.username,
                first_name: self.first_name,
                last_name: self.last_name,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const BOOK_COLUMNS: &str = "user_id, book_title, book_author, published_date, topic, \
                            is_bookmarked, is_favorite, created_at, updated_at";

#[derive(FromRow)]
struct UserBookRecord {
    user_id: String,
    book_title: String,
    book_author: String,
    published_date: Option<String>,
    topic: Option<String>,
    is_bookmarked: bool,
    is_favorite: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl UserBookRecord {
    fn to_domain(self) -> UserBook {
        UserBook {
            user_id: self.user_id,
            book_title: self.book_title,
            book_author: self.book_author,
            published_date: self.published_date,
            topic: self.topic,
            is_bookmarked: self.is_bookmarked,
            is_favorite: self.is_favorite,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const READING_COLUMNS: &str = "user_id, book_title, book_author, last_read_at, \
                               reading_guide_content, language_code, progress_percentage, updated_at";

#[derive(FromRow)]
struct ReadingRecordRow {
    user_id: String,
    book_title: String,
    book_author: String,
    last_read_at: DateTime<Utc>,
    reading_guide_content: Option<String>,
    language_code: String,
    progress_percentage: i32,
    updated_at: DateTime<Utc>,
}
impl ReadingRecordRow {
    fn to_domain(self) -> ReadingRecord {
        ReadingRecord {
            user_id: self.user_id,
            book_title: self.book_title,
            book_author: self.book_author,
            last_read_at: self.last_read_at,
            reading_guide_content: self.reading_guide_content,
            language_code: self.language_code,
            progress_percentage: self.progress_percentage,
            updated_at: self.updated_at,
        }
    }
}

const TRANSLATION_COLUMNS: &str =
    "user_id, book_title, book_author, language_code, translated_content, updated_at";

#[derive(FromRow)]
struct TranslationRecord {
    user_id: String,
    book_title: String,
    book_author: String,
    language_code: String,
    translated_content: String,
    updated_at: DateTime<Utc>,
}
impl TranslationRecord {
    fn to_domain(self) -> TranslatedGuide {
        TranslatedGuide {
            user_id: self.user_id,
            book_title: self.book_title,
            book_author: self.book_author,
            language_code: self.language_code,
            translated_content: self.translated_content,
            updated_at: self.updated_at,
        }
    }
}

const QUIZ_COLUMNS: &str = "id, user_id, book_title, book_author, score, total_questions, \
                            answers_json, completed_at";

#[derive(FromRow)]
struct QuizAttemptRecord {
    id: i64,
    user_id: String,
    book_title: String,
    book_author: String,
    score: i32,
    total_questions: i32,
    answers_json: String,
    completed_at: DateTime<Utc>,
}
impl QuizAttemptRecord {
    fn to_domain(self) -> PortResult<QuizAttempt> {
        let answers = serde_json::from_str::<Vec<QuizAnswer>>(&self.answers_json).map_err(|e| {
            PortError::Storage(format!("corrupt answers for quiz attempt {}: {}", self.id, e))
        })?;
        Ok(QuizAttempt {
            id: self.id,
            user_id: self.user_id,
            book_title: self.book_title,
            book_author: self.book_author,
            score: self.score,
            total_questions: self.total_questions,
            answers,
            completed_at: self.completed_at,
        })
    }
}

fn flag_column(flag: BookFlag) -> &'static str {
    match flag {
        BookFlag::Bookmarked => "is_bookmarked",
        BookFlag::Favorite => "is_favorite",
    }
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    // --- Anonymous response cache ---

    async fn upsert_cache_entry(&self, entry: NewCacheEntry) -> PortResult<CacheEntry> {
        let citations_json = serde_json::to_string(&entry.citations)
            .map_err(|e| PortError::Storage(e.to_string()))?;

        let sql = format!(
            "INSERT INTO book_cache (cache_key, query_type, query_value, response_text, \
                                     citations_json, created_at, expires_at, hit_count) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, 0) \
             ON CONFLICT (cache_key) DO UPDATE SET \
                 query_type = EXCLUDED.query_type, \
                 query_value = EXCLUDED.query_value, \
                 response_text = EXCLUDED.response_text, \
                 citations_json = EXCLUDED.citations_json, \
                 created_at = EXCLUDED.created_at, \
                 expires_at = EXCLUDED.expires_at, \
                 hit_count = 0 \
             RETURNING {}",
            CACHE_COLUMNS
        );
        let record = sqlx::query_as::<_, CacheRecord>(&sql)
            .bind(&entry.key)
            .bind(entry.query_type.as_str())
            .bind(&entry.query_value)
            .bind(&entry.response_text)
            .bind(citations_json)
            .bind(entry.created_at)
            .bind(entry.expires_at)
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;
        record.to_domain()
    }

    async fn record_cache_hit(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> PortResult<Option<CacheEntry>> {
        let sql = format!(
            "UPDATE book_cache SET hit_count = hit_count + 1 \
             WHERE cache_key = $1 AND expires_at > $2 \
             RETURNING {}",
            CACHE_COLUMNS
        );
        let record = sqlx::query_as::<_, CacheRecord>(&sql)
            .bind(key)
            .bind(now)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        record.map(CacheRecord::to_domain).transpose()
    }

    async fn delete_expired_cache_entries(&self, now: DateTime<Utc>) -> PortResult<u64> {
        let result = sqlx::query("DELETE FROM book_cache WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(result.rows_affected())
    }

    async fn list_cache_entries(&self) -> PortResult<Vec<CacheEntry>> {
        let sql = format!("SELECT {} FROM book_cache", CACHE_COLUMNS);
        let records = sqlx::query_as::<_, CacheRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        records.into_iter().map(CacheRecord::to_domain).collect()
    }

    async fn popular_cache_entries(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> PortResult<Vec<CacheEntry>> {
        let sql = format!(
            "SELECT {} FROM book_cache WHERE expires_at > $1 ORDER BY hit_count DESC LIMIT $2",
            CACHE_COLUMNS
        );
        let records = sqlx::query_as::<_, CacheRecord>(&sql)
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        records.into_iter().map(CacheRecord::to_domain).collect()
    }

    async fn clear_cache(&self) -> PortResult<u64> {
        let result = sqlx::query("DELETE FROM book_cache")
            .execute(&self.pool)
            .await
            .map_err(storage)?;
        Ok(result.rows_affected())
    }

    // --- Users ---

    async fn upsert_user(&self, profile: UserProfile, now: DateTime<Utc>) -> PortResult<User> {
        let sql = format!(
            "INSERT INTO users (user_id, email, username, first_name, last_name, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) \
             ON CONFLICT (user_id) DO UPDATE SET \
                 email = EXCLUDED.email, \
                 username = EXCLUDED.username, \
                 first_name = EXCLUDED.first_name, \
                 last_name = EXCLUDED.last_name, \
                 updated_at = EXCLUDED.updated_at \
             RETURNING {}",
            USER_COLUMNS
        );
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(&profile.user_id)
            .bind(&profile.email)
            .bind(&profile.username)
            .bind(&profile.first_name)
            .bind(&profile.last_name)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;
        Ok(record.to_domain())
    }

    async fn get_user(&self, user_id: &str) -> PortResult<User> {
        let sql = format!("SELECT {} FROM users WHERE user_id = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserRecord>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?
            .map(UserRecord::to_domain)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    // --- Books and reading history ---

    async fn touch_book(
        &self,
        book: &BookRef,
        details: &BookDetails,
        now: DateTime<Utc>,
    ) -> PortResult<UserBook> {
        let sql = format!(
            "INSERT INTO user_books (user_id, book_title, book_author, published_date, topic, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) \
             ON CONFLICT (user_id, book_title, book_author) DO UPDATE SET \
                 published_date = COALESCE(EXCLUDED.published_date, user_books.published_date), \
                 topic = COALESCE(EXCLUDED.topic, user_books.topic), \
                 updated_at = EXCLUDED.updated_at \
             RETURNING {}",
            BOOK_COLUMNS
        );
        let record = sqlx::query_as::<_, UserBookRecord>(&sql)
            .bind(&book.user_id)
            .bind(&book.title)
            .bind(&book.author)
            .bind(&details.published_date)
            .bind(&details.topic)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;

        sqlx::query(
            "INSERT INTO reading_progress (user_id, book_title, book_author, last_read_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $4, $4) \
             ON CONFLICT (user_id, book_title, book_author) DO UPDATE SET \
                 last_read_at = EXCLUDED.last_read_at",
        )
        .bind(&book.user_id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(storage)?;

        Ok(record.to_domain())
    }

    async fn get_reading_history(
        &self,
        user_id: &str,
        limit: i64,
    ) -> PortResult<Vec<ReadingRecord>> {
        let sql = format!(
            "SELECT {} FROM reading_progress WHERE user_id = $1 ORDER BY last_read_at DESC LIMIT $2",
            READING_COLUMNS
        );
        let records = sqlx::query_as::<_, ReadingRecordRow>(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        Ok(records.into_iter().map(ReadingRecordRow::to_domain).collect())
    }

    async fn list_user_books(&self, user_id: &str) -> PortResult<Vec<UserBook>> {
        let sql = format!(
            "SELECT {} FROM user_books WHERE user_id = $1 ORDER BY updated_at DESC",
            BOOK_COLUMNS
        );
        let records = sqlx::query_as::<_, UserBookRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        Ok(records.into_iter().map(UserBookRecord::to_domain).collect())
    }

    async fn list_bookmarked_books(&self, user_id: &str) -> PortResult<Vec<UserBook>> {
        let sql = format!(
            "SELECT {} FROM user_books WHERE user_id = $1 AND is_bookmarked ORDER BY updated_at DESC",
            BOOK_COLUMNS
        );
        let records = sqlx::query_as::<_, UserBookRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        Ok(records.into_iter().map(UserBookRecord::to_domain).collect())
    }

    async fn list_favorite_books(&self, user_id: &str) -> PortResult<Vec<UserBook>> {
        let sql = format!(
            "SELECT {} FROM user_books WHERE user_id = $1 AND is_favorite ORDER BY updated_at DESC",
            BOOK_COLUMNS
        );
        let records = sqlx::query_as::<_, UserBookRecord>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        Ok(records.into_iter().map(UserBookRecord::to_domain).collect())
    }

    async fn toggle_book_flag(
        &self,
        book: &BookRef,
        flag: BookFlag,
        now: DateTime<Utc>,
    ) -> PortResult<UserBook> {
        let column = flag_column(flag);
        let sql = format!(
            "INSERT INTO user_books (user_id, book_title, book_author, {col}, created_at, updated_at) \
             VALUES ($1, $2, $3, TRUE, $4, $4) \
             ON CONFLICT (user_id, book_title, book_author) DO UPDATE SET \
                 {col} = NOT user_books.{col}, \
                 updated_at = EXCLUDED.updated_at \
             RETURNING {cols}",
            col = column,
            cols = BOOK_COLUMNS
        );
        let record = sqlx::query_as::<_, UserBookRecord>(&sql)
            .bind(&book.user_id)
            .bind(&book.title)
            .bind(&book.author)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;
        Ok(record.to_domain())
    }

    // --- Reading guides and progress ---

    async fn upsert_reading_guide(
        &self,
        book: &BookRef,
        content: &str,
        language_code: &str,
        now: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO reading_progress (user_id, book_title, book_author, reading_guide_content, \
                                           language_code, last_read_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $6, $6) \
             ON CONFLICT (user_id, book_title, book_author) DO UPDATE SET \
                 reading_guide_content = EXCLUDED.reading_guide_content, \
                 language_code = EXCLUDED.language_code, \
                 updated_at = EXCLUDED.updated_at",
        )
        .bind(&book.user_id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(content)
        .bind(language_code)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn get_reading_record(&self, book: &BookRef) -> PortResult<Option<ReadingRecord>> {
        let sql = format!(
            "SELECT {} FROM reading_progress WHERE user_id = $1 AND book_title = $2 AND book_author = $3",
            READING_COLUMNS
        );
        let record = sqlx::query_as::<_, ReadingRecordRow>(&sql)
            .bind(&book.user_id)
            .bind(&book.title)
            .bind(&book.author)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        Ok(record.map(ReadingRecordRow::to_domain))
    }

    async fn update_reading_progress(
        &self,
        book: &BookRef,
        percentage: i32,
        now: DateTime<Utc>,
    ) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE reading_progress SET progress_percentage = $4, updated_at = $5 \
             WHERE user_id = $1 AND book_title = $2 AND book_author = $3",
        )
        .bind(&book.user_id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(percentage)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(result.rows_affected() > 0)
    }

    // --- Translations ---

    async fn get_translation(
        &self,
        book: &BookRef,
        language_code: &str,
    ) -> PortResult<Option<TranslatedGuide>> {
        let sql = format!(
            "SELECT {} FROM translated_reading_guides \
             WHERE user_id = $1 AND book_title = $2 AND book_author = $3 AND language_code = $4",
            TRANSLATION_COLUMNS
        );
        let record = sqlx::query_as::<_, TranslationRecord>(&sql)
            .bind(&book.user_id)
            .bind(&book.title)
            .bind(&book.author)
            .bind(language_code)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage)?;
        Ok(record.map(TranslationRecord::to_domain))
    }

    async fn upsert_translation(
        &self,
        book: &BookRef,
        language_code: &str,
        content: &str,
        now: DateTime<Utc>,
    ) -> PortResult<TranslatedGuide> {
        let sql = format!(
            "INSERT INTO translated_reading_guides (user_id, book_title, book_author, language_code, \
                                                    translated_content, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $6) \
             ON CONFLICT (user_id, book_title, book_author, language_code) DO UPDATE SET \
                 translated_content = EXCLUDED.translated_content, \
                 updated_at = EXCLUDED.updated_at \
             RETURNING {}",
            TRANSLATION_COLUMNS
        );
        let record = sqlx::query_as::<_, TranslationRecord>(&sql)
            .bind(&book.user_id)
            .bind(&book.title)
            .bind(&book.author)
            .bind(language_code)
            .bind(content)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;
        Ok(record.to_domain())
    }

    // --- Quiz attempts ---

    async fn insert_quiz_attempt(
        &self,
        attempt: NewQuizAttempt,
        now: DateTime<Utc>,
    ) -> PortResult<QuizAttempt> {
        let answers_json = serde_json::to_string(&attempt.answers)
            .map_err(|e| PortError::Storage(e.to_string()))?;
        let sql = format!(
            "INSERT INTO quiz_attempts (user_id, book_title, book_author, score, total_questions, \
                                        answers_json, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {}",
            QUIZ_COLUMNS
        );
        let record = sqlx::query_as::<_, QuizAttemptRecord>(&sql)
            .bind(&attempt.book.user_id)
            .bind(&attempt.book.title)
            .bind(&attempt.book.author)
            .bind(attempt.score)
            .bind(attempt.total_questions)
            .bind(answers_json)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(storage)?;
        record.to_domain()
    }

    async fn list_quiz_attempts(&self, book: &BookRef) -> PortResult<Vec<QuizAttempt>> {
        let sql = format!(
            "SELECT {} FROM quiz_attempts \
             WHERE user_id = $1 AND book_title = $2 AND book_author = $3 \
             ORDER BY completed_at DESC, id DESC",
            QUIZ_COLUMNS
        );
        let records = sqlx::query_as::<_, QuizAttemptRecord>(&sql)
            .bind(&book.user_id)
            .bind(&book.title)
            .bind(&book.author)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        records.into_iter().map(QuizAttemptRecord::to_domain).collect()
    }

    async fn list_user_quiz_attempts(
        &self,
        user_id: &str,
        limit: i64,
    ) -> PortResult<Vec<QuizAttempt>> {
        let sql = format!(
            "SELECT {} FROM quiz_attempts WHERE user_id = $1 \
             ORDER BY completed_at DESC, id DESC LIMIT $2",
            QUIZ_COLUMNS
        );
        let records = sqlx::query_as::<_, QuizAttemptRecord>(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;
        records.into_iter().map(QuizAttemptRecord::to_domain).collect()
    }
}
