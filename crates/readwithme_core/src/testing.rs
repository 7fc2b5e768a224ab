//! Test doubles for the ports: an in-memory database that honours the same
//! unique keys as the SQL schema, and a call-counting generator.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::domain::{
    BookDetails, BookFlag, BookRef, CacheEntry, Citation, GeneratedContent, GenerationOptions,
    NewCacheEntry, NewQuizAttempt, QuizAttempt, ReadingRecord, TranslatedGuide, User, UserBook,
    UserProfile,
};
use crate::languages::SOURCE_LANGUAGE;
use crate::ports::{ContentGenerator, DatabaseService, PortError, PortResult};

type BookKey = (String, String, String);

fn book_key(book: &BookRef) -> BookKey {
    (book.user_id.clone(), book.title.clone(), book.author.clone())
}

#[derive(Default)]
struct Tables {
    cache: HashMap<String, CacheEntry>,
    users: HashMap<String, User>,
    books: HashMap<BookKey, UserBook>,
    reading: HashMap<BookKey, ReadingRecord>,
    translations: HashMap<(BookKey, String), TranslatedGuide>,
    quiz_attempts: Vec<QuizAttempt>,
}

#[derive(Default)]
pub struct InMemoryDatabase {
    tables: Mutex<Tables>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_translation_reads: AtomicBool,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Fails only `get_translation`, leaving every other read working.
    pub fn fail_translation_reads(&self, fail: bool) {
        self.fail_translation_reads.store(fail, Ordering::SeqCst);
    }

    /// Raw row access, bypassing hit counting.
    pub fn cache_row(&self, key: &str) -> Option<CacheEntry> {
        self.tables.lock().unwrap().cache.get(key).cloned()
    }

    pub fn set_cache_expiry(&self, key: &str, expires_at: DateTime<Utc>) {
        if let Some(entry) = self.tables.lock().unwrap().cache.get_mut(key) {
            entry.expires_at = expires_at;
        }
    }

    pub fn cache_len(&self) -> usize {
        self.tables.lock().unwrap().cache.len()
    }

    pub fn translation_count(&self) -> usize {
        self.tables.lock().unwrap().translations.len()
    }

    fn check_read(&self) -> PortResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(PortError::Storage("connection refused".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> PortResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PortError::Storage("write rejected".to_string()));
        }
        Ok(())
    }
}

fn empty_reading_record(book: &BookRef, now: DateTime<Utc>) -> ReadingRecord {
    ReadingRecord {
        user_id: book.user_id.clone(),
        book_title: book.title.clone(),
        book_author: book.author.clone(),
        last_read_at: now,
        reading_guide_content: None,
        language_code: SOURCE_LANGUAGE.to_string(),
        progress_percentage: 0,
        updated_at: now,
    }
}

fn empty_user_book(book: &BookRef, now: DateTime<Utc>) -> UserBook {
    UserBook {
        user_id: book.user_id.clone(),
        book_title: book.title.clone(),
        book_author: book.author.clone(),
        published_date: None,
        topic: None,
        is_bookmarked: false,
        is_favorite: false,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl DatabaseService for InMemoryDatabase {
    async fn upsert_cache_entry(&self, entry: NewCacheEntry) -> PortResult<CacheEntry> {
        self.check_write()?;
        let row = CacheEntry {
            key: entry.key.clone(),
            query_type: entry.query_type,
            query_value: entry.query_value,
            response_text: entry.response_text,
            citations: entry.citations,
            created_at: entry.created_at,
            expires_at: entry.expires_at,
            hit_count: 0,
        };
        self.tables.lock().unwrap().cache.insert(entry.key, row.clone());
        Ok(row)
    }

    async fn record_cache_hit(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> PortResult<Option<CacheEntry>> {
        self.check_read()?;
        let mut tables = self.tables.lock().unwrap();
        Ok(tables.cache.get_mut(key).filter(|e| e.expires_at > now).map(|entry| {
            entry.hit_count += 1;
            entry.clone()
        }))
    }

    async fn delete_expired_cache_entries(&self, now: DateTime<Utc>) -> PortResult<u64> {
        self.check_write()?;
        let mut tables = self.tables.lock().unwrap();
        let before = tables.cache.len();
        tables.cache.retain(|_, e| e.expires_at > now);
        Ok((before - tables.cache.len()) as u64)
    }

    async fn list_cache_entries(&self) -> PortResult<Vec<CacheEntry>> {
        self.check_read()?;
        Ok(self.tables.lock().unwrap().cache.values().cloned().collect())
    }

    async fn popular_cache_entries(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> PortResult<Vec<CacheEntry>> {
        self.check_read()?;
        let mut live: Vec<CacheEntry> = self
            .tables
            .lock()
            .unwrap()
            .cache
            .values()
            .filter(|e| e.expires_at > now)
            .cloned()
            .collect();
        live.sort_by(|a, b| b.hit_count.cmp(&a.hit_count));
        live.truncate(limit.max(0) as usize);
        Ok(live)
    }

    async fn clear_cache(&self) -> PortResult<u64> {
        self.check_write()?;
        let mut tables = self.tables.lock().unwrap();
        let removed = tables.cache.len() as u64;
        tables.cache.clear();
        Ok(removed)
    }

    async fn upsert_user(&self, profile: UserProfile, now: DateTime<Utc>) -> PortResult<User> {
        self.check_write()?;
        let mut tables = self.tables.lock().unwrap();
        let user = tables
            .users
            .entry(profile.user_id.clone())
            .and_modify(|u| {
                u.profile = profile.clone();
                u.updated_at = now;
            })
            .or_insert_with(|| User { profile, created_at: now, updated_at: now });
        Ok(user.clone())
    }

    async fn get_user(&self, user_id: &str) -> PortResult<User> {
        self.check_read()?;
        self.tables
            .lock()
            .unwrap()
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn touch_book(
        &self,
        book: &BookRef,
        details: &BookDetails,
        now: DateTime<Utc>,
    ) -> PortResult<UserBook> {
        self.check_write()?;
        let mut tables = self.tables.lock().unwrap();
        let key = book_key(book);
        let row = tables
            .books
            .entry(key.clone())
            .or_insert_with(|| empty_user_book(book, now));
        if details.published_date.is_some() {
            row.published_date = details.published_date.clone();
        }
        if details.topic.is_some() {
            row.topic = details.topic.clone();
        }
        row.updated_at = now;
        let row = row.clone();
        tables
            .reading
            .entry(key)
            .or_insert_with(|| empty_reading_record(book, now))
            .last_read_at = now;
        Ok(row)
    }

    async fn get_reading_history(
        &self,
        user_id: &str,
        limit: i64,
    ) -> PortResult<Vec<ReadingRecord>> {
        self.check_read()?;
        let mut rows: Vec<ReadingRecord> = self
            .tables
            .lock()
            .unwrap()
            .reading
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.last_read_at.cmp(&a.last_read_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn list_user_books(&self, user_id: &str) -> PortResult<Vec<UserBook>> {
        self.check_read()?;
        let mut rows: Vec<UserBook> = self
            .tables
            .lock()
            .unwrap()
            .books
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(rows)
    }

    async fn list_bookmarked_books(&self, user_id: &str) -> PortResult<Vec<UserBook>> {
        let books = self.list_user_books(user_id).await?;
        Ok(books.into_iter().filter(|b| b.is_bookmarked).collect())
    }

    async fn list_favorite_books(&self, user_id: &str) -> PortResult<Vec<UserBook>> {
        let books = self.list_user_books(user_id).await?;
        Ok(books.into_iter().filter(|b| b.is_favorite).collect())
    }

    async fn toggle_book_flag(
        &self,
        book: &BookRef,
        flag: BookFlag,
        now: DateTime<Utc>,
    ) -> PortResult<UserBook> {
        self.check_write()?;
        let mut tables = self.tables.lock().unwrap();
        let key = book_key(book);
        let row = match tables.books.get_mut(&key) {
            Some(existing) => {
                match flag {
                    BookFlag::Bookmarked => existing.is_bookmarked = !existing.is_bookmarked,
                    BookFlag::Favorite => existing.is_favorite = !existing.is_favorite,
                }
                existing.updated_at = now;
                existing.clone()
            }
            None => {
                let mut fresh = empty_user_book(book, now);
                match flag {
                    BookFlag::Bookmarked => fresh.is_bookmarked = true,
                    BookFlag::Favorite => fresh.is_favorite = true,
                }
                tables.books.insert(key, fresh.clone());
                fresh
            }
        };
        Ok(row)
    }

    async fn upsert_reading_guide(
        &self,
        book: &BookRef,
        content: &str,
        language_code: &str,
        now: DateTime<Utc>,
    ) -> PortResult<()> {
        self.check_write()?;
        let mut tables = self.tables.lock().unwrap();
        let record = tables
            .reading
            .entry(book_key(book))
            .or_insert_with(|| empty_reading_record(book, now));
        record.reading_guide_content = Some(content.to_string());
        record.language_code = language_code.to_string();
        record.updated_at = now;
        Ok(())
    }

    async fn get_reading_record(&self, book: &BookRef) -> PortResult<Option<ReadingRecord>> {
        self.check_read()?;
        Ok(self.tables.lock().unwrap().reading.get(&book_key(book)).cloned())
    }

    async fn update_reading_progress(
        &self,
        book: &BookRef,
        percentage: i32,
        now: DateTime<Utc>,
    ) -> PortResult<bool> {
        self.check_write()?;
        let mut tables = self.tables.lock().unwrap();
        match tables.reading.get_mut(&book_key(book)) {
            Some(record) => {
                record.progress_percentage = percentage;
                record.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_translation(
        &self,
        book: &BookRef,
        language_code: &str,
    ) -> PortResult<Option<TranslatedGuide>> {
        self.check_read()?;
        if self.fail_translation_reads.load(Ordering::SeqCst) {
            return Err(PortError::Storage("translation read timed out".to_string()));
        }
        Ok(self
            .tables
            .lock()
            .unwrap()
            .translations
            .get(&(book_key(book), language_code.to_string()))
            .cloned())
    }

    async fn upsert_translation(
        &self,
        book: &BookRef,
        language_code: &str,
        content: &str,
        now: DateTime<Utc>,
    ) -> PortResult<TranslatedGuide> {
        self.check_write()?;
        let row = TranslatedGuide {
            user_id: book.user_id.clone(),
            book_title: book.title.clone(),
            book_author: book.author.clone(),
            language_code: language_code.to_string(),
            translated_content: content.to_string(),
            updated_at: now,
        };
        self.tables
            .lock()
            .unwrap()
            .translations
            .insert((book_key(book), language_code.to_string()), row.clone());
        Ok(row)
    }

    async fn insert_quiz_attempt(
        &self,
        attempt: NewQuizAttempt,
        now: DateTime<Utc>,
    ) -> PortResult<QuizAttempt> {
        self.check_write()?;
        let mut tables = self.tables.lock().unwrap();
        let row = QuizAttempt {
            id: tables.quiz_attempts.len() as i64 + 1,
            user_id: attempt.book.user_id,
            book_title: attempt.book.title,
            book_author: attempt.book.author,
            score: attempt.score,
            total_questions: attempt.total_questions,
            answers: attempt.answers,
            completed_at: now,
        };
        tables.quiz_attempts.push(row.clone());
        Ok(row)
    }

    async fn list_quiz_attempts(&self, book: &BookRef) -> PortResult<Vec<QuizAttempt>> {
        self.check_read()?;
        let mut rows: Vec<QuizAttempt> = self
            .tables
            .lock()
            .unwrap()
            .quiz_attempts
            .iter()
            .filter(|a| {
                a.user_id == book.user_id
                    && a.book_title == book.title
                    && a.book_author == book.author
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.completed_at.cmp(&a.completed_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn list_user_quiz_attempts(
        &self,
        user_id: &str,
        limit: i64,
    ) -> PortResult<Vec<QuizAttempt>> {
        self.check_read()?;
        let mut rows: Vec<QuizAttempt> = self
            .tables
            .lock()
            .unwrap()
            .quiz_attempts
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.completed_at.cmp(&a.completed_at).then(b.id.cmp(&a.id)));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }
}

/// A generator that returns a canned reply and records how it was called.
pub struct MockGenerator {
    reply: Option<GeneratedContent>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
    last_options: Mutex<Option<GenerationOptions>>,
}

impl MockGenerator {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(GeneratedContent { text: text.to_string(), citations: Vec::new() }),
            delay: None,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
            last_options: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self { reply: None, ..Self::replying("") }
    }

    pub fn with_citations(mut self, citations: Vec<Citation>) -> Self {
        if let Some(reply) = self.reply.as_mut() {
            reply.citations = citations;
        }
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().unwrap().clone()
    }

    pub fn last_options(&self) -> Option<GenerationOptions> {
        *self.last_options.lock().unwrap()
    }
}

#[async_trait]
impl ContentGenerator for MockGenerator {
    async fn generate(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> PortResult<GeneratedContent> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.to_string());
        *self.last_options.lock().unwrap() = Some(options);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply
            .clone()
            .ok_or_else(|| PortError::Generation("upstream returned 503".to_string()))
    }
}
