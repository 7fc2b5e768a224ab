//! crates/readwithme_core/src/content_store.rs
//!
//! Per-user state: profile, reading history, the source-language reading guide,
//! progress, and bookmark/favourite flags. Everything is partitioned by the
//! opaque user id supplied by the auth provider.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::{
    BookDetails, BookFlag, BookRef, GenerationOptions, GuideContent, ReadingRecord, User,
    UserBook, UserProfile,
};
use crate::languages::{self, SOURCE_LANGUAGE};
use crate::ports::{ContentGenerator, DatabaseService, PortError, PortResult};
use crate::prompts;

pub const DEFAULT_HISTORY_LIMIT: i64 = 20;

#[derive(Clone)]
pub struct ContentStore {
    db: Arc<dyn DatabaseService>,
    generator: Arc<dyn ContentGenerator>,
}

impl ContentStore {
    pub fn new(db: Arc<dyn DatabaseService>, generator: Arc<dyn ContentGenerator>) -> Self {
        Self { db, generator }
    }

    // --- Users ---

    pub async fn sync_user(&self, profile: UserProfile) -> PortResult<User> {
        if profile.user_id.trim().is_empty() {
            return Err(PortError::Validation("user id is required".to_string()));
        }
        let user = self.db.upsert_user(profile, Utc::now()).await?;
        info!(user_id = %user.profile.user_id, "User synced");
        Ok(user)
    }

    pub async fn get_user(&self, user_id: &str) -> PortResult<User> {
        self.db.get_user(user_id).await
    }

    // --- History ---

    /// Records that the user opened a book. Always refreshes `last_read_at`.
    pub async fn upsert_history(
        &self,
        book: &BookRef,
        details: BookDetails,
    ) -> PortResult<UserBook> {
        let row = self.db.touch_book(book, &details, Utc::now()).await?;
        info!(user_id = %book.user_id, "Book saved to history: {}", book.title);
        Ok(row)
    }

    /// Most recently read first.
    pub async fn get_history(&self, user_id: &str, limit: i64) -> PortResult<Vec<ReadingRecord>> {
        if limit <= 0 {
            return Err(PortError::Validation("limit must be positive".to_string()));
        }
        self.db.get_reading_history(user_id, limit).await
    }

    pub async fn list_books(&self, user_id: &str) -> PortResult<Vec<UserBook>> {
        self.db.list_user_books(user_id).await
    }

    pub async fn list_bookmarks(&self, user_id: &str) -> PortResult<Vec<UserBook>> {
        self.db.list_bookmarked_books(user_id).await
    }

    pub async fn list_favorites(&self, user_id: &str) -> PortResult<Vec<UserBook>> {
        self.db.list_favorite_books(user_id).await
    }

    pub async fn toggle_bookmark(&self, book: &BookRef) -> PortResult<UserBook> {
        self.db.toggle_book_flag(book, BookFlag::Bookmarked, Utc::now()).await
    }

    pub async fn toggle_favorite(&self, book: &BookRef) -> PortResult<UserBook> {
        self.db.toggle_book_flag(book, BookFlag::Favorite, Utc::now()).await
    }

    // --- Guides ---

    /// Stores `content` as the book's guide, overwriting any previous text.
    /// Callers pass the source language here. Unsupported codes are rejected.
    pub async fn save_guide(
        &self,
        book: &BookRef,
        content: &str,
        language_code: &str,
    ) -> PortResult<()> {
        let language = languages::lookup(language_code)?;
        if content.trim().is_empty() {
            return Err(PortError::Validation("guide content is empty".to_string()));
        }
        self.db.upsert_reading_guide(book, content, language.code, Utc::now()).await?;
        info!(user_id = %book.user_id, language = language.code, "Reading guide cached: {}", book.title);
        Ok(())
    }

    pub async fn get_guide(&self, book: &BookRef) -> PortResult<Option<ReadingRecord>> {
        self.db.get_reading_record(book).await
    }

    /// Returns the stored source guide, generating and saving it on first request.
    pub async fn guide_or_generate(&self, book: &BookRef) -> PortResult<GuideContent> {
        if let Some(text) = self.get_guide(book).await?.and_then(|r| r.reading_guide_content) {
            return Ok(GuideContent {
                text,
                language_code: SOURCE_LANGUAGE.to_string(),
                cached: true,
            });
        }

        let generated = self
            .generator
            .generate(&prompts::guide_prompt(&book.title, &book.author), GenerationOptions::search())
            .await?;
        self.save_guide(book, &generated.text, SOURCE_LANGUAGE).await?;

        Ok(GuideContent {
            text: generated.text,
            language_code: SOURCE_LANGUAGE.to_string(),
            cached: false,
        })
    }

    // --- Progress ---

    /// Stores the percentage clamped into 0..=100. Out-of-range input is not an error.
    pub async fn update_progress(&self, book: &BookRef, percentage: i32) -> PortResult<()> {
        let clamped = percentage.clamp(0, 100);
        let updated = self.db.update_reading_progress(book, clamped, Utc::now()).await?;
        if updated {
            info!(user_id = %book.user_id, progress = clamped, "Progress updated: {}", book.title);
        } else {
            warn!(user_id = %book.user_id, "No reading record to update progress for: {}", book.title);
        }
        Ok(())
    }
}
