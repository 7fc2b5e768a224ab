//! crates/readwithme_core/src/translation.rs
//!
//! Serves a book's reading guide in a requested language.
//!
//! Translations are always made from the stored source guide, never from
//! another translation, and are memoised per (user, book, language).

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::domain::{BookRef, GenerationOptions, GuideContent};
use crate::languages::{self, SOURCE_LANGUAGE};
use crate::ports::{ContentGenerator, DatabaseService, PortError, PortResult};
use crate::prompts;

pub const MISSING_SOURCE_MESSAGE: &str =
    "Reading guide not found. Please generate the English reading guide first";

#[derive(Clone)]
pub struct TranslationOrchestrator {
    db: Arc<dyn DatabaseService>,
    generator: Arc<dyn ContentGenerator>,
}

impl TranslationOrchestrator {
    pub fn new(db: Arc<dyn DatabaseService>, generator: Arc<dyn ContentGenerator>) -> Self {
        Self { db, generator }
    }

    /// Returns the guide in `language_code`.
    ///
    /// Cached translation → returned as-is. A failed cache read counts as a
    /// miss. Otherwise the source guide must
    /// exist (`NotFound` if not); it is translated, stored, and returned. A
    /// failed generation writes nothing. Asking for the source language
    /// returns the source guide without touching the translation table.
    pub async fn translate(&self, book: &BookRef, language_code: &str) -> PortResult<GuideContent> {
        let language = languages::lookup(language_code)?;

        if languages::is_source(language.code) {
            let text = self.source_text(book).await?;
            return Ok(GuideContent { text, language_code: SOURCE_LANGUAGE.to_string(), cached: true });
        }

        match self.db.get_translation(book, language.code).await {
            Ok(Some(cached)) => {
                info!(user_id = %book.user_id, language = language.code, "Translation cache HIT: {}", book.title);
                return Ok(GuideContent {
                    text: cached.translated_content,
                    language_code: language.code.to_string(),
                    cached: true,
                });
            }
            Ok(None) => {}
            Err(e) => {
                warn!(user_id = %book.user_id, language = language.code, error = %e, "Translation cache read failed, treating as miss");
            }
        }

        let source = self.source_text(book).await?;

        info!(user_id = %book.user_id, language = language.code, "Translating guide for {} to {}", book.title, language.label);
        let generated = self
            .generator
            .generate(&prompts::translation_prompt(&source, language.label), GenerationOptions::plain())
            .await
            .map_err(|e| {
                warn!(language = language.code, error = %e, "Translation failed");
                e
            })?;

        self.db
            .upsert_translation(book, language.code, &generated.text, Utc::now())
            .await?;

        Ok(GuideContent {
            text: generated.text,
            language_code: language.code.to_string(),
            cached: false,
        })
    }

    async fn source_text(&self, book: &BookRef) -> PortResult<String> {
        self.db
            .get_reading_record(book)
            .await?
            .and_then(|record| record.reading_guide_content)
            .ok_or_else(|| PortError::NotFound(MISSING_SOURCE_MESSAGE.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content_store::ContentStore;
    use crate::testing::{InMemoryDatabase, MockGenerator};

    struct Fixture {
        db: Arc<InMemoryDatabase>,
        generator: Arc<MockGenerator>,
        store: ContentStore,
        translator: TranslationOrchestrator,
    }

    fn fixture(reply: MockGenerator) -> Fixture {
        let db = Arc::new(InMemoryDatabase::new());
        let generator = Arc::new(reply);
        Fixture {
            store: ContentStore::new(db.clone(), generator.clone()),
            translator: TranslationOrchestrator::new(db.clone(), generator.clone()),
            db,
            generator,
        }
    }

    #[tokio::test]
    async fn translates_once_then_serves_the_stored_copy() {
        let f = fixture(MockGenerator::replying("## सारांश..."));
        let book = BookRef::new("u1", "Dune", "Herbert").unwrap();
        f.store.save_guide(&book, "## Synopsis...", "en").await.unwrap();

        let first = f.translator.translate(&book, "hi").await.unwrap();
        assert!(!first.cached);
        assert_eq!(first.language_code, "hi");
        assert_eq!(f.generator.calls(), 1);
        let prompt = f.generator.last_prompt().unwrap();
        assert!(prompt.contains("to Hindi."));
        assert!(prompt.contains("## Synopsis..."));

        let second = f.translator.translate(&book, "hi").await.unwrap();
        assert!(second.cached);
        assert_eq!(second.text, first.text);
        assert_eq!(f.generator.calls(), 1);
        assert_eq!(f.db.translation_count(), 1);
    }

    #[tokio::test]
    async fn missing_source_guide_is_not_found() {
        let f = fixture(MockGenerator::replying("anything"));
        let book = BookRef::new("u2", "Unknown Book", "Nobody").unwrap();

        let err = f.translator.translate(&book, "ta").await.unwrap_err();
        assert!(matches!(err, PortError::NotFound(ref msg) if msg.contains("English reading guide first")));
        assert_eq!(f.generator.calls(), 0);
        assert!(f.store.get_guide(&book).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn source_language_returns_the_guide_without_generating() {
        let f = fixture(MockGenerator::replying("anything"));
        let book = BookRef::new("u1", "Dune", "Herbert").unwrap();
        f.store.save_guide(&book, "## Synopsis...", "en").await.unwrap();

        let guide = f.translator.translate(&book, "en").await.unwrap();
        assert_eq!(guide.text, "## Synopsis...");
        assert_eq!(f.generator.calls(), 0);
        assert_eq!(f.db.translation_count(), 0);
    }

    #[tokio::test]
    async fn unsupported_language_is_rejected_before_io() {
        let f = fixture(MockGenerator::replying("anything"));
        let book = BookRef::new("u1", "Dune", "Herbert").unwrap();
        f.db.fail_reads(true);

        assert!(matches!(
            f.translator.translate(&book, "xx").await,
            Err(PortError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn failed_generation_writes_nothing() {
        let f = fixture(MockGenerator::failing());
        let book = BookRef::new("u1", "Dune", "Herbert").unwrap();
        f.store.save_guide(&book, "## Synopsis...", "en").await.unwrap();

        assert!(matches!(
            f.translator.translate(&book, "mr").await,
            Err(PortError::Generation(_))
        ));
        assert_eq!(f.db.translation_count(), 0);
    }

    #[tokio::test]
    async fn unreadable_translation_cache_falls_back_to_translating() {
        let f = fixture(MockGenerator::replying("## சுருக்கம்"));
        let book = BookRef::new("u1", "Dune", "Herbert").unwrap();
        f.store.save_guide(&book, "## Synopsis...", "en").await.unwrap();
        f.db.fail_translation_reads(true);

        let guide = f.translator.translate(&book, "ta").await.unwrap();
        assert!(!guide.cached);
        assert_eq!(guide.text, "## சுருக்கம்");
        assert_eq!(f.generator.calls(), 1);
        assert_eq!(f.db.translation_count(), 1);
    }

    #[tokio::test]
    async fn translations_are_per_user() {
        let f = fixture(MockGenerator::replying("తెలుగు"));
        let u1 = BookRef::new("u1", "Dune", "Herbert").unwrap();
        let u2 = BookRef::new("u2", "Dune", "Herbert").unwrap();
        f.store.save_guide(&u1, "## Synopsis...", "en").await.unwrap();
        f.translator.translate(&u1, "te").await.unwrap();

        assert!(matches!(f.translator.translate(&u2, "te").await, Err(PortError::NotFound(_))));
    }
}
