//! End-to-end flows across the cache, the content store and the translator,
//! wired the way the API service wires them.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::{BookRef, GenerationOptions, QueryType};
use crate::generation::TimeoutGenerator;
use crate::ports::{ContentGenerator, PortError};
use crate::testing::{InMemoryDatabase, MockGenerator};
use crate::{ContentStore, ResponseCache, TranslationOrchestrator};

#[tokio::test]
async fn search_miss_generate_put_then_hit() {
    let db = Arc::new(InMemoryDatabase::new());
    let cache = ResponseCache::new(db.clone());
    let generator = MockGenerator::replying("### Dune by Frank Herbert | 1965\nSpice.");

    assert!(cache.get(QueryType::Search, "dune").await.unwrap().is_none());
    let generated = generator.generate("find dune", GenerationOptions::search()).await.unwrap();
    cache.put(QueryType::Search, "dune", &generated.text, Vec::new()).await.unwrap();

    let entry = cache.get(QueryType::Search, "dune").await.unwrap().unwrap();
    assert_eq!(entry.response_text, generated.text);
    assert_eq!(entry.hit_count, 1);
}

#[tokio::test]
async fn saved_guide_is_translated_once() {
    let db = Arc::new(InMemoryDatabase::new());
    let mock = Arc::new(MockGenerator::replying("## सारांश\nमसाला।"));
    let generator: Arc<dyn ContentGenerator> =
        Arc::new(TimeoutGenerator::new(mock.clone(), Duration::from_secs(5)));
    let store = ContentStore::new(db.clone(), generator.clone());
    let translator = TranslationOrchestrator::new(db.clone(), generator);
    let book = BookRef::new("u1", "Dune", "Herbert").unwrap();

    store.save_guide(&book, "## Synopsis...", "en").await.unwrap();
    let first = translator.translate(&book, "hi").await.unwrap();
    let second = translator.translate(&book, "hi").await.unwrap();

    assert_eq!(mock.calls(), 1);
    assert_eq!(first.text, second.text);
    assert!(second.cached);
    assert_eq!(db.translation_count(), 1);
}

#[tokio::test]
async fn translation_without_a_guide_fails() {
    let db = Arc::new(InMemoryDatabase::new());
    let mock = Arc::new(MockGenerator::replying("unused"));
    let translator = TranslationOrchestrator::new(db, mock.clone());
    let book = BookRef::new("u2", "Unknown Book", "Nobody").unwrap();

    let err = translator.translate(&book, "ta").await.unwrap_err();
    assert!(matches!(err, PortError::NotFound(_)));
    assert_eq!(mock.calls(), 0);
}
