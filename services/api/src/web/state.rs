//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use readwithme_core::ports::{ContentGenerator, DatabaseService};
use readwithme_core::{
    BookDiscovery, ContentStore, QuizStore, ResponseCache, TranslationOrchestrator,
};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: ResponseCache,
    pub discovery: BookDiscovery,
    pub content: ContentStore,
    pub translations: TranslationOrchestrator,
    pub quizzes: QuizStore,
}

impl AppState {
    /// Wires every core service to the same storage and generation backends.
    pub fn new(
        db: Arc<dyn DatabaseService>,
        generator: Arc<dyn ContentGenerator>,
        config: Arc<Config>,
    ) -> Self {
        let cache =
            ResponseCache::new(db.clone()).with_ttl(chrono::Duration::days(config.cache_ttl_days));
        Self {
            discovery: BookDiscovery::new(cache.clone(), generator.clone()),
            content: ContentStore::new(db.clone(), generator.clone()),
            translations: TranslationOrchestrator::new(db.clone(), generator.clone()),
            quizzes: QuizStore::new(db, generator),
            cache,
            config,
        }
    }
}
