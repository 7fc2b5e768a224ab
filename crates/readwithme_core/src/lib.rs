pub mod cache_key;
pub mod content_store;
pub mod domain;
pub mod generation;
pub mod languages;
pub mod ports;
pub mod prompts;
pub mod quiz;
pub mod response_cache;
pub mod translation;

#[cfg(test)]
mod flows;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use cache_key::derive_key;
pub use content_store::ContentStore;
pub use domain::{
    BookAnswer, BookDetails, BookRef, CacheEntry, CacheStats, Citation, GeneratedContent,
    GenerationOptions, GuideContent, NewQuizAttempt, QueryType, QuizAnswer, QuizAttempt,
    QuizQuestion, QuizStats, ReadingRecord, TranslatedGuide, User, UserBook, UserProfile,
    UserQuizStats,
};
pub use generation::TimeoutGenerator;
pub use ports::{ContentGenerator, DatabaseService, PortError, PortResult};
pub use quiz::QuizStore;
pub use response_cache::{BookDiscovery, ResponseCache};
pub use translation::TranslationOrchestrator;
