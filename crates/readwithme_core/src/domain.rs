//! crates/readwithme_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database driver. The few value types
//! that cross the storage boundary as JSON (citations, quiz answers) derive
//! serde so the adapters can encode them explicitly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ports::PortError;

//=========================================================================================
// Anonymous Response Cache
//=========================================================================================

/// The two shapes of anonymous query whose answers are cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    Topic,
    Search,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Topic => "topic",
            QueryType::Search => "search",
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueryType {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "topic" => Ok(QueryType::Topic),
            "search" => Ok(QueryType::Search),
            other => Err(PortError::Validation(format!("Unknown query type '{}'", other))),
        }
    }
}

/// A source reference returned alongside generated text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub uri: String,
    pub title: String,
}

/// A cached answer to a topic-browse or free-text search query.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub query_type: QueryType,
    pub query_value: String,
    pub response_text: String,
    pub citations: Vec<Citation>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub hit_count: i32,
}

impl CacheEntry {
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// The values written by a cache upsert. `hit_count` is always reset to zero.
#[derive(Debug, Clone)]
pub struct NewCacheEntry {
    pub key: String,
    pub query_type: QueryType,
    pub query_value: String,
    pub response_text: String,
    pub citations: Vec<Citation>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    pub total_entries: u64,
    pub active_entries: u64,
    pub expired_entries: u64,
    pub total_hits: i64,
    pub average_hits_per_entry: f64,
}

//=========================================================================================
// Per-User Content Store
//=========================================================================================

/// Identifies one book in one user's library. The user id is the opaque
/// string handed over by the authentication provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BookRef {
    pub user_id: String,
    pub title: String,
    pub author: String,
}

impl BookRef {
    /// Builds a reference, rejecting blank identifying fields before any I/O.
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
    ) -> Result<Self, PortError> {
        let book = Self {
            user_id: user_id.into(),
            title: title.into(),
            author: author.into(),
        };
        if book.user_id.trim().is_empty() {
            return Err(PortError::Validation("user id is required".to_string()));
        }
        if book.title.trim().is_empty() || book.author.trim().is_empty() {
            return Err(PortError::Validation(
                "bookTitle and bookAuthor are required".to_string(),
            ));
        }
        Ok(book)
    }
}

/// Per-user, per-book reading state, including the source-language guide.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingRecord {
    pub user_id: String,
    pub book_title: String,
    pub book_author: String,
    pub last_read_at: DateTime<Utc>,
    pub reading_guide_content: Option<String>,
    pub language_code: String,
    pub progress_percentage: i32,
    pub updated_at: DateTime<Utc>,
}

/// A book the user has opened, bookmarked or favourited.
#[derive(Debug, Clone, PartialEq)]
pub struct UserBook {
    pub user_id: String,
    pub book_title: String,
    pub book_author: String,
    pub published_date: Option<String>,
    pub topic: Option<String>,
    pub is_bookmarked: bool,
    pub is_favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Optional metadata recorded when a user opens a book.
#[derive(Debug, Clone, Default)]
pub struct BookDetails {
    pub published_date: Option<String>,
    pub topic: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookFlag {
    Bookmarked,
    Favorite,
}

/// A per-language rendering of a source guide.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedGuide {
    pub user_id: String,
    pub book_title: String,
    pub book_author: String,
    pub language_code: String,
    pub translated_content: String,
    pub updated_at: DateTime<Utc>,
}

/// Profile data synced from the authentication provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserProfile {
    pub user_id: String,
    pub email: Option<String>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub profile: UserProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//=========================================================================================
// Quizzes
//=========================================================================================

/// One answered question inside a quiz attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAnswer {
    pub question_index: u32,
    pub selected_answer: u32,
    pub correct_answer: u32,
    pub is_correct: bool,
}

#[derive(Debug, Clone)]
pub struct NewQuizAttempt {
    pub book: BookRef,
    pub score: i32,
    pub total_questions: i32,
    pub answers: Vec<QuizAnswer>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuizAttempt {
    pub id: i64,
    pub user_id: String,
    pub book_title: String,
    pub book_author: String,
    pub score: i32,
    pub total_questions: i32,
    pub answers: Vec<QuizAnswer>,
    pub completed_at: DateTime<Utc>,
}

impl QuizAttempt {
    /// Score as a percentage of the questions asked.
    pub fn percentage(&self) -> f64 {
        if self.total_questions <= 0 {
            return 0.0;
        }
        f64::from(self.score) / f64::from(self.total_questions) * 100.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuizStats {
    pub attempt_count: usize,
    pub best_score_pct: f64,
    pub average_score_pct: f64,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserQuizStats {
    pub total_attempts: usize,
    pub books_quizzed: usize,
    pub average_score_pct: f64,
    pub total_score: i64,
}

/// A generated multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub answer: u32,
    pub explanation: String,
}

//=========================================================================================
// Generation
//=========================================================================================

/// Mode flags for a generation call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationOptions {
    pub use_search: bool,
    pub json_mode: bool,
}

impl GenerationOptions {
    pub fn search() -> Self {
        Self { use_search: true, json_mode: false }
    }

    pub fn plain() -> Self {
        Self::default()
    }

    pub fn json() -> Self {
        Self { use_search: false, json_mode: true }
    }

    /// JSON mode and search are mutually exclusive; JSON mode wins.
    pub fn effective(self) -> Self {
        if self.json_mode {
            Self { use_search: false, json_mode: true }
        } else {
            self
        }
    }
}

/// Text produced by the generation service plus any sources it cited.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedContent {
    pub text: String,
    pub citations: Vec<Citation>,
}

/// What a cached-or-generated lookup hands back to its caller.
#[derive(Debug, Clone, PartialEq)]
pub struct BookAnswer {
    pub text: String,
    pub citations: Vec<Citation>,
    pub cached: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GuideContent {
    pub text: String,
    pub language_code: String,
    pub cached: bool,
}
