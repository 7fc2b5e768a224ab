//! services/api/src/web/rest.rs
//!
//! Contains the small public REST handlers and the master definition for the
//! OpenAPI specification.

use crate::error::ErrorBody;
use crate::web::{cache, quizzes, reading, users};
use axum::response::Json;
use readwithme_core::languages::{Language, SOURCE_LANGUAGE, SUPPORTED_LANGUAGES};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        languages_handler,
        cache::topic_books_handler,
        cache::search_books_handler,
        cache::cache_stats_handler,
        cache::popular_handler,
        cache::sweep_handler,
        cache::clear_cache_handler,
        users::sync_user_handler,
        users::current_user_handler,
        reading::add_history_handler,
        reading::history_handler,
        reading::guide_handler,
        reading::save_guide_handler,
        reading::get_guide_handler,
        reading::translate_handler,
        reading::progress_handler,
        reading::books_handler,
        reading::bookmarks_handler,
        reading::favorites_handler,
        reading::bookmark_handler,
        reading::favorite_handler,
        quizzes::generate_quiz_handler,
        quizzes::record_attempt_handler,
        quizzes::quiz_history_handler,
        quizzes::quiz_stats_handler,
        quizzes::quiz_summary_handler,
    ),
    components(
        schemas(
            ErrorBody,
            HealthResponse,
            LanguageResponse,
            cache::TopicRequest,
            cache::SearchRequest,
            cache::BooksResponse,
            cache::CitationResponse,
            cache::CacheStatsResponse,
            cache::PopularEntryResponse,
            cache::DeletedResponse,
            users::SyncUserRequest,
            users::UserResponse,
            reading::BookRequest,
            reading::HistoryRequest,
            reading::SaveGuideRequest,
            reading::TranslateRequest,
            reading::ProgressRequest,
            reading::GuideResponse,
            reading::ReadingRecordResponse,
            reading::UserBookResponse,
            quizzes::QuizResponse,
            quizzes::QuizQuestionResponse,
            quizzes::QuizAnswerPayload,
            quizzes::AttemptRequest,
            quizzes::AttemptResponse,
            quizzes::QuizStatsResponse,
            quizzes::UserQuizStatsResponse,
        )
    ),
    tags(
        (name = "ReadWithMe API", description = "Book discovery, reading guides, translations and quizzes."),
        (name = "cache", description = "Anonymous, cached book discovery."),
        (name = "users", description = "Profiles synced from the auth provider."),
        (name = "reading", description = "Per-user history, guides and progress."),
        (name = "quizzes", description = "Quiz generation and attempts.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LanguageResponse {
    pub code: String,
    pub label: String,
    pub native_name: String,
    pub is_source: bool,
}

impl From<&Language> for LanguageResponse {
    fn from(lang: &Language) -> Self {
        Self {
            code: lang.code.to_string(),
            label: lang.label.to_string(),
            native_name: lang.native.to_string(),
            is_source: lang.code == SOURCE_LANGUAGE,
        }
    }
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Languages a reading guide can be translated into.
#[utoipa::path(
    get,
    path = "/api/languages",
    responses((status = 200, description = "Supported languages", body = [LanguageResponse]))
)]
pub async fn languages_handler() -> Json<Vec<LanguageResponse>> {
    Json(SUPPORTED_LANGUAGES.iter().map(Into::into).collect())
}
