//! services/api/src/web/quizzes.rs
//!
//! Quiz generation and the per-user attempt log.

use crate::error::{ApiError, ErrorBody};
use crate::web::{middleware::UserId, reading::BookRequest, state::AppState};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    Extension,
};
use chrono::{DateTime, Utc};
use readwithme_core::domain::{
    BookRef, NewQuizAttempt, QuizAnswer, QuizAttempt, QuizQuestion, QuizStats, UserQuizStats,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct QuizQuestionResponse {
    pub question: String,
    pub options: Vec<String>,
    /// Index into `options`.
    pub answer: u32,
    pub explanation: String,
}

impl From<QuizQuestion> for QuizQuestionResponse {
    fn from(q: QuizQuestion) -> Self {
        Self {
            question: q.question,
            options: q.options,
            answer: q.answer,
            explanation: q.explanation,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct QuizResponse {
    pub questions: Vec<QuizQuestionResponse>,
}

#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizAnswerPayload {
    pub question_index: u32,
    pub selected_answer: u32,
    pub correct_answer: u32,
    pub is_correct: bool,
}

impl From<QuizAnswerPayload> for QuizAnswer {
    fn from(a: QuizAnswerPayload) -> Self {
        Self {
            question_index: a.question_index,
            selected_answer: a.selected_answer,
            correct_answer: a.correct_answer,
            is_correct: a.is_correct,
        }
    }
}

impl From<QuizAnswer> for QuizAnswerPayload {
    fn from(a: QuizAnswer) -> Self {
        Self {
            question_index: a.question_index,
            selected_answer: a.selected_answer,
            correct_answer: a.correct_answer,
            is_correct: a.is_correct,
        }
    }
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRequest {
    pub book_title: String,
    pub book_author: String,
    pub score: i32,
    pub total_questions: i32,
    #[serde(default)]
    pub answers: Vec<QuizAnswerPayload>,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResponse {
    pub id: i64,
    pub book_title: String,
    pub book_author: String,
    pub score: i32,
    pub total_questions: i32,
    pub percentage: f64,
    pub answers: Vec<QuizAnswerPayload>,
    pub completed_at: DateTime<Utc>,
}

impl From<QuizAttempt> for AttemptResponse {
    fn from(a: QuizAttempt) -> Self {
        Self {
            percentage: a.percentage(),
            id: a.id,
            book_title: a.book_title,
            book_author: a.book_author,
            score: a.score,
            total_questions: a.total_questions,
            answers: a.answers.into_iter().map(Into::into).collect(),
            completed_at: a.completed_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuizStatsResponse {
    pub attempt_count: usize,
    pub best_score_pct: f64,
    pub average_score_pct: f64,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl From<QuizStats> for QuizStatsResponse {
    fn from(s: QuizStats) -> Self {
        Self {
            attempt_count: s.attempt_count,
            best_score_pct: s.best_score_pct,
            average_score_pct: s.average_score_pct,
            last_attempt_at: s.last_attempt_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserQuizStatsResponse {
    pub total_attempts: usize,
    pub books_quizzed: usize,
    pub average_score_pct: f64,
    pub total_score: i64,
}

impl From<UserQuizStats> for UserQuizStatsResponse {
    fn from(s: UserQuizStats) -> Self {
        Self {
            total_attempts: s.total_attempts,
            books_quizzed: s.books_quizzed,
            average_score_pct: s.average_score_pct,
            total_score: s.total_score,
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// Generate a fresh five-question quiz. Quizzes are never cached.
#[utoipa::path(
    post,
    path = "/api/quizzes/generate",
    request_body = BookRequest,
    responses(
        (status = 200, description = "Generated quiz", body = QuizResponse),
        (status = 400, description = "Missing title or author", body = ErrorBody),
        (status = 401, description = "Missing user id", body = ErrorBody),
        (status = 502, description = "Generation failed or returned a malformed quiz", body = ErrorBody)
    ),
    params(("x-user-id" = String, Header, description = "Verified user id from the auth layer.")),
    tag = "quizzes"
)]
pub async fn generate_quiz_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BookRequest>,
) -> Result<Json<QuizResponse>, ApiError> {
    let questions = state
        .quizzes
        .generate_quiz(&req.book_title, &req.book_author)
        .await?;
    Ok(Json(QuizResponse {
        questions: questions.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/quizzes/attempt",
    request_body = AttemptRequest,
    responses(
        (status = 201, description = "Attempt recorded", body = AttemptResponse),
        (status = 400, description = "Invalid score or missing fields", body = ErrorBody),
        (status = 401, description = "Missing user id", body = ErrorBody)
    ),
    params(("x-user-id" = String, Header, description = "Verified user id from the auth layer.")),
    tag = "quizzes"
)]
pub async fn record_attempt_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Json(req): Json<AttemptRequest>,
) -> Result<(StatusCode, Json<AttemptResponse>), ApiError> {
    let attempt = NewQuizAttempt {
        book: BookRef::new(user_id, req.book_title, req.book_author)?,
        score: req.score,
        total_questions: req.total_questions,
        answers: req.answers.into_iter().map(Into::into).collect(),
    };
    let saved = state.quizzes.record_attempt(attempt).await?;
    Ok((StatusCode::CREATED, Json(saved.into())))
}

/// Attempts for one book, newest first.
#[utoipa::path(
    get,
    path = "/api/quizzes/history",
    params(
        BookRequest,
        ("x-user-id" = String, Header, description = "Verified user id from the auth layer.")
    ),
    responses(
        (status = 200, description = "Quiz attempts", body = [AttemptResponse]),
        (status = 400, description = "Missing title or author", body = ErrorBody),
        (status = 401, description = "Missing user id", body = ErrorBody)
    ),
    tag = "quizzes"
)]
pub async fn quiz_history_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Query(req): Query<BookRequest>,
) -> Result<Json<Vec<AttemptResponse>>, ApiError> {
    let book = req.to_book(&user_id)?;
    let history = state.quizzes.history(&book).await?;
    Ok(Json(history.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/api/quizzes/stats",
    params(
        BookRequest,
        ("x-user-id" = String, Header, description = "Verified user id from the auth layer.")
    ),
    responses(
        (status = 200, description = "Statistics for one book", body = QuizStatsResponse),
        (status = 400, description = "Missing title or author", body = ErrorBody),
        (status = 401, description = "Missing user id", body = ErrorBody)
    ),
    tag = "quizzes"
)]
pub async fn quiz_stats_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
    Query(req): Query<BookRequest>,
) -> Result<Json<QuizStatsResponse>, ApiError> {
    let book = req.to_book(&user_id)?;
    Ok(Json(state.quizzes.stats(&book).await?.into()))
}

/// Totals across every book the caller has been quizzed on.
#[utoipa::path(
    get,
    path = "/api/quizzes/summary",
    responses(
        (status = 200, description = "Statistics across all books", body = UserQuizStatsResponse),
        (status = 401, description = "Missing user id", body = ErrorBody)
    ),
    params(("x-user-id" = String, Header, description = "Verified user id from the auth layer.")),
    tag = "quizzes"
)]
pub async fn quiz_summary_handler(
    State(state): State<Arc<AppState>>,
    Extension(UserId(user_id)): Extension<UserId>,
) -> Result<Json<UserQuizStatsResponse>, ApiError> {
    Ok(Json(state.quizzes.user_stats(&user_id).await?.into()))
}
