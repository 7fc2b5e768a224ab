//! crates/readwithme_core/src/quiz.rs
//!
//! Quiz generation and the append-only attempt log. Statistics are derived by
//! scanning the log; nothing here is cached or de-duplicated.

use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

use crate::domain::{
    BookRef, GenerationOptions, NewQuizAttempt, QuizAttempt, QuizQuestion, QuizStats,
    UserQuizStats,
};
use crate::ports::{ContentGenerator, DatabaseService, PortError, PortResult};
use crate::prompts;

pub const QUIZ_LENGTH: usize = 5;
const USER_STATS_SCAN_LIMIT: i64 = 1000;

#[derive(Clone)]
pub struct QuizStore {
    db: Arc<dyn DatabaseService>,
    generator: Arc<dyn ContentGenerator>,
}

impl QuizStore {
    pub fn new(db: Arc<dyn DatabaseService>, generator: Arc<dyn ContentGenerator>) -> Self {
        Self { db, generator }
    }

    pub async fn generate_quiz(&self, title: &str, author: &str) -> PortResult<Vec<QuizQuestion>> {
        if title.trim().is_empty() || author.trim().is_empty() {
            return Err(PortError::Validation("bookTitle and bookAuthor are required".to_string()));
        }
        let generated = self
            .generator
            .generate(&prompts::quiz_prompt(title, author), GenerationOptions::json())
            .await?;
        parse_quiz(&generated.text)
    }

    /// Appends an attempt. Every call adds a row.
    pub async fn record_attempt(&self, attempt: NewQuizAttempt) -> PortResult<QuizAttempt> {
        if attempt.total_questions <= 0 {
            return Err(PortError::Validation("totalQuestions must be positive".to_string()));
        }
        if attempt.score < 0 || attempt.score > attempt.total_questions {
            return Err(PortError::Validation(format!(
                "score must be between 0 and {}",
                attempt.total_questions
            )));
        }
        let saved = self.db.insert_quiz_attempt(attempt, Utc::now()).await?;
        info!(user_id = %saved.user_id, "Quiz attempt saved: {}/{}", saved.score, saved.total_questions);
        Ok(saved)
    }

    /// Most recent first.
    pub async fn history(&self, book: &BookRef) -> PortResult<Vec<QuizAttempt>> {
        self.db.list_quiz_attempts(book).await
    }

    pub async fn stats(&self, book: &BookRef) -> PortResult<QuizStats> {
        let history = self.history(book).await?;
        Ok(summarize(&history))
    }

    pub async fn user_stats(&self, user_id: &str) -> PortResult<UserQuizStats> {
        let attempts = self.db.list_user_quiz_attempts(user_id, USER_STATS_SCAN_LIMIT).await?;
        if attempts.is_empty() {
            return Ok(UserQuizStats {
                total_attempts: 0,
                books_quizzed: 0,
                average_score_pct: 0.0,
                total_score: 0,
            });
        }

        let total_score: i64 = attempts.iter().map(|a| i64::from(a.score)).sum();
        let total_possible: i64 = attempts.iter().map(|a| i64::from(a.total_questions)).sum();
        let books: HashSet<(&str, &str)> = attempts
            .iter()
            .map(|a| (a.book_title.as_str(), a.book_author.as_str()))
            .collect();

        Ok(UserQuizStats {
            total_attempts: attempts.len(),
            books_quizzed: books.len(),
            average_score_pct: if total_possible > 0 {
                total_score as f64 / total_possible as f64 * 100.0
            } else {
                0.0
            },
            total_score,
        })
    }
}

/// Derives per-book statistics from attempts ordered most recent first.
/// Best and average compare percentages, so attempts of different lengths mix.
pub fn summarize(history: &[QuizAttempt]) -> QuizStats {
    if history.is_empty() {
        return QuizStats {
            attempt_count: 0,
            best_score_pct: 0.0,
            average_score_pct: 0.0,
            last_attempt_at: None,
        };
    }

    let percentages: Vec<f64> = history.iter().map(QuizAttempt::percentage).collect();
    let best = percentages.iter().copied().fold(0.0_f64, f64::max);
    let average = percentages.iter().sum::<f64>() / percentages.len() as f64;

    QuizStats {
        attempt_count: history.len(),
        best_score_pct: best,
        average_score_pct: average,
        last_attempt_at: history.iter().map(|a| a.completed_at).max(),
    }
}

/// Parses a generated quiz payload, tolerating a surrounding markdown fence.
pub fn parse_quiz(raw: &str) -> PortResult<Vec<QuizQuestion>> {
    let cleaned = raw.replace("```json", "").replace("```", "");
    let mut questions: Vec<QuizQuestion> = serde_json::from_str(cleaned.trim())
        .map_err(|e| PortError::Generation(format!("Failed to parse quiz questions: {}", e)))?;

    if let Some(bad) = questions
        .iter()
        .position(|q| q.options.is_empty() || q.answer as usize >= q.options.len())
    {
        return Err(PortError::Generation(format!(
            "Quiz question {} has no option matching its answer",
            bad + 1
        )));
    }

    questions.truncate(QUIZ_LENGTH);
    Ok(questions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::QuizAnswer;
    use crate::testing::{InMemoryDatabase, MockGenerator};

    fn quizzes(db: &Arc<InMemoryDatabase>) -> QuizStore {
        QuizStore::new(db.clone(), Arc::new(MockGenerator::replying("[]")))
    }

    fn attempt(book: &BookRef, score: i32, total: i32) -> NewQuizAttempt {
        NewQuizAttempt {
            book: book.clone(),
            score,
            total_questions: total,
            answers: vec![QuizAnswer {
                question_index: 0,
                selected_answer: 1,
                correct_answer: 1,
                is_correct: true,
            }],
        }
    }

    #[tokio::test]
    async fn every_attempt_is_kept_and_stats_use_percentages() {
        let db = Arc::new(InMemoryDatabase::new());
        let store = quizzes(&db);
        let book = BookRef::new("u1", "Dune", "Herbert").unwrap();

        store.record_attempt(attempt(&book, 4, 5)).await.unwrap();
        store.record_attempt(attempt(&book, 9, 10)).await.unwrap();
        store.record_attempt(attempt(&book, 4, 5)).await.unwrap();

        let history = store.history(&book).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].answers.len(), 1);

        let stats = store.stats(&book).await.unwrap();
        assert_eq!(stats.attempt_count, 3);
        assert!((stats.best_score_pct - 90.0).abs() < 1e-9);
        assert!((stats.average_score_pct - (80.0 + 90.0 + 80.0) / 3.0).abs() < 1e-9);
        assert!(stats.last_attempt_at.is_some());
    }

    #[tokio::test]
    async fn best_percentage_wins_over_best_raw_score() {
        let db = Arc::new(InMemoryDatabase::new());
        let store = quizzes(&db);
        let book = BookRef::new("u1", "Dune", "Herbert").unwrap();

        store.record_attempt(attempt(&book, 5, 5)).await.unwrap();
        store.record_attempt(attempt(&book, 8, 10)).await.unwrap();

        let stats = store.stats(&book).await.unwrap();
        assert!((stats.best_score_pct - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn no_attempts_yields_zeroes() {
        let db = Arc::new(InMemoryDatabase::new());
        let store = quizzes(&db);
        let book = BookRef::new("u1", "Dune", "Herbert").unwrap();

        let stats = store.stats(&book).await.unwrap();
        assert_eq!(stats.attempt_count, 0);
        assert_eq!(stats.best_score_pct, 0.0);
        assert_eq!(stats.average_score_pct, 0.0);
        assert!(stats.last_attempt_at.is_none());
    }

    #[tokio::test]
    async fn invalid_scores_are_rejected() {
        let db = Arc::new(InMemoryDatabase::new());
        let store = quizzes(&db);
        let book = BookRef::new("u1", "Dune", "Herbert").unwrap();

        assert!(matches!(store.record_attempt(attempt(&book, 6, 5)).await, Err(PortError::Validation(_))));
        assert!(matches!(store.record_attempt(attempt(&book, 0, 0)).await, Err(PortError::Validation(_))));
    }

    #[tokio::test]
    async fn user_stats_span_books() {
        let db = Arc::new(InMemoryDatabase::new());
        let store = quizzes(&db);
        let dune = BookRef::new("u1", "Dune", "Herbert").unwrap();
        let emma = BookRef::new("u1", "Emma", "Austen").unwrap();
        store.record_attempt(attempt(&dune, 3, 5)).await.unwrap();
        store.record_attempt(attempt(&dune, 5, 5)).await.unwrap();
        store.record_attempt(attempt(&emma, 2, 5)).await.unwrap();

        let stats = store.user_stats("u1").await.unwrap();
        assert_eq!(stats.total_attempts, 3);
        assert_eq!(stats.books_quizzed, 2);
        assert_eq!(stats.total_score, 10);
        assert!((stats.average_score_pct - 10.0 / 15.0 * 100.0).abs() < 1e-9);
        assert_eq!(store.user_stats("nobody").await.unwrap().total_attempts, 0);
    }

    #[tokio::test]
    async fn quiz_generation_uses_json_mode() {
        let payload = r#"```json
[{"question":"Who is Paul?","options":["A","B","C","D"],"answer":2,"explanation":"Because."}]
```"#;
        let generator = Arc::new(MockGenerator::replying(payload));
        let store = QuizStore::new(Arc::new(InMemoryDatabase::new()), generator.clone());

        let quiz = store.generate_quiz("Dune", "Herbert").await.unwrap();
        assert_eq!(quiz.len(), 1);
        assert_eq!(quiz[0].answer, 2);
        assert_eq!(generator.last_options(), Some(GenerationOptions::json()));
    }

    #[test]
    fn quiz_is_capped_and_validated() {
        let one = r#"{"question":"Q","options":["A","B","C","D"],"answer":0,"explanation":"E"}"#;
        let seven = format!("[{}]", vec![one; 7].join(","));
        assert_eq!(parse_quiz(&seven).unwrap().len(), QUIZ_LENGTH);

        let bad = r#"[{"question":"Q","options":["A"],"answer":3,"explanation":"E"}]"#;
        assert!(matches!(parse_quiz(bad), Err(PortError::Generation(_))));
        assert!(matches!(parse_quiz("not json"), Err(PortError::Generation(_))));
    }
}
