pub mod cache;
pub mod middleware;
pub mod quizzes;
pub mod reading;
pub mod rest;
pub mod state;
pub mod users;

pub use middleware::require_auth;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

use state::AppState;

/// Builds every API route. CORS, tracing and Swagger UI are layered on by the binary.
pub fn router(state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/health", get(rest::health_handler))
        .route("/api/languages", get(rest::languages_handler))
        .route("/api/cache/books/topic", post(cache::topic_books_handler))
        .route("/api/cache/books/search", post(cache::search_books_handler))
        .route("/api/cache/stats", get(cache::cache_stats_handler))
        .route("/api/cache/popular", get(cache::popular_handler));

    // Protected routes (x-user-id required)
    let protected_routes = Router::new()
        .route("/api/users/sync", post(users::sync_user_handler))
        .route("/api/users/me", get(users::current_user_handler))
        .route(
            "/api/reading/history",
            post(reading::add_history_handler).get(reading::history_handler),
        )
        .route(
            "/api/reading/guide",
            post(reading::guide_handler)
                .put(reading::save_guide_handler)
                .get(reading::get_guide_handler),
        )
        .route("/api/reading/translate", post(reading::translate_handler))
        .route("/api/reading/progress", put(reading::progress_handler))
        .route("/api/reading/books", get(reading::books_handler))
        .route("/api/reading/bookmarks", get(reading::bookmarks_handler))
        .route("/api/reading/favorites", get(reading::favorites_handler))
        .route("/api/reading/bookmark", post(reading::bookmark_handler))
        .route("/api/reading/favorite", post(reading::favorite_handler))
        .route("/api/quizzes/generate", post(quizzes::generate_quiz_handler))
        .route("/api/quizzes/attempt", post(quizzes::record_attempt_handler))
        .route("/api/quizzes/history", get(quizzes::quiz_history_handler))
        .route("/api/quizzes/stats", get(quizzes::quiz_stats_handler))
        .route("/api/quizzes/summary", get(quizzes::quiz_summary_handler))
        .route("/api/cache/sweep", post(cache::sweep_handler))
        .route("/api/cache", delete(cache::clear_cache_handler))
        .layer(axum_middleware::from_fn(require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
