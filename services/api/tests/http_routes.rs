//! HTTP route tests for the ReadWithMe API
//!
//! Drives the real router with in-memory storage and a scripted generator.

use std::sync::Arc;

use api_lib::{
    config::Config,
    web::{self, state::AppState},
};
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use readwithme_core::testing::{InMemoryDatabase, MockGenerator};
use serde_json::{json, Value};
use tower::ServiceExt;

/// Helper to build the app around the given backends
fn create_test_app(db: Arc<InMemoryDatabase>, generator: Arc<MockGenerator>) -> Router {
    let config = Config::from_lookup(|name| match name {
        "DATABASE_URL" => Some("postgres://localhost/readwithme_test".to_string()),
        _ => None,
    })
    .unwrap();
    let state = Arc::new(AppState::new(db, generator, Arc::new(config)));
    web::router(state)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health_and_languages_are_public() {
    let app = create_test_app(
        Arc::new(InMemoryDatabase::new()),
        Arc::new(MockGenerator::replying("unused")),
    );

    let (status, json) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");

    let (status, json) = send(&app, Method::GET, "/api/languages", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let codes: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["code"].as_str().unwrap())
        .collect();
    assert_eq!(codes, vec!["en", "te", "hi", "ta", "mr"]);
    assert_eq!(json[0]["isSource"], true);
}

#[tokio::test]
async fn test_per_user_routes_require_a_user_id() {
    let app = create_test_app(
        Arc::new(InMemoryDatabase::new()),
        Arc::new(MockGenerator::replying("unused")),
    );

    let (status, json) = send(&app, Method::GET, "/api/reading/history", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "Unauthorized");

    let (status, _) = send(&app, Method::GET, "/api/reading/books", Some("   "), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_topic_lookup_is_generated_once_then_served_from_cache() {
    let generator = Arc::new(MockGenerator::replying("1. Dune by Frank Herbert"));
    let app = create_test_app(Arc::new(InMemoryDatabase::new()), generator.clone());
    let body = json!({ "topicName": "Science Fiction" });

    let (status, first) =
        send(&app, Method::POST, "/api/cache/books/topic", None, Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["cached"], false);
    assert_eq!(first["text"], "1. Dune by Frank Herbert");

    let body = json!({ "topicName": "science fiction" });
    let (status, second) =
        send(&app, Method::POST, "/api/cache/books/topic", None, Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["cached"], true);
    assert_eq!(generator.calls(), 1);

    let (_, stats) = send(&app, Method::GET, "/api/cache/stats", None, None).await;
    assert_eq!(stats["activeEntries"], 1);
    assert_eq!(stats["totalHits"], 1);

    let (_, popular) = send(&app, Method::GET, "/api/cache/popular?limit=5", None, None).await;
    assert_eq!(popular[0]["queryValue"], "Science Fiction");
    assert_eq!(popular[0]["hitCount"], 1);
}

#[tokio::test]
async fn test_blank_search_is_rejected_and_failed_generation_is_bad_gateway() {
    let db = Arc::new(InMemoryDatabase::new());
    let app = create_test_app(db.clone(), Arc::new(MockGenerator::failing()));

    let (status, json) = send(
        &app,
        Method::POST,
        "/api/cache/books/search",
        None,
        Some(json!({ "query": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid request");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/cache/books/search",
        None,
        Some(json!({ "query": "dune" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(db.cache_len(), 0);
}

#[tokio::test]
async fn test_cache_can_be_cleared() {
    let app = create_test_app(
        Arc::new(InMemoryDatabase::new()),
        Arc::new(MockGenerator::replying("books")),
    );
    for topic in ["history", "poetry"] {
        send(
            &app,
            Method::POST,
            "/api/cache/books/topic",
            None,
            Some(json!({ "topicName": topic })),
        )
        .await;
    }

    let (status, _) = send(&app, Method::POST, "/api/cache/sweep", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, Method::DELETE, "/api/cache", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, stats) = send(&app, Method::GET, "/api/cache/stats", None, None).await;
    assert_eq!(stats["totalEntries"], 2);

    let (status, json) = send(&app, Method::POST, "/api/cache/sweep", Some("admin"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["deleted"], 0);

    let (status, json) = send(&app, Method::DELETE, "/api/cache", Some("admin"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["deleted"], 2);
}

#[tokio::test]
async fn test_translation_requires_a_source_guide_then_is_cached() {
    let generator = Arc::new(MockGenerator::replying("## Synopsis\nA desert planet."));
    let app = create_test_app(Arc::new(InMemoryDatabase::new()), generator.clone());
    let translate = json!({
        "bookTitle": "Dune",
        "bookAuthor": "Frank Herbert",
        "targetLanguageCode": "hi"
    });

    let (status, json) = send(
        &app,
        Method::POST,
        "/api/reading/translate",
        Some("user-1"),
        Some(translate.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["message"].as_str().unwrap().contains("English reading guide"));
    assert_eq!(generator.calls(), 0);

    let book = json!({ "bookTitle": "Dune", "bookAuthor": "Frank Herbert" });
    let (status, guide) =
        send(&app, Method::POST, "/api/reading/guide", Some("user-1"), Some(book.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(guide["cached"], false);
    assert_eq!(guide["languageCode"], "en");

    let (_, again) =
        send(&app, Method::POST, "/api/reading/guide", Some("user-1"), Some(book)).await;
    assert_eq!(again["cached"], true);
    assert_eq!(generator.calls(), 1);

    let (status, first) = send(
        &app,
        Method::POST,
        "/api/reading/translate",
        Some("user-1"),
        Some(translate.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["cached"], false);
    assert_eq!(first["languageCode"], "hi");

    let (_, second) = send(
        &app,
        Method::POST,
        "/api/reading/translate",
        Some("user-1"),
        Some(translate),
    )
    .await;
    assert_eq!(second["cached"], true);
    assert_eq!(second["content"], first["content"]);
    assert_eq!(generator.calls(), 2);
}

#[tokio::test]
async fn test_unsupported_language_is_a_bad_request() {
    let app = create_test_app(
        Arc::new(InMemoryDatabase::new()),
        Arc::new(MockGenerator::replying("guide")),
    );
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/reading/translate",
        Some("user-1"),
        Some(json!({
            "bookTitle": "Dune",
            "bookAuthor": "Frank Herbert",
            "targetLanguageCode": "xx"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_saved_guide_can_be_read_back() {
    let app = create_test_app(
        Arc::new(InMemoryDatabase::new()),
        Arc::new(MockGenerator::replying("unused")),
    );
    let (status, _) = send(
        &app,
        Method::GET,
        "/api/reading/guide?bookTitle=Dune&bookAuthor=Herbert",
        Some("user-1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/reading/guide",
        Some("user-1"),
        Some(json!({ "bookTitle": "Dune", "bookAuthor": "Herbert", "content": "## Synopsis" })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, json) = send(
        &app,
        Method::GET,
        "/api/reading/guide?bookTitle=Dune&bookAuthor=Herbert",
        Some("user-1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["readingGuideContent"], "## Synopsis");
    assert_eq!(json["languageCode"], "en");

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/reading/guide",
        Some("user-1"),
        Some(json!({
            "bookTitle": "Dune",
            "bookAuthor": "Herbert",
            "content": "## Other",
            "languageCode": "zz"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, json) = send(
        &app,
        Method::GET,
        "/api/reading/guide?bookTitle=Dune&bookAuthor=Herbert",
        Some("user-1"),
        None,
    )
    .await;
    assert_eq!(json["readingGuideContent"], "## Synopsis");
    assert_eq!(json["languageCode"], "en");
}

#[tokio::test]
async fn test_progress_is_clamped_and_visible_in_history() {
    let app = create_test_app(
        Arc::new(InMemoryDatabase::new()),
        Arc::new(MockGenerator::replying("unused")),
    );
    let (status, json) = send(
        &app,
        Method::POST,
        "/api/reading/history",
        Some("user-1"),
        Some(json!({ "bookTitle": "Dune", "bookAuthor": "Herbert", "topic": "Science Fiction" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["topic"], "Science Fiction");

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/reading/progress",
        Some("user-1"),
        Some(json!({ "bookTitle": "Dune", "bookAuthor": "Herbert", "percentage": 150 })),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, history) =
        send(&app, Method::GET, "/api/reading/history", Some("user-1"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history[0]["progressPercentage"], 100);

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/reading/history?limit=0",
        Some("user-1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, other) = send(&app, Method::GET, "/api/reading/history", Some("user-2"), None).await;
    assert!(other.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_bookmark_toggles_and_lists() {
    let app = create_test_app(
        Arc::new(InMemoryDatabase::new()),
        Arc::new(MockGenerator::replying("unused")),
    );
    let book = json!({ "bookTitle": "Dune", "bookAuthor": "Herbert" });

    let (_, first) =
        send(&app, Method::POST, "/api/reading/bookmark", Some("u"), Some(book.clone())).await;
    assert_eq!(first["isBookmarked"], true);

    let (_, marks) = send(&app, Method::GET, "/api/reading/bookmarks", Some("u"), None).await;
    assert_eq!(marks.as_array().unwrap().len(), 1);

    let (_, second) =
        send(&app, Method::POST, "/api/reading/bookmark", Some("u"), Some(book.clone())).await;
    assert_eq!(second["isBookmarked"], false);

    let (_, fav) = send(&app, Method::POST, "/api/reading/favorite", Some("u"), Some(book)).await;
    assert_eq!(fav["isFavorite"], true);
    assert_eq!(fav["isBookmarked"], false);

    let (status, favs) = send(&app, Method::GET, "/api/reading/favorites", Some("u"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(favs[0]["bookTitle"], "Dune");
    let (_, marks) = send(&app, Method::GET, "/api/reading/bookmarks", Some("u"), None).await;
    assert!(marks.as_array().unwrap().is_empty());

    let (_, books) = send(&app, Method::GET, "/api/reading/books", Some("u"), None).await;
    assert_eq!(books.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_user_profile_sync() {
    let app = create_test_app(
        Arc::new(InMemoryDatabase::new()),
        Arc::new(MockGenerator::replying("unused")),
    );

    let (status, _) = send(&app, Method::GET, "/api/users/me", Some("auth|42"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = send(
        &app,
        Method::POST,
        "/api/users/sync",
        Some("auth|42"),
        Some(json!({ "email": "reader@example.com", "firstName": "Ada" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["userId"], "auth|42");

    let (status, json) = send(&app, Method::GET, "/api/users/me", Some("auth|42"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["email"], "reader@example.com");
    assert_eq!(json["firstName"], "Ada");
}

#[tokio::test]
async fn test_quiz_generation_and_attempts() {
    let payload = r#"```json
[{"question":"Who wrote Dune?","options":["Herbert","Asimov","Clarke","Le Guin"],"answer":0,"explanation":"Frank Herbert."}]
```"#;
    let app = create_test_app(
        Arc::new(InMemoryDatabase::new()),
        Arc::new(MockGenerator::replying(payload)),
    );
    let book = json!({ "bookTitle": "Dune", "bookAuthor": "Herbert" });

    let (status, quiz) =
        send(&app, Method::POST, "/api/quizzes/generate", Some("u"), Some(book)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quiz["questions"].as_array().unwrap().len(), 1);
    assert_eq!(quiz["questions"][0]["answer"], 0);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/quizzes/attempt",
        Some("u"),
        Some(json!({ "bookTitle": "Dune", "bookAuthor": "Herbert", "score": 6, "totalQuestions": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for (score, total) in [(3, 5), (4, 4)] {
        let (status, json) = send(
            &app,
            Method::POST,
            "/api/quizzes/attempt",
            Some("u"),
            Some(json!({
                "bookTitle": "Dune",
                "bookAuthor": "Herbert",
                "score": score,
                "totalQuestions": total,
                "answers": [{ "questionIndex": 0, "selectedAnswer": 0, "correctAnswer": 0, "isCorrect": true }]
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["answers"][0]["isCorrect"], true);
    }

    let (_, history) = send(
        &app,
        Method::GET,
        "/api/quizzes/history?bookTitle=Dune&bookAuthor=Herbert",
        Some("u"),
        None,
    )
    .await;
    assert_eq!(history.as_array().unwrap().len(), 2);

    let (_, stats) = send(
        &app,
        Method::GET,
        "/api/quizzes/stats?bookTitle=Dune&bookAuthor=Herbert",
        Some("u"),
        None,
    )
    .await;
    assert_eq!(stats["attemptCount"], 2);
    assert_eq!(stats["bestScorePct"], 100.0);

    let (_, summary) = send(&app, Method::GET, "/api/quizzes/summary", Some("u"), None).await;
    assert_eq!(summary["totalAttempts"], 2);
    assert_eq!(summary["booksQuizzed"], 1);
    assert_eq!(summary["totalScore"], 7);
}

#[tokio::test]
async fn test_quiz_stats_for_an_unquizzed_book_are_empty() {
    let app = create_test_app(
        Arc::new(InMemoryDatabase::new()),
        Arc::new(MockGenerator::replying("unused")),
    );
    let (status, stats) = send(
        &app,
        Method::GET,
        "/api/quizzes/stats?bookTitle=Dune&bookAuthor=Herbert",
        Some("u"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["attemptCount"], 0);
    assert!(stats["lastAttemptAt"].is_null());
}
