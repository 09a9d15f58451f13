// tests/api_tests.rs

use serde_json::Value;
use trivia_backend::{config::Config, routes, state::AppState};

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app() -> String {
    // In-memory store: no database needed.
    let config = Config {
        database_url: None,
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        bind_addr: "127.0.0.1:0".to_string(),
        log_dir: "logs".to_string(),
    };

    let state = AppState::in_memory(config);
    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

async fn register_and_login(client: &reqwest::Client, address: &str, username: &str) -> String {
    let password = "password123";
    let status = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Register failed")
        .status();
    assert_eq!(status.as_u16(), 201);

    let login = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Login failed")
        .json::<Value>()
        .await
        .expect("Failed to parse login json");

    login["token"].as_str().expect("Token not found").to_string()
}

#[tokio::test]
async fn health_check_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_fails_validation() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Username too short
    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({ "username": "yo", "password": "password123" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn duplicate_username_conflicts() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    register_and_login(&client, &address, "alice").await;

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&serde_json::json!({ "username": "alice", "password": "password123" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn login_with_wrong_password_is_unauthorized() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    register_and_login(&client, &address, "carol").await;

    let response = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({ "username": "carol", "password": "not-the-password" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn creating_a_quiz_requires_a_token() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/quizzes", address))
        .json(&serde_json::json!({ "title": "Nope", "questions": [] }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn create_list_and_fetch_quiz() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address, "quizmaster").await;

    let created = client
        .post(format!("{}/api/quizzes", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "title": "Capitals<script>alert(1)</script>",
            "questions": [
                {
                    "text": "Capital of France?",
                    "question_type": "multiple_choice",
                    "correct_answer": "Paris",
                    "options": ["Paris", "Rome", "Berlin", "Madrid"]
                },
                {
                    "text": "Rome is in Italy",
                    "question_type": "true_false",
                    "correct_answer": "true"
                }
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status().as_u16(), 201);
    let quiz: Value = created.json().await.unwrap();
    assert_eq!(quiz["title"], "Capitals");
    let quiz_id = quiz["id"].as_i64().unwrap();

    let list: Vec<Value> = client
        .get(format!("{}/api/quizzes", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["question_count"], 2);

    let detail: Value = client
        .get(format!("{}/api/quizzes/{}", address, quiz_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let questions = detail["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 2);
    assert_eq!(questions[0]["type"], "multiple_choice");
    // Answers never leave the server through the detail endpoint.
    assert!(questions[0].get("correct_answer").is_none());
}

#[tokio::test]
async fn invalid_quiz_is_rejected() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let token = register_and_login(&client, &address, "sloppy").await;

    let response = client
        .post(format!("{}/api/quizzes", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "title": "Bad",
            "questions": [{
                "text": "Pick one",
                "question_type": "multiple_choice",
                "correct_answer": "E",
                "options": ["A", "B"]
            }]
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn unknown_quiz_is_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let detail = client
        .get(format!("{}/api/quizzes/999", address))
        .send()
        .await
        .unwrap();
    assert_eq!(detail.status().as_u16(), 404);

    let board = client
        .get(format!("{}/api/quizzes/999/leaderboard", address))
        .send()
        .await
        .unwrap();
    assert_eq!(board.status().as_u16(), 404);
}

#[tokio::test]
async fn daily_challenge_needs_a_public_quiz() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let none = client
        .get(format!("{}/api/daily-challenge", address))
        .send()
        .await
        .unwrap();
    assert_eq!(none.status().as_u16(), 404);

    let token = register_and_login(&client, &address, "daily").await;
    client
        .post(format!("{}/api/quizzes", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "title": "Daily quiz", "questions": [] }))
        .send()
        .await
        .unwrap();

    let first: Value = client
        .get(format!("{}/api/daily-challenge", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let second: Value = client
        .get(format!("{}/api/daily-challenge", address))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first["quiz"]["title"], "Daily quiz");
    assert_eq!(first["quiz"]["id"], second["quiz"]["id"]);
}
