//! API smoke tests against a running server
//!
//! Run with: cargo test -- --ignored
//! Expects an admin account `admin` / `admin123` on the target server.

use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8000";

fn api(path: &str) -> String {
    format!("{}/api{}", BASE_URL, path)
}

fn unique(prefix: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .subsec_nanos();
    format!("{}_{}", prefix, nanos)
}

async fn login(client: &Client, username: &str, password: &str) -> String {
    let response = client
        .post(api("/auth/login"))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .expect("Failed to send login request");

    let body: Value = response.json().await.expect("Failed to parse login response");
    body["data"]["access_token"]
        .as_str()
        .expect("No token in response")
        .to_string()
}

/// Register a fresh reader and return its token
async fn reader_token(client: &Client) -> String {
    let username = unique("lector");
    let response = client
        .post(api("/auth/register"))
        .json(&json!({
            "username": username,
            "email": format!("{}@example.org", username),
            "password": "lector123"
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);

    login(client, &username, "lector123").await
}

#[tokio::test]
#[ignore]
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_register_and_me() {
    let client = Client::new();
    let token = reader_token(&client).await;

    let response = client
        .get(api("/auth/me"))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["data"]["role"], "usuario");
    assert!(body["data"].get("password_hash").is_none());
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = Client::new();

    let response = client
        .post(api("/auth/login"))
        .json(&json!({ "username": "admin", "password": "wrong" }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["message"].is_string());
}

#[tokio::test]
#[ignore]
async fn test_unauthorized_access() {
    let client = Client::new();

    let response = client
        .get(api("/loans/my-loans"))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_reader_cannot_create_book() {
    let client = Client::new();
    let token = reader_token(&client).await;

    let response = client
        .post(api("/books"))
        .bearer_auth(&token)
        .json(&json!({
            "title": "Rayuela",
            "author": "Julio Cortázar",
            "isbn": "9780306406157"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 403);
}

#[tokio::test]
#[ignore]
async fn test_list_books_public() {
    let client = Client::new();

    let response = client
        .get(api("/books?limit=5"))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["data"].is_array());
}

#[tokio::test]
#[ignore]
async fn test_borrow_return_review_flow() {
    let client = Client::new();
    let admin = login(&client, "admin", "admin123").await;
    let reader = reader_token(&client).await;

    // ISBN-13 with a valid check digit derived from the current time
    let mut digits: Vec<u32> = format!("978{:09}", std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock")
        .as_nanos()
        % 1_000_000_000)
        .chars()
        .filter_map(|c| c.to_digit(10))
        .collect();
    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { *d } else { d * 3 })
        .sum();
    digits.push((10 - sum % 10) % 10);
    let isbn: String = digits.iter().map(|d| d.to_string()).collect();

    let response = client
        .post(api("/books"))
        .bearer_auth(&admin)
        .json(&json!({
            "title": "Pedro Páramo",
            "author": "Juan Rulfo",
            "isbn": isbn,
            "total_copies": 1
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse response");
    let book_id = body["data"]["id"].as_i64().expect("book id");

    let response = client
        .post(api("/loans"))
        .bearer_auth(&reader)
        .json(&json!({ "book_id": book_id }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse response");
    let loan_id = body["data"]["id"].as_i64().expect("loan id");

    let response = client
        .get(api(&format!("/books/{}/read", book_id)))
        .bearer_auth(&reader)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let response = client
        .put(api(&format!("/loans/{}/return", loan_id)))
        .bearer_auth(&reader)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());

    let review = json!({ "book_id": book_id, "rating": 4, "comment": "Muy bueno" });
    let response = client
        .post(api("/reviews"))
        .bearer_auth(&reader)
        .json(&review)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);

    let response = client
        .post(api("/reviews"))
        .bearer_auth(&reader)
        .json(&review)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["detail"], "DuplicateReview");

    let response = client
        .delete(api(&format!("/books/{}", book_id)))
        .bearer_auth(&admin)
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
}
