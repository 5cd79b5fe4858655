#![allow(dead_code)]

use std::sync::Arc;

use client_manager::service::UserRequest;
use client_manager::{build_router, AppState, MemoryStore};
use reqwest::{Method, RequestBuilder, Response};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// A live server on an ephemeral port, backed by a fresh memory store
pub struct TestServer {
    pub base_url: String,
    pub state: AppState,
    pub token: String,
    pub username: String,
    pub user_id: i32,
    http: reqwest::Client,
}

impl TestServer {
    pub async fn start() -> Self {
        let state = AppState::new(Arc::new(MemoryStore::default()));
        let (user, token) = state
            .service
            .create_user(UserRequest {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                first_name: "Alice".to_string(),
                last_name: "Doe".to_string(),
            })
            .await
            .expect("seed user");

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let app = build_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            token,
            username: user.username,
            user_id: user.id,
            http: reqwest::Client::new(),
        }
    }

    /// Provision another user and return its token
    pub async fn add_user(&self, username: &str) -> (i32, String) {
        let (user, token) = self
            .state
            .service
            .create_user(UserRequest {
                username: username.to_string(),
                ..Default::default()
            })
            .await
            .expect("add user");
        (user.id, token)
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
    }

    pub fn anonymous(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.base_url, path))
    }

    pub async fn get(&self, path: &str) -> Response {
        self.request(Method::GET, path).send().await.expect("GET")
    }

    pub async fn send_json(&self, method: Method, path: &str, body: Value) -> Response {
        self.request(method, path)
            .json(&body)
            .send()
            .await
            .expect("request")
    }

    /// Create a client and return its detail body
    pub async fn create_client(&self, first_name: &str, email: &str) -> Value {
        let response = self
            .send_json(
                Method::POST,
                "/api/clients/",
                json!({
                    "first_name": first_name,
                    "last_name": "Tester",
                    "email": email,
                    "company": "Acme",
                    "address": "1 Main St",
                    "notes": "VIP",
                }),
            )
            .await;
        assert_eq!(response.status(), 201);
        response.json().await.expect("client body")
    }

    pub async fn set_stage(&self, client_id: i64, stage: &str) -> Response {
        self.send_json(
            Method::PATCH,
            &format!("/api/clients/{client_id}/update_stage/"),
            json!({ "stage": stage }),
        )
        .await
    }
}

pub fn id_of(body: &Value) -> i64 {
    body["id"].as_i64().expect("id")
}
