//! Mock webhook endpoint shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use url::Url;

/// Records every POST and answers from a status script (200 once empty).
#[derive(Clone, Default)]
pub struct MockWebhook {
    bodies: Arc<Mutex<Vec<Value>>>,
    content_types: Arc<Mutex<Vec<String>>>,
    script: Arc<Mutex<VecDeque<u16>>>,
}

impl MockWebhook {
    /// Bind to an ephemeral port and serve `/hook`.
    pub async fn spawn(script: Vec<u16>) -> (Url, Self) {
        let mock = Self {
            script: Arc::new(Mutex::new(script.into())),
            ..Self::default()
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get address");
        let router = Router::new()
            .route("/hook", post(hook))
            .with_state(mock.clone());

        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("Mock server failed");
        });

        let url = Url::parse(&format!("http://{addr}/hook")).expect("Invalid mock URL");
        (url, mock)
    }

    pub fn bodies(&self) -> Vec<Value> {
        self.bodies.lock().unwrap().clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.bodies()
            .iter()
            .map(|b| b["line"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn content_types(&self) -> Vec<String> {
        self.content_types.lock().unwrap().clone()
    }

    /// Wait until at least `count` requests arrived, or `limit` elapses.
    pub async fn wait_for(&self, count: usize, limit: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        while tokio::time::Instant::now() < deadline {
            if self.bodies.lock().unwrap().len() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        self.bodies.lock().unwrap().len() >= count
    }
}

async fn hook(
    State(mock): State<MockWebhook>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> StatusCode {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    mock.content_types.lock().unwrap().push(content_type);
    mock.bodies.lock().unwrap().push(body);

    let status = mock.script.lock().unwrap().pop_front().unwrap_or(200);
    StatusCode::from_u16(status).unwrap_or(StatusCode::OK)
}
