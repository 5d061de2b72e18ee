//! Scripted backend for exercising the client without a network.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, Request, Response};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::client::HttpClient;

/// What the mock saw for one request.
#[derive(Debug, Clone)]
pub(crate) struct Recorded {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Option<serde_json::Value>,
}

type Handler = dyn Fn(&Recorded) -> (u16, String) + Send + Sync;

/// Answers every request with `handler(request)` after yielding once, so
/// concurrent callers interleave the way they would on a real socket.
#[derive(Clone)]
pub(crate) struct MockBackend {
    handler: Arc<Handler>,
    calls: Arc<Mutex<Vec<Recorded>>>,
    delay: Option<Duration>,
}

impl MockBackend {
    pub(crate) fn new(handler: impl Fn(&Recorded) -> (u16, String) + Send + Sync + 'static) -> Self {
        Self {
            handler: Arc::new(handler),
            calls: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn calls_to(&self, path: &str) -> Vec<Recorded> {
        self.calls()
            .into_iter()
            .filter(|call| call.path == path)
            .collect()
    }
}

#[async_trait]
impl HttpClient for MockBackend {
    async fn execute(&self, req: Request) -> reqwest::Result<Response> {
        let recorded = Recorded {
            method: req.method().clone(),
            path: req.url().path().to_string(),
            authorization: req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(String::from),
            body: req
                .body()
                .and_then(|b| b.as_bytes())
                .and_then(|b| serde_json::from_slice(b).ok()),
        };
        self.calls.lock().unwrap().push(recorded.clone());

        match self.delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }

        let (status, body) = (self.handler)(&recorded);
        let response = http::Response::builder()
            .status(status)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();
        Ok(Response::from(response))
    }
}
