use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use serde::Serialize;

use super::auth::bearer;
use crate::error::ClientError;

/// A request to the backend, described independently of any token.
///
/// Kept by value across a refresh so the exact same request can be sent a
/// second time. `retried` is the retry marker: once set, a further 401 is
/// final.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<Bytes>,
    auth_exempt: bool,
    retried: bool,
}

impl ApiRequest {
    /// `path` is relative to the configured origin, e.g. `"bookings/5/"`.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
            auth_exempt: false,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Serializes `body` as the JSON payload.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ClientError> {
        let bytes = serde_json::to_vec(body)
            .map_err(|e| ClientError::InvalidRequest(format!("body is not serializable: {e}")))?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Some(Bytes::from(bytes));
        Ok(self)
    }

    /// Sets a raw payload with an explicit content type.
    pub fn bytes(mut self, content_type: HeaderValue, body: impl Into<Bytes>) -> Self {
        self.headers.insert(CONTENT_TYPE, content_type);
        self.body = Some(body.into());
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sends without credentials and never refreshes; a 401 comes back as a
    /// plain response. Used for login and registration.
    pub fn auth_exempt(mut self) -> Self {
        self.auth_exempt = true;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn is_auth_exempt(&self) -> bool {
        self.auth_exempt
    }

    pub fn is_retry(&self) -> bool {
        self.retried
    }

    pub(crate) fn mark_retry(&mut self) {
        self.retried = true;
    }

    /// Resolves the path against `base` and attaches `token` as a bearer
    /// credential when it is present and non-empty.
    ///
    /// The resolved URL must stay on `base`'s origin and under its path, so
    /// an absolute URL or a `../` path never receives the token.
    pub(crate) fn build(
        &self,
        base: &Url,
        token: Option<&str>,
    ) -> Result<reqwest::Request, ClientError> {
        let url = base
            .join(self.path.trim_start_matches('/'))
            .map_err(|e| ClientError::InvalidRequest(format!("bad path '{}': {e}", self.path)))?;
        if url.origin() != base.origin() || !url.path().starts_with(base.path()) {
            return Err(ClientError::InvalidRequest(format!(
                "path '{}' resolves outside {base}",
                self.path
            )));
        }

        let mut request = reqwest::Request::new(self.method.clone(), url);
        *request.headers_mut() = self.headers.clone();
        if let Some(body) = &self.body {
            *request.body_mut() = Some(body.clone().into());
        }

        if let Some(token) = token.filter(|t| !t.is_empty()) {
            bearer::attach(request.headers_mut(), token)?;
        }

        Ok(request)
    }
}
