use async_trait::async_trait;
use reqwest::{Request, Response};
use std::sync::Arc;

/// The transport seam: anything that can execute a fully built request.
///
/// Implementations return the response for every HTTP status; only
/// network-level failures are errors.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}

#[async_trait]
impl<C: HttpClient + ?Sized> HttpClient for Arc<C> {
    async fn execute(&self, req: Request) -> reqwest::Result<Response> {
        (**self).execute(req).await
    }
}
