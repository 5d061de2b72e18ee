use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::auth::refresh::{RefreshOutcome, TokenRefresher};
use super::basic::BasicClient;
use super::client::HttpClient;
use super::request::ApiRequest;
use crate::config::ClientConfig;
use crate::error::{ClientError, RefreshError, UnauthorizedReason};
use crate::navigation::AuthFailureHook;
use crate::session::Session;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Sends requests to one backend origin with the session's bearer token and
/// recovers once from an expired access token.
///
/// On a 401 the client exchanges the stored refresh token at
/// `token/refresh/`, stores the new access token and sends the original
/// request again. That second answer is final. Refreshes are serialized:
/// callers that hit 401 with the same stale token while a refresh is running
/// reuse its result instead of starting their own.
pub struct AuthenticatedHttpClient<C = BasicClient> {
    transport: C,
    base_url: Url,
    session: Arc<Session>,
    refresher: TokenRefresher,
    timeout: Duration,
    on_auth_failure: Option<Arc<dyn AuthFailureHook>>,
}

impl AuthenticatedHttpClient<BasicClient> {
    /// Builds a `reqwest` transport and a client from `config`.
    pub fn from_config(config: &ClientConfig, session: Arc<Session>) -> Result<Self, ClientError> {
        let transport = BasicClient::from_config(config)?;
        Ok(Self::new(transport, config.base_url.clone(), session)?
            .with_timeout(config.request_timeout))
    }
}

impl<C: HttpClient> AuthenticatedHttpClient<C> {
    pub fn new(transport: C, base_url: Url, session: Arc<Session>) -> Result<Self, ClientError> {
        let refresher = TokenRefresher::new(&base_url)?;
        Ok(Self {
            transport,
            base_url,
            session,
            refresher,
            timeout: DEFAULT_TIMEOUT,
            on_auth_failure: None,
        })
    }

    /// Deadline for a whole `send`, refresh and retry included.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_auth_failure_hook(mut self, hook: Arc<dyn AuthFailureHook>) -> Self {
        self.on_auth_failure = Some(hook);
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Sends `request` and returns the backend's response for every status
    /// except 401.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Unauthorized`] when a 401 cannot be recovered: no
    ///   refresh token is stored, or the request already went through its
    ///   retry.
    /// - [`ClientError::Refresh`] when the refresh exchange itself fails; the
    ///   session has been cleared by then.
    /// - [`ClientError::Timeout`] when the whole cycle exceeds the deadline.
    /// - [`ClientError::Transport`] for network failures.
    ///
    /// Auth-exempt requests get their 401 back as a response.
    #[tracing::instrument(
        skip(self, request),
        fields(method = %request.method(), path = %request.path())
    )]
    pub async fn send(&self, request: ApiRequest) -> Result<Response, ClientError> {
        match tokio::time::timeout(self.timeout, self.send_with_refresh(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout = ?self.timeout, "Request timed out");
                Err(ClientError::Timeout(self.timeout))
            }
        }
    }

    /// Sends `request` and decodes a 2xx JSON body. Other statuses become
    /// [`ClientError::Api`].
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ClientError> {
        let response = self.send(request).await?;
        decode_json(response).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        self.send_json(ApiRequest::get(path)).await
    }

    async fn send_with_refresh(&self, mut request: ApiRequest) -> Result<Response, ClientError> {
        if request.is_auth_exempt() {
            return self.dispatch(&request, None).await;
        }

        let token = self.session.access_token().await;
        let response = self.dispatch(&request, token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        if request.is_retry() {
            return Err(unauthorized(response, UnauthorizedReason::AlreadyRetried).await);
        }
        request.mark_retry();
        warn!("Access token rejected, attempting refresh");

        let fresh = match self
            .refresher
            .refresh(&self.transport, &self.session, token.as_deref())
            .await
        {
            Ok(RefreshOutcome::Refreshed(t) | RefreshOutcome::AlreadyRefreshed(t)) => t,
            Ok(RefreshOutcome::NoRefreshToken) => {
                return Err(unauthorized(response, UnauthorizedReason::NoRefreshToken).await);
            }
            Err(e) => {
                let shared = matches!(e, ClientError::Refresh(RefreshError::Concurrent(_)));
                if matches!(e, ClientError::Refresh(_)) && !shared {
                    self.notify_auth_failure();
                }
                return Err(e);
            }
        };

        debug!("Retrying request with refreshed token");
        let retried = self.dispatch(&request, Some(&fresh)).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            return Err(unauthorized(retried, UnauthorizedReason::AlreadyRetried).await);
        }
        Ok(retried)
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<Response, ClientError> {
        let built = request.build(&self.base_url, token)?;
        debug!(
            authenticated = token.is_some_and(|t| !t.is_empty()),
            retry = request.is_retry(),
            "Dispatching request"
        );
        let response = self.transport.execute(built).await?;
        debug!(status = response.status().as_u16(), "Response received");
        Ok(response)
    }

    fn notify_auth_failure(&self) {
        if let Some(hook) = &self.on_auth_failure {
            hook.on_auth_failure();
        }
    }
}

async fn unauthorized(response: Response, reason: UnauthorizedReason) -> ClientError {
    warn!(%reason, "Request unauthorized");
    let body = read_body(response).await;
    ClientError::Unauthorized { reason, body }
}

/// Reads an error body for reporting. A body that cannot be read becomes empty.
pub(crate) async fn read_body(response: Response) -> String {
    match response.text().await {
        Ok(body) => body,
        Err(e) => {
            debug!(error = %e, "Failed to read response body");
            String::new()
        }
    }
}

/// Decodes a 2xx JSON body or turns the response into [`ClientError::Api`].
pub(crate) async fn decode_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    if !response.status().is_success() {
        return Err(api_error(response).await);
    }
    response.json().await.map_err(ClientError::Decode)
}

/// Builds [`ClientError::Api`], preferring the backend's `error` or `detail`
/// message over the raw body.
pub(crate) async fn api_error(response: Response) -> ClientError {
    let status = response.status();
    let body = read_body(response).await;

    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|json| {
            ["error", "detail"]
                .iter()
                .find_map(|field| json.get(field).and_then(|v| v.as_str()).map(String::from))
        })
        .unwrap_or(body);

    ClientError::Api { status, message }
}
