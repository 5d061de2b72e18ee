use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Method, Url};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ClientError, RefreshError};
use crate::fetch::client::HttpClient;
use crate::fetch::read_body;
use crate::session::Session;

/// Token-refresh endpoint, relative to the backend origin.
pub const REFRESH_PATH: &str = "token/refresh/";

#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
}

/// What the refresh step produced for a caller whose request got a 401.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RefreshOutcome {
    /// This caller exchanged the refresh token for a new access token.
    Refreshed(String),
    /// Another caller already replaced the rejected token while this one waited.
    AlreadyRefreshed(String),
    NoRefreshToken,
}

/// A failed exchange, remembered so that callers queued behind it report the
/// same failure instead of finding an empty session.
struct FailedRefresh {
    rejected: String,
    reason: String,
}

/// Serializes refreshes so that concurrent 401s share a single exchange.
pub(crate) struct TokenRefresher {
    endpoint: Url,
    gate: Mutex<Option<FailedRefresh>>,
}

impl TokenRefresher {
    pub(crate) fn new(base_url: &Url) -> Result<Self, ClientError> {
        let endpoint = base_url.join(REFRESH_PATH).map_err(|e| {
            ClientError::InvalidRequest(format!("cannot build refresh endpoint: {e}"))
        })?;
        Ok(Self {
            endpoint,
            gate: Mutex::new(None),
        })
    }

    /// Obtains a usable access token after `rejected` was refused.
    ///
    /// On exchange failure the whole session is cleared before the error is
    /// returned. Callers that were rejected with the same token and waited
    /// on that exchange get [`RefreshError::Concurrent`].
    pub(crate) async fn refresh<C: HttpClient + ?Sized>(
        &self,
        transport: &C,
        session: &Session,
        rejected: Option<&str>,
    ) -> Result<RefreshOutcome, ClientError> {
        let mut last_failure = self.gate.lock().await;

        let current = session.access_token().await;
        if let Some(current) = current.filter(|t| Some(t.as_str()) != rejected) {
            debug!("Access token already replaced by a concurrent refresh");
            return Ok(RefreshOutcome::AlreadyRefreshed(current));
        }

        let Some(refresh_token) = session.refresh_token().await else {
            if let Some(failed) = last_failure
                .as_ref()
                .filter(|f| Some(f.rejected.as_str()) == rejected)
            {
                debug!("Refresh for this token already failed");
                return Err(ClientError::Refresh(RefreshError::Concurrent(
                    failed.reason.clone(),
                )));
            }
            warn!("No refresh token stored, cannot recover from 401");
            return Ok(RefreshOutcome::NoRefreshToken);
        };

        match exchange_token(transport, &self.endpoint, &refresh_token).await {
            Ok(access) => {
                *last_failure = None;
                session.replace_access_token(access.clone()).await?;
                info!("Access token refreshed");
                Ok(RefreshOutcome::Refreshed(access))
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, clearing session");
                *last_failure = rejected.map(|rejected| FailedRefresh {
                    rejected: rejected.to_string(),
                    reason: e.to_string(),
                });
                if let Err(store_err) = session.clear().await {
                    warn!(error = %store_err, "Failed to clear credentials after refresh failure");
                }
                Err(ClientError::Refresh(e))
            }
        }
    }
}

/// Trades a refresh token for a new access token. The request carries no
/// `Authorization` header.
#[tracing::instrument(skip_all, fields(endpoint = %endpoint))]
pub(crate) async fn exchange_token<C: HttpClient + ?Sized>(
    transport: &C,
    endpoint: &Url,
    refresh_token: &str,
) -> Result<String, RefreshError> {
    let body = serde_json::json!({ "refresh": refresh_token }).to_string();

    let mut request = reqwest::Request::new(Method::POST, endpoint.clone());
    request
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    *request.body_mut() = Some(body.into());

    let response = transport.execute(request).await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = read_body(response).await;
        return Err(RefreshError::Rejected { status, body });
    }

    let parsed: RefreshResponse = response
        .json()
        .await
        .map_err(|e| RefreshError::MalformedResponse(e.to_string()))?;

    if parsed.access.is_empty() {
        return Err(RefreshError::MalformedResponse(
            "empty access token".to_string(),
        ));
    }

    Ok(parsed.access)
}
