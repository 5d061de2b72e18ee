use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::error::ClientError;
use crate::fetch::{ApiRequest, AuthenticatedHttpClient, BasicClient, HttpClient, api_error, decode_json};
use crate::services::account_api::{AccountApi, AuthResponse, LoginRequest, RegisterRequest, User};
use crate::session::Session;

const LOGIN_PATH: &str = "auth/login/";
const REGISTER_PATH: &str = "auth/register/";
const CURRENT_USER_PATH: &str = "auth/user/";

/// Account endpoints of the booking backend, on top of the authenticated client.
pub struct BackendClient<C = BasicClient> {
    http: Arc<AuthenticatedHttpClient<C>>,
}

impl<C: HttpClient> BackendClient<C> {
    pub fn new(http: Arc<AuthenticatedHttpClient<C>>) -> Self {
        Self { http }
    }

    pub fn http(&self) -> &Arc<AuthenticatedHttpClient<C>> {
        &self.http
    }

    pub fn session(&self) -> &Arc<Session> {
        self.http.session()
    }

    async fn authenticate(&self, request: ApiRequest) -> Result<AuthResponse, ClientError> {
        let response = self.http.send(request.auth_exempt()).await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        response.json().await.map_err(ClientError::Decode)
    }
}

#[async_trait]
impl<C: HttpClient> AccountApi for BackendClient<C> {
    #[tracing::instrument(skip(self, password))]
    async fn login(&self, username: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let auth = self.authenticate(ApiRequest::post(LOGIN_PATH).json(&body)?).await?;

        self.session()
            .begin(
                auth.tokens.access.clone(),
                auth.tokens.refresh.clone(),
                auth.user.clone(),
            )
            .await?;
        info!(user_id = auth.user.id, "Logged in");

        Ok(auth)
    }

    #[tracing::instrument(skip_all, fields(username = %request.username))]
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ClientError> {
        request.validate()?;
        let auth = self
            .authenticate(ApiRequest::post(REGISTER_PATH).json(request)?)
            .await?;
        info!(user_id = auth.user.id, "Account registered");
        Ok(auth)
    }

    async fn current_user(&self) -> Result<User, ClientError> {
        let response = self.http.send(ApiRequest::get(CURRENT_USER_PATH)).await?;
        let user: User = decode_json(response).await?;

        self.session().set_user(user.clone()).await?;
        Ok(user)
    }

    async fn logout(&self) -> Result<(), ClientError> {
        self.session().clear().await?;
        info!("Logged out");
        Ok(())
    }
}
