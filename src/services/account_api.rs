//! Trait and types for the backend's account endpoints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

/// Profile returned by login and `auth/user/`, cached in the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_type: Option<String>,
}

impl User {
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    pub access: String,
    pub refresh: String,
}

/// Body of a successful `auth/login/` or `auth/register/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub message: String,
    pub user: User,
    pub tokens: Tokens,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    /// Username or email address.
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    #[default]
    Client,
    ProprietaireVehicule,
    ProprietaireResidence,
    /// Owns both vehicles and residences.
    Proprietaire,
    Admin,
}

impl UserType {
    /// Owner accounts receive booking payments and must register a payout number.
    pub fn is_owner(&self) -> bool {
        matches!(
            self,
            UserType::ProprietaireVehicule | UserType::ProprietaireResidence | UserType::Proprietaire
        )
    }
}

impl std::str::FromStr for UserType {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(UserType::Client),
            "proprietaire_vehicule" => Ok(UserType::ProprietaireVehicule),
            "proprietaire_residence" => Ok(UserType::ProprietaireResidence),
            "proprietaire" => Ok(UserType::Proprietaire),
            "admin" => Ok(UserType::Admin),
            other => Err(ClientError::Validation(format!("unknown user type '{other}'"))),
        }
    }
}

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Clone, Default, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub phone: String,
    pub user_type: UserType,

    // mobile-money payout numbers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wave_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orange_money_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtn_money_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moov_money_number: Option<String>,
}

impl RegisterRequest {
    fn has_payout_number(&self) -> bool {
        [
            &self.wave_number,
            &self.orange_money_number,
            &self.mtn_money_number,
            &self.moov_money_number,
        ]
        .iter()
        .any(|n| n.as_deref().is_some_and(|n| !n.trim().is_empty()))
    }

    /// Checks what the backend would reject anyway, before a round trip.
    pub fn validate(&self) -> Result<(), ClientError> {
        for (field, value) in [
            ("username", &self.username),
            ("email", &self.email),
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
        ] {
            if value.trim().is_empty() {
                return Err(ClientError::Validation(format!("{field} is required")));
            }
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ClientError::Validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        if self.password != self.password_confirm {
            return Err(ClientError::Validation("passwords do not match".into()));
        }
        if self.user_type.is_owner() && !self.has_payout_number() {
            return Err(ClientError::Validation(
                "owner accounts need at least one mobile-money number".into(),
            ));
        }
        Ok(())
    }
}

/// Account operations against the booking backend.
#[async_trait]
pub trait AccountApi {
    /// Authenticates and starts a session holding both tokens and the profile.
    async fn login(&self, username: &str, password: &str) -> Result<AuthResponse, ClientError>;

    /// Creates an account. Does not start a session.
    async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ClientError>;

    /// Fetches the profile of the logged-in user and refreshes the cached copy.
    async fn current_user(&self) -> Result<User, ClientError>;

    /// Forgets the session locally.
    async fn logout(&self) -> Result<(), ClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner_request() -> RegisterRequest {
        RegisterRequest {
            username: "moussa".into(),
            email: "moussa@example.com".into(),
            password: "s3cretpass".into(),
            password_confirm: "s3cretpass".into(),
            first_name: "Moussa".into(),
            last_name: "Kone".into(),
            user_type: UserType::ProprietaireVehicule,
            wave_number: Some("+2250700000000".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_owner_registration() {
        assert!(owner_request().validate().is_ok());
    }

    #[test]
    fn test_owner_without_payout_number_is_rejected() {
        let mut request = owner_request();
        request.wave_number = Some("  ".into());
        let err = request.validate().unwrap_err();
        assert!(err.to_string().contains("mobile-money"));
    }

    #[test]
    fn test_client_needs_no_payout_number() {
        let mut request = owner_request();
        request.user_type = UserType::Client;
        request.wave_number = None;
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_password_mismatch_and_length() {
        let mut request = owner_request();
        request.password_confirm = "different1".into();
        assert!(request.validate().is_err());

        request.password = "short".into();
        request.password_confirm = "short".into();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_register_body_uses_backend_field_names() {
        let body = serde_json::to_value(owner_request()).unwrap();
        assert_eq!(body["user_type"], "proprietaire_vehicule");
        assert_eq!(body["password_confirm"], "s3cretpass");
        assert_eq!(body["wave_number"], "+2250700000000");
        assert!(body.get("moov_money_number").is_none());
        assert!(body.get("phone").is_none());
    }

    #[test]
    fn test_login_response_parses_backend_shape() {
        let raw = r#"{
            "message": "Connexion réussie",
            "user": {"id": 3, "username": "awa", "email": "awa@example.com",
                     "first_name": "Awa", "last_name": "Traore", "user_type": "client"},
            "tokens": {"refresh": "r1", "access": "abc123"}
        }"#;
        let parsed: AuthResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.tokens.access, "abc123");
        assert_eq!(parsed.user.display_name(), "Awa Traore");
        assert_eq!(parsed.user.user_type.as_deref(), Some("client"));
    }

    #[test]
    fn test_user_type_from_str() {
        assert_eq!("proprietaire".parse::<UserType>().unwrap(), UserType::Proprietaire);
        assert!("landlord".parse::<UserType>().is_err());
    }
}
