use std::fmt;

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

pub const DRIVE_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/drive",
    "https://www.googleapis.com/auth/drive.file",
];

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token request failed")]
    Request(#[from] reqwest::Error),
    #[error("invalid token url")]
    Url(#[from] url::ParseError),
    #[error("failed to sign assertion")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("token endpoint returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

/// The parts of a service-account key file needed for the JWT bearer grant.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

#[derive(Clone)]
pub struct ServiceAccountAuth {
    http: Client,
    token_url: Url,
    key: ServiceAccountKey,
    scopes: String,
}

impl ServiceAccountAuth {
    pub fn new(key: ServiceAccountKey) -> Result<Self, AuthError> {
        let token_url = key
            .token_uri
            .clone()
            .filter(|uri| !uri.is_empty())
            .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string());
        Self::with_token_url(&token_url, key)
    }

    pub fn with_token_url(token_url: &str, key: ServiceAccountKey) -> Result<Self, AuthError> {
        Ok(Self {
            http: Client::new(),
            token_url: Url::parse(token_url)?,
            key,
            scopes: DRIVE_SCOPES.join(" "),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.key.client_email
    }

    /// Builds the signed RS256 assertion. `subject` is the user to
    /// impersonate through domain-wide delegation.
    pub fn assertion(&self, subject: Option<&str>, issued_at: i64) -> Result<String, AuthError> {
        let claims = Claims {
            iss: &self.key.client_email,
            scope: &self.scopes,
            aud: self.token_url.as_str(),
            iat: issued_at,
            exp: issued_at.saturating_add(ASSERTION_LIFETIME_SECS),
            sub: subject.filter(|s| !s.is_empty()),
        };
        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())?;
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &key,
        )?)
    }

    pub async fn fetch_token(&self, subject: Option<&str>) -> Result<AccessToken, AuthError> {
        let assertion = self.assertion(subject, now_unix())?;
        let form = [("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())];
        let response = self
            .http
            .post(self.token_url.clone())
            .form(&form)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.json::<AccessToken>().await?)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(AuthError::Api { status, body })
        }
    }
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    sub: Option<&'a str>,
}

#[derive(Deserialize, Serialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

fn now_unix() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
