//! OAuth authorization-code client for the disk provider

use std::fmt;

use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{AuthError, AuthResult, OAuthToken};
use crate::config::RemoteConfig;

const SCOPE: &str = "disk:app_folder";

#[derive(Clone)]
pub struct OAuthClient {
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: Option<String>,
    oauth_base_url: String,
    client: Client,
}

impl fmt::Debug for OAuthClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("OAuthClient")
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("redirect_uri", &self.redirect_uri)
            .field("oauth_base_url", &self.oauth_base_url)
            .finish_non_exhaustive()
    }
}

impl OAuthClient {
    pub fn new(config: &RemoteConfig) -> AuthResult<Self> {
        if config.client_id.trim().is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "OAuth client id must not be empty".to_string(),
            ));
        }

        Ok(Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            oauth_base_url: config.oauth_base_url.trim_end_matches('/').to_string(),
            client: Client::builder().build()?,
        })
    }

    /// URL the user opens to grant access
    pub fn authorization_url(&self) -> String {
        let mut params = vec![
            ("response_type", "code"),
            ("client_id", self.client_id.as_str()),
        ];
        if let Some(redirect_uri) = self.redirect_uri.as_deref() {
            params.push(("redirect_uri", redirect_uri));
        }
        params.push(("scope", SCOPE));

        let query = params
            .into_iter()
            .map(|(key, value)| format!("{key}={}", urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}/authorize?{query}", self.oauth_base_url)
    }

    pub async fn exchange_code(&self, code: &str) -> AuthResult<OAuthToken> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Authorization code must not be empty".to_string(),
            ));
        }

        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.client_id.as_str()),
        ];
        if let Some(secret) = self.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }
        if let Some(redirect_uri) = self.redirect_uri.as_deref() {
            form.push(("redirect_uri", redirect_uri));
        }

        let response = self.request_token(&form).await?;
        response.into_token(None)
    }

    /// Refresh an access token, keeping `refresh_token` if the response omits a new one.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<OAuthToken> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Refresh token must not be empty".to_string(),
            ));
        }

        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
        ];
        if let Some(secret) = self.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }

        let response = self.request_token(&form).await?;
        response.into_token(Some(refresh_token))
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> AuthResult<TokenResponse> {
        let response = self
            .client
            .post(format!("{}/token", self.oauth_base_url))
            .header("Accept", "application/json")
            .form(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        Ok(response.json::<TokenResponse>().await?)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_token(self, previous_refresh_token: Option<&str>) -> AuthResult<OAuthToken> {
        let Some(access_token) = self.access_token.filter(|token| !token.trim().is_empty()) else {
            return Err(AuthError::Api(
                "Token response did not include an access token".to_string(),
            ));
        };
        let expires_in = self.expires_in.ok_or_else(|| {
            AuthError::Api("Token response did not include expires_in".to_string())
        })?;
        let refresh_token = self
            .refresh_token
            .or_else(|| previous_refresh_token.map(str::to_string));

        Ok(OAuthToken::expiring_in(access_token, refresh_token, expires_in))
    }
}

#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<OAuthErrorResponse>(body) {
        if let Some(message) = payload.error_description.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", crate::util::compact_text(trimmed), status.as_u16())
    }
}
