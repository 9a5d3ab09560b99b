//! Token owner: restore, refresh, callback handling, and sign-out

use tokio::sync::Mutex;

use super::{AuthError, AuthResult, CredentialStore, OAuthClient, OAuthToken};

/// Refresh proactively when the token expires within this many seconds
pub const REFRESH_MARGIN_SECONDS: i64 = 5 * 60;

pub struct Authenticator<S: CredentialStore> {
    client: OAuthClient,
    store: S,
    token: Mutex<Option<OAuthToken>>,
}

impl<S: CredentialStore> Authenticator<S> {
    /// Create an authenticator, restoring any token persisted in `store`.
    pub fn new(client: OAuthClient, store: S) -> AuthResult<Self> {
        let token = store.load_token()?;
        Ok(Self {
            client,
            store,
            token: Mutex::new(token),
        })
    }

    pub fn authorization_url(&self) -> String {
        self.client.authorization_url()
    }

    /// Whether a usable token is held, refreshing first when one is close to expiry.
    ///
    /// A token without a refresh credential is trusted until it expires,
    /// without contacting the network.
    pub async fn is_authenticated(&self) -> bool {
        match self.access_token().await {
            Ok(_) => true,
            Err(AuthError::NotAuthenticated) => false,
            Err(error) => {
                tracing::warn!("Remote credential is unusable: {}", error);
                false
            }
        }
    }

    /// Current access token, refreshed if needed.
    pub async fn access_token(&self) -> AuthResult<String> {
        let mut guard = self.token.lock().await;
        let Some(token) = guard.as_ref() else {
            return Err(AuthError::NotAuthenticated);
        };

        match token.refresh_token.as_deref() {
            Some(refresh_token) if token.expires_within(REFRESH_MARGIN_SECONDS) => {
                tracing::debug!("Access token close to expiry; refreshing");
                let refresh_token = refresh_token.to_string();
                let refreshed = self.client.refresh(&refresh_token).await?;
                self.store.save_token(&refreshed)?;
                let access_token = refreshed.access_token.clone();
                *guard = Some(refreshed);
                Ok(access_token)
            }
            _ if token.is_expired() => Err(AuthError::NotAuthenticated),
            _ => Ok(token.access_token.clone()),
        }
    }

    /// Store the credential carried by an OAuth redirect.
    ///
    /// Accepts an implicit-grant URL or fragment (`access_token=…&expires_in=…`),
    /// a URL or query carrying `code=…`, or a bare authorization code.
    pub async fn consume_callback(&self, raw: &str) -> AuthResult<OAuthToken> {
        let token = match parse_callback(raw)? {
            Callback::Token(token) => token,
            Callback::Code(code) => self.client.exchange_code(&code).await?,
        };

        self.store.save_token(&token)?;
        *self.token.lock().await = Some(token.clone());
        tracing::info!("Stored remote storage credential");
        Ok(token)
    }

    /// Forget the credential in memory and in the store.
    pub async fn disconnect(&self) -> AuthResult<()> {
        *self.token.lock().await = None;
        self.store.clear_token()?;
        tracing::info!("Cleared remote storage credential");
        Ok(())
    }

    /// Snapshot of the held token, for status displays
    pub async fn token(&self) -> Option<OAuthToken> {
        self.token.lock().await.clone()
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Callback {
    Token(OAuthToken),
    Code(String),
}

fn parse_callback(raw: &str) -> AuthResult<Callback> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AuthError::InvalidConfiguration(
            "Callback value must not be empty".to_string(),
        ));
    }

    if !raw.contains('=') {
        return Ok(Callback::Code(raw.to_string()));
    }

    // Fragment wins over query: implicit grant puts the token after '#'
    let params_part = raw
        .rsplit_once('#')
        .or_else(|| raw.split_once('?'))
        .map_or(raw, |(_, params)| params);
    let params = parse_params(params_part);
    let param = |key: &str| {
        params
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.clone())
            .filter(|value| !value.is_empty())
    };

    if let Some(error) = param("error") {
        let message = param("error_description").unwrap_or(error);
        return Err(AuthError::Api(message));
    }

    if let Some(access_token) = param("access_token") {
        let expires_in = param("expires_in")
            .ok_or_else(|| AuthError::Api("Callback did not include expires_in".to_string()))?
            .parse::<i64>()
            .map_err(|_| AuthError::Api("Callback expires_in is not a number".to_string()))?;
        return Ok(Callback::Token(OAuthToken::expiring_in(
            access_token,
            param("refresh_token"),
            expires_in,
        )));
    }

    param("code").map(Callback::Code).ok_or_else(|| {
        AuthError::Api("Callback did not include an access token or code".to_string())
    })
}

fn parse_params(raw: &str) -> Vec<(String, String)> {
    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(key), decode(value))
        })
        .collect()
}

fn decode(value: &str) -> String {
    let value = value.replace('+', " ");
    urlencoding::decode(&value).map_or_else(|_| value.clone(), |decoded| decoded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryCredentialStore;
    use crate::config::RemoteConfig;
    use crate::test_http::StubServer;
    use pretty_assertions::assert_eq;

    fn authenticator(store: MemoryCredentialStore) -> Authenticator<MemoryCredentialStore> {
        let mut config = RemoteConfig::new("client", "InspectionApp").unwrap();
        // Unroutable, so any accidental network use fails fast
        config.oauth_base_url = "http://127.0.0.1:9".to_string();
        Authenticator::new(OAuthClient::new(&config).unwrap(), store).unwrap()
    }

    #[test]
    fn parse_implicit_grant_fragment() {
        let callback = parse_callback(
            "https://app.example/callback#access_token=AQAA%2Bxyz&token_type=bearer&expires_in=31536000",
        )
        .unwrap();
        let Callback::Token(token) = callback else {
            panic!("expected a token");
        };
        assert_eq!(token.access_token, "AQAA+xyz");
        assert!(token.refresh_token.is_none());
        assert!(!token.is_expired());
    }

    #[test]
    fn parse_code_from_url_and_bare_value() {
        assert_eq!(
            parse_callback("https://app.example/callback?code=4821&state=x").unwrap(),
            Callback::Code("4821".to_string())
        );
        assert_eq!(
            parse_callback(" 4821 ").unwrap(),
            Callback::Code("4821".to_string())
        );
    }

    #[test]
    fn parse_error_callback() {
        let error = parse_callback("#error=access_denied&error_description=User+denied")
            .unwrap_err();
        assert!(error.to_string().contains("User denied"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn implicit_token_is_trusted_until_expiry_without_network() {
        let store = MemoryCredentialStore::new();
        let auth = authenticator(store.clone());
        assert!(!auth.is_authenticated().await);

        auth.consume_callback("#access_token=abc&expires_in=3600")
            .await
            .unwrap();
        assert!(auth.is_authenticated().await);
        assert_eq!(auth.access_token().await.unwrap(), "abc");
        assert!(store.load_token().unwrap().is_some());

        let expired = authenticator(MemoryCredentialStore::with_token(OAuthToken::expiring_in(
            "old", None, -10,
        )));
        assert!(!expired.is_authenticated().await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn restores_token_from_store() {
        let store =
            MemoryCredentialStore::with_token(OAuthToken::expiring_in("persisted", None, 3600));
        let auth = authenticator(store);
        assert_eq!(auth.access_token().await.unwrap(), "persisted");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_refresh_means_not_authenticated() {
        let store = MemoryCredentialStore::with_token(OAuthToken::expiring_in(
            "almost-expired",
            Some("refresh".to_string()),
            60,
        ));
        let auth = authenticator(store);
        assert!(!auth.is_authenticated().await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn token_near_expiry_is_refreshed_and_persisted() {
        let server = StubServer::spawn(vec![(
            200,
            r#"{"token_type":"bearer","access_token":"fresh","expires_in":3600}"#,
        )])
        .await;
        let store = MemoryCredentialStore::with_token(OAuthToken::expiring_in(
            "stale",
            Some("refresh-1".to_string()),
            60,
        ));
        let mut config = RemoteConfig::new("client", "InspectionApp").unwrap();
        config.oauth_base_url = server.base_url().to_string();
        let auth = Authenticator::new(OAuthClient::new(&config).unwrap(), store.clone()).unwrap();

        assert_eq!(auth.access_token().await.unwrap(), "fresh");
        assert_eq!(server.requests(), vec!["POST /token".to_string()]);

        let saved = store.load_token().unwrap().unwrap();
        assert_eq!(saved.access_token, "fresh");
        assert_eq!(saved.refresh_token.as_deref(), Some("refresh-1"));
        assert!(!saved.expires_within(REFRESH_MARGIN_SECONDS));

        // Fresh token is served from memory
        assert_eq!(auth.access_token().await.unwrap(), "fresh");
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn disconnect_clears_memory_and_store() {
        let store = MemoryCredentialStore::with_token(OAuthToken::expiring_in("t", None, 3600));
        let auth = authenticator(store.clone());
        auth.disconnect().await.unwrap();

        assert!(!auth.is_authenticated().await);
        assert!(store.load_token().unwrap().is_none());
    }
}
