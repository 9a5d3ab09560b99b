//! OAuth token persistence in the OS keychain, one entry per profile.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;

use fieldbook_core::auth::{AuthError, AuthResult, Authenticator, CredentialStore, OAuthClient, OAuthToken};
use fieldbook_core::RemoteConfig;

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "fieldbook-cli";

#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    username: String,
}

impl KeyringCredentialStore {
    pub fn new(profile_name: &str) -> Self {
        Self {
            username: format!("oauth_token:{profile_name}"),
        }
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self) -> AuthResult<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username)
            .map_err(|error| AuthError::CredentialStore(error.to_string()))
    }
}

impl CredentialStore for KeyringCredentialStore {
    #[cfg(not(test))]
    fn load_token(&self) -> AuthResult<Option<OAuthToken>> {
        let entry = self.entry()?;
        match entry.get_password() {
            Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(AuthError::CredentialStore(error.to_string())),
        }
    }

    #[cfg(test)]
    fn load_token(&self) -> AuthResult<Option<OAuthToken>> {
        let guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::CredentialStore(error.to_string()))?;
        guard
            .get(&self.username)
            .map(|raw| serde_json::from_str(raw))
            .transpose()
            .map_err(AuthError::from)
    }

    #[cfg(not(test))]
    fn save_token(&self, token: &OAuthToken) -> AuthResult<()> {
        let raw = serde_json::to_string(token)?;
        self.entry()?
            .set_password(&raw)
            .map_err(|error| AuthError::CredentialStore(error.to_string()))
    }

    #[cfg(test)]
    fn save_token(&self, token: &OAuthToken) -> AuthResult<()> {
        let raw = serde_json::to_string(token)?;
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::CredentialStore(error.to_string()))?;
        guard.insert(self.username.clone(), raw);
        Ok(())
    }

    #[cfg(not(test))]
    fn clear_token(&self) -> AuthResult<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(AuthError::CredentialStore(error.to_string())),
        }
    }

    #[cfg(test)]
    fn clear_token(&self) -> AuthResult<()> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| AuthError::CredentialStore(error.to_string()))?;
        guard.remove(&self.username);
        Ok(())
    }
}

pub type ProfileAuthenticator = Authenticator<KeyringCredentialStore>;

pub fn authenticator_for_profile(
    profile_name: &str,
    config: &RemoteConfig,
) -> AuthResult<ProfileAuthenticator> {
    let client = OAuthClient::new(config)?;
    Authenticator::new(client, KeyringCredentialStore::new(profile_name))
}

pub fn clear_stored_token(profile_name: &str) -> AuthResult<()> {
    KeyringCredentialStore::new(profile_name).clear_token()
}

pub fn load_stored_token(profile_name: &str) -> AuthResult<Option<OAuthToken>> {
    KeyringCredentialStore::new(profile_name).load_token()
}
