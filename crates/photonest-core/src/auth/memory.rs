//! Process-local auth backend and session store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::{
    validate_credentials, validate_email, validate_new_password, AuthError, AuthProvider,
    AuthResult, AuthSession, AuthUser, SessionPersistence,
};

const TOKEN_LIFETIME_SECONDS: i64 = 3600;

/// Session store that lives as long as the process
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    session: Arc<Mutex<Option<AuthSession>>>,
}

impl SessionPersistence for MemorySessionStore {
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        let session = self
            .session
            .lock()
            .map_err(|_| AuthError::SecureStorage("session store lock poisoned".to_string()))?;
        Ok(session.clone())
    }

    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        let mut slot = self
            .session
            .lock()
            .map_err(|_| AuthError::SecureStorage("session store lock poisoned".to_string()))?;
        *slot = Some(session.clone());
        Ok(())
    }

    fn clear_session(&self) -> AuthResult<()> {
        let mut slot = self
            .session
            .lock()
            .map_err(|_| AuthError::SecureStorage("session store lock poisoned".to_string()))?;
        *slot = None;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Account {
    uid: String,
    email: String,
    password: String,
}

#[derive(Default)]
struct Accounts {
    by_email: HashMap<String, Account>,
    /// refresh token -> uid
    refresh_tokens: HashMap<String, String>,
    password_resets: Vec<String>,
}

/// Auth provider with accounts kept in memory
#[derive(Clone, Default)]
pub struct InMemoryAuthProvider<S: SessionPersistence = MemorySessionStore> {
    accounts: Arc<Mutex<Accounts>>,
    offline: Arc<AtomicBool>,
    store: S,
}

impl InMemoryAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: SessionPersistence> InMemoryAuthProvider<S> {
    pub fn with_store(store: S) -> Self {
        Self {
            accounts: Arc::default(),
            offline: Arc::default(),
            store,
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Addresses that requested a password reset, oldest first
    pub fn password_resets(&self) -> Vec<String> {
        self.accounts
            .lock()
            .map(|accounts| accounts.password_resets.clone())
            .unwrap_or_default()
    }

    fn accounts(&self) -> AuthResult<std::sync::MutexGuard<'_, Accounts>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AuthError::Unreachable("auth service is offline".to_string()));
        }
        self.accounts
            .lock()
            .map_err(|_| AuthError::Api("account table lock poisoned".to_string()))
    }

    fn issue_session(accounts: &mut Accounts, account: &Account) -> AuthSession {
        let refresh_token = uuid::Uuid::now_v7().to_string();
        accounts
            .refresh_tokens
            .insert(refresh_token.clone(), account.uid.clone());
        AuthSession {
            id_token: uuid::Uuid::now_v7().to_string(),
            refresh_token,
            expires_at: chrono::Utc::now().timestamp() + TOKEN_LIFETIME_SECONDS,
            user: AuthUser {
                id: account.uid.clone(),
                email: Some(account.email.clone()),
            },
        }
    }
}

impl<S: SessionPersistence> AuthProvider for InMemoryAuthProvider<S> {
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        validate_credentials(email, password)?;
        validate_new_password(password)?;
        let email = email.trim().to_lowercase();

        let session = {
            let mut accounts = self.accounts()?;
            if accounts.by_email.contains_key(&email) {
                return Err(AuthError::EmailAlreadyInUse);
            }
            let account = Account {
                uid: uuid::Uuid::now_v7().simple().to_string(),
                email: email.clone(),
                password: password.to_string(),
            };
            let session = Self::issue_session(&mut accounts, &account);
            accounts.by_email.insert(email, account);
            session
        };
        self.store.save_session(&session)?;
        Ok(session)
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        validate_credentials(email, password)?;
        let email = email.trim().to_lowercase();

        let session = {
            let mut accounts = self.accounts()?;
            let account = accounts
                .by_email
                .get(&email)
                .filter(|account| account.password == password)
                .cloned()
                .ok_or(AuthError::InvalidCredentials)?;
            Self::issue_session(&mut accounts, &account)
        };
        self.store.save_session(&session)?;
        Ok(session)
    }

    async fn refresh(&self, session: &AuthSession) -> AuthResult<AuthSession> {
        let refreshed = {
            let mut accounts = self.accounts()?;
            let uid = accounts
                .refresh_tokens
                .remove(&session.refresh_token)
                .ok_or(AuthError::SessionExpired)?;
            let account = accounts
                .by_email
                .values()
                .find(|account| account.uid == uid)
                .cloned()
                .ok_or(AuthError::SessionExpired)?;
            Self::issue_session(&mut accounts, &account)
        };
        self.store.save_session(&refreshed)?;
        Ok(refreshed)
    }

    async fn send_password_reset(&self, email: &str) -> AuthResult<()> {
        validate_email(email)?;
        let email = email.trim().to_lowercase();
        let mut accounts = self.accounts()?;
        if !accounts.by_email.contains_key(&email) {
            return Err(AuthError::UserNotFound);
        }
        accounts.password_resets.push(email);
        Ok(())
    }

    async fn delete_account(&self, session: &AuthSession) -> AuthResult<()> {
        {
            let mut accounts = self.accounts()?;
            let uid = session.user.id.as_str();
            if !accounts.by_email.values().any(|account| account.uid == uid) {
                return Err(AuthError::SessionExpired);
            }
            accounts.by_email.retain(|_, account| account.uid != uid);
            accounts.refresh_tokens.retain(|_, owner| owner != uid);
        }
        self.store.clear_session()
    }

    async fn sign_out(&self) -> AuthResult<()> {
        self.store.clear_session()
    }

    async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        let Some(stored) = self.store.load_session()? else {
            return Ok(None);
        };
        if !stored.is_expired() {
            return Ok(Some(stored));
        }
        match self.refresh(&stored).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(error) if error.is_network() => Ok(Some(stored)),
            Err(_) => {
                self.store.clear_session()?;
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn sign_up_then_sign_in() {
        let auth = InMemoryAuthProvider::new();
        let created = auth.sign_up("Alice@Example.com", "hunter22").await.unwrap();
        assert_eq!(created.user.email.as_deref(), Some("alice@example.com"));

        let signed_in = auth.sign_in("alice@example.com", "hunter22").await.unwrap();
        assert_eq!(signed_in.user.id, created.user.id);

        assert!(matches!(
            auth.sign_in("alice@example.com", "wrong-pass").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.sign_up("alice@example.com", "hunter22").await,
            Err(AuthError::EmailAlreadyInUse)
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn refresh_rotates_tokens() {
        let auth = InMemoryAuthProvider::new();
        let session = auth.sign_up("bob@example.com", "hunter22").await.unwrap();

        let refreshed = auth.refresh(&session).await.unwrap();
        assert_ne!(refreshed.refresh_token, session.refresh_token);
        assert!(matches!(
            auth.refresh(&session).await,
            Err(AuthError::SessionExpired)
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sign_out_and_delete_clear_store() {
        let store = MemorySessionStore::default();
        let auth = InMemoryAuthProvider::with_store(store.clone());
        let session = auth.sign_up("carol@example.com", "hunter22").await.unwrap();
        assert!(auth.restore_session().await.unwrap().is_some());

        auth.sign_out().await.unwrap();
        assert!(store.load_session().unwrap().is_none());

        auth.delete_account(&session).await.unwrap();
        assert!(matches!(
            auth.sign_in("carol@example.com", "hunter22").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn offline_provider_reports_network_error() {
        let auth = InMemoryAuthProvider::new();
        auth.set_offline(true);
        let error = auth.sign_in("dave@example.com", "hunter22").await.unwrap_err();
        assert!(error.is_network());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn password_reset_requires_known_account() {
        let auth = InMemoryAuthProvider::new();
        auth.sign_up("erin@example.com", "hunter22").await.unwrap();

        auth.send_password_reset("erin@example.com").await.unwrap();
        assert!(matches!(
            auth.send_password_reset("nobody@example.com").await,
            Err(AuthError::UserNotFound)
        ));
        assert_eq!(auth.password_resets(), vec!["erin@example.com".to_string()]);
    }
}
