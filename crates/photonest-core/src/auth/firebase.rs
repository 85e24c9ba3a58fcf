//! Firebase Authentication over the Identity Toolkit REST API.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use super::{
    validate_credentials, validate_email, validate_new_password, AuthError, AuthProvider,
    AuthResult, AuthSession, AuthUser, SessionPersistence,
};

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const SECURE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Base URLs of the two Firebase auth services
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirebaseAuthEndpoints {
    pub identity_toolkit: String,
    pub secure_token: String,
}

impl Default for FirebaseAuthEndpoints {
    fn default() -> Self {
        Self {
            identity_toolkit: IDENTITY_TOOLKIT_URL.to_string(),
            secure_token: SECURE_TOKEN_URL.to_string(),
        }
    }
}

impl FirebaseAuthEndpoints {
    /// Serve both services from one base URL
    pub fn single(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self {
            identity_toolkit: base.clone(),
            secure_token: base,
        }
    }
}

#[derive(Clone)]
pub struct FirebaseAuthClient<S: SessionPersistence> {
    api_key: String,
    endpoints: FirebaseAuthEndpoints,
    client: Client,
    store: S,
}

impl<S: SessionPersistence> FirebaseAuthClient<S> {
    pub fn new(api_key: impl Into<String>, store: S) -> AuthResult<Self> {
        Self::with_endpoints(api_key, FirebaseAuthEndpoints::default(), store)
    }

    pub fn with_endpoints(
        api_key: impl Into<String>,
        endpoints: FirebaseAuthEndpoints,
        store: S,
    ) -> AuthResult<Self> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Firebase web API key must not be empty",
            ));
        }
        for url in [&endpoints.identity_toolkit, &endpoints.secure_token] {
            if !crate::util::is_http_url(url) {
                return Err(AuthError::InvalidConfiguration(
                    "Firebase auth endpoints must include http:// or https://",
                ));
            }
        }

        Ok(Self {
            api_key,
            endpoints,
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            store,
        })
    }

    async fn post_identity<T: DeserializeOwned>(
        &self,
        action: &str,
        payload: &serde_json::Value,
    ) -> AuthResult<T> {
        let url = format!("{}/accounts:{action}", self.endpoints.identity_toolkit);
        tracing::debug!("Firebase auth request: accounts:{}", action);
        let response = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(payload)
            .send()
            .await?;
        read_response(response).await
    }

    async fn password_grant(&self, action: &str, email: &str, password: &str) -> AuthResult<AuthSession> {
        let payload = json!({
            "email": email.trim(),
            "password": password,
            "returnSecureToken": true,
        });
        let response: PasswordGrantResponse = self.post_identity(action, &payload).await?;
        let session = response.into_session()?;
        self.store.save_session(&session)?;
        Ok(session)
    }
}

impl<S: SessionPersistence> AuthProvider for FirebaseAuthClient<S> {
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        validate_credentials(email, password)?;
        validate_new_password(password)?;
        self.password_grant("signUp", email, password).await
    }

    async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        validate_credentials(email, password)?;
        self.password_grant("signInWithPassword", email, password).await
    }

    async fn refresh(&self, session: &AuthSession) -> AuthResult<AuthSession> {
        if session.refresh_token.trim().is_empty() {
            return Err(AuthError::SessionExpired);
        }

        let response = self
            .client
            .post(format!("{}/token", self.endpoints.secure_token))
            .query(&[("key", self.api_key.as_str())])
            .json(&json!({
                "grant_type": "refresh_token",
                "refresh_token": session.refresh_token,
            }))
            .send()
            .await?;
        let refreshed: RefreshResponse = read_response(response).await?;
        let refreshed = AuthSession {
            id_token: refreshed.id_token,
            refresh_token: refreshed.refresh_token,
            expires_at: expires_at(&refreshed.expires_in)?,
            user: AuthUser {
                id: refreshed.user_id,
                email: session.user.email.clone(),
            },
        };
        self.store.save_session(&refreshed)?;
        Ok(refreshed)
    }

    async fn send_password_reset(&self, email: &str) -> AuthResult<()> {
        validate_email(email)?;
        let payload = json!({
            "requestType": "PASSWORD_RESET",
            "email": email.trim(),
        });
        let _: serde_json::Value = self.post_identity("sendOobCode", &payload).await?;
        Ok(())
    }

    async fn delete_account(&self, session: &AuthSession) -> AuthResult<()> {
        let payload = json!({ "idToken": session.id_token });
        let _: serde_json::Value = self.post_identity("delete", &payload).await?;
        self.store.clear_session()?;
        Ok(())
    }

    async fn sign_out(&self) -> AuthResult<()> {
        // id tokens are stateless; forgetting them is all there is to do
        self.store.clear_session()
    }

    async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        let Some(stored_session) = self.store.load_session()? else {
            return Ok(None);
        };

        if !stored_session.is_expired() {
            return Ok(Some(stored_session));
        }

        match self.refresh(&stored_session).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(error) if error.is_network() => {
                // keep the stale session so cached content stays readable offline
                tracing::warn!("Could not refresh persisted session while offline: {}", error);
                Ok(Some(stored_session))
            }
            Err(error) => {
                tracing::warn!("Failed to refresh persisted session: {}", error);
                self.store.clear_session()?;
                Ok(None)
            }
        }
    }
}

async fn read_response<T: DeserializeOwned>(response: reqwest::Response) -> AuthResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(parse_api_error(status, &body));
    }
    Ok(response.json::<T>().await?)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordGrantResponse {
    id_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<String>,
    local_id: String,
    email: Option<String>,
}

impl PasswordGrantResponse {
    fn into_session(self) -> AuthResult<AuthSession> {
        match (self.id_token, self.refresh_token, self.expires_in) {
            (Some(id_token), Some(refresh_token), Some(expires_in)) => Ok(AuthSession {
                id_token,
                refresh_token,
                expires_at: expires_at(&expires_in)?,
                user: AuthUser {
                    id: self.local_id,
                    email: self.email,
                },
            }),
            _ => Err(AuthError::Api(
                "Auth response did not include enough session fields".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    user_id: String,
}

fn expires_at(expires_in: &str) -> AuthResult<i64> {
    let seconds: i64 = expires_in
        .trim()
        .parse()
        .map_err(|_| AuthError::Api(format!("Invalid token lifetime '{expires_in}'")))?;
    Ok(chrono::Utc::now().timestamp().saturating_add(seconds))
}

#[derive(Debug, Deserialize)]
struct FirebaseErrorResponse {
    error: FirebaseErrorBody,
}

#[derive(Debug, Deserialize)]
struct FirebaseErrorBody {
    message: String,
}

fn parse_api_error(status: StatusCode, body: &str) -> AuthError {
    let Ok(payload) = serde_json::from_str::<FirebaseErrorResponse>(body) else {
        let trimmed = body.trim();
        return if trimmed.is_empty() {
            AuthError::Api(format!("HTTP {}", status.as_u16()))
        } else {
            AuthError::Api(format!("{} ({})", trimmed, status.as_u16()))
        };
    };

    // messages look like "WEAK_PASSWORD : Password should be at least 6 characters"
    let (code, detail) = payload
        .error
        .message
        .split_once(':')
        .map_or((payload.error.message.as_str(), ""), |(code, detail)| {
            (code, detail)
        });
    match code.trim() {
        "EMAIL_EXISTS" => AuthError::EmailAlreadyInUse,
        "EMAIL_NOT_FOUND" => AuthError::UserNotFound,
        "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => AuthError::InvalidCredentials,
        "WEAK_PASSWORD" => AuthError::WeakPassword(detail.trim().to_string()),
        "INVALID_EMAIL" => AuthError::InvalidInput("Enter a valid email address".to_string()),
        "TOO_MANY_ATTEMPTS_TRY_LATER" => AuthError::TooManyRequests,
        "USER_DISABLED" => AuthError::Api("This account has been disabled.".to_string()),
        "TOKEN_EXPIRED"
        | "INVALID_ID_TOKEN"
        | "INVALID_REFRESH_TOKEN"
        | "CREDENTIAL_TOO_OLD_LOGIN_AGAIN"
        | "USER_NOT_FOUND" => AuthError::SessionExpired,
        other => AuthError::Api(format!("{} ({})", other, status.as_u16())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemorySessionStore;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, store: MemorySessionStore) -> FirebaseAuthClient<MemorySessionStore> {
        FirebaseAuthClient::with_endpoints("web-key", FirebaseAuthEndpoints::single(&server.uri()), store)
            .unwrap()
    }

    fn grant_body() -> serde_json::Value {
        json!({
            "idToken": "id-token",
            "refreshToken": "refresh-token",
            "expiresIn": "3600",
            "localId": "uid-1",
            "email": "alice@example.com"
        })
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sign_in_persists_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/accounts:signInWithPassword"))
            .and(query_param("key", "web-key"))
            .and(body_partial_json(json!({
                "email": "alice@example.com",
                "returnSecureToken": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(grant_body()))
            .expect(1)
            .mount(&server)
            .await;

        let store = MemorySessionStore::default();
        let session = client(&server, store.clone())
            .sign_in(" alice@example.com ", "hunter22")
            .await
            .unwrap();

        assert_eq!(session.user.id, "uid-1");
        assert_eq!(session.id_token, "id-token");
        assert!(!session.is_expired());
        assert_eq!(store.load_session().unwrap(), Some(session));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sign_up_maps_email_exists() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/accounts:signUp"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": 400, "message": "EMAIL_EXISTS", "errors": []}
            })))
            .mount(&server)
            .await;

        let error = client(&server, MemorySessionStore::default())
            .sign_up("alice@example.com", "hunter22")
            .await
            .unwrap_err();
        assert!(matches!(error, AuthError::EmailAlreadyInUse));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn sign_up_rejects_short_password_before_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(grant_body()))
            .expect(0)
            .mount(&server)
            .await;

        let error = client(&server, MemorySessionStore::default())
            .sign_up("alice@example.com", "123")
            .await
            .unwrap_err();
        assert!(matches!(error, AuthError::WeakPassword(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn restore_refreshes_expired_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_partial_json(json!({
                "grant_type": "refresh_token",
                "refresh_token": "old-refresh"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id_token": "new-id",
                "refresh_token": "new-refresh",
                "expires_in": "3600",
                "user_id": "uid-1"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let store = MemorySessionStore::default();
        store
            .save_session(&AuthSession {
                id_token: "old-id".to_string(),
                refresh_token: "old-refresh".to_string(),
                expires_at: 0,
                user: AuthUser {
                    id: "uid-1".to_string(),
                    email: Some("alice@example.com".to_string()),
                },
            })
            .unwrap();

        let restored = client(&server, store.clone())
            .restore_session()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(restored.id_token, "new-id");
        assert_eq!(restored.user.email.as_deref(), Some("alice@example.com"));
        assert_eq!(store.load_session().unwrap(), Some(restored));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn restore_clears_revoked_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": 400, "message": "INVALID_REFRESH_TOKEN"}
            })))
            .mount(&server)
            .await;

        let store = MemorySessionStore::default();
        store
            .save_session(&AuthSession {
                id_token: "old-id".to_string(),
                refresh_token: "old-refresh".to_string(),
                expires_at: 0,
                user: AuthUser {
                    id: "uid-1".to_string(),
                    email: None,
                },
            })
            .unwrap();

        let restored = client(&server, store.clone()).restore_session().await.unwrap();
        assert!(restored.is_none());
        assert!(store.load_session().unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn password_reset_sends_oob_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/accounts:sendOobCode"))
            .and(body_partial_json(json!({
                "requestType": "PASSWORD_RESET",
                "email": "alice@example.com"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"email": "alice@example.com"})))
            .expect(1)
            .mount(&server)
            .await;

        client(&server, MemorySessionStore::default())
            .send_password_reset("alice@example.com")
            .await
            .unwrap();
    }

    #[test]
    fn parses_error_codes_with_details() {
        let error = parse_api_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"message":"WEAK_PASSWORD : Password should be at least 6 characters"}}"#,
        );
        match error {
            AuthError::WeakPassword(detail) => {
                assert_eq!(detail, "Password should be at least 6 characters");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert!(matches!(
            parse_api_error(StatusCode::BAD_REQUEST, r#"{"error":{"message":"INVALID_LOGIN_CREDENTIALS"}}"#),
            AuthError::InvalidCredentials
        ));
        assert!(matches!(
            parse_api_error(StatusCode::BAD_GATEWAY, ""),
            AuthError::Api(message) if message == "HTTP 502"
        ));
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let result = FirebaseAuthClient::new("  ", MemorySessionStore::default());
        assert!(matches!(result, Err(AuthError::InvalidConfiguration(_))));
    }
}
