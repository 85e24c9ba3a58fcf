//! Sign-in / sign-up screen with one-time codes and password reset

use super::{alert_for, StateHolder};
use crate::auth::{AuthProvider, AuthSession, MIN_PASSWORD_LEN};
use crate::error::Error;
use crate::models::{validate_username, User};
use crate::remote::DocumentStore;
use crate::repository::{Repositories, SignUpRequest};
use crate::resource::Resource;
use crate::storage::MediaStorage;
use crate::util::normalize_email;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthMode {
    #[default]
    SignIn,
    SignUp,
}

/// Per-field validation messages shown under the inputs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    pub email: Option<String>,
    pub password: Option<String>,
    pub username: Option<String>,
    pub otp_code: Option<String>,
}

impl FieldErrors {
    pub const fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.password.is_none()
            && self.username.is_none()
            && self.otp_code.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthUiState {
    pub mode: AuthMode,
    pub email: String,
    pub password: String,
    pub username: String,
    pub full_name: String,
    pub otp_code: String,
    /// `None` until a sign-in, sign-up or restore is attempted
    pub session: Option<Resource<AuthSession>>,
    pub user: Option<User>,
    pub otp_sent: bool,
    pub otp_verified: bool,
    pub field_errors: FieldErrors,
    /// Confirmation text, e.g. after a reset email went out
    pub info: Option<String>,
    pub alert: Option<String>,
}

impl AuthUiState {
    pub fn is_busy(&self) -> bool {
        self.session.as_ref().is_some_and(Resource::is_loading)
    }

    pub const fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    EmailChanged(String),
    PasswordChanged(String),
    UsernameChanged(String),
    FullNameChanged(String),
    OtpCodeChanged(String),
    ToggleMode,
    Submit,
    SendOtp,
    VerifyOtp,
    ResetPassword,
    Restore,
    SignOut,
    DismissAlert,
}

pub struct AuthViewModel<A: AuthProvider, D: DocumentStore, M: MediaStorage> {
    repos: Repositories<A, D, M>,
    state: StateHolder<AuthUiState>,
}

impl<A, D, M> AuthViewModel<A, D, M>
where
    A: AuthProvider,
    D: DocumentStore,
    M: MediaStorage,
{
    pub fn new(repos: Repositories<A, D, M>) -> Self {
        Self {
            repos,
            state: StateHolder::default(),
        }
    }

    pub fn state(&self) -> AuthUiState {
        self.state.get()
    }

    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<AuthUiState> {
        self.state.subscribe()
    }

    pub async fn on_event(&self, event: AuthEvent) {
        match event {
            AuthEvent::EmailChanged(email) => self.state.update(|state| {
                state.email = email;
                state.field_errors.email = None;
                state.otp_sent = false;
                state.otp_verified = false;
            }),
            AuthEvent::PasswordChanged(password) => self.state.update(|state| {
                state.password = password;
                state.field_errors.password = None;
            }),
            AuthEvent::UsernameChanged(username) => self.state.update(|state| {
                state.username = username;
                state.field_errors.username = None;
            }),
            AuthEvent::FullNameChanged(full_name) => {
                self.state.update(|state| state.full_name = full_name);
            }
            AuthEvent::OtpCodeChanged(code) => self.state.update(|state| {
                state.otp_code = code;
                state.field_errors.otp_code = None;
            }),
            AuthEvent::ToggleMode => self.state.update(|state| {
                state.mode = match state.mode {
                    AuthMode::SignIn => AuthMode::SignUp,
                    AuthMode::SignUp => AuthMode::SignIn,
                };
                state.field_errors = FieldErrors::default();
                state.alert = None;
            }),
            AuthEvent::Submit => self.submit().await,
            AuthEvent::SendOtp => self.send_otp().await,
            AuthEvent::VerifyOtp => self.verify_otp().await,
            AuthEvent::ResetPassword => self.reset_password().await,
            AuthEvent::Restore => self.restore().await,
            AuthEvent::SignOut => self.sign_out().await,
            AuthEvent::DismissAlert => self.state.update(|state| {
                state.alert = None;
                state.info = None;
            }),
        }
    }

    async fn submit(&self) {
        let current = self.state.get();
        if current.is_busy() {
            return;
        }
        let errors = validate_form(&current, self.repos.auth.otp_enabled());
        if !errors.is_empty() {
            self.state.update(|state| state.field_errors = errors);
            return;
        }

        self.state.update(|state| {
            state.field_errors = FieldErrors::default();
            state.session = Some(Resource::Loading);
        });
        let result = match current.mode {
            AuthMode::SignIn => {
                self.repos
                    .auth
                    .sign_in(&current.email, &current.password)
                    .await
            }
            AuthMode::SignUp => {
                self.repos
                    .auth
                    .sign_up(SignUpRequest {
                        email: current.email.clone(),
                        password: current.password.clone(),
                        username: current.username.clone(),
                        full_name: current.full_name.clone(),
                    })
                    .await
            }
        };
        self.finish_sign_in(result);
    }

    async fn restore(&self) {
        self.state.update(|state| state.session = Some(Resource::Loading));
        match self.repos.auth.restore_session().await {
            Ok(Some(user)) => self.finish_sign_in(Ok(user)),
            Ok(None) => self.state.update(|state| {
                state.session = None;
                state.user = None;
            }),
            Err(error) => self.state.update(|state| {
                state.session = Some(Resource::from_error(&error));
                state.user = None;
            }),
        }
    }

    fn finish_sign_in(&self, result: Result<User, Error>) {
        let session = self.repos.auth.session();
        self.state.update(|state| match (result, session) {
            (Ok(user), Some(session)) => {
                tracing::debug!("Signed in as @{}", user.username);
                state.password.clear();
                state.session = Some(Resource::Success(session));
                state.user = Some(user);
            }
            (Ok(_), None) => {
                state.session = Some(Resource::from_error(&Error::Unauthenticated));
                state.user = None;
            }
            (Err(error), _) => {
                state.session = Some(Resource::from_error(&error));
                state.user = None;
                state.alert = Some(alert_for("sign in", &error));
            }
        });
    }

    async fn sign_out(&self) {
        match self.repos.auth.sign_out().await {
            Ok(()) => self.state.set(AuthUiState::default()),
            Err(error) => self
                .state
                .update(|state| state.alert = Some(alert_for("sign out", &error))),
        }
    }

    async fn send_otp(&self) {
        let email = self.state.get().email;
        if let Some(message) = email_problem(&email) {
            self.state.update(|state| state.field_errors.email = Some(message));
            return;
        }
        let result = self.repos.auth.send_otp(&email).await;
        self.state.update(|state| match result {
            Ok(message) => {
                state.otp_sent = true;
                state.otp_verified = false;
                state.info = Some(message);
            }
            Err(error) => state.alert = Some(alert_for("send code", &error)),
        });
    }

    async fn verify_otp(&self) {
        let current = self.state.get();
        let errors = FieldErrors {
            email: email_problem(&current.email),
            otp_code: otp_problem(&current.otp_code),
            ..FieldErrors::default()
        };
        if !errors.is_empty() {
            self.state.update(|state| state.field_errors = errors);
            return;
        }

        let result = self
            .repos
            .auth
            .verify_otp(&current.email, &current.otp_code)
            .await;
        self.state.update(|state| match result {
            Ok(message) => {
                state.otp_verified = true;
                state.otp_code.clear();
                state.info = Some(message);
            }
            Err(error) => state.alert = Some(alert_for("verify code", &error)),
        });
    }

    async fn reset_password(&self) {
        let email = self.state.get().email;
        if let Some(message) = email_problem(&email) {
            self.state.update(|state| state.field_errors.email = Some(message));
            return;
        }
        let result = self.repos.auth.send_password_reset(&email).await;
        self.state.update(|state| match result {
            Ok(()) => {
                state.info = Some(format!("Password reset email sent to {}", email.trim()));
            }
            Err(error) => state.alert = Some(alert_for("password reset", &error)),
        });
    }
}

fn validate_form(state: &AuthUiState, otp_required: bool) -> FieldErrors {
    let mut errors = FieldErrors {
        email: email_problem(&state.email),
        ..FieldErrors::default()
    };
    if state.password.trim().is_empty() {
        errors.password = Some("Password is required".to_string());
    }
    if state.mode == AuthMode::SignUp {
        if errors.password.is_none() && state.password.chars().count() < MIN_PASSWORD_LEN {
            errors.password = Some(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            ));
        }
        errors.username = validate_username(&state.username)
            .err()
            .map(|error| error.user_message());
        if otp_required && !state.otp_verified {
            errors.otp_code = Some("Verify your email with the code we sent first".to_string());
        }
    }
    errors
}

fn email_problem(email: &str) -> Option<String> {
    if email.trim().is_empty() {
        Some("Email is required".to_string())
    } else if normalize_email(email).is_none() {
        Some("Enter a valid email address".to_string())
    } else {
        None
    }
}

fn otp_problem(code: &str) -> Option<String> {
    let code = code.trim();
    let valid = (4..=8).contains(&code.len()) && code.chars().all(|ch| ch.is_ascii_digit());
    if valid {
        None
    } else {
        Some("Enter the numeric code from your email".to_string())
    }
}
