use photonest_core::auth::AuthProvider;
use photonest_core::models::User;
use photonest_core::remote::DocumentStore;
use photonest_core::repository::Repositories;
use photonest_core::storage::MediaStorage;
use photonest_core::viewmodel::{AuthEvent, AuthUiState, AuthViewModel, FieldErrors};

use crate::cli::AuthCommands;
use crate::commands::common::{format_user_line, resolved};
use crate::error::CliError;

pub async fn run_auth<A, D, M>(
    repos: &Repositories<A, D, M>,
    command: AuthCommands,
) -> Result<(), CliError>
where
    A: AuthProvider,
    D: DocumentStore,
    M: MediaStorage,
{
    match command {
        AuthCommands::Signup {
            email,
            password,
            username,
            full_name,
            code,
        } => {
            let vm = AuthViewModel::new(repos.clone());
            vm.on_event(AuthEvent::ToggleMode).await;
            fill_credentials(&vm, email, password).await;
            vm.on_event(AuthEvent::UsernameChanged(username)).await;
            vm.on_event(AuthEvent::FullNameChanged(full_name)).await;
            if let Some(code) = code {
                vm.on_event(AuthEvent::OtpCodeChanged(code)).await;
                vm.on_event(AuthEvent::VerifyOtp).await;
                let state = vm.state();
                check_fields(&state.field_errors)?;
                if let Some(alert) = state.alert {
                    return Err(CliError::Screen(alert));
                }
            }
            let user = submit(&vm).await?;
            println!("Welcome to PhotoNest, @{}", user.username);
        }
        AuthCommands::Login { email, password } => {
            let vm = AuthViewModel::new(repos.clone());
            fill_credentials(&vm, email, password).await;
            let user = submit(&vm).await?;
            println!("Signed in as @{}", user.username);
        }
        AuthCommands::Logout => {
            repos.auth.sign_out().await?;
            println!("Signed out");
        }
        AuthCommands::Status => match repos.auth.restore_session().await? {
            Some(user) => {
                let expires = repos
                    .auth
                    .session()
                    .map(|session| session.expires_at)
                    .unwrap_or_default();
                println!("{}", format_user_line(&user));
                println!("Session expires_at={expires}");
            }
            None => println!("Not signed in."),
        },
        AuthCommands::ResetPassword { email } => {
            let vm = AuthViewModel::new(repos.clone());
            vm.on_event(AuthEvent::EmailChanged(email)).await;
            vm.on_event(AuthEvent::ResetPassword).await;
            let state = vm.state();
            check_fields(&state.field_errors)?;
            if let Some(alert) = state.alert {
                return Err(CliError::Screen(alert));
            }
            println!("{}", state.info.unwrap_or_default());
        }
        AuthCommands::OtpSend { email } => {
            let message = repos.auth.send_otp(&email).await?;
            println!("{message}");
        }
        AuthCommands::OtpVerify { email, code } => {
            let message = repos.auth.verify_otp(&email, &code).await?;
            println!("{message}");
        }
    }
    Ok(())
}

async fn fill_credentials<A, D, M>(vm: &AuthViewModel<A, D, M>, email: String, password: String)
where
    A: AuthProvider,
    D: DocumentStore,
    M: MediaStorage,
{
    vm.on_event(AuthEvent::EmailChanged(email)).await;
    vm.on_event(AuthEvent::PasswordChanged(password)).await;
}

async fn submit<A, D, M>(vm: &AuthViewModel<A, D, M>) -> Result<User, CliError>
where
    A: AuthProvider,
    D: DocumentStore,
    M: MediaStorage,
{
    vm.on_event(AuthEvent::Submit).await;
    let AuthUiState {
        session,
        user,
        field_errors,
        ..
    } = vm.state();
    check_fields(&field_errors)?;
    let Some(session) = session else {
        return Err(CliError::Screen("Sign-in did not start".to_string()));
    };
    resolved(session)?;
    user.ok_or(CliError::NotSignedIn)
}

fn check_fields(errors: &FieldErrors) -> Result<(), CliError> {
    let messages = [
        &errors.email,
        &errors.password,
        &errors.username,
        &errors.otp_code,
    ]
    .into_iter()
    .flatten()
    .cloned()
    .collect::<Vec<_>>();
    if messages.is_empty() {
        Ok(())
    } else {
        Err(CliError::Screen(messages.join("; ")))
    }
}
