use std::sync::Arc;

use skychat_identity::{
    AuthErrorKind, AuthResult, IdentityClient, SessionTokens, UserAttribute, UserProfile,
};
use tokio::sync::watch;

use super::identity::Identity;
use super::state::{
    AuthInput, AuthScreen, AuthState, AuthenticatedSession, FormError, FormField, LoginForm,
    ScreenSwitchRejection, SignupForm, ValidationError, VerifyForm, validate_signup,
};

pub const UNCONFIRMED_ACCOUNT_MESSAGE: &str =
    "Your email is not verified. Please check your inbox for the verification code.";
pub const LOGIN_FAILED_MESSAGE: &str = "Login failed. Please check your credentials.";
pub const SIGN_IN_STEP_UNSUPPORTED_MESSAGE: &str =
    "Sign-in requires an additional step that this client does not support.";
pub const SIGNUP_SUCCESS_MESSAGE: &str =
    "Account created! Check your email for the verification code.";
pub const SIGNUP_FAILED_MESSAGE: &str = "Signup failed. Please try again.";
pub const VERIFY_SUCCESS_MESSAGE: &str = "Email verified successfully! You can now sign in.";
pub const VERIFY_FAILED_MESSAGE: &str = "Verification failed. Please check your code.";
pub const RESEND_SUCCESS_MESSAGE: &str = "Verification code resent! Check your email.";
pub const RESEND_FAILED_MESSAGE: &str = "Failed to resend code. Please try again.";

/// Drives the login, signup and verification screens against an identity service.
///
/// At most one request is in flight: a submit marks the form `pending` and inputs
/// that arrive while pending are ignored. Every change is published on a watch
/// channel (see [`AuthFlow::subscribe`]).
pub struct AuthFlow {
    client: Arc<dyn IdentityClient>,
    state: AuthState,
    updates: watch::Sender<AuthState>,
}

impl AuthFlow {
    pub fn new(client: Arc<dyn IdentityClient>) -> Self {
        let state = AuthState::default();
        let (updates, _) = watch::channel(state.clone());
        Self {
            client,
            state,
            updates,
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.updates.subscribe()
    }

    pub fn identity(&self) -> Option<Arc<Identity>> {
        self.state.identity().cloned()
    }

    /// Tokens of the signed-in session, if any.
    pub fn session_tokens(&self) -> Option<&SessionTokens> {
        match &self.state {
            AuthState::Authenticated(session) => session.tokens.as_ref(),
            _ => None,
        }
    }

    /// Signs back in with a refresh token saved by an earlier run.
    ///
    /// The login form stays `pending` while the service is asked. On failure the
    /// form is handed back untouched and without an error: a stale session simply
    /// means the user signs in again.
    pub async fn restore_session(&mut self, refresh_token: &str) -> &AuthState {
        let AuthState::Login(form) = &mut self.state else {
            return self.ignore("restore-session");
        };
        if form.pending {
            return self.ignore("restore-session");
        }

        let previous = form.clone();
        form.pending = true;
        self.publish();

        let restored = self.refresh_and_describe(refresh_token).await;
        self.state = match restored {
            Ok((tokens, profile)) => {
                let identity = Identity::with_username(
                    profile.email.as_deref(),
                    Some(profile.username.as_str()),
                );
                tracing::info!(
                    login_id = identity.login_id(),
                    display_name = identity.display_name(),
                    "restored saved session"
                );
                AuthState::Authenticated(AuthenticatedSession {
                    identity: Arc::new(identity),
                    tokens: Some(tokens),
                })
            }
            Err(error) => {
                tracing::info!(error = %error, "saved session could not be restored");
                AuthState::Login(previous)
            }
        };
        self.publish()
    }

    async fn refresh_and_describe(
        &self,
        refresh_token: &str,
    ) -> AuthResult<(SessionTokens, UserProfile)> {
        let tokens = self.client.refresh_session(refresh_token).await?;
        let profile = self.client.current_user(&tokens).await?;
        Ok((tokens, profile))
    }

    pub async fn dispatch(&mut self, input: AuthInput) -> &AuthState {
        match input {
            AuthInput::SubmitLogin { email, password } => {
                self.submit_login(&email, &password).await
            }
            AuthInput::SubmitSignup {
                email,
                password,
                confirm_password,
            } => {
                self.submit_signup(&email, &password, &confirm_password)
                    .await
            }
            AuthInput::SubmitVerification { code } => self.submit_verification(&code).await,
            AuthInput::ResendCode => self.resend_code().await,
            AuthInput::SwitchScreen(target) => self.switch_screen(target),
            AuthInput::Edit { field, value } => self.edit(field, value),
            AuthInput::SignOut => self.sign_out().await,
        }
    }

    pub async fn submit_login(&mut self, email: &str, password: &str) -> &AuthState {
        let AuthState::Login(form) = &mut self.state else {
            return self.ignore("submit-login");
        };
        if form.pending {
            return self.ignore("submit-login");
        }

        form.email = email.to_string();
        form.password = password.to_string();
        form.error = None;
        form.success = None;
        if email.trim().is_empty() {
            form.error = Some(ValidationError::EmailRequired.into());
            return self.publish();
        }
        form.pending = true;
        self.publish();

        let result = self.client.login(email, password).await;
        self.state = match result {
            Ok(outcome) if outcome.is_signed_in => {
                tracing::info!(login_id = email, "signed in");
                AuthState::Authenticated(AuthenticatedSession {
                    identity: Arc::new(Identity::from_login_id(email)),
                    tokens: outcome.tokens,
                })
            }
            Ok(outcome) => {
                tracing::warn!(
                    login_id = email,
                    next_step = ?outcome.next_step,
                    "sign-in needs a step this client cannot complete"
                );
                AuthState::Login(LoginForm {
                    email: email.to_string(),
                    password: password.to_string(),
                    error: Some(FormError::auth(
                        AuthErrorKind::Unknown,
                        SIGN_IN_STEP_UNSUPPORTED_MESSAGE,
                    )),
                    ..LoginForm::default()
                })
            }
            Err(error) if error.is_unconfirmed_account() => {
                tracing::info!(
                    login_id = email,
                    "account not confirmed; moving to verification"
                );
                AuthState::Verify(VerifyForm {
                    email_to_verify: email.to_string(),
                    error: Some(FormError::auth(error.kind(), UNCONFIRMED_ACCOUNT_MESSAGE)),
                    ..VerifyForm::default()
                })
            }
            Err(error) => {
                tracing::warn!(login_id = email, error = %error, "login failed");
                AuthState::Login(LoginForm {
                    email: email.to_string(),
                    password: password.to_string(),
                    error: Some(FormError::from_auth(&error, LOGIN_FAILED_MESSAGE)),
                    ..LoginForm::default()
                })
            }
        };
        self.publish()
    }

    pub async fn submit_signup(
        &mut self,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> &AuthState {
        let AuthState::Signup(form) = &mut self.state else {
            return self.ignore("submit-signup");
        };
        if form.pending {
            return self.ignore("submit-signup");
        }

        form.email = email.to_string();
        form.password = password.to_string();
        form.confirm_password = confirm_password.to_string();
        form.error = None;
        if let Err(error) = validate_signup(email, password, confirm_password) {
            tracing::debug!(error = %error, "signup rejected before submission");
            form.error = Some(error.into());
            return self.publish();
        }
        form.pending = true;
        self.publish();

        let attributes = [UserAttribute::email(email)];
        let result = self.client.register(email, password, &attributes).await;
        self.state = match result {
            Ok(()) => {
                tracing::info!(login_id = email, "account registered");
                AuthState::Verify(VerifyForm {
                    email_to_verify: email.to_string(),
                    success: Some(SIGNUP_SUCCESS_MESSAGE.to_string()),
                    ..VerifyForm::default()
                })
            }
            Err(error) => {
                tracing::warn!(login_id = email, error = %error, "signup failed");
                AuthState::Signup(SignupForm {
                    email: email.to_string(),
                    password: password.to_string(),
                    confirm_password: confirm_password.to_string(),
                    error: Some(FormError::from_auth(&error, SIGNUP_FAILED_MESSAGE)),
                    pending: false,
                })
            }
        };
        self.publish()
    }

    pub async fn submit_verification(&mut self, code: &str) -> &AuthState {
        let AuthState::Verify(form) = &mut self.state else {
            return self.ignore("submit-verification");
        };
        if form.pending {
            return self.ignore("submit-verification");
        }

        form.code = code.to_string();
        form.error = None;
        form.success = None;
        if code.trim().is_empty() {
            form.error = Some(ValidationError::CodeRequired.into());
            return self.publish();
        }
        let email = form.email_to_verify.clone();
        form.pending = true;
        self.publish();

        let result = self.client.confirm_registration(&email, code).await;
        self.state = match result {
            Ok(()) => {
                tracing::info!(login_id = %email, "email verified");
                AuthState::Login(LoginForm {
                    email,
                    success: Some(VERIFY_SUCCESS_MESSAGE.to_string()),
                    ..LoginForm::default()
                })
            }
            Err(error) => {
                tracing::warn!(login_id = %email, error = %error, "verification failed");
                AuthState::Verify(VerifyForm {
                    email_to_verify: email,
                    code: code.to_string(),
                    error: Some(FormError::from_auth(&error, VERIFY_FAILED_MESSAGE)),
                    ..VerifyForm::default()
                })
            }
        };
        self.publish()
    }

    /// Asks for a new verification code. The screen does not change either way.
    pub async fn resend_code(&mut self) -> &AuthState {
        let AuthState::Verify(form) = &mut self.state else {
            return self.ignore("resend-code");
        };
        if form.pending {
            return self.ignore("resend-code");
        }

        form.error = None;
        form.success = None;
        form.pending = true;
        let email = form.email_to_verify.clone();
        self.publish();

        let result = self.client.resend_confirmation_code(&email).await;
        if let AuthState::Verify(form) = &mut self.state {
            form.pending = false;
            match result {
                Ok(()) => form.success = Some(RESEND_SUCCESS_MESSAGE.to_string()),
                Err(error) => {
                    tracing::warn!(login_id = %email, error = %error, "resend code failed");
                    form.error = Some(FormError::auth(error.kind(), RESEND_FAILED_MESSAGE));
                }
            }
        }
        self.publish()
    }

    pub fn switch_screen(&mut self, target: AuthScreen) -> &AuthState {
        if self.state.is_pending() {
            return self.ignore("switch-screen");
        }

        match self.state.switched_to(target) {
            Ok(next) => self.state = next,
            Err(ScreenSwitchRejection::Invalid(error)) => self.state.set_error(error.into()),
            Err(rejection) => {
                tracing::debug!(?rejection, "screen switch rejected");
                return &self.state;
            }
        }
        self.publish()
    }

    /// Updates a draft field. Messages on the form are left alone.
    pub fn edit(&mut self, field: FormField, value: impl Into<String>) -> &AuthState {
        if self.state.is_pending() || !self.state.apply_edit(field, value.into()) {
            return self.ignore("edit");
        }
        self.publish()
    }

    /// Revokes the session with the identity service, then returns to an empty
    /// login form. A failed revocation is logged and the local session is dropped
    /// regardless.
    pub async fn sign_out(&mut self) -> &AuthState {
        let AuthState::Authenticated(session) = &self.state else {
            return self.ignore("sign-out");
        };
        let tokens = session.tokens.clone();
        let login_id = session.identity.login_id().to_string();

        if let Err(error) = self.client.sign_out(tokens.as_ref()).await {
            tracing::warn!(login_id = %login_id, error = %error, "identity sign-out failed");
        }
        tracing::info!(login_id = %login_id, "signed out");
        self.state = AuthState::default();
        self.publish()
    }

    /// Clears a `pending` flag left behind when a submit future was dropped before
    /// the identity service answered.
    pub fn clear_pending(&mut self) -> &AuthState {
        match &mut self.state {
            AuthState::Login(form) if form.pending => form.pending = false,
            AuthState::Signup(form) if form.pending => form.pending = false,
            AuthState::Verify(form) if form.pending => form.pending = false,
            _ => return &self.state,
        }
        tracing::debug!("cleared abandoned pending request");
        self.publish()
    }

    fn publish(&self) -> &AuthState {
        self.updates.send_replace(self.state.clone());
        &self.state
    }

    fn ignore(&self, input: &'static str) -> &AuthState {
        tracing::debug!(
            input,
            screen = ?self.state.screen(),
            pending = self.state.is_pending(),
            "auth input ignored in current state"
        );
        &self.state
    }
}
