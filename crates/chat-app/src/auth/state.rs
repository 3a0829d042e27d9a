use std::fmt;
use std::sync::Arc;

use skychat_identity::{AuthError, AuthErrorKind, SessionTokens};

use super::identity::Identity;

/// Shortest password accepted by the signup form, counted in characters.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Screens a user can switch between before signing in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthScreen {
    Login,
    Signup,
    Verify,
}

/// Editable field of an auth form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormField {
    Email,
    Password,
    ConfirmPassword,
    Code,
}

/// Input rejected locally, before any request reaches the identity service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    PasswordMismatch,
    PasswordTooShort { min_length: usize },
    EmailRequired,
    CodeRequired,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::PasswordMismatch => write!(f, "Passwords do not match"),
            ValidationError::PasswordTooShort { min_length } => {
                write!(f, "Password must be at least {min_length} characters")
            }
            ValidationError::EmailRequired => write!(f, "Please enter your email address first"),
            ValidationError::CodeRequired => write!(f, "Please enter the verification code"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Checks signup input: email present, passwords equal, password long enough.
pub fn validate_signup(
    email: &str,
    password: &str,
    confirm_password: &str,
) -> Result<(), ValidationError> {
    if email.trim().is_empty() {
        return Err(ValidationError::EmailRequired);
    }
    if password != confirm_password {
        return Err(ValidationError::PasswordMismatch);
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooShort {
            min_length: MIN_PASSWORD_LENGTH,
        });
    }
    Ok(())
}

/// Error shown on a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    Validation(ValidationError),
    Auth { kind: AuthErrorKind, message: String },
}

impl FormError {
    /// Uses the service's own message when it sent one, else `fallback`.
    pub fn from_auth(error: &AuthError, fallback: &str) -> Self {
        Self::Auth {
            kind: error.kind(),
            message: error.service_message().unwrap_or(fallback).to_string(),
        }
    }

    pub fn auth(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Self::Auth {
            kind,
            message: message.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<ValidationError> for FormError {
    fn from(error: ValidationError) -> Self {
        Self::Validation(error)
    }
}

impl fmt::Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormError::Validation(error) => error.fmt(f),
            FormError::Auth { message, .. } => f.write_str(message),
        }
    }
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
    pub error: Option<FormError>,
    pub success: Option<String>,
    pub pending: bool,
}

#[derive(Clone, Default, PartialEq, Eq)]
pub struct SignupForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub error: Option<FormError>,
    pub pending: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyForm {
    pub email_to_verify: String,
    pub code: String,
    pub error: Option<FormError>,
    pub success: Option<String>,
    pub pending: bool,
}

// Form drafts hold passwords; keep them out of logs.
impl fmt::Debug for LoginForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginForm")
            .field("email", &self.email)
            .field("error", &self.error)
            .field("success", &self.success)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for SignupForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignupForm")
            .field("email", &self.email)
            .field("error", &self.error)
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSession {
    pub identity: Arc<Identity>,
    pub tokens: Option<SessionTokens>,
}

/// Where the user stands in the sign-in process.
///
/// Exactly one screen is live at a time; each variant owns only the fields its
/// screen needs, and `Authenticated` is the only variant carrying an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Login(LoginForm),
    Signup(SignupForm),
    Verify(VerifyForm),
    Authenticated(AuthenticatedSession),
}

impl Default for AuthState {
    fn default() -> Self {
        Self::Login(LoginForm::default())
    }
}

impl AuthState {
    /// Live form screen, or `None` once signed in.
    pub fn screen(&self) -> Option<AuthScreen> {
        match self {
            Self::Login(_) => Some(AuthScreen::Login),
            Self::Signup(_) => Some(AuthScreen::Signup),
            Self::Verify(_) => Some(AuthScreen::Verify),
            Self::Authenticated(_) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        match self {
            Self::Login(form) => form.pending,
            Self::Signup(form) => form.pending,
            Self::Verify(form) => form.pending,
            Self::Authenticated(_) => false,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    pub fn identity(&self) -> Option<&Arc<Identity>> {
        match self {
            Self::Authenticated(session) => Some(&session.identity),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&FormError> {
        match self {
            Self::Login(form) => form.error.as_ref(),
            Self::Signup(form) => form.error.as_ref(),
            Self::Verify(form) => form.error.as_ref(),
            Self::Authenticated(_) => None,
        }
    }

    pub fn success(&self) -> Option<&str> {
        match self {
            Self::Login(form) => form.success.as_deref(),
            Self::Verify(form) => form.success.as_deref(),
            Self::Signup(_) | Self::Authenticated(_) => None,
        }
    }

    pub(crate) fn set_error(&mut self, error: FormError) {
        match self {
            Self::Login(form) => {
                form.error = Some(error);
                form.success = None;
            }
            Self::Signup(form) => form.error = Some(error),
            Self::Verify(form) => {
                form.error = Some(error);
                form.success = None;
            }
            Self::Authenticated(_) => {}
        }
    }

    pub(crate) fn clear_messages(&mut self) {
        match self {
            Self::Login(form) => {
                form.error = None;
                form.success = None;
            }
            Self::Signup(form) => form.error = None,
            Self::Verify(form) => {
                form.error = None;
                form.success = None;
            }
            Self::Authenticated(_) => {}
        }
    }

    /// Email typed on the live form, if it has one.
    pub fn email(&self) -> Option<&str> {
        match self {
            Self::Login(form) => Some(&form.email),
            Self::Signup(form) => Some(&form.email),
            Self::Verify(form) => Some(&form.email_to_verify),
            Self::Authenticated(_) => None,
        }
    }

    /// State reached by switching to `target`.
    ///
    /// Messages never survive a switch and the typed email carries over. Switching
    /// to verification needs an email to verify.
    pub fn switched_to(&self, target: AuthScreen) -> Result<AuthState, ScreenSwitchRejection> {
        if self.screen() == Some(target) {
            let mut same = self.clone();
            same.clear_messages();
            return Ok(same);
        }

        let email = match self {
            Self::Authenticated(_) => return Err(ScreenSwitchRejection::SignedIn),
            _ => self.email().unwrap_or_default().to_string(),
        };

        match (self.screen(), target) {
            (Some(AuthScreen::Login), AuthScreen::Verify) => {
                if email.trim().is_empty() {
                    return Err(ScreenSwitchRejection::Invalid(
                        ValidationError::EmailRequired,
                    ));
                }
                Ok(Self::Verify(VerifyForm {
                    email_to_verify: email,
                    ..VerifyForm::default()
                }))
            }
            (Some(AuthScreen::Login | AuthScreen::Verify), AuthScreen::Signup) => {
                Ok(Self::Signup(SignupForm {
                    email,
                    ..SignupForm::default()
                }))
            }
            (Some(AuthScreen::Signup | AuthScreen::Verify), AuthScreen::Login) => {
                Ok(Self::Login(LoginForm {
                    email,
                    ..LoginForm::default()
                }))
            }
            (from, to) => Err(ScreenSwitchRejection::Unavailable { from, to }),
        }
    }

    /// Writes a draft field of the live form. Returns `false` when the form has no
    /// such field.
    pub(crate) fn apply_edit(&mut self, field: FormField, value: String) -> bool {
        match (self, field) {
            (Self::Login(form), FormField::Email) => form.email = value,
            (Self::Login(form), FormField::Password) => form.password = value,
            (Self::Signup(form), FormField::Email) => form.email = value,
            (Self::Signup(form), FormField::Password) => form.password = value,
            (Self::Signup(form), FormField::ConfirmPassword) => form.confirm_password = value,
            (Self::Verify(form), FormField::Code) => form.code = value,
            _ => return false,
        }
        true
    }
}

/// Reason a screen switch was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenSwitchRejection {
    SignedIn,
    Invalid(ValidationError),
    Unavailable {
        from: Option<AuthScreen>,
        to: AuthScreen,
    },
}

/// User intent fed into the auth flow.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthInput {
    SubmitLogin {
        email: String,
        password: String,
    },
    SubmitSignup {
        email: String,
        password: String,
        confirm_password: String,
    },
    SubmitVerification {
        code: String,
    },
    ResendCode,
    SwitchScreen(AuthScreen),
    Edit {
        field: FormField,
        value: String,
    },
    SignOut,
}

impl AuthInput {
    /// Short name used in logs; never includes field values.
    pub fn name(&self) -> &'static str {
        match self {
            AuthInput::SubmitLogin { .. } => "submit-login",
            AuthInput::SubmitSignup { .. } => "submit-signup",
            AuthInput::SubmitVerification { .. } => "submit-verification",
            AuthInput::ResendCode => "resend-code",
            AuthInput::SwitchScreen(_) => "switch-screen",
            AuthInput::Edit { .. } => "edit",
            AuthInput::SignOut => "sign-out",
        }
    }
}

impl fmt::Debug for AuthInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthInput::SwitchScreen(screen) => write!(f, "SwitchScreen({screen:?})"),
            AuthInput::Edit { field, .. } => write!(f, "Edit({field:?})"),
            other => f.write_str(other.name()),
        }
    }
}
