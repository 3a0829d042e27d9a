pub mod flow;
pub mod identity;
pub mod state;

pub use flow::AuthFlow;
pub use identity::{FALLBACK_DISPLAY_NAME, Identity, display_name_for};
pub use state::{
    AuthInput, AuthScreen, AuthState, AuthenticatedSession, FormError, FormField, LoginForm,
    MIN_PASSWORD_LENGTH, ScreenSwitchRejection, SignupForm, ValidationError, VerifyForm,
    validate_signup,
};
