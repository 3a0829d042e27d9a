use std::future::Future;
use std::pin::Pin;

pub mod cognito;
pub mod error;
pub mod types;

pub use cognito::CognitoIdentityClient;
pub use error::{AuthError, AuthErrorKind, AuthResult};
pub use types::{
    DEFAULT_REGION, IdentityConfig, SessionTokens, SignInOutcome, UserAttribute, UserProfile,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Request/response seam to the external identity service.
///
/// Implementations hold no per-user state: every call carries what it needs.
pub trait IdentityClient: Send + Sync {
    fn login<'a>(
        &'a self,
        username: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, AuthResult<SignInOutcome>>;

    fn register<'a>(
        &'a self,
        username: &'a str,
        password: &'a str,
        attributes: &'a [UserAttribute],
    ) -> BoxFuture<'a, AuthResult<()>>;

    fn confirm_registration<'a>(
        &'a self,
        username: &'a str,
        code: &'a str,
    ) -> BoxFuture<'a, AuthResult<()>>;

    fn resend_confirmation_code<'a>(&'a self, username: &'a str)
    -> BoxFuture<'a, AuthResult<()>>;

    /// Trades a refresh token from an earlier sign-in for fresh tokens.
    ///
    /// The returned tokens carry `refresh_token` forward when the service does not
    /// rotate it.
    fn refresh_session<'a>(&'a self, refresh_token: &'a str)
    -> BoxFuture<'a, AuthResult<SessionTokens>>;

    /// Looks up the account the access token in `tokens` belongs to.
    fn current_user<'a>(
        &'a self,
        tokens: &'a SessionTokens,
    ) -> BoxFuture<'a, AuthResult<UserProfile>>;

    /// Best-effort revocation of a signed-in session.
    fn sign_out<'a>(&'a self, tokens: Option<&'a SessionTokens>)
    -> BoxFuture<'a, AuthResult<()>>;
}
