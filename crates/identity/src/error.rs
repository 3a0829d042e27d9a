use snafu::Snafu;

/// Failure category reported by the identity service.
///
/// Callers branch on this instead of the human-readable message; the message text
/// belongs to the service and may change without notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthErrorKind {
    UserNotConfirmed,
    NotAuthorized,
    UserNotFound,
    UsernameExists,
    InvalidPassword,
    CodeMismatch,
    ExpiredCode,
    LimitExceeded,
    InvalidParameter,
    Unknown,
}

impl AuthErrorKind {
    /// Maps a Cognito `__type` discriminator to a kind.
    ///
    /// The discriminator may arrive fully qualified
    /// (`com.amazonaws...#UserNotConfirmedException`), so only the part after the
    /// last `#` is matched.
    pub fn from_service_type(raw: &str) -> Self {
        let name = raw.rsplit('#').next().unwrap_or(raw).trim();
        match name {
            "UserNotConfirmedException" => Self::UserNotConfirmed,
            "NotAuthorizedException" => Self::NotAuthorized,
            "UserNotFoundException" => Self::UserNotFound,
            "UsernameExistsException" | "AliasExistsException" => Self::UsernameExists,
            "InvalidPasswordException" => Self::InvalidPassword,
            "CodeMismatchException" => Self::CodeMismatch,
            "ExpiredCodeException" => Self::ExpiredCode,
            "LimitExceededException"
            | "TooManyRequestsException"
            | "TooManyFailedAttemptsException" => Self::LimitExceeded,
            "InvalidParameterException" => Self::InvalidParameter,
            _ => Self::Unknown,
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AuthError {
    #[snafu(display("{message}"))]
    Service {
        stage: &'static str,
        kind: AuthErrorKind,
        message: String,
    },
    #[snafu(display("identity client is missing a user pool client id"))]
    MissingClientId { stage: &'static str },
    #[snafu(display("failed to build identity http client on `{stage}`: {source}"))]
    BuildHttpClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("failed to encode identity request on `{stage}`: {source}"))]
    EncodeRequest {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("identity request failed on `{stage}`: {source}"))]
    Transport {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("identity service answered `{stage}` without tokens"))]
    RefreshRejected { stage: &'static str },
    #[snafu(display("identity service returned status {status} on `{stage}`: {body}"))]
    UnexpectedStatus {
        stage: &'static str,
        status: u16,
        body: String,
    },
    #[snafu(display("failed to decode identity response on `{stage}`: {source}"))]
    DecodeResponse {
        stage: &'static str,
        source: serde_json::Error,
    },
}

pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// Builds a service failure, mostly useful for test doubles of the client seam.
    pub fn service(kind: AuthErrorKind, message: impl Into<String>) -> Self {
        Self::Service {
            stage: "identity-service",
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> AuthErrorKind {
        match self {
            Self::Service { kind, .. } => *kind,
            Self::MissingClientId { .. }
            | Self::BuildHttpClient { .. }
            | Self::EncodeRequest { .. }
            | Self::Transport { .. }
            | Self::RefreshRejected { .. }
            | Self::UnexpectedStatus { .. }
            | Self::DecodeResponse { .. } => AuthErrorKind::Unknown,
        }
    }

    /// Message written by the identity service, if this failure came from it.
    ///
    /// Local failures (transport, decoding) return `None` so callers can show their
    /// own fallback text instead of leaking client internals to users.
    pub fn service_message(&self) -> Option<&str> {
        match self {
            Self::Service { message, .. } if !message.trim().is_empty() => Some(message),
            _ => None,
        }
    }

    /// Whether the account exists but has not finished email confirmation.
    ///
    /// The structured kind wins. Matching "not confirmed" in the message is a fallback
    /// for services that do not report a discriminator and is known to be brittle.
    pub fn is_unconfirmed_account(&self) -> bool {
        if self.kind() == AuthErrorKind::UserNotConfirmed {
            return true;
        }

        self.service_message()
            .is_some_and(|message| message.to_ascii_lowercase().contains("not confirmed"))
    }
}
