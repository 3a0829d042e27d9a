/// Cognito region used when a configuration leaves it blank.
pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConfig {
    pub region: String,
    pub client_id: String,
    /// Overrides the regional endpoint, e.g. for a local emulator.
    pub endpoint: Option<String>,
}

impl IdentityConfig {
    pub fn new(region: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            region: region.into().trim().to_string(),
            client_id: client_id.into().trim().to_string(),
            endpoint: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into().trim().to_string();
        self.endpoint = (!endpoint.is_empty()).then_some(endpoint);
        self
    }

    /// Resolved service URL: the override when set, else the regional endpoint.
    pub fn endpoint_url(&self) -> String {
        if let Some(endpoint) = &self.endpoint {
            return endpoint.clone();
        }

        let region = if self.region.is_empty() {
            DEFAULT_REGION
        } else {
            self.region.as_str()
        };
        format!("https://cognito-idp.{region}.amazonaws.com/")
    }
}

/// Tokens issued by a completed sign-in.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionTokens {
    pub access_token: String,
    pub id_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in_seconds: Option<u64>,
}

// Tokens are bearer credentials; keep them out of logs and panic messages.
impl std::fmt::Debug for SessionTokens {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SessionTokens")
            .field("access_token", &"<redacted>")
            .field("expires_in_seconds", &self.expires_in_seconds)
            .finish_non_exhaustive()
    }
}

/// Result of a login call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInOutcome {
    pub is_signed_in: bool,
    /// Challenge the service wants answered before the sign-in completes.
    pub next_step: Option<String>,
    pub tokens: Option<SessionTokens>,
}

impl SignInOutcome {
    pub fn signed_in(tokens: Option<SessionTokens>) -> Self {
        Self {
            is_signed_in: true,
            next_step: None,
            tokens,
        }
    }

    pub fn challenge(next_step: impl Into<String>) -> Self {
        Self {
            is_signed_in: false,
            next_step: Some(next_step.into()),
            tokens: None,
        }
    }
}

/// Account details of a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    /// Service-side username; for email sign-ups this is an opaque id.
    pub username: String,
    pub email: Option<String>,
}

/// One user attribute sent with a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAttribute {
    pub name: String,
    pub value: String,
}

impl UserAttribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn email(value: impl Into<String>) -> Self {
        Self::new("email", value)
    }
}
