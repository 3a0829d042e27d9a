use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt, ensure};

use super::error::{
    AuthError, AuthErrorKind, AuthResult, BuildHttpClientSnafu, DecodeResponseSnafu,
    EncodeRequestSnafu, MissingClientIdSnafu, RefreshRejectedSnafu, TransportSnafu,
};
use super::types::{IdentityConfig, SessionTokens, SignInOutcome, UserAttribute, UserProfile};
use super::{BoxFuture, IdentityClient};

pub const AMZ_JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const PASSWORD_AUTH_FLOW: &str = "USER_PASSWORD_AUTH";
const REFRESH_TOKEN_AUTH_FLOW: &str = "REFRESH_TOKEN_AUTH";

/// Identity client for a Cognito user pool app client without a secret.
///
/// Only unauthenticated user-pool operations are used, so requests need no SigV4
/// signing; the app client id is the only credential.
pub struct CognitoIdentityClient {
    http: reqwest::Client,
    endpoint: String,
    client_id: String,
}

impl CognitoIdentityClient {
    pub fn new(config: IdentityConfig) -> AuthResult<Self> {
        ensure!(
            !config.client_id.is_empty(),
            MissingClientIdSnafu {
                stage: "cognito-client-new",
            }
        );

        let http = reqwest::Client::builder()
            .build()
            .context(BuildHttpClientSnafu {
                stage: "cognito-client-new",
            })?;

        Ok(Self {
            http,
            endpoint: config.endpoint_url(),
            client_id: config.client_id,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<B, R>(&self, operation: &'static str, body: &B) -> AuthResult<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        // Built by hand: `RequestBuilder::json` would pin the content type to plain JSON.
        let payload = serde_json::to_vec(body).context(EncodeRequestSnafu { stage: operation })?;

        tracing::debug!(operation, endpoint = %self.endpoint, "calling identity service");

        let response = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, AMZ_JSON_CONTENT_TYPE)
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{operation}"))
            .body(payload)
            .send()
            .await
            .context(TransportSnafu { stage: operation })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context(TransportSnafu { stage: operation })?;

        if !status.is_success() {
            let error = service_error(operation, status.as_u16(), &text);
            tracing::warn!(
                operation,
                status = status.as_u16(),
                kind = ?error.kind(),
                "identity service rejected request"
            );
            return Err(error);
        }

        let text = if text.trim().is_empty() { "{}" } else { &text };
        serde_json::from_str(text).context(DecodeResponseSnafu { stage: operation })
    }
}

impl IdentityClient for CognitoIdentityClient {
    fn login<'a>(
        &'a self,
        username: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, AuthResult<SignInOutcome>> {
        Box::pin(async move {
            let request = InitiateAuthRequest {
                auth_flow: PASSWORD_AUTH_FLOW,
                client_id: &self.client_id,
                auth_parameters: PasswordAuthParameters { username, password },
            };
            let response: InitiateAuthResponse = self.call("InitiateAuth", &request).await?;
            Ok(response.into_outcome())
        })
    }

    fn register<'a>(
        &'a self,
        username: &'a str,
        password: &'a str,
        attributes: &'a [UserAttribute],
    ) -> BoxFuture<'a, AuthResult<()>> {
        Box::pin(async move {
            let request = SignUpRequest {
                client_id: &self.client_id,
                username,
                password,
                user_attributes: attributes
                    .iter()
                    .map(|attribute| AttributeType {
                        name: &attribute.name,
                        value: &attribute.value,
                    })
                    .collect(),
            };
            let _: IgnoredAny = self.call("SignUp", &request).await?;
            Ok(())
        })
    }

    fn confirm_registration<'a>(
        &'a self,
        username: &'a str,
        code: &'a str,
    ) -> BoxFuture<'a, AuthResult<()>> {
        Box::pin(async move {
            let request = ConfirmSignUpRequest {
                client_id: &self.client_id,
                username,
                confirmation_code: code,
            };
            let _: IgnoredAny = self.call("ConfirmSignUp", &request).await?;
            Ok(())
        })
    }

    fn resend_confirmation_code<'a>(
        &'a self,
        username: &'a str,
    ) -> BoxFuture<'a, AuthResult<()>> {
        Box::pin(async move {
            let request = ResendConfirmationCodeRequest {
                client_id: &self.client_id,
                username,
            };
            let _: IgnoredAny = self.call("ResendConfirmationCode", &request).await?;
            Ok(())
        })
    }

    fn refresh_session<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, AuthResult<SessionTokens>> {
        Box::pin(async move {
            let request = InitiateAuthRequest {
                auth_flow: REFRESH_TOKEN_AUTH_FLOW,
                client_id: &self.client_id,
                auth_parameters: RefreshAuthParameters { refresh_token },
            };
            let response: InitiateAuthResponse = self.call("InitiateAuth", &request).await?;
            let result = response.authentication_result.context(RefreshRejectedSnafu {
                stage: "InitiateAuth",
            })?;

            let mut tokens = result.into_tokens();
            if tokens.refresh_token.is_none() {
                tokens.refresh_token = Some(refresh_token.to_string());
            }
            Ok(tokens)
        })
    }

    fn current_user<'a>(
        &'a self,
        tokens: &'a SessionTokens,
    ) -> BoxFuture<'a, AuthResult<UserProfile>> {
        Box::pin(async move {
            let request = GetUserRequest {
                access_token: &tokens.access_token,
            };
            let response: GetUserResponse = self.call("GetUser", &request).await?;
            Ok(response.into_profile())
        })
    }

    fn sign_out<'a>(
        &'a self,
        tokens: Option<&'a SessionTokens>,
    ) -> BoxFuture<'a, AuthResult<()>> {
        Box::pin(async move {
            let Some(tokens) = tokens else {
                tracing::debug!("no session tokens held; nothing to revoke");
                return Ok(());
            };

            let request = GlobalSignOutRequest {
                access_token: &tokens.access_token,
            };
            let _: IgnoredAny = self.call("GlobalSignOut", &request).await?;
            Ok(())
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthRequest<'a, P> {
    auth_flow: &'static str,
    client_id: &'a str,
    auth_parameters: P,
}

#[derive(Serialize)]
struct PasswordAuthParameters<'a> {
    #[serde(rename = "USERNAME")]
    username: &'a str,
    #[serde(rename = "PASSWORD")]
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshAuthParameters<'a> {
    #[serde(rename = "REFRESH_TOKEN")]
    refresh_token: &'a str,
}

impl std::fmt::Debug for RefreshAuthParameters<'_> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RefreshAuthParameters")
            .finish_non_exhaustive()
    }
}

// Hand-written so a request dumped into a log never carries the password.
impl std::fmt::Debug for PasswordAuthParameters<'_> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("PasswordAuthParameters")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    #[serde(default)]
    authentication_result: Option<AuthenticationResult>,
    #[serde(default)]
    challenge_name: Option<String>,
}

impl InitiateAuthResponse {
    fn into_outcome(self) -> SignInOutcome {
        if let Some(result) = self.authentication_result {
            return SignInOutcome::signed_in(Some(result.into_tokens()));
        }

        match self.challenge_name {
            Some(challenge) => SignInOutcome::challenge(challenge),
            None => SignInOutcome {
                is_signed_in: false,
                next_step: None,
                tokens: None,
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    access_token: String,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl AuthenticationResult {
    fn into_tokens(self) -> SessionTokens {
        SessionTokens {
            access_token: self.access_token,
            id_token: self.id_token,
            refresh_token: self.refresh_token,
            expires_in_seconds: self.expires_in,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct SignUpRequest<'a> {
    client_id: &'a str,
    username: &'a str,
    password: &'a str,
    user_attributes: Vec<AttributeType<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AttributeType<'a> {
    name: &'a str,
    value: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ConfirmSignUpRequest<'a> {
    client_id: &'a str,
    username: &'a str,
    confirmation_code: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct ResendConfirmationCodeRequest<'a> {
    client_id: &'a str,
    username: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GlobalSignOutRequest<'a> {
    access_token: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct GetUserRequest<'a> {
    access_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GetUserResponse {
    username: String,
    #[serde(default)]
    user_attributes: Vec<UserAttributeResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UserAttributeResponse {
    name: String,
    #[serde(default)]
    value: Option<String>,
}

impl GetUserResponse {
    fn into_profile(self) -> UserProfile {
        let email = self
            .user_attributes
            .into_iter()
            .find(|attribute| attribute.name == "email")
            .and_then(|attribute| attribute.value)
            .filter(|email| !email.trim().is_empty());
        UserProfile {
            username: self.username,
            email,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    #[serde(rename = "__type", default)]
    error_type: Option<String>,
    #[serde(default, alias = "Message")]
    message: Option<String>,
}

fn service_error(stage: &'static str, status: u16, body: &str) -> AuthError {
    match serde_json::from_str::<ServiceErrorBody>(body) {
        Ok(parsed) if parsed.error_type.is_some() || parsed.message.is_some() => {
            let kind = parsed
                .error_type
                .as_deref()
                .map_or(AuthErrorKind::Unknown, AuthErrorKind::from_service_type);
            AuthError::Service {
                stage,
                kind,
                message: parsed.message.unwrap_or_default(),
            }
        }
        _ => AuthError::UnexpectedStatus {
            stage,
            status,
            body: body.to_string(),
        },
    }
}
