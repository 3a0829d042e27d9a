/// Display name used when neither a login id nor a username is known.
pub const FALLBACK_DISPLAY_NAME: &str = "User";

/// Authenticated user for one session.
///
/// Built once when the auth flow signs in and shared read-only (behind an `Arc`) with
/// the channel that stamps outbound messages with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    login_id: String,
    display_name: String,
}

impl Identity {
    /// Identity for an email login; the display name is the login id itself.
    pub fn from_login_id(login_id: impl Into<String>) -> Self {
        let login_id = login_id.into();
        let display_name = display_name_for(Some(&login_id), None);
        Self {
            login_id,
            display_name,
        }
    }

    /// Identity whose login id may be unknown, e.g. one restored from a username only.
    pub fn with_username(login_id: Option<&str>, username: Option<&str>) -> Self {
        Self {
            login_id: login_id.unwrap_or_default().trim().to_string(),
            display_name: display_name_for(login_id, username),
        }
    }

    pub fn login_id(&self) -> &str {
        &self.login_id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

/// Resolves the name shown for a user.
///
/// Precedence: the login id, then the username, then [`FALLBACK_DISPLAY_NAME`].
/// Blank candidates are skipped.
pub fn display_name_for(login_id: Option<&str>, username: Option<&str>) -> String {
    [login_id, username]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|candidate| !candidate.is_empty())
        .unwrap_or(FALLBACK_DISPLAY_NAME)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_follows_precedence() {
        assert_eq!(display_name_for(Some("a@b.com"), Some("alice")), "a@b.com");
        assert_eq!(display_name_for(None, Some("alice")), "alice");
        assert_eq!(display_name_for(Some("   "), Some("alice")), "alice");
        assert_eq!(display_name_for(None, None), FALLBACK_DISPLAY_NAME);
        assert_eq!(display_name_for(Some(""), Some(" ")), FALLBACK_DISPLAY_NAME);
    }

    #[test]
    fn login_identity_uses_email_as_display_name() {
        let identity = Identity::from_login_id("a@b.com");
        assert_eq!(identity.login_id(), "a@b.com");
        assert_eq!(identity.display_name(), "a@b.com");

        let restored = Identity::with_username(None, Some("alice"));
        assert_eq!(restored.login_id(), "");
        assert_eq!(restored.display_name(), "alice");
    }
}
