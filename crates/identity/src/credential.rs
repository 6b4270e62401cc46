/// Session credential presented by an interactive caller.
///
/// The variant records where the credential came from; backends that care
/// (cookie sessions) forward it accordingly.
#[derive(Clone, PartialEq, Eq)]
pub enum SessionCredential {
    /// `Authorization: Bearer <token>`.
    Bearer(String),
    /// Legacy `Token: <token>` header.
    Legacy(String),
    /// Session cookie.
    Cookie { name: String, value: String },
    /// `?token=` query fallback.
    Query(String),
}

impl SessionCredential {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::Bearer(token.into())
    }

    /// Raw token value regardless of transport.
    pub fn token(&self) -> &str {
        match self {
            Self::Bearer(t) | Self::Legacy(t) | Self::Query(t) => t,
            Self::Cookie { value, .. } => value,
        }
    }

    pub fn source(&self) -> &'static str {
        match self {
            Self::Bearer(_) => "bearer",
            Self::Legacy(_) => "legacy_header",
            Self::Cookie { .. } => "cookie",
            Self::Query(_) => "query",
        }
    }
}

// Never print the secret.
impl core::fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionCredential")
            .field("source", &self.source())
            .field("token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_token() {
        let c = SessionCredential::bearer("super-secret");
        let printed = format!("{c:?}");
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("bearer"));
    }

    #[test]
    fn cookie_token_is_the_value() {
        let c = SessionCredential::Cookie {
            name: "warden_session".into(),
            value: "abc".into(),
        };
        assert_eq!(c.token(), "abc");
    }
}
