use secrecy::{ExposeSecret, SecretString};

/// Basic-auth credentials for a switch management interface.
///
/// Sent with every mutating request; the password never leaves the
/// `SecretString` except when the request is built.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    /// Apply HTTP basic auth to a request builder.
    pub(crate) fn apply(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.basic_auth(&self.username, Some(self.password.expose_secret()))
    }
}

/// The kind of switch behind a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchKind {
    /// Stateless REST management API, one authenticated request per primitive.
    Http,
    /// In-memory switch used for development and tests.
    Mock,
}

impl SwitchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Mock => "mock",
        }
    }
}
