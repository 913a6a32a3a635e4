use base64::Engine;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};

use crate::errors::{ArenaError, ArenaResult};

/// Headers attached to every backend request.
///
/// Built once per session and passed through untouched; the client never
/// looks inside.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    headers: HeaderMap,
}

impl AuthContext {
    /// No credentials. The public endpoints accept this.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// HTTP Basic credentials
    pub fn basic(username: &str, password: &str) -> ArenaResult<Self> {
        let token = base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
        let mut value = HeaderValue::from_str(&format!("Basic {}", token))
            .map_err(|_| ArenaError::InvalidHeader(AUTHORIZATION.to_string()))?;
        value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value);
        Ok(Self { headers })
    }

    pub fn with_header(mut self, name: &str, value: &str) -> ArenaResult<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| ArenaError::InvalidHeader(name.to_string()))?;
        let value =
            HeaderValue::from_str(value).map_err(|_| ArenaError::InvalidHeader(name.to_string()))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn is_anonymous(&self) -> bool {
        self.headers.is_empty()
    }
}
