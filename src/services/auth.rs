use std::fmt;

use reqwest::header::{HeaderName, HeaderValue};
use serde::Deserialize;
use strum::{Display, EnumString};

use crate::services::encoder::OutgoingRequest;

const REDACTED: &str = "***";

/// How the FaceCheck.ID secret is attached to an outgoing request.
///
/// The upstream has accepted different schemes over time, so the active one is
/// chosen per deployment and never guessed at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuthScheme {
    /// Raw secret under an arbitrary header name (`Authentication-Token: <secret>`).
    HeaderNamed,
    /// Standard header with a prefix token (`Authorization: Bearer <secret>`).
    BearerPrefixed,
    /// Secret as a query-string parameter (`?token=<secret>`).
    QueryParam,
}

impl AuthScheme {
    /// Header (or query parameter) name used when none is configured.
    pub fn default_name(self) -> &'static str {
        match self {
            AuthScheme::HeaderNamed => "Authentication-Token",
            AuthScheme::BearerPrefixed => "Authorization",
            AuthScheme::QueryParam => "token",
        }
    }
}

/// Process-wide credential, validated once at startup and read-only afterwards.
#[derive(Clone)]
pub struct AuthCredential {
    scheme: AuthScheme,
    name: String,
    value_prefix: String,
    secret: String,
    /// The secret plus the URL-encoded spellings an upstream may echo back.
    echo_forms: Vec<String>,
    header: Option<(HeaderName, HeaderValue)>,
}

impl AuthCredential {
    pub fn new(
        scheme: AuthScheme,
        name: Option<&str>,
        value_prefix: &str,
        secret: &str,
    ) -> Result<Self, AuthError> {
        let secret = secret.trim();
        if secret.is_empty() {
            return Err(AuthError::EmptySecret);
        }

        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(scheme.default_name())
            .to_string();
        let value_prefix = value_prefix.trim().to_string();

        let header = match scheme {
            AuthScheme::QueryParam => None,
            AuthScheme::HeaderNamed | AuthScheme::BearerPrefixed => {
                let header_name = HeaderName::from_bytes(name.as_bytes())
                    .map_err(|_| AuthError::InvalidHeaderName(name.clone()))?;
                let raw = if scheme == AuthScheme::BearerPrefixed && !value_prefix.is_empty() {
                    format!("{} {}", value_prefix, secret)
                } else {
                    secret.to_string()
                };
                let mut value =
                    HeaderValue::from_str(&raw).map_err(|_| AuthError::InvalidSecret)?;
                value.set_sensitive(true);
                Some((header_name, value))
            }
        };

        Ok(Self {
            scheme,
            name,
            value_prefix,
            secret: secret.to_string(),
            echo_forms: echo_forms(secret),
            header,
        })
    }

    pub fn scheme(&self) -> AuthScheme {
        self.scheme
    }

    /// Header name, or query parameter name for [`AuthScheme::QueryParam`].
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_prefix(&self) -> &str {
        &self.value_prefix
    }

    /// Replace every occurrence of the secret in `text` so upstream echoes
    /// never reach an error payload or a log line.
    pub fn redact(&self, text: &str) -> String {
        self.echo_forms
            .iter()
            .fold(text.to_string(), |acc, form| acc.replace(form.as_str(), REDACTED))
    }
}

impl fmt::Debug for AuthCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthCredential")
            .field("scheme", &self.scheme)
            .field("name", &self.name)
            .field("value_prefix", &self.value_prefix)
            .field("secret", &REDACTED)
            .finish()
    }
}

/// Raw, percent-encoded and form-encoded spellings of `secret`, each also with
/// lowercase hex escapes. Longest first so no form is left half-replaced.
fn echo_forms(secret: &str) -> Vec<String> {
    let percent = urlencoding::encode(secret).into_owned();
    // application/x-www-form-urlencoded, as written by `Url::query_pairs_mut`.
    let form = percent
        .replace("%20", "+")
        .replace("%2A", "*")
        .replace('~', "%7E");

    let mut forms = vec![secret.to_string()];
    for encoded in [percent, form] {
        let lower = lowercase_escapes(&encoded);
        forms.push(encoded);
        forms.push(lower);
    }
    forms.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    forms.dedup();
    forms
}

fn lowercase_escapes(encoded: &str) -> String {
    let mut out = String::with_capacity(encoded.len());
    let mut hex_left = 0;
    for c in encoded.chars() {
        if hex_left > 0 {
            out.push(c.to_ascii_lowercase());
            hex_left -= 1;
        } else {
            if c == '%' {
                hex_left = 2;
            }
            out.push(c);
        }
    }
    out
}

/// Embed the credential into a not-yet-sent request according to its scheme.
pub fn apply(credential: &AuthCredential, mut request: OutgoingRequest) -> OutgoingRequest {
    match &credential.header {
        Some((name, value)) => {
            request.headers.insert(name.clone(), value.clone());
        }
        None => {
            request
                .url
                .query_pairs_mut()
                .append_pair(&credential.name, &credential.secret);
        }
    }
    request
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Auth secret must not be empty")]
    EmptySecret,

    #[error("Invalid auth header name: {0}")]
    InvalidHeaderName(String),

    #[error("Auth secret contains characters not allowed in a header value")]
    InvalidSecret,
}
