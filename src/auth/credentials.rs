use actix_web::http::header::{self, HeaderMap};

use anyhow::Context;

use secrecy::Secret;

const BASIC_SCHEME: &str = "Basic";

/// Username and password sent with HTTP Basic authentication
#[derive(Debug)]
pub struct Credentials {
    /// Email address of the user
    pub username: String,
    pub password: Secret<String>,
}

impl Credentials {
    /// Read the Basic credentials of the `Authorization` header
    pub fn from_headers(headers: &HeaderMap) -> anyhow::Result<Self> {
        let value = headers
            .get(header::AUTHORIZATION)
            .context("Missing authorization header")?
            .to_str()
            .context("Authorization header is not valid text")?;

        match value.split_once(' ') {
            Some((scheme, encoded)) if scheme.eq_ignore_ascii_case(BASIC_SCHEME) => {
                Self::decode(encoded.trim())
            }
            _ => anyhow::bail!("Authorization scheme is not {}", BASIC_SCHEME),
        }
    }

    /// Decode base64 `<username>:<password>`
    fn decode(encoded: &str) -> anyhow::Result<Self> {
        use base64::Engine;

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .context("Credentials are not valid base64")?;
        let decoded = String::from_utf8(decoded).context("Credentials are not valid UTF-8")?;

        let (username, password) = decoded
            .split_once(':')
            .context("Missing password in authorization")?;

        Ok(Self {
            username: username.to_string(),
            password: Secret::new(password.to_string()),
        })
    }
}
