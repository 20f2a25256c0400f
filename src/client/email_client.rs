use std::convert::Infallible;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

use reqwest::{Client, StatusCode};

use serde::Serialize;

use secrecy::Secret;

use url::Url;

use crate::error::{Error, Result};

const POSTMARK_TOKEN_HEADER: &str = "X-Postmark-Server-Token";

#[derive(Debug, Clone)]
pub struct EmailClient {
    client: Client,

    api_send_email_url: Url,
    api_auth_token: EmailAuthorizationToken,
}

impl EmailClient {
    pub fn new(
        api_timeout: Duration,
        api_base_url: Url,
        api_auth_token: EmailAuthorizationToken,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(api_timeout)
            .build()
            .context("Failed to build http client")?;

        let api_send_email_url = api_base_url
            .join("email")
            .context("Failed to create send email endpoint URL")?;

        Ok(Self {
            client,
            api_send_email_url,
            api_auth_token,
        })
    }

    /// Send an email through the API.
    /// Responses refusing the email itself are reported as
    /// [`Error::EmailRejected`], anything that would affect every other email
    /// as well as [`Error::EmailUnavailable`].
    #[tracing::instrument(name = "Send an email via API", skip(self, email), fields(to = %email.to, subject = %email.subject))]
    pub async fn send(&self, email: &Email) -> Result<()> {
        use secrecy::ExposeSecret;

        let body = email.as_request();

        let response = self
            .client
            .post(self.api_send_email_url.clone())
            .header(POSTMARK_TOKEN_HEADER, self.api_auth_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(Error::EmailUnavailable)?;

        match response.error_for_status() {
            Ok(_) => Ok(()),
            Err(error) => match error.status() {
                Some(StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                    Err(Error::EmailUnavailable(error))
                }
                Some(status) if status.is_client_error() => Err(Error::EmailRejected(error)),
                _ => Err(Error::EmailUnavailable(error)),
            },
        }
    }
}

#[derive(Debug)]
pub struct EmailAuthorizationToken(Secret<String>);

impl FromStr for EmailAuthorizationToken {
    type Err = Infallible;

    fn from_str(value: &str) -> std::result::Result<Self, Infallible> {
        Ok(Self(Secret::new(value.to_string())))
    }
}

impl From<Secret<String>> for EmailAuthorizationToken {
    fn from(value: Secret<String>) -> Self {
        Self(value)
    }
}

impl Clone for EmailAuthorizationToken {
    fn clone(&self) -> Self {
        use secrecy::ExposeSecret;

        Self(Secret::new(self.0.expose_secret().clone()))
    }
}

impl secrecy::ExposeSecret<String> for EmailAuthorizationToken {
    fn expose_secret(&self) -> &String {
        self.0.expose_secret()
    }
}

/// A file sent along with an email
#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// A multipart email, the HTML alternative being optional
#[derive(Debug, Clone)]
pub struct Email {
    /// Mailboxes, either `Name <address>` or a bare address
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: Option<String>,
    pub headers: Vec<(String, String)>,
    pub attachments: Vec<EmailAttachment>,
}

impl Email {
    fn as_request(&self) -> SendEmailRequest<'_> {
        use base64::Engine;

        SendEmailRequest {
            from: &self.from,
            to: &self.to,
            subject: &self.subject,
            text_body: &self.text_body,
            html_body: self.html_body.as_deref(),
            headers: self
                .headers
                .iter()
                .map(|(name, value)| EmailHeader { name, value })
                .collect(),
            attachments: self
                .attachments
                .iter()
                .map(|attachment| AttachmentRequest {
                    name: &attachment.name,
                    content: base64::engine::general_purpose::STANDARD.encode(&attachment.content),
                    content_type: &attachment.content_type,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text_body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    html_body: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    headers: Vec<EmailHeader<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<AttachmentRequest<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct EmailHeader<'a> {
    name: &'a str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AttachmentRequest<'a> {
    name: &'a str,
    content: String,
    content_type: &'a str,
}
