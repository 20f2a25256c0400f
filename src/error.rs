use uuid::Uuid;

use crate::domain::Action;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Parsing errors
    #[error("{0}")]
    ParsingError(String),
    // Invariant violations, these indicate a bug in the caller
    #[error("Subscription {0} must be identified by exactly one of a user or an email")]
    InconsistentSubscriber(Uuid),
    #[error("Submission {0} has a publish date in the future")]
    PublishDateInFuture(Uuid),
    #[error("Action {0} is not supported here")]
    UnsupportedAction(Action),
    // Lookup errors
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("No template found, tried: {0:?}")]
    TemplateNotFound(Vec<String>),
    #[error("Template error: {0}")]
    TemplateError(#[from] minijinja::Error),
    // Email client errors
    #[error("Email was rejected by the delivery service: {0}")]
    EmailRejected(reqwest::Error),
    #[error("Email delivery service is unavailable: {0}")]
    EmailUnavailable(reqwest::Error),
    // Storage errors
    #[error("Storage error: {0}")]
    StorageError(#[from] std::io::Error),
    // Database errors
    #[error(transparent)]
    DatabaseError(#[from] sqlx::Error),
}

impl Error {
    /// Whether this error only concerns a single recipient, so the rest of a
    /// submission can still be delivered
    pub fn is_recipient_error(&self) -> bool {
        matches!(self, Self::EmailRejected(_))
    }
}
