use actix_web::http::StatusCode;
use actix_web::ResponseError;

use thiserror::Error;

use crate::error::Error;

pub type RestResult<T> = Result<T, RestError>;

#[derive(Debug, Error)]
pub enum RestError {
    #[error("Parse Error: {0}")]
    ParseError(String),

    #[error("Failed to authenticate")]
    FailedToAuthenticate(#[source] anyhow::Error),

    #[error("Unauthorized Access: {0}")]
    Unauthorized(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal Server Error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for RestError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
                Self::Conflict("Record already exists".into())
            }
            _ => {
                tracing::error!(error.cause_chain = ?e, "Database error");
                Self::InternalError("Database error".into())
            }
        }
    }
}

impl From<Error> for RestError {
    fn from(e: Error) -> Self {
        match e {
            Error::ParsingError(msg) => Self::ParseError(msg),
            Error::UnsupportedAction(action) => Self::ParseError(format!("Unsupported action: {}", action)),
            Error::NotFound(what) => Self::NotFound(what.into()),
            Error::DatabaseError(e) => e.into(),
            Error::EmailRejected(_) | Error::EmailUnavailable(_) => {
                tracing::error!(error.cause_chain = ?e, "Failed to send email");
                Self::InternalError("Failed to send email".into())
            }
            e => {
                tracing::error!(error.cause_chain = ?e, "Request failed");
                Self::InternalError(e.to_string())
            }
        }
    }
}

impl ResponseError for RestError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::ParseError(_) => StatusCode::BAD_REQUEST,
            Self::FailedToAuthenticate(_) | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InternalError(_) | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
