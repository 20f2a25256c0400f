use std::path::Path;

use chrono::{DateTime, Utc};

use serde::Serialize;

use url::Url;

use uuid::Uuid;

use crate::domain::Slug;

/// Sort order step between consecutive articles
pub const SORTORDER_STEP: i64 = 10;

/// New Message request
#[derive(Debug)]
pub struct NewMessage {
    pub newsletter_id: Uuid,
    pub title: String,
    pub slug: Slug,
}

/// Stored Message record, the editorial content of a submission
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Message {
    pub id: Uuid,
    pub newsletter_id: Uuid,
    pub title: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// New Article request. Without a sort order the article is appended after
/// the existing ones.
#[derive(Debug)]
pub struct NewArticle {
    pub sortorder: Option<i64>,
    pub title: String,
    pub text: String,
    pub url: Option<Url>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Article {
    pub id: Uuid,
    pub message_id: Uuid,
    pub sortorder: i64,
    pub title: String,
    pub text: String,
    pub url: Option<String>,
    pub image: Option<String>,
}

/// Next free sort order given the current maximum of a message
pub fn next_sortorder(current_max: Option<i64>) -> i64 {
    match current_max {
        Some(max) if max > 0 => max + SORTORDER_STEP,
        _ => SORTORDER_STEP,
    }
}

/// New Attachment request, `file` is relative to the media root
#[derive(Debug)]
pub struct NewAttachment {
    pub message_id: Uuid,
    pub file: String,
    pub content_type: mime::Mime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Attachment {
    pub id: Uuid,
    pub message_id: Uuid,
    pub file: String,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

impl Attachment {
    pub fn file_name(&self) -> &str {
        Path::new(&self.file)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.file)
    }
}
