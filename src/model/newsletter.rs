use chrono::{DateTime, Utc};

use serde::Serialize;

use uuid::Uuid;

use crate::domain::{mailbox, EmailAddress, Slug};

/// New Newsletter request
#[derive(Debug)]
pub struct NewNewsletter {
    pub title: String,
    pub slug: Slug,
    pub email: EmailAddress,
    pub sender: String,
    pub visible: bool,
    pub send_html: bool,
    /// Domains of the sites the newsletter is published on
    pub sites: Vec<String>,
}

/// Stored Newsletter record
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Newsletter {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    /// Sender email and name
    pub email: String,
    pub sender: String,
    pub visible: bool,
    /// Whether emails carry an HTML alternative
    pub send_html: bool,
    pub created_at: DateTime<Utc>,
}

impl Newsletter {
    /// The `From` mailbox of every email sent for this newsletter
    pub fn sender_address(&self) -> String {
        mailbox(Some(&self.sender), &self.email)
    }
}
