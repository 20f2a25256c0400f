use std::fmt;

use chrono::{DateTime, Utc};

use serde::Serialize;

use uuid::Uuid;

/// Lifecycle state of a submission, derived from its flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Prepared,
    Sending,
    Sent,
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self {
            Self::Pending => "pending",
            Self::Prepared => "prepared",
            Self::Sending => "sending",
            Self::Sent => "sent",
        };
        f.write_str(status)
    }
}

/// Options for a new submission of a message
#[derive(Debug)]
pub struct NewSubmission {
    pub publish_date: DateTime<Utc>,
    /// Whether the submission shows up in the public archive
    pub publish: bool,
}

impl Default for NewSubmission {
    fn default() -> Self {
        Self {
            publish_date: Utc::now(),
            publish: true,
        }
    }
}

/// A message queued for delivery to the subscribers of its newsletter
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Submission {
    pub id: Uuid,
    /// Always the newsletter of the message
    pub newsletter_id: Uuid,
    pub message_id: Uuid,
    pub publish_date: DateTime<Utc>,
    pub publish: bool,
    pub prepared: bool,
    pub sent: bool,
    pub sending: bool,
    pub created_at: DateTime<Utc>,
}

impl Submission {
    pub fn status(&self) -> SubmissionStatus {
        if self.sending {
            SubmissionStatus::Sending
        } else if self.sent {
            SubmissionStatus::Sent
        } else if self.prepared {
            SubmissionStatus::Prepared
        } else {
            SubmissionStatus::Pending
        }
    }

    /// Whether the queue should pick this submission up at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.prepared && !self.sent && !self.sending && self.publish_date < now
    }
}
