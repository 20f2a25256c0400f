use std::net::IpAddr;

use chrono::{DateTime, Utc};

use serde::Serialize;

use uuid::Uuid;

use crate::domain::{mailbox, Action, EmailAddress, PersonName};
use crate::error::{Error, Result};

/// Who a subscription belongs to. A subscription is tied to either a
/// registered user or a bare email address, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum Subscriber {
    User {
        id: Uuid,
        email: String,
        full_name: Option<String>,
    },
    Email {
        email: EmailAddress,
        name: Option<PersonName>,
    },
}

/// Subscriber identity of a subscription that is yet to be stored
#[derive(Debug, Clone)]
pub enum NewSubscriber {
    User(Uuid),
    Email {
        email: EmailAddress,
        name: Option<PersonName>,
    },
}

/// New Subscription request
#[derive(Debug)]
pub struct NewSubscription {
    pub newsletter_id: Uuid,
    pub subscriber: NewSubscriber,
    pub ip: Option<IpAddr>,
    /// Whether the subscription is active right away, without activation
    pub subscribed: bool,
}

/// The pair of state flags, as they were last stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct SubscriptionFlags {
    pub subscribed: bool,
    pub unsubscribed: bool,
}

/// Stored subscription row, joined with the owning user when there is one
#[derive(Debug, sqlx::FromRow)]
pub struct SubscriptionRecord {
    pub id: Uuid,
    pub newsletter_id: Uuid,
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub ip: Option<String>,
    pub activation_code: String,
    pub subscribed: bool,
    pub subscribe_date: Option<DateTime<Utc>>,
    pub unsubscribed: bool,
    pub unsubscribe_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub user_email: Option<String>,
    pub user_full_name: Option<String>,
}

/// A subscriber's opt-in state for one newsletter
#[derive(Debug, Clone)]
pub struct Subscription {
    pub id: Uuid,
    pub newsletter_id: Uuid,
    pub subscriber: Subscriber,
    pub ip: Option<String>,
    pub activation_code: String,
    pub subscribed: bool,
    pub subscribe_date: Option<DateTime<Utc>>,
    pub unsubscribed: bool,
    pub unsubscribe_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRecord> for Subscription {
    type Error = Error;

    fn try_from(record: SubscriptionRecord) -> Result<Self> {
        let subscriber = match (record.user_id, record.email) {
            (Some(id), None) => Subscriber::User {
                id,
                email: record
                    .user_email
                    .ok_or(Error::InconsistentSubscriber(record.id))?,
                full_name: record.user_full_name,
            },
            (None, Some(email)) => Subscriber::Email {
                email: email.parse()?,
                name: record
                    .name
                    .as_deref()
                    .map(str::parse::<PersonName>)
                    .transpose()?,
            },
            _ => return Err(Error::InconsistentSubscriber(record.id)),
        };

        Ok(Self {
            id: record.id,
            newsletter_id: record.newsletter_id,
            subscriber,
            ip: record.ip,
            activation_code: record.activation_code,
            subscribed: record.subscribed,
            subscribe_date: record.subscribe_date,
            unsubscribed: record.unsubscribed,
            unsubscribe_date: record.unsubscribe_date,
            created_at: record.created_at,
        })
    }
}

impl Subscription {
    pub fn email(&self) -> &str {
        match &self.subscriber {
            Subscriber::User { email, .. } => email,
            Subscriber::Email { email, .. } => email.as_ref(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        match &self.subscriber {
            Subscriber::User { full_name, .. } => full_name
                .as_deref()
                .map(str::trim)
                .filter(|name| !name.is_empty()),
            Subscriber::Email { name, .. } => name.as_ref().map(AsRef::as_ref),
        }
    }

    /// Mailbox to deliver to, `Name <email>` when a name is known
    pub fn recipient(&self) -> String {
        mailbox(self.name(), self.email())
    }

    pub fn flags(&self) -> SubscriptionFlags {
        SubscriptionFlags {
            subscribed: self.subscribed,
            unsubscribed: self.unsubscribed,
        }
    }

    /// Apply the requested action to the state flags. The change only takes
    /// its full effect (dates, opposite flag) once reconciled on save.
    pub fn update(&mut self, action: Action) -> Result<()> {
        match action {
            Action::Subscribe | Action::Update => self.subscribed = true,
            Action::Unsubscribe => self.unsubscribed = true,
            Action::Message => return Err(Error::UnsupportedAction(action)),
        }

        tracing::debug!("Updated subscription {} to {}", self.id, action);

        Ok(())
    }

    /// Normalize the state flags and dates against the previously stored
    /// flags, `None` when the subscription has never been stored.
    pub fn reconcile(&mut self, previous: Option<SubscriptionFlags>, now: DateTime<Utc>) {
        match previous {
            Some(old) => {
                if (self.subscribed && !old.subscribed) || (old.unsubscribed && !self.unsubscribed)
                {
                    self.mark_subscribed(now);
                } else if (self.unsubscribed && !old.unsubscribed)
                    || (old.subscribed && !self.subscribed)
                {
                    self.mark_unsubscribed(now);
                }
            }
            None => {
                if self.subscribed {
                    self.mark_subscribed(now);
                } else if self.unsubscribed {
                    self.mark_unsubscribed(now);
                }
            }
        }
    }

    fn mark_subscribed(&mut self, now: DateTime<Utc>) {
        tracing::debug!("Subscribing subscription {}", self.id);

        self.subscribed = true;
        self.subscribe_date = Some(now);
        self.unsubscribed = false;
        self.unsubscribe_date = None;
    }

    fn mark_unsubscribed(&mut self, now: DateTime<Utc>) {
        tracing::debug!("Unsubscribing subscription {}", self.id);

        self.subscribed = false;
        self.subscribe_date = None;
        self.unsubscribed = true;
        self.unsubscribe_date = Some(now);
    }
}
