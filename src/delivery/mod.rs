//! Delivery of submissions and activation emails.
//!
//! A submission goes through `pending → prepared → sending → sent`. The queue
//! picks up every prepared submission whose publish date has passed and sends
//! the message to each recipient, one at a time, with optional pacing.

mod activation;
mod worker;

pub use worker::run_until_stopped;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;

use sqlx::SqlitePool;

use url::Url;

use uuid::Uuid;

use crate::client::{Email, EmailAttachment, EmailClient};
use crate::domain::Action;
use crate::error::{Error, Result};
use crate::model::{Article, Message, Newsletter, Submission, Subscription};
use crate::repo::{ArticleRepo, AttachmentRepo, MessageRepo, NewsletterRepo, SubmissionRepo, SubscriptionRepo};
use crate::templates::{context, TemplateSet, TemplateStore, Value};

const LIST_UNSUBSCRIBE_HEADER: &str = "List-Unsubscribe";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Delays between consecutive emails of a submission
#[derive(Debug, Clone, Copy, Default)]
pub struct Pacing {
    pub email_delay: Duration,
    /// Number of emails per batch, `0` disables batching
    pub batch_size: usize,
    pub batch_delay: Duration,
}

impl Pacing {
    /// Time to wait before sending to the recipient at the 1-based `index`
    pub fn delay_before(&self, index: usize) -> Duration {
        let mut delay = self.email_delay;
        if self.batch_size > 0 && index % self.batch_size == 0 {
            delay += self.batch_delay;
        }
        delay
    }
}

/// Everything shared by the emails of one submission
struct MessageContent {
    newsletter: Newsletter,
    message: Message,
    articles: Vec<Article>,
    attachments: Vec<EmailAttachment>,
    templates: TemplateSet,
    /// Publish date of the submission, as shown in the emails
    date: String,
}

#[derive(Debug, Clone)]
pub struct Delivery {
    pool: SqlitePool,
    email_client: EmailClient,
    templates: TemplateStore,
    media_root: PathBuf,
    base_url: Url,
    pacing: Pacing,
}

impl Delivery {
    pub fn new(
        pool: SqlitePool,
        email_client: EmailClient,
        templates: TemplateStore,
        media_root: impl Into<PathBuf>,
        base_url: Url,
        pacing: Pacing,
    ) -> Self {
        Self {
            pool,
            email_client,
            templates,
            media_root: media_root.into(),
            base_url,
            pacing,
        }
    }

    /// Submit every due submission, sequentially. Returns the number of
    /// submissions processed, whether or not they were fully sent. A
    /// submission failing to submit is logged and the next one is processed.
    #[tracing::instrument(name = "Submit queue", skip(self))]
    pub async fn submit_queue(&self) -> Result<usize> {
        let due = SubmissionRepo::fetch_due(&self.pool, Utc::now()).await?;
        let count = due.len();

        for submission in due {
            let id = submission.id;
            if let Err(error) = self.submit(submission).await {
                tracing::error!(error.cause_chain = ?error, "Failed to submit {}", id);
            }
        }

        Ok(count)
    }

    /// Send a submission to its recipients.
    /// A failure while sending is logged and leaves the submission unsent, so
    /// it is picked up again by a later run. The sending flag is cleared in
    /// any case.
    #[tracing::instrument(name = "Submit", skip(self, submission), fields(id = %submission.id))]
    pub async fn submit(&self, mut submission: Submission) -> Result<Submission> {
        if submission.publish_date >= Utc::now() {
            return Err(Error::PublishDateInFuture(submission.id));
        }

        submission.sending = true;
        SubmissionRepo::save_status(&self.pool, &submission).await?;

        match self.deliver(&submission).await {
            Ok(sent) => {
                tracing::info!("Submission {} sent to {} recipients", submission.id, sent);
                submission.sent = true;
            }
            Err(error) => {
                tracing::error!(
                    error.cause_chain = ?error,
                    "Submission {} aborted",
                    submission.id
                );
            }
        }

        submission.sending = false;
        SubmissionRepo::save_status(&self.pool, &submission).await?;

        Ok(submission)
    }

    /// Returns the number of emails accepted by the delivery service
    async fn deliver(&self, submission: &Submission) -> Result<usize> {
        let newsletter = NewsletterRepo::fetch_by_id(&self.pool, submission.newsletter_id)
            .await?
            .ok_or(Error::NotFound("Newsletter"))?;
        let message = MessageRepo::fetch_by_id(&self.pool, submission.message_id)
            .await?
            .ok_or(Error::NotFound("Message"))?;
        let articles = ArticleRepo::fetch_for_message(&self.pool, message.id).await?;
        let attachments = self.load_attachments(message.id).await?;
        let templates = self.templates.templates_for(&newsletter, Action::Message).await?;

        let content = MessageContent {
            newsletter,
            message,
            articles,
            attachments,
            templates,
            date: submission.publish_date.format(DATE_FORMAT).to_string(),
        };

        let recipients = self.resolve_recipients(submission).await?;
        tracing::debug!("Submitting to {} recipients", recipients.len());

        let mut sent = 0;
        for (idx, subscription) in recipients.iter().enumerate() {
            let delay = self.pacing.delay_before(idx + 1);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            match self.send_message(&content, subscription).await {
                Ok(()) => sent += 1,
                Err(error) if error.is_recipient_error() => {
                    tracing::warn!(
                        error.cause_chain = ?error,
                        "Skipping subscription {} ({})",
                        subscription.id,
                        subscription.email()
                    );
                }
                Err(error) => return Err(error),
            }
        }

        Ok(sent)
    }

    /// The still subscribed subscriptions attached to a submission, or every
    /// subscribed subscription of its newsletter when none are attached
    #[tracing::instrument(name = "Resolve recipients", skip(self, submission), fields(id = %submission.id))]
    pub async fn resolve_recipients(&self, submission: &Submission) -> Result<Vec<Subscription>> {
        let attached = SubscriptionRepo::fetch_for_submission(&self.pool, submission.id).await?;

        if attached.is_empty() {
            return SubscriptionRepo::fetch_active_for_newsletter(&self.pool, submission.newsletter_id).await;
        }

        Ok(attached
            .into_iter()
            .filter(|subscription| subscription.subscribed)
            .collect())
    }

    #[tracing::instrument(name = "Send message", skip(self, content, subscription), fields(subscription_id = %subscription.id))]
    async fn send_message(&self, content: &MessageContent, subscription: &Subscription) -> Result<()> {
        let unsubscribe_url = self.unsubscribe_url(&content.newsletter);

        let context = context! {
            subscription => context! {
                name => subscription.name().unwrap_or_default(),
                email => subscription.email(),
            },
            newsletter => context! {
                title => &content.newsletter.title,
                slug => &content.newsletter.slug,
            },
            message => context! { title => &content.message.title },
            articles => &content.articles,
            date => &content.date,
            site => context! { domain => self.site_domain() },
            unsubscribe_url => Value::from_safe_string(unsubscribe_url.to_string()),
        };

        let rendered = content.templates.render(&context)?;

        let email = Email {
            from: content.newsletter.sender_address(),
            to: subscription.recipient(),
            subject: rendered.subject,
            text_body: rendered.text,
            html_body: rendered.html,
            headers: vec![(LIST_UNSUBSCRIBE_HEADER.to_string(), format!("<{}>", unsubscribe_url))],
            attachments: content.attachments.clone(),
        };

        self.email_client.send(&email).await
    }

    async fn load_attachments(&self, message_id: Uuid) -> Result<Vec<EmailAttachment>> {
        let mut loaded = vec![];

        for attachment in AttachmentRepo::fetch_for_message(&self.pool, message_id).await? {
            let content = tokio::fs::read(self.media_root.join(&attachment.file)).await?;
            loaded.push(EmailAttachment {
                name: attachment.file_name().to_string(),
                content_type: attachment.content_type.clone(),
                content,
            });
        }

        Ok(loaded)
    }

    /// Root directory of uploaded files
    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    /// Domain of the site the service runs on
    pub fn site_domain(&self) -> &str {
        self.base_url.host_str().unwrap_or_default()
    }

    pub fn unsubscribe_url(&self, newsletter: &Newsletter) -> Url {
        self.newsletter_url(&newsletter.slug, &["unsubscribe"])
    }

    /// `<base>/newsletters/<slug>/<segments...>`, each segment escaped
    fn newsletter_url(&self, slug: &str, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .push("newsletters")
                .push(slug)
                .extend(segments);
        }
        url
    }
}
