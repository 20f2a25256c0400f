use chrono::{DateTime, Utc};

use serde::Serialize;

use sqlx::{Connection, SqliteConnection, SqliteExecutor};

use uuid::Uuid;

use crate::error::Result;
use crate::model::{Message, NewSubmission, Submission};

const SELECT_SUBMISSION: &str = "select id, newsletter_id, message_id, publish_date, publish, \
    prepared, sent, sending, created_at from submissions";

/// A sent submission as listed in the public archive of a newsletter
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ArchiveEntry {
    pub submission_id: Uuid,
    pub publish_date: DateTime<Utc>,
    pub title: String,
    pub slug: String,
}

/// Repository for submissions and their subscriber sets
pub struct SubmissionRepo;

impl SubmissionRepo {
    /// Insert a submission of a message without explicit subscribers, so
    /// its recipients are computed when it is sent.
    #[tracing::instrument(name = "Insert submission", skip(executor, message), fields(message_id = %message.id))]
    pub async fn insert<'con>(
        executor: impl SqliteExecutor<'con>,
        message: &Message,
        new_submission: &NewSubmission,
    ) -> Result<Submission> {
        // The newsletter always follows the message
        let submission = Submission {
            id: Uuid::new_v4(),
            newsletter_id: message.newsletter_id,
            message_id: message.id,
            publish_date: new_submission.publish_date,
            publish: new_submission.publish,
            prepared: false,
            sent: false,
            sending: false,
            created_at: Utc::now(),
        };

        sqlx::query(
            "insert into submissions(id, newsletter_id, message_id, publish_date, publish, prepared, \
             sent, sending, created_at) values (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(submission.id)
        .bind(submission.newsletter_id)
        .bind(submission.message_id)
        .bind(submission.publish_date)
        .bind(submission.publish)
        .bind(submission.prepared)
        .bind(submission.sent)
        .bind(submission.sending)
        .bind(submission.created_at)
        .execute(executor)
        .await?;

        Ok(submission)
    }

    /// Create a submission for a message, snapshotting the current subscribers
    /// of its newsletter as the submission's recipients
    #[tracing::instrument(name = "Create submission from message", skip(conn, message), fields(message_id = %message.id))]
    pub async fn create_from_message(
        conn: &mut SqliteConnection,
        message: &Message,
        new_submission: &NewSubmission,
    ) -> Result<Submission> {
        let mut tx = conn.begin().await?;

        let submission = Self::insert(&mut *tx, message, new_submission).await?;

        sqlx::query(
            "insert into submission_subscriptions(submission_id, subscription_id) \
             select ?, id from subscriptions where newsletter_id = ? and subscribed = 1",
        )
        .bind(submission.id)
        .bind(submission.newsletter_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(submission)
    }

    /// Attach subscriptions to the explicit subscriber set of a submission
    #[tracing::instrument(name = "Attach submission subscriptions", skip(conn))]
    pub async fn attach_subscriptions(
        conn: &mut SqliteConnection,
        submission_id: Uuid,
        subscription_ids: &[Uuid],
    ) -> Result<()> {
        for subscription_id in subscription_ids {
            sqlx::query(
                "insert or ignore into submission_subscriptions(submission_id, subscription_id) values (?, ?)",
            )
            .bind(submission_id)
            .bind(subscription_id)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    #[tracing::instrument(name = "Fetch submission by id", skip(executor))]
    pub async fn fetch_by_id<'con>(executor: impl SqliteExecutor<'con>, id: Uuid) -> Result<Option<Submission>> {
        let submission = sqlx::query_as::<_, Submission>(&format!("{} where id = ?", SELECT_SUBMISSION))
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(submission)
    }

    /// Fetch the submissions that are prepared, neither sent nor sending, and
    /// whose publish date has passed
    #[tracing::instrument(name = "Fetch due submissions", skip(executor))]
    pub async fn fetch_due<'con>(executor: impl SqliteExecutor<'con>, now: DateTime<Utc>) -> Result<Vec<Submission>> {
        let submissions = sqlx::query_as::<_, Submission>(&format!(
            "{} where prepared = 1 and sent = 0 and sending = 0 and publish_date < ? \
             order by publish_date, created_at",
            SELECT_SUBMISSION
        ))
        .bind(now)
        .fetch_all(executor)
        .await?;

        // The date comparison above is textual, keep the authoritative check
        Ok(submissions.into_iter().filter(|submission| submission.is_due(now)).collect())
    }

    /// Mark a pending submission as prepared, returns whether it was pending
    #[tracing::instrument(name = "Prepare submission", skip(executor))]
    pub async fn prepare<'con>(executor: impl SqliteExecutor<'con>, id: Uuid) -> Result<bool> {
        let result = sqlx::query("update submissions set prepared = 1 where id = ? and prepared = 0")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Persist the lifecycle flags of a submission
    #[tracing::instrument(
        name = "Save submission status",
        skip(executor, submission),
        fields(id = %submission.id, status = %submission.status())
    )]
    pub async fn save_status<'con>(executor: impl SqliteExecutor<'con>, submission: &Submission) -> Result<()> {
        sqlx::query("update submissions set prepared = ?, sent = ?, sending = ? where id = ?")
            .bind(submission.prepared)
            .bind(submission.sent)
            .bind(submission.sending)
            .bind(submission.id)
            .execute(executor)
            .await?;

        Ok(())
    }

    /// Fetch the sent, published submissions of a newsletter, newest first
    #[tracing::instrument(name = "Fetch newsletter archive", skip(executor))]
    pub async fn fetch_archive<'con>(
        executor: impl SqliteExecutor<'con>,
        newsletter_id: Uuid,
    ) -> Result<Vec<ArchiveEntry>> {
        let entries = sqlx::query_as::<_, ArchiveEntry>(
            "select s.id as submission_id, s.publish_date, m.title, m.slug \
             from submissions s join messages m on m.id = s.message_id \
             where s.newsletter_id = ? and s.sent = 1 and s.publish = 1 \
             order by s.publish_date desc",
        )
        .bind(newsletter_id)
        .fetch_all(executor)
        .await?;

        Ok(entries)
    }
}
