use chrono::Utc;

use sqlx::{SqliteConnection, SqliteExecutor};

use uuid::Uuid;

use crate::crypto::make_activation_code;
use crate::domain::{Action, EmailAddress};
use crate::error::{Error, Result};
use crate::model::{
    NewSubscriber, NewSubscription, Subscriber, Subscription, SubscriptionFlags,
    SubscriptionRecord,
};

const SELECT_SUBSCRIPTION: &str = "select s.id, s.newsletter_id, s.user_id, s.email, s.name, s.ip, \
    s.activation_code, s.subscribed, s.subscribe_date, s.unsubscribed, s.unsubscribe_date, \
    s.created_at, u.email as user_email, u.full_name as user_full_name \
    from subscriptions s left join users u on u.id = s.user_id";

/// Repository for interfacing with subscription-related tables
pub struct SubscriptionRepo;

impl SubscriptionRepo {
    #[tracing::instrument(name = "Insert subscription", skip(executor))]
    pub async fn insert<'con>(
        executor: impl SqliteExecutor<'con>,
        new_subscription: &NewSubscription,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let (user_id, email, name) = match &new_subscription.subscriber {
            NewSubscriber::User(user_id) => (Some(*user_id), None, None),
            NewSubscriber::Email { email, name } => (
                None,
                Some(email.as_ref()),
                name.as_ref().map(AsRef::as_ref),
            ),
        };
        let subscribe_date = new_subscription.subscribed.then_some(now);

        sqlx::query(
            "insert into subscriptions(id, newsletter_id, user_id, email, name, ip, activation_code, \
             subscribed, subscribe_date, created_at) values (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(new_subscription.newsletter_id)
        .bind(user_id)
        .bind(email)
        .bind(name)
        .bind(new_subscription.ip.map(|ip| ip.to_string()))
        .bind(make_activation_code())
        .bind(new_subscription.subscribed)
        .bind(subscribe_date)
        .bind(now)
        .execute(executor)
        .await?;

        Ok(id)
    }

    #[tracing::instrument(name = "Fetch subscription by id", skip(executor))]
    pub async fn fetch_by_id<'con>(
        executor: impl SqliteExecutor<'con>,
        id: Uuid,
    ) -> Result<Option<Subscription>> {
        sqlx::query_as::<_, SubscriptionRecord>(&format!("{} where s.id = ?", SELECT_SUBSCRIPTION))
            .bind(id)
            .fetch_optional(executor)
            .await?
            .map(Subscription::try_from)
            .transpose()
    }

    /// Fetch the subscription of a newsletter for an email, either given
    /// directly or through the subscribed user
    #[tracing::instrument(name = "Fetch subscription by email", skip(executor))]
    pub async fn fetch_by_email<'con>(
        executor: impl SqliteExecutor<'con>,
        newsletter_id: Uuid,
        email: &EmailAddress,
    ) -> Result<Option<Subscription>> {
        sqlx::query_as::<_, SubscriptionRecord>(&format!(
            "{} where s.newsletter_id = ? and (s.email = ? or u.email = ?)",
            SELECT_SUBSCRIPTION
        ))
        .bind(newsletter_id)
        .bind(email.as_ref())
        .bind(email.as_ref())
        .fetch_optional(executor)
        .await?
        .map(Subscription::try_from)
        .transpose()
    }

    /// Fetch every currently subscribed subscription of a newsletter
    #[tracing::instrument(name = "Fetch active subscriptions", skip(executor))]
    pub async fn fetch_active_for_newsletter<'con>(
        executor: impl SqliteExecutor<'con>,
        newsletter_id: Uuid,
    ) -> Result<Vec<Subscription>> {
        let records = sqlx::query_as::<_, SubscriptionRecord>(&format!(
            "{} where s.newsletter_id = ? and s.subscribed = 1 order by s.created_at, s.id",
            SELECT_SUBSCRIPTION
        ))
        .bind(newsletter_id)
        .fetch_all(executor)
        .await?;

        records.into_iter().map(Subscription::try_from).collect()
    }

    /// Fetch the subscriptions explicitly attached to a submission, whatever
    /// their current state
    #[tracing::instrument(name = "Fetch submission subscriptions", skip(executor))]
    pub async fn fetch_for_submission<'con>(
        executor: impl SqliteExecutor<'con>,
        submission_id: Uuid,
    ) -> Result<Vec<Subscription>> {
        let records = sqlx::query_as::<_, SubscriptionRecord>(&format!(
            "{} join submission_subscriptions ss on ss.subscription_id = s.id \
             where ss.submission_id = ? order by s.created_at, s.id",
            SELECT_SUBSCRIPTION
        ))
        .bind(submission_id)
        .fetch_all(executor)
        .await?;

        records.into_iter().map(Subscription::try_from).collect()
    }

    /// Persist a subscription, reconciling its state against the stored one
    #[tracing::instrument(name = "Save subscription", skip(conn, subscription), fields(id = %subscription.id))]
    pub async fn save(conn: &mut SqliteConnection, subscription: &mut Subscription) -> Result<()> {
        let previous = sqlx::query_as::<_, SubscriptionFlags>(
            "select subscribed, unsubscribed from subscriptions where id = ?",
        )
        .bind(subscription.id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(Error::NotFound("Subscription"))?;

        subscription.reconcile(Some(previous), Utc::now());

        let name = match &subscription.subscriber {
            Subscriber::Email { name, .. } => name.as_ref().map(|name| name.to_string()),
            Subscriber::User { .. } => None,
        };

        sqlx::query(
            "update subscriptions set name = ?, ip = ?, subscribed = ?, subscribe_date = ?, \
             unsubscribed = ?, unsubscribe_date = ? where id = ?",
        )
        .bind(name)
        .bind(subscription.ip.as_deref())
        .bind(subscription.subscribed)
        .bind(subscription.subscribe_date)
        .bind(subscription.unsubscribed)
        .bind(subscription.unsubscribe_date)
        .bind(subscription.id)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Apply a subscribe/update/unsubscribe action and persist the result
    pub async fn update(
        conn: &mut SqliteConnection,
        subscription: &mut Subscription,
        action: Action,
    ) -> Result<()> {
        subscription.update(action)?;
        Self::save(conn, subscription).await
    }

    #[tracing::instrument(name = "Delete subscription", skip(executor))]
    pub async fn delete<'con>(executor: impl SqliteExecutor<'con>, id: Uuid) -> Result<()> {
        sqlx::query("delete from subscriptions where id = ?")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(())
    }
}
