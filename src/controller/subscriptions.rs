use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};

use serde::Deserialize;

use sqlx::SqlitePool;

use crate::delivery::Delivery;
use crate::domain::{Action, EmailAddress, PersonName};
use crate::error::Error;
use crate::model::{NewSubscriber, NewSubscription, Newsletter, Subscription};
use crate::repo::SubscriptionRepo;

use super::{fetch_newsletter, fetch_visible_newsletter, RestError, RestResult};

/// Form deserialization wrapper for new subscriptions
#[derive(Debug, Deserialize)]
pub struct SubscribeForm {
    #[serde(default)]
    name: String,
    email: String,
}

impl SubscribeForm {
    fn parse(&self) -> Result<(EmailAddress, Option<PersonName>), Error> {
        let email = self.email.parse()?;
        let name = match self.name.trim() {
            "" => None,
            name => Some(name.parse()?),
        };

        Ok((email, name))
    }
}

/// Form for requests about an existing subscription
#[derive(Debug, Deserialize)]
pub struct SubscriptionForm {
    email: String,
}

/// Subscribe an email address and send the activation email. A new
/// subscription is removed again when the email could not be sent.
/// NOTE: No database lock is held while the email is sent.
#[tracing::instrument(name = "Subscribe to a newsletter", skip(req, pool, delivery))]
#[post("/{slug}/subscribe")]
pub(super) async fn subscribe(
    req: HttpRequest,
    slug: web::Path<String>,
    form: web::Form<SubscribeForm>,
    pool: web::Data<SqlitePool>,
    delivery: web::Data<Delivery>,
) -> RestResult<impl Responder> {
    let (email, name) = form.parse()?;
    let pool = pool.get_ref();
    let newsletter = fetch_visible_newsletter(pool, &slug).await?;

    let existing = SubscriptionRepo::fetch_by_email(pool, newsletter.id, &email).await?;
    let (subscription, created) = match existing {
        Some(subscription) if subscription.subscribed => {
            return Err(RestError::Conflict("Already subscribed".into()));
        }
        Some(subscription) => (subscription, false),
        None => {
            let new_subscription = NewSubscription {
                newsletter_id: newsletter.id,
                subscriber: NewSubscriber::Email { email, name },
                ip: req.peer_addr().map(|addr| addr.ip()),
                subscribed: false,
            };
            let id = SubscriptionRepo::insert(pool, &new_subscription).await?;
            let subscription = SubscriptionRepo::fetch_by_id(pool, id)
                .await?
                .ok_or(Error::NotFound("Subscription"))?;
            (subscription, true)
        }
    };

    let sent = delivery
        .send_activation_email(&newsletter, &subscription, Action::Subscribe)
        .await;
    if let Err(error) = sent {
        if created {
            SubscriptionRepo::delete(pool, subscription.id).await?;
        }
        return Err(error.into());
    }

    Ok(HttpResponse::Ok().finish())
}

#[tracing::instrument(name = "Request to unsubscribe", skip(pool, delivery))]
#[post("/{slug}/unsubscribe")]
pub(super) async fn unsubscribe(
    slug: web::Path<String>,
    form: web::Form<SubscriptionForm>,
    pool: web::Data<SqlitePool>,
    delivery: web::Data<Delivery>,
) -> RestResult<impl Responder> {
    let (newsletter, subscription) = fetch_subscription(pool.get_ref(), &slug, &form.email).await?;

    delivery
        .send_activation_email(&newsletter, &subscription, Action::Unsubscribe)
        .await?;

    Ok(HttpResponse::Ok().finish())
}

#[tracing::instrument(name = "Request to update a subscription", skip(pool, delivery))]
#[post("/{slug}/update")]
pub(super) async fn update(
    slug: web::Path<String>,
    form: web::Form<SubscriptionForm>,
    pool: web::Data<SqlitePool>,
    delivery: web::Data<Delivery>,
) -> RestResult<impl Responder> {
    let (newsletter, subscription) = fetch_subscription(pool.get_ref(), &slug, &form.email).await?;

    delivery
        .send_activation_email(&newsletter, &subscription, Action::Update)
        .await?;

    Ok(HttpResponse::Ok().finish())
}

/// Confirm an action with the code sent in the activation email
#[tracing::instrument(name = "Activate a subscription action", skip(pool))]
#[get("/{slug}/subscription/{email}/{action}/activate/{code}")]
pub(super) async fn activate(
    path: web::Path<(String, String, String, String)>,
    pool: web::Data<SqlitePool>,
) -> RestResult<impl Responder> {
    let (slug, email, action, code) = path.into_inner();

    let action: Action = action.parse()?;
    if !action.is_subscription_action() {
        return Err(Error::UnsupportedAction(action).into());
    }

    let (_, mut subscription) = fetch_subscription(pool.get_ref(), &slug, &email).await?;
    if subscription.activation_code != code {
        return Err(RestError::Unauthorized("Invalid activation code".into()));
    }

    let mut conn = pool.acquire().await?;
    SubscriptionRepo::update(&mut conn, &mut subscription, action).await?;

    Ok(HttpResponse::Ok().json(subscription.flags()))
}

async fn fetch_subscription(
    pool: &SqlitePool,
    slug: &str,
    email: &str,
) -> RestResult<(Newsletter, Subscription)> {
    let email: EmailAddress = email.parse()?;
    let newsletter = fetch_newsletter(pool, slug).await?;

    let subscription = SubscriptionRepo::fetch_by_email(pool, newsletter.id, &email)
        .await?
        .ok_or(Error::NotFound("Subscription"))?;

    Ok((newsletter, subscription))
}
