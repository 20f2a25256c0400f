use actix_web::dev::HttpServiceFactory;
use actix_web::{get, web, HttpResponse, Responder};

use serde::Serialize;

use sqlx::SqlitePool;

use crate::delivery::Delivery;
use crate::model::Newsletter;
use crate::repo::{NewsletterRepo, SubmissionRepo};

use super::{fetch_visible_newsletter, subscriptions, RestResult};

#[derive(Debug, Serialize)]
struct NewsletterDetail {
    #[serde(flatten)]
    newsletter: Newsletter,
    sites: Vec<String>,
}

/// Visible newsletters of the site the service runs on
#[tracing::instrument(name = "List newsletters", skip(pool, delivery))]
#[get("")]
async fn list(pool: web::Data<SqlitePool>, delivery: web::Data<Delivery>) -> RestResult<impl Responder> {
    let newsletters = NewsletterRepo::fetch_visible_on_site(pool.get_ref(), delivery.site_domain()).await?;

    Ok(HttpResponse::Ok().json(newsletters))
}

#[tracing::instrument(name = "Show newsletter", skip(pool))]
#[get("/{slug}")]
async fn detail(slug: web::Path<String>, pool: web::Data<SqlitePool>) -> RestResult<impl Responder> {
    let newsletter = fetch_visible_newsletter(pool.get_ref(), &slug).await?;
    let sites = NewsletterRepo::fetch_sites(pool.get_ref(), newsletter.id).await?;

    Ok(HttpResponse::Ok().json(NewsletterDetail { newsletter, sites }))
}

/// Sent and published submissions, newest first
#[tracing::instrument(name = "Show newsletter archive", skip(pool))]
#[get("/{slug}/archive")]
async fn archive(slug: web::Path<String>, pool: web::Data<SqlitePool>) -> RestResult<impl Responder> {
    let newsletter = fetch_visible_newsletter(pool.get_ref(), &slug).await?;
    let entries = SubmissionRepo::fetch_archive(pool.get_ref(), newsletter.id).await?;

    Ok(HttpResponse::Ok().json(entries))
}

/// Public newsletter endpoints, subscriptions included
pub fn scope() -> impl HttpServiceFactory {
    web::scope("/newsletters")
        .service(list)
        .service(detail)
        .service(archive)
        .service(subscriptions::subscribe)
        .service(subscriptions::unsubscribe)
        .service(subscriptions::update)
        .service(subscriptions::activate)
}
