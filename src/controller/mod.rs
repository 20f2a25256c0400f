mod admin;
mod error;
mod newsletters;
mod subscriptions;

pub use admin::scope as admin_scope;
pub use error::*;
pub use newsletters::scope as newsletters_scope;

use sqlx::SqlitePool;

use crate::error::Error;
use crate::model::Newsletter;
use crate::repo::NewsletterRepo;

/// Fetch a newsletter shown to the public, hidden ones are not found
async fn fetch_visible_newsletter(pool: &SqlitePool, slug: &str) -> RestResult<Newsletter> {
    let newsletter = fetch_newsletter(pool, slug).await?;
    if !newsletter.visible {
        return Err(Error::NotFound("Newsletter").into());
    }

    Ok(newsletter)
}

/// Fetch a newsletter, visible or not
async fn fetch_newsletter(pool: &SqlitePool, slug: &str) -> RestResult<Newsletter> {
    let newsletter = NewsletterRepo::fetch_by_slug(pool, slug)
        .await?
        .ok_or(Error::NotFound("Newsletter"))?;

    Ok(newsletter)
}
