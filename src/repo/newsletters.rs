use chrono::Utc;

use sqlx::{SqliteConnection, SqliteExecutor};

use uuid::Uuid;

use crate::error::Result;
use crate::model::{NewNewsletter, Newsletter};

const SELECT_NEWSLETTER: &str = "select id, title, slug, email, sender, visible, send_html, created_at from newsletters";

/// Repository for interfacing with newsletter-related tables
pub struct NewsletterRepo;

impl NewsletterRepo {
    #[tracing::instrument(name = "Insert newsletter", skip(conn))]
    pub async fn insert(conn: &mut SqliteConnection, new_newsletter: &NewNewsletter) -> Result<Uuid> {
        let id = Uuid::new_v4();

        sqlx::query(
            "insert into newsletters(id, title, slug, email, sender, visible, send_html, created_at) \
             values (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(&new_newsletter.title)
        .bind(new_newsletter.slug.as_ref())
        .bind(new_newsletter.email.as_ref())
        .bind(&new_newsletter.sender)
        .bind(new_newsletter.visible)
        .bind(new_newsletter.send_html)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;

        for domain in &new_newsletter.sites {
            sqlx::query("insert or ignore into newsletter_sites(newsletter_id, domain) values (?, ?)")
                .bind(id)
                .bind(domain)
                .execute(&mut *conn)
                .await?;
        }

        Ok(id)
    }

    #[tracing::instrument(name = "Fetch newsletter by id", skip(executor))]
    pub async fn fetch_by_id<'con>(
        executor: impl SqliteExecutor<'con>,
        id: Uuid,
    ) -> Result<Option<Newsletter>> {
        let newsletter = sqlx::query_as::<_, Newsletter>(&format!("{} where id = ?", SELECT_NEWSLETTER))
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(newsletter)
    }

    #[tracing::instrument(name = "Fetch newsletter by slug", skip(executor))]
    pub async fn fetch_by_slug<'con>(
        executor: impl SqliteExecutor<'con>,
        slug: &str,
    ) -> Result<Option<Newsletter>> {
        let newsletter = sqlx::query_as::<_, Newsletter>(&format!("{} where slug = ?", SELECT_NEWSLETTER))
            .bind(slug)
            .fetch_optional(executor)
            .await?;

        Ok(newsletter)
    }

    /// Fetch the visible newsletters published on a site.
    /// NOTE: Newsletters without any site are published on every site
    #[tracing::instrument(name = "Fetch visible newsletters on site", skip(executor))]
    pub async fn fetch_visible_on_site<'con>(
        executor: impl SqliteExecutor<'con>,
        domain: &str,
    ) -> Result<Vec<Newsletter>> {
        let newsletters = sqlx::query_as::<_, Newsletter>(&format!(
            "{} n where n.visible = 1 and ( \
                not exists (select 1 from newsletter_sites s where s.newsletter_id = n.id) \
                or exists (select 1 from newsletter_sites s where s.newsletter_id = n.id and s.domain = ?) \
             ) order by n.title",
            SELECT_NEWSLETTER
        ))
        .bind(domain)
        .fetch_all(executor)
        .await?;

        Ok(newsletters)
    }

    #[tracing::instrument(name = "Fetch newsletter sites", skip(executor))]
    pub async fn fetch_sites<'con>(executor: impl SqliteExecutor<'con>, id: Uuid) -> Result<Vec<String>> {
        let sites = sqlx::query_scalar::<_, String>(
            "select domain from newsletter_sites where newsletter_id = ? order by domain",
        )
        .bind(id)
        .fetch_all(executor)
        .await?;

        Ok(sites)
    }
}
