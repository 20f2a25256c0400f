use chrono::Utc;

use sqlx::{SqliteConnection, SqliteExecutor};

use uuid::Uuid;

use crate::error::Result;
use crate::model::{next_sortorder, Article, Attachment, Message, NewArticle, NewAttachment, NewMessage};

const SELECT_MESSAGE: &str =
    "select id, newsletter_id, title, slug, created_at, modified_at from messages";

/// Repository for messages and their articles and attachments
pub struct MessageRepo;

impl MessageRepo {
    #[tracing::instrument(name = "Insert message", skip(executor))]
    pub async fn insert<'con>(executor: impl SqliteExecutor<'con>, new_message: &NewMessage) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            "insert into messages(id, newsletter_id, title, slug, created_at, modified_at) \
             values (?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(new_message.newsletter_id)
        .bind(&new_message.title)
        .bind(new_message.slug.as_ref())
        .bind(now)
        .bind(now)
        .execute(executor)
        .await?;

        Ok(id)
    }

    #[tracing::instrument(name = "Fetch message by id", skip(executor))]
    pub async fn fetch_by_id<'con>(executor: impl SqliteExecutor<'con>, id: Uuid) -> Result<Option<Message>> {
        let message = sqlx::query_as::<_, Message>(&format!("{} where id = ?", SELECT_MESSAGE))
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(message)
    }

    /// Bump the modification timestamp of a message
    pub async fn touch<'con>(executor: impl SqliteExecutor<'con>, id: Uuid) -> Result<()> {
        sqlx::query("update messages set modified_at = ? where id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(executor)
            .await?;

        Ok(())
    }
}

pub struct ArticleRepo;

impl ArticleRepo {
    /// Insert an article, appending it after the existing ones when it has no
    /// explicit sort order
    #[tracing::instrument(name = "Insert article", skip(conn))]
    pub async fn insert(conn: &mut SqliteConnection, message_id: Uuid, new_article: &NewArticle) -> Result<Article> {
        let sortorder = match new_article.sortorder {
            Some(sortorder) => sortorder,
            None => {
                let current_max = sqlx::query_scalar::<_, Option<i64>>(
                    "select max(sortorder) from articles where message_id = ?",
                )
                .bind(message_id)
                .fetch_one(&mut *conn)
                .await?;
                next_sortorder(current_max)
            }
        };

        let article = Article {
            id: Uuid::new_v4(),
            message_id,
            sortorder,
            title: new_article.title.clone(),
            text: new_article.text.clone(),
            url: new_article.url.as_ref().map(|url| url.to_string()),
            image: new_article.image.clone(),
        };

        sqlx::query(
            "insert into articles(id, message_id, sortorder, title, text, url, image) \
             values (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(article.id)
        .bind(article.message_id)
        .bind(article.sortorder)
        .bind(&article.title)
        .bind(&article.text)
        .bind(article.url.as_deref())
        .bind(article.image.as_deref())
        .execute(&mut *conn)
        .await?;

        MessageRepo::touch(&mut *conn, message_id).await?;

        Ok(article)
    }

    #[tracing::instrument(name = "Fetch message articles", skip(executor))]
    pub async fn fetch_for_message<'con>(
        executor: impl SqliteExecutor<'con>,
        message_id: Uuid,
    ) -> Result<Vec<Article>> {
        let articles = sqlx::query_as::<_, Article>(
            "select id, message_id, sortorder, title, text, url, image from articles \
             where message_id = ? order by sortorder",
        )
        .bind(message_id)
        .fetch_all(executor)
        .await?;

        Ok(articles)
    }
}

pub struct AttachmentRepo;

impl AttachmentRepo {
    #[tracing::instrument(name = "Insert attachment", skip(executor))]
    pub async fn insert<'con>(executor: impl SqliteExecutor<'con>, new_attachment: &NewAttachment) -> Result<Uuid> {
        let id = Uuid::new_v4();

        sqlx::query(
            "insert into attachments(id, message_id, file, content_type, created_at) values (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(new_attachment.message_id)
        .bind(&new_attachment.file)
        .bind(new_attachment.content_type.as_ref())
        .bind(Utc::now())
        .execute(executor)
        .await?;

        Ok(id)
    }

    #[tracing::instrument(name = "Fetch message attachments", skip(executor))]
    pub async fn fetch_for_message<'con>(
        executor: impl SqliteExecutor<'con>,
        message_id: Uuid,
    ) -> Result<Vec<Attachment>> {
        let attachments = sqlx::query_as::<_, Attachment>(
            "select id, message_id, file, content_type, created_at from attachments \
             where message_id = ? order by created_at, id",
        )
        .bind(message_id)
        .fetch_all(executor)
        .await?;

        Ok(attachments)
    }
}
