use std::path::Path;

use actix_web::dev::HttpServiceFactory;
use actix_web::{get, post, web, HttpResponse, Responder};

use chrono::{DateTime, Utc};

use serde::{Deserialize, Serialize};

use sqlx::SqlitePool;

use url::Url;

use uuid::Uuid;

use crate::auth::Administrator;
use crate::delivery::Delivery;
use crate::error::Error;
use crate::model::{
    Article, Message, NewArticle, NewAttachment, NewMessage, NewNewsletter, NewSubmission, Submission,
    SubmissionStatus,
};
use crate::repo::{ArticleRepo, AttachmentRepo, MessageRepo, NewsletterRepo, SubmissionRepo};

use super::{RestError, RestResult};

const ATTACHMENTS_DIR: &str = "newsletter/attachments";

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct NewsletterBody {
    title: String,
    slug: String,
    email: String,
    sender: String,
    #[serde(default = "default_true")]
    visible: bool,
    #[serde(default = "default_true")]
    send_html: bool,
    #[serde(default)]
    sites: Vec<String>,
}

impl TryFrom<NewsletterBody> for NewNewsletter {
    type Error = Error;

    fn try_from(body: NewsletterBody) -> Result<Self, Error> {
        Ok(Self {
            title: body.title,
            slug: body.slug.parse()?,
            email: body.email.parse()?,
            sender: body.sender,
            visible: body.visible,
            send_html: body.send_html,
            sites: body.sites,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct ArticleBody {
    sortorder: Option<i64>,
    title: String,
    text: String,
    url: Option<String>,
    image: Option<String>,
}

impl TryFrom<ArticleBody> for NewArticle {
    type Error = RestError;

    fn try_from(body: ArticleBody) -> RestResult<Self> {
        let url = body
            .url
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| RestError::ParseError(format!("Invalid article URL: {}", e)))?;

        Ok(Self {
            sortorder: body.sortorder,
            title: body.title,
            text: body.text,
            url,
            image: body.image,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct MessageBody {
    title: String,
    slug: String,
    #[serde(default)]
    articles: Vec<ArticleBody>,
}

#[derive(Debug, Serialize)]
struct MessageDetail {
    #[serde(flatten)]
    message: Message,
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
pub struct AttachmentBody {
    file_name: String,
    content_type: String,
    /// Base64 encoded file content
    content: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmissionBody {
    publish_date: Option<DateTime<Utc>>,
    publish: Option<bool>,
}

#[derive(Debug, Serialize)]
struct SubmissionDetail {
    #[serde(flatten)]
    submission: Submission,
    status: SubmissionStatus,
}

impl From<Submission> for SubmissionDetail {
    fn from(submission: Submission) -> Self {
        let status = submission.status();
        Self { submission, status }
    }
}

#[tracing::instrument(name = "Create a newsletter", skip(pool))]
#[post("/newsletters")]
async fn create_newsletter(
    _admin: Administrator,
    body: web::Json<NewsletterBody>,
    pool: web::Data<SqlitePool>,
) -> RestResult<impl Responder> {
    let new_newsletter: NewNewsletter = body.into_inner().try_into()?;

    let mut conn = pool.acquire().await?;
    let id = NewsletterRepo::insert(&mut conn, &new_newsletter).await?;
    let newsletter = NewsletterRepo::fetch_by_id(&mut *conn, id)
        .await?
        .ok_or(Error::NotFound("Newsletter"))?;

    Ok(HttpResponse::Created().json(newsletter))
}

#[tracing::instrument(name = "Create a message", skip(pool))]
#[post("/newsletters/{slug}/messages")]
async fn create_message(
    _admin: Administrator,
    slug: web::Path<String>,
    body: web::Json<MessageBody>,
    pool: web::Data<SqlitePool>,
) -> RestResult<impl Responder> {
    let body = body.into_inner();
    let newsletter = NewsletterRepo::fetch_by_slug(pool.get_ref(), &slug)
        .await?
        .ok_or(Error::NotFound("Newsletter"))?;

    let new_message = NewMessage {
        newsletter_id: newsletter.id,
        title: body.title,
        slug: body.slug.parse()?,
    };
    let new_articles = body
        .articles
        .into_iter()
        .map(NewArticle::try_from)
        .collect::<RestResult<Vec<_>>>()?;

    let mut tx = pool.begin().await?;

    let id = MessageRepo::insert(&mut *tx, &new_message).await?;
    let mut articles = Vec::with_capacity(new_articles.len());
    for new_article in &new_articles {
        articles.push(ArticleRepo::insert(&mut tx, id, new_article).await?);
    }
    let message = MessageRepo::fetch_by_id(&mut *tx, id)
        .await?
        .ok_or(Error::NotFound("Message"))?;

    tx.commit().await?;

    Ok(HttpResponse::Created().json(MessageDetail { message, articles }))
}

#[tracing::instrument(name = "Add an article", skip(pool))]
#[post("/messages/{id}/articles")]
async fn add_article(
    _admin: Administrator,
    id: web::Path<Uuid>,
    body: web::Json<ArticleBody>,
    pool: web::Data<SqlitePool>,
) -> RestResult<impl Responder> {
    let new_article: NewArticle = body.into_inner().try_into()?;

    let mut conn = pool.acquire().await?;
    let message = MessageRepo::fetch_by_id(&mut *conn, *id)
        .await?
        .ok_or(Error::NotFound("Message"))?;
    let article = ArticleRepo::insert(&mut conn, message.id, &new_article).await?;

    Ok(HttpResponse::Created().json(article))
}

/// Store an uploaded file under the media root and attach it to a message
#[tracing::instrument(name = "Add an attachment", skip(pool, delivery, body), fields(file_name = %body.file_name))]
#[post("/messages/{id}/attachments")]
async fn add_attachment(
    _admin: Administrator,
    id: web::Path<Uuid>,
    body: web::Json<AttachmentBody>,
    pool: web::Data<SqlitePool>,
    delivery: web::Data<Delivery>,
) -> RestResult<impl Responder> {
    use base64::Engine;

    let file_name = body.file_name.trim();
    if file_name.is_empty() || Path::new(file_name).file_name().and_then(|name| name.to_str()) != Some(file_name) {
        return Err(RestError::ParseError(format!("Invalid file name: {}", body.file_name)));
    }
    let content_type: mime::Mime = body
        .content_type
        .parse()
        .map_err(|e| RestError::ParseError(format!("Invalid content type: {}", e)))?;
    let content = base64::engine::general_purpose::STANDARD
        .decode(&body.content)
        .map_err(|e| RestError::ParseError(format!("Invalid attachment content: {}", e)))?;

    let message = MessageRepo::fetch_by_id(pool.get_ref(), *id)
        .await?
        .ok_or(Error::NotFound("Message"))?;

    let file = format!(
        "{}/{}/{}/{}",
        ATTACHMENTS_DIR,
        Utc::now().format("%Y-%m-%d"),
        message.id,
        file_name
    );
    let target = delivery.media_root().join(&file);
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(Error::from)?;
    }
    tokio::fs::write(&target, content).await.map_err(Error::from)?;

    let new_attachment = NewAttachment {
        message_id: message.id,
        file,
        content_type,
    };
    let attachment_id = AttachmentRepo::insert(pool.get_ref(), &new_attachment).await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "id": attachment_id,
        "message_id": message.id,
        "file": new_attachment.file,
        "content_type": new_attachment.content_type.as_ref(),
    })))
}

/// Queue a message for the current subscribers of its newsletter
#[tracing::instrument(name = "Create a submission", skip(pool))]
#[post("/messages/{id}/submissions")]
async fn create_submission(
    _admin: Administrator,
    id: web::Path<Uuid>,
    body: Option<web::Json<SubmissionBody>>,
    pool: web::Data<SqlitePool>,
) -> RestResult<impl Responder> {
    let body = body.map(web::Json::into_inner).unwrap_or_default();
    let defaults = NewSubmission::default();
    let new_submission = NewSubmission {
        publish_date: body.publish_date.unwrap_or(defaults.publish_date),
        publish: body.publish.unwrap_or(defaults.publish),
    };

    let mut conn = pool.acquire().await?;
    let message = MessageRepo::fetch_by_id(&mut *conn, *id)
        .await?
        .ok_or(Error::NotFound("Message"))?;
    let submission = SubmissionRepo::create_from_message(&mut conn, &message, &new_submission).await?;

    Ok(HttpResponse::Created().json(SubmissionDetail::from(submission)))
}

#[tracing::instrument(name = "Prepare a submission", skip(pool))]
#[post("/submissions/{id}/prepare")]
async fn prepare_submission(
    _admin: Administrator,
    id: web::Path<Uuid>,
    pool: web::Data<SqlitePool>,
) -> RestResult<impl Responder> {
    let prepared = SubmissionRepo::prepare(pool.get_ref(), *id).await?;

    let submission = SubmissionRepo::fetch_by_id(pool.get_ref(), *id)
        .await?
        .ok_or(Error::NotFound("Submission"))?;
    if !prepared {
        return Err(RestError::Conflict(format!(
            "Submission is already {}",
            submission.status()
        )));
    }

    Ok(HttpResponse::Ok().json(SubmissionDetail::from(submission)))
}

#[tracing::instrument(name = "Show a submission", skip(pool))]
#[get("/submissions/{id}")]
async fn show_submission(
    _admin: Administrator,
    id: web::Path<Uuid>,
    pool: web::Data<SqlitePool>,
) -> RestResult<impl Responder> {
    let submission = SubmissionRepo::fetch_by_id(pool.get_ref(), *id)
        .await?
        .ok_or(Error::NotFound("Submission"))?;

    Ok(HttpResponse::Ok().json(SubmissionDetail::from(submission)))
}

/// Administration endpoints, every one requires an administrator
pub fn scope() -> impl HttpServiceFactory {
    web::scope("/admin")
        .service(create_newsletter)
        .service(create_message)
        .service(add_article)
        .service(add_attachment)
        .service(create_submission)
        .service(prepare_submission)
        .service(show_submission)
}
