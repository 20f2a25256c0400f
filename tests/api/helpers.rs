use std::net::TcpListener;
use std::time::Duration;

use reqwest::{Client, Method, Response};

use secrecy::Secret;

use serde::Serialize;
use serde_json::{json, Value};

use sqlx::SqlitePool;

use url::Url;

use uuid::Uuid;

use wiremock::MockServer;

use newsletter::app;
use newsletter::client::EmailClient;
use newsletter::delivery::{Delivery, Pacing};
use newsletter::model::NewUser;
use newsletter::repo::{self, UsersRepo};
use newsletter::templates::TemplateStore;

#[derive(Debug, Serialize)]
pub struct SubscribeForm {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl SubscribeForm {
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            name: Some(name.into()),
            email: Some(email.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

pub struct TestApp {
    pub addr: String,

    pub pool: SqlitePool,
    pub client: Client,
    pub email_server: MockServer,
    pub delivery: Delivery,
    pub admin: TestUser,

    pub media_root: tempfile::TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let pool = repo::connect_in_memory()
            .await
            .expect("Failed to open in-memory database");
        repo::migrate(&pool).await.expect("Failed to migrate database");

        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to listen on random port");
        let port = listener.local_addr().unwrap().port();

        let addr = format!("http://127.0.0.1:{}", port);

        let email_server = MockServer::start().await;

        let email_client = {
            let api_base_url =
                Url::parse(&email_server.uri()).expect("Failed to parse mock server uri");
            let api_auth_token = Secret::new("TestAuthorization".to_string());
            let api_timeout = Duration::from_secs(2);

            EmailClient::new(api_timeout, api_base_url, api_auth_token.into())
                .expect("Failed to create email client")
        };

        let media_root = tempfile::tempdir().expect("Failed to create media root");

        let delivery = Delivery::new(
            pool.clone(),
            email_client,
            TemplateStore::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates")),
            media_root.path(),
            Url::parse(&addr).expect("Failed to parse app address"),
            Pacing::default(),
        );

        let server = app::run(listener, pool.clone(), delivery.clone())
            .expect("Failed to spawn app instance");
        let _ = tokio::spawn(server);

        let admin = TestUser::register(&pool, "admin@test.com", "admin-password", true).await;

        Self {
            addr,
            pool,
            client: Client::new(),
            email_server,
            delivery,
            admin,
            media_root,
        }
    }

    pub fn request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}", &self.addr, url);
        self.client.request(method, url)
    }

    pub fn authorized_request(
        &self,
        method: Method,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> reqwest::RequestBuilder {
        let req = self.request(method, url);
        if let Some(creds) = credentials {
            req.basic_auth(creds.username.clone(), Some(creds.password.clone()))
        } else {
            req
        }
    }

    /// Request made with the credentials of the test administrator
    pub fn admin_request(&self, method: Method, url: &str) -> reqwest::RequestBuilder {
        self.authorized_request(method, url, Some(&self.admin.credentials()))
    }

    pub async fn health_check(&self) -> reqwest::Result<Response> {
        self.request(Method::GET, "health_check").send().await
    }

    pub async fn subscribe(&self, slug: &str, form: &SubscribeForm) -> reqwest::Result<Response> {
        self.request(Method::POST, &format!("newsletters/{}/subscribe", slug))
            .form(form)
            .send()
            .await
    }

    pub async fn unsubscribe(&self, slug: &str, email: &str) -> reqwest::Result<Response> {
        self.request(Method::POST, &format!("newsletters/{}/unsubscribe", slug))
            .form(&[("email", email)])
            .send()
            .await
    }

    /// Create a newsletter through the admin API, the body is merged over
    /// valid defaults
    pub async fn create_newsletter(&self, slug: &str, overrides: Value) -> Value {
        let mut body = json!({
            "title": format!("{} newsletter", slug),
            "slug": slug,
            "email": "news@test.com",
            "sender": "The Team",
        });
        if let (Some(body), Some(overrides)) = (body.as_object_mut(), overrides.as_object()) {
            body.extend(overrides.clone());
        }

        let res = self
            .admin_request(Method::POST, "admin/newsletters")
            .json(&body)
            .send()
            .await
            .expect("Failed to create newsletter");
        assert_eq!(201, res.status().as_u16());

        res.json().await.expect("Failed to parse newsletter")
    }

    pub async fn create_message(&self, newsletter: &str, body: &Value) -> reqwest::Result<Response> {
        self.admin_request(Method::POST, &format!("admin/newsletters/{}/messages", newsletter))
            .json(body)
            .send()
            .await
    }

    pub async fn create_submission(&self, message_id: &str, body: &Value) -> reqwest::Result<Response> {
        self.admin_request(Method::POST, &format!("admin/messages/{}/submissions", message_id))
            .json(body)
            .send()
            .await
    }

    pub async fn prepare_submission(&self, submission_id: &str) -> reqwest::Result<Response> {
        self.admin_request(Method::POST, &format!("admin/submissions/{}/prepare", submission_id))
            .send()
            .await
    }

    pub async fn show_submission(&self, submission_id: &str) -> reqwest::Result<Response> {
        self.admin_request(Method::GET, &format!("admin/submissions/{}", submission_id))
            .send()
            .await
    }

    /// JSON bodies of the emails sent so far
    pub async fn sent_emails(&self) -> Vec<Value> {
        self.email_server
            .received_requests()
            .await
            .expect("Request recording disabled")
            .iter()
            .map(|req| serde_json::from_slice(&req.body).expect("Failed to parse email request"))
            .collect()
    }
}

/// Extract the single link of an email body
pub fn extract_email_link(body: &str) -> String {
    let links: Vec<_> = linkify::LinkFinder::new()
        .links(body)
        .filter(|l| *l.kind() == linkify::LinkKind::Url)
        .collect();
    assert_eq!(1, links.len());
    links[0].as_str().to_string()
}

#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub password: String,
}

impl TestUser {
    pub async fn register(pool: &SqlitePool, email: &str, password: &str, is_admin: bool) -> Self {
        use argon2::password_hash::SaltString;
        use argon2::{Argon2, PasswordHasher};

        let salt = SaltString::generate(&mut rand::thread_rng());

        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .expect("Failed to hash user password")
            .to_string();

        let new_user = NewUser {
            email: email.parse().expect("Failed to parse email address"),
            full_name: None,
            password_hash,
            is_admin,
        };

        let id = UsersRepo::insert(pool, &new_user)
            .await
            .expect("Failed to insert test user");

        Self {
            id,
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.email.clone(),
            password: self.password.clone(),
        }
    }
}
