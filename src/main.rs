use std::net::TcpListener;

use anyhow::Context;

use sqlx::sqlite::SqlitePoolOptions;

use newsletter::client::EmailClient;
use newsletter::delivery::{self, Delivery};
use newsletter::settings::Settings;
use newsletter::templates::TemplateStore;
use newsletter::{app, repo, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = telemetry::create_subscriber("info".into(), std::io::stdout);
    telemetry::set_subscriber(subscriber)?;

    let settings = Settings::load()?;

    let pool = SqlitePoolOptions::new()
        .connect_with(settings.database.options())
        .await
        .context("Failed to open database")?;
    repo::migrate(&pool).await.context("Failed to migrate database")?;

    let email_client = EmailClient::new(
        settings.email.api_timeout(),
        settings.email.api_base_url()?,
        settings.email.api_auth_token().into(),
    )?;

    let delivery = Delivery::new(
        pool.clone(),
        email_client,
        TemplateStore::new(&settings.storage.templates_dir),
        &settings.storage.media_root,
        settings.app.base_url()?,
        settings.delivery.pacing(),
    );

    let listener = TcpListener::bind(settings.app.addr()).context("Failed to bind listener")?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    let server = app::run(listener, pool, delivery.clone())?;
    let worker = delivery::run_until_stopped(delivery, settings.delivery.poll_interval());

    tokio::select! {
        res = server => res.context("Failed to run app"),
        res = worker => res.context("Submission worker stopped"),
    }
}
