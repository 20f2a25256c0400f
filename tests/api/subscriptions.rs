use std::time::Duration;

use reqwest::StatusCode;

use serde_json::{json, Value};

use wiremock::matchers::*;
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::{extract_email_link, SubscribeForm, TestApp};

async fn mock_email_api(app: &TestApp) {
    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&app.email_server)
        .await;
}

/// Subscribe and follow the activation link of the email
async fn subscribe_and_activate(app: &TestApp, slug: &str, email: &str) -> Value {
    let res = app
        .subscribe(slug, &SubscribeForm::new("Reader", email))
        .await
        .expect("Failed to execute request");
    assert_eq!(StatusCode::OK, res.status());

    let emails = app.sent_emails().await;
    let link = extract_email_link(emails.last().unwrap()["TextBody"].as_str().unwrap());

    let res = reqwest::get(link).await.expect("Failed to follow activation link");
    assert_eq!(StatusCode::OK, res.status());

    res.json().await.unwrap()
}

#[tokio::test]
async fn subscribe_sends_an_activation_email() {
    let app = TestApp::spawn().await;
    app.create_newsletter("weekly", json!({})).await;

    Mock::given(path("/email"))
        .and(method("POST"))
        .and(header("X-Postmark-Server-Token", "TestAuthorization"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let res = app
        .subscribe("weekly", &SubscribeForm::new("Reader", "reader@test.com"))
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::OK, res.status());

    let email = &app.sent_emails().await[0];
    assert_eq!("Reader <reader@test.com>", email["To"]);
    assert_eq!("The Team <news@test.com>", email["From"]);
    assert_eq!("Confirm your subscription to weekly newsletter", email["Subject"]);

    let (name, ip, subscribed): (Option<String>, Option<String>, bool) =
        sqlx::query_as("select name, ip, subscribed from subscriptions where email = ?")
            .bind("reader@test.com")
            .fetch_one(&app.pool)
            .await
            .expect("Failed to fetch inserted row");

    assert_eq!(Some("Reader".to_string()), name);
    assert_eq!(Some("127.0.0.1".to_string()), ip);
    assert!(!subscribed);
}

#[tokio::test]
async fn subscribe_returns_bad_request_for_invalid_data() {
    let app = TestApp::spawn().await;
    app.create_newsletter("weekly", json!({})).await;

    let test_cases = vec![
        ("missing email", SubscribeForm { name: Some("Reader".into()), email: None }),
        ("invalid email", SubscribeForm::new("Reader", "not-an-email")),
        ("invalid name", SubscribeForm::new("<Reader>", "reader@test.com")),
    ];

    for (description, form) in test_cases {
        let res = app
            .subscribe("weekly", &form)
            .await
            .expect("Failed to execute request");

        assert_eq!(
            StatusCode::BAD_REQUEST,
            res.status(),
            "API did not fail with 400 Bad Request when payload was {}",
            description
        );
    }
}

#[tokio::test]
async fn subscribe_to_unknown_or_hidden_newsletter_is_not_found() {
    let app = TestApp::spawn().await;
    app.create_newsletter("hidden", json!({ "visible": false })).await;

    for slug in ["unknown", "hidden"] {
        let res = app
            .subscribe(slug, &SubscribeForm::new("Reader", "reader@test.com"))
            .await
            .expect("Failed to execute request");

        assert_eq!(StatusCode::NOT_FOUND, res.status());
    }
}

#[tokio::test]
async fn subscribe_is_consistent_if_email_send_fails() {
    let app = TestApp::spawn().await;
    app.create_newsletter("weekly", json!({})).await;

    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let res = app
        .subscribe("weekly", &SubscribeForm::new("Reader", "reader@test.com"))
        .await
        .expect("Failed to execute request");

    assert!(res.status().is_server_error());

    let count: i64 = sqlx::query_scalar("select count(*) from subscriptions")
        .fetch_one(&app.pool)
        .await
        .expect("Failed to count rows");

    assert_eq!(0, count);
}

#[tokio::test]
async fn activation_link_confirms_the_subscription() {
    let app = TestApp::spawn().await;
    app.create_newsletter("weekly", json!({})).await;
    mock_email_api(&app).await;

    let flags = subscribe_and_activate(&app, "weekly", "reader@test.com").await;

    assert_eq!(json!({ "subscribed": true, "unsubscribed": false }), flags);

    let subscribe_date: Option<String> =
        sqlx::query_scalar("select subscribe_date from subscriptions where email = ?")
            .bind("reader@test.com")
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert!(subscribe_date.is_some());
}

#[tokio::test]
async fn wrong_activation_code_is_unauthorized() {
    let app = TestApp::spawn().await;
    app.create_newsletter("weekly", json!({})).await;
    mock_email_api(&app).await;

    app.subscribe("weekly", &SubscribeForm::new("Reader", "reader@test.com"))
        .await
        .expect("Failed to execute request");

    let res = app
        .request(
            reqwest::Method::GET,
            "newsletters/weekly/subscription/reader@test.com/subscribe/activate/not-the-code",
        )
        .send()
        .await
        .unwrap();

    assert_eq!(StatusCode::UNAUTHORIZED, res.status());
}

#[tokio::test]
async fn activation_rejects_unknown_actions() {
    let app = TestApp::spawn().await;
    app.create_newsletter("weekly", json!({})).await;

    for action in ["message", "delete"] {
        let res = app
            .request(
                reqwest::Method::GET,
                &format!("newsletters/weekly/subscription/reader@test.com/{}/activate/code", action),
            )
            .send()
            .await
            .unwrap();

        assert_eq!(StatusCode::BAD_REQUEST, res.status());
    }
}

#[tokio::test]
async fn subscribing_twice_conflicts() {
    let app = TestApp::spawn().await;
    app.create_newsletter("weekly", json!({})).await;
    mock_email_api(&app).await;

    subscribe_and_activate(&app, "weekly", "reader@test.com").await;

    let res = app
        .subscribe("weekly", &SubscribeForm::new("Reader", "reader@test.com"))
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::CONFLICT, res.status());
}

#[tokio::test]
async fn pending_subscription_is_reused() {
    let app = TestApp::spawn().await;
    app.create_newsletter("weekly", json!({})).await;
    mock_email_api(&app).await;

    for _ in 0..2 {
        let res = app
            .subscribe("weekly", &SubscribeForm::new("Reader", "reader@test.com"))
            .await
            .expect("Failed to execute request");
        assert_eq!(StatusCode::OK, res.status());
    }

    let count: i64 = sqlx::query_scalar("select count(*) from subscriptions")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(1, count);
    assert_eq!(2, app.sent_emails().await.len());
}

#[tokio::test]
async fn unsubscribe_unknown_subscription_is_not_found() {
    let app = TestApp::spawn().await;
    app.create_newsletter("weekly", json!({})).await;

    let res = app
        .unsubscribe("weekly", "nobody@test.com")
        .await
        .expect("Failed to execute request");

    assert_eq!(StatusCode::NOT_FOUND, res.status());
}

#[tokio::test]
async fn unsubscribe_link_ends_the_subscription() {
    let app = TestApp::spawn().await;
    app.create_newsletter("weekly", json!({})).await;
    mock_email_api(&app).await;
    subscribe_and_activate(&app, "weekly", "reader@test.com").await;

    let res = app
        .unsubscribe("weekly", "reader@test.com")
        .await
        .expect("Failed to execute request");
    assert_eq!(StatusCode::OK, res.status());

    let emails = app.sent_emails().await;
    let email = emails.last().unwrap();
    assert_eq!("Confirm you want to leave weekly newsletter", email["Subject"]);

    let link = extract_email_link(email["TextBody"].as_str().unwrap());
    assert!(link.contains("/unsubscribe/activate/"));

    let flags: Value = reqwest::get(link).await.unwrap().json().await.unwrap();
    assert_eq!(json!({ "subscribed": false, "unsubscribed": true }), flags);
}

#[tokio::test]
async fn hidden_newsletter_subscribers_can_still_unsubscribe() {
    let app = TestApp::spawn().await;
    app.create_newsletter("weekly", json!({})).await;
    mock_email_api(&app).await;
    subscribe_and_activate(&app, "weekly", "reader@test.com").await;

    sqlx::query("update newsletters set visible = 0 where slug = ?")
        .bind("weekly")
        .execute(&app.pool)
        .await
        .unwrap();

    let res = app
        .unsubscribe("weekly", "reader@test.com")
        .await
        .expect("Failed to execute request");
    assert_eq!(StatusCode::OK, res.status());

    let emails = app.sent_emails().await;
    let link = extract_email_link(emails.last().unwrap()["TextBody"].as_str().unwrap());
    let res = reqwest::get(link).await.unwrap();
    assert_eq!(StatusCode::OK, res.status());

    let flags: Value = res.json().await.unwrap();
    assert_eq!(json!({ "subscribed": false, "unsubscribed": true }), flags);
}

#[tokio::test]
async fn database_is_usable_while_activation_email_is_sent() {
    let app = TestApp::spawn().await;
    app.create_newsletter("weekly", json!({})).await;

    Mock::given(path("/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(1)))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let form = SubscribeForm::new("Reader", "reader@test.com");
    let subscribe = app.subscribe("weekly", &form);
    let write = async {
        // The subscription is stored by now and the email still in flight
        tokio::time::sleep(Duration::from_millis(200)).await;
        tokio::time::timeout(
            Duration::from_millis(500),
            sqlx::query("update newsletters set title = title").execute(&app.pool),
        )
        .await
    };

    let (res, write) = tokio::join!(subscribe, write);

    assert_eq!(StatusCode::OK, res.expect("Failed to execute request").status());
    let write = write.expect("Database was locked while the email was sent");
    assert!(write.is_ok());
}
