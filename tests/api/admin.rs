use reqwest::{Method, StatusCode};

use serde_json::{json, Value};

use crate::helpers::{Credentials, TestApp, TestUser};

#[tokio::test]
async fn admin_endpoints_require_administrator_credentials() {
    let app = TestApp::spawn().await;
    let reader = TestUser::register(&app.pool, "reader@test.com", "reader-password", false).await;

    let test_cases = vec![
        ("no credentials", None),
        (
            "wrong password",
            Some(Credentials {
                username: app.admin.email.clone(),
                password: "wrong".into(),
            }),
        ),
        (
            "unknown user",
            Some(Credentials {
                username: "nobody@test.com".into(),
                password: "admin-password".into(),
            }),
        ),
        ("not an administrator", Some(reader.credentials())),
    ];

    for (description, credentials) in test_cases {
        let res = app
            .authorized_request(Method::POST, "admin/newsletters", credentials.as_ref())
            .json(&json!({
                "title": "Weekly",
                "slug": "weekly",
                "email": "news@test.com",
                "sender": "The Team",
            }))
            .send()
            .await
            .expect("Failed to execute request");

        assert_eq!(
            StatusCode::UNAUTHORIZED,
            res.status(),
            "API did not fail with 401 Unauthorized for {}",
            description
        );
    }
}

#[tokio::test]
async fn duplicate_newsletter_slug_conflicts() {
    let app = TestApp::spawn().await;
    let newsletter = app.create_newsletter("weekly", json!({ "sites": ["news.test.com"] })).await;

    assert_eq!("weekly", newsletter["slug"]);
    assert_eq!(true, newsletter["visible"]);

    let res = app
        .admin_request(Method::POST, "admin/newsletters")
        .json(&json!({
            "title": "Other",
            "slug": "weekly",
            "email": "other@test.com",
            "sender": "Other",
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(StatusCode::CONFLICT, res.status());
}

#[tokio::test]
async fn invalid_newsletter_is_rejected() {
    let app = TestApp::spawn().await;

    for (description, slug, email) in [
        ("invalid slug", "Not A Slug", "news@test.com"),
        ("invalid email", "weekly", "news"),
    ] {
        let res = app
            .admin_request(Method::POST, "admin/newsletters")
            .json(&json!({ "title": "Weekly", "slug": slug, "email": email, "sender": "Team" }))
            .send()
            .await
            .unwrap();

        assert_eq!(StatusCode::BAD_REQUEST, res.status(), "{}", description);
    }
}

#[tokio::test]
async fn articles_are_appended_in_steps_of_ten() {
    let app = TestApp::spawn().await;
    app.create_newsletter("weekly", json!({})).await;

    let res = app
        .create_message(
            "weekly",
            &json!({
                "title": "First issue",
                "slug": "first-issue",
                "articles": [
                    { "title": "One", "text": "First" },
                    { "title": "Two", "text": "Second", "url": "https://test.com/two" },
                ],
            }),
        )
        .await
        .unwrap();
    assert_eq!(StatusCode::CREATED, res.status());

    let message: Value = res.json().await.unwrap();
    let sortorders: Vec<i64> = message["articles"]
        .as_array()
        .unwrap()
        .iter()
        .map(|article| article["sortorder"].as_i64().unwrap())
        .collect();
    assert_eq!(vec![10, 20], sortorders);

    let res = app
        .admin_request(
            Method::POST,
            &format!("admin/messages/{}/articles", message["id"].as_str().unwrap()),
        )
        .json(&json!({ "title": "Three", "text": "Third" }))
        .send()
        .await
        .unwrap();
    assert_eq!(StatusCode::CREATED, res.status());

    let article: Value = res.json().await.unwrap();
    assert_eq!(30, article["sortorder"]);
}

#[tokio::test]
async fn message_slug_is_unique_per_newsletter() {
    let app = TestApp::spawn().await;
    app.create_newsletter("weekly", json!({})).await;
    app.create_newsletter("monthly", json!({})).await;
    let body = json!({ "title": "Issue", "slug": "issue" });

    assert_eq!(StatusCode::CREATED, app.create_message("weekly", &body).await.unwrap().status());
    assert_eq!(StatusCode::CREATED, app.create_message("monthly", &body).await.unwrap().status());
    assert_eq!(StatusCode::CONFLICT, app.create_message("weekly", &body).await.unwrap().status());
    assert_eq!(StatusCode::NOT_FOUND, app.create_message("yearly", &body).await.unwrap().status());
}

#[tokio::test]
async fn attachments_are_stored_under_the_media_root() {
    let app = TestApp::spawn().await;
    app.create_newsletter("weekly", json!({})).await;
    let message: Value = app
        .create_message("weekly", &json!({ "title": "Issue", "slug": "issue" }))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let url = format!("admin/messages/{}/attachments", message["id"].as_str().unwrap());

    let res = app
        .admin_request(Method::POST, &url)
        .json(&json!({ "file_name": "notes.txt", "content_type": "text/plain", "content": "aGVsbG8=" }))
        .send()
        .await
        .unwrap();
    assert_eq!(StatusCode::CREATED, res.status());

    let attachment: Value = res.json().await.unwrap();
    let file = attachment["file"].as_str().unwrap();
    assert!(file.starts_with("newsletter/attachments/"));
    assert!(file.ends_with(&format!("/{}/notes.txt", message["id"].as_str().unwrap())));
    assert_eq!("hello", std::fs::read_to_string(app.media_root.path().join(file)).unwrap());

    let test_cases = vec![
        ("path in file name", json!({ "file_name": "../notes.txt", "content_type": "text/plain", "content": "aGVsbG8=" })),
        ("invalid content type", json!({ "file_name": "notes.txt", "content_type": "text", "content": "aGVsbG8=" })),
        ("invalid content", json!({ "file_name": "notes.txt", "content_type": "text/plain", "content": "###" })),
    ];
    for (description, body) in test_cases {
        let res = app.admin_request(Method::POST, &url).json(&body).send().await.unwrap();
        assert_eq!(StatusCode::BAD_REQUEST, res.status(), "{}", description);
    }
}

#[tokio::test]
async fn submissions_are_prepared_once() {
    let app = TestApp::spawn().await;
    app.create_newsletter("weekly", json!({})).await;
    let message: Value = app
        .create_message("weekly", &json!({ "title": "Issue", "slug": "issue" }))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let res = app
        .create_submission(message["id"].as_str().unwrap(), &json!({ "publish": false }))
        .await
        .unwrap();
    assert_eq!(StatusCode::CREATED, res.status());
    let submission: Value = res.json().await.unwrap();
    let id = submission["id"].as_str().unwrap();
    assert_eq!("pending", submission["status"]);
    assert_eq!(false, submission["publish"]);
    assert_eq!(message["newsletter_id"], submission["newsletter_id"]);

    let res = app.prepare_submission(id).await.unwrap();
    assert_eq!(StatusCode::OK, res.status());
    assert_eq!("prepared", res.json::<Value>().await.unwrap()["status"]);

    let res = app.prepare_submission(id).await.unwrap();
    assert_eq!(StatusCode::CONFLICT, res.status());

    let res = app.show_submission(id).await.unwrap();
    assert_eq!("prepared", res.json::<Value>().await.unwrap()["status"]);

    let res = app.prepare_submission(&uuid::Uuid::new_v4().to_string()).await.unwrap();
    assert_eq!(StatusCode::NOT_FOUND, res.status());
}
