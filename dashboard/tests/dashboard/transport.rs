use payloads::{Category, ClientError, FormData, ImageFile, ListQuery, Request};
use reqwest::StatusCode;
use serde_json::json;
use test_helpers::fixtures::alice_credentials;
use test_helpers::{assert_status_code, spawn_app};

#[tokio::test]
async fn expired_token_is_refreshed_and_retried_once() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    app.seed_categories(&["Cine"])?;
    let old_token = app.dashboard.session.token().unwrap();

    app.backend.expire_next_tokens(1);
    let mut refreshed = None;
    let request = Request::get("categories").token(Some(old_token.clone()));
    let envelope = app
        .dashboard
        .client
        .crud::<Vec<Category>>(&request, |token: &str| refreshed = Some(token.to_string()))
        .await?;

    assert_eq!(envelope.data.len(), 1);
    assert_eq!(app.backend.hit_count("GET", "/categories"), 2);
    assert_eq!(app.backend.hit_count("POST", "/auth/refresh"), 1);

    let refreshed = refreshed.unwrap();
    assert_ne!(refreshed, old_token);
    assert!(app.backend.is_valid_token(&refreshed));
    let retry = app.backend.last_hit("GET", "/categories").unwrap();
    assert_eq!(retry.bearer, Some(refreshed));
    Ok(())
}

#[tokio::test]
async fn second_expiry_is_returned_to_caller() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    let token = app.dashboard.session.token();

    app.backend.expire_next_tokens(2);
    let request = Request::get("categories").token(token);
    let result = app
        .dashboard
        .client
        .crud::<Vec<Category>>(&request, |_| {})
        .await;

    let error = result.unwrap_err();
    assert!(error.is_token_expired());
    assert_eq!(app.backend.hit_count("GET", "/categories"), 2);
    assert_eq!(app.backend.hit_count("POST", "/auth/refresh"), 1);
    Ok(())
}

#[tokio::test]
async fn anonymous_requests_are_not_refreshed() -> anyhow::Result<()> {
    let app = spawn_app().await;

    app.backend.fail_next(401, "jwt expired");
    let result = app
        .dashboard
        .client
        .crud::<Vec<Category>>(&Request::get("categories"), |_| {})
        .await;

    assert_status_code(result, StatusCode::UNAUTHORIZED);
    assert_eq!(app.backend.hit_count("POST", "/auth/refresh"), 0);
    Ok(())
}

#[tokio::test]
async fn errors_carry_the_server_message() -> anyhow::Result<()> {
    let app = spawn_app().await;

    app.backend.fail_next(500, "Algo salió mal");
    let error = app
        .dashboard
        .client
        .crud::<Vec<Category>>(&Request::get("categories"), |_| {})
        .await
        .unwrap_err();

    assert_eq!(error.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    assert_eq!(error.to_string(), "Algo salió mal");
    Ok(())
}

#[tokio::test]
async fn list_queries_use_bracket_notation() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.seed_categories(&["Cine", "Cine club", "Teatro"])?;

    let query = ListQuery::new()
        .filters(json!({ "name": "cine", "active": "all", "empty": "" }))
        .limit(20)
        .sort("-name");
    let envelope = app
        .dashboard
        .client
        .crud::<Vec<Category>>(&Request::get("categories").query(query), |_| {})
        .await?;

    assert_eq!(envelope.meta.count, 2);
    assert_eq!(envelope.data[0].name, "Cine club");

    let hit = app.backend.last_hit("GET", "/categories").unwrap();
    assert!(hit.query.contains("limit=20"));
    assert!(hit.query.contains("filters%5Bname%5D=cine"));
    assert!(hit.query.contains("sort=-name"));
    assert!(!hit.query.contains("skip"));
    assert!(!hit.query.contains("active"));
    assert!(!hit.query.contains("empty"));
    Ok(())
}

#[tokio::test]
async fn wrong_password_is_unauthorized() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_user();

    let mut credentials = alice_credentials();
    credentials.password = "wrong".to_string().into();
    let result = app.dashboard.client.login(&credentials).await;
    assert_status_code(result, StatusCode::UNAUTHORIZED);

    let envelope = app.dashboard.client.login(&alice_credentials()).await?;
    assert!(app.backend.is_valid_token(&envelope.data));
    Ok(())
}

#[tokio::test]
async fn unreadable_bodies_are_decode_errors() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.seed_categories(&["Cine"])?;

    // the count endpoint answers with a number, not a list
    let error = app
        .dashboard
        .client
        .crud::<Vec<Category>>(&Request::get("categories/count"), |_| {})
        .await
        .unwrap_err();

    assert!(matches!(error, ClientError::Decode(_)));
    assert_eq!(error.status(), None);
    assert!(!error.is_unauthorized());
    Ok(())
}

#[tokio::test]
async fn uploads_must_be_an_image_field() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    let token = app.dashboard.session.token();
    let flyer = ImageFile {
        file_name: "flyer.png".into(),
        mime: "image/png".into(),
        bytes: vec![0x89, b'P', b'N', b'G'],
    };

    let misnamed = Request::upload("upload/image", FormData::new().file("file", flyer.clone()))
        .token(token.clone());
    let result = app.dashboard.client.crud::<String>(&misnamed, |_| {}).await;
    assert_status_code(result, StatusCode::BAD_REQUEST);

    let text = ImageFile {
        file_name: "notas.txt".into(),
        mime: "text/plain".into(),
        ..flyer.clone()
    };
    let not_an_image =
        Request::upload("upload/image", FormData::new().file("image", text)).token(token.clone());
    let result = app.dashboard.client.crud::<String>(&not_an_image, |_| {}).await;
    assert_status_code(result, StatusCode::BAD_REQUEST);
    assert!(app.backend.uploads().is_empty());

    let url = app.dashboard.client.upload_image(&flyer, token, |_| {}).await?;
    assert_eq!(app.backend.uploads(), vec![url]);
    Ok(())
}
