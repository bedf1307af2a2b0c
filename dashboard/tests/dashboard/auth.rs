use dashboard::{Access, AuthError, AuthState, ToastType};
use payloads::Role;
use payloads::requests::{LoginCredentials, Signup};
use test_helpers::spawn_app;

fn carla() -> Signup {
    Signup {
        name: "Carla".into(),
        last_name: "Cota".into(),
        username: "carla".into(),
        email: "carla@example.com".into(),
        password: "carla-password".into(),
    }
}

#[tokio::test]
async fn login_persists_session() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let user = app.login_alice().await?;

    assert_eq!(user.username, "alice");
    assert_eq!(user.role, Role::Super);
    assert_eq!(app.dashboard.session.state(), AuthState::Verified);

    let restarted = app.restart_dashboard();
    assert_eq!(restarted.session.access(), Access::Granted);
    assert_eq!(restarted.session.token(), app.dashboard.session.token());
    Ok(())
}

#[tokio::test]
async fn failed_login_shows_error() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.create_alice_user();

    let result = app
        .dashboard
        .auth()
        .login(&LoginCredentials::new("alice", "wrong"))
        .await;

    assert!(matches!(result, Err(AuthError::Client(_))));
    let toast = app.dashboard.toasts.last().unwrap();
    assert_eq!(toast.toast_type, ToastType::Error);
    assert_eq!(toast.message, "Usuario o contraseña incorrectos");
    assert_eq!(app.dashboard.session.access(), Access::Login);
    Ok(())
}

#[tokio::test]
async fn signup_then_verify() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let auth = app.dashboard.auth();

    let user = auth.signup(&carla()).await?;
    assert!(!user.verified);
    assert_eq!(user.token, None);
    assert_eq!(app.dashboard.session.access(), Access::Verify);
    assert_eq!(
        app.dashboard.toasts.last().unwrap().message,
        "Te has registrado correctamente, se envió un código de verificación a tu correo"
    );

    // a wrong code leaves the account unverified
    assert!(auth.verify("not-the-code").await.is_err());
    assert_eq!(app.dashboard.session.state(), AuthState::Unverified);

    let code = app.backend.verification_code(&user.id.0).unwrap();
    let verified = auth.verify(&code).await?;
    assert!(verified.verified);
    assert!(verified.token.is_some());
    assert_eq!(app.dashboard.session.access(), Access::Granted);
    assert_eq!(
        app.dashboard.toasts.last().unwrap().message,
        "Has verificado tu cuenta correctamente"
    );
    Ok(())
}

#[tokio::test]
async fn resend_verification_issues_new_code() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let auth = app.dashboard.auth();
    let user = auth.signup(&carla()).await?;

    auth.resend_verification().await?;

    assert_eq!(app.backend.hit_count("POST", "/auth/resend-verification"), 1);
    assert!(app.backend.verification_code(&user.id.0).is_some());
    assert_eq!(
        app.dashboard.toasts.last().unwrap().message,
        "Se ha enviado un nuevo código de verificación a tu correo"
    );
    Ok(())
}

#[tokio::test]
async fn verify_requires_a_session() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let result = app.dashboard.auth().verify("123456").await;

    assert!(matches!(result, Err(AuthError::NotLoggedIn)));
    assert!(app.backend.hits().is_empty());
    Ok(())
}

#[tokio::test]
async fn logout_is_local() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    let requests_before = app.backend.hits().len();

    assert!(app.dashboard.logout());

    assert_eq!(app.dashboard.session.access(), Access::Login);
    assert_eq!(app.storage.clear_count(), 1);
    assert_eq!(app.storage.raw(), None);
    assert_eq!(app.backend.hits().len(), requests_before);

    // logging out twice is harmless
    assert!(!app.dashboard.logout());
    Ok(())
}
