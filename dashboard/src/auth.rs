//! Login, signup, verification and logout.

use crate::session::{SessionError, SessionStore, SessionUser, decode_token};
use crate::toast::Toasts;
use payloads::requests::{LoginCredentials, Signup, Verify};
use payloads::{APIClient, ClientError};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("No se pudo leer la sesión: {0}")]
    Session(#[from] SessionError),
    #[error("No has iniciado sesión")]
    NotLoggedIn,
}

#[derive(Debug, Clone)]
pub struct Auth {
    client: APIClient,
    session: SessionStore,
    toasts: Toasts,
}

impl Auth {
    pub fn new(client: APIClient, session: SessionStore, toasts: Toasts) -> Self {
        Self {
            client,
            session,
            toasts,
        }
    }

    pub fn user(&self) -> Option<SessionUser> {
        self.session.user()
    }

    /// Toast a failure before handing it back.
    fn notify<T>(&self, result: Result<T, AuthError>) -> Result<T, AuthError> {
        if let Err(e) = &result {
            self.toasts.error(e.to_string());
        }
        result
    }

    #[tracing::instrument(skip_all, fields(username = %credentials.username))]
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<SessionUser, AuthError> {
        let result = self.try_login(credentials).await;
        self.notify(result)
    }

    async fn try_login(&self, credentials: &LoginCredentials) -> Result<SessionUser, AuthError> {
        let envelope = self.client.login(credentials).await?;
        let user = decode_token(&envelope.data)?;
        self.session.set_user(Some(user.clone()));
        tracing::info!(username = %user.username, "Logged in");
        Ok(user)
    }

    /// Create an account. The new user is signed in but unverified until
    /// the emailed code is entered.
    #[tracing::instrument(skip_all, fields(username = %details.username))]
    pub async fn signup(&self, details: &Signup) -> Result<SessionUser, AuthError> {
        let result = self.try_signup(details).await;
        self.notify(result)
    }

    async fn try_signup(&self, details: &Signup) -> Result<SessionUser, AuthError> {
        let envelope = self.client.signup(details).await?;
        let mut user = SessionUser::from(envelope.data);
        user.verified = false;
        self.session.set_user(Some(user.clone()));
        self.toasts.success(
            "Te has registrado correctamente, se envió un código de verificación a tu correo",
        );
        Ok(user)
    }

    #[tracing::instrument(skip_all)]
    pub async fn verify(&self, code: &str) -> Result<SessionUser, AuthError> {
        let result = self.try_verify(code).await;
        self.notify(result)
    }

    async fn try_verify(&self, code: &str) -> Result<SessionUser, AuthError> {
        let current = self.session.user().ok_or(AuthError::NotLoggedIn)?;
        let details = Verify {
            code: code.trim().to_string(),
            user_id: current.id,
        };
        let envelope = self.client.verify(&details).await?;
        let mut user = decode_token(&envelope.data)?;
        user.verified = true;
        self.session.set_user(Some(user.clone()));
        self.toasts.success("Has verificado tu cuenta correctamente");
        Ok(user)
    }

    pub async fn resend_verification(&self) -> Result<(), AuthError> {
        let result = self.try_resend().await;
        self.notify(result)
    }

    async fn try_resend(&self) -> Result<(), AuthError> {
        let current = self.session.user().ok_or(AuthError::NotLoggedIn)?;
        self.client.resend_verification(&current.id).await?;
        self.toasts
            .success("Se ha enviado un nuevo código de verificación a tu correo");
        Ok(())
    }

    /// Local only; the backend keeps no session to end.
    pub fn logout(&self) -> bool {
        self.session.logout()
    }
}
