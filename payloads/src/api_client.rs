use crate::{
    query::ListQuery,
    requests,
    responses::{Envelope, ErrorBody},
    User, UserId,
};
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use secrecy::ExposeSecret;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

/// Server messages that mean the bearer token is stale but refreshable.
const TOKEN_EXPIRED_MESSAGES: [&str; 2] = ["jwt expired", "token expired"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// An image picked by the user, held in memory until uploaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageFile {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Multipart body. Kept as plain parts so a request can be sent twice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    parts: Vec<FormPart>,
}

#[derive(Debug, Clone, PartialEq)]
enum FormPart {
    Text { name: String, value: String },
    File { name: String, file: ImageFile },
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart::Text {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    pub fn file(mut self, name: impl Into<String>, file: ImageFile) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            file,
        });
        self
    }

    fn to_form(&self) -> Result<Form, reqwest::Error> {
        let mut form = Form::new();
        for part in &self.parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
                FormPart::File { name, file } => {
                    let part = Part::bytes(file.bytes.clone())
                        .file_name(file.file_name.clone())
                        .mime_str(&file.mime)?;
                    form.part(name.clone(), part)
                }
            };
        }
        Ok(form)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    /// Sent untouched, for file uploads.
    Form(FormData),
}

impl Payload {
    /// Serialize a body, dropping top-level fields that are null or empty
    /// strings so unset form fields don't overwrite server values.
    pub fn json(body: &impl Serialize) -> Result<Self, serde_json::Error> {
        Ok(Self::Json(strip_empty(serde_json::to_value(body)?)))
    }
}

fn strip_empty(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null() && v.as_str() != Some(""))
                .collect(),
        ),
        other => other,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestMeta {
    pub token: Option<String>,
    pub query: ListQuery,
}

/// A single call to the REST backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub endpoint: String,
    pub payload: Option<Payload>,
    pub meta: RequestMeta,
}

impl Request {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            payload: None,
            meta: RequestMeta::default(),
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Get, endpoint)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::Delete, endpoint)
    }

    pub fn post(
        endpoint: impl Into<String>,
        body: &impl Serialize,
    ) -> Result<Self, ClientError> {
        Ok(Self::new(Method::Post, endpoint).payload(Payload::json(body)?))
    }

    pub fn put(
        endpoint: impl Into<String>,
        body: &impl Serialize,
    ) -> Result<Self, ClientError> {
        Ok(Self::new(Method::Put, endpoint).payload(Payload::json(body)?))
    }

    pub fn upload(endpoint: impl Into<String>, form: FormData) -> Self {
        Self::new(Method::Post, endpoint).payload(Payload::Form(form))
    }

    pub fn payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn token(mut self, token: Option<String>) -> Self {
        self.meta.token = token;
        self
    }

    pub fn query(mut self, query: ListQuery) -> Self {
        self.meta.query = query;
        self
    }
}

/// An API client for interfacing with the backend.
#[derive(Debug, Clone)]
pub struct APIClient {
    pub address: String,
    pub inner_client: reqwest::Client,
}

/// Helper methods for http actions
impl APIClient {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            inner_client: reqwest::Client::new(),
        }
    }

    fn format_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.address.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    async fn send(
        &self,
        request: &Request,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ClientError> {
        let mut builder = self.inner_client.request(
            request.method.into(),
            self.format_url(&request.endpoint),
        );

        let pairs = request.meta.query.to_pairs();
        if !pairs.is_empty() {
            builder = builder.query(&pairs);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        builder = match &request.payload {
            Some(Payload::Json(body)) => builder.json(body),
            Some(Payload::Form(form)) => builder.multipart(form.to_form()?),
            None => builder,
        };

        Ok(builder.send().await?)
    }

    /// Perform a request, transparently refreshing an expired token.
    ///
    /// When the server rejects the bearer token as expired, a new token is
    /// requested, handed to `on_refresh` so the caller can store it, and the
    /// request is retried exactly once. The retry's outcome is returned
    /// whatever it is.
    #[tracing::instrument(
        skip(self, request, on_refresh),
        fields(method = ?request.method, endpoint = %request.endpoint)
    )]
    pub async fn crud<T: DeserializeOwned>(
        &self,
        request: &Request,
        on_refresh: impl FnOnce(&str),
    ) -> Result<Envelope<T>, ClientError> {
        let token = request.meta.token.as_deref();
        let response = self.send(request, token).await?;
        let result = ok_body(response).await;

        let Some(token) = token else {
            return result;
        };
        match result {
            Err(e) if e.is_token_expired() => {
                tracing::debug!("Token expired, refreshing before retry");
                let refreshed = self.refresh_token(token).await?;
                on_refresh(&refreshed);
                let response = self.send(request, Some(&refreshed)).await?;
                ok_body(response).await
            }
            other => other,
        }
    }
}

/// Methods on the backend API
impl APIClient {
    /// Exchange credentials for a token.
    #[tracing::instrument(skip_all, fields(username = %credentials.username))]
    pub async fn login(
        &self,
        credentials: &requests::LoginCredentials,
    ) -> Result<Envelope<String>, ClientError> {
        let response = self
            .inner_client
            .post(self.format_url("auth/login"))
            .basic_auth(
                &credentials.username,
                Some(credentials.password.expose_secret()),
            )
            .send()
            .await?;
        ok_body(response).await
    }

    /// Create an account. The account must be verified before use.
    pub async fn signup(
        &self,
        details: &requests::Signup,
    ) -> Result<Envelope<User>, ClientError> {
        let request = Request::post("auth/signup", details)?;
        self.crud(&request, |_| {}).await
    }

    /// Verify an account with the emailed code, returning a fresh token.
    pub async fn verify(
        &self,
        details: &requests::Verify,
    ) -> Result<Envelope<String>, ClientError> {
        let request = Request::post("auth/verify", details)?;
        self.crud(&request, |_| {}).await
    }

    pub async fn resend_verification(
        &self,
        user_id: &UserId,
    ) -> Result<Envelope<Value>, ClientError> {
        let details = requests::ResendVerification {
            id: user_id.clone(),
        };
        let request = Request::post("auth/resend-verification", &details)?;
        self.crud(&request, |_| {}).await
    }

    /// Trade an expired token for a new one.
    pub async fn refresh_token(&self, token: &str) -> Result<String, ClientError> {
        let response = self
            .inner_client
            .post(self.format_url("auth/refresh"))
            .bearer_auth(token)
            .send()
            .await?;
        let envelope: Envelope<String> = ok_body(response).await?;
        Ok(envelope.data)
    }

    /// Upload an image, returning the URL the backend stored it under.
    pub async fn upload_image(
        &self,
        image: &crate::ImageFile,
        token: Option<String>,
        on_refresh: impl FnOnce(&str),
    ) -> Result<String, ClientError> {
        let form = FormData::new().file("image", image.clone());
        let request = Request::upload("upload/image", form).token(token);
        let envelope: Envelope<String> = self.crud(&request, on_refresh).await?;
        Ok(envelope.data)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// An unhandled API error to display, containing the server message.
    #[error("{1}")]
    APIError(StatusCode, String),
    #[error("Network error. Please check your connection.")]
    Network(#[from] reqwest::Error),
    #[error("Invalid request body: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The server answered successfully with a body we couldn't read.
    #[error("Unexpected response from the server: {0}")]
    Decode(#[source] serde_json::Error),
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::APIError(status, _) => Some(*status),
            Self::Network(e) => e.status(),
            Self::Serialization(_) | Self::Decode(_) => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    pub fn is_token_expired(&self) -> bool {
        match self {
            Self::APIError(_, message) => {
                let message = message.to_lowercase();
                TOKEN_EXPIRED_MESSAGES.iter().any(|m| message.contains(m))
            }
            _ => false,
        }
    }
}

/// Deserialize a successful response into its envelope, or return an
/// appropriate error carrying the server message.
pub async fn ok_body<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<Envelope<T>, ClientError> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await?;
        let mut message = ErrorBody::message_from(&text);
        if message.is_empty() {
            message = status.canonical_reason().unwrap_or("Error").to_string();
        }
        return Err(ClientError::APIError(status, message));
    }
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(ClientError::Decode)
}
