use crate::backend::{MockBackend, RESOURCES};
use actix_multipart::{Multipart, MultipartError};
use actix_web::http::StatusCode;
use actix_web::{
    HttpRequest, HttpResponse, ResponseError, body::BoxBody, delete,
    dev::HttpServiceFactory, get, post, put, web,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::TryStreamExt;
use payloads::requests::{ResendVerification, Signup, Verify};
use payloads::responses::Envelope;
use serde_json::{Value, json};

pub fn services() -> impl HttpServiceFactory {
    web::scope("")
        .service(health_check)
        .service(login)
        .service(signup)
        .service(verify)
        .service(resend_verification)
        .service(refresh)
        .service(upload_image)
        .service(count)
        .service(list)
        .service(create)
        .service(get_one)
        .service(update)
        .service(remove)
}

#[derive(Debug, thiserror::Error)]
pub enum MockError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    /// Queued with [`MockBackend::fail_next`].
    #[error("{1}")]
    Injected(u16, String),
}

impl ResponseError for MockError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Injected(status, _) => StatusCode::from_u16(*status)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    /// Errors use the same envelope as successes.
    fn error_response(&self) -> HttpResponse<BoxBody> {
        HttpResponse::build(self.status_code()).json(json!({
            "data": null,
            "meta": { "success": false, "message": self.to_string() },
        }))
    }
}

fn collection(name: &str) -> Result<&'static str, MockError> {
    RESOURCES
        .into_iter()
        .find(|resource| *resource == name)
        .ok_or_else(|| MockError::NotFound(format!("Recurso desconocido: {name}")))
}

fn basic_credentials(req: &HttpRequest) -> Option<(String, String)> {
    let header = req.headers().get("Authorization")?.to_str().ok()?;
    let decoded = STANDARD.decode(header.strip_prefix("Basic ")?).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

#[get("/health_check")]
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().body("healthy")
}

#[tracing::instrument(skip_all)]
#[post("/auth/login")]
pub async fn login(
    req: HttpRequest,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, MockError> {
    backend.intercept(&req)?;
    let (username, password) = basic_credentials(&req).ok_or_else(|| {
        MockError::Unauthorized("Usuario o contraseña incorrectos".into())
    })?;
    let token = backend.login(&username, &password)?;
    Ok(HttpResponse::Ok().json(Envelope::new(token, "Sesión iniciada")))
}

#[tracing::instrument(skip_all)]
#[post("/auth/signup")]
pub async fn signup(
    req: HttpRequest,
    details: web::Json<Signup>,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, MockError> {
    backend.intercept(&req)?;
    let user = backend.signup(&details)?;
    Ok(HttpResponse::Created().json(Envelope::new(user, "Usuario registrado")))
}

#[tracing::instrument(skip_all)]
#[post("/auth/verify")]
pub async fn verify(
    req: HttpRequest,
    details: web::Json<Verify>,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, MockError> {
    backend.intercept(&req)?;
    let token = backend.verify(&details.code, &details.user_id.0)?;
    Ok(HttpResponse::Ok().json(Envelope::new(token, "Cuenta verificada")))
}

#[tracing::instrument(skip_all)]
#[post("/auth/resend-verification")]
pub async fn resend_verification(
    req: HttpRequest,
    details: web::Json<ResendVerification>,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, MockError> {
    backend.intercept(&req)?;
    backend.resend_verification(&details.id.0)?;
    Ok(HttpResponse::Ok().json(Envelope::new(Value::Null, "Código enviado")))
}

#[tracing::instrument(skip_all)]
#[post("/auth/refresh")]
pub async fn refresh(
    req: HttpRequest,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, MockError> {
    let bearer = backend.intercept(&req)?;
    let token = backend.refresh(bearer.as_deref().unwrap_or_default())?;
    Ok(HttpResponse::Ok().json(Envelope::new(token, "Token renovado")))
}

fn unreadable_upload(e: MultipartError) -> MockError {
    MockError::BadRequest(format!("Formulario inválido: {e}"))
}

/// Expects the flyer as an `image/*` file in the `image` field.
#[tracing::instrument(skip_all)]
#[post("/upload/image")]
pub async fn upload_image(
    req: HttpRequest,
    mut payload: Multipart,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, MockError> {
    let bearer = backend.intercept(&req)?;
    backend.require_user(bearer.as_deref())?;

    while let Some(mut field) = payload.try_next().await.map_err(unreadable_upload)? {
        let disposition = field.content_disposition();
        if disposition.and_then(|d| d.get_name()) != Some("image") {
            while field.try_next().await.map_err(unreadable_upload)?.is_some() {}
            continue;
        }
        let file_name = disposition
            .and_then(|d| d.get_filename())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| MockError::BadRequest("La imagen no tiene nombre".into()))?;
        let is_image = field
            .content_type()
            .is_some_and(|mime| mime.type_().as_str() == "image");
        if !is_image {
            return Err(MockError::BadRequest("El archivo no es una imagen".into()));
        }

        let mut size = 0;
        while let Some(chunk) = field.try_next().await.map_err(unreadable_upload)? {
            size += chunk.len();
        }
        if size == 0 {
            return Err(MockError::BadRequest("La imagen está vacía".into()));
        }
        let path = backend.store_upload(&file_name);
        return Ok(HttpResponse::Created().json(Envelope::new(path, "Imagen subida")));
    }
    Err(MockError::BadRequest("No se recibió ninguna imagen".into()))
}

#[tracing::instrument(skip(req, backend))]
#[get("/{resource}/count")]
pub async fn count(
    req: HttpRequest,
    resource: web::Path<String>,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, MockError> {
    backend.intercept(&req)?;
    let resource = collection(&resource)?;
    Ok(HttpResponse::Ok().json(Envelope::new(backend.count(resource), "")))
}

#[tracing::instrument(skip(req, backend))]
#[get("/{resource}")]
pub async fn list(
    req: HttpRequest,
    resource: web::Path<String>,
    query: web::Query<Vec<(String, String)>>,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, MockError> {
    backend.intercept(&req)?;
    let resource = collection(&resource)?;
    let (docs, matched) = backend.list(resource, &query);
    Ok(HttpResponse::Ok().json(Envelope::new(docs, "").with_count(matched)))
}

#[tracing::instrument(skip(req, backend))]
#[get("/{resource}/{id}")]
pub async fn get_one(
    req: HttpRequest,
    path: web::Path<(String, String)>,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, MockError> {
    backend.intercept(&req)?;
    let (resource, id) = path.into_inner();
    let doc = backend.get(collection(&resource)?, &id)?;
    Ok(HttpResponse::Ok().json(Envelope::new(doc, "")))
}

#[tracing::instrument(skip(req, body, backend))]
#[post("/{resource}")]
pub async fn create(
    req: HttpRequest,
    resource: web::Path<String>,
    body: web::Json<Value>,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, MockError> {
    let bearer = backend.intercept(&req)?;
    let actor = backend.require_user(bearer.as_deref())?;
    let resource = collection(&resource)?;
    backend.hold_if_armed().await;
    let doc = backend.create(resource, body.into_inner(), &actor)?;
    Ok(HttpResponse::Created().json(Envelope::new(doc, "Creado")))
}

#[tracing::instrument(skip(req, body, backend))]
#[put("/{resource}/{id}")]
pub async fn update(
    req: HttpRequest,
    path: web::Path<(String, String)>,
    body: web::Json<Value>,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, MockError> {
    let bearer = backend.intercept(&req)?;
    backend.require_user(bearer.as_deref())?;
    let (resource, id) = path.into_inner();
    let resource = collection(&resource)?;
    backend.hold_if_armed().await;
    let doc = backend.update(resource, &id, body.into_inner())?;
    Ok(HttpResponse::Ok().json(Envelope::new(doc, "Actualizado")))
}

#[tracing::instrument(skip(req, backend))]
#[delete("/{resource}/{id}")]
pub async fn remove(
    req: HttpRequest,
    path: web::Path<(String, String)>,
    backend: web::Data<MockBackend>,
) -> Result<HttpResponse, MockError> {
    let bearer = backend.intercept(&req)?;
    backend.require_user(bearer.as_deref())?;
    let (resource, id) = path.into_inner();
    let resource = collection(&resource)?;
    backend.hold_if_armed().await;
    backend.remove(resource, &id)?;
    Ok(HttpResponse::Ok().json(Envelope::new(Value::Null, "Eliminado")))
}
