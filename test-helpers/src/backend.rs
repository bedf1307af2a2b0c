//! In-memory stand-in for the Cartelera REST backend.
//!
//! Documents are kept as JSON per collection. Besides serving the dashboard,
//! the backend records every request it sees and can be told to misbehave:
//! expire tokens, fail the next request or hold a write until released.

use crate::routes::MockError;
use actix_web::HttpRequest;
use jiff::Timestamp;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde_json::{Map, Value, json};
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use uuid::Uuid;

pub const RESOURCES: [&str; 3] = ["events", "categories", "users"];

/// HS256 key the mock signs its tokens with.
const TOKEN_SECRET: &[u8] = b"cartelera-mock-secret";
const TOKEN_LIFETIME_SECS: i64 = 60 * 60;

/// A request as the backend received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hit {
    pub method: String,
    pub path: String,
    pub query: String,
    pub bearer: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    collections: HashMap<String, Vec<Value>>,
    /// username -> password
    passwords: HashMap<String, String>,
    /// user id -> pending verification code
    codes: HashMap<String, String>,
    expire_next: usize,
    failures: VecDeque<(u16, String)>,
    hold_next: bool,
    hits: Vec<Hit>,
    uploads: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<State>>,
    held: Arc<Notify>,
    release: Arc<Notify>,
}

/// Seeding and inspection, for tests and the dev server.
impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store a document as-is, assigning an `_id` if it has none.
    pub fn insert(&self, resource: &str, mut doc: Value) -> Value {
        if doc.get("_id").is_none() {
            doc["_id"] = json!(new_id());
        }
        let mut state = self.lock();
        let docs = state.collections.entry(resource.to_string()).or_default();
        match docs.iter().position(|d| d["_id"] == doc["_id"]) {
            Some(i) => docs[i] = doc.clone(),
            None => docs.push(doc.clone()),
        }
        doc
    }

    /// Store a user that can log in with `password`.
    pub fn insert_user(&self, user: &payloads::User, password: &str) {
        let doc = serde_json::to_value(user).unwrap_or_default();
        self.insert("users", doc);
        self.lock()
            .passwords
            .insert(user.username.clone(), password.to_string());
    }

    pub fn documents(&self, resource: &str) -> Vec<Value> {
        self.lock()
            .collections
            .get(resource)
            .cloned()
            .unwrap_or_default()
    }

    pub fn find(&self, resource: &str, id: &str) -> Option<Value> {
        find_in(&self.lock(), resource, id).cloned()
    }

    pub fn verification_code(&self, user_id: &str) -> Option<String> {
        self.lock().codes.get(user_id).cloned()
    }

    /// Issue a valid token for a stored user.
    pub fn issue_token(&self, user_id: &str) -> Option<String> {
        issue(&self.lock(), user_id)
    }

    /// Whether `token` carries our signature and hasn't expired.
    pub fn is_valid_token(&self, token: &str) -> bool {
        token_user(token).is_some()
    }

    /// Answer the next `n` requests carrying a bearer token with
    /// `401 jwt expired`. Refresh requests are exempt.
    pub fn expire_next_tokens(&self, n: usize) {
        self.lock().expire_next = n;
    }

    /// Answer the next request with `status` and `message`.
    pub fn fail_next(&self, status: u16, message: impl Into<String>) {
        self.lock().failures.push_back((status, message.into()));
    }

    /// Park the next write until [`MockBackend::release`] is called.
    pub fn hold_next(&self) {
        self.lock().hold_next = true;
    }

    /// Resolves once a held write has arrived.
    pub async fn wait_until_held(&self) {
        self.held.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }

    pub fn hits(&self) -> Vec<Hit> {
        self.lock().hits.clone()
    }

    pub fn hit_count(&self, method: &str, path: &str) -> usize {
        self.lock()
            .hits
            .iter()
            .filter(|hit| hit.method == method && hit.path == path)
            .count()
    }

    pub fn last_hit(&self, method: &str, path: &str) -> Option<Hit> {
        self.lock()
            .hits
            .iter()
            .rev()
            .find(|hit| hit.method == method && hit.path == path)
            .cloned()
    }

    pub fn uploads(&self) -> Vec<String> {
        self.lock().uploads.clone()
    }
}

/// Request handling, used by the routes.
impl MockBackend {
    /// Record the request and apply any injected misbehaviour. Returns the
    /// bearer token, if one was sent.
    pub(crate) fn intercept(&self, req: &HttpRequest) -> Result<Option<String>, MockError> {
        let bearer = bearer_token(req);
        let mut state = self.lock();
        state.hits.push(Hit {
            method: req.method().to_string(),
            path: req.path().to_string(),
            query: req.query_string().to_string(),
            bearer: bearer.clone(),
        });

        if let Some((status, message)) = state.failures.pop_front() {
            return Err(MockError::Injected(status, message));
        }
        if bearer.is_some() && req.path() != "/auth/refresh" && state.expire_next > 0 {
            state.expire_next -= 1;
            return Err(MockError::Unauthorized("jwt expired".into()));
        }
        Ok(bearer)
    }

    /// The id of the user a token belongs to.
    pub(crate) fn require_user(&self, bearer: Option<&str>) -> Result<String, MockError> {
        bearer
            .and_then(token_user)
            .ok_or_else(|| MockError::Unauthorized("No autorizado".into()))
    }

    pub(crate) async fn hold_if_armed(&self) {
        let armed = std::mem::take(&mut self.lock().hold_next);
        if armed {
            tracing::debug!("Holding write until released");
            self.held.notify_one();
            self.release.notified().await;
        }
    }

    /// A page of matching documents plus the number of matches.
    pub(crate) fn list(&self, resource: &str, pairs: &[(String, String)]) -> (Vec<Value>, u64) {
        let mut docs = self.documents(resource);
        let constraints = parse_filters(pairs);
        docs.retain(|doc| {
            constraints
                .iter()
                .all(|(field, constraint)| constraint.matches(doc, field))
        });

        if let Some(sort) = param(pairs, "sort") {
            let (field, descending) = match sort.strip_prefix('-') {
                Some(field) => (field, true),
                None => (sort, false),
            };
            docs.sort_by(|a, b| {
                let ordering = compare(&sort_value(a, field), &sort_value(b, field));
                if descending { ordering.reverse() } else { ordering }
            });
        }

        let count = docs.len() as u64;
        let skip = param(pairs, "skip").and_then(|s| s.parse().ok()).unwrap_or(0);
        let limit = param(pairs, "limit")
            .and_then(|s| s.parse().ok())
            .unwrap_or(usize::MAX);
        let page = docs.into_iter().skip(skip).take(limit).collect();
        (page, count)
    }

    pub(crate) fn count(&self, resource: &str) -> u64 {
        self.lock()
            .collections
            .get(resource)
            .map_or(0, |docs| docs.len() as u64)
    }

    pub(crate) fn get(&self, resource: &str, id: &str) -> Result<Value, MockError> {
        let state = self.lock();
        find_in(&state, resource, id)
            .map(|doc| expand(&state, resource, doc.clone()))
            .ok_or_else(not_found)
    }

    pub(crate) fn create(&self, resource: &str, body: Value, actor: &str) -> Result<Value, MockError> {
        let Value::Object(mut doc) = body else {
            return Err(MockError::BadRequest("Cuerpo inválido".into()));
        };
        let mut state = self.lock();
        match resource {
            "categories" => {
                let name = doc.get("name").and_then(Value::as_str).unwrap_or_default();
                if name.trim().is_empty() {
                    return Err(MockError::BadRequest("El nombre es requerido".into()));
                }
                if state
                    .collections
                    .get(resource)
                    .is_some_and(|docs| docs.iter().any(|d| d["name"] == name))
                {
                    return Err(MockError::Conflict("La categoría ya existe".into()));
                }
                doc.entry("active").or_insert(json!(true));
            }
            "users" => {
                let username = doc
                    .get("username")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                if state.passwords.contains_key(&username) {
                    return Err(MockError::Conflict("El usuario ya existe".into()));
                }
                let password = doc
                    .remove("password")
                    .and_then(|p| p.as_str().map(str::to_string))
                    .unwrap_or_default();
                state.passwords.insert(username, password);
                doc.entry("role").or_insert(json!("normal"));
                doc.entry("active").or_insert(json!(true));
                doc.entry("verified").or_insert(json!(false));
            }
            "events" => {
                collapse_categories(&mut doc);
                doc.insert("createdBy".into(), json!(actor));
            }
            _ => {}
        }
        doc.insert("_id".into(), json!(new_id()));

        let doc = Value::Object(doc);
        state
            .collections
            .entry(resource.to_string())
            .or_default()
            .push(doc.clone());
        Ok(expand(&state, resource, doc))
    }

    pub(crate) fn update(&self, resource: &str, id: &str, body: Value) -> Result<Value, MockError> {
        let Value::Object(mut changes) = body else {
            return Err(MockError::BadRequest("Cuerpo inválido".into()));
        };
        changes.remove("_id");
        collapse_categories(&mut changes);

        let mut state = self.lock();
        if resource == "users" {
            if let Some(password) = changes.remove("password").and_then(|p| p.as_str().map(str::to_string)) {
                let username = find_in(&state, resource, id)
                    .and_then(|doc| doc["username"].as_str().map(str::to_string))
                    .ok_or_else(not_found)?;
                state.passwords.insert(username, password);
            }
        }
        let doc = state
            .collections
            .get_mut(resource)
            .and_then(|docs| docs.iter_mut().find(|doc| doc["_id"] == id))
            .ok_or_else(not_found)?;
        if let Value::Object(fields) = doc {
            fields.extend(changes);
        }
        let doc = doc.clone();
        Ok(expand(&state, resource, doc))
    }

    pub(crate) fn remove(&self, resource: &str, id: &str) -> Result<(), MockError> {
        let mut state = self.lock();
        let docs = state.collections.get_mut(resource).ok_or_else(not_found)?;
        let before = docs.len();
        docs.retain(|doc| doc["_id"] != id);
        if docs.len() == before {
            return Err(not_found());
        }
        Ok(())
    }

    pub(crate) fn login(&self, username: &str, password: &str) -> Result<String, MockError> {
        let state = self.lock();
        let rejected = || MockError::Unauthorized("Usuario o contraseña incorrectos".into());
        if state.passwords.get(username).map(String::as_str) != Some(password) {
            return Err(rejected());
        }
        let id = state
            .collections
            .get("users")
            .and_then(|users| users.iter().find(|u| u["username"] == username))
            .and_then(|user| user["_id"].as_str().map(str::to_string))
            .ok_or_else(rejected)?;
        issue(&state, &id).ok_or_else(rejected)
    }

    pub(crate) fn signup(&self, details: &payloads::requests::Signup) -> Result<Value, MockError> {
        let mut state = self.lock();
        if state.passwords.contains_key(&details.username) {
            return Err(MockError::Conflict("El usuario ya existe".into()));
        }
        let id = new_id();
        let user = json!({
            "_id": id,
            "name": details.name,
            "lastName": details.last_name,
            "username": details.username,
            "email": details.email,
            "role": "normal",
            "active": true,
            "verified": false,
        });
        state
            .passwords
            .insert(details.username.clone(), details.password.clone());
        state.codes.insert(id, verification_code());
        state
            .collections
            .entry("users".into())
            .or_default()
            .push(user.clone());
        Ok(user)
    }

    pub(crate) fn verify(&self, code: &str, user_id: &str) -> Result<String, MockError> {
        let mut state = self.lock();
        if state.codes.get(user_id).map(String::as_str) != Some(code) {
            return Err(MockError::BadRequest("Código de verificación incorrecto".into()));
        }
        state.codes.remove(user_id);
        let user = state
            .collections
            .get_mut("users")
            .and_then(|users| users.iter_mut().find(|u| u["_id"] == user_id))
            .ok_or_else(not_found)?;
        user["verified"] = json!(true);
        issue(&state, user_id).ok_or_else(not_found)
    }

    pub(crate) fn resend_verification(&self, user_id: &str) -> Result<(), MockError> {
        let mut state = self.lock();
        if find_in(&state, "users", user_id).is_none() {
            return Err(not_found());
        }
        state.codes.insert(user_id.to_string(), verification_code());
        Ok(())
    }

    pub(crate) fn refresh(&self, token: &str) -> Result<String, MockError> {
        let user_id =
            token_user(token).ok_or_else(|| MockError::Unauthorized("No autorizado".into()))?;
        issue(&self.lock(), &user_id).ok_or_else(not_found)
    }

    pub(crate) fn store_upload(&self, file_name: &str) -> String {
        let path = format!("uploads/{}-{file_name}", Uuid::new_v4().simple());
        self.lock().uploads.push(path.clone());
        path
    }
}

fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn verification_code() -> String {
    let n = Uuid::new_v4().as_u128() % 1_000_000;
    format!("{n:06}")
}

fn not_found() -> MockError {
    MockError::NotFound("No encontrado".into())
}

fn find_in<'a>(state: &'a State, resource: &str, id: &str) -> Option<&'a Value> {
    state
        .collections
        .get(resource)
        .and_then(|docs| docs.iter().find(|doc| doc["_id"] == id))
}

/// Sign a token for a stored user. The claims carry what the dashboard
/// shows about the current user.
fn issue(state: &State, user_id: &str) -> Option<String> {
    let user = find_in(state, "users", user_id)?;
    let now = Timestamp::now().as_second();
    let claims = json!({
        "_id": user["_id"],
        "username": user["username"],
        "role": user["role"],
        "verified": user["verified"],
        "name": user["name"],
        "lastName": user["lastName"],
        "email": user["email"],
        "iat": now,
        "exp": now + TOKEN_LIFETIME_SECS,
        "jti": new_id(),
    });
    let key = EncodingKey::from_secret(TOKEN_SECRET);
    match encode(&Header::new(Algorithm::HS256), &claims, &key) {
        Ok(token) => Some(token),
        Err(e) => {
            tracing::error!("Failed to sign token: {e}");
            None
        }
    }
}

/// The user id of a token we signed.
fn token_user(token: &str) -> Option<String> {
    let key = DecodingKey::from_secret(TOKEN_SECRET);
    let claims = decode::<Value>(token, &key, &Validation::new(Algorithm::HS256)).ok()?;
    claims.claims["_id"].as_str().map(str::to_string)
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

/// Events reference categories by id; accept expanded documents too.
fn collapse_categories(doc: &mut Map<String, Value>) {
    if let Some(Value::Array(categories)) = doc.get_mut("categories") {
        for category in categories.iter_mut() {
            if let Some(id) = category.get("_id").cloned() {
                *category = id;
            }
        }
    }
}

/// Single-document responses carry their categories expanded.
fn expand(state: &State, resource: &str, mut doc: Value) -> Value {
    if resource != "events" {
        return doc;
    }
    if let Some(Value::Array(categories)) = doc.get_mut("categories") {
        for category in categories.iter_mut() {
            if let Some(found) = category.as_str().and_then(|id| find_in(state, "categories", id)) {
                *category = found.clone();
            }
        }
    }
    doc
}

fn param<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

#[derive(Debug, PartialEq)]
enum Constraint {
    Contains(String),
    AnyOf(Vec<String>),
}

impl Constraint {
    fn matches(&self, doc: &Value, field: &str) -> bool {
        let value = doc.get(field);
        match self {
            Self::Contains(needle) => match value {
                Some(Value::String(s)) => s.to_lowercase().contains(&needle.to_lowercase()),
                Some(Value::Bool(b)) => needle == &b.to_string(),
                Some(Value::Number(n)) => needle == &n.to_string(),
                // a link filter only asks whether one is present
                _ if needle == "true" => value.is_some_and(|v| !v.is_null()),
                _ => false,
            },
            Self::AnyOf(options) => value
                .and_then(Value::as_str)
                .is_some_and(|s| options.iter().any(|o| o == s)),
        }
    }
}

/// Equality and array filters. Date ranges and `showDeleted` are accepted
/// but don't narrow the results.
fn parse_filters(pairs: &[(String, String)]) -> Vec<(String, Constraint)> {
    let mut constraints: Vec<(String, Constraint)> = Vec::new();
    for (key, value) in pairs {
        let Some(path) = key
            .strip_prefix("filters[")
            .and_then(|rest| rest.strip_suffix(']'))
        else {
            continue;
        };
        let segments: Vec<&str> = path.split("][").collect();
        match segments.as_slice() {
            ["showDeleted"] => {}
            [field] => constraints.push((field.to_string(), Constraint::Contains(value.clone()))),
            [field, index] if index.parse::<usize>().is_ok() => {
                let existing = constraints.iter().position(|(f, _)| f == field);
                match existing.map(|i| &mut constraints[i].1) {
                    Some(Constraint::AnyOf(options)) => options.push(value.clone()),
                    _ => constraints.push((field.to_string(), Constraint::AnyOf(vec![value.clone()]))),
                }
            }
            _ => {}
        }
    }
    constraints
}

/// Fields missing from a document are looked up on its first date, so
/// events can be ordered by `start`.
fn sort_value(doc: &Value, field: &str) -> Value {
    doc.get(field)
        .or_else(|| doc.get("dates").and_then(|dates| dates.get(0)).and_then(|date| date.get(field)))
        .cloned()
        .unwrap_or(Value::Null)
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(a), Value::String(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        _ => Ordering::Equal,
    }
}
