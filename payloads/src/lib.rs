pub mod api_client;
pub mod query;
pub mod requests;
pub mod responses;

pub use api_client::{
    APIClient, ClientError, FormData, ImageFile, Method, Payload, Request,
    RequestMeta,
};
pub use query::ListQuery;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Identifier assigned by the backend to an event document.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(transparent)]
pub struct EventId(pub String);

#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(transparent)]
pub struct CategoryId(pub String);

#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(transparent)]
pub struct UserId(pub String);

/// Account role. Ordered from least to most privileged.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    #[display("normal")]
    Normal,
    #[display("admin")]
    Admin,
    #[display("super")]
    Super,
}

pub const ROLES: [Role; 3] = [Role::Normal, Role::Admin, Role::Super];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(rename = "_id")]
    pub id: CategoryId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<Timestamp>,
}

/// One showing of an event. Open-ended showings have no end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDate {
    pub start: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Timestamp>,
}

/// The backend returns categories either as bare ids (list endpoints) or
/// expanded (detail and update endpoints).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CategoryRef {
    Id(CategoryId),
    Full(Category),
}

impl CategoryRef {
    pub fn id(&self) -> &CategoryId {
        match self {
            Self::Id(id) => id,
            Self::Full(category) => &category.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UserRef {
    Id(UserId),
    Full(Box<User>),
}

impl UserRef {
    pub fn id(&self) -> &UserId {
        match self {
            Self::Id(id) => id,
            Self::Full(user) => &user.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "_id")]
    pub id: EventId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Path or URL of the uploaded flyer image. Empty when none was uploaded.
    #[serde(default)]
    pub flyer: String,
    pub dates: Vec<EventDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    pub published: bool,
    #[serde(default)]
    pub categories: Vec<CategoryRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserRef>,
}

impl Event {
    /// Collapse expanded categories to their ids, the shape list pages hold.
    pub fn with_category_ids(mut self) -> Self {
        self.categories = self
            .categories
            .into_iter()
            .map(|c| CategoryRef::Id(c.id().clone()))
            .collect();
        self
    }
}
