use crate::{CategoryId, EventDate, Role, UserId};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Sent as an HTTP Basic authorization header, never as a body.
#[derive(Debug, Clone)]
pub struct LoginCredentials {
    pub username: String,
    pub password: SecretString,
}

impl LoginCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signup {
    pub name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

/// The code emailed after signup, for the given account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verify {
    pub code: String,
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResendVerification {
    #[serde(rename = "_id")]
    pub id: UserId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    /// Filled in with the uploaded image URL before submission.
    pub flyer: String,
    pub dates: Vec<EventDate>,
    pub ticket_link: Option<String>,
    pub location_name: Option<String>,
    pub published: bool,
    pub categories: Vec<CategoryId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedToggle {
    pub published: bool,
}
