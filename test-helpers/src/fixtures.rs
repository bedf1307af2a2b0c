//! Test data shared by the dashboard's integration tests and the dev server.

use crate::TestApp;
use anyhow::Result;
use dashboard::session::SessionUser;
use jiff::{Timestamp, ToSpan};
use payloads::requests::LoginCredentials;
use payloads::{
    Category, CategoryId, CategoryRef, Event, EventDate, EventId, Role, User,
    UserId,
};

pub const ALICE_PASSWORD: &str = "alice-password";
pub const BOB_PASSWORD: &str = "bob-password";

pub const CATEGORY_NAMES: [&str; 6] = [
    "Música",
    "Teatro",
    "Cine",
    "Danza",
    "Artes visuales",
    "Literatura",
];

pub fn alice() -> User {
    User {
        id: UserId("alice-id".into()),
        name: "Alice".into(),
        last_name: "Álvarez".into(),
        username: "alice".into(),
        email: "alice@cultura.ensenada.gob.mx".into(),
        role: Role::Super,
        active: true,
        verified: true,
        registered_at: None,
        last_login: None,
    }
}

pub fn bob() -> User {
    User {
        id: UserId("bob-id".into()),
        name: "Bob".into(),
        last_name: "Bautista".into(),
        username: "bob".into(),
        email: "bob@cultura.ensenada.gob.mx".into(),
        role: Role::Admin,
        active: true,
        verified: false,
        registered_at: None,
        last_login: None,
    }
}

pub fn alice_credentials() -> LoginCredentials {
    LoginCredentials::new("alice", ALICE_PASSWORD)
}

/// An event on day `i` after June 1st 2024, two hours long. Every third
/// one is a draft.
pub fn event(i: i64, categories: &[CategoryId]) -> Result<Event> {
    let start: Timestamp = "2024-06-01T19:00:00Z".parse()?;
    let start = start.checked_add((i * 24).hours())?;
    Ok(Event {
        id: EventId(format!("event-{i:03}")),
        title: format!("Evento {i}"),
        description: format!("Descripción del evento {i}"),
        flyer: format!("uploads/flyer-{i}.png"),
        dates: vec![EventDate {
            start,
            end: Some(start.checked_add(2.hours())?),
        }],
        ticket_link: (i % 2 == 0).then(|| format!("https://boletos.example.com/{i}")),
        location_name: Some("Teatro de la Ciudad".into()),
        published: i % 3 != 0,
        categories: categories.iter().cloned().map(CategoryRef::Id).collect(),
        created_by: None,
    })
}

/// Functions to populate test data
///
/// Using anyhow::Result lets us get a backtrace from when the error was fist
/// converted to anyhow::Result. Run with RUST_BACKTRACE=1 to view.
impl TestApp {
    pub fn create_alice_user(&self) {
        self.backend.insert_user(&alice(), ALICE_PASSWORD);
    }

    /// Create alice and log the dashboard in as her.
    pub async fn login_alice(&self) -> Result<SessionUser> {
        self.create_alice_user();
        let user = self.dashboard.auth().login(&alice_credentials()).await?;
        Ok(user)
    }

    pub fn seed_categories(&self, names: &[&str]) -> Result<Vec<Category>> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let category = Category {
                    id: CategoryId(format!("category-{i:03}")),
                    name: name.to_string(),
                    created_at: None,
                    active: true,
                };
                self.backend
                    .insert("categories", serde_json::to_value(&category)?);
                Ok::<_, anyhow::Error>(category)
            })
            .collect()
    }

    pub fn seed_events(&self, n: i64, categories: &[CategoryId]) -> Result<Vec<Event>> {
        (0..n)
            .map(|i| {
                let event = event(i, categories)?;
                self.backend.insert("events", serde_json::to_value(&event)?);
                Ok::<_, anyhow::Error>(event)
            })
            .collect()
    }

    /// Alice plus `n` users with mixed roles, a quarter of them unverified.
    pub fn seed_users(&self, n: usize) -> Result<Vec<User>> {
        self.create_alice_user();
        (0..n)
            .map(|i| {
                let user = User {
                    id: UserId(format!("user-{i:03}")),
                    name: format!("Usuario {i}"),
                    last_name: "Pérez".into(),
                    username: format!("usuario{i:03}"),
                    email: format!("usuario{i}@example.com"),
                    role: if i % 5 == 0 { Role::Admin } else { Role::Normal },
                    active: true,
                    verified: i % 4 != 0,
                    registered_at: None,
                    last_login: None,
                };
                self.backend.insert("users", serde_json::to_value(&user)?);
                Ok::<_, anyhow::Error>(user)
            })
            .collect()
    }
}

/// Everything the dev server starts with.
pub struct DevDataset {
    pub categories: Vec<Category>,
    pub events: Vec<Event>,
    pub users: Vec<User>,
}

impl DevDataset {
    pub fn create(app: &TestApp) -> Result<Self> {
        tracing::info!("👤 Creating users (alice: super, bob: unverified admin)");
        let mut users = app.seed_users(12)?;
        app.backend.insert_user(&bob(), BOB_PASSWORD);
        users.push(bob());

        tracing::info!("🏷️ Creating categories");
        let categories = app.seed_categories(&CATEGORY_NAMES)?;

        tracing::info!("🎭 Creating 45 events from June 2024 on");
        let ids: Vec<CategoryId> = categories.iter().map(|c| c.id.clone()).collect();
        let events = (0..45)
            .map(|i| {
                let pick = &ids[(i as usize) % ids.len()..][..1];
                let event = event(i, pick)?;
                app.backend.insert("events", serde_json::to_value(&event)?);
                Ok::<_, anyhow::Error>(event)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            categories,
            events,
            users,
        })
    }

    pub fn print_summary(&self) {
        tracing::info!("📋 Dataset:");
        tracing::info!("   {} categories", self.categories.len());
        tracing::info!("   {} events", self.events.len());
        tracing::info!("   {} users", self.users.len());
        tracing::info!("🔑 Logins:");
        tracing::info!("   alice / {ALICE_PASSWORD} (super, verified)");
        tracing::info!("   bob / {BOB_PASSWORD} (admin, unverified)");
    }
}
