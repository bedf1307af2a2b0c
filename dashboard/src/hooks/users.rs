use super::filters::{Choice, DateRange, FilterInput, FilterOption, Filters};
use super::resource::Resource;
use payloads::requests::NewUser;
use payloads::{ROLES, Role, User};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Users;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFilters {
    pub name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub role: Vec<Role>,
    pub active: Choice,
    pub verified: Choice,
    pub registered_at: DateRange,
    pub last_login: DateRange,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UserFilter {
    Name(String),
    LastName(String),
    Username(String),
    Email(String),
    Role(Vec<Role>),
    Active(Choice),
    Verified(Choice),
    RegisteredAt(DateRange),
    LastLogin(DateRange),
}

impl Filters for UserFilters {
    type Change = UserFilter;

    fn apply(&mut self, change: UserFilter) {
        match change {
            UserFilter::Name(value) => self.name = value,
            UserFilter::LastName(value) => self.last_name = value,
            UserFilter::Username(value) => self.username = value,
            UserFilter::Email(value) => self.email = value,
            UserFilter::Role(roles) => self.role = roles,
            UserFilter::Active(choice) => self.active = choice,
            UserFilter::Verified(choice) => self.verified = choice,
            UserFilter::RegisteredAt(range) => self.registered_at = range,
            UserFilter::LastLogin(range) => self.last_login = range,
        }
    }

    fn inputs() -> Vec<FilterInput> {
        vec![
            FilterInput::text("Nombre", "name"),
            FilterInput::text("Apellido", "lastName"),
            FilterInput::text("Usuario", "username"),
            FilterInput::text("Correo", "email"),
            FilterInput::multi("Rol", "role", role_options()),
            FilterInput::select("Activo", "active", Choice::options()),
            FilterInput::select("Verificado", "verified", Choice::options()),
            FilterInput::datetime("Registrado desde", "registeredAt.lower"),
            FilterInput::datetime("Registrado hasta", "registeredAt.upper"),
            FilterInput::datetime("Último acceso desde", "lastLogin.lower"),
            FilterInput::datetime("Último acceso hasta", "lastLogin.upper"),
        ]
    }
}

/// Role names capitalized for display, valued by their wire name.
fn role_options() -> Vec<FilterOption> {
    ROLES
        .iter()
        .map(|role| {
            let value = role.to_string();
            let mut name = value.clone();
            if let Some(first) = name.get_mut(..1) {
                first.make_ascii_uppercase();
            }
            FilterOption::new(name, value)
        })
        .collect()
}

impl Resource for Users {
    const ENDPOINT: &'static str = "users";
    const DEFAULT_SORT: &'static str = "username";

    type Entity = User;
    type Draft = NewUser;
    type Filters = UserFilters;

    fn id(user: &User) -> &str {
        &user.id.0
    }

    fn created_message(user: &User) -> String {
        format!("Usuario {} creado correctamente", user.username)
    }

    fn edited_message(user: &User) -> String {
        format!("Usuario {} editado correctamente", user.username)
    }

    fn deleted_message() -> String {
        "Usuario eliminado correctamente".to_string()
    }
}
