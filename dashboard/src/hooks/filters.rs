use jiff::civil::DateTime;
use serde::{Serialize, Serializer};
use std::fmt::Debug;

/// The filter state of a list view.
///
/// Serialized as-is into the `filters` query parameter; fields meaning "no
/// constraint" are stripped before sending.
pub trait Filters:
    Debug + Clone + Default + PartialEq + Serialize + Send + Sync + 'static
{
    /// A single edit coming from one filter input.
    type Change: Debug + Clone + Send + Sync + 'static;

    fn apply(&mut self, change: Self::Change);

    /// The inputs a filter panel renders, in order.
    fn inputs() -> Vec<FilterInput>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterOption {
    pub name: String,
    pub value: String,
}

impl FilterOption {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Choices of the "show deleted" select. Only `"true"` turns it on.
pub fn show_deleted_options() -> Vec<FilterOption> {
    vec![FilterOption::new("No", "false"), FilterOption::new("Sí", "true")]
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterKind {
    Text,
    DateTime,
    Select(Vec<FilterOption>),
    Multi(Vec<FilterOption>),
}

/// Describes one control of a filter panel.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterInput {
    pub name: &'static str,
    pub field: &'static str,
    pub placeholder: Option<&'static str>,
    pub kind: FilterKind,
}

impl FilterInput {
    pub fn text(name: &'static str, field: &'static str) -> Self {
        Self::new(name, field, FilterKind::Text)
    }

    pub fn datetime(name: &'static str, field: &'static str) -> Self {
        Self::new(name, field, FilterKind::DateTime)
    }

    pub fn select(name: &'static str, field: &'static str, options: Vec<FilterOption>) -> Self {
        Self::new(name, field, FilterKind::Select(options))
    }

    pub fn multi(name: &'static str, field: &'static str, options: Vec<FilterOption>) -> Self {
        Self::new(name, field, FilterKind::Multi(options))
    }

    pub fn placeholder(mut self, placeholder: &'static str) -> Self {
        self.placeholder = Some(placeholder);
        self
    }

    fn new(name: &'static str, field: &'static str, kind: FilterKind) -> Self {
        Self {
            name,
            field,
            placeholder: None,
            kind,
        }
    }
}

/// Tri-state select: any, yes or no.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Choice {
    #[default]
    All,
    Yes,
    No,
}

impl Choice {
    /// The "Todos / Sí / No" options.
    pub fn options() -> Vec<FilterOption> {
        vec![
            FilterOption::new("Todos", "all"),
            FilterOption::new("Sí", "true"),
            FilterOption::new("No", "false"),
        ]
    }

    /// Parse a select value as produced by [`Choice::options`].
    pub fn from_value(value: &str) -> Self {
        match value {
            "true" => Self::Yes,
            "false" => Self::No,
            _ => Self::All,
        }
    }
}

impl Serialize for Choice {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::All => serializer.serialize_str("all"),
            Self::Yes => serializer.serialize_bool(true),
            Self::No => serializer.serialize_bool(false),
        }
    }
}

/// Inclusive bounds on a date field. Either side may be open.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DateRange {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower: Option<DateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper: Option<DateTime>,
}

/// Which side of a [`DateRange`] an edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Lower,
    Upper,
}

impl DateRange {
    pub fn set(&mut self, bound: Bound, value: Option<DateTime>) {
        match bound {
            Bound::Lower => self.lower = value,
            Bound::Upper => self.upper = value,
        }
    }
}
