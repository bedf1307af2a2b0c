pub mod categories;
pub mod debounce;
pub mod events;
pub mod filters;
pub mod list_controls;
pub mod resource;
pub mod users;

pub use categories::{Categories, CategoryFilter, CategoryFilters};
pub use debounce::Debouncer;
pub use events::{EventDetail, EventFilter, EventFilters, Events, SubmitAction};
pub use filters::{Bound, Choice, DateRange, FilterInput, FilterKind, FilterOption, Filters};
pub use list_controls::{LIMIT_OPTIONS, ListControls};
pub use resource::{MutationOutcome, QueryStatus, Resource, ResourceList};
pub use users::{UserFilter, UserFilters, Users};
