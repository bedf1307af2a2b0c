use super::filters::{FilterInput, Filters, show_deleted_options};
use super::resource::Resource;
use payloads::Category;
use payloads::requests::NewCategory;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Categories;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryFilters {
    pub name: String,
    pub show_deleted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CategoryFilter {
    Name(String),
    ShowDeleted(bool),
}

impl Filters for CategoryFilters {
    type Change = CategoryFilter;

    fn apply(&mut self, change: CategoryFilter) {
        match change {
            CategoryFilter::Name(name) => self.name = name,
            CategoryFilter::ShowDeleted(show) => self.show_deleted = show,
        }
    }

    fn inputs() -> Vec<FilterInput> {
        vec![
            FilterInput::text("Nombre", "name").placeholder("Buscar por nombre"),
            FilterInput::select("¿Mostrar eliminados?", "showDeleted", show_deleted_options())
                .placeholder("Selecciona una opción"),
        ]
    }
}

impl Resource for Categories {
    const ENDPOINT: &'static str = "categories";
    const DEFAULT_SORT: &'static str = "name";

    type Entity = Category;
    type Draft = NewCategory;
    type Filters = CategoryFilters;

    fn id(category: &Category) -> &str {
        &category.id.0
    }

    fn created_message(category: &Category) -> String {
        format!("Categoría {} creada correctamente", category.name)
    }

    fn edited_message(_: &Category) -> String {
        "Categoría editada correctamente".to_string()
    }

    fn deleted_message() -> String {
        "Categoría eliminada correctamente".to_string()
    }
}
