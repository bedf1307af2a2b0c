use dashboard::hooks::{CategoryFilter, MutationOutcome, QueryStatus};
use dashboard::state::Row;
use dashboard::{AuthState, ToastType};
use payloads::requests::NewCategory;
use test_helpers::spawn_app;

fn teatro() -> NewCategory {
    NewCategory {
        name: "Teatro".into(),
        active: true,
    }
}

fn names(rows: &[Row<dashboard::hooks::Categories>]) -> Vec<String> {
    rows.iter()
        .map(|row| match row {
            Row::Stored(category) => category.name.clone(),
            Row::Placeholder(draft) => format!("({})", draft.name),
        })
        .collect()
}

#[tokio::test]
async fn list_loads_sorted_page_and_total() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.seed_categories(&["Música", "Cine", "Danza"])?;
    let list = app.dashboard.categories();
    assert_eq!(list.status(), QueryStatus::Idle);

    list.refresh().await?;

    assert_eq!(list.status(), QueryStatus::Success);
    assert_eq!(names(&list.rows()), vec!["Cine", "Danza", "Música"]);
    assert_eq!(list.count(), 3);
    assert_eq!(list.filtered_count(), 3);
    assert_eq!(app.backend.hit_count("GET", "/categories/count"), 1);
    Ok(())
}

#[tokio::test]
async fn cached_pages_are_not_refetched() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.seed_categories(&["Cine"])?;
    let list = app.dashboard.categories();

    list.ensure_loaded().await?;
    list.ensure_loaded().await?;
    assert_eq!(app.backend.hit_count("GET", "/categories"), 1);

    // a fresh view of the same resource shares the cache
    app.dashboard.categories().ensure_loaded().await?;
    assert_eq!(app.backend.hit_count("GET", "/categories"), 1);
    Ok(())
}

#[tokio::test]
async fn pagination_over_45_records() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let seeded: Vec<String> = (0..45).map(|i| format!("Categoría {i:02}")).collect();
    let seeded: Vec<&str> = seeded.iter().map(String::as_str).collect();
    app.seed_categories(&seeded)?;
    let list = app.dashboard.categories();

    list.refresh().await?;
    assert_eq!(list.count(), 45);
    assert_eq!(list.max_page(), 2);
    assert_eq!(list.lower_shown(), 1);
    assert_eq!(list.upper_shown(), 20);

    list.next_page();
    list.next_page();
    list.next_page();
    assert_eq!(list.page(), 2);
    list.refresh().await?;
    assert_eq!(list.rows().len(), 5);
    assert_eq!(list.lower_shown(), 41);
    assert_eq!(list.upper_shown(), 45);
    let hit = app.backend.last_hit("GET", "/categories").unwrap();
    assert!(hit.query.contains("skip=40"));

    list.update_filter(CategoryFilter::Name("4".into()));
    assert_eq!(list.page(), 0);
    Ok(())
}

#[tokio::test]
async fn toggle_sort_flips_direction() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.seed_categories(&["Cine", "Teatro", "Danza"])?;
    let list = app.dashboard.categories();

    list.toggle_sort("name");
    assert_eq!(list.sort(), "-name");
    list.refresh().await?;
    assert_eq!(names(&list.rows()), vec!["Teatro", "Danza", "Cine"]);

    list.toggle_sort("name");
    assert_eq!(list.sort(), "name");
    Ok(())
}

#[tokio::test]
async fn filter_edits_are_debounced() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.seed_categories(&["Cine", "Cine club", "Teatro"])?;
    let list = app.dashboard.categories();
    list.set_page(1);

    let (first, second) = tokio::join!(
        list.handle_filter_change(CategoryFilter::Name("c".into())),
        list.handle_filter_change(CategoryFilter::Name("club".into())),
    );
    assert!(!first);
    assert!(second);
    assert_eq!(list.filters().name, "club");
    assert_eq!(list.page(), 0);

    list.refresh().await?;
    assert_eq!(names(&list.rows()), vec!["Cine club"]);
    assert_eq!(list.filtered_count(), 1);
    assert_eq!(list.count(), 3);
    Ok(())
}

#[tokio::test]
async fn add_confirms_placeholder() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    app.seed_categories(&["Cine"])?;
    let list = app.dashboard.categories();
    list.refresh().await?;

    app.backend.hold_next();
    let pending = list.clone();
    let task = tokio::spawn(async move { pending.add(teatro()).await });
    app.backend.wait_until_held().await;

    assert_eq!(names(&list.rows()), vec!["Cine", "(Teatro)"]);
    assert_eq!(list.count(), 2);

    app.backend.release();
    let created = task.await?.committed().unwrap();
    assert_eq!(created.name, "Teatro");
    assert_eq!(names(&list.rows()), vec!["Cine", "Teatro"]);
    assert_eq!(list.count(), 2);

    let toast = app.dashboard.toasts.last().unwrap();
    assert_eq!(toast.toast_type, ToastType::Success);
    assert_eq!(toast.message, "Categoría Teatro creada correctamente");
    Ok(())
}

#[tokio::test]
async fn add_during_first_load_still_shows_records() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    app.seed_categories(&["Cine", "Danza"])?;
    let list = app.dashboard.categories();

    let (loaded, outcome) = tokio::join!(list.refresh(), list.add(teatro()));
    loaded?;
    assert!(outcome.is_committed());
    assert_eq!(list.status(), QueryStatus::Success);
    assert!(!list.rows().is_empty());

    list.ensure_loaded().await?;
    assert_eq!(names(&list.rows()), vec!["Cine", "Danza", "Teatro"]);
    assert_eq!(list.count(), 3);
    assert_eq!(app.backend.documents("categories").len(), 3);
    Ok(())
}

#[tokio::test]
async fn failed_add_rolls_back()-> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    app.seed_categories(&["Cine"])?;
    let list = app.dashboard.categories();
    list.refresh().await?;
    let rows_before = list.rows();

    app.backend.fail_next(500, "Error del servidor");
    let outcome = list.add(teatro()).await;

    assert!(matches!(outcome, MutationOutcome::RolledBack(_)));
    assert_eq!(list.rows(), rows_before);
    assert_eq!(list.count(), 1);
    let toast = app.dashboard.toasts.last().unwrap();
    assert_eq!(toast.toast_type, ToastType::Error);
    assert_eq!(toast.message, "Error del servidor");
    assert_eq!(app.dashboard.session.state(), AuthState::Verified);
    Ok(())
}

#[tokio::test]
async fn unauthorized_write_logs_out_once() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    let list = app.dashboard.categories();
    list.refresh().await?;

    app.backend.fail_next(401, "No autorizado");
    let outcome = list.add(teatro()).await;

    assert!(!outcome.is_committed());
    assert_eq!(app.backend.hit_count("POST", "/categories"), 1);
    assert_eq!(app.backend.hit_count("POST", "/auth/refresh"), 0);
    assert_eq!(app.storage.clear_count(), 1);
    assert_eq!(app.dashboard.session.state(), AuthState::LoggedOut);
    assert!(list.rows().is_empty());
    assert_eq!(list.count(), 0);
    Ok(())
}

#[tokio::test]
async fn duplicate_names_are_rejected() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    app.seed_categories(&["Teatro"])?;
    let list = app.dashboard.categories();
    list.refresh().await?;

    let outcome = list.add(teatro()).await;

    assert_eq!(
        outcome.error().and_then(|e| e.status()),
        Some(reqwest::StatusCode::CONFLICT)
    );
    assert_eq!(names(&list.rows()), vec!["Teatro"]);
    Ok(())
}

#[tokio::test]
async fn edit_replaces_row_or_rolls_back() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    let seeded = app.seed_categories(&["Cine"])?;
    let list = app.dashboard.categories();
    list.refresh().await?;

    let mut renamed = seeded[0].clone();
    renamed.name = "Cine de arte".into();

    app.backend.fail_next(400, "Nombre inválido");
    let outcome = list.edit(renamed.clone()).await;
    assert!(!outcome.is_committed());
    assert_eq!(names(&list.rows()), vec!["Cine"]);

    let saved = list.edit(renamed).await.committed().unwrap();
    assert_eq!(saved.name, "Cine de arte");
    assert_eq!(names(&list.rows()), vec!["Cine de arte"]);
    assert_eq!(
        app.dashboard.toasts.last().unwrap().message,
        "Categoría editada correctamente"
    );
    assert_eq!(app.backend.documents("categories")[0]["name"], "Cine de arte");
    Ok(())
}

#[tokio::test]
async fn delete_removes_row_or_rolls_back() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    let seeded = app.seed_categories(&["Cine", "Danza"])?;
    let list = app.dashboard.categories();
    list.refresh().await?;
    let id = seeded[0].id.0.clone();

    app.backend.fail_next(500, "No se pudo eliminar");
    let outcome = list.delete(&id).await;
    assert!(!outcome.is_committed());
    assert_eq!(names(&list.rows()), vec!["Cine", "Danza"]);
    assert_eq!(list.count(), 2);
    assert_eq!(list.filtered_count(), 2);

    assert!(list.delete(&id).await.is_committed());
    assert_eq!(names(&list.rows()), vec!["Danza"]);
    assert_eq!(list.count(), 1);
    assert_eq!(list.filtered_count(), 1);
    assert_eq!(
        app.dashboard.toasts.last().unwrap().message,
        "Categoría eliminada correctamente"
    );
    assert!(app.backend.find("categories", &id).is_none());
    Ok(())
}
