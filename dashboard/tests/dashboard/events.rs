use dashboard::hooks::{Choice, EventFilter, MutationOutcome, SubmitAction};
use dashboard::state::Row;
use dashboard::{AuthState, ToastType};
use payloads::requests::NewEvent;
use payloads::{CategoryId, CategoryRef, EventDate, ImageFile};
use test_helpers::spawn_app;

fn flyer() -> ImageFile {
    ImageFile {
        file_name: "flyer.png".into(),
        mime: "image/png".into(),
        bytes: vec![0x89, b'P', b'N', b'G'],
    }
}

fn festival(categories: Vec<CategoryId>) -> anyhow::Result<NewEvent> {
    let start = "2024-07-20T18:00:00Z".parse()?;
    Ok(NewEvent {
        title: "Festival del Vino".into(),
        description: "Catas y música en vivo".into(),
        flyer: String::new(),
        dates: vec![EventDate { start, end: None }],
        ticket_link: None,
        location_name: Some("Valle de Guadalupe".into()),
        published: false,
        categories,
    })
}

fn titles(rows: &[Row<dashboard::hooks::Events>]) -> Vec<String> {
    rows.iter()
        .map(|row| match row {
            Row::Stored(event) => event.title.clone(),
            Row::Placeholder(draft) => format!("({})", draft.title),
        })
        .collect()
}

#[tokio::test]
async fn events_are_sorted_by_start() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.seed_events(3, &[])?;
    let list = app.dashboard.events();

    list.refresh().await?;
    assert_eq!(list.sort(), "start");
    assert_eq!(titles(&list.rows()), vec!["Evento 0", "Evento 1", "Evento 2"]);

    list.toggle_sort("start");
    list.refresh().await?;
    assert_eq!(titles(&list.rows()), vec!["Evento 2", "Evento 1", "Evento 0"]);
    Ok(())
}

#[tokio::test]
async fn tri_state_filters() -> anyhow::Result<()> {
    let app = spawn_app().await;
    // every third event is a draft
    app.seed_events(6, &[])?;
    let list = app.dashboard.events();

    list.update_filter(EventFilter::Published(Choice::Yes));
    list.refresh().await?;
    assert_eq!(list.filtered_count(), 4);
    assert!(list.entities().iter().all(|event| event.published));
    let hit = app.backend.last_hit("GET", "/events").unwrap();
    assert!(hit.query.contains("filters%5Bpublished%5D=true"));

    // "No" is falsy, so it is not sent at all
    list.update_filter(EventFilter::Published(Choice::No));
    list.refresh().await?;
    assert_eq!(list.filtered_count(), 6);
    let hit = app.backend.last_hit("GET", "/events").unwrap();
    assert!(!hit.query.contains("published"));
    Ok(())
}

#[tokio::test]
async fn submit_uploads_flyer_then_creates() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    let categories = app.seed_categories(&["Música"])?;
    let list = app.dashboard.events();
    list.refresh().await?;

    let draft = festival(vec![categories[0].id.clone()])?;
    let outcome = list
        .submit(SubmitAction::Add(draft), Some(flyer()))
        .await;
    let created = outcome.committed().unwrap();

    let uploads = app.backend.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(created.flyer, uploads[0]);
    assert!(created.flyer.ends_with("-flyer.png"));

    // the server answers with categories expanded, rows keep ids
    assert!(matches!(&created.categories[0], CategoryRef::Full(c) if c.name == "Música"));
    let row = list.entities().pop().unwrap();
    assert_eq!(row.categories, vec![CategoryRef::Id(categories[0].id.clone())]);

    // unset optional fields are not sent
    let stored = app.backend.find("events", &created.id.0).unwrap();
    assert!(stored.get("ticketLink").is_none());
    assert_eq!(
        app.dashboard.toasts.last().unwrap().message,
        "Evento creado correctamente"
    );
    Ok(())
}

#[tokio::test]
async fn add_without_flyer_commits() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    let list = app.dashboard.events();
    list.refresh().await?;

    let created = list
        .submit(SubmitAction::Add(festival(vec![])?), None)
        .await
        .committed()
        .unwrap();

    assert_eq!(created.flyer, "");
    assert_eq!(app.backend.documents("events").len(), 1);
    assert_eq!(titles(&list.rows()), vec!["Festival del Vino"]);
    assert_eq!(list.count(), 1);
    Ok(())
}

#[tokio::test]
async fn failed_upload_aborts_submit()-> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    let list = app.dashboard.events();
    list.refresh().await?;

    app.backend.fail_next(500, "No se pudo subir la imagen");
    let outcome = list
        .submit(SubmitAction::Add(festival(vec![])?), Some(flyer()))
        .await;

    assert!(matches!(outcome, MutationOutcome::RolledBack(_)));
    assert_eq!(app.backend.hit_count("POST", "/events"), 0);
    assert!(list.rows().is_empty());
    let toast = app.dashboard.toasts.last().unwrap();
    assert_eq!(toast.toast_type, ToastType::Error);
    assert_eq!(toast.message, "No se pudo subir la imagen");
    Ok(())
}

#[tokio::test]
async fn unauthorized_upload_logs_out() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    let list = app.dashboard.events();

    app.backend.fail_next(401, "No autorizado");
    let result = list.upload_image(&flyer()).await;

    assert!(result.is_err());
    assert_eq!(app.dashboard.session.state(), AuthState::LoggedOut);
    assert_eq!(app.storage.clear_count(), 1);
    Ok(())
}

#[tokio::test]
async fn edit_without_image_keeps_flyer() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    let seeded = app.seed_events(2, &[])?;
    let list = app.dashboard.events();
    list.refresh().await?;

    let mut event = seeded[1].clone();
    event.title = "Evento 1 (reprogramado)".into();
    let saved = list
        .submit(SubmitAction::Edit(event), None)
        .await
        .committed()
        .unwrap();

    assert_eq!(saved.flyer, seeded[1].flyer);
    assert!(app.backend.uploads().is_empty());
    assert_eq!(titles(&list.rows()), vec!["Evento 0", "Evento 1 (reprogramado)"]);
    assert_eq!(
        app.dashboard.toasts.last().unwrap().message,
        "Evento editado correctamente"
    );
    Ok(())
}

#[tokio::test]
async fn expired_token_during_write_is_refreshed() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    let list = app.dashboard.events();
    list.refresh().await?;
    let old_token = app.dashboard.session.token();

    app.backend.expire_next_tokens(1);
    let outcome = list.add(festival(vec![])?).await;

    assert!(outcome.is_committed());
    assert_eq!(app.backend.hit_count("POST", "/events"), 2);
    assert_ne!(app.dashboard.session.token(), old_token);
    assert_eq!(app.dashboard.session.state(), AuthState::Verified);
    assert_eq!(titles(&list.rows()), vec!["Festival del Vino"]);
    Ok(())
}

#[tokio::test]
async fn delete_event() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    let seeded = app.seed_events(2, &[])?;
    let list = app.dashboard.events();
    list.refresh().await?;

    assert!(list.delete(&seeded[0].id.0).await.is_committed());

    assert_eq!(titles(&list.rows()), vec!["Evento 1"]);
    assert_eq!(list.count(), 1);
    assert_eq!(
        app.dashboard.toasts.last().unwrap().message,
        "Evento eliminado correctamente"
    );
    Ok(())
}

#[tokio::test]
async fn detail_toggles_published() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    // event 0 starts as a draft
    let seeded = app.seed_events(1, &[])?;
    let list = app.dashboard.events();
    list.refresh().await?;

    let detail = app.dashboard.event(seeded[0].id.clone());
    assert!(!detail.fetch().await?.published);

    let published = detail.toggle_published().await.committed().unwrap();
    assert!(published.published);
    assert_eq!(detail.event(), Some(published));
    assert_eq!(
        app.dashboard.toasts.last().unwrap().message,
        "El evento se ha publicado correctamente"
    );

    // lists refetch after the change
    list.ensure_loaded().await?;
    assert_eq!(app.backend.hit_count("GET", "/events"), 2);
    assert!(list.entities()[0].published);

    let draft = detail.toggle_published().await.committed().unwrap();
    assert!(!draft.published);
    assert_eq!(
        app.dashboard.toasts.last().unwrap().message,
        "El evento se ha convertido en borrador correctamente"
    );
    Ok(())
}
