use dashboard::hooks::{Choice, UserFilter};
use payloads::Role;
use payloads::requests::NewUser;
use test_helpers::spawn_app;

fn dana() -> NewUser {
    NewUser {
        name: "Dana".into(),
        last_name: "Durán".into(),
        username: "dana".into(),
        email: "dana@example.com".into(),
        password: "dana-password".into(),
        role: Role::Admin,
        active: true,
    }
}

#[tokio::test]
async fn role_filter_matches_any_selected_role() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.seed_users(10)?;
    app.login_alice().await?;
    let list = app.dashboard.users();

    list.update_filter(UserFilter::Role(vec![Role::Admin, Role::Super]));
    list.refresh().await?;

    let users = list.entities();
    // usuario000 and usuario005 are admins, alice is super
    assert_eq!(users.len(), 3);
    assert!(users.iter().all(|u| u.role >= Role::Admin));
    assert_eq!(list.count(), 11);
    assert_eq!(users[0].username, "alice");
    Ok(())
}

#[tokio::test]
async fn verified_filter() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.seed_users(8)?;
    let list = app.dashboard.users();

    list.update_filter(UserFilter::Verified(Choice::Yes));
    list.refresh().await?;

    // usuario000 and usuario004 are unverified
    assert_eq!(list.filtered_count(), 7);
    assert!(list.entities().iter().all(|u| u.verified));
    Ok(())
}

#[tokio::test]
async fn user_crud_messages() -> anyhow::Result<()> {
    let app = spawn_app().await;
    app.login_alice().await?;
    let list = app.dashboard.users();
    list.refresh().await?;

    let created = list.add(dana()).await.committed().unwrap();
    assert_eq!(created.username, "dana");
    assert!(!created.verified);
    assert_eq!(
        app.dashboard.toasts.last().unwrap().message,
        "Usuario dana creado correctamente"
    );
    // the password never ends up in the document
    let stored = app.backend.find("users", &created.id.0).unwrap();
    assert!(stored.get("password").is_none());

    let mut edited = created.clone();
    edited.email = "dana@cultura.ensenada.gob.mx".into();
    list.edit(edited).await.committed().unwrap();
    assert_eq!(
        app.dashboard.toasts.last().unwrap().message,
        "Usuario dana editado correctamente"
    );

    assert!(list.delete(&created.id.0).await.is_committed());
    assert_eq!(
        app.dashboard.toasts.last().unwrap().message,
        "Usuario eliminado correctamente"
    );
    assert_eq!(list.count(), 1);
    Ok(())
}

#[tokio::test]
async fn get_reads_through_cache() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let seeded = app.seed_users(1)?;
    let list = app.dashboard.users();

    let user = list.get(&seeded[0].id.0).await?;
    assert_eq!(user, seeded[0]);
    list.get(&seeded[0].id.0).await?;

    let path = format!("/users/{}", seeded[0].id.0);
    assert_eq!(app.backend.hit_count("GET", &path), 1);
    Ok(())
}
