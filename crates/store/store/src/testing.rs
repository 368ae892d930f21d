use chrono::{Duration, NaiveDate, Utc};

use imagehoster_core::{ImageId, ImageRecord, NewComment, NewUser, Tag, User, UserProfile};

use crate::error::StoreError;
use crate::store::Store;

fn new_user(username: &str) -> NewUser {
    NewUser {
        username: username.to_owned(),
        password_hash: format!("hash-of-{username}"),
        profile: UserProfile {
            full_name: format!("{username} tester"),
            email_address: format!("{username}@example.com"),
            mobile_number: "0123456789".to_owned(),
        },
    }
}

fn record(owner: &User, title: &str, tags: Vec<Tag>) -> ImageRecord {
    ImageRecord {
        title: title.to_owned(),
        description: format!("{title} description"),
        image_file: "aW1hZ2U=".to_owned(),
        uploaded_at: Utc::now(),
        owner: owner.id,
        tags,
    }
}

fn comment(image_id: ImageId, author: &User, text: &str) -> NewComment {
    NewComment {
        text: text.to_owned(),
        created_on: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap_or_default(),
        author: author.id,
        image_id,
    }
}

/// Run the full store conformance test suite.
///
/// Call this from your backend's test module with a fresh, empty store.
///
/// # Errors
///
/// Returns an error if any store operation fails unexpectedly.
pub async fn run_store_conformance_tests(store: &dyn Store) -> Result<(), StoreError> {
    test_users(store).await?;
    test_tags(store).await?;
    test_image_lifecycle(store).await?;
    test_find_by_title(store).await?;
    test_comments(store).await?;
    test_image_delete_cascades(store).await?;
    test_user_delete_cascades(store).await?;
    test_sessions(store).await?;
    Ok(())
}

async fn test_users(store: &dyn Store) -> Result<(), StoreError> {
    let created = store.create_user(&new_user("conf-alice")).await?;
    assert_eq!(created.username, "conf-alice");
    assert_eq!(created.profile.email_address, "conf-alice@example.com");

    let by_id = store.get_user(created.id).await?;
    assert_eq!(by_id.as_ref(), Some(&created));

    let by_name = store.find_user_by_username("conf-alice").await?;
    assert_eq!(by_name.map(|u| u.id), Some(created.id));

    assert!(store.find_user_by_username("conf-nobody").await?.is_none());

    let dup = store.create_user(&new_user("conf-alice")).await;
    assert!(
        matches!(dup, Err(StoreError::Conflict(_))),
        "duplicate username should conflict"
    );
    Ok(())
}

async fn test_tags(store: &dyn Store) -> Result<(), StoreError> {
    assert!(store.find_tag("conf-tag").await?.is_none());

    let tag = store.create_tag("conf-tag").await?;
    assert_eq!(tag.name, "conf-tag");
    assert_eq!(store.find_tag("conf-tag").await?, Some(tag.clone()));

    // Case-sensitive names.
    assert!(store.find_tag("CONF-TAG").await?.is_none());

    let dup = store.create_tag("conf-tag").await;
    assert!(
        matches!(dup, Err(StoreError::Conflict(_))),
        "duplicate tag name should conflict"
    );
    Ok(())
}

async fn test_image_lifecycle(store: &dyn Store) -> Result<(), StoreError> {
    let owner = store.create_user(&new_user("conf-owner")).await?;
    let other = store.create_user(&new_user("conf-other")).await?;
    let nature = store.create_tag("conf-nature").await?;
    let photo = store.create_tag("conf-photo").await?;

    let tags = vec![nature.clone(), photo.clone(), nature.clone()];
    let image = store
        .insert_image(&record(&owner, "conf-sunset", tags))
        .await?;
    assert_eq!(image.title, "conf-sunset");
    assert_eq!(image.owner, owner.id);
    assert_eq!(image.owner_username, "conf-owner");
    assert_eq!(
        image.tag_names(),
        vec!["conf-nature", "conf-photo", "conf-nature"],
        "tag order and duplicates must survive insert"
    );

    let fetched = store.get_image(image.id).await?;
    assert_eq!(fetched.as_ref(), Some(&image));

    let all = store.list_images().await?;
    assert!(all.iter().any(|i| i.id == image.id));

    let mut replacement = record(&other, "conf-dusk", vec![photo.clone()]);
    replacement.image_file = "bmV3".to_owned();
    let replaced = store.replace_image(image.id, &replacement).await?;
    let replaced = replaced.expect("existing image should be replaced");
    assert_eq!(replaced.id, image.id);
    assert_eq!(replaced.title, "conf-dusk");
    assert_eq!(replaced.image_file, "bmV3");
    assert_eq!(replaced.owner, other.id);
    assert_eq!(replaced.owner_username, "conf-other");
    assert_eq!(replaced.tag_names(), vec!["conf-photo"]);

    let missing = store
        .replace_image(ImageId::new(i64::MAX), &replacement)
        .await?;
    assert!(missing.is_none(), "replacing a missing image returns None");

    assert!(store.get_image(ImageId::new(i64::MAX)).await?.is_none());
    Ok(())
}

async fn test_find_by_title(store: &dyn Store) -> Result<(), StoreError> {
    let owner = store.create_user(&new_user("conf-titles")).await?;
    let first = store
        .insert_image(&record(&owner, "conf-same-title", Vec::new()))
        .await?;
    let second = store
        .insert_image(&record(&owner, "conf-same-title", Vec::new()))
        .await?;
    assert_ne!(first.id, second.id, "duplicate titles are allowed");

    let found = store.find_image_by_title("conf-same-title").await?;
    assert_eq!(found.map(|i| i.id), Some(first.id));

    assert!(store.find_image_by_title("conf-no-such").await?.is_none());
    Ok(())
}

async fn test_comments(store: &dyn Store) -> Result<(), StoreError> {
    let owner = store.create_user(&new_user("conf-poster")).await?;
    let reader = store.create_user(&new_user("conf-reader")).await?;
    let image = store
        .insert_image(&record(&owner, "conf-commented", Vec::new()))
        .await?;

    assert!(store.comments_for_image(image.id).await?.is_empty());

    let first = store
        .insert_comment(&comment(image.id, &reader, "first"))
        .await?;
    let second = store
        .insert_comment(&comment(image.id, &owner, "second"))
        .await?;
    assert_eq!(first.author_username, "conf-reader");

    let comments = store.comments_for_image(image.id).await?;
    let ids: Vec<_> = comments.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![first.id, second.id], "oldest comment first");
    assert_eq!(comments[1].text, "second");
    assert_eq!(comments[1].author, owner.id);

    let orphan = store
        .insert_comment(&comment(ImageId::new(i64::MAX), &reader, "lost"))
        .await;
    assert!(
        matches!(orphan, Err(StoreError::MissingReference(_))),
        "comment on a missing image should be rejected"
    );
    Ok(())
}

async fn test_image_delete_cascades(store: &dyn Store) -> Result<(), StoreError> {
    let owner = store.create_user(&new_user("conf-deleter")).await?;
    let tag = store.create_tag("conf-kept-tag").await?;
    let image = store
        .insert_image(&record(&owner, "conf-doomed", vec![tag.clone()]))
        .await?;
    store
        .insert_comment(&comment(image.id, &owner, "bye"))
        .await?;

    assert!(store.delete_image(image.id).await?);
    assert!(store.get_image(image.id).await?.is_none());
    assert!(store.comments_for_image(image.id).await?.is_empty());
    assert_eq!(
        store.find_tag("conf-kept-tag").await?,
        Some(tag),
        "tags outlive the images they were attached to"
    );

    assert!(!store.delete_image(image.id).await?);
    Ok(())
}

async fn test_user_delete_cascades(store: &dyn Store) -> Result<(), StoreError> {
    let owner = store.create_user(&new_user("conf-leaving")).await?;
    let image = store
        .insert_image(&record(&owner, "conf-abandoned", Vec::new()))
        .await?;
    store
        .insert_comment(&comment(image.id, &owner, "last words"))
        .await?;

    assert!(store.delete_user(owner.id).await?);
    assert!(store.get_user(owner.id).await?.is_none());
    assert!(store.get_image(image.id).await?.is_none());
    assert!(store.comments_for_image(image.id).await?.is_empty());
    assert!(!store.delete_user(owner.id).await?);
    Ok(())
}

async fn test_sessions(store: &dyn Store) -> Result<(), StoreError> {
    let user = store.create_user(&new_user("conf-session")).await?;

    assert!(store.session_user("conf-missing").await?.is_none());

    store
        .create_session("conf-live", user.id, Utc::now() + Duration::hours(1))
        .await?;
    assert_eq!(store.session_user("conf-live").await?, Some(user.id));

    store
        .create_session("conf-stale", user.id, Utc::now() - Duration::seconds(1))
        .await?;
    assert!(
        store.session_user("conf-stale").await?.is_none(),
        "expired sessions are not resolved"
    );

    assert!(store.delete_session("conf-live").await?);
    assert!(store.session_user("conf-live").await?.is_none());
    assert!(!store.delete_session("conf-live").await?);

    store.purge_expired_sessions().await?;
    store
        .create_session("conf-lapsed", user.id, Utc::now() - Duration::seconds(1))
        .await?;
    assert_eq!(store.purge_expired_sessions().await?, 1);
    assert_eq!(store.purge_expired_sessions().await?, 0);

    store
        .create_session("conf-lapsed", user.id, Utc::now() - Duration::seconds(1))
        .await?;
    store
        .create_session("conf-next", user.id, Utc::now() + Duration::hours(1))
        .await?;
    assert_eq!(
        store.purge_expired_sessions().await?,
        0,
        "creating a session sweeps expired ones"
    );
    assert_eq!(store.session_user("conf-next").await?, Some(user.id));
    Ok(())
}
