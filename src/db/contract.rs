//! Behaviour every [`CrmStore`] must share. Each case expects an empty
//! store and is run against both implementations.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use pretty_assertions::assert_eq;

use super::{CrmStore, StoreError};
use crate::models::{
    hash_token, recent_since, Client, InteractionType, NewClient, NewInteraction, NewUser, Stage,
    StageCounts, StatisticsCounts, User,
};

/// PostgreSQL keeps microseconds
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

fn new_user(username: &str) -> NewUser {
    NewUser {
        username: username.to_string(),
        email: format!("{username}@example.com"),
        first_name: String::new(),
        last_name: String::new(),
        token_hash: hash_token(username),
    }
}

fn new_client(email: &str, created_by: Option<i32>, age_days: i64) -> NewClient {
    let at = now() - Duration::days(age_days);
    NewClient {
        first_name: "Grace".into(),
        last_name: "Hopper".into(),
        email: email.to_string(),
        phone: String::new(),
        company: String::new(),
        address: String::new(),
        notes: String::new(),
        stage: Stage::Lead,
        created_by,
        assigned_to: created_by,
        created_at: at,
        updated_at: at,
    }
}

fn call(client_id: i32, created_by: Option<i32>) -> NewInteraction {
    NewInteraction {
        client_id,
        interaction_type: InteractionType::Call,
        subject: "Call".into(),
        description: "Left a voicemail".into(),
        created_by,
        created_at: now(),
    }
}

async fn user(store: &dyn CrmStore, username: &str) -> User {
    store.create_user(&new_user(username)).await.unwrap()
}

pub async fn users_are_found_by_token_hash(store: &dyn CrmStore) {
    let alice = user(store, "alice").await;

    let found = store.find_user_by_token_hash(&hash_token("alice")).await.unwrap();
    assert_eq!(found, Some(alice.clone()));
    assert_eq!(store.get_user(alice.id).await.unwrap(), alice);
    assert_eq!(store.find_user_by_token_hash(&hash_token("nobody")).await.unwrap(), None);
    assert!(matches!(
        store.create_user(&new_user("alice")).await,
        Err(StoreError::UsernameTaken)
    ));
}

pub async fn clients_are_listed_newest_first_with_names_joined(store: &dyn CrmStore) {
    let alice = user(store, "alice").await;
    let older = store
        .create_client(&new_client("old@example.com", Some(alice.id), 5))
        .await
        .unwrap();
    let newer = store
        .create_client(&new_client("new@example.com", Some(alice.id), 1))
        .await
        .unwrap();

    let listed = store.list_clients(None).await.unwrap();
    let ids: Vec<i32> = listed.iter().map(|client| client.id).collect();
    assert_eq!(ids, vec![newer.id, older.id]);
    assert_eq!(listed[0].created_by_name.as_deref(), Some("alice"));
    assert_eq!(listed[0].assigned_to_name.as_deref(), Some("alice"));
    assert_eq!(store.get_client(older.id).await.unwrap(), older);
}

pub async fn stage_filter_is_exact(store: &dyn CrmStore) {
    let lead = store
        .create_client(&new_client("lead@example.com", None, 0))
        .await
        .unwrap();
    store
        .create_client(&NewClient {
            stage: Stage::Active,
            ..new_client("active@example.com", None, 0)
        })
        .await
        .unwrap();

    let leads = store.list_clients(Some(Stage::Lead)).await.unwrap();
    assert_eq!(leads, vec![lead]);
    assert!(store.list_clients(Some(Stage::InProgress)).await.unwrap().is_empty());
    assert_eq!(store.list_clients(Some(Stage::Active)).await.unwrap()[0].stage, Stage::Active);
}

pub async fn duplicate_email_is_rejected_on_create_and_update(store: &dyn CrmStore) {
    store
        .create_client(&new_client("dup@example.com", None, 0))
        .await
        .unwrap();
    let other = store
        .create_client(&new_client("other@example.com", None, 0))
        .await
        .unwrap();

    let err = store
        .create_client(&new_client("dup@example.com", None, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::EmailTaken));

    let renamed = Client {
        email: "dup@example.com".into(),
        ..other
    };
    let err = store.update_client(&renamed).await.unwrap_err();
    assert!(matches!(err, StoreError::EmailTaken));
}

pub async fn update_keeps_creator_and_creation_time(store: &dyn CrmStore) {
    let alice = user(store, "alice").await;
    let bob = user(store, "bob").await;
    let client = store
        .create_client(&new_client("keep@example.com", Some(alice.id), 3))
        .await
        .unwrap();

    let touched = now();
    let updated = store
        .update_client(&Client {
            company: "Navy".into(),
            assigned_to: Some(bob.id),
            updated_at: touched,
            ..client.clone()
        })
        .await
        .unwrap();

    assert_eq!(updated.company, "Navy");
    assert_eq!(updated.assigned_to_name.as_deref(), Some("bob"));
    assert_eq!(updated.created_by_name.as_deref(), Some("alice"));
    assert_eq!(updated.created_at, client.created_at);
    assert_eq!(updated.updated_at, touched);
}

pub async fn deleting_a_client_cascades_to_interactions(store: &dyn CrmStore) {
    let keep = store
        .create_client(&new_client("keep@example.com", None, 0))
        .await
        .unwrap();
    let closed = store
        .create_client(&new_client("drop@example.com", None, 0))
        .await
        .unwrap();
    let doomed = store.create_interaction(&call(closed.id, None)).await.unwrap();
    store.create_interaction(&call(keep.id, None)).await.unwrap();

    store.delete_client(closed.id).await.unwrap();

    assert!(matches!(
        store.get_interaction(doomed.id).await,
        Err(StoreError::NotFound)
    ));
    assert!(store.list_interactions(Some(closed.id)).await.unwrap().is_empty());
    assert_eq!(store.list_interactions(None).await.unwrap().len(), 1);
    assert!(matches!(store.delete_client(closed.id).await, Err(StoreError::NotFound)));
}

pub async fn deleting_a_user_clears_references_but_keeps_records(store: &dyn CrmStore) {
    let bob = user(store, "bob").await;
    let client = store
        .create_client(&new_client("kept@example.com", Some(bob.id), 0))
        .await
        .unwrap();
    let interaction = store
        .create_interaction(&call(client.id, Some(bob.id)))
        .await
        .unwrap();
    assert_eq!(interaction.created_by_name.as_deref(), Some("bob"));

    store.delete_user("bob").await.unwrap();

    let client = store.get_client(client.id).await.unwrap();
    assert_eq!(client.created_by, None);
    assert_eq!(client.created_by_name, None);
    assert_eq!(client.assigned_to, None);
    let interaction = store.get_interaction(interaction.id).await.unwrap();
    assert_eq!(interaction.created_by, None);
    assert_eq!(interaction.created_by_name, None);
    assert!(matches!(store.delete_user("bob").await, Err(StoreError::NotFound)));
}

pub async fn change_stage_updates_client_and_records_note(store: &dyn CrmStore) {
    let alice = user(store, "alice").await;
    let client = store
        .create_client(&new_client("stage@example.com", None, 2))
        .await
        .unwrap();
    let audit =
        NewInteraction::stage_change(client.id, Stage::Lead, Stage::Active, alice.id, "alice", now());

    let updated = store
        .change_stage(client.id, Stage::Active, &audit)
        .await
        .unwrap();

    assert_eq!(updated.stage, Stage::Active);
    assert_eq!(updated.updated_at, audit.created_at);
    assert_eq!(updated.created_at, client.created_at);
    let notes = store.list_interactions(Some(client.id)).await.unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].interaction_type, InteractionType::Note);
    assert_eq!(notes[0].subject, audit.subject);
    assert_eq!(notes[0].created_by_name.as_deref(), Some("alice"));

    assert!(matches!(
        store.change_stage(client.id + 1000, Stage::Lead, &audit).await,
        Err(StoreError::NotFound)
    ));
    assert_eq!(store.list_interactions(None).await.unwrap().len(), 1);
}

pub async fn interaction_for_missing_client_is_rejected(store: &dyn CrmStore) {
    assert!(matches!(
        store.create_interaction(&call(42, None)).await,
        Err(StoreError::NotFound)
    ));

    let client = store
        .create_client(&new_client("real@example.com", None, 0))
        .await
        .unwrap();
    let interaction = store.create_interaction(&call(client.id, None)).await.unwrap();
    let moved = crate::models::ClientInteraction {
        client_id: client.id + 1000,
        ..interaction
    };
    assert!(matches!(
        store.update_interaction(&moved).await,
        Err(StoreError::NotFound)
    ));
}

pub async fn statistics_match_a_tally_of_the_listings(store: &dyn CrmStore) {
    let alice = user(store, "alice").await;
    let bob = user(store, "bob").await;
    let fresh = store
        .create_client(&new_client("fresh@example.com", Some(alice.id), 0))
        .await
        .unwrap();
    store
        .create_client(&new_client("stale@example.com", Some(bob.id), 40))
        .await
        .unwrap();
    store
        .create_client(&NewClient {
            stage: Stage::Active,
            ..new_client("won@example.com", Some(alice.id), 1)
        })
        .await
        .unwrap();
    store
        .create_client(&NewClient {
            stage: Stage::InProgress,
            assigned_to: None,
            ..new_client("open@example.com", None, 2)
        })
        .await
        .unwrap();
    store.create_interaction(&call(fresh.id, None)).await.unwrap();
    store
        .create_interaction(&NewInteraction {
            created_at: now() - Duration::days(40),
            ..call(fresh.id, None)
        })
        .await
        .unwrap();

    let since = recent_since(now());
    let counts = store.statistics(since).await.unwrap();

    assert_eq!(
        counts,
        StatisticsCounts {
            by_stage: StageCounts {
                lead: 2,
                in_progress: 1,
                active: 1,
            },
            recent_clients: 3,
            by_staff: BTreeMap::from([("alice".to_string(), 2), ("bob".to_string(), 1)]),
            total_interactions: 2,
            recent_interactions: 1,
        }
    );
    let clients = store.list_clients(None).await.unwrap();
    let interactions = store.list_interactions(None).await.unwrap();
    assert_eq!(counts, StatisticsCounts::tally(&clients, &interactions, since));
}

pub async fn statistics_of_an_empty_store_are_zero(store: &dyn CrmStore) {
    let counts = store.statistics(recent_since(now())).await.unwrap();
    assert_eq!(counts, StatisticsCounts::default());
}
