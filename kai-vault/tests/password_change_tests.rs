mod common;

use common::vault;
use kai_vault::{JournalUpdate, JournalVault, NewJournalEntry, VaultError, MIN_PASSWORD_LEN};
use pretty_assertions::assert_eq;
use std::sync::Arc;

const OLD: &str = "Correct-Horse-1!";
const NEW: &str = "New-Battery-9?";
const ANXIETY: &str = "I felt the waves of anxiety today 🌊";

async fn journal_with_entries(vault: &JournalVault, texts: &[&str]) -> Vec<String> {
    vault.register_account("alice", OLD).await.unwrap();
    let session = vault.require_session("alice", Some(OLD)).await.unwrap();
    let mut ids = Vec::new();
    for text in texts {
        let entry = vault
            .create_entry("alice", NewJournalEntry::text(*text), Some(&session))
            .await
            .unwrap();
        ids.push(entry.id);
    }
    ids
}

#[tokio::test]
async fn end_to_end_password_change() {
    let vault = vault();
    let ids = journal_with_entries(&vault, &[ANXIETY]).await;

    let outcome = vault.change_password("alice", OLD, NEW).await.unwrap();
    assert_eq!(outcome.entries_rotated, 1);

    assert!(matches!(
        vault.open_session("alice", Some(OLD)).await,
        Err(VaultError::InvalidCredentials)
    ));
    let session = vault.require_session("alice", Some(NEW)).await.unwrap();
    assert_eq!(session.key_hash(), outcome.new_key_hash);

    let entry = vault.get_entry("alice", &ids[0], Some(&session)).await.unwrap();
    assert_eq!(entry.content.as_deref(), Some(ANXIETY));
}

#[tokio::test]
async fn salt_survives_rotation() {
    let vault = vault();
    journal_with_entries(&vault, &["a"]).await;
    let before = vault.store().account("alice").unwrap().unwrap();

    vault.change_password("alice", OLD, NEW).await.unwrap();

    let after = vault.store().account("alice").unwrap().unwrap();
    assert_eq!(after.encryption_salt, before.encryption_salt);
    assert_ne!(after.encryption_key_hash, before.encryption_key_hash);
}

#[tokio::test]
async fn rotation_skips_plain_entries() {
    let vault = vault();
    journal_with_entries(&vault, &["sealed"]).await;
    let plain = vault
        .create_entry("alice", NewJournalEntry::text("plain"), None)
        .await
        .unwrap();

    let outcome = vault.change_password("alice", OLD, NEW).await.unwrap();
    assert_eq!(outcome.entries_rotated, 1);
    let stored = vault.store().entry("alice", &plain.id).unwrap().unwrap();
    assert_eq!(stored.content.as_deref(), Some("plain"));
}

#[tokio::test]
async fn empty_journal_still_changes_password() {
    let vault = vault();
    vault.register_account("alice", OLD).await.unwrap();

    let outcome = vault.change_password("alice", OLD, NEW).await.unwrap();
    assert_eq!(outcome.entries_rotated, 0);
    assert!(vault.require_session("alice", Some(NEW)).await.is_ok());
}

#[tokio::test]
async fn wrong_old_password_touches_nothing() {
    let vault = vault();
    let ids = journal_with_entries(&vault, &["one", "two"]).await;
    let account_before = vault.store().account("alice").unwrap().unwrap();
    let entries_before = vault.store().encrypted_entries("alice").unwrap();

    let result = vault.change_password("alice", "not-it", NEW).await;
    assert!(matches!(result, Err(VaultError::InvalidCredentials)));

    assert_eq!(vault.store().account("alice").unwrap().unwrap(), account_before);
    assert_eq!(vault.store().encrypted_entries("alice").unwrap(), entries_before);
    let session = vault.require_session("alice", Some(OLD)).await.unwrap();
    let entry = vault.get_entry("alice", &ids[1], Some(&session)).await.unwrap();
    assert_eq!(entry.content.as_deref(), Some("two"));
}

#[tokio::test]
async fn short_new_password_touches_nothing() {
    let vault = vault();
    let ids = journal_with_entries(&vault, &[ANXIETY]).await;
    let account_before = vault.store().account("alice").unwrap().unwrap();
    let entries_before = vault.store().encrypted_entries("alice").unwrap();

    for new_password in ["", "short", "7-chars"] {
        assert!(matches!(
            vault.change_password("alice", OLD, new_password).await,
            Err(VaultError::PasswordTooShort { min: MIN_PASSWORD_LEN })
        ));
    }

    assert_eq!(vault.store().account("alice").unwrap().unwrap(), account_before);
    assert_eq!(vault.store().encrypted_entries("alice").unwrap(), entries_before);
    let session = vault.require_session("alice", Some(OLD)).await.unwrap();
    let entry = vault.get_entry("alice", &ids[0], Some(&session)).await.unwrap();
    assert_eq!(entry.content.as_deref(), Some(ANXIETY));
}

#[tokio::test]
async fn eight_character_password_is_accepted() {
    let vault = vault();
    journal_with_entries(&vault, &["a"]).await;

    vault.change_password("alice", OLD, "8-chars!").await.unwrap();
    assert!(vault.require_session("alice", Some("8-chars!")).await.is_ok());
}

#[tokio::test]
async fn corrupted_entry_aborts_whole_rotation() {
    let vault = vault();
    let ids = journal_with_entries(&vault, &["one", "two", "three"]).await;

    let mut damaged = vault.store().entry("alice", &ids[1]).unwrap().unwrap();
    let mut token = damaged.encrypted_content.take().unwrap();
    let last = token.pop().unwrap();
    token.push(if last == 'A' { 'B' } else { 'A' });
    damaged.encrypted_content = Some(token);
    vault.store().update_entry(&damaged).unwrap();

    let account_before = vault.store().account("alice").unwrap().unwrap();
    let entries_before = vault.store().encrypted_entries("alice").unwrap();

    let err = vault.change_password("alice", OLD, NEW).await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("old password") && message.contains(&ids[1]));
    match err {
        VaultError::KeyRotation { entry_id } => assert_eq!(entry_id.as_deref(), Some(ids[1].as_str())),
        other => panic!("expected KeyRotation, got {other:?}"),
    }

    assert_eq!(vault.store().account("alice").unwrap().unwrap(), account_before);
    assert_eq!(vault.store().encrypted_entries("alice").unwrap(), entries_before);

    let session = vault.require_session("alice", Some(OLD)).await.unwrap();
    let first = vault.get_entry("alice", &ids[0], Some(&session)).await.unwrap();
    assert_eq!(first.content.as_deref(), Some("one"));
}

#[tokio::test]
async fn session_opened_before_rotation_cannot_write() {
    let vault = vault();
    let ids = journal_with_entries(&vault, &["before"]).await;
    let stale = vault.require_session("alice", Some(OLD)).await.unwrap();

    vault.change_password("alice", OLD, NEW).await.unwrap();

    assert!(matches!(
        vault
            .create_entry("alice", NewJournalEntry::text("late write"), Some(&stale))
            .await,
        Err(VaultError::InvalidCredentials)
    ));
    assert!(matches!(
        vault
            .update_entry(
                "alice",
                &ids[0],
                JournalUpdate {
                    content: Some("late edit".into()),
                    ..JournalUpdate::default()
                },
                Some(&stale),
            )
            .await,
        Err(VaultError::InvalidCredentials)
    ));
    assert_eq!(vault.store().entries_for_user("alice").unwrap().len(), 1);
}

#[tokio::test]
async fn legacy_account_cannot_change_encryption_password() {
    let vault = vault();
    vault
        .store()
        .create_account(&kai_vault::UserCredentialRecord {
            user_id: "legacy".into(),
            encryption_salt: None,
            encryption_key_hash: None,
        })
        .unwrap();

    assert!(matches!(
        vault.change_password("legacy", OLD, NEW).await,
        Err(VaultError::NotConfigured)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writes_land_under_one_key() {
    let vault = Arc::new(vault());
    journal_with_entries(&vault, &["seed"]).await;
    let session = Arc::new(vault.require_session("alice", Some(OLD)).await.unwrap());

    let writers: Vec<_> = (0..8)
        .map(|i| {
            let vault = Arc::clone(&vault);
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                vault
                    .create_entry("alice", NewJournalEntry::text(format!("note {i}")), Some(&*session))
                    .await
            })
        })
        .collect();
    let rotation = {
        let vault = Arc::clone(&vault);
        tokio::spawn(async move { vault.change_password("alice", OLD, NEW).await })
    };

    rotation.await.unwrap().unwrap();
    for writer in writers {
        match writer.await.unwrap() {
            Ok(_) | Err(VaultError::InvalidCredentials) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    // Every stored entry opens under the new password, none under the old.
    let fresh = vault.require_session("alice", Some(NEW)).await.unwrap();
    let entries = vault.list_entries("alice", Some(&fresh)).await.unwrap();
    assert!(!entries.is_empty());
    assert!(entries.iter().all(|e| e.content.is_some()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rotations_of_different_users_run_independently() {
    let vault = Arc::new(vault());
    for user in ["u1", "u2", "u3"] {
        vault.register_account(user, OLD).await.unwrap();
        let session = vault.require_session(user, Some(OLD)).await.unwrap();
        vault
            .create_entry(user, NewJournalEntry::text(user), Some(&session))
            .await
            .unwrap();
    }

    let tasks: Vec<_> = ["u1", "u2", "u3"]
        .into_iter()
        .map(|user| {
            let vault = Arc::clone(&vault);
            tokio::spawn(async move { vault.change_password(user, OLD, NEW).await })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap().entries_rotated, 1);
    }

    for user in ["u1", "u2", "u3"] {
        let session = vault.require_session(user, Some(NEW)).await.unwrap();
        let entries = vault.list_entries(user, Some(&session)).await.unwrap();
        assert_eq!(entries[0].content.as_deref(), Some(user));
    }
}
