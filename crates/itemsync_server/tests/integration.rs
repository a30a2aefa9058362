//! Integration tests for the sync server, driven through the CBOR front
//! door the way a transport would drive it.

use itemsync_protocol::{
    ClientToServerMessage, ClientToServerResponse, CommitResponse, DataType,
    DataTypeProgressMarker, EntryResponse, ErrorCode, GetUpdatesResponse, Message,
    ProgressToken, RequestContents, SyncEntity,
};
use itemsync_server::{ServerConfig, SyncServer};
use itemsync_testkit::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

fn send(server: &SyncServer, client: &str, request: &ClientToServerMessage) -> ClientToServerResponse {
    let raw = server
        .handle_command(Some(client), &request.encode().unwrap())
        .unwrap();
    ClientToServerResponse::decode(&raw).unwrap()
}

fn commit(server: &SyncServer, client: &mut TestClient, entries: Vec<SyncEntity>) -> CommitResponse {
    let response = send(server, &client.cache_guid.clone(), &client.commit(entries));
    client.absorb(&response);
    response.commit().cloned().unwrap()
}

fn get_updates(server: &SyncServer, client: &mut TestClient) -> GetUpdatesResponse {
    let response = send(server, &client.cache_guid.clone(), &client.get_updates());
    assert_eq!(response.error_code, ErrorCode::Success);
    client.absorb(&response);
    response.get_updates().cloned().unwrap()
}

fn id_of(result: &EntryResponse) -> String {
    result.id_string.clone().unwrap()
}

#[test]
fn authenticate_reports_account() {
    let server = SyncServer::default();
    let response = send(&server, "c1", &authenticate_request());

    assert_eq!(response.error_code, ErrorCode::Success);
    assert_eq!(response.store_birthday, server.store_birthday());
    let auth = response.authenticate().unwrap();
    assert_eq!(auth.email, "syncjuser@chromium");
    assert_eq!(auth.display_name, "Sync J User");
}

#[test]
fn parent_and_child_in_one_batch() {
    let server = SyncServer::default();
    let mut client = TestClient::new("g1");

    let results = commit(
        &server,
        &mut client,
        vec![folder("1", "0"), bookmark("2", "1")],
    )
    .entry_responses;
    assert!(results.iter().all(EntryResponse::is_success));

    let parent_id = id_of(&results[0]);
    assert_ne!(parent_id, "1");
    let child = server.entity(&id_of(&results[1])).unwrap();
    assert_eq!(child.parent_id_string.as_deref(), Some(parent_id.as_str()));
}

#[test]
fn recommit_of_new_entry_conflicts() {
    let server = SyncServer::default();
    let mut client = TestClient::new("g1");
    let entry = bookmark("-1", "0");

    let first = commit(&server, &mut client, vec![entry.clone()]).entry_responses;
    assert!(first[0].is_success());
    assert_eq!(first[0].version, Some(1));

    let second = commit(&server, &mut client, vec![entry]).entry_responses;
    assert!(!second[0].is_success());
    assert_eq!(server.version(), 1);
}

#[test]
fn fresh_account_serves_permanent_folders() {
    let server = SyncServer::default();
    let mut client = TestClient::new("g1").subscribe(&[DataType::Bookmark]);

    let updates = get_updates(&server, &mut client);
    let names: Vec<&str> = updates.entries.iter().map(|e| e.name.as_str()).collect();
    assert!(names.contains(&"Bookmarks"));
    assert!(names.contains(&"Bookmark Bar"));
    assert!(names.contains(&"Other Bookmarks"));
    assert!(!names.contains(&"Preferences"));
    assert!(updates.entries.iter().all(|e| e.folder));
    assert_eq!(updates.changes_remaining, 0);

    let marker = client.marker(DataType::Bookmark).unwrap();
    let token = ProgressToken::decode(marker.token.as_deref().unwrap()).unwrap();
    assert_eq!(token, ProgressToken::new(server.version(), 1));
}

#[test]
fn bookmarks_can_live_under_permanent_folders() {
    let server = SyncServer::default();
    let mut client = TestClient::new("g1").subscribe(&[DataType::Bookmark]);
    get_updates(&server, &mut client);

    let bar = server.permanent_item_id("bookmark_bar").unwrap();
    let results = commit(&server, &mut client, vec![bookmark("-1", &bar)]).entry_responses;
    assert!(results[0].is_success());

    let updates = get_updates(&server, &mut client);
    assert_eq!(updates.entries.len(), 1);
    assert_eq!(updates.entries[0].parent_id_string.as_deref(), Some(bar.as_str()));
}

#[test]
fn tagged_creation_is_idempotent() {
    let server = SyncServer::default();
    let mut alice = TestClient::new("alice").subscribe(&[DataType::Bookmark]);
    let mut bob = TestClient::new("bob");
    get_updates(&server, &mut alice);
    let folders = server.entity_count();
    let tagged = |id: &str| EntityBuilder::new(id).client_tag("shared").build();

    let created = commit(&server, &mut alice, vec![tagged("-1")]).entry_responses;
    let id = id_of(&created[0]);

    let duplicate = commit(&server, &mut bob, vec![tagged("-9")]).entry_responses;
    assert!(!duplicate[0].is_success());
    assert_eq!(server.entity_count(), folders + 1);

    let stored = server.entity(&id).unwrap();
    let deletion = EntityBuilder::from_entity(stored).deleted().build();
    assert!(commit(&server, &mut alice, vec![deletion]).entry_responses[0].is_success());

    let revived = commit(&server, &mut bob, vec![tagged("-9")]).entry_responses;
    assert!(revived[0].is_success());
    assert_eq!(id_of(&revived[0]), id);
    assert_eq!(server.entity_count(), folders + 1);
}

#[test]
fn tagged_entries_may_omit_their_parent() {
    let server = SyncServer::default();
    let mut client = TestClient::new("g1").subscribe(&[DataType::Preference]);
    get_updates(&server, &mut client);

    let mut preference = EntityBuilder::new("-1")
        .data_type(DataType::Preference)
        .client_tag("homepage")
        .build();
    preference.parent_id_string = None;
    let results = commit(&server, &mut client, vec![preference]).entry_responses;
    assert!(results[0].is_success());

    let stored = server.entity(&id_of(&results[0])).unwrap();
    assert_eq!(
        stored.parent_id_string,
        server.permanent_item_id("google_chrome_preferences")
    );
    assert!(stored.id_string.starts_with("37702^1^<client tag>"));
}

#[test]
fn untagged_ids_carry_their_origin() {
    let server = SyncServer::default();
    let mut client = TestClient::new("g1");
    let results = commit(&server, &mut client, vec![bookmark("-1", "0")]).entry_responses;
    assert_eq!(id_of(&results[0]), "32904^1^<server ID originally>g1/-1");
}

#[test]
fn every_subscribed_cursor_is_returned() {
    let server = SyncServer::default();
    let mut client = TestClient::new("g1").subscribe(&[DataType::Bookmark, DataType::Theme]);
    get_updates(&server, &mut client);

    let updates = get_updates(&server, &mut client);
    assert!(updates.entries.is_empty());
    let types: Vec<DataType> = updates
        .new_progress_marker
        .iter()
        .map(|marker| marker.data_type)
        .collect();
    assert_eq!(types, vec![DataType::Bookmark, DataType::Theme]);
}

#[test]
fn mobile_bookmarks_folder_on_request() {
    let server = SyncServer::default();
    let synced = server.permanent_item_id("synced_bookmarks").unwrap();

    let mut plain = TestClient::new("plain").subscribe(&[DataType::Bookmark]);
    get_updates(&server, &mut plain);
    assert!(server.entity(&synced).is_none());

    let mut request = TestClient::new("mobile")
        .subscribe(&[DataType::Bookmark])
        .get_updates();
    if let RequestContents::GetUpdates(message) = &mut request.contents {
        message.create_mobile_bookmarks_folder = true;
    }
    let response = send(&server, "mobile", &request);
    let updates = response.get_updates().unwrap();
    assert!(updates.entries.iter().any(|entry| entry.id_string == synced));
    assert_eq!(server.entity(&synced).unwrap().name, "Synced Bookmarks");
}

#[test]
fn synced_bookmarks_can_be_created_on_demand() {
    let server = SyncServer::default();
    let mut client = TestClient::new("g1").subscribe(&[DataType::Bookmark]);
    get_updates(&server, &mut client);

    server.create_synced_bookmarks();
    let updates = get_updates(&server, &mut client);
    assert_eq!(updates.entries.len(), 1);
    assert_eq!(
        updates.entries[0].server_defined_unique_tag.as_deref(),
        Some("synced_bookmarks")
    );
}

#[test]
fn deleting_a_folder_tombstones_the_subtree() {
    let server = SyncServer::default();
    let mut writer = TestClient::new("writer");
    let mut reader = TestClient::new("reader").subscribe(&[DataType::Bookmark]);

    let results = commit(
        &server,
        &mut writer,
        vec![
            folder("-1", "0"),
            folder("-2", "-1"),
            bookmark("-3", "-2"),
            bookmark("-4", "-2"),
            bookmark("-5", "-1"),
        ],
    )
    .entry_responses;
    assert!(results.iter().all(EntryResponse::is_success));
    get_updates(&server, &mut reader);
    let before = server.version();

    let top = server.entity(&id_of(&results[0])).unwrap();
    let response = commit(
        &server,
        &mut writer,
        vec![EntityBuilder::from_entity(top).deleted().build()],
    );
    assert!(response.entry_responses[0].is_success());
    assert_eq!(response.entry_responses[0].version, Some(before + 5));
    assert_eq!(response.entry_responses[0].name, None);

    let updates = get_updates(&server, &mut reader);
    assert_eq!(updates.entries.len(), 5);
    assert!(updates.entries.iter().all(|e| e.deleted && e.name.is_empty()));
    let versions: HashSet<i64> = updates.entries.iter().map(|e| e.version).collect();
    assert_eq!(versions.len(), 5);
    assert!(versions.iter().all(|v| *v > before));
}

#[test]
fn tombstones_reach_clients_of_other_types() {
    let server = SyncServer::default();
    let mut writer = TestClient::new("writer");
    let mut themes = TestClient::new("themes").subscribe(&[DataType::Theme]);
    get_updates(&server, &mut themes);

    let pref = EntityBuilder::new("-1").data_type(DataType::Preference).build();
    let stored = commit(&server, &mut writer, vec![pref]).entry_responses;
    let entity = server.entity(&id_of(&stored[0])).unwrap();
    commit(
        &server,
        &mut writer,
        vec![EntityBuilder::from_entity(entity).deleted().build()],
    );

    let updates = get_updates(&server, &mut themes);
    assert_eq!(updates.entries.len(), 1);
    assert!(updates.entries[0].deleted);
}

#[test]
fn inserting_after_the_previous_keeps_order() {
    let server = SyncServer::default();
    let mut client = TestClient::new("g1");

    let mut previous: Option<String> = None;
    let mut positions = Vec::new();
    for i in 1..=6 {
        let mut builder = EntityBuilder::new(format!("-{i}"));
        if let Some(after) = &previous {
            builder = builder.after(after.clone());
        }
        let result = &commit(&server, &mut client, vec![builder.build()]).entry_responses[0];
        positions.push(result.position_in_parent.unwrap());
        previous = Some(id_of(result));
    }
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn repeated_insertion_after_one_item_interleaves() {
    let server = SyncServer::default();
    let mut client = TestClient::new("g1");

    let first = commit(&server, &mut client, vec![bookmark("-1", "0")]).entry_responses;
    let anchor = id_of(&first[0]);
    let last = commit(&server, &mut client, vec![bookmark("-2", "0")]).entry_responses;
    let end = last[0].position_in_parent.unwrap();

    let mut previous = end;
    for i in 3..8 {
        let entry = EntityBuilder::new(format!("-{i}")).after(anchor.clone()).build();
        let result = &commit(&server, &mut client, vec![entry]).entry_responses[0];
        let position = result.position_in_parent.unwrap();
        assert!(position > 0 && position < previous);
        previous = position;
    }

    let front = EntityBuilder::new("-9").first().build();
    let result = &commit(&server, &mut client, vec![front]).entry_responses[0];
    assert_eq!(result.position_in_parent, Some(-(1 << 20)));
}

#[test]
fn paging_keeps_cursor_monotonic() {
    let server = SyncServer::new(ServerConfig::new().with_batch_size(4));
    let mut writer = TestClient::new("writer");
    let mut reader = TestClient::new("reader").subscribe(&[DataType::Preference]);

    let entries: Vec<SyncEntity> = (1..=10)
        .map(|i| {
            let data_type = if i % 3 == 0 {
                DataType::Preference
            } else {
                DataType::Bookmark
            };
            EntityBuilder::new(format!("-{i}")).data_type(data_type).build()
        })
        .collect();
    commit(&server, &mut writer, entries);

    let mut cursor = 0;
    let mut received = 0;
    loop {
        let updates = get_updates(&server, &mut reader);
        received += updates.entries.len();
        let marker = reader.marker(DataType::Preference).unwrap();
        let token = ProgressToken::decode(marker.token.as_deref().unwrap()).unwrap();
        assert!(token.timestamp >= cursor);
        cursor = token.timestamp;
        if updates.changes_remaining == 0 {
            break;
        }
    }
    assert_eq!(cursor, server.version());
    // Three preferences plus the top-level and preferences folders.
    assert_eq!(received, 5);
}

#[test]
fn legacy_cursor_round_trip() {
    let server = SyncServer::default();
    let mut writer = TestClient::new("writer");
    commit(&server, &mut writer, vec![bookmark("-1", "0"), bookmark("-2", "0")]);

    let response = send(&server, "legacy", &legacy_get_updates(0, &[DataType::Bookmark]));
    let updates = response.get_updates().unwrap();
    assert!(updates.new_progress_marker.is_empty());
    let cursor = updates.new_timestamp.unwrap();
    assert_eq!(cursor, server.version());

    let response = send(&server, "legacy", &legacy_get_updates(cursor, &[DataType::Bookmark]));
    let updates = response.get_updates().unwrap();
    assert!(updates.entries.is_empty());
    assert_eq!(updates.new_timestamp, None);
}

#[test]
fn empty_subscription_is_a_noop() {
    let server = SyncServer::default();
    let mut client = TestClient::new("idle");
    let updates = get_updates(&server, &mut client);

    assert!(updates.entries.is_empty());
    assert_eq!(updates.changes_remaining, 0);
    assert!(updates.new_progress_marker.is_empty());
    assert_eq!(server.entity_count(), 0);
}

#[test]
fn migration_forces_resync() {
    let server = SyncServer::default();
    let mut client = TestClient::new("g1").subscribe(&[DataType::Bookmark, DataType::Theme]);
    get_updates(&server, &mut client);
    let results = commit(&server, &mut client, vec![folder("-1", "0")]).entry_responses;
    let old_folder = id_of(&results[0]);
    get_updates(&server, &mut client);

    server.trigger_migration(&[DataType::Bookmark]);

    let response = send(&server, "g1", &client.get_updates());
    assert_eq!(response.error_code, ErrorCode::MigrationDone);
    assert_eq!(response.migrated_data_types, vec![DataType::Bookmark]);

    let stale_commit = client.commit(vec![bookmark("-2", &old_folder)]);
    let response = send(&server, "g1", &stale_commit);
    assert_eq!(response.error_code, ErrorCode::MigrationDone);
    assert!(response.commit().is_none());

    client.reset();
    let updates = get_updates(&server, &mut client);
    let folder = updates
        .entries
        .iter()
        .find(|e| e.originator_client_item_id.as_deref() == Some("-1"))
        .unwrap();
    assert_ne!(folder.id_string, old_folder);
    assert!(folder.id_string.starts_with("32904^2^"));

    let marker = client.marker(DataType::Bookmark).unwrap();
    let token = ProgressToken::decode(marker.token.as_deref().unwrap()).unwrap();
    assert_eq!(token.migration_version, 2);

    let results = commit(&server, &mut client, vec![bookmark("-2", &folder.id_string)]);
    assert!(results.entry_responses[0].is_success());
}

#[test]
fn legacy_marker_upgrade_is_migration_checked() {
    let server = SyncServer::default();
    server.trigger_migration(&[DataType::Session]);

    let marker = DataTypeProgressMarker {
        data_type: DataType::Session,
        token: None,
        timestamp_token_for_migration: Some(12),
    };
    let request = ClientToServerMessage::new(itemsync_protocol::RequestContents::GetUpdates(
        itemsync_protocol::GetUpdatesMessage::with_markers(vec![marker]),
    ));
    let response = send(&server, "old", &request);
    assert_eq!(response.error_code, ErrorCode::MigrationDone);
    assert_eq!(response.migrated_data_types, vec![DataType::Session]);
}

#[test]
fn birthday_reset_requires_fresh_sync() {
    let server = SyncServer::default();
    let mut client = TestClient::new("g1").subscribe(&[DataType::Bookmark]);
    get_updates(&server, &mut client);

    let new_birthday = server.reset_store_birthday();
    let response = send(&server, "g1", &client.get_updates());
    assert_eq!(response.error_code, ErrorCode::NotMyBirthday);
    assert_eq!(response.store_birthday, new_birthday);

    client.reset();
    get_updates(&server, &mut client);
    let response = send(&server, "g1", &client.get_updates());
    assert_eq!(response.error_code, ErrorCode::Success);
}

#[test]
fn malformed_request_never_touches_the_account() {
    let server = SyncServer::default();
    let err = server.handle_command(Some("bad"), &[0x9f, 0x01]).unwrap_err();
    assert!(err.is_client_error());
    assert_eq!(server.entity_count(), 0);
}

#[test]
fn concurrent_commits_get_unique_versions() {
    let server = Arc::new(SyncServer::default());
    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let server = Arc::clone(&server);
            thread::spawn(move || {
                let mut client = TestClient::new(format!("worker{worker}"));
                (0..25)
                    .map(|i| {
                        let result =
                            commit(&server, &mut client, vec![bookmark(&format!("-{i}"), "0")]);
                        result.entry_responses[0].version.unwrap()
                    })
                    .collect::<Vec<i64>>()
            })
        })
        .collect();

    let mut versions = HashSet::new();
    for handle in handles {
        for version in handle.join().unwrap() {
            assert!(versions.insert(version));
        }
    }
    assert_eq!(versions.len(), 100);
    assert_eq!(server.version(), 100);
    assert_eq!(server.entity_count(), 100);
}
