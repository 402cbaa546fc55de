//! Store-level tests for the sync-critical queries: unread counts,
//! read-receipt idempotence, soft delete and the poll delta buckets.

use tempfile::TempDir;
use uuid::Uuid;

use thodibaat_db::{DELETED_PLACEHOLDER, Database, now_rfc3339};

fn open_db() -> (TempDir, Database) {
    let dir = TempDir::new().unwrap();
    let db = Database::open(&dir.path().join("test.db")).unwrap();
    (dir, db)
}

fn create_user(db: &Database, name: &str) -> String {
    let id = Uuid::new_v4().to_string();
    db.create_user(
        &id,
        name,
        &format!("{}@example.com", name),
        "hash",
        "{}",
        &now_rfc3339(),
    )
    .unwrap();
    id
}

fn create_direct(db: &Database, a: &str, b: &str) -> String {
    let id = Uuid::new_v4().to_string();
    db.create_direct_conversation(&id, a, b, None, &now_rfc3339())
        .unwrap();
    id
}

fn send(db: &Database, conversation: &str, sender: &str, content: &str) -> String {
    let id = Uuid::new_v4().to_string();
    db.send_message(&id, conversation, sender, content, "text", None, None, &now_rfc3339())
        .unwrap();
    id
}

#[test]
fn unread_count_excludes_own_read_and_deleted_messages() {
    let (_dir, db) = open_db();
    let alice = create_user(&db, "alice");
    let bob = create_user(&db, "bob");
    let conv = create_direct(&db, &alice, &bob);

    // Three from bob, pre-read by alice
    for i in 0..3 {
        send(&db, &conv, &bob, &format!("old {}", i));
    }
    db.mark_read(&conv, &alice, &now_rfc3339()).unwrap();

    // Two fresh from bob, one from alice herself, one deleted from bob
    send(&db, &conv, &bob, "new 1");
    send(&db, &conv, &bob, "new 2");
    send(&db, &conv, &alice, "mine");
    let deleted = send(&db, &conv, &bob, "gone");
    db.soft_delete_message(&deleted, &now_rfc3339()).unwrap();

    assert_eq!(db.unread_count(&conv, &alice).unwrap(), 2);
    // Bob has not read alice's message
    assert_eq!(db.unread_count(&conv, &bob).unwrap(), 1);
    assert_eq!(db.total_unread(&alice).unwrap(), 2);
}

#[test]
fn mark_read_is_idempotent() {
    let (_dir, db) = open_db();
    let alice = create_user(&db, "alice");
    let bob = create_user(&db, "bob");
    let conv = create_direct(&db, &alice, &bob);

    let msg = send(&db, &conv, &bob, "hello");

    assert_eq!(db.mark_read(&conv, &alice, &now_rfc3339()).unwrap(), 1);
    assert_eq!(db.mark_read(&conv, &alice, &now_rfc3339()).unwrap(), 0);

    let row = db.get_message(&conv, &msg).unwrap().unwrap();
    let readers = row.read_by_list();
    assert_eq!(readers.iter().filter(|id| **id == alice).count(), 1);
    assert!(readers.contains(&bob));
    assert_eq!(readers.len(), 2);
}

#[test]
fn mark_read_leaves_own_messages_untouched() {
    let (_dir, db) = open_db();
    let alice = create_user(&db, "alice");
    let bob = create_user(&db, "bob");
    let conv = create_direct(&db, &alice, &bob);

    let own = send(&db, &conv, &alice, "mine");
    db.mark_read(&conv, &alice, &now_rfc3339()).unwrap();

    let row = db.get_message(&conv, &own).unwrap().unwrap();
    assert_eq!(row.read_by_list(), vec![alice]);
}

#[test]
fn soft_delete_redacts_in_place() {
    let (_dir, db) = open_db();
    let alice = create_user(&db, "alice");
    let bob = create_user(&db, "bob");
    let conv = create_direct(&db, &alice, &bob);

    let id = Uuid::new_v4().to_string();
    db.send_message(
        &id,
        &conv,
        &alice,
        "secret",
        "image",
        Some("/uploads/x.png"),
        None,
        &now_rfc3339(),
    )
    .unwrap();
    let before = db.get_message(&conv, &id).unwrap().unwrap();

    db.soft_delete_message(&id, &now_rfc3339()).unwrap();

    let row = db.get_message(&conv, &id).unwrap().unwrap();
    assert!(row.is_deleted);
    assert_eq!(row.content, DELETED_PLACEHOLDER);
    assert_eq!(row.file_url, None);
    // Identity and ordering survive
    assert_eq!(row.id, before.id);
    assert_eq!(row.sender_id, before.sender_id);
    assert_eq!(row.created_at, before.created_at);

    let preview = db.last_message(&conv).unwrap().unwrap();
    assert!(preview.is_deleted);
}

#[test]
fn poll_buckets_separate_new_from_updated() {
    let (_dir, db) = open_db();
    let alice = create_user(&db, "alice");
    let bob = create_user(&db, "bob");
    let conv = create_direct(&db, &alice, &bob);

    let old = send(&db, &conv, &bob, "before cursor");
    std::thread::sleep(std::time::Duration::from_millis(5));
    let cursor = now_rfc3339();
    std::thread::sleep(std::time::Duration::from_millis(5));

    db.edit_message(&old, "edited", &now_rfc3339()).unwrap();
    let fresh = send(&db, &conv, &bob, "after cursor");

    let new_ids: Vec<String> = db
        .messages_created_since(&conv, &cursor)
        .unwrap()
        .into_iter()
        .map(|m| m.id)
        .collect();
    let updated_ids: Vec<String> = db
        .messages_updated_since(&conv, &cursor)
        .unwrap()
        .into_iter()
        .map(|m| m.id)
        .collect();

    assert_eq!(new_ids, vec![fresh]);
    assert_eq!(updated_ids, vec![old]);
}

#[test]
fn first_message_lands_after_conversation_creation_cursor() {
    let (_dir, db) = open_db();
    let alice = create_user(&db, "alice");
    let bob = create_user(&db, "bob");

    let conv = Uuid::new_v4().to_string();
    let msg = Uuid::new_v4().to_string();
    let created_at = now_rfc3339();
    db.create_direct_conversation(&conv, &alice, &bob, Some((&msg, "hi")), &created_at)
        .unwrap();

    // Polling with the conversation's own creation time as the cursor must
    // pick up the first message.
    let new = db.messages_created_since(&conv, &created_at).unwrap();
    assert_eq!(new.len(), 1);
    assert_eq!(new[0].id, msg);
    assert_eq!(new[0].read_by_list(), vec![alice.clone()]);
}

#[test]
fn blocking_is_checked_in_both_directions() {
    let (_dir, db) = open_db();
    let alice = create_user(&db, "alice");
    let bob = create_user(&db, "bob");

    assert!(!db.is_blocked_between(&alice, &bob).unwrap());
    db.block_user(&alice, &bob, &now_rfc3339()).unwrap();

    assert!(db.is_blocked_between(&alice, &bob).unwrap());
    assert!(db.is_blocked_between(&bob, &alice).unwrap());
    assert!(db.is_blocked(&alice, &bob).unwrap());
    assert!(!db.is_blocked(&bob, &alice).unwrap());

    assert_eq!(db.blocked_ids_for(&bob).unwrap(), vec![alice.clone()]);

    db.unblock_user(&alice, &bob).unwrap();
    assert!(!db.is_blocked_between(&alice, &bob).unwrap());
    // Unblocking twice is a no-op
    db.unblock_user(&alice, &bob).unwrap();
}

#[test]
fn find_direct_between_is_symmetric() {
    let (_dir, db) = open_db();
    let alice = create_user(&db, "alice");
    let bob = create_user(&db, "bob");
    let carol = create_user(&db, "carol");
    let conv = create_direct(&db, &alice, &bob);

    assert_eq!(db.find_direct_between(&alice, &bob).unwrap(), Some(conv.clone()));
    assert_eq!(db.find_direct_between(&bob, &alice).unwrap(), Some(conv));
    assert_eq!(db.find_direct_between(&alice, &carol).unwrap(), None);
}

#[test]
fn send_message_refreshes_conversation_cache() {
    let (_dir, db) = open_db();
    let alice = create_user(&db, "alice");
    let bob = create_user(&db, "bob");
    let conv = create_direct(&db, &alice, &bob);

    send(&db, &conv, &alice, "latest");

    let row = db.get_conversation(&conv).unwrap().unwrap();
    assert_eq!(row.last_message.as_deref(), Some("latest"));
    assert!(row.last_message_at.is_some());

    // Sender comes online as a side effect
    let sender = db.get_user_by_id(&alice).unwrap().unwrap();
    assert!(sender.is_online);
}

#[test]
fn delete_conversation_removes_messages_and_membership() {
    let (_dir, db) = open_db();
    let alice = create_user(&db, "alice");
    let bob = create_user(&db, "bob");
    let conv = create_direct(&db, &alice, &bob);
    send(&db, &conv, &alice, "bye");

    db.delete_conversation(&conv).unwrap();

    assert!(db.get_conversation(&conv).unwrap().is_none());
    assert!(!db.is_participant(&conv, &alice).unwrap());
    assert!(db.last_message(&conv).unwrap().is_none());
}

#[test]
fn group_update_adds_and_removes_members() {
    let (_dir, db) = open_db();
    let admin = create_user(&db, "admin");
    let bob = create_user(&db, "bob");
    let carol = create_user(&db, "carol");

    let conv = Uuid::new_v4().to_string();
    let msg = Uuid::new_v4().to_string();
    db.create_group_conversation(
        &conv,
        "friends",
        &admin,
        &[admin.clone(), bob.clone()],
        (&msg, "Group \"friends\" created"),
        &now_rfc3339(),
    )
    .unwrap();

    db.update_group(
        &conv,
        Some("old friends"),
        None,
        &[carol.clone()],
        &[bob.clone()],
        &now_rfc3339(),
    )
    .unwrap();

    let row = db.get_conversation(&conv).unwrap().unwrap();
    assert_eq!(row.name.as_deref(), Some("old friends"));
    assert!(db.is_participant(&conv, &carol).unwrap());
    assert!(!db.is_participant(&conv, &bob).unwrap());
    assert!(db.is_participant(&conv, &admin).unwrap());
}
