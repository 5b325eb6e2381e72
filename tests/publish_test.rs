//! Publisher behavior against a recording in-memory destination.

mod common;

use common::{Call, FakeDestination};
use forum_migrator::config::{Pacing, PublishOptions};
use forum_migrator::constants::DISCORD_MESSAGE_LIMIT;
use forum_migrator::db::{
    insert_post_if_absent, upsert_forum, upsert_thread, Database, NewForum, NewPost, NewThread,
};
use forum_migrator::publish::{ContainerKind, Publisher};
use tempfile::TempDir;

const CATEGORY: &str = "Forum Archive";
const CHANNEL: &str = "general-chat";

async fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.sqlite");
    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

fn options() -> PublishOptions {
    PublishOptions {
        category_name: CATEGORY.to_string(),
        message_limit: DISCORD_MESSAGE_LIMIT,
        pacing: Pacing::none(),
    }
}

async fn add_forum(db: &Database) -> i64 {
    let forum = NewForum {
        url: "http://f/liste-1-1-1-chat.html".to_string(),
        group_name: Some("General".to_string()),
        title: "Chat".to_string(),
        description: Some("Talk about anything".to_string()),
        subjects: Some(3),
        replies: Some(12),
    };
    upsert_forum(db.pool(), &forum).await.unwrap()
}

/// Store a thread with one post per entry of `posts`, numbered from 1.
async fn add_thread(db: &Database, forum_id: i64, title: &str, posts: &[(&str, &str)]) -> i64 {
    let thread = NewThread {
        url: format!("http://f/sujet-1-1-{}-1-t.html", title.replace(' ', "_")),
        title: title.to_string(),
        author: posts.first().map(|(author, _)| (*author).to_string()),
        replies: None,
        views: None,
        last_date: None,
        last_author: None,
    };
    let thread_id = upsert_thread(db.pool(), &thread, forum_id).await.unwrap();

    for (number, (author, content)) in (1..).zip(posts) {
        let post = NewPost {
            author: (*author).to_string(),
            content: (*content).to_string(),
            post_date: Some("05/06/2016".to_string()),
        };
        insert_post_if_absent(db.pool(), thread_id, number, &post)
            .await
            .unwrap();
    }
    thread_id
}

#[tokio::test]
async fn test_threads_replayed_oldest_first() {
    let (db, _temp_dir) = setup_db().await;
    let forum_id = add_forum(&db).await;
    for title in ["newest", "older", "oldest"] {
        add_thread(&db, forum_id, title, &[("alice", "hello")]).await;
    }

    let destination = FakeDestination::new();
    let stats = Publisher::new(&destination, &db, options())
        .publish_all()
        .await
        .unwrap();

    assert_eq!(destination.conversation_titles(), ["oldest", "older", "newest"]);
    assert_eq!(stats.forums, 1);
    assert_eq!(stats.threads, 3);
    assert_eq!(stats.messages, 3);
    assert_eq!(stats.failures, 0);

    let calls = destination.calls();
    assert_eq!(
        calls[0],
        Call::CreateContainer {
            parent: None,
            name: CATEGORY.to_string(),
            kind: ContainerKind::Category,
        }
    );
    assert_eq!(
        calls[1],
        Call::CreateContainer {
            parent: Some("chan-1".to_string()),
            name: CHANNEL.to_string(),
            kind: ContainerKind::Forum,
        }
    );

    let closed = calls
        .iter()
        .filter(|call| matches!(call, Call::Close { .. }))
        .count();
    assert_eq!(closed, 3);
}

#[tokio::test]
async fn test_opening_and_reply_headers() {
    let (db, _temp_dir) = setup_db().await;
    let forum_id = add_forum(&db).await;
    add_thread(&db, forum_id, "greetings", &[("alice", "Hi all"), ("bob", "Welcome")]).await;

    let destination = FakeDestination::new();
    Publisher::new(&destination, &db, options())
        .publish_all()
        .await
        .unwrap();

    let messages = destination.messages_in("conv-1");
    assert_eq!(
        messages,
        [
            "**Original author:** alice\n**Date:** 05/06/2016\n\nHi all",
            "**bob** (05/06/2016):\nWelcome",
        ]
    );
}

#[tokio::test]
async fn test_existing_containers_are_reused() {
    let (db, _temp_dir) = setup_db().await;
    let forum_id = add_forum(&db).await;
    add_thread(&db, forum_id, "only", &[("alice", "hello")]).await;

    let destination = FakeDestination::new()
        .with_container(CATEGORY, ContainerKind::Category)
        .with_container(CHANNEL, ContainerKind::Forum);
    Publisher::new(&destination, &db, options())
        .publish_all()
        .await
        .unwrap();

    let created = destination
        .calls()
        .into_iter()
        .filter(|call| matches!(call, Call::CreateContainer { .. }))
        .count();
    assert_eq!(created, 0);
    assert!(matches!(
        &destination.calls()[0],
        Call::CreateConversation { container, .. } if container == "chan-2"
    ));
}

#[tokio::test]
async fn test_second_run_reuses_published_threads() {
    let (db, _temp_dir) = setup_db().await;
    let forum_id = add_forum(&db).await;
    add_thread(&db, forum_id, "first", &[("alice", "hello"), ("bob", "hi")]).await;

    let destination = FakeDestination::new();
    let first = Publisher::new(&destination, &db, options())
        .publish_all()
        .await
        .unwrap();
    assert_eq!(first.threads, 1);
    let calls_after_first = destination.calls().len();

    add_thread(&db, forum_id, "second", &[("carol", "late")]).await;
    let second = Publisher::new(&destination, &db, options())
        .publish_all()
        .await
        .unwrap();

    assert_eq!(destination.conversation_titles(), ["first", "second"]);
    assert_eq!(second.threads, 1);
    assert_eq!(second.threads_existing, 1);
    assert_eq!(second.failures, 0);

    // Nothing is sent to or closed on the conversation opened by the first run.
    let touched_again = destination.calls()[calls_after_first..]
        .iter()
        .any(|call| match call {
            Call::Send { conversation, .. } | Call::Close { conversation } => {
                conversation == "conv-1"
            }
            _ => false,
        });
    assert!(!touched_again);
    assert_eq!(destination.messages_in("conv-1").len(), 2);
}

#[tokio::test]
async fn test_falls_back_to_text_channel() {
    let (db, _temp_dir) = setup_db().await;
    let forum_id = add_forum(&db).await;
    add_thread(&db, forum_id, "only", &[("alice", "hello")]).await;

    let destination = FakeDestination {
        no_forum_channels: true,
        ..FakeDestination::default()
    };
    let stats = Publisher::new(&destination, &db, options())
        .publish_all()
        .await
        .unwrap();

    assert_eq!(stats.threads, 1);
    assert!(destination.calls().contains(&Call::CreateContainer {
        parent: Some("chan-1".to_string()),
        name: CHANNEL.to_string(),
        kind: ContainerKind::Text,
    }));
}

#[tokio::test]
async fn test_close_failure_is_not_fatal() {
    let (db, _temp_dir) = setup_db().await;
    let forum_id = add_forum(&db).await;
    add_thread(&db, forum_id, "first", &[("alice", "one")]).await;
    add_thread(&db, forum_id, "second", &[("bob", "two")]).await;

    let destination = FakeDestination {
        fail_close: true,
        ..FakeDestination::default()
    };
    let stats = Publisher::new(&destination, &db, options())
        .publish_all()
        .await
        .unwrap();

    assert_eq!(stats.threads, 2);
    assert_eq!(stats.failures, 0);
    assert_eq!(destination.conversation_titles(), ["second", "first"]);
}

#[tokio::test]
async fn test_send_failure_abandons_only_that_thread() {
    let (db, _temp_dir) = setup_db().await;
    let forum_id = add_forum(&db).await;
    add_thread(&db, forum_id, "healthy", &[("alice", "one"), ("bob", "two")]).await;
    add_thread(&db, forum_id, "broken", &[("carol", "start"), ("dave", "BOOM"), ("erin", "never")]).await;

    let destination = FakeDestination {
        fail_send_containing: Some("BOOM".to_string()),
        ..FakeDestination::default()
    };
    let stats = Publisher::new(&destination, &db, options())
        .publish_all()
        .await
        .unwrap();

    assert_eq!(stats.threads, 1);
    assert_eq!(stats.failures, 1);
    assert_eq!(destination.conversation_titles(), ["broken", "healthy"]);

    // The broken thread stops at the failing reply and is left open.
    assert_eq!(destination.messages_in("conv-1").len(), 1);
    assert!(!destination.calls().contains(&Call::Close {
        conversation: "conv-1".to_string()
    }));
    assert_eq!(destination.messages_in("conv-2").len(), 2);
}

#[tokio::test]
async fn test_long_posts_are_split() {
    let (db, _temp_dir) = setup_db().await;
    let forum_id = add_forum(&db).await;
    let opening = "Lorem ipsum dolor sit amet. ".repeat(180);
    let reply = "x".repeat(2500);
    add_thread(&db, forum_id, "long", &[("alice", opening.as_str()), ("bob", reply.as_str())]).await;

    let destination = FakeDestination::new();
    let stats = Publisher::new(&destination, &db, options())
        .publish_all()
        .await
        .unwrap();

    let messages = destination.messages_in("conv-1");
    assert!(messages.len() >= 5);
    assert_eq!(stats.messages, messages.len());
    for message in &messages {
        assert!(message.chars().count() <= DISCORD_MESSAGE_LIMIT);
    }

    assert!(messages[0].starts_with("**Original author:** alice"));
    assert!(messages[1].starts_with("*(continued 2)*\n"));

    let reply_start = messages
        .iter()
        .position(|m| m.starts_with("**bob**"))
        .expect("reply header sent");
    assert!(messages[reply_start + 1].starts_with("*(continued 2)*\n"));
}

#[tokio::test]
async fn test_thread_without_posts_is_skipped() {
    let (db, _temp_dir) = setup_db().await;
    let forum_id = add_forum(&db).await;
    add_thread(&db, forum_id, "empty", &[]).await;
    add_thread(&db, forum_id, "full", &[("alice", "hello")]).await;

    let destination = FakeDestination::new();
    let stats = Publisher::new(&destination, &db, options())
        .publish_all()
        .await
        .unwrap();

    assert_eq!(stats.threads_skipped, 1);
    assert_eq!(stats.threads, 1);
    assert_eq!(destination.conversation_titles(), ["full"]);
}
