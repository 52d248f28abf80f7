//! Behavioral suite run against the in-memory backend. Every guarantee
//! here holds for any `EventStore` implementation.

use serde::{Deserialize, Serialize};
use streambed::prelude::*;

fn path(tokens: &[&str]) -> TextSubjects {
    TextSubjects::new(tokens.iter().copied()).unwrap()
}

fn pattern(tokens: &[&str]) -> Vec<Subject> {
    tokens.iter()
        .map(|s| match *s {
            "*" => Subject::Any,
            "#" => Subject::All,
            token => Subject::text(token).unwrap(),
        })
        .collect()
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct UserAdded {
    first_name: String,
}

fn user_added(name: &str) -> Command {
    Command::new(path(&["user", "added"]), 1)
        .with_payload(&UserAdded {
            first_name: name.to_string(),
        })
        .unwrap()
}

fn user_removed() -> Command {
    Command::new(path(&["user", "removed"]), 1)
}

async fn collect(store: &MemoryStore, filter: Filter) -> Vec<Event> {
    let mut collector = EventCollector::new();
    store.filter(&filter, &mut collector).await.unwrap();
    collector.into_events()
}

async fn collect_pattern(store: &MemoryStore, tokens: &[&str]) -> Vec<Event> {
    collect(store, Filter::new(vec![FilterQuery::new(pattern(tokens))])).await
}

#[tokio::test]
async fn ready_succeeds() {
    let store = MemoryStore::new();
    store.ready().await.unwrap();
}

#[tokio::test]
async fn push_assigns_sequences_from_one() {
    let store = MemoryStore::new();
    let events = store
        .push(&[Aggregate::new(path(&["user", "1"]))
            .command(user_added("gigi"))
            .command(user_removed())])
        .await
        .unwrap();

    assert_eq!(events.len(), 2);
    assert_eq!(events[0].sequence, 1);
    assert_eq!(events[1].sequence, 2);
    assert_eq!(events[0].action, path(&["user", "added"]));
    assert_eq!(events[1].action, path(&["user", "removed"]));
}

#[tokio::test]
async fn sequences_continue_across_pushes() {
    let store = MemoryStore::new();
    store
        .push(&[Aggregate::new(path(&["user", "1"])).command(user_added("gigi"))])
        .await
        .unwrap();
    let events = store
        .push(&[Aggregate::new(path(&["user", "1"])).command(user_removed())])
        .await
        .unwrap();
    assert_eq!(events[0].sequence, 2);
}

#[tokio::test]
async fn duplicate_aggregates_in_one_push_share_a_sequence_counter() {
    let store = MemoryStore::new();
    let events = store
        .push(&[
            Aggregate::new(path(&["user", "1"])).command(user_added("gigi")),
            Aggregate::new(path(&["user", "1"])).command(user_removed()),
        ])
        .await
        .unwrap();
    assert_eq!(events[0].sequence, 1);
    assert_eq!(events[1].sequence, 2);
}

#[tokio::test]
async fn filter_returns_events_in_creation_order() {
    let store = MemoryStore::new();
    store
        .push(&[Aggregate::new(path(&["user", "1"])).command(user_added("gigi"))])
        .await
        .unwrap();
    store
        .push(&[Aggregate::new(path(&["user", "2"])).command(user_added("allo"))])
        .await
        .unwrap();
    store
        .push(&[Aggregate::new(path(&["user", "1"])).command(user_removed())])
        .await
        .unwrap();

    let events = collect_pattern(&store, &["user", "#"]).await;
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].aggregate, path(&["user", "1"]));
    assert_eq!(events[1].aggregate, path(&["user", "2"]));
    assert_eq!(events[2].action, path(&["user", "removed"]));
}

#[tokio::test]
async fn filter_is_repeatable() {
    let store = MemoryStore::new();
    store
        .push(&[Aggregate::new(path(&["user", "1"])).command(user_added("gigi"))])
        .await
        .unwrap();

    let first = collect_pattern(&store, &["user", "#"]).await;
    let second = collect_pattern(&store, &["user", "#"]).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn wildcard_queries_match_like_the_subject_algebra() {
    let store = MemoryStore::new();
    store
        .push(&[Aggregate::new(path(&["user", "1"]))
            .command(user_added("gigi"))
            .command(Command::new(path(&["user", "firstName", "set"]), 1))])
        .await
        .unwrap();
    store
        .push(&[Aggregate::new(path(&["group", "7"]))
            .command(Command::new(path(&["group", "added"]), 1))])
        .await
        .unwrap();

    assert_eq!(collect_pattern(&store, &["user", "added"]).await.len(), 1);
    assert_eq!(collect_pattern(&store, &["*", "added"]).await.len(), 2);
    assert_eq!(collect_pattern(&store, &["user", "#"]).await.len(), 2);
    assert_eq!(collect_pattern(&store, &["#"]).await.len(), 3);
    // Exact patterns need the exact token count.
    assert_eq!(collect_pattern(&store, &["user", "*"]).await.len(), 1);
    assert!(collect_pattern(&store, &["user"]).await.is_empty());
}

#[tokio::test]
async fn or_queries_deduplicate() {
    let store = MemoryStore::new();
    store
        .push(&[Aggregate::new(path(&["user", "1"])).command(user_added("gigi"))])
        .await
        .unwrap();

    let events = collect(
        &store,
        Filter::new(vec![
            FilterQuery::new(pattern(&["user", "added"])),
            FilterQuery::new(pattern(&["#"])),
        ]),
    )
    .await;
    assert_eq!(events.len(), 1);
}

#[tokio::test]
async fn limit_caps_the_merged_result() {
    let store = MemoryStore::new();
    for _ in 0..5 {
        store
            .push(&[Aggregate::new(path(&["user", "1"])).command(user_added("gigi"))])
            .await
            .unwrap();
    }

    let events = collect(
        &store,
        Filter::new(vec![FilterQuery::new(pattern(&["#"]))]).with_limit(2),
    )
    .await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].sequence, 1);
    assert_eq!(events[1].sequence, 2);
}

#[tokio::test]
async fn sequence_bounds_are_inclusive() {
    let store = MemoryStore::new();
    let mut aggregate = Aggregate::new(path(&["user", "1"]));
    for _ in 0..5 {
        aggregate = aggregate.command(user_added("gigi"));
    }
    store.push(&[aggregate]).await.unwrap();

    let events = collect(
        &store,
        Filter::new(vec![FilterQuery::new(pattern(&["#"]))
            .sequence_from(2)
            .sequence_to(4)]),
    )
    .await;
    let sequences: Vec<u32> = events.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, vec![2, 3, 4]);
}

#[tokio::test]
async fn created_at_bounds_are_inclusive() {
    let store = MemoryStore::new();
    let first = store
        .push(&[Aggregate::new(path(&["user", "1"])).command(user_added("gigi"))])
        .await
        .unwrap();

    let at = first[0].created_at;
    let events = collect(
        &store,
        Filter::new(vec![FilterQuery::new(pattern(&["#"]))
            .created_after(at)
            .created_before(at)]),
    )
    .await;
    assert_eq!(events.len(), 1);
}

#[tokio::test]
async fn expectation_success_and_failure() {
    let store = MemoryStore::new();
    store
        .push(&[Aggregate::new(path(&["user", "1"]))
            .with_current_sequence(0)
            .command(user_added("gigi"))])
        .await
        .unwrap();

    // Stale expectation fails and writes nothing.
    let err = store
        .push(&[Aggregate::new(path(&["user", "1"]))
            .with_current_sequence(0)
            .command(user_removed())])
        .await
        .unwrap_err();
    assert!(err.is_sequence_mismatch());
    assert_eq!(collect_pattern(&store, &["#"]).await.len(), 1);

    // Matching expectation succeeds.
    let events = store
        .push(&[Aggregate::new(path(&["user", "1"]))
            .with_current_sequence(1)
            .command(user_removed())])
        .await
        .unwrap();
    assert_eq!(events[0].sequence, 2);
}

#[tokio::test]
async fn failed_push_rolls_back_every_aggregate() {
    let store = MemoryStore::new();
    store
        .push(&[Aggregate::new(path(&["user", "1"])).command(user_added("gigi"))])
        .await
        .unwrap();

    let err = store
        .push(&[
            Aggregate::new(path(&["user", "2"])).command(user_added("allo")),
            Aggregate::new(path(&["user", "1"]))
                .with_current_sequence(5)
                .command(user_removed()),
        ])
        .await
        .unwrap_err();
    assert!(err.is_sequence_mismatch());

    assert!(collect_pattern(&store, &["#"]).await.len() == 1);
    assert!(collect(
        &store,
        Filter::new(vec![FilterQuery::new(pattern(&["user", "added"]))
            .sequence_from(1)])
    )
    .await
    .iter()
    .all(|e| e.aggregate == path(&["user", "1"])));
}

#[tokio::test]
async fn typed_payload_round_trip() {
    let store = MemoryStore::new();
    store
        .push(&[Aggregate::new(path(&["user", "1"])).command(user_added("gigi"))])
        .await
        .unwrap();

    let events = collect_pattern(&store, &["user", "added"]).await;
    let payload: UserAdded = events[0].payload().unwrap();
    assert_eq!(payload.first_name, "gigi");
}

#[tokio::test]
async fn invalid_pattern_is_rejected() {
    let store = MemoryStore::new();
    let mut collector = EventCollector::new();
    let filter = Filter::new(vec![FilterQuery::new(vec![Subject::All, Subject::Any])]);
    assert!(store.filter(&filter, &mut collector).await.is_err());
}

#[tokio::test]
async fn expectation_is_checked_without_commands() {
    let store = MemoryStore::new();
    store
        .push(&[Aggregate::new(path(&["user", "1"])).command(user_added("gigi"))])
        .await
        .unwrap();

    // A command-less aggregate still asserts its sequence.
    let err = store
        .push(&[Aggregate::new(path(&["user", "1"])).with_current_sequence(0)])
        .await
        .unwrap_err();
    assert!(err.is_sequence_mismatch());

    let events = store
        .push(&[Aggregate::new(path(&["user", "1"])).with_current_sequence(1)])
        .await
        .unwrap();
    assert!(events.is_empty());
}

#[tokio::test]
async fn empty_push_is_a_no_op() {
    let store = MemoryStore::new();
    let events = store.push(&[]).await.unwrap();
    assert!(events.is_empty());
    assert!(collect_pattern(&store, &["#"]).await.is_empty());
}
