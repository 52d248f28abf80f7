//! In-memory event store.
//!
//! Reference backend for tests and embedded use. Events live in a token
//! trie keyed by action path; per-aggregate sequences live in a map
//! keyed by the joined aggregate id. A single mutex makes every push
//! and filter atomic, and all fallible work of a push happens before
//! the first mutation so a failed push leaves the store untouched.

mod trie;

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tracing::instrument;

use crate::error::Result;
use crate::filter::{Filter, Reducer};
use crate::model::{Aggregate, Event};
use crate::push::PreparedPush;
use crate::store::EventStore;
use crate::subject::{validate_pattern, TextSubject};

use trie::{Node, StoredEvent};

#[derive(Debug, Default)]
struct Inner {
    root: Node,
    /// Highest sequence per aggregate, keyed by the dot-joined id.
    sequences: HashMap<String, u32>,
    /// Global insertion counter, drives delivery order.
    next_position: u64,
}

/// The volatile backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn ready(&self) -> Result<()> {
        Ok(())
    }

    #[instrument(skip_all, fields(aggregates = aggregates.len()))]
    async fn push(&self, aggregates: &[Aggregate]) -> Result<Vec<Event>> {
        let mut prepared = PreparedPush::new(aggregates);

        let mut inner = self.inner.lock();

        // Expectations are checked even for aggregates that carry no
        // commands in this call.
        for index in prepared.indexes.iter_mut() {
            index.current = inner
                .sequences
                .get(&index.id.join("."))
                .copied()
                .unwrap_or(0);
        }
        prepared.check_expected()?;

        if prepared.commands.is_empty() {
            return Ok(Vec::new());
        }

        // One timestamp per push, like the durable backend's
        // statement_timestamp() default.
        let created_at = Utc::now();
        let aggregate_idxs: Vec<usize> =
            prepared.commands.iter().map(|c| c.aggregate_idx).collect();
        let mut events = Vec::with_capacity(prepared.commands.len());
        for (order, &idx) in aggregate_idxs.iter().enumerate() {
            let sequence = prepared.next_sequence(idx);
            let command = prepared.commands[order].command;
            events.push(Event {
                aggregate: prepared.indexes[idx].id.clone(),
                action: command.action.clone(),
                revision: command.revision,
                payload: command.payload.clone(),
                sequence,
                created_at,
            });
        }

        // Nothing below can fail; the push is now committed.
        for event in &events {
            let position = inner.next_position;
            inner.next_position += 1;
            let path: Vec<TextSubject> = event.action.iter().cloned().collect();
            inner.root.insert(
                &path,
                StoredEvent {
                    position,
                    event: event.clone(),
                },
            );
        }
        for index in &prepared.indexes {
            inner.sequences.insert(index.id.join("."), index.current);
        }

        tracing::debug!(events = events.len(), "push committed");
        Ok(events)
    }

    #[instrument(skip_all, fields(queries = filter.queries.len()))]
    async fn filter(&self, filter: &Filter, reducer: &mut dyn Reducer) -> Result<()> {
        for query in &filter.queries {
            validate_pattern(&query.subjects)?;
        }

        let inner = self.inner.lock();

        // Merge across queries by global position: OR semantics with
        // duplicates delivered once, in creation order.
        let mut merged: BTreeMap<u64, &Event> = BTreeMap::new();
        let mut found = Vec::new();
        for query in &filter.queries {
            found.clear();
            inner.root.find(&query.subjects, &mut found);
            for stored in &found {
                let event = &stored.event;
                if query.sequence.from > 0 && event.sequence < query.sequence.from {
                    continue;
                }
                if query.sequence.to > 0 && event.sequence > query.sequence.to {
                    continue;
                }
                if let Some(from) = query.created_at.from {
                    if event.created_at < from {
                        continue;
                    }
                }
                if let Some(to) = query.created_at.to {
                    if event.created_at > to {
                        continue;
                    }
                }
                merged.entry(stored.position).or_insert(event);
            }
        }

        let limit = filter.limit.unwrap_or(u64::MAX);
        for event in merged.values().take(limit as usize) {
            reducer.reduce(std::slice::from_ref(*event))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{EventCollector, FilterQuery};
    use crate::model::Command;
    use crate::subject::{Subject, TextSubjects};

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

    async fn collect(store: &MemoryStore, filter: Filter) -> Vec<Event> {
        let mut collector = EventCollector::new();
        store.filter(&filter, &mut collector).await.unwrap();
        collector.into_events()
    }

    #[tokio::test]
    async fn failed_expectation_leaves_the_store_unchanged() {
        let store = MemoryStore::new();
        store
            .push(&[Aggregate::new(path(&["user", "1"]))
                .command(Command::new(path(&["user", "added"]), 1))])
            .await
            .unwrap();

        let err = store
            .push(&[
                Aggregate::new(path(&["user", "2"]))
                    .command(Command::new(path(&["user", "added"]), 1)),
                Aggregate::new(path(&["user", "1"]))
                    .with_current_sequence(0)
                    .command(Command::new(path(&["user", "removed"]), 1)),
            ])
            .await
            .unwrap_err();
        assert!(err.is_sequence_mismatch());

        // The sibling aggregate was rolled back too.
        let events = collect(&store, Filter::new(vec![FilterQuery::new(pattern(&["#"]))])).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].aggregate, path(&["user", "1"]));
    }

    #[tokio::test]
    async fn events_of_one_push_share_a_timestamp() {
        let store = MemoryStore::new();
        let events = store
            .push(&[Aggregate::new(path(&["user", "1"]))
                .command(Command::new(path(&["user", "added"]), 1))
                .command(Command::new(path(&["user", "removed"]), 1))])
            .await
            .unwrap();
        assert_eq!(events[0].created_at, events[1].created_at);
        assert_eq!(events[0].sequence, 1);
        assert_eq!(events[1].sequence, 2);
    }

    #[tokio::test]
    async fn empty_query_list_yields_nothing() {
        let store = MemoryStore::new();
        store
            .push(&[Aggregate::new(path(&["user", "1"]))
                .command(Command::new(path(&["user", "added"]), 1))])
            .await
            .unwrap();
        let events = collect(&store, Filter::default()).await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn overlapping_queries_deliver_each_event_once() {
        let store = MemoryStore::new();
        store
            .push(&[Aggregate::new(path(&["user", "1"]))
                .command(Command::new(path(&["user", "added"]), 1))])
            .await
            .unwrap();
        let events = collect(
            &store,
            Filter::new(vec![
                FilterQuery::new(pattern(&["user", "added"])),
                FilterQuery::new(pattern(&["user", "#"])),
            ]),
        )
        .await;
        assert_eq!(events.len(), 1);
    }
}
