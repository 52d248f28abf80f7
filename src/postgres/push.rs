//! Transactional write path.
//!
//! One push is one transaction: lock every touched stream's head row,
//! check all sequence expectations, insert all events in a single
//! statement, then mirror the action tokens into the lookup table.
//! Postgres assigns `created_at` via the column default, so every event
//! of the push shares one timestamp.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::Result;
use crate::model::{Aggregate, Event};
use crate::push::PreparedPush;

const CURRENT_SEQUENCE: &str = "SELECT \"sequence\" FROM events WHERE \"aggregate\" = $1 ORDER BY \"sequence\" DESC LIMIT 1 FOR UPDATE";

pub(crate) async fn push(pool: &PgPool, aggregates: &[Aggregate]) -> Result<Vec<Event>> {
    let mut prepared = PreparedPush::new(aggregates);
    if prepared.indexes.is_empty() {
        return Ok(Vec::new());
    }

    let mut tx = pool.begin().await?;

    // Locks each stream head until commit so concurrent pushes to the
    // same aggregate serialize instead of racing on the sequence.
    for index in prepared.indexes.iter_mut() {
        let current: Option<i32> = sqlx::query_scalar(CURRENT_SEQUENCE)
            .bind(index.id.to_vec())
            .fetch_optional(&mut *tx)
            .await?;
        index.current = current.unwrap_or(0) as u32;
    }

    // Checked even for aggregates that carry no commands in this call.
    prepared.check_expected()?;

    if prepared.commands.is_empty() {
        tx.rollback().await?;
        return Ok(Vec::new());
    }

    let mut events = Vec::with_capacity(prepared.commands.len());
    let mut ids = Vec::with_capacity(prepared.commands.len());
    let mut insert = String::from(
        "INSERT INTO events (\"id\", \"aggregate\", \"action\", \"action_depth\", \"revision\", \"payload\", \"sequence\", \"in_tx_order\") VALUES ",
    );
    let mut placeholder = 1;
    let aggregate_idxs: Vec<usize> = prepared.commands.iter().map(|c| c.aggregate_idx).collect();
    for (order, &idx) in aggregate_idxs.iter().enumerate() {
        let sequence = prepared.next_sequence(idx);
        let command = prepared.commands[order].command;
        ids.push(Uuid::new_v4());
        events.push(Event {
            aggregate: prepared.indexes[idx].id.clone(),
            action: command.action.clone(),
            revision: command.revision,
            payload: command.payload.clone(),
            sequence,
            created_at: DateTime::<Utc>::MIN_UTC,
        });

        if order > 0 {
            insert.push_str(", ");
        }
        let _ = write!(
            insert,
            "(${}::UUID, ${}::TEXT[], ${}::TEXT[], ${}::INT2, ${}::INT2, ${}::JSONB, ${}::INT4, ${}::INT4)",
            placeholder,
            placeholder + 1,
            placeholder + 2,
            placeholder + 3,
            placeholder + 4,
            placeholder + 5,
            placeholder + 6,
            placeholder + 7,
        );
        placeholder += 8;
    }
    insert.push_str(" RETURNING \"created_at\"");

    let mut query = sqlx::query_scalar::<_, DateTime<Utc>>(&insert);
    for (order, event) in events.iter().enumerate() {
        query = query
            .bind(ids[order])
            .bind(event.aggregate.to_vec())
            .bind(event.action.to_vec())
            .bind(event.action.len() as i16)
            .bind(event.revision as i16)
            .bind(event.payload.clone())
            .bind(event.sequence as i32)
            .bind(order as i32);
    }
    let created: Vec<DateTime<Utc>> = query.fetch_all(&mut *tx).await?;
    for (event, created_at) in events.iter_mut().zip(created) {
        event.created_at = created_at;
    }

    insert_actions(&mut tx, &ids, &events).await?;

    tx.commit().await?;
    Ok(events)
}

/// One lookup row per action token, keyed by its position in the path.
async fn insert_actions(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    ids: &[Uuid],
    events: &[Event],
) -> Result<()> {
    let mut insert = String::from("INSERT INTO actions (\"event\", \"action\", \"depth\") VALUES ");
    let mut rows: Vec<(Uuid, String, i16)> = Vec::new();
    for (event_id, event) in ids.iter().zip(events) {
        for (depth, token) in event.action.iter().enumerate() {
            rows.push((*event_id, token.as_str().to_string(), depth as i16));
        }
    }

    let mut placeholder = 1;
    for i in 0..rows.len() {
        if i > 0 {
            insert.push_str(", ");
        }
        let _ = write!(
            insert,
            "(${}::UUID, ${}::TEXT, ${}::INT2)",
            placeholder,
            placeholder + 1,
            placeholder + 2,
        );
        placeholder += 3;
    }

    let mut query = sqlx::query(&insert);
    for (event_id, token, depth) in rows {
        query = query.bind(event_id).bind(token).bind(depth);
    }
    query.execute(&mut **tx).await?;

    Ok(())
}
