//! Filter-to-SQL compilation and execution.
//!
//! Subject patterns compile against the `actions` lookup table: the
//! first literal token anchors a subquery over `actions`, every further
//! literal becomes a self-join aliased by its pattern position, and the
//! pattern's cardinality becomes a predicate on `events.action_depth`.
//! Wildcards contribute no join at all. Queries of one filter are
//! OR-combined; results stream in global creation order.

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use sqlx::postgres::PgArguments;
use sqlx::{Arguments, PgPool};

use crate::error::{Error, Result};
use crate::filter::{Filter, FilterQuery, Reducer};
use crate::model::Event;
use crate::subject::{validate_pattern, Subject, TextSubjects};

/// Reads see only transactions that started before every currently
/// open write. Keeps a long-running push from being skipped by
/// concurrent readers and then surfacing out of order later. Scoped to
/// the current database so writers elsewhere on the cluster do not
/// hold back reads here.
const OPEN_PUSH_BARRIER: &str = "e.\"created_at\" < (SELECT COALESCE(MIN(xact_start), statement_timestamp()) FROM pg_stat_activity WHERE backend_xid IS NOT NULL AND datname = current_database())";

const SELECT_EVENTS: &str = "SELECT e.\"aggregate\", e.\"action\", e.\"revision\", e.\"payload\", e.\"sequence\", e.\"created_at\" FROM events e WHERE ";

const ORDER_BY: &str = " ORDER BY e.\"created_at\", e.\"in_tx_order\"";

// ═══════════════════════════════════════════════════════════════════════════════
// Statement model
// ═══════════════════════════════════════════════════════════════════════════════

/// A bind argument of a compiled statement. Kept as an enum so the
/// compiler stays a pure, testable function.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SqlArg {
    Text(String),
    I16(i16),
    I32(i32),
    I64(i64),
    Timestamp(DateTime<Utc>),
}

impl SqlArg {
    fn add_to(&self, args: &mut PgArguments) {
        match self {
            SqlArg::Text(v) => args.add(v.clone()),
            SqlArg::I16(v) => args.add(*v),
            SqlArg::I32(v) => args.add(*v),
            SqlArg::I64(v) => args.add(*v),
            SqlArg::Timestamp(v) => args.add(*v),
        }
    }
}

/// A compiled filter: SQL text plus its arguments in placeholder order.
#[derive(Debug, PartialEq)]
pub(crate) struct FilterStatement {
    pub sql: String,
    pub args: Vec<SqlArg>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Compilation
// ═══════════════════════════════════════════════════════════════════════════════

/// Compile a whole filter into one SELECT. The caller must have checked
/// that the filter has at least one query.
pub(crate) fn build_filter_statement(filter: &Filter) -> Result<FilterStatement> {
    for query in &filter.queries {
        validate_pattern(&query.subjects)?;
    }

    let mut args = Vec::new();
    let mut clauses = Vec::with_capacity(filter.queries.len());
    for query in &filter.queries {
        clauses.push(format!("({})", query_to_clause(query, &mut args)));
    }

    let mut sql = String::from(SELECT_EVENTS);
    sql.push('(');
    sql.push_str(&clauses.join(" OR "));
    sql.push_str(") AND ");
    sql.push_str(OPEN_PUSH_BARRIER);
    sql.push_str(ORDER_BY);

    if let Some(limit) = filter.limit {
        args.push(SqlArg::I64(limit as i64));
        sql.push_str(&format!(" LIMIT ${}", args.len()));
    }

    Ok(FilterStatement { sql, args })
}

fn query_to_clause(query: &FilterQuery, args: &mut Vec<SqlArg>) -> String {
    let mut parts = Vec::new();

    if let Some(subquery) = subjects_to_subquery(&query.subjects, args) {
        parts.push(subquery);
    }
    parts.push(action_depth_clause(&query.subjects, args));

    if query.sequence.from > 0 {
        args.push(SqlArg::I32(query.sequence.from as i32));
        parts.push(format!("e.\"sequence\" >= ${}", args.len()));
    }
    if query.sequence.to > 0 {
        args.push(SqlArg::I32(query.sequence.to as i32));
        parts.push(format!("e.\"sequence\" <= ${}", args.len()));
    }
    if let Some(from) = query.created_at.from {
        args.push(SqlArg::Timestamp(from));
        parts.push(format!("e.\"created_at\" >= ${}", args.len()));
    }
    if let Some(to) = query.created_at.to {
        args.push(SqlArg::Timestamp(to));
        parts.push(format!("e.\"created_at\" <= ${}", args.len()));
    }

    parts.join(" AND ")
}

/// The `actions` subquery for a pattern's literal tokens, or `None` for
/// wildcard-only patterns (those are fully decided by the depth clause).
fn subjects_to_subquery(subjects: &[Subject], args: &mut Vec<SqlArg>) -> Option<String> {
    let mut literals = subjects.iter().enumerate().filter_map(|(i, s)| match s {
        Subject::Text(token) => Some((i, token)),
        _ => None,
    });

    let (anchor_depth, anchor) = literals.next()?;

    let mut sql = String::from("e.\"id\" IN (SELECT a.\"event\" FROM actions a");
    for (depth, token) in literals {
        args.push(SqlArg::Text(token.as_str().to_string()));
        let action_param = args.len();
        args.push(SqlArg::I16(depth as i16));
        let depth_param = args.len();
        sql.push_str(&format!(
            " JOIN actions a{depth} ON a.\"event\" = a{depth}.\"event\" AND a{depth}.\"action\" = ${action_param} AND a{depth}.\"depth\" = ${depth_param}"
        ));
    }

    args.push(SqlArg::Text(anchor.as_str().to_string()));
    let action_param = args.len();
    args.push(SqlArg::I16(anchor_depth as i16));
    let depth_param = args.len();
    sql.push_str(&format!(
        " WHERE a.\"action\" = ${action_param} AND a.\"depth\" = ${depth_param})"
    ));

    Some(sql)
}

/// Cardinality predicate: exact token count, or at least `len - 1` when
/// the pattern ends in the multi-token wildcard.
fn action_depth_clause(subjects: &[Subject], args: &mut Vec<SqlArg>) -> String {
    if matches!(subjects.last(), Some(Subject::All)) {
        args.push(SqlArg::I16(subjects.len() as i16 - 1));
        format!("e.\"action_depth\" >= ${}", args.len())
    } else {
        args.push(SqlArg::I16(subjects.len() as i16));
        format!("e.\"action_depth\" = ${}", args.len())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Execution
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    aggregate: Vec<String>,
    action: Vec<String>,
    revision: i16,
    payload: Option<serde_json::Value>,
    sequence: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for Event {
    type Error = Error;

    fn try_from(row: EventRow) -> Result<Self> {
        Ok(Event {
            aggregate: TextSubjects::try_from(row.aggregate)?,
            action: TextSubjects::try_from(row.action)?,
            revision: row.revision as u16,
            payload: row.payload,
            sequence: row.sequence as u32,
            created_at: row.created_at,
        })
    }
}

pub(crate) async fn filter(
    pool: &PgPool,
    filter: &Filter,
    reducer: &mut dyn Reducer,
) -> Result<()> {
    if filter.queries.is_empty() {
        return Ok(());
    }

    let statement = build_filter_statement(filter)?;
    tracing::debug!(sql = %statement.sql, "executing filter");

    let mut args = PgArguments::default();
    for arg in &statement.args {
        arg.add_to(&mut args);
    }

    let mut rows = sqlx::query_as_with::<_, EventRow, _>(&statement.sql, args).fetch(pool);
    while let Some(row) = rows.try_next().await? {
        let event = Event::try_from(row)?;
        reducer.reduce(std::slice::from_ref(&event))?;
    }

    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
