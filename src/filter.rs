//! Query model: filters, bounds, and the reducer seam.
//!
//! A [`Filter`] is one or more [`FilterQuery`]s combined with OR. Each
//! query names a subject pattern plus optional sequence and timestamp
//! bounds. Results are streamed into a [`Reducer`] in global order.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::Event;
use crate::subject::Subject;

/// A read request. Queries are OR-combined; an event matching several
/// queries is delivered once.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    pub queries: Vec<FilterQuery>,
    /// Maximum number of events delivered, applied after merging.
    pub limit: Option<u64>,
}

impl Filter {
    pub fn new(queries: Vec<FilterQuery>) -> Self {
        Self {
            queries,
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One disjunct of a [`Filter`].
#[derive(Debug, Clone)]
pub struct FilterQuery {
    /// Pattern the event's action path must match.
    pub subjects: Vec<Subject>,
    pub sequence: SequenceFilter,
    pub created_at: CreatedAtFilter,
}

impl FilterQuery {
    pub fn new(subjects: Vec<Subject>) -> Self {
        Self {
            subjects,
            sequence: SequenceFilter::default(),
            created_at: CreatedAtFilter::default(),
        }
    }

    pub fn sequence_from(mut self, from: u32) -> Self {
        self.sequence.from = from;
        self
    }

    pub fn sequence_to(mut self, to: u32) -> Self {
        self.sequence.to = to;
        self
    }

    pub fn created_after(mut self, from: DateTime<Utc>) -> Self {
        self.created_at.from = Some(from);
        self
    }

    pub fn created_before(mut self, to: DateTime<Utc>) -> Self {
        self.created_at.to = Some(to);
        self
    }
}

/// Inclusive sequence bounds. Zero means unbounded on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceFilter {
    pub from: u32,
    pub to: u32,
}

/// Inclusive creation-time bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreatedAtFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Consumes filtered events in delivery order.
///
/// Backends call [`Reducer::reduce`] with small batches (possibly single
/// events) as results arrive; an error aborts the filter and is returned
/// to the caller.
pub trait Reducer: Send {
    fn reduce(&mut self, events: &[Event]) -> Result<()>;
}

/// A reducer that simply collects every event it sees.
#[derive(Debug, Default)]
pub struct EventCollector {
    pub events: Vec<Event>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_events(self) -> Vec<Event> {
        self.events
    }
}

impl Reducer for EventCollector {
    fn reduce(&mut self, events: &[Event]) -> Result<()> {
        self.events.extend_from_slice(events);
        Ok(())
    }
}
