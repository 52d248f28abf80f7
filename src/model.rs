//! Core data model: aggregates, commands, and events.
//!
//! An [`Aggregate`] is the unit of writing: a subject-addressed stream
//! plus the commands to append to it and an optional expectation about
//! the stream's current sequence. An [`Event`] is the unit of reading:
//! a stored, sequenced fact.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::subject::TextSubjects;

/// A write request against a single event stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    /// The stream's identity as a concrete subject path.
    pub id: TextSubjects,
    /// Commands appended in order. The stream's sequence advances by
    /// one per command.
    pub commands: Vec<Command>,
    /// Optimistic concurrency check: if set, the stream's highest
    /// stored sequence must equal this value or the whole push fails.
    /// `Some(0)` asserts the stream does not exist yet.
    pub current_sequence: Option<u32>,
}

impl Aggregate {
    pub fn new(id: TextSubjects) -> Self {
        Self {
            id,
            commands: Vec::new(),
            current_sequence: None,
        }
    }

    pub fn with_current_sequence(mut self, sequence: u32) -> Self {
        self.current_sequence = Some(sequence);
        self
    }

    pub fn command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }
}

/// One intended state change on an aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// What happened, as a concrete subject path (e.g. `user.added`).
    pub action: TextSubjects,
    /// Schema revision of the payload.
    pub revision: u16,
    /// Optional JSON payload. `None` is stored as SQL NULL.
    pub payload: Option<serde_json::Value>,
}

impl Command {
    pub fn new(action: TextSubjects, revision: u16) -> Self {
        Self {
            action,
            revision,
            payload: None,
        }
    }

    /// Attach a serializable payload.
    pub fn with_payload<T: Serialize>(mut self, payload: &T) -> Result<Self> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }
}

/// A stored fact. Events are immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// The stream this event belongs to.
    pub aggregate: TextSubjects,
    /// What happened.
    pub action: TextSubjects,
    /// Schema revision of the payload.
    pub revision: u16,
    /// Stored payload, if any.
    pub payload: Option<serde_json::Value>,
    /// Position within the aggregate's stream. Starts at 1 and is
    /// gap-free per aggregate.
    pub sequence: u32,
    /// Creation time assigned by the store. All events of one push
    /// share the same timestamp.
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Deserialize the payload into a typed value.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        let value = self.payload.clone().unwrap_or(serde_json::Value::Null);
        Ok(serde_json::from_value(value)?)
    }
}
