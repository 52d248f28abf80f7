//! Backend-independent push preparation.
//!
//! Both backends share the same write discipline: deduplicate the
//! submitted aggregates, resolve each one's current sequence, verify all
//! expectations before writing anything, then hand out per-command
//! sequences in submission order. This module holds the parts of that
//! discipline that do not touch storage.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::model::{Aggregate, Command};
use crate::subject::TextSubjects;

/// One deduplicated aggregate with its resolved write state.
#[derive(Debug)]
pub(crate) struct AggregateIndex {
    pub id: TextSubjects,
    /// Highest stored sequence, filled in by the backend before the
    /// expectation check. Zero means the stream does not exist.
    pub current: u32,
    /// The caller's expectation, if any. When the same aggregate id
    /// appears multiple times in a push, the first expectation wins.
    pub expected: Option<u32>,
}

/// A command paired with the index entry of its aggregate.
#[derive(Debug)]
pub(crate) struct PendingCommand<'a> {
    pub aggregate_idx: usize,
    pub command: &'a Command,
}

/// The deduplicated, ordered view of one push call.
#[derive(Debug)]
pub(crate) struct PreparedPush<'a> {
    pub indexes: Vec<AggregateIndex>,
    /// All commands in submission order, across aggregates.
    pub commands: Vec<PendingCommand<'a>>,
}

impl<'a> PreparedPush<'a> {
    /// Deduplicate aggregates by id, preserving first-seen order, and
    /// flatten the commands in submission order.
    pub fn new(aggregates: &'a [Aggregate]) -> Self {
        let mut indexes: Vec<AggregateIndex> = Vec::new();
        let mut by_id: HashMap<String, usize> = HashMap::new();
        let mut commands: Vec<PendingCommand<'a>> = Vec::new();

        for aggregate in aggregates {
            let key = aggregate.id.join(".");
            let idx = match by_id.get(&key) {
                Some(idx) => *idx,
                None => {
                    let idx = indexes.len();
                    by_id.insert(key, idx);
                    indexes.push(AggregateIndex {
                        id: aggregate.id.clone(),
                        current: 0,
                        expected: aggregate.current_sequence,
                    });
                    idx
                }
            };
            for command in &aggregate.commands {
                commands.push(PendingCommand {
                    aggregate_idx: idx,
                    command,
                });
            }
        }

        Self { indexes, commands }
    }

    /// Verify every expectation against the resolved current sequences.
    /// Must run after the backend fills in `current` and before any
    /// write.
    pub fn check_expected(&self) -> Result<()> {
        for index in &self.indexes {
            if let Some(expected) = index.expected {
                if expected != index.current {
                    return Err(Error::SequenceNotMatched {
                        aggregate: index.id.join("."),
                        expected,
                        current: index.current,
                    });
                }
            }
        }
        Ok(())
    }

    /// Assign the next sequence for the command's aggregate.
    pub fn next_sequence(&mut self, aggregate_idx: usize) -> u32 {
        self.indexes[aggregate_idx].current += 1;
        self.indexes[aggregate_idx].current
    }
}
