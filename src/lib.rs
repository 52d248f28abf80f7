//! # Streambed
//!
//! A subject-addressed event store with optimistic concurrency and
//! hierarchical wildcard queries.
//!
//! ## Architecture
//!
//! - **Subjects**: events are addressed by ordered token paths; queries
//!   use `*` (one token) and `#` (remaining tokens) wildcards
//! - **Push**: atomic multi-aggregate writes with gap-free per-stream
//!   sequences and optional sequence expectations
//! - **Filter**: OR-combined pattern queries with sequence and
//!   timestamp bounds, streamed into a reducer in global order
//! - **Backends**: durable PostgreSQL storage and an in-memory trie
//!   with identical semantics

pub mod config;
pub mod error;
pub mod filter;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;
pub mod subject;
pub mod telemetry;

mod push;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{DatabaseConfig, LoggingConfig, StoreConfig};
    pub use crate::error::{Error, Result};
    pub use crate::filter::{
        CreatedAtFilter, EventCollector, Filter, FilterQuery, Reducer, SequenceFilter,
    };
    pub use crate::memory::MemoryStore;
    pub use crate::model::{Aggregate, Command, Event};
    pub use crate::postgres::PgStore;
    pub use crate::store::EventStore;
    pub use crate::subject::{matches, Subject, TextSubject, TextSubjects};
}
